//! In-memory voice transport and announcer used by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    audio::{
        session::{Announcer, PanelState},
        transport::{PlayerEvent, PlayerEvents, PlayerStatus, VoiceGateway, VoicePlayer},
    },
    error::{MusicError, MusicResult},
    sources::Track,
    storage::FileStore,
};

/// Crea un archivo real en el store y un track que apunta a él
pub(crate) fn track_file(store: &FileStore, title: &str) -> Track {
    let path = store.dir().join(format!("audio-{}.mp3", title));
    std::fs::write(&path, b"fake audio").unwrap();

    Track {
        title: title.to_string(),
        source_url: format!("https://example/{}", title),
        requested_by: "ana".to_string(),
        duration: "03:00".to_string(),
        author: "Artist".to_string(),
        local_file_path: Some(path),
    }
}

#[derive(Default)]
struct FakeState {
    played: Vec<PathBuf>,
    token: Option<u64>,
    status: PlayerStatus,
    stops: usize,
    disconnected: bool,
    dropped: bool,
    events: Option<PlayerEvents>,
}

/// Vista compartida del reproductor falso; los tests emiten los eventos desde aquí
#[derive(Clone, Default)]
pub(crate) struct FakeVoice {
    state: Arc<Mutex<FakeState>>,
}

impl FakeVoice {
    pub(crate) fn player(&self, events: PlayerEvents) -> Box<dyn VoicePlayer> {
        let mut state = self.state.lock();
        state.events = Some(events);
        state.disconnected = false;
        state.dropped = false;
        drop(state);

        Box::new(FakePlayer {
            state: self.state.clone(),
        })
    }

    pub(crate) fn emit(&self, event: PlayerEvent) {
        if let Some(events) = &self.state.lock().events {
            let _ = events.send(event);
        }
    }

    /// Simula que el track actual sonó hasta el final
    pub(crate) fn finish_current(&self) {
        let token = {
            let mut state = self.state.lock();
            state.status = PlayerStatus::Idle;
            state.token
        };
        if let Some(token) = token {
            self.emit(PlayerEvent::Ended { token });
        }
    }

    pub(crate) fn fail_current(&self, reason: &str) {
        let token = {
            let mut state = self.state.lock();
            state.status = PlayerStatus::Idle;
            state.token
        };
        if let Some(token) = token {
            self.emit(PlayerEvent::Failed {
                token,
                reason: reason.to_string(),
            });
        }
    }

    pub(crate) fn current_token(&self) -> Option<u64> {
        self.state.lock().token
    }

    /// Nombres de archivo pasados a `play`, en orden
    pub(crate) fn played(&self) -> Vec<String> {
        self.state
            .lock()
            .played
            .iter()
            .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
            .collect()
    }

    pub(crate) fn stops(&self) -> usize {
        self.state.lock().stops
    }

    pub(crate) fn is_disconnected(&self) -> bool {
        self.state.lock().disconnected
    }

    /// Simula que alguien sacó al bot del canal
    pub(crate) fn drop_connection(&self) {
        self.state.lock().dropped = true;
    }

    fn is_connected(&self) -> bool {
        let state = self.state.lock();
        state.events.is_some() && !state.disconnected && !state.dropped
    }
}

struct FakePlayer {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl VoicePlayer for FakePlayer {
    async fn play(&mut self, path: &Path, token: u64) -> MusicResult<()> {
        let mut state = self.state.lock();
        state.played.push(path.to_path_buf());
        state.token = Some(token);
        state.status = PlayerStatus::Playing;
        Ok(())
    }

    async fn stop(&mut self) {
        let mut state = self.state.lock();
        state.stops += 1;
        if state.status != PlayerStatus::Idle {
            state.status = PlayerStatus::Idle;
            if let (Some(token), Some(events)) = (state.token, &state.events) {
                let _ = events.send(PlayerEvent::Ended { token });
            }
        }
    }

    async fn pause(&mut self) -> bool {
        let mut state = self.state.lock();
        if state.status == PlayerStatus::Playing {
            state.status = PlayerStatus::Paused;
            return true;
        }
        false
    }

    async fn resume(&mut self) -> bool {
        let mut state = self.state.lock();
        if state.status == PlayerStatus::Paused {
            state.status = PlayerStatus::Playing;
            return true;
        }
        false
    }

    async fn status(&self) -> PlayerStatus {
        self.state.lock().status
    }

    async fn disconnect(&mut self) {
        self.state.lock().disconnected = true;
    }
}

/// Gateway que entrega reproductores falsos, opcionalmente lento o fallando
#[derive(Default)]
pub(crate) struct FakeGateway {
    pub voice: FakeVoice,
    pub joins: AtomicUsize,
    pub join_delay: Duration,
    pub fail: bool,
}

impl FakeGateway {
    pub(crate) fn joins(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn join(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
        events: PlayerEvents,
    ) -> MusicResult<Box<dyn VoicePlayer>> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        if !self.join_delay.is_zero() {
            tokio::time::sleep(self.join_delay).await;
        }
        if self.fail {
            return Err(MusicError::Transport("voice gateway unavailable".into()));
        }
        Ok(self.voice.player(events))
    }

    async fn is_connected(&self, _guild_id: GuildId) -> bool {
        self.voice.is_connected()
    }
}

/// Guarda los anuncios como textos cortos
#[derive(Default)]
pub(crate) struct RecordingAnnouncer {
    events: Mutex<Vec<String>>,
}

impl RecordingAnnouncer {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn now_playing(&self, panel: &PanelState) {
        let title = panel
            .current
            .as_ref()
            .map(|t| t.title.clone())
            .unwrap_or_default();
        self.events.lock().push(format!("now_playing:{}", title));
    }

    async fn queue_empty(&self, _idle_timeout: Option<Duration>) {
        self.events.lock().push("queue_empty".to_string());
    }

    async fn idle_disconnect(&self) {
        self.events.lock().push("idle_disconnect".to_string());
    }
}
