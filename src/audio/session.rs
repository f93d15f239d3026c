//! Per-guild playback session.
//!
//! Each connected guild gets one actor task that owns its queue and voice
//! player. Commands, transport completions and the idle timer are handled one
//! at a time, so no two advances for a guild can ever overlap.

use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::GuildQueue,
        transport::{PlayerEvent, PlayerStatus, VoicePlayer},
    },
    config::Config,
    error::{MusicError, MusicResult},
    sources::Track,
    storage::FileStore,
};

/// Salida de texto de una sesión (el canal donde se pidió la música)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn now_playing(&self, panel: &PanelState);

    /// `idle_timeout` es `None` si la desconexión automática está apagada
    async fn queue_empty(&self, idle_timeout: Option<Duration>);

    async fn idle_disconnect(&self);
}

/// Estado usado para dibujar el panel de control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelState {
    pub current: Option<Track>,
    pub pending: usize,
    pub looping: bool,
    pub shuffling: bool,
    pub autoplay: bool,
    pub status: PlayerStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// `Duration::ZERO` mantiene conectadas las sesiones inactivas
    pub idle_timeout: Duration,
    pub max_skip_attempts: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            max_skip_attempts: 25,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            idle_timeout: config.idle_timeout,
            max_skip_attempts: config.max_skip_attempts,
        }
    }
}

/// Motivo por el que terminó la tarea de una sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Stopped,
    IdleTimeout,
}

enum SessionCommand {
    Enqueue {
        track: Track,
        reply: oneshot::Sender<usize>,
    },
    Skip {
        reply: oneshot::Sender<PanelState>,
    },
    PauseResume {
        reply: oneshot::Sender<PanelState>,
    },
    ToggleLoop {
        reply: oneshot::Sender<PanelState>,
    },
    ToggleShuffle {
        reply: oneshot::Sender<PanelState>,
    },
    Snapshot {
        reply: oneshot::Sender<PanelState>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Handle barato a una sesión en marcha. Toda llamada falla con
/// [`MusicError::SessionClosed`] una vez que la sesión terminó.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: u64,
    guild_id: GuildId,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionCommand::Enqueue { .. } => "Enqueue",
            SessionCommand::Skip { .. } => "Skip",
            SessionCommand::PauseResume { .. } => "PauseResume",
            SessionCommand::ToggleLoop { .. } => "ToggleLoop",
            SessionCommand::ToggleShuffle { .. } => "ToggleShuffle",
            SessionCommand::Snapshot { .. } => "Snapshot",
            SessionCommand::Stop { .. } => "Stop",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> MusicResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| MusicError::SessionClosed)?;
        rx.await.map_err(|_| MusicError::SessionClosed)
    }

    /// Agrega un track; devuelve su posición en la cola (`0` = suena ya).
    ///
    /// Si falla, la sesión nunca tomó el track.
    pub async fn enqueue(&self, track: Track) -> MusicResult<usize> {
        self.request(|reply| SessionCommand::Enqueue { track, reply })
            .await
    }

    pub async fn skip(&self) -> MusicResult<PanelState> {
        self.request(|reply| SessionCommand::Skip { reply }).await
    }

    pub async fn pause_resume(&self) -> MusicResult<PanelState> {
        self.request(|reply| SessionCommand::PauseResume { reply })
            .await
    }

    pub async fn toggle_loop(&self) -> MusicResult<PanelState> {
        self.request(|reply| SessionCommand::ToggleLoop { reply })
            .await
    }

    pub async fn toggle_shuffle(&self) -> MusicResult<PanelState> {
        self.request(|reply| SessionCommand::ToggleShuffle { reply })
            .await
    }

    pub async fn snapshot(&self) -> MusicResult<PanelState> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    /// Detiene la música, sale del canal y espera a que la sesión termine
    pub async fn stop(&self) -> MusicResult<()> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }
}

/// Lanza el actor de un servidor recién conectado
pub fn spawn_session(
    id: u64,
    guild_id: GuildId,
    player: Box<dyn VoicePlayer>,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    store: Arc<FileStore>,
    announcer: Arc<dyn Announcer>,
    settings: SessionSettings,
) -> (SessionHandle, JoinHandle<SessionExit>) {
    let (tx, inbox) = mpsc::unbounded_channel();

    let session = GuildSession {
        id,
        guild_id,
        queue: GuildQueue::new(),
        player,
        store,
        announcer,
        settings,
        rng: StdRng::from_entropy(),
        play_token: 0,
        last_token: 0,
        idle_since: Some(Instant::now()),
    };

    let task = tokio::spawn(session.run(inbox, events));

    (SessionHandle { id, guild_id, tx }, task)
}

struct GuildSession {
    id: u64,
    guild_id: GuildId,
    queue: GuildQueue,
    player: Box<dyn VoicePlayer>,
    store: Arc<FileStore>,
    announcer: Arc<dyn Announcer>,
    settings: SessionSettings,
    rng: StdRng,
    /// Token de la reproducción cuyo fin se espera; 0 = ninguna
    play_token: u64,
    last_token: u64,
    idle_since: Option<Instant>,
}

impl GuildSession {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<SessionCommand>,
        mut events: mpsc::UnboundedReceiver<PlayerEvent>,
    ) -> SessionExit {
        info!("🎧 Sesión {} iniciada en guild {}", self.id, self.guild_id);

        loop {
            let deadline = self.idle_deadline();

            tokio::select! {
                biased;

                Some(event) = events.recv() => self.on_player_event(event).await,

                command = inbox.recv() => {
                    let Some(command) = command else {
                        self.shutdown().await;
                        return SessionExit::Stopped;
                    };
                    if let Some(exit) = self.handle(command).await {
                        return exit;
                    }
                }

                _ = wait_until(deadline) => {
                    info!("⏰ Guild {} inactiva, desconectando", self.guild_id);
                    self.announcer.idle_disconnect().await;
                    self.shutdown().await;
                    return SessionExit::IdleTimeout;
                }
            }
        }
    }

    async fn handle(&mut self, command: SessionCommand) -> Option<SessionExit> {
        debug!("📨 Guild {}: {:?}", self.guild_id, command);

        match command {
            SessionCommand::Enqueue { track, reply } => {
                let position = self.queue.enqueue(track);
                let _ = reply.send(position);

                if self.queue.current().is_none() {
                    self.advance().await;
                }
            }
            SessionCommand::Skip { reply } => {
                if let Some(current) = self.queue.current() {
                    info!("⏭️ Saltando: {}", current.title);
                    // El fin del track llega como evento y avanza la cola
                    self.player.stop().await;
                }
                let _ = reply.send(self.panel().await);
            }
            SessionCommand::PauseResume { reply } => {
                match self.player.status().await {
                    PlayerStatus::Playing => {
                        self.player.pause().await;
                    }
                    PlayerStatus::Paused => {
                        self.player.resume().await;
                    }
                    PlayerStatus::Idle => debug!("Nada que pausar en guild {}", self.guild_id),
                }
                let _ = reply.send(self.panel().await);
            }
            SessionCommand::ToggleLoop { reply } => {
                self.queue.toggle_loop();
                let _ = reply.send(self.panel().await);
            }
            SessionCommand::ToggleShuffle { reply } => {
                self.queue.toggle_shuffle();
                let _ = reply.send(self.panel().await);
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.panel().await);
            }
            SessionCommand::Stop { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return Some(SessionExit::Stopped);
            }
        }

        None
    }

    async fn on_player_event(&mut self, event: PlayerEvent) {
        if self.play_token == 0 || event.token() != self.play_token {
            debug!("Evento obsoleto ignorado: {:?}", event);
            return;
        }

        self.play_token = 0;

        match &event {
            PlayerEvent::Ended { .. } => info!("🎵 Track terminó en guild {}", self.guild_id),
            PlayerEvent::Failed { reason, .. } => {
                error!("❌ Error de reproducción en guild {}: {}", self.guild_id, reason);

                // Un archivo que falló no se repite ni en modo loop
                if let Some(failed) = self.queue.take_current() {
                    self.store.release(&failed).await;
                }
            }
        }

        self.advance().await;
    }

    /// Elige e inicia el siguiente track reproducible. Salta los que no se
    /// pueden reproducir, como mucho `max_skip_attempts` seguidos.
    async fn advance(&mut self) {
        let mut skipped = 0;

        loop {
            let step = self.queue.advance(&mut self.rng);

            if let Some(retired) = &step.retired {
                self.store.release(retired).await;
            }

            let Some(track) = step.next else {
                self.go_idle();
                self.announcer.queue_empty(self.idle_timeout()).await;
                return;
            };

            match self.start(&track).await {
                Ok(()) => {
                    self.idle_since = None;
                    let panel = self.panel().await;
                    self.announcer.now_playing(&panel).await;
                    return;
                }
                Err(e) => {
                    warn!("⚠️ Saltando {}: {}", track.title, e);

                    // Fuera de `current` para que el modo loop no lo repita
                    if let Some(unplayable) = self.queue.take_current() {
                        self.store.release(&unplayable).await;
                    }

                    skipped += 1;
                    if skipped >= self.settings.max_skip_attempts {
                        error!(
                            "❌ {} tracks seguidos sin poder reproducirse en guild {}",
                            skipped, self.guild_id
                        );
                        self.go_idle();
                        return;
                    }
                }
            }
        }
    }

    async fn start(&mut self, track: &Track) -> MusicResult<()> {
        let path = track
            .local_file_path
            .as_deref()
            .ok_or_else(|| MusicError::Playback("el track no tiene archivo local".to_string()))?;

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(MusicError::Playback(format!(
                "archivo no encontrado: {}",
                path.display()
            )));
        }

        self.last_token += 1;
        self.play_token = self.last_token;

        if let Err(e) = self.player.play(path, self.play_token).await {
            self.play_token = 0;
            return Err(e);
        }

        info!("🎵 Reproduciendo: {} en guild {}", track.title, self.guild_id);
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.play_token = 0;
        self.player.stop().await;

        if let Some(current) = self.queue.take_current() {
            self.store.release(&current).await;
        }
        self.queue.clear_pending();

        self.player.disconnect().await;
        info!("⏹️ Sesión {} cerrada en guild {}", self.id, self.guild_id);
    }

    async fn panel(&self) -> PanelState {
        PanelState {
            current: self.queue.current().cloned(),
            pending: self.queue.pending_len(),
            looping: self.queue.is_looping(),
            shuffling: self.queue.is_shuffling(),
            autoplay: self.queue.is_autoplay(),
            status: self.player.status().await,
        }
    }

    fn go_idle(&mut self) {
        self.play_token = 0;
        self.idle_since = Some(Instant::now());
    }

    fn idle_timeout(&self) -> Option<Duration> {
        Some(self.settings.idle_timeout).filter(|t| !t.is_zero())
    }

    fn idle_deadline(&self) -> Option<Instant> {
        if self.queue.current().is_some() {
            return None;
        }
        Some(self.idle_since? + self.idle_timeout()?)
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{track_file, FakeVoice, RecordingAnnouncer};
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        _dir: TempDir,
        store: Arc<FileStore>,
        voice: FakeVoice,
        announcer: Arc<RecordingAnnouncer>,
        handle: SessionHandle,
        task: JoinHandle<SessionExit>,
    }

    async fn harness(settings: SessionSettings) -> Harness {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path().to_path_buf(), "mp3").await.unwrap());
        let voice = FakeVoice::default();
        let announcer = Arc::new(RecordingAnnouncer::default());

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let player = voice.player(events_tx);
        let (handle, task) = spawn_session(
            1,
            GuildId::new(10),
            player,
            events_rx,
            store.clone(),
            announcer.clone(),
            settings,
        );

        Harness {
            _dir: dir,
            store,
            voice,
            announcer,
            handle,
            task,
        }
    }

    fn title(panel: &PanelState) -> Option<&str> {
        panel.current.as_ref().map(|t| t.title.as_str())
    }

    #[tokio::test]
    async fn first_track_starts_immediately() {
        let h = harness(SessionSettings::default()).await;
        let a = track_file(&h.store, "A");
        let b = track_file(&h.store, "B");

        assert_eq!(h.handle.enqueue(a).await.unwrap(), 0);
        assert_eq!(h.handle.enqueue(b).await.unwrap(), 1);

        let panel = h.handle.snapshot().await.unwrap();
        assert_eq!(title(&panel), Some("A"));
        assert_eq!(panel.pending, 1);
        assert_eq!(panel.status, PlayerStatus::Playing);
        assert_eq!(h.voice.played(), vec!["audio-A.mp3"]);
        assert_eq!(h.announcer.events(), vec!["now_playing:A"]);
    }

    #[tokio::test]
    async fn natural_end_advances_and_releases_file() {
        let h = harness(SessionSettings::default()).await;
        let a = track_file(&h.store, "A");
        let a_path = a.local_file_path.clone().unwrap();
        h.handle.enqueue(a).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "B")).await.unwrap();

        h.voice.finish_current();
        let panel = h.handle.snapshot().await.unwrap();

        assert_eq!(title(&panel), Some("B"));
        assert!(!a_path.exists());
        assert_eq!(h.voice.played(), vec!["audio-A.mp3", "audio-B.mp3"]);

        h.voice.finish_current();
        let panel = h.handle.snapshot().await.unwrap();
        assert_eq!(panel.current, None);
        assert_eq!(
            h.announcer.events(),
            vec!["now_playing:A", "now_playing:B", "queue_empty"]
        );
    }

    #[tokio::test]
    async fn stale_completion_is_ignored() {
        let h = harness(SessionSettings::default()).await;
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "B")).await.unwrap();

        let old = h.voice.current_token().unwrap();
        h.voice.finish_current();
        h.handle.snapshot().await.unwrap();

        // Un segundo aviso del track anterior no debe saltar B
        h.voice.emit(PlayerEvent::Failed {
            token: old,
            reason: "late".into(),
        });
        let panel = h.handle.snapshot().await.unwrap();
        assert_eq!(title(&panel), Some("B"));
        assert_eq!(h.voice.played().len(), 2);
    }

    #[tokio::test]
    async fn loop_replays_without_releasing() {
        let h = harness(SessionSettings::default()).await;
        let a = track_file(&h.store, "A");
        let a_path = a.local_file_path.clone().unwrap();
        h.handle.enqueue(a).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "B")).await.unwrap();

        let panel = h.handle.toggle_loop().await.unwrap();
        assert!(panel.looping);

        h.voice.finish_current();
        h.handle.snapshot().await.unwrap();
        h.voice.finish_current();

        let panel = h.handle.snapshot().await.unwrap();
        assert_eq!(title(&panel), Some("A"));
        assert_eq!(panel.pending, 1);
        assert!(a_path.exists());
        assert_eq!(
            h.voice.played(),
            vec!["audio-A.mp3", "audio-A.mp3", "audio-A.mp3"]
        );
    }

    #[tokio::test]
    async fn skip_stops_player_and_advances() {
        let h = harness(SessionSettings::default()).await;
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "B")).await.unwrap();

        h.handle.skip().await.unwrap();
        let panel = h.handle.snapshot().await.unwrap();

        assert_eq!(title(&panel), Some("B"));
        assert_eq!(h.voice.stops(), 1);
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let h = harness(SessionSettings::default()).await;
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();

        let mut gone = track_file(&h.store, "B");
        gone.local_file_path = Some(h.store.dir().join("missing.mp3"));
        h.handle.enqueue(gone).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "C")).await.unwrap();

        h.voice.finish_current();
        let panel = h.handle.snapshot().await.unwrap();

        assert_eq!(title(&panel), Some("C"));
        assert_eq!(h.voice.played(), vec!["audio-A.mp3", "audio-C.mp3"]);
    }

    #[tokio::test]
    async fn missing_file_in_loop_mode_is_not_retried() {
        let h = harness(SessionSettings::default()).await;
        h.handle.toggle_loop().await.unwrap();

        let mut gone = track_file(&h.store, "A");
        gone.local_file_path = None;
        h.handle.enqueue(gone).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "B")).await.unwrap();

        let panel = h.handle.snapshot().await.unwrap();
        assert_eq!(title(&panel), Some("B"));
        assert_eq!(h.voice.played(), vec!["audio-B.mp3"]);
    }

    #[tokio::test]
    async fn playback_error_in_loop_mode_is_not_retried() {
        let h = harness(SessionSettings::default()).await;
        h.handle.toggle_loop().await.unwrap();

        let a = track_file(&h.store, "A");
        let a_path = a.local_file_path.clone().unwrap();
        h.handle.enqueue(a).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "B")).await.unwrap();

        h.voice.fail_current("corrupt");
        let panel = h.handle.snapshot().await.unwrap();

        assert_eq!(title(&panel), Some("B"));
        assert!(panel.looping);
        assert!(!a_path.exists());
        assert_eq!(h.voice.played(), vec!["audio-A.mp3", "audio-B.mp3"]);
        assert_eq!(h.announcer.events(), vec!["now_playing:A", "now_playing:B"]);

        // B sí se repite al terminar bien
        h.voice.finish_current();
        h.handle.snapshot().await.unwrap();
        assert_eq!(
            h.voice.played(),
            vec!["audio-A.mp3", "audio-B.mp3", "audio-B.mp3"]
        );
    }

    #[tokio::test]
    async fn playback_error_on_last_track_goes_idle() {
        let h = harness(SessionSettings::default()).await;
        h.handle.toggle_loop().await.unwrap();
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();

        h.voice.fail_current("corrupt");
        let panel = h.handle.snapshot().await.unwrap();

        assert_eq!(panel.current, None);
        assert_eq!(h.voice.played(), vec!["audio-A.mp3"]);
        assert_eq!(h.announcer.events(), vec!["now_playing:A", "queue_empty"]);
    }

    #[tokio::test]
    async fn enqueue_after_capped_skips_reports_real_position() {
        let h = harness(SessionSettings {
            max_skip_attempts: 1,
            ..SessionSettings::default()
        })
        .await;
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();
        let mut gone = track_file(&h.store, "B");
        gone.local_file_path = None;
        h.handle.enqueue(gone).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "C")).await.unwrap();

        h.voice.finish_current();
        let panel = h.handle.snapshot().await.unwrap();
        assert_eq!(panel.current, None);
        assert_eq!(panel.pending, 1);

        // C arranca ahora, D queda primera en la cola
        assert_eq!(h.handle.enqueue(track_file(&h.store, "D")).await.unwrap(), 1);
        let panel = h.handle.snapshot().await.unwrap();
        assert_eq!(title(&panel), Some("C"));
        assert_eq!(panel.pending, 1);
    }

    #[tokio::test]
    async fn skip_attempts_are_capped() {
        let h = harness(SessionSettings {
            max_skip_attempts: 2,
            ..SessionSettings::default()
        })
        .await;
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();
        for name in ["B", "C", "D"] {
            let mut gone = track_file(&h.store, name);
            gone.local_file_path = Some(h.store.dir().join(format!("{}-gone.mp3", name)));
            h.handle.enqueue(gone).await.unwrap();
        }

        h.voice.finish_current();
        let panel = h.handle.snapshot().await.unwrap();

        assert_eq!(panel.current, None);
        assert_eq!(panel.pending, 1);
        assert_eq!(h.voice.played(), vec!["audio-A.mp3"]);
    }

    #[tokio::test]
    async fn failure_event_advances_like_an_end() {
        let h = harness(SessionSettings::default()).await;
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();
        h.handle.enqueue(track_file(&h.store, "B")).await.unwrap();

        h.voice.fail_current("decoder exploded");
        let panel = h.handle.snapshot().await.unwrap();

        assert_eq!(title(&panel), Some("B"));
    }

    #[tokio::test]
    async fn pause_resume_toggles_status() {
        let h = harness(SessionSettings::default()).await;

        let idle = h.handle.pause_resume().await.unwrap();
        assert_eq!(idle.status, PlayerStatus::Idle);

        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();
        let paused = h.handle.pause_resume().await.unwrap();
        assert_eq!(paused.status, PlayerStatus::Paused);

        let playing = h.handle.pause_resume().await.unwrap();
        assert_eq!(playing.status, PlayerStatus::Playing);
    }

    #[tokio::test]
    async fn stop_releases_current_and_closes_session() {
        let h = harness(SessionSettings::default()).await;
        let a = track_file(&h.store, "A");
        let a_path = a.local_file_path.clone().unwrap();
        let b = track_file(&h.store, "B");
        let b_path = b.local_file_path.clone().unwrap();
        h.handle.enqueue(a).await.unwrap();
        h.handle.enqueue(b).await.unwrap();

        h.handle.stop().await.unwrap();

        assert_eq!(h.task.await.unwrap(), SessionExit::Stopped);
        assert!(!a_path.exists());
        // Las pendientes no se liberan al vaciar la cola
        assert!(b_path.exists());
        assert!(h.voice.is_disconnected());
        assert!(!h.handle.is_alive());
        assert!(matches!(
            h.handle.snapshot().await,
            Err(MusicError::SessionClosed)
        ));
        assert!(matches!(
            h.handle.enqueue(track_file(&h.store, "C")).await,
            Err(MusicError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn idle_session_disconnects_itself() {
        let h = harness(SessionSettings {
            idle_timeout: Duration::from_millis(100),
            ..SessionSettings::default()
        })
        .await;
        h.handle.enqueue(track_file(&h.store, "A")).await.unwrap();
        h.voice.finish_current();

        let exit = tokio::time::timeout(Duration::from_secs(5), h.task)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(exit, SessionExit::IdleTimeout);
        assert!(h.voice.is_disconnected());
        assert_eq!(
            h.announcer.events(),
            vec!["now_playing:A", "queue_empty", "idle_disconnect"]
        );
    }

    #[tokio::test]
    async fn zero_idle_timeout_never_disconnects() {
        let h = harness(SessionSettings {
            idle_timeout: Duration::ZERO,
            ..SessionSettings::default()
        })
        .await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(h.handle.is_alive());
        assert!(h.handle.snapshot().await.is_ok());
    }

    #[tokio::test]
    async fn announcer_receives_panel_for_new_track() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileStore::open(dir.path().to_path_buf(), "mp3").await.unwrap());
        let voice = FakeVoice::default();

        let mut announcer = MockAnnouncer::new();
        announcer
            .expect_now_playing()
            .withf(|panel| {
                panel.current.as_ref().is_some_and(|t| t.title == "A")
                    && panel.status == PlayerStatus::Playing
                    && !panel.looping
            })
            .times(1)
            .return_const(());
        announcer.expect_queue_empty().times(0);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (handle, _task) = spawn_session(
            7,
            GuildId::new(10),
            voice.player(events_tx),
            events_rx,
            store.clone(),
            Arc::new(announcer),
            SessionSettings::default(),
        );

        handle.enqueue(track_file(&store, "A")).await.unwrap();
        handle.snapshot().await.unwrap();
        assert_eq!(handle.id(), 7);
        assert_eq!(handle.guild_id(), GuildId::new(10));
    }
}
