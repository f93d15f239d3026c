use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent,
    input::{File, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{path::Path, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    audio::transport::{PlayerEvent, PlayerEvents, PlayerStatus, VoiceGateway, VoicePlayer},
    error::{MusicError, MusicResult},
};

/// Conexiones de voz a través de songbird
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: PlayerEvents,
    ) -> MusicResult<Box<dyn VoicePlayer>> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error al conectar al canal de voz: {:?}", e);
            MusicError::Transport(e.to_string())
        })?;

        {
            let mut handler = call.lock().await;

            handler.add_global_event(
                Event::Core(CoreEvent::DriverConnect),
                ConnectionHandler { guild_id, connected: true },
            );
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                ConnectionHandler { guild_id, connected: false },
            );
        }

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);

        Ok(Box::new(SongbirdPlayer {
            manager: self.manager.clone(),
            guild_id,
            call,
            events,
            current: None,
        }))
    }

    async fn is_connected(&self, guild_id: GuildId) -> bool {
        // songbird ya procesó el voice state: si nos sacaron, el Call no tiene canal
        let Some(call) = self.manager.get(guild_id) else {
            return false;
        };
        let channel = call.lock().await.current_channel();
        channel.is_some()
    }
}

struct SongbirdPlayer {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    events: PlayerEvents,
    current: Option<TrackHandle>,
}

#[async_trait]
impl VoicePlayer for SongbirdPlayer {
    async fn play(&mut self, path: &Path, token: u64) -> MusicResult<()> {
        let input: Input = File::new(path.to_path_buf()).into();

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndHandler {
                    token,
                    events: self.events.clone(),
                },
            )
            .map_err(|e| MusicError::Playback(format!("Error al agregar event handler: {}", e)))?;

        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorHandler {
                    guild_id: self.guild_id,
                    token,
                    events: self.events.clone(),
                },
            )
            .map_err(|e| MusicError::Playback(format!("Error al agregar event handler: {}", e)))?;

        debug!("▶️ Reproduciendo {} (token {})", path.display(), token);
        self.current = Some(handle);
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(track) = &self.current {
            if let Err(e) = track.stop() {
                debug!("El track ya estaba detenido: {}", e);
            }
        }
    }

    async fn pause(&mut self) -> bool {
        let paused = self.current.as_ref().is_some_and(|t| t.pause().is_ok());
        if paused {
            info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        }
        paused
    }

    async fn resume(&mut self) -> bool {
        let resumed = self.current.as_ref().is_some_and(|t| t.play().is_ok());
        if resumed {
            info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        }
        resumed
    }

    async fn status(&self) -> PlayerStatus {
        let Some(track) = &self.current else {
            return PlayerStatus::Idle;
        };

        match track.get_info().await {
            Ok(state) => match state.playing {
                PlayMode::Play => PlayerStatus::Playing,
                PlayMode::Pause => PlayerStatus::Paused,
                _ => PlayerStatus::Idle,
            },
            Err(_) => PlayerStatus::Idle,
        }
    }

    async fn disconnect(&mut self) {
        self.current = None;

        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Error al salir del canal de voz en guild {}: {:?}", self.guild_id, e);
        } else {
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }
}

/// Reporta el fin natural (o forzado) de un track
struct TrackEndHandler {
    token: u64,
    events: PlayerEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        // La sesión puede haber terminado ya
        let _ = self.events.send(PlayerEvent::Ended { token: self.token });
        None
    }
}

/// Handler para errores de tracks
struct TrackErrorHandler {
    guild_id: GuildId,
    token: u64,
    events: PlayerEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut reason = String::from("error desconocido del reproductor");

        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                error!(
                    "❌ Error en track para guild {}: {:?}",
                    self.guild_id, state.playing
                );
                if let PlayMode::Errored(e) = &state.playing {
                    reason = format!("{:?}", e);
                }
            }
        }

        let _ = self.events.send(PlayerEvent::Failed {
            token: self.token,
            reason,
        });
        None
    }
}

/// Solo registra cambios de conexión; no hay reintentos
struct ConnectionHandler {
    guild_id: GuildId,
    connected: bool,
}

#[async_trait]
impl VoiceEventHandler for ConnectionHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if self.connected {
            info!("🔗 Conexión de voz lista en guild {}", self.guild_id);
        } else {
            warn!("🔌 Conexión de voz perdida en guild {}", self.guild_id);
        }
        None
    }
}
