//! Deferred `/play` jobs.
//!
//! The interaction is acknowledged right away; joining, resolving and
//! enqueueing happen in a background task that ends with exactly one
//! follow-up message.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    audio::{Announcer, SessionRegistry},
    error::{MusicError, MusicResult},
    sources::TrackResolver,
    storage::FileStore,
};

#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub guild_id: Option<GuildId>,
    /// Canal de voz del usuario al momento del comando
    pub voice_channel: Option<ChannelId>,
    pub requester: String,
    pub query: String,
}

/// Respuesta inmediata a una petición de reproducción
#[derive(Debug)]
pub enum Ack {
    /// Aceptada; la tarea envía el follow-up al terminar
    Deferred(JoinHandle<()>),
    Rejected(String),
}

/// Canal para el mensaje final de un comando diferido
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FollowUp: Send + Sync {
    async fn send(&self, content: String);
}

pub struct JobRunner {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
    store: Arc<FileStore>,
}

impl JobRunner {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn TrackResolver>,
        store: Arc<FileStore>,
    ) -> Self {
        Self {
            registry,
            resolver,
            store,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Valida en el momento y luego ejecuta el trabajo en segundo plano
    pub fn submit_deferred(
        &self,
        request: PlayRequest,
        announcer: Arc<dyn Announcer>,
        followup: Arc<dyn FollowUp>,
    ) -> Ack {
        let (guild_id, channel_id, query) = match validate(&request) {
            Ok(valid) => valid,
            Err(e) => return Ack::Rejected(e.user_message().unwrap_or_default()),
        };

        let job = PlayJob {
            registry: self.registry.clone(),
            resolver: self.resolver.clone(),
            store: self.store.clone(),
            guild_id,
            channel_id,
            requester: request.requester,
            query,
        };

        Ack::Deferred(tokio::spawn(async move {
            let message = job.run(announcer).await;
            followup.send(message).await;
        }))
    }
}

fn validate(request: &PlayRequest) -> MusicResult<(GuildId, ChannelId, String)> {
    let guild_id = request.guild_id.ok_or_else(|| {
        MusicError::Validation("Este comando solo funciona dentro de un servidor.".into())
    })?;

    let channel_id = request.voice_channel.ok_or_else(|| {
        MusicError::Validation("Debes estar en un canal de voz para usar este comando.".into())
    })?;

    let query = request.query.trim();
    if query.is_empty() {
        return Err(MusicError::Validation(
            "Debes indicar una URL o una búsqueda.".into(),
        ));
    }

    Ok((guild_id, channel_id, query.to_string()))
}

struct PlayJob {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn TrackResolver>,
    store: Arc<FileStore>,
    guild_id: GuildId,
    channel_id: ChannelId,
    requester: String,
    query: String,
}

impl PlayJob {
    async fn run(self, announcer: Arc<dyn Announcer>) -> String {
        let session = match self
            .registry
            .acquire(self.guild_id, self.channel_id, announcer)
            .await
        {
            Ok(session) => session,
            Err(MusicError::SessionClosed) => {
                return MusicError::SessionClosed.user_message().unwrap_or_default();
            }
            Err(e) => {
                error!("❌ Error al conectar en guild {}: {}", self.guild_id, e);
                return "❌ No pude conectarme al canal de voz.".to_string();
            }
        };

        let track = match self.resolver.resolve(&self.query).await {
            Ok(track) => track.with_requested_by(&self.requester),
            Err(e) => {
                warn!("⚠️ Sin resultados para '{}': {}", self.query, e);
                return format!("No encontré resultados para: `{}`", self.query);
            }
        };

        match session.enqueue(track.clone()).await {
            Ok(0) => format!("▶️ Reproduciendo: **{}**", track.title),
            Ok(position) => format!("📜 Agregado a la cola (#{}): **{}**", position, track.title),
            Err(e) => {
                // La sesión se detuvo mientras se descargaba
                info!("Descartando '{}' en guild {}: {}", track.title, self.guild_id, e);
                self.store.release(&track).await;
                e.user_message().unwrap_or_default()
            }
        }
    }
}
