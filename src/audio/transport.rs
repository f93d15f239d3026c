//! Voice transport seam.
//!
//! A session talks to Discord voice only through [`VoiceGateway`] and
//! [`VoicePlayer`]; the songbird implementation lives in [`super::voice`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::path::Path;
use tokio::sync::mpsc;

use crate::error::MusicResult;

/// Estado visible del reproductor de un servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Aviso de fin emitido por el transporte para la reproducción iniciada con `token`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Ended { token: u64 },
    Failed { token: u64, reason: String },
}

impl PlayerEvent {
    pub fn token(&self) -> u64 {
        match self {
            PlayerEvent::Ended { token } | PlayerEvent::Failed { token, .. } => *token,
        }
    }
}

pub type PlayerEvents = mpsc::UnboundedSender<PlayerEvent>;

/// Abre conexiones de voz
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Se une a `channel_id` y devuelve el reproductor del servidor. Cada
    /// reproducción iniciada en él reporta su fin o su error en `events`.
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: PlayerEvents,
    ) -> MusicResult<Box<dyn VoicePlayer>>;

    /// `true` mientras el servidor tenga una conexión de voz abierta o en curso
    async fn is_connected(&self, guild_id: GuildId) -> bool;
}

/// Reproductor ligado a una conexión de voz
#[async_trait]
pub trait VoicePlayer: Send + Sync {
    /// Reproduce el archivo en `path`, reemplazando lo que esté sonando
    async fn play(&mut self, path: &Path, token: u64) -> MusicResult<()>;

    /// Detiene la reproducción actual. Su fin igual se reporta como evento.
    async fn stop(&mut self);

    async fn pause(&mut self) -> bool;

    async fn resume(&mut self) -> bool;

    async fn status(&self) -> PlayerStatus;

    /// Sale del canal de voz
    async fn disconnect(&mut self);
}
