//! Error taxonomy for the playback core.
//!
//! Only [`MusicError::Validation`] and [`MusicError::Resolution`] ever reach the
//! person who issued a command. Playback and transport failures are absorbed
//! where they happen and only show up in the logs.

use thiserror::Error;

pub type MusicResult<T> = std::result::Result<T, MusicError>;

#[derive(Debug, Error)]
pub enum MusicError {
    /// La petición no es válida (sin canal de voz, query vacía, sin sesión)
    #[error("{0}")]
    Validation(String),

    /// yt-dlp falló, devolvió salida vacía o malformada, o excedió el timeout
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Archivo ausente o error del reproductor
    #[error("playback failed: {0}")]
    Playback(String),

    /// Error al conectar con el canal de voz
    #[error("voice transport failed: {0}")]
    Transport(String),

    /// La sesión del servidor ya no existe (fue detenida)
    #[error("the playback session is no longer active")]
    SessionClosed,
}

impl MusicError {
    /// Mensaje para quien pidió la canción, si el error es visible al usuario
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Validation(msg) => Some(format!("❌ {}", msg)),
            Self::Resolution(_) => Some("❌ No encontré resultados.".to_string()),
            Self::SessionClosed => Some("⏹️ La reproducción fue detenida.".to_string()),
            Self::Playback(_) | Self::Transport(_) => None,
        }
    }
}
