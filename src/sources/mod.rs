pub mod ytdlp;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::error::MusicResult;

pub use ytdlp::YtDlpResolver;

/// Trait común para resolver una query a un track reproducible
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Resuelve una URL o una búsqueda a exactamente un track descargado.
    ///
    /// Solo devuelve errores [`crate::error::MusicError::Resolution`].
    async fn resolve(&self, query: &str) -> MusicResult<Track>;
}

/// Representa un track de música descargado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub source_url: String,
    pub requested_by: String,
    pub duration: String,
    pub author: String,
    pub local_file_path: Option<PathBuf>,
}

impl Track {
    pub fn with_requested_by(mut self, requested_by: impl Into<String>) -> Self {
        self.requested_by = requested_by.into();
        self
    }
}

/// Una query es URL si se interpreta como URL http(s) absoluta
pub fn is_url(query: &str) -> bool {
    url::Url::parse(query)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Formatea segundos como `HH:MM:SS`, sin las horas cuando son cero
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
