//! Temporary audio storage.
//!
//! Every resolved track is downloaded by yt-dlp into one private directory and
//! deleted again once the playback engine retires it.

use anyhow::Result;
use parking_lot::Mutex;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::sources::Track;

const FILE_PREFIX: &str = "audio-";
const MAX_TITLE_LEN: usize = 100;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex"));

/// Manager de archivos temporales de audio
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    audio_format: String,
    last_timestamp: Mutex<i64>,
}

impl FileStore {
    /// Abre (y crea) el directorio de audio.
    ///
    /// Borra los archivos `audio-*` que dejó un proceso anterior; ya nadie
    /// puede referenciarlos.
    pub async fn open(dir: PathBuf, audio_format: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;

        let store = Self {
            dir,
            audio_format: audio_format.into(),
            last_timestamp: Mutex::new(0),
        };

        let purged = store.purge_stale().await?;
        if purged > 0 {
            info!("🧹 Eliminados {} archivos de audio huérfanos", purged);
        }
        info!("📁 Almacenamiento temporal en: {}", store.dir.display());

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn audio_format(&self) -> &str {
        &self.audio_format
    }

    /// Timestamp en milisegundos, estrictamente creciente dentro del proceso
    pub fn next_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.last_timestamp.lock();
        *last = now.max(*last + 1);
        *last
    }

    /// Plantilla de salida que recibe yt-dlp para una petición
    pub fn output_template(&self, timestamp: i64) -> PathBuf {
        self.dir
            .join(format!("{}{}-%(title)s.%(ext)s", FILE_PREFIX, timestamp))
    }

    /// Ruta para un track con ese título, en el formato de audio esperado
    pub fn allocate_path(&self, timestamp: i64, title: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}-{}.{}",
            FILE_PREFIX,
            timestamp,
            sanitize_title(title),
            self.audio_format
        ))
    }

    /// yt-dlp reporta el nombre previo a la conversión; el archivo en disco
    /// termina con la extensión del post-procesado.
    pub fn normalize_extension(&self, path: &Path) -> PathBuf {
        path.with_extension(&self.audio_format)
    }

    /// Borra el archivo de `track`. Los errores solo se registran.
    pub async fn release(&self, track: &Track) {
        let Some(path) = &track.local_file_path else {
            return;
        };

        match fs::remove_file(path).await {
            Ok(()) => debug!("🗑️ Archivo eliminado: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Archivo ya no existe: {}", path.display());
            }
            Err(e) => error!("Error al eliminar archivo {}: {}", path.display(), e),
        }
    }

    async fn purge_stale(&self) -> Result<usize> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_audio = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FILE_PREFIX));

            if is_audio && entry.file_type().await?.is_file() {
                match fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("No se pudo eliminar {}: {}", path.display(), e),
                }
            }
        }

        Ok(removed)
    }
}

/// Limita un título a `[A-Za-z0-9._-]`; el resto pasa a `_`
pub fn sanitize_title(title: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(title, "_");
    let trimmed: String = cleaned
        .trim_matches(|c| c == '_' || c == '.')
        .chars()
        .take(MAX_TITLE_LEN)
        .collect();

    if trimmed.is_empty() {
        "track".to_string()
    } else {
        trimmed
    }
}
