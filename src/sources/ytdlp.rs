use async_trait::async_trait;
use serde::Deserialize;
use std::{path::Path, process::Stdio, sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use super::{format_duration, is_url, Track, TrackResolver};
use crate::{
    error::{MusicError, MusicResult},
    storage::FileStore,
};

const STDERR_LIMIT: u64 = 64 * 1024;
const UNKNOWN_AUTHOR: &str = "Desconocido";
const PENDING_REQUESTER: &str = "Pendiente";

/// Resolver que descarga el audio con yt-dlp
pub struct YtDlpResolver {
    command: Vec<String>,
    store: Arc<FileStore>,
    timeout: Duration,
    max_output_bytes: usize,
}

/// Registro JSON impreso por yt-dlp (una línea por video)
#[derive(Debug, Deserialize)]
struct YtDlpRecord {
    #[serde(rename = "_type")]
    kind: Option<String>,
    url: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    webpage_url: Option<String>,
    #[serde(rename = "_filename")]
    filename: Option<String>,
}

impl YtDlpResolver {
    /// `command` es el programa seguido de sus argumentos fijos, por ejemplo
    /// `["yt-dlp"]` o `["python3", "-m", "yt_dlp"]`.
    pub fn new(
        command: Vec<String>,
        store: Arc<FileStore>,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Self {
        Self {
            command,
            store,
            timeout,
            max_output_bytes,
        }
    }

    /// Argumentos para descargar y convertir un único resultado
    pub fn build_args(&self, query: &str, timestamp: i64) -> Vec<String> {
        let template = self.store.output_template(timestamp);

        let mut args: Vec<String> = [
            "-x",
            "--audio-format",
            self.store.audio_format(),
            "--print-json",
            "--no-playlist",
            "--restrict-filenames",
            "--no-warnings",
            "--output",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(template.to_string_lossy().into_owned());

        if is_url(query) {
            args.push(query.to_string());
        } else {
            args.push("--default-search".to_string());
            args.push("ytsearch".to_string());
            args.push(format!("ytsearch1:{}", query));
        }

        args
    }

    /// Ejecuta el proceso de extracción y devuelve su stdout
    async fn run(&self, args: Vec<String>) -> MusicResult<String> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| MusicError::Resolution("comando yt-dlp vacío".to_string()))?;

        let mut child = Command::new(program)
            .args(leading)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MusicError::Resolution(format!("no se pudo ejecutar yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MusicError::Resolution("stdout no disponible".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MusicError::Resolution("stderr no disponible".to_string()))?;

        let limit = self.max_output_bytes as u64;
        let work = async move {
            let (out, err) = tokio::join!(
                read_bounded(stdout, limit),
                read_bounded(stderr, STDERR_LIMIT)
            );
            let out = out?;
            let err = err.unwrap_or_default();

            if out.len() as u64 > limit {
                return Err(MusicError::Resolution(format!(
                    "la salida de yt-dlp excede {} bytes",
                    limit
                )));
            }

            let status = child
                .wait()
                .await
                .map_err(|e| MusicError::Resolution(format!("error esperando yt-dlp: {}", e)))?;

            if !status.success() {
                let stderr = String::from_utf8_lossy(&err);
                error!("Stderr de yt-dlp: {}", stderr.trim());
                return Err(MusicError::Resolution(format!("yt-dlp terminó con {}", status)));
            }

            Ok::<_, MusicError>(String::from_utf8_lossy(&out).into_owned())
        };

        // Al vencer el timeout se descarta `work` y kill_on_drop mata el proceso
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| {
                MusicError::Resolution(format!(
                    "yt-dlp no respondió en {}",
                    humantime::format_duration(self.timeout)
                ))
            })?
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> MusicResult<Track> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::Resolution("query vacía".to_string()));
        }

        info!("🔍 Resolviendo: {}", query);

        let timestamp = self.store.next_timestamp();
        let args = self.build_args(query, timestamp);
        debug!("yt-dlp {:?}", args);

        let stdout = self.run(args).await.inspect_err(|e| {
            error!("❌ Error al ejecutar yt-dlp para \"{}\": {}", query, e);
        })?;

        let track = parse_output(&stdout, &self.store, timestamp)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                warn!("Ningún resultado utilizable para: {}", query);
                MusicError::Resolution(format!("sin resultados para {}", query))
            })?;

        info!("✅ Resuelto: {} ({})", track.title, track.duration);
        Ok(track)
    }
}

/// Interpreta la salida JSON de yt-dlp, un registro por línea.
///
/// Se ignoran los resúmenes de playlist y los registros sin url, título o
/// duración. Una línea que parece JSON pero no se puede leer hace fallar
/// toda la resolución.
pub(crate) fn parse_output(
    stdout: &str,
    store: &FileStore,
    timestamp: i64,
) -> MusicResult<Vec<Track>> {
    let mut tracks = Vec::new();

    for line in stdout.lines().map(str::trim).filter(|l| l.starts_with('{')) {
        let record: YtDlpRecord = serde_json::from_str(line).map_err(|e| {
            error!("Error al procesar JSON de yt-dlp: {}", e);
            MusicError::Resolution(format!("JSON inválido: {}", e))
        })?;

        if record.kind.as_deref() == Some("playlist") {
            debug!("Ignorando registro de playlist");
            continue;
        }

        match record_to_track(record, store, timestamp) {
            Some(track) => tracks.push(track),
            None => warn!("Registro de yt-dlp incompleto, ignorado"),
        }
    }

    Ok(tracks)
}

fn record_to_track(record: YtDlpRecord, store: &FileStore, timestamp: i64) -> Option<Track> {
    let media_url = record.url.filter(|u| !u.is_empty())?;
    let title = record.title.filter(|t| !t.is_empty())?;
    let seconds = record.duration.filter(|d| d.is_finite() && *d > 0.0)? as u64;

    let local_file_path = match record.filename {
        Some(filename) => store.normalize_extension(Path::new(&filename)),
        None => store.allocate_path(timestamp, &title),
    };

    Some(Track {
        source_url: record.webpage_url.unwrap_or(media_url),
        author: record.uploader.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        duration: format_duration(seconds),
        requested_by: PENDING_REQUESTER.to_string(),
        local_file_path: Some(local_file_path),
        title,
    })
}

async fn read_bounded<R: AsyncRead + Unpin>(reader: R, limit: u64) -> MusicResult<Vec<u8>> {
    // Se lee un byte de más para detectar el desbordamiento; al salir se cierra
    // el pipe y yt-dlp recibe EPIPE
    let mut buf = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| MusicError::Resolution(format!("error leyendo salida de yt-dlp: {}", e)))?;
    Ok(buf)
}

/// Verifica que yt-dlp y ffmpeg estén disponibles
pub async fn verify_dependencies(ytdlp_command: &[String]) -> anyhow::Result<()> {
    let (program, leading) = ytdlp_command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("comando yt-dlp vacío"))?;

    let yt_dlp = async_process::Command::new(program)
        .args(leading)
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        info!(
            "✅ yt-dlp versión: {}",
            String::from_utf8_lossy(&yt_dlp.stdout).trim()
        );
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes (yt-dlp o ffmpeg)");
    }
}
