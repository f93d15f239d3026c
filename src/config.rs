use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // yt-dlp
    pub ytdlp_path: String,
    pub audio_format: String,
    pub resolve_timeout: Duration,
    pub max_output_bytes: usize,

    // Paths
    pub temp_dir: PathBuf,

    // Sesiones
    pub idle_timeout: Duration, // 0 = nunca desconectar por inactividad
    pub max_skip_attempts: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN es obligatorio")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID es obligatorio")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // yt-dlp
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
            audio_format: std::env::var("AUDIO_FORMAT").unwrap_or_else(|_| "mp3".to_string()),
            resolve_timeout: humantime::parse_duration(
                &std::env::var("RESOLVE_TIMEOUT").unwrap_or_else(|_| "2m".to_string()),
            )?,
            max_output_bytes: std::env::var("MAX_OUTPUT_BYTES")
                .unwrap_or_else(|_| "10485760".to_string()) // 10 MiB
                .parse()?,

            // Paths
            temp_dir: std::env::var("TEMP_DIR")
                .unwrap_or_else(|_| "./temp_music".to_string())
                .into(),

            // Sesiones
            idle_timeout: humantime::parse_duration(
                &std::env::var("IDLE_TIMEOUT").unwrap_or_else(|_| "5m".to_string()),
            )?,
            max_skip_attempts: std::env::var("MAX_SKIP_ATTEMPTS")
                .unwrap_or_else(|_| "25".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Output buffer and skip attempts must be greater than zero
    /// - Resolve timeout must be greater than zero
    /// - A non-zero idle timeout must be longer than the resolve timeout
    /// - Audio format must be a plain extension (no dots or separators)
    pub fn validate(&self) -> Result<()> {
        if self.max_output_bytes == 0 {
            anyhow::bail!("Max output bytes must be greater than 0");
        }

        if self.max_skip_attempts == 0 {
            anyhow::bail!("Max skip attempts must be greater than 0");
        }

        if self.ytdlp_path.trim().is_empty() {
            anyhow::bail!("YTDLP_PATH must not be empty");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if !self.idle_timeout.is_zero() && self.idle_timeout <= self.resolve_timeout {
            anyhow::bail!(
                "Idle timeout ({}) must be longer than resolve timeout ({})",
                humantime::format_duration(self.idle_timeout),
                humantime::format_duration(self.resolve_timeout)
            );
        }

        if self.audio_format.is_empty()
            || !self.audio_format.chars().all(|c| c.is_ascii_alphanumeric())
        {
            anyhow::bail!("Invalid audio format: {:?}", self.audio_format);
        }

        Ok(())
    }

    /// `YTDLP_PATH` may carry leading arguments (`python3 -m yt_dlp`).
    pub fn ytdlp_command(&self) -> Vec<String> {
        self.ytdlp_path
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The Discord token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            yt-dlp: {} -> .{}, timeout {}, buffer {} KiB\n  \
            Temp dir: {}\n  \
            Sessions: idle timeout {}, max {} skipped tracks",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.ytdlp_path,
            self.audio_format,
            humantime::format_duration(self.resolve_timeout),
            self.max_output_bytes / 1024,
            self.temp_dir.display(),
            if self.idle_timeout.is_zero() {
                "off".to_string()
            } else {
                humantime::format_duration(self.idle_timeout).to_string()
            },
            self.max_skip_attempts,
        )
    }
}

/// Default configuration values, matching the fallbacks of [`Config::load`].
#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            ytdlp_path: "yt-dlp".to_string(),
            audio_format: "mp3".to_string(),
            resolve_timeout: Duration::from_secs(120),
            max_output_bytes: 10 * 1024 * 1024,

            temp_dir: "./temp_music".into(),

            idle_timeout: Duration::from_secs(300), // 5 minutos
            max_skip_attempts: 25,
        }
    }
}
