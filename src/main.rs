use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod storage;
mod ui;

use crate::audio::{SessionRegistry, SessionSettings, SongbirdGateway};
use crate::bot::{jobs::JobRunner, MusicBot};
use crate::config::Config;
use crate::sources::{ytdlp::verify_dependencies, YtDlpResolver};
use crate::storage::FileStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bongo=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Bongo v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        verify_dependencies(&config.ytdlp_command()).await?;
        println!("OK");
        return Ok(());
    }

    info!("{}", config.summary());

    if let Err(e) = verify_dependencies(&config.ytdlp_command()).await {
        warn!("⚠️ {:?}. Las búsquedas fallarán hasta instalarlas.", e);
    }

    // Directorio temporal de audio
    let store = Arc::new(FileStore::open(config.temp_dir.clone(), &config.audio_format).await?);

    // Motor de reproducción
    let voice = Songbird::serenity();
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(SongbirdGateway::new(voice.clone())),
        store.clone(),
        SessionSettings::from(&config),
    ));

    let resolver = Arc::new(YtDlpResolver::new(
        config.ytdlp_command(),
        store.clone(),
        config.resolve_timeout,
        config.max_output_bytes,
    ));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = MusicBot::new(
        config.clone(),
        JobRunner::new(registry.clone(), resolver, store),
    );

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(voice)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}
