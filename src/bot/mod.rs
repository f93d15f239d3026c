//! # Bot Module
//!
//! Discord surface of the bot: slash command registration, interaction
//! handling and the background jobs behind `/play`.
//!
//! The [`MusicBot`] struct implements Serenity's [`EventHandler`]; all
//! playback state lives in the [`SessionRegistry`] it shares with `main`.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod announcer;
pub mod commands;
pub mod dispatcher;
pub mod handlers;
pub mod jobs;

use crate::{audio::SessionRegistry, config::Config};
use jobs::JobRunner;

pub struct MusicBot {
    config: Arc<Config>,
    pub jobs: JobRunner,
}

impl MusicBot {
    pub fn new(config: Config, jobs: JobRunner) -> Self {
        Self {
            config: Arc::new(config),
            jobs,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.jobs.registry()
    }

    /// Registra los comandos slash: por guild si hay `GUILD_ID` (propagación
    /// instantánea), globales en otro caso.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Libera la sesión cuando alguien saca al bot del canal de voz.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                if self.registry().release_if_disconnected(guild_id).await {
                    info!("🔌 Bot desconectado manualmente en guild {}", guild_id);
                }
            }
        }
    }
}
