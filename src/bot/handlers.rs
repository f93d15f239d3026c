use anyhow::Result;
use serenity::{
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage},
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    bot::{
        announcer::{ChannelAnnouncer, InteractionFollowUp},
        dispatcher::{dispatch, ControlAction, DispatchOutcome, NOTHING_PLAYING},
        jobs::{Ack, PlayRequest},
        MusicBot,
    },
    ui::{buttons, embeds},
};

const STOPPED: &str = "⏹️ Música detenida. ¡Hasta luego!";

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MusicBot,
) -> Result<()> {
    info!(
        "📝 Comando /{} usado por {} en guild {:?}",
        command.data.name, command.user.name, command.guild_id
    );

    if command.data.name == "play" {
        return handle_play(ctx, command, bot).await;
    }

    let Some(action) = ControlAction::from_command_name(&command.data.name) else {
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new()
                        .content("❌ Comando no reconocido")
                        .ephemeral(true),
                ),
            )
            .await?;
        return Ok(());
    };

    let response = match command.guild_id {
        Some(guild_id) => control_response(dispatch(bot.registry(), guild_id, action).await),
        None => nothing_playing(),
    };

    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(response))
        .await?;

    Ok(())
}

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|option| option.name == "query")
        .and_then(|option| option.value.as_str())
        .unwrap_or_default()
        .to_string();

    let request = PlayRequest {
        guild_id: command.guild_id,
        voice_channel: command
            .guild_id
            .and_then(|guild_id| get_user_voice_channel(ctx, guild_id, command.user.id)),
        requester: command
            .member
            .as_ref()
            .map(|member| member.display_name().to_string())
            .unwrap_or_else(|| command.user.name.clone()),
        query,
    };

    let announcer = Arc::new(ChannelAnnouncer::new(ctx.http.clone(), command.channel_id));
    let followup = Arc::new(InteractionFollowUp::new(ctx.http.clone(), command.clone()));

    match bot.jobs.submit_deferred(request, announcer, followup.clone()) {
        Ack::Rejected(message) => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content(message)
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
        Ack::Deferred(_) => {
            let deferred = command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
                )
                .await;
            followup.acknowledged();
            deferred?;
        }
    }

    Ok(())
}

/// Maneja los botones del panel de música
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &MusicBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(action) = ControlAction::from_custom_id(&component.data.custom_id) else {
        debug!("Botón ignorado: {}", component.data.custom_id);
        return Ok(());
    };

    let response = match dispatch(bot.registry(), guild_id, action).await {
        DispatchOutcome::Updated(panel) => CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new()
                .embed(embeds::music_panel(&panel))
                .components(buttons::panel_controls(&panel)),
        ),
        DispatchOutcome::Stopped => CreateInteractionResponse::UpdateMessage(
            CreateInteractionResponseMessage::new()
                .content(STOPPED)
                .embeds(Vec::new())
                .components(Vec::new()),
        ),
        DispatchOutcome::NothingPlaying => CreateInteractionResponse::Message(nothing_playing()),
    };

    component.create_response(&ctx.http, response).await?;

    Ok(())
}

fn control_response(outcome: DispatchOutcome) -> CreateInteractionResponseMessage {
    match outcome {
        DispatchOutcome::Updated(panel) => CreateInteractionResponseMessage::new()
            .embed(embeds::music_panel(&panel))
            .components(buttons::panel_controls(&panel)),
        DispatchOutcome::Stopped => CreateInteractionResponseMessage::new().content(STOPPED),
        DispatchOutcome::NothingPlaying => nothing_playing(),
    }
}

fn nothing_playing() -> CreateInteractionResponseMessage {
    CreateInteractionResponseMessage::new()
        .embed(embeds::error_embed(NOTHING_PLAYING))
        .ephemeral(true)
}

// Funciones auxiliares

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
