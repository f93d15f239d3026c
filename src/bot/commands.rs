use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Comandos slash del bot
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        skip_command(),
        pause_command(),
        stop_command(),
        loop_command(),
        shuffle_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción desde una URL o búsqueda")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa o reanuda la reproducción")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la música y sale del canal de voz")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Activa o desactiva la repetición de la canción actual")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Activa o desactiva el orden aleatorio")
}
