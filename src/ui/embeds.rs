use serenity::builder::{CreateEmbed, CreateEmbedFooter};
use std::time::Duration;

use crate::audio::PanelState;

/// Paleta de colores del bot
pub mod colors {
    use serenity::all::Colour;

    pub const PANEL_BLUE: Colour = Colour::from_rgb(0, 153, 255);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

fn flag(enabled: bool) -> &'static str {
    if enabled {
        "✅"
    } else {
        "❌"
    }
}

pub fn panel_footer(panel: &PanelState) -> String {
    format!(
        "Loop: {} | Shuffle: {}",
        flag(panel.looping),
        flag(panel.shuffling)
    )
}

/// Panel de la canción actual
pub fn music_panel(panel: &PanelState) -> CreateEmbed {
    let embed = CreateEmbed::new()
        .title("🎶 MUSIC PANEL")
        .color(colors::PANEL_BLUE)
        .footer(CreateEmbedFooter::new(panel_footer(panel)));

    let Some(track) = &panel.current else {
        return embed
            .description("No hay música sonando.")
            .color(colors::NEUTRAL_GRAY);
    };

    let mut embed = embed
        .description(format!("[{}]({})", track.title, track.source_url))
        .field("👤 Solicitado por", &track.requested_by, true)
        .field("⏱️ Duración", &track.duration, true)
        .field("🎤 Autor", &track.author, true);

    if panel.pending > 0 {
        embed = embed.field("📜 En cola", panel.pending.to_string(), true);
    }

    embed
}

pub fn queue_empty_message(idle_timeout: Option<Duration>) -> String {
    match idle_timeout {
        Some(timeout) => format!(
            "📭 La cola está vacía. Me desconectaré en {} si nadie agrega música.",
            humantime::format_duration(timeout)
        ),
        None => "📭 La cola está vacía.".to_string(),
    }
}

pub fn error_embed(message: &str) -> CreateEmbed {
    CreateEmbed::new()
        .description(format!("❌ {}", message))
        .color(colors::ERROR_RED)
}
