use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

use crate::audio::{PanelState, PlayerStatus};

/// IDs de los botones del panel
pub mod button_ids {
    pub const SKIP: &str = "skip";
    pub const PAUSE_RESUME: &str = "pause_resume";
    pub const STOP: &str = "stop";
    pub const LOOP: &str = "loop";
    pub const SHUFFLE: &str = "shuffle";

    // Reservados, siempre deshabilitados
    pub const VOLUME_DOWN: &str = "volume_down";
    pub const BACK: &str = "back";
    pub const VOLUME_UP: &str = "volume_up";
    pub const AUTOPLAY: &str = "autoplay";
    pub const PLAYLIST: &str = "playlist";
}

/// "Pausar" mientras algo suena, "Reanudar" en otro caso
pub fn pause_resume_label(status: PlayerStatus) -> &'static str {
    if status == PlayerStatus::Playing {
        "Pause"
    } else {
        "Resume"
    }
}

fn toggle_style(active: bool) -> ButtonStyle {
    if active {
        ButtonStyle::Success
    } else {
        ButtonStyle::Secondary
    }
}

/// Dos filas de controles para el panel de música
pub fn panel_controls(panel: &PanelState) -> Vec<CreateActionRow> {
    let playback_row = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::VOLUME_DOWN)
            .label("Down")
            .style(ButtonStyle::Secondary)
            .disabled(true),
        CreateButton::new(button_ids::BACK)
            .label("Back")
            .style(ButtonStyle::Secondary)
            .disabled(true),
        CreateButton::new(button_ids::PAUSE_RESUME)
            .label(pause_resume_label(panel.status))
            .style(ButtonStyle::Primary),
        CreateButton::new(button_ids::SKIP)
            .label("Skip")
            .style(ButtonStyle::Secondary),
        CreateButton::new(button_ids::VOLUME_UP)
            .label("Up")
            .style(ButtonStyle::Secondary)
            .disabled(true),
    ]);

    let mode_row = CreateActionRow::Buttons(vec![
        CreateButton::new(button_ids::SHUFFLE)
            .label("Shuffle")
            .style(toggle_style(panel.shuffling)),
        CreateButton::new(button_ids::LOOP)
            .label("Loop")
            .style(toggle_style(panel.looping)),
        CreateButton::new(button_ids::STOP)
            .label("Stop")
            .style(ButtonStyle::Danger),
        CreateButton::new(button_ids::AUTOPLAY)
            .label("AutoPlay")
            .style(toggle_style(panel.autoplay))
            .disabled(true),
        CreateButton::new(button_ids::PLAYLIST)
            .label("Playlist")
            .style(ButtonStyle::Secondary)
            .disabled(true),
    ]);

    vec![playback_row, mode_row]
}
