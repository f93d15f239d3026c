//! Routes playback controls (buttons and slash commands) to a guild's session.

use serenity::model::id::GuildId;
use tracing::{debug, info};

use crate::{
    audio::{PanelState, SessionRegistry},
    error::MusicError,
    ui::buttons::button_ids,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Skip,
    PauseResume,
    Stop,
    ToggleLoop,
    ToggleShuffle,
}

impl ControlAction {
    /// Traduce el id de un botón; los reservados no tienen acción
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        match custom_id {
            button_ids::SKIP => Some(Self::Skip),
            button_ids::PAUSE_RESUME => Some(Self::PauseResume),
            button_ids::STOP => Some(Self::Stop),
            button_ids::LOOP => Some(Self::ToggleLoop),
            button_ids::SHUFFLE => Some(Self::ToggleShuffle),
            _ => None,
        }
    }

    pub fn from_command_name(name: &str) -> Option<Self> {
        match name {
            "skip" => Some(Self::Skip),
            "pause" => Some(Self::PauseResume),
            "stop" => Some(Self::Stop),
            "loop" => Some(Self::ToggleLoop),
            "shuffle" => Some(Self::ToggleShuffle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    NothingPlaying,
    Stopped,
    /// Estado del panel después de aplicar la acción
    Updated(PanelState),
}

pub const NOTHING_PLAYING: &str = "No hay música sonando en este servidor.";

pub async fn dispatch(
    registry: &SessionRegistry,
    guild_id: GuildId,
    action: ControlAction,
) -> DispatchOutcome {
    let Some(session) = registry.get(guild_id) else {
        debug!("{:?} sin sesión en guild {}", action, guild_id);
        return DispatchOutcome::NothingPlaying;
    };

    let result = match action {
        ControlAction::Stop => {
            info!("⏹️ Deteniendo reproducción en guild {}", guild_id);
            return if registry.release(guild_id).await {
                DispatchOutcome::Stopped
            } else {
                DispatchOutcome::NothingPlaying
            };
        }
        ControlAction::Skip => session.skip().await,
        ControlAction::PauseResume => session.pause_resume().await,
        ControlAction::ToggleLoop => session.toggle_loop().await,
        ControlAction::ToggleShuffle => session.toggle_shuffle().await,
    };

    match result {
        Ok(panel) => DispatchOutcome::Updated(panel),
        Err(MusicError::SessionClosed) => DispatchOutcome::NothingPlaying,
        Err(e) => {
            debug!("Acción {:?} falló en guild {}: {}", action, guild_id, e);
            DispatchOutcome::NothingPlaying
        }
    }
}
