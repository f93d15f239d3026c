use async_trait::async_trait;
use serenity::{
    builder::{CreateInteractionResponseFollowup, CreateMessage},
    http::Http,
    model::{application::CommandInteraction, id::ChannelId},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Notify;
use tracing::{error, warn};

use crate::{
    audio::{Announcer, PanelState},
    bot::jobs::FollowUp,
    ui::{buttons, embeds},
};

/// Publica el panel y avisos de la sesión en el canal de texto del comando
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }

    async fn say(&self, content: String) {
        if let Err(e) = self.channel_id.say(&self.http, content).await {
            error!("Error al enviar mensaje al canal {}: {:?}", self.channel_id, e);
        }
    }
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn now_playing(&self, panel: &PanelState) {
        let message = CreateMessage::new()
            .embed(embeds::music_panel(panel))
            .components(buttons::panel_controls(panel));

        if let Err(e) = self.channel_id.send_message(&self.http, message).await {
            error!("Error al enviar panel de música: {:?}", e);
        }
    }

    async fn queue_empty(&self, idle_timeout: Option<Duration>) {
        self.say(embeds::queue_empty_message(idle_timeout)).await;
    }

    async fn idle_disconnect(&self) {
        self.say("👋 Me desconecté por inactividad.".to_string())
            .await;
    }
}

/// Cuánto espera un follow-up a que la respuesta diferida llegue a Discord
const ACK_WAIT: Duration = Duration::from_secs(3);

/// Follow-up de un comando diferido. Espera a que la respuesta inicial
/// se haya enviado antes de publicar.
pub struct InteractionFollowUp {
    http: Arc<Http>,
    interaction: CommandInteraction,
    acknowledged: Notify,
}

impl InteractionFollowUp {
    pub fn new(http: Arc<Http>, interaction: CommandInteraction) -> Self {
        Self {
            http,
            interaction,
            acknowledged: Notify::new(),
        }
    }

    /// Se llama cuando la respuesta diferida se envió (o falló)
    pub fn acknowledged(&self) {
        self.acknowledged.notify_one();
    }
}

#[async_trait]
impl FollowUp for InteractionFollowUp {
    async fn send(&self, content: String) {
        if tokio::time::timeout(ACK_WAIT, self.acknowledged.notified())
            .await
            .is_err()
        {
            warn!("La respuesta diferida no se confirmó a tiempo");
        }

        let followup = CreateInteractionResponseFollowup::new().content(content);
        if let Err(e) = self.interaction.create_followup(&self.http, followup).await {
            error!("Error al enviar follow-up: {:?}", e);
        }
    }
}
