use dashmap::DashMap;
use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, error, info};

use crate::{
    audio::{
        session::{spawn_session, Announcer, SessionExit, SessionHandle, SessionSettings},
        transport::VoiceGateway,
    },
    error::{MusicError, MusicResult},
    storage::FileStore,
};

type SessionSlot = Arc<OnceCell<SessionHandle>>;

/// Sesiones activas, como mucho una por servidor
pub struct SessionRegistry {
    sessions: Arc<DashMap<GuildId, SessionSlot>>,
    gateway: Arc<dyn VoiceGateway>,
    store: Arc<FileStore>,
    settings: SessionSettings,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(
        gateway: Arc<dyn VoiceGateway>,
        store: Arc<FileStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            gateway,
            store,
            settings,
            next_id: AtomicU64::new(1),
        }
    }

    /// Devuelve la sesión del servidor, uniéndose a `channel_id` si no hay.
    ///
    /// Llamadas concurrentes para el mismo servidor comparten una sola
    /// conexión. Una sesión ya conectada conserva su canal y su anunciador.
    pub async fn acquire(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        announcer: Arc<dyn Announcer>,
    ) -> MusicResult<SessionHandle> {
        let slot = loop {
            let slot = self.sessions.entry(guild_id).or_default().clone();

            match slot.get() {
                // Sesión terminada cuyo registro aún no se limpió
                Some(handle) if !handle.is_alive() => {
                    self.sessions
                        .remove_if(&guild_id, |_, current| Arc::ptr_eq(current, &slot));
                }
                _ => break slot,
            }
        };

        let result = slot
            .get_or_try_init(|| self.open(guild_id, channel_id, announcer))
            .await
            .cloned();

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                self.sessions.remove_if(&guild_id, |_, current| {
                    Arc::ptr_eq(current, &slot) && current.get().is_none()
                });
                return Err(e);
            }
        };

        // Un stop pudo llegar mientras nos conectábamos
        let still_registered = self
            .sessions
            .get(&guild_id)
            .is_some_and(|current| Arc::ptr_eq(current.value(), &slot));
        if !still_registered {
            debug!("Sesión {} descartada: se detuvo durante la conexión", handle.id());
            let _ = handle.stop().await;
            return Err(MusicError::SessionClosed);
        }

        Ok(handle)
    }

    async fn open(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        announcer: Arc<dyn Announcer>,
    ) -> MusicResult<SessionHandle> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let player = self
            .gateway
            .join(guild_id, channel_id, events_tx)
            .await
            .inspect_err(|e| error!("❌ No se pudo unir al canal de voz en guild {}: {}", guild_id, e))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, task) = spawn_session(
            id,
            guild_id,
            player,
            events_rx,
            self.store.clone(),
            announcer,
            self.settings,
        );

        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let exit = match task.await {
                Ok(exit) => exit,
                Err(e) => {
                    error!("❌ La sesión {} de guild {} falló: {}", id, guild_id, e);
                    SessionExit::Stopped
                }
            };

            // Solo se quita a sí misma, nunca a una sesión más nueva
            sessions.remove_if(&guild_id, |_, slot| {
                slot.get().is_some_and(|handle| handle.id() == id)
            });
            debug!("Sesión {} de guild {} terminó: {:?}", id, guild_id, exit);
        });

        info!("✅ Sesión {} creada para guild {}", id, guild_id);
        Ok(handle)
    }

    /// Sesión viva del servidor, si existe
    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions
            .get(&guild_id)
            .and_then(|slot| slot.get().cloned())
            .filter(SessionHandle::is_alive)
    }

    /// Quita la sesión del servidor y espera a que se detenga.
    /// Devuelve `false` si no había nada que detener.
    pub async fn release(&self, guild_id: GuildId) -> bool {
        let Some((_, slot)) = self.sessions.remove(&guild_id) else {
            return false;
        };

        Self::stop_slot(slot).await
    }

    /// Libera la sesión solo si su conexión de voz ya no existe.
    ///
    /// Discord avisa tarde de las salidas propias (`/stop`, inactividad); una
    /// sesión abierta después sigue conectada y no se toca.
    pub async fn release_if_disconnected(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.get(guild_id) else {
            return false;
        };

        if self.gateway.is_connected(guild_id).await {
            debug!(
                "Aviso de desconexión ignorado: la sesión {} sigue conectada en guild {}",
                handle.id(),
                guild_id
            );
            return false;
        }

        let id = handle.id();
        let Some((_, slot)) = self.sessions.remove_if(&guild_id, |_, slot| {
            slot.get().is_some_and(|current| current.id() == id)
        }) else {
            return false;
        };

        Self::stop_slot(slot).await
    }

    async fn stop_slot(slot: SessionSlot) -> bool {
        match slot.get() {
            Some(handle) => handle.stop().await.is_ok(),
            None => false,
        }
    }

    /// Detiene todas las sesiones al cerrar el proceso
    pub async fn shutdown(&self) {
        let guilds: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        if guilds.is_empty() {
            return;
        }

        info!("🛑 Cerrando {} sesiones de voz", guilds.len());
        join_all(guilds.into_iter().map(|guild_id| self.release(guild_id))).await;
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
