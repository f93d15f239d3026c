use rand::Rng;
use std::collections::VecDeque;
use tracing::info;

use crate::sources::Track;

/// Modo de reproducción; loop y shuffle nunca están activos a la vez
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueMode {
    #[default]
    Sequential,
    /// Repite la canción actual
    Loop,
    /// Elige al azar entre las pendientes
    Shuffle,
}

/// Resultado de un paso de selección
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    /// Track que salió de `current`; hay que liberar su archivo
    pub retired: Option<Track>,
    /// Track que pasa a ser `current`
    pub next: Option<Track>,
}

/// Cola de un servidor: pendientes en orden FIFO más la canción actual
#[derive(Debug, Default)]
pub struct GuildQueue {
    pending: VecDeque<Track>,
    current: Option<Track>,
    mode: QueueMode,
    autoplay: bool,
}

impl GuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un track al final de la cola.
    ///
    /// Devuelve su posición: `0` si empieza a sonar ya, si no su lugar
    /// (desde 1) entre las pendientes. Sin `current`, la cabeza de la cola
    /// empieza en el siguiente `advance`.
    pub fn enqueue(&mut self, track: Track) -> usize {
        let position = if self.current.is_none() {
            self.pending.len()
        } else {
            self.pending.len() + 1
        };

        info!("➕ Agregado a la cola: {}", track.title);
        self.pending.push_back(track);
        position
    }

    /// Elige el siguiente track según el modo.
    ///
    /// En loop con una canción actual, se repite y no se retira nada. Si no,
    /// `current` se retira y lo reemplaza una pendiente al azar (shuffle) o
    /// la cabeza de la cola.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Advance {
        if self.mode == QueueMode::Loop {
            if let Some(current) = &self.current {
                info!("🔂 Repitiendo: {}", current.title);
                return Advance {
                    retired: None,
                    next: Some(current.clone()),
                };
            }
        }

        let retired = self.current.take();

        let next = if self.mode == QueueMode::Shuffle && !self.pending.is_empty() {
            let index = rng.gen_range(0..self.pending.len());
            self.pending.remove(index)
        } else {
            self.pending.pop_front()
        };

        match &next {
            Some(track) => info!("➡️ Siguiente: {}", track.title),
            None => info!("📭 Cola vacía, no hay siguiente track"),
        }

        self.current = next.clone();
        Advance { retired, next }
    }

    /// Quita la canción actual sin elegir otra
    pub fn take_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    /// Vacía las pendientes; devuelve cuántas había
    pub fn clear_pending(&mut self) -> usize {
        let cleared = self.pending.len();
        self.pending.clear();
        if cleared > 0 {
            info!("🗑️ Cola limpiada ({} canciones)", cleared);
        }
        cleared
    }

    pub fn toggle_loop(&mut self) -> bool {
        self.mode = if self.mode == QueueMode::Loop {
            QueueMode::Sequential
        } else {
            QueueMode::Loop
        };
        info!("🔁 Modo: {:?}", self.mode);
        self.is_looping()
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        self.mode = if self.mode == QueueMode::Shuffle {
            QueueMode::Sequential
        } else {
            QueueMode::Shuffle
        };
        info!("🔀 Modo: {:?}", self.mode);
        self.is_shuffling()
    }

    #[cfg(test)]
    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    pub fn is_looping(&self) -> bool {
        self.mode == QueueMode::Loop
    }

    pub fn is_shuffling(&self) -> bool {
        self.mode == QueueMode::Shuffle
    }

    /// Reservado: nunca se activa
    pub fn is_autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    #[cfg(test)]
    pub fn pending(&self) -> impl Iterator<Item = &Track> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
