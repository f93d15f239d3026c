//! # Audio Module
//!
//! Playback engine: one session per guild, each owning its queue and voice player.
//!
//! ## Architecture
//!
//! ### [`registry`] - Session Registry
//! - At most one live session per guild
//! - Concurrent first requests share a single voice join
//!
//! ### [`session`] - Guild Session
//! - Actor task fed by commands and transport completions
//! - Track selection, skip of unplayable files, idle auto-disconnect
//!
//! ### [`queue`] - Queue State
//! - FIFO pending tracks plus the current one
//! - Sequential, loop and shuffle modes
//!
//! ### [`transport`] / [`voice`] - Voice Transport
//! - Trait seam for voice connections and players
//! - Songbird implementation

pub mod queue;
pub mod registry;
pub mod session;
pub mod transport;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use registry::SessionRegistry;
pub use session::{Announcer, PanelState, SessionHandle, SessionSettings};
pub use transport::PlayerStatus;
pub use voice::SongbirdGateway;
