//! Discord presentation: the music panel embed and its control buttons.

pub mod buttons;
pub mod embeds;
