//! # Spindle Common Library
//!
//! Shared code for the spindle playback-control daemon:
//! - Error taxonomy with blame classification (Error, ErrorKind, Blame)
//! - Deck event types and the broadcast event bus (DeckEvent, EventBus)

pub mod error;
pub mod events;

pub use error::{Blame, Error, ErrorKind, Result};
pub use events::{DeckEvent, EventBus, PlayerState};
