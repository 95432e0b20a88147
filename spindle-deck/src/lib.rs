//! # Spindle Deck Daemon (spindle-deck)
//!
//! Playback-control daemon for one audio deck.
//!
//! **Purpose:** Accept line-based commands on the control channel, drive
//! the deck lifecycle (load, play, stop, eject, seek, quit), and hand
//! decoding and device output to the audio subsystem behind a trait seam.
//!
//! **Architecture:** A command dispatcher over a fixed table, a mutex-
//! guarded state machine publishing transitions to a broadcast event bus,
//! and a cooperative main loop interleaving command handling with
//! playback advancement. Default engine: symphonia + cpal.

pub mod audio;
pub mod cmd;
pub mod config;
pub mod player;
pub mod response;
pub mod run;

pub use config::Config;
pub use player::Deck;
