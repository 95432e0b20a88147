//! Deck state machine
//!
//! The [`Deck`] is the single source of truth for playback state: the
//! lifecycle state, the selected output driver, and the exclusively
//! owned handle to the loaded track all live here, behind one mutex.
//! Every transition is validated against the current state, applied
//! under the lock, and published to the event bus while the lock is
//! still held, so subscribers observe transitions whole and in order.
//!
//! Slow engine work never runs under the lock: `load` talks to the
//! audio subsystem before taking the lock for the final state flip, and
//! `update` checks the handle out, advances it unlocked, and puts it
//! back (or honors whatever transition intervened).

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use spindle_common::{DeckEvent, Error, EventBus, PlayerState, Result};

use crate::audio::{AudioSystem, DriverId, DriverOptions, LoadError, StepError, StepOutcome, TrackHandle};

/// The deck: one loaded-or-not track and its playback state
pub struct Deck {
    inner: Mutex<DeckInner>,
    events: EventBus,
    audio: Arc<dyn AudioSystem>,
    driver: DriverId,
    options: DriverOptions,
}

struct DeckInner {
    state: PlayerState,
    track: Option<Box<dyn TrackHandle>>,
}

impl Deck {
    /// Create a deck in the pre-initialization state
    ///
    /// The caller is expected to `eject` once before accepting commands.
    pub fn new(
        audio: Arc<dyn AudioSystem>,
        driver: DriverId,
        options: DriverOptions,
        event_capacity: usize,
    ) -> Self {
        Self {
            inner: Mutex::new(DeckInner {
                state: PlayerState::Void,
                track: None,
            }),
            events: EventBus::new(event_capacity),
            audio,
            driver,
            options,
        }
    }

    /// Current state, read whole
    pub fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    /// Whether the deck currently owns a loaded track handle
    pub fn track_loaded(&self) -> bool {
        self.inner.lock().track.is_some()
    }

    /// Subscribe to deck events
    ///
    /// The subscription is durable: every transition applied after this
    /// call is delivered, bounded by the bus capacity. A subscriber that
    /// falls behind sees a lag error rather than silent loss.
    pub fn subscribe(&self) -> broadcast::Receiver<DeckEvent> {
        self.events.subscribe()
    }

    /// Unload any owned track and return to `Ejected`
    ///
    /// Ejecting while ejected is harmless and common.
    pub fn eject(&self) -> Result<()> {
        let unloaded = {
            let mut inner = self.inner.lock();
            match inner.state {
                PlayerState::Stopped | PlayerState::Playing | PlayerState::Void => {
                    let unloaded = inner.track.take();
                    self.set_state(&mut inner, PlayerState::Ejected);
                    unloaded
                }
                PlayerState::Ejected => None,
                PlayerState::ShuttingDown => {
                    return Err(Error::BadState("player is shutting down"))
                }
            }
        };
        // Unloading tears down the output stream; keep it off the lock.
        drop(unloaded);
        debug!("player ejected");
        Ok(())
    }

    /// Begin advancing the loaded track
    pub fn play(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            PlayerState::Stopped => {
                self.set_state(&mut inner, PlayerState::Playing);
                Ok(())
            }
            PlayerState::Playing => Err(Error::BadState("already playing")),
            PlayerState::Ejected => Err(Error::BadState("nothing loaded")),
            PlayerState::Void => Err(Error::BadState("must eject before playing")),
            PlayerState::ShuttingDown => Err(Error::BadState("player is shutting down")),
        }
    }

    /// Stop advancing the loaded track
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            PlayerState::Playing => {
                self.set_state(&mut inner, PlayerState::Stopped);
                Ok(())
            }
            PlayerState::Stopped => Err(Error::BadState("already stopped")),
            PlayerState::Ejected => Err(Error::BadState("can't stop - nothing loaded")),
            PlayerState::Void => Err(Error::BadState("must eject before stopping")),
            PlayerState::ShuttingDown => Err(Error::BadState("player is shutting down")),
        }
    }

    /// Load `path`, leaving the deck `Stopped` on success
    ///
    /// Always ejects first, so no stale handle survives; on any engine
    /// failure the deck is re-ejected and left clean.
    pub fn load(&self, path: &Path) -> Result<()> {
        self.eject()?;

        debug!(path = %path.display(), "loading track");
        match self.audio.load(path, self.driver, &self.options) {
            Ok(track) => {
                let mut inner = self.inner.lock();
                if inner.state != PlayerState::Ejected {
                    // A shutdown intervened while the engine was opening
                    // the file; honor it and discard the fresh handle.
                    drop(inner);
                    drop(track);
                    return Err(Error::BadState("player is shutting down"));
                }
                inner.track = Some(track);
                self.set_state(&mut inner, PlayerState::Stopped);
                drop(inner);
                self.events.emit_lossy(DeckEvent::TrackLoaded {
                    path: path.display().to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            Err(err) => {
                let mapped = map_load_error(err, path);
                // Guarantee a clean ejected deck after a failed load.
                let _ = self.eject();
                Err(mapped)
            }
        }
    }

    /// Reposition the loaded track to `seconds` from its start
    pub fn seek(&self, seconds: f64) -> Result<()> {
        let mut track = {
            let mut inner = self.inner.lock();
            match inner.state {
                PlayerState::Stopped | PlayerState::Playing => match inner.track.take() {
                    Some(track) => track,
                    None => unreachable!("deck is {} with no loaded track", inner.state),
                },
                PlayerState::Ejected | PlayerState::Void => {
                    return Err(Error::BadState("nothing loaded"))
                }
                PlayerState::ShuttingDown => {
                    return Err(Error::BadState("player is shutting down"))
                }
            }
        };

        let outcome = track.seek(seconds);
        self.restore_track(track);
        outcome.map_err(map_step_error)
    }

    /// Advance playback by one step; no-op unless `Playing`
    ///
    /// End of stream ejects silently (normal completion, published as a
    /// TrackFinished event); a decode failure ejects and reports.
    pub fn update(&self) -> Result<()> {
        let mut track = {
            let mut inner = self.inner.lock();
            if inner.state != PlayerState::Playing {
                return Ok(());
            }
            match inner.track.take() {
                Some(track) => track,
                // A playing deck with no handle is a broken invariant,
                // not a recoverable failure.
                None => unreachable!("deck is playing with no loaded track"),
            }
        };

        match track.play_frame() {
            Ok(StepOutcome::Continue) => {
                self.restore_track(track);
                Ok(())
            }
            Ok(StepOutcome::Eof) => {
                drop(track);
                self.eject_after_playback();
                self.events.emit_lossy(DeckEvent::TrackFinished {
                    timestamp: chrono::Utc::now(),
                });
                debug!("track finished");
                Ok(())
            }
            Err(err) => {
                drop(track);
                self.eject_after_playback();
                Err(map_step_error(err))
            }
        }
    }

    /// Eject, then enter the terminal state unconditionally
    ///
    /// The eject result is propagated but never blocks the transition.
    pub fn shutdown(&self) -> Result<()> {
        let result = self.eject();
        let mut inner = self.inner.lock();
        self.set_state(&mut inner, PlayerState::ShuttingDown);
        result
    }

    /// Put a checked-out handle back, unless a transition intervened
    fn restore_track(&self, track: Box<dyn TrackHandle>) {
        let mut inner = self.inner.lock();
        match inner.state {
            PlayerState::Stopped | PlayerState::Playing if inner.track.is_none() => {
                inner.track = Some(track);
            }
            _ => {
                // An eject or shutdown won the race; the handle goes.
                drop(inner);
                drop(track);
            }
        }
    }

    /// Return to `Ejected` after the playing track ended or failed
    fn eject_after_playback(&self) {
        let mut inner = self.inner.lock();
        if inner.state == PlayerState::Playing {
            self.set_state(&mut inner, PlayerState::Ejected);
        }
    }

    /// Apply a state change and publish it, lock held
    fn set_state(&self, inner: &mut DeckInner, new_state: PlayerState) {
        let old_state = inner.state;
        inner.state = new_state;
        if old_state != new_state {
            debug!(%old_state, %new_state, "deck state changed");
            self.events.emit_lossy(DeckEvent::StateChanged {
                old_state,
                new_state,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

/// Remap engine load failures into the common taxonomy
fn map_load_error(err: LoadError, path: &Path) -> Error {
    match err {
        LoadError::OpenInput(_) => Error::NoFile(path.display().to_string()),
        LoadError::StreamInfo(reason) => Error::BadFile(format!("can't find stream info: {reason}")),
        LoadError::DeviceOpen(reason) => Error::BadFile(format!("can't open device: {reason}")),
        LoadError::NoStream => Error::BadFile("can't find stream".to_string()),
        LoadError::Alloc(reason) => Error::NoMem(reason),
    }
}

/// Remap engine step failures into the common taxonomy
fn map_step_error(err: StepError) -> Error {
    match err {
        StepError::Decode(reason) => Error::BadFile(format!("decode error: {reason}")),
        StepError::Other(reason) => Error::Unknown(reason),
    }
}
