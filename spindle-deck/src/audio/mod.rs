//! Audio subsystem seam
//!
//! The deck drives decoding and device output only through the traits
//! here; the concrete engine lives behind [`AudioSystem`]. Failures cross
//! the seam as [`LoadError`]/[`StepError`] and are remapped into the
//! common taxonomy at the state-machine boundary, so the dispatcher and
//! protocol layer never see engine-specific error types.

pub mod backend;

pub use backend::CpalAudio;

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

/// Opaque driver options, passed through to the audio subsystem unmodified
pub type DriverOptions = BTreeMap<String, String>;

/// Numeric id of an output driver, an index into the enumerated devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverId(pub usize);

impl std::fmt::Display for DriverId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of advancing playback by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More audio remains
    Continue,
    /// The track reached end of stream
    Eof,
}

/// Why opening a track failed
#[derive(Error, Debug)]
pub enum LoadError {
    /// The input file could not be opened
    #[error("cannot open input: {0}")]
    OpenInput(#[source] std::io::Error),

    /// The container was unreadable or carried no usable parameters
    #[error("cannot find stream info: {0}")]
    StreamInfo(String),

    /// The requested output device could not be opened
    #[error("cannot open device: {0}")]
    DeviceOpen(String),

    /// The container holds no decodable audio stream
    #[error("cannot find stream")]
    NoStream,

    /// A playback resource could not be allocated
    #[error("cannot allocate playback resources: {0}")]
    Alloc(String),
}

/// Why advancing playback failed
#[derive(Error, Debug)]
pub enum StepError {
    /// The decoder rejected the stream
    #[error("decode error: {0}")]
    Decode(String),

    /// Anything else the engine reports
    #[error("{0}")]
    Other(String),
}

/// An open, decodable track
///
/// Exclusively owned by the deck; dropping the handle unloads the track
/// and releases its output resources.
pub trait TrackHandle: Send {
    /// Decode and emit the next unit of audio
    fn play_frame(&mut self) -> std::result::Result<StepOutcome, StepError>;

    /// Reposition the track to `seconds` from its start
    fn seek(&mut self, seconds: f64) -> std::result::Result<(), StepError>;
}

/// The external decode/output engine
pub trait AudioSystem: Send + Sync {
    /// Open `path` for playback on the given driver
    fn load(
        &self,
        path: &Path,
        driver: DriverId,
        options: &DriverOptions,
    ) -> std::result::Result<Box<dyn TrackHandle>, LoadError>;
}
