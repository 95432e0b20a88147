#![allow(dead_code)]

//! Test helper modules for spindle-deck integration tests
//!
//! Provides reusable test infrastructure:
//! - ScriptedAudio: a scripted stand-in for the audio subsystem
//! - Deck fixtures built on it
//! - WAV/garbage fixture files for exercising the real engine

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use spindle_deck::audio::{
    AudioSystem, DriverId, DriverOptions, LoadError, StepError, StepOutcome, TrackHandle,
};
use spindle_deck::Deck;

/// What the scripted engine answers to one `load`
#[derive(Debug, Clone)]
pub enum ScriptedLoad {
    /// Hand out a track that plays through `steps`, then keeps continuing
    Succeed { steps: Vec<ScriptedStep> },
    /// The input file does not exist
    NotFound,
    /// The container is unreadable
    CorruptFile,
    /// The output device cannot be opened
    DeviceFails,
}

/// What a scripted track answers to one `play_frame`
#[derive(Debug, Clone, Copy)]
pub enum ScriptedStep {
    Continue,
    Eof,
    DecodeError,
    OtherError,
}

/// Scripted audio subsystem
///
/// Loads are answered from a queue; when the queue runs dry every load
/// succeeds with an endlessly-continuing track.
pub struct ScriptedAudio {
    loads: Mutex<VecDeque<ScriptedLoad>>,
    load_calls: AtomicUsize,
    seeks: Arc<Mutex<Vec<f64>>>,
}

impl ScriptedAudio {
    /// Every load succeeds with a track that never ends
    pub fn always_ok() -> Arc<Self> {
        Self::with_loads(Vec::new())
    }

    /// Answer loads from `loads` in order, then fall back to success
    pub fn with_loads(loads: Vec<ScriptedLoad>) -> Arc<Self> {
        Arc::new(Self {
            loads: Mutex::new(loads.into()),
            load_calls: AtomicUsize::new(0),
            seeks: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// How many times `load` was invoked
    pub fn load_count(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Seek positions recorded across all handed-out tracks
    pub fn recorded_seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }
}

impl AudioSystem for ScriptedAudio {
    fn load(
        &self,
        _path: &Path,
        _driver: DriverId,
        _options: &DriverOptions,
    ) -> Result<Box<dyn TrackHandle>, LoadError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .loads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedLoad::Succeed { steps: Vec::new() });

        match script {
            ScriptedLoad::Succeed { steps } => Ok(Box::new(ScriptedTrack {
                steps: steps.into(),
                seeks: Arc::clone(&self.seeks),
            })),
            ScriptedLoad::NotFound => Err(LoadError::OpenInput(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such file",
            ))),
            ScriptedLoad::CorruptFile => {
                Err(LoadError::StreamInfo("malformed container".to_string()))
            }
            ScriptedLoad::DeviceFails => {
                Err(LoadError::DeviceOpen("device is busy".to_string()))
            }
        }
    }
}

struct ScriptedTrack {
    steps: VecDeque<ScriptedStep>,
    seeks: Arc<Mutex<Vec<f64>>>,
}

impl TrackHandle for ScriptedTrack {
    fn play_frame(&mut self) -> Result<StepOutcome, StepError> {
        match self.steps.pop_front().unwrap_or(ScriptedStep::Continue) {
            ScriptedStep::Continue => Ok(StepOutcome::Continue),
            ScriptedStep::Eof => Ok(StepOutcome::Eof),
            ScriptedStep::DecodeError => Err(StepError::Decode("truncated frame".to_string())),
            ScriptedStep::OtherError => Err(StepError::Other("engine hiccup".to_string())),
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<(), StepError> {
        self.seeks.lock().unwrap().push(seconds);
        Ok(())
    }
}

/// A deck over the given engine, still in the pre-init state
pub fn void_deck(audio: Arc<ScriptedAudio>) -> Deck {
    Deck::new(audio, DriverId(0), DriverOptions::new(), 16)
}

/// A deck over the given engine, ejected and ready for commands
pub fn ready_deck(audio: Arc<ScriptedAudio>) -> Deck {
    let deck = void_deck(audio);
    deck.eject().expect("initial eject failed");
    deck
}

/// Write a short stereo sine-wave WAV under `dir`
pub fn write_sine_wav(dir: &Path, name: &str, seconds: f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
    let frames = (44100.0 * seconds) as usize;
    for n in 0..frames {
        let t = n as f32 / 44100.0;
        let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
        let amplitude = (sample * i16::MAX as f32 * 0.25) as i16;
        writer.write_sample(amplitude).expect("write sample");
        writer.write_sample(amplitude).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
    path
}

/// Write a file that is certainly not audio under `dir`
///
/// ASCII only, so no MP3 sync word can be found in it by accident.
pub fn write_garbage_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create garbage file");
    for _ in 0..64 {
        file.write_all(b"this is definitely not an audio container\n")
            .expect("write garbage");
    }
    path
}
