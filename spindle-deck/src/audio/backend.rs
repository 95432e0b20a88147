//! Default audio engine: symphonia decode, cpal output
//!
//! `load` runs in stages and each stage maps to its own [`LoadError`]:
//! open the input file, probe the container, select a decodable stream,
//! build the decoder, then open the output device. Probing happens before
//! any device work, so file errors are reportable on machines with no
//! usable audio output at all.
//!
//! The cpal stream is not `Send`, so the device is opened and the stream
//! owned by a dedicated output thread; the track handle keeps the
//! producer half of a lock-free ring buffer and feeds it one decode step
//! at a time. Dropping the handle stops the thread and tears the stream
//! down immediately.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tracing::{debug, info, warn};

use spindle_common::{Error, Result};

use super::{AudioSystem, DriverId, DriverOptions, LoadError, StepError, StepOutcome, TrackHandle};

/// Ring capacity in seconds of interleaved audio
///
/// Each `play_frame` tops the ring up, so this bounds both the decode
/// work per step and the audio cut off by an eject.
const RING_SECONDS: f64 = 0.5;

/// Default audio engine
pub struct CpalAudio;

impl CpalAudio {
    /// Initialise the audio backend
    ///
    /// Verifies that the host can enumerate output devices at all;
    /// device selection itself happens per load.
    pub fn init() -> Result<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map_err(|e| Error::AudioInit(format!("cannot enumerate output devices: {e}")))?;
        debug!(host = ?host.id(), "audio backend initialised");
        Ok(Self)
    }

    /// List output device names; a device's position is its driver id
    pub fn devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| Error::AudioInit(format!("cannot enumerate output devices: {e}")))?
            .map(|device| device.name().unwrap_or_else(|_| "unknown".to_string()))
            .collect();
        Ok(devices)
    }
}

impl AudioSystem for CpalAudio {
    fn load(
        &self,
        path: &Path,
        driver: DriverId,
        options: &DriverOptions,
    ) -> std::result::Result<Box<dyn TrackHandle>, LoadError> {
        let file = File::open(path).map_err(LoadError::OpenInput)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::StreamInfo(e.to_string()))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoStream)?;
        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| LoadError::StreamInfo("sample rate not found".to_string()))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| LoadError::StreamInfo("channel count not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::StreamInfo(format!("unsupported codec: {e}")))?;

        let buffer_frames = parse_options(options)?;

        let capacity = (sample_rate as f64 * channels as f64 * RING_SECONDS) as usize;
        let rb = HeapRb::<f32>::new(capacity.max(1024));
        let (producer, consumer) = rb.split();

        let stop = Arc::new(AtomicBool::new(false));
        let flush = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let output = thread::Builder::new()
            .name("spindle-output".to_string())
            .spawn({
                let stop = Arc::clone(&stop);
                let flush = Arc::clone(&flush);
                move || {
                    output_thread(
                        driver,
                        channels,
                        sample_rate,
                        buffer_frames,
                        consumer,
                        stop,
                        flush,
                        ready_tx,
                    )
                }
            })
            .map_err(|e| LoadError::Alloc(format!("cannot spawn output thread: {e}")))?;

        // The thread reports once the stream is running (or why it is not).
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = output.join();
                return Err(LoadError::DeviceOpen(reason));
            }
            Err(_) => {
                let _ = output.join();
                return Err(LoadError::DeviceOpen(
                    "output thread exited before the stream came up".to_string(),
                ));
            }
        }

        info!(
            path = %path.display(),
            driver = %driver,
            sample_rate,
            channels,
            "track opened"
        );

        Ok(Box::new(SymphoniaTrack {
            format,
            decoder,
            track_id,
            producer,
            leftover: Vec::new(),
            exhausted: false,
            stop,
            flush,
            output: Some(output),
        }))
    }
}

/// Interpret the opaque driver options this engine understands
fn parse_options(options: &DriverOptions) -> std::result::Result<Option<u32>, LoadError> {
    let mut buffer_frames = None;
    for (key, value) in options {
        match key.as_str() {
            "buffer_frames" => {
                let frames = value.parse::<u32>().map_err(|_| {
                    LoadError::DeviceOpen(format!("bad buffer_frames option: {value}"))
                })?;
                buffer_frames = Some(frames);
            }
            _ => debug!(option = %key, "ignoring unknown driver option"),
        }
    }
    Ok(buffer_frames)
}

/// Owns the cpal stream for one loaded track
///
/// Runs until the stop flag is set; on underrun the callback emits
/// silence rather than blocking the audio thread.
#[allow(clippy::too_many_arguments)]
fn output_thread(
    driver: DriverId,
    channels: u16,
    sample_rate: u32,
    buffer_frames: Option<u32>,
    mut consumer: HeapCons<f32>,
    stop: Arc<AtomicBool>,
    flush: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<std::result::Result<(), String>>,
) {
    let host = cpal::default_host();

    let device = match host.output_devices() {
        Ok(mut devices) => match devices.nth(driver.0) {
            Some(device) => device,
            None => {
                let _ = ready_tx.send(Err(format!("no output device with id {driver}")));
                return;
            }
        },
        Err(e) => {
            let _ = ready_tx.send(Err(format!("cannot enumerate output devices: {e}")));
            return;
        }
    };

    let supported = match device.supported_output_configs() {
        Ok(configs) => configs,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("cannot query device configs: {e}")));
            return;
        }
    };

    // No resampling: the device must take the track's native rate.
    let usable = supported.into_iter().find(|c| {
        c.channels() == channels
            && c.sample_format() == SampleFormat::F32
            && c.min_sample_rate().0 <= sample_rate
            && c.max_sample_rate().0 >= sample_rate
    });
    let Some(config) = usable else {
        let _ = ready_tx.send(Err(format!(
            "device does not support {channels}-channel f32 output at {sample_rate} Hz"
        )));
        return;
    };

    let mut config = config.with_sample_rate(SampleRate(sample_rate)).config();
    if let Some(frames) = buffer_frames {
        config.buffer_size = BufferSize::Fixed(frames);
        debug!("using requested buffer size: {} frames", frames);
    }

    let stream = match device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if flush.swap(false, Ordering::Relaxed) {
                consumer.clear();
            }
            let read = consumer.pop_slice(data);
            data[read..].fill(0.0);
        },
        |err| warn!("audio stream error: {err}"),
        None,
    ) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("cannot build output stream: {e}")));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("cannot start output stream: {e}")));
        return;
    }

    let _ = ready_tx.send(Ok(()));
    debug!(driver = %driver, "output stream running");

    while !stop.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    debug!("output stream closed");
}

/// An open track: symphonia reader/decoder plus the feed side of the ring
struct SymphoniaTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    producer: HeapProd<f32>,
    /// Decoded samples the ring had no room for on the previous step
    leftover: Vec<f32>,
    /// Decoder hit end of stream; drain the ring before reporting eof
    exhausted: bool,
    stop: Arc<AtomicBool>,
    flush: Arc<AtomicBool>,
    output: Option<thread::JoinHandle<()>>,
}

impl TrackHandle for SymphoniaTrack {
    fn play_frame(&mut self) -> std::result::Result<StepOutcome, StepError> {
        if !self.leftover.is_empty() {
            let pushed = self.producer.push_slice(&self.leftover);
            self.leftover.drain(..pushed);
            if !self.leftover.is_empty() {
                // Ring still full; nothing more to do this step.
                return Ok(StepOutcome::Continue);
            }
        }

        while !self.exhausted && self.producer.vacant_len() > 0 {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("reached end of stream");
                    self.exhausted = true;
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.exhausted = true;
                    break;
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    return Err(StepError::Decode(e.to_string()));
                }
                Err(e) => return Err(StepError::Other(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    return Err(StepError::Decode(e.to_string()));
                }
                Err(e) => return Err(StepError::Other(e.to_string())),
            };

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
            sample_buf.copy_interleaved_ref(decoded);
            let samples = sample_buf.samples();

            let pushed = self.producer.push_slice(samples);
            if pushed < samples.len() {
                self.leftover.extend_from_slice(&samples[pushed..]);
                break;
            }
        }

        if self.exhausted && self.leftover.is_empty() && self.producer.occupied_len() == 0 {
            return Ok(StepOutcome::Eof);
        }
        Ok(StepOutcome::Continue)
    }

    fn seek(&mut self, seconds: f64) -> std::result::Result<(), StepError> {
        let time = Time::from(seconds.max(0.0));
        self.format
            .seek(
                SeekMode::Coarse,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| StepError::Other(format!("seek failed: {e}")))?;
        self.decoder.reset();
        self.leftover.clear();
        self.exhausted = false;
        // Skip whatever the ring still holds from before the seek.
        self.flush.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for SymphoniaTrack {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(output) = self.output.take() {
            let _ = output.join();
        }
        debug!("track unloaded");
    }
}
