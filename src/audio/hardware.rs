// Hardware audio device built on CPAL.
//
// Capture prefers a mono f32 stream at the configured rate and falls back
// to the device's native config with software channel-mixing and
// resampling. Playback runs a mono output stream fed by a sample-accurate
// timeline mixer; the timeline cursor doubles as the scheduler's output
// clock.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::codec::PlaybackChunk;
use super::device::{AudioDevice, CaptureConfig, CaptureFrame, CaptureSource, PlaybackSink, SourceId};

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched through the owning struct's Mutex,
/// one thread at a time, and is never shared across threads unguarded.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

type FrameSender = mpsc::UnboundedSender<CaptureFrame>;

/// CPAL-backed audio device
#[derive(Default)]
pub struct HardwareDevice {
    input_device: Option<String>,
}

impl HardwareDevice {
    /// Use a specific input device instead of the system default
    pub fn named(input_device: impl Into<String>) -> Self {
        Self {
            input_device: Some(input_device.into()),
        }
    }
}

impl AudioDevice for HardwareDevice {
    fn open_capture(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(HardwareCapture {
            device_name: self.input_device.clone(),
            config: config.clone(),
            stream: Mutex::new(None),
            frame_tx: Arc::new(Mutex::new(None)),
            capturing: AtomicBool::new(false),
        }))
    }

    fn open_playback(&self, sample_rate: u32) -> Result<Box<dyn PlaybackSink>> {
        Ok(Box::new(HardwarePlayback::open(sample_rate)?))
    }
}

/// Microphone capture through CPAL
struct HardwareCapture {
    device_name: Option<String>,
    config: CaptureConfig,
    stream: Mutex<Option<SendableStream>>,
    /// Live end of the frame channel; taken on stop or stream error so the
    /// channel closes and the session observes the capture ending
    frame_tx: Arc<Mutex<Option<FrameSender>>>,
    capturing: AtomicBool,
}

impl HardwareCapture {
    fn resolve_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();

        if let Some(name) = &self.device_name {
            let devices = host
                .input_devices()
                .context("failed to enumerate input devices")?;
            for device in devices {
                if device.name().map(|n| n == *name).unwrap_or(false) {
                    return Ok(device);
                }
            }
            anyhow::bail!("input device not found: {}", name);
        }

        host.default_input_device()
            .context("no input device available")
    }

    fn error_callback(&self) -> impl FnMut(cpal::StreamError) + Send + 'static {
        let frame_tx = Arc::clone(&self.frame_tx);
        move |err| {
            error!("capture stream error: {}", err);
            // Closing the frame channel is what makes the session treat
            // a dead microphone as fatal
            if let Ok(mut tx) = frame_tx.lock() {
                tx.take();
            }
        }
    }

    fn build_stream(&self, device: &cpal::Device) -> Result<cpal::Stream> {
        let preferred = cpal::StreamConfig {
            channels: 1,
            sample_rate: self.config.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        // Preferred path: mono f32 at the target rate. PipeWire/PulseAudio
        // convert transparently on most setups.
        let frame_tx = Arc::clone(&self.frame_tx);
        let frame_size = self.config.frame_size;
        let sample_rate = self.config.sample_rate;
        let mut pending: Vec<f32> = Vec::with_capacity(frame_size * 2);

        if let Ok(stream) = device.build_input_stream(
            &preferred,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                deliver_frames(&mut pending, frame_size, sample_rate, &frame_tx);
            },
            self.error_callback(),
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native(device)
    }

    /// Fall back to the device's native config, mixing to mono and
    /// resampling to the target rate in software
    fn build_stream_native(&self, device: &cpal::Device) -> Result<cpal::Stream> {
        let default_config = device
            .default_input_config()
            .context("failed to query default input config")?;

        let native_rate = default_config.sample_rate();
        let native_channels = default_config.channels() as usize;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        info!(
            "capturing at native format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format()
        );

        let frame_tx = Arc::clone(&self.frame_tx);
        let frame_size = self.config.frame_size;
        let target_rate = self.config.sample_rate;
        let mut pending: Vec<f32> = Vec::with_capacity(frame_size * 2);

        match default_config.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mono = mix_to_mono(data, native_channels);
                        pending.extend(resample(&mono, native_rate, target_rate));
                        deliver_frames(&mut pending, frame_size, target_rate, &frame_tx);
                    },
                    self.error_callback(),
                    None,
                )
                .context("failed to build native f32 input stream"),
            cpal::SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let float: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        let mono = mix_to_mono(&float, native_channels);
                        pending.extend(resample(&mono, native_rate, target_rate));
                        deliver_frames(&mut pending, frame_size, target_rate, &frame_tx);
                    },
                    self.error_callback(),
                    None,
                )
                .context("failed to build native i16 input stream"),
            format => anyhow::bail!("unsupported native sample format: {:?}", format),
        }
    }
}

/// Slice complete frames out of the pending buffer and send them on
fn deliver_frames(
    pending: &mut Vec<f32>,
    frame_size: usize,
    sample_rate: u32,
    frame_tx: &Arc<Mutex<Option<FrameSender>>>,
) {
    while pending.len() >= frame_size {
        let samples: Vec<f32> = pending.drain(..frame_size).collect();
        let delivered = match frame_tx.lock() {
            Ok(tx) => match tx.as_ref() {
                Some(tx) => tx.send(CaptureFrame { samples, sample_rate }).is_ok(),
                None => false,
            },
            Err(_) => false,
        };
        if !delivered {
            pending.clear();
            return;
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for HardwareCapture {
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<CaptureFrame>> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.frame_tx.lock() {
            *slot = Some(tx);
        }

        let device = self.resolve_device()?;
        if let Ok(name) = device.name() {
            info!("capturing from input device: {}", name);
        }

        let stream = self.build_stream(&device)?;
        stream.play().context("failed to start capture stream")?;

        if let Ok(mut guard) = self.stream.lock() {
            *guard = Some(SendableStream(stream));
        }
        self.capturing.store(true, Ordering::SeqCst);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);

        // Close the frame channel first so downstream consumers drain out
        if let Ok(mut tx) = self.frame_tx.lock() {
            tx.take();
        }

        if let Ok(mut guard) = self.stream.lock() {
            if let Some(stream) = guard.take() {
                stream
                    .0
                    .pause()
                    .context("failed to stop capture stream")?;
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

/// One chunk placed on the playback timeline
struct Segment {
    id: SourceId,
    /// Absolute start position in samples on the output clock
    start: u64,
    samples: Vec<f32>,
}

#[derive(Default)]
struct Timeline {
    /// Samples played since the stream opened
    cursor: u64,
    next_id: SourceId,
    segments: Vec<Segment>,
}

/// Speaker output through CPAL, fed by a sample-accurate timeline mixer
struct HardwarePlayback {
    timeline: Arc<Mutex<Timeline>>,
    stream: Mutex<Option<SendableStream>>,
    sample_rate: u32,
}

impl HardwarePlayback {
    fn open(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("no output device available")?;
        if let Ok(name) = device.name() {
            info!("playing through output device: {}", name);
        }

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let timeline = Arc::new(Mutex::new(Timeline::default()));
        let shared = Arc::clone(&timeline);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    data.fill(0.0);
                    if let Ok(mut timeline) = shared.lock() {
                        mix_into(&mut timeline, data);
                    }
                },
                |err| error!("playback stream error: {}", err),
                None,
            )
            .context("failed to build output stream")?;

        stream.play().context("failed to start output stream")?;

        Ok(Self {
            timeline,
            stream: Mutex::new(Some(SendableStream(stream))),
            sample_rate,
        })
    }
}

/// Sum every segment overlapping the callback window into the output
/// buffer, advance the cursor and drop fully played segments
fn mix_into(timeline: &mut Timeline, data: &mut [f32]) {
    let base = timeline.cursor;
    let span = data.len() as u64;

    for segment in &timeline.segments {
        let segment_end = segment.start + segment.samples.len() as u64;
        let lo = segment.start.max(base);
        let hi = segment_end.min(base + span);
        for position in lo..hi {
            data[(position - base) as usize] += segment.samples[(position - segment.start) as usize];
        }
    }

    timeline.cursor += span;
    let cursor = timeline.cursor;
    timeline
        .segments
        .retain(|segment| segment.start + segment.samples.len() as u64 > cursor);
}

impl PlaybackSink for HardwarePlayback {
    fn clock(&self) -> f64 {
        self.timeline
            .lock()
            .map(|timeline| timeline.cursor as f64 / self.sample_rate as f64)
            .unwrap_or(0.0)
    }

    fn start(&mut self, chunk: &PlaybackChunk, at: f64) -> Result<SourceId> {
        let mut mono = mix_to_mono(&chunk.samples, chunk.channels as usize);
        if chunk.sample_rate != self.sample_rate {
            warn!(
                "resampling playback chunk from {}Hz to {}Hz",
                chunk.sample_rate, self.sample_rate
            );
            mono = resample(&mono, chunk.sample_rate, self.sample_rate);
        }

        let mut timeline = self
            .timeline
            .lock()
            .map_err(|_| anyhow::anyhow!("playback timeline lock poisoned"))?;
        timeline.next_id += 1;
        let id = timeline.next_id;
        let start = (at * self.sample_rate as f64).round() as u64;
        timeline.segments.push(Segment {
            id,
            start,
            samples: mono,
        });

        Ok(id)
    }

    fn stop(&mut self, id: SourceId) {
        if let Ok(mut timeline) = self.timeline.lock() {
            timeline.segments.retain(|segment| segment.id != id);
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Ok(mut timeline) = self.timeline.lock() {
            timeline.segments.clear();
        }
        if let Ok(mut guard) = self.stream.lock() {
            if let Some(stream) = guard.take() {
                stream
                    .0
                    .pause()
                    .context("failed to stop output stream")?;
            }
        }
        Ok(())
    }
}

/// Mix interleaved multi-channel audio down to mono by averaging
fn mix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let position = i as f64 * ratio;
        let index = position as usize;
        let fraction = (position - index as f64) as f32;
        let current = samples[index];
        let next = samples.get(index + 1).copied().unwrap_or(current);
        output.push(current + (next - current) * fraction);
    }

    output
}
