use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A fixed-size chunk of mono samples from the capture source
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Configuration for a capture source
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (sources resample if the device differs)
    pub sample_rate: u32,
    /// Samples per delivered frame
    pub frame_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // remote service expects 16kHz mono
            frame_size: 4096,
        }
    }
}

/// Microphone capture seam
///
/// Implementations own the underlying input stream for the session's
/// lifetime. `start` returns the frame channel; the channel closing
/// before `stop` is called means the device died and the session treats
/// it as fatal. The channel is unbounded: capture callbacks must never
/// block on a consumer.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Start capturing and return the frame channel
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<CaptureFrame>>;

    /// Stop capturing and release the device; closes the frame channel
    async fn stop(&mut self) -> Result<()>;

    /// Whether the source is currently capturing
    fn is_capturing(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Identifier for a chunk scheduled on a playback sink
pub type SourceId = u64;

/// Speaker-side seam consumed by the playback scheduler
///
/// The sink exposes a monotonic output clock; `start` schedules a chunk
/// at an absolute position on that clock and `stop` silences one chunk.
pub trait PlaybackSink: Send + Sync {
    /// Current output-clock position in seconds
    fn clock(&self) -> f64;

    /// Schedule a chunk to begin at `at` seconds on the output clock
    fn start(&mut self, chunk: &crate::audio::PlaybackChunk, at: f64) -> Result<SourceId>;

    /// Stop a scheduled chunk, silencing whatever remains of it
    fn stop(&mut self, id: SourceId);

    /// Release the output device
    fn close(&mut self) -> Result<()>;
}

/// Audio device capability injected into the session controller
///
/// Bundles the capture and playback sides of one device so a session can
/// be wired against real hardware or a synthetic double.
pub trait AudioDevice: Send + Sync {
    fn open_capture(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>>;
    fn open_playback(&self, sample_rate: u32) -> Result<Box<dyn PlaybackSink>>;
}

/// Audio device factory
pub struct AudioDeviceFactory;

impl AudioDeviceFactory {
    /// Create a device from its configured kind
    pub fn create(kind: &str) -> Result<Arc<dyn AudioDevice>> {
        match kind {
            "hardware" => Ok(Arc::new(super::hardware::HardwareDevice::default())),
            "synthetic" => Ok(Arc::new(super::synthetic::SyntheticDevice::new())),
            other => anyhow::bail!("unknown audio device kind: {}", other),
        }
    }
}
