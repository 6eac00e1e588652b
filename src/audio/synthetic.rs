// Scriptable audio device for tests and hardware-free deployments.
//
// The capture side replays a configured list of frames and either holds
// the stream open until stopped (normal operation) or ends it (to
// exercise the fatal capture-death path). The playback side records every
// schedule/stop/close against a manually advanced clock, observable
// through a shared probe handle.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};

use super::codec::PlaybackChunk;
use super::device::{AudioDevice, CaptureConfig, CaptureFrame, CaptureSource, PlaybackSink, SourceId};

/// One chunk scheduled on the synthetic sink
#[derive(Debug, Clone)]
pub struct ScheduledSource {
    pub id: SourceId,
    pub start_at: f64,
    pub duration: f64,
}

/// Observable state shared by every sink opened from one synthetic device
#[derive(Debug, Default)]
pub struct SinkProbe {
    /// Manually advanced output clock, in seconds
    pub clock: f64,
    pub started: Vec<ScheduledSource>,
    pub stopped: Vec<SourceId>,
    pub closed: bool,
    next_id: SourceId,
}

fn lock_probe(probe: &Mutex<SinkProbe>) -> MutexGuard<'_, SinkProbe> {
    match probe.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Scriptable audio device
pub struct SyntheticDevice {
    frames: Vec<Vec<f32>>,
    hold_capture_open: bool,
    probe: Arc<Mutex<SinkProbe>>,
    capture_stopped: Arc<AtomicBool>,
}

impl SyntheticDevice {
    /// A device that captures nothing and holds its stream open until stopped
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// A device that emits the given frames, then holds the stream open
    pub fn scripted(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames,
            hold_capture_open: true,
            probe: Arc::new(Mutex::new(SinkProbe::default())),
            capture_stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A device whose capture stream ends after the given frames,
    /// simulating a microphone dying mid-session
    pub fn finite(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames,
            hold_capture_open: false,
            probe: Arc::new(Mutex::new(SinkProbe::default())),
            capture_stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for observing sink activity
    pub fn probe(&self) -> Arc<Mutex<SinkProbe>> {
        Arc::clone(&self.probe)
    }

    /// Advance the output clock
    pub fn advance_clock(&self, seconds: f64) {
        lock_probe(&self.probe).clock += seconds;
    }

    /// Whether `stop` has been called on a capture source from this device
    pub fn capture_stopped(&self) -> bool {
        self.capture_stopped.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for SyntheticDevice {
    fn open_capture(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureSource>> {
        Ok(Box::new(SyntheticCapture {
            frames: self.frames.clone(),
            sample_rate: config.sample_rate,
            hold_open: self.hold_capture_open,
            shutdown: Arc::new(Notify::new()),
            capturing: Arc::new(AtomicBool::new(false)),
            stopped: Arc::clone(&self.capture_stopped),
        }))
    }

    fn open_playback(&self, _sample_rate: u32) -> Result<Box<dyn PlaybackSink>> {
        Ok(Box::new(SyntheticSink {
            probe: Arc::clone(&self.probe),
        }))
    }
}

struct SyntheticCapture {
    frames: Vec<Vec<f32>>,
    sample_rate: u32,
    hold_open: bool,
    shutdown: Arc<Notify>,
    capturing: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl CaptureSource for SyntheticCapture {
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<CaptureFrame>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let frames = self.frames.clone();
        let sample_rate = self.sample_rate;
        let hold_open = self.hold_open;
        let shutdown = Arc::clone(&self.shutdown);
        let capturing = Arc::clone(&self.capturing);

        capturing.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            for samples in frames {
                if tx.send(CaptureFrame { samples, sample_rate }).is_err() {
                    break;
                }
                // Let the consumer observe frames in order before the next one
                tokio::task::yield_now().await;
            }

            if hold_open {
                // Keep the frame channel alive until stop() is called
                shutdown.notified().await;
            }

            capturing.store(false, Ordering::SeqCst);
        });

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

struct SyntheticSink {
    probe: Arc<Mutex<SinkProbe>>,
}

impl PlaybackSink for SyntheticSink {
    fn clock(&self) -> f64 {
        lock_probe(&self.probe).clock
    }

    fn start(&mut self, chunk: &PlaybackChunk, at: f64) -> Result<SourceId> {
        let mut probe = lock_probe(&self.probe);
        probe.next_id += 1;
        let id = probe.next_id;
        probe.started.push(ScheduledSource {
            id,
            start_at: at,
            duration: chunk.duration(),
        });
        Ok(id)
    }

    fn stop(&mut self, id: SourceId) {
        lock_probe(&self.probe).stopped.push(id);
    }

    fn close(&mut self) -> Result<()> {
        lock_probe(&self.probe).closed = true;
        Ok(())
    }
}
