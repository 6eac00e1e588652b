use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::LiveConfig;
use super::snapshot::SessionSnapshot;
use super::transcript::TranscriptAccumulator;
use crate::audio::{decode_frame, AudioDevice, CapturePipeline, EncodedFrame, PlaybackScheduler};
use crate::channel::{LiveChannel, LiveLink, ServerEvent};

/// Lifecycle of a live session; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connecting,
    Listening,
    Closed,
}

/// State shared between the session handle and its event-loop task
struct Shared {
    state: watch::Sender<SessionState>,
    shutdown: Notify,
    user_transcript: Mutex<TranscriptAccumulator>,
    model_transcript: Mutex<TranscriptAccumulator>,
    frames_sent: Arc<AtomicUsize>,
    chunks_played: AtomicUsize,
}

impl Shared {
    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            info!("live session state: {:?} -> {:?}", *state, next);
            *state = next;
            true
        });
    }
}

/// A live voice session: one duplex connection to the model service.
///
/// Owns the microphone stream and the playback sink for its lifetime and
/// enforces single-use: `start` is rejected unless the session is idle,
/// and a closed session cannot be restarted. `close` is idempotent and
/// releases every resource regardless of which state the session is in.
pub struct LiveSession {
    config: LiveConfig,
    channel: Arc<dyn LiveChannel>,
    device: Arc<dyn AudioDevice>,
    shared: Arc<Shared>,
    state_rx: watch::Receiver<SessionState>,
    started_at: chrono::DateTime<Utc>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSession {
    pub fn new(
        config: LiveConfig,
        channel: Arc<dyn LiveChannel>,
        device: Arc<dyn AudioDevice>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        Self {
            config,
            channel,
            device,
            shared: Arc::new(Shared {
                state: state_tx,
                shutdown: Notify::new(),
                user_transcript: Mutex::new(TranscriptAccumulator::new()),
                model_transcript: Mutex::new(TranscriptAccumulator::new()),
                frames_sent: Arc::new(AtomicUsize::new(0)),
                chunks_played: AtomicUsize::new(0),
            }),
            state_rx,
            started_at: Utc::now(),
            task: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Open the audio device and the duplex channel, then start streaming.
    ///
    /// Rejected unless the session is idle: the controller itself enforces
    /// one live session per instance. Any failure on the way up lands the
    /// session in `Closed`.
    pub async fn start(&self) -> Result<()> {
        let claimed = self.shared.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Connecting;
                true
            } else {
                false
            }
        });
        if !claimed {
            anyhow::bail!(
                "live session {} is {:?}, not idle",
                self.config.session_id,
                self.state()
            );
        }
        info!("live session {} connecting", self.config.session_id);

        match self.connect_and_listen().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.shared.set_state(SessionState::Closed);
                Err(e)
            }
        }
    }

    async fn connect_and_listen(&self) -> Result<()> {
        let capture_source = self
            .device
            .open_capture(&self.config.capture_config())
            .context("failed to open capture source")?;
        let playback_sink = self
            .device
            .open_playback(self.config.output_sample_rate)
            .context("failed to open playback sink")?;

        let mut pipeline = CapturePipeline::new(capture_source);
        let mut scheduler = PlaybackScheduler::new(playback_sink);

        // A close requested while the connect is in flight wins
        let channel_config = self.config.channel_config();
        let link = tokio::select! {
            connected = self.channel.connect(&channel_config) => {
                match connected.context("failed to open live channel") {
                    Ok(link) => link,
                    Err(e) => {
                        release(&mut pipeline, &mut scheduler).await;
                        return Err(e);
                    }
                }
            }
            _ = self.shared.shutdown.notified() => {
                info!("live session {} closed while connecting", self.config.session_id);
                release(&mut pipeline, &mut scheduler).await;
                self.shared.set_state(SessionState::Closed);
                return Ok(());
            }
        };

        let LiveLink { events, frames } = link;

        let capture_done = match pipeline
            .start(frames.clone(), Arc::clone(&self.shared.frames_sent))
            .await
            .context("failed to start capture pipeline")
        {
            Ok(done) => done,
            Err(e) => {
                release(&mut pipeline, &mut scheduler).await;
                return Err(e);
            }
        };

        self.shared.set_state(SessionState::Listening);

        let task = tokio::spawn(run_session(
            Arc::clone(&self.shared),
            self.config.session_id.clone(),
            self.config.output_sample_rate,
            events,
            frames,
            pipeline,
            scheduler,
            capture_done,
        ));
        *self.task.lock().await = Some(task);

        Ok(())
    }

    /// Tear the session down from whatever state it is in.
    ///
    /// Idempotent: a second close is a no-op. Returns once every resource
    /// release has been attempted and the session is `Closed`.
    pub async fn close(&self) {
        if self.state() == SessionState::Closed {
            return;
        }

        // An idle session has nothing to release
        let closed_from_idle = self.shared.state.send_if_modified(|state| {
            if *state == SessionState::Idle {
                *state = SessionState::Closed;
                true
            } else {
                false
            }
        });
        if closed_from_idle {
            info!("live session {} closed before starting", self.config.session_id);
            return;
        }

        self.shared.shutdown.notify_one();

        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                // A crashed event loop never reaches its own teardown
                error!("live session task failed: {}", e);
                self.shared.set_state(SessionState::Closed);
            }
        }

        // Covers a close that landed while the connect was still in flight
        let mut state_rx = self.state_rx.clone();
        let _ = state_rx
            .wait_for(|state| *state == SessionState::Closed)
            .await;
    }

    /// Point-in-time view for the control surface
    pub async fn snapshot(&self) -> SessionSnapshot {
        let user_transcript = self.shared.user_transcript.lock().await.text().to_string();
        let model_transcript = self.shared.model_transcript.lock().await.text().to_string();
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionSnapshot {
            session_id: self.config.session_id.clone(),
            state: self.state(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            user_transcript,
            model_transcript,
            frames_sent: self.shared.frames_sent.load(Ordering::Relaxed),
            chunks_played: self.shared.chunks_played.load(Ordering::Relaxed),
        }
    }
}

/// The session event loop: consume inbound events until the channel ends,
/// the capture dies, or a close is requested, then release everything.
#[allow(clippy::too_many_arguments)]
async fn run_session(
    shared: Arc<Shared>,
    session_id: String,
    output_sample_rate: u32,
    mut events: mpsc::Receiver<ServerEvent>,
    frames: mpsc::UnboundedSender<EncodedFrame>,
    mut pipeline: CapturePipeline,
    mut scheduler: PlaybackScheduler,
    mut capture_done: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    handle_event(&shared, event, &mut scheduler, output_sample_rate).await;
                }
                None => {
                    info!("live channel for {} closed by remote", session_id);
                    break;
                }
            },
            _ = &mut capture_done => {
                // No recovery from a dead microphone; the session ends
                error!("capture for {} ended unexpectedly", session_id);
                break;
            }
            _ = shared.shutdown.notified() => {
                debug!("live session {} close requested", session_id);
                break;
            }
        }
    }

    release(&mut pipeline, &mut scheduler).await;
    drop(frames); // last uplink sender: the duplex channel closes here
    shared.set_state(SessionState::Closed);
}

async fn handle_event(
    shared: &Shared,
    event: ServerEvent,
    scheduler: &mut PlaybackScheduler,
    output_sample_rate: u32,
) {
    if let Some(fragment) = &event.user_transcript {
        shared.user_transcript.lock().await.append(fragment);
    }

    if let Some(fragment) = &event.model_transcript {
        shared.model_transcript.lock().await.append(fragment);
    }

    if event.turn_complete {
        shared.user_transcript.lock().await.reset();
        shared.model_transcript.lock().await.reset();
    }

    if let Some(audio) = &event.audio {
        match decode_frame(audio, output_sample_rate, 1) {
            Ok(chunk) => match scheduler.enqueue(chunk) {
                Ok(_) => {
                    shared.chunks_played.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => warn!("failed to schedule audio chunk: {:#}", e),
            },
            // Malformed payloads are skipped; the session continues
            Err(e) => warn!("skipping malformed audio payload: {:#}", e),
        }
    }

    if event.interrupted {
        debug!("model interrupted, flushing pending playback");
        scheduler.flush();
    }
}

/// Release the session's audio resources.
///
/// Every release is attempted even if an earlier one fails; failures are
/// logged, never propagated.
async fn release(pipeline: &mut CapturePipeline, scheduler: &mut PlaybackScheduler) {
    if let Err(e) = pipeline.stop().await {
        error!("failed to stop capture pipeline: {:#}", e);
    }

    scheduler.flush();
    if let Err(e) = scheduler.close() {
        error!("failed to close playback sink: {:#}", e);
    }
}
