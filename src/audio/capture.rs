use anyhow::{Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::codec::{encode_frame, EncodedFrame};
use super::device::CaptureSource;

/// Forwards microphone frames to the uplink for the session's lifetime.
///
/// Each capture frame is encoded and handed to the uplink fire-and-forget
/// over an unbounded channel; capture is never blocked on network
/// progress, ordering is preserved by the channel. The pipeline owns the
/// capture source exclusively and releases it on stop.
pub struct CapturePipeline {
    source: Box<dyn CaptureSource>,
    task: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    pub fn new(source: Box<dyn CaptureSource>) -> Self {
        Self { source, task: None }
    }

    /// Start capture and forwarding.
    ///
    /// The returned receiver resolves when the capture stream ends on its
    /// own, before `stop` was called, which the session treats as a fatal
    /// device error.
    pub async fn start(
        &mut self,
        uplink: mpsc::UnboundedSender<EncodedFrame>,
        frames_sent: Arc<AtomicUsize>,
    ) -> Result<oneshot::Receiver<()>> {
        let mut frames = self
            .source
            .start()
            .await
            .context("failed to start capture source")?;

        let (done_tx, done_rx) = oneshot::channel();

        self.task = Some(tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let encoded = encode_frame(&frame.samples, frame.sample_rate);
                if encoded.is_empty() {
                    continue;
                }
                if uplink.send(encoded).is_err() {
                    debug!("uplink closed, stopping capture forwarding");
                    break;
                }
                frames_sent.fetch_add(1, Ordering::Relaxed);
            }
            let _ = done_tx.send(());
        }));

        Ok(done_rx)
    }

    /// Stop capture and release the device
    pub async fn stop(&mut self) -> Result<()> {
        let stopped = self.source.stop().await;

        if let Some(task) = self.task.take() {
            if stopped.is_err() {
                // The frame channel may never close if stop failed; don't
                // wait on a forwarding task that could hang
                task.abort();
            }
            let _ = task.await;
        }

        stopped
    }

    pub fn is_capturing(&self) -> bool {
        self.source.is_capturing()
    }
}
