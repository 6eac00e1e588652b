#![allow(dead_code)]

// Test doubles and helpers shared by the session integration tests.
//
// ScriptedChannel stands in for the remote model service: the test keeps
// the far end of both halves of the duplex link and drives inbound events
// / observes uplinked frames directly.

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use merkez_live::audio::EncodedFrame;
use merkez_live::channel::{ChannelConfig, LiveChannel, LiveLink};
use merkez_live::session::SessionSnapshot;
use merkez_live::{encode_frame, LiveSession, ServerEvent, SessionState};

/// The far end of a scripted duplex link
pub struct RemoteEnd {
    pub events: mpsc::Sender<ServerEvent>,
    pub frames: mpsc::UnboundedReceiver<EncodedFrame>,
}

impl RemoteEnd {
    pub async fn send(&self, event: ServerEvent) {
        self.events
            .send(event)
            .await
            .expect("session dropped its event stream");
    }

    /// Drain the uplink until it closes; returns the frames seen
    pub async fn drain_uplink(&mut self) -> Vec<EncodedFrame> {
        let mut frames = Vec::new();
        loop {
            match tokio::time::timeout(Duration::from_secs(2), self.frames.recv()).await {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => return frames,
                Err(_) => panic!("uplink did not close"),
            }
        }
    }
}

/// Channel whose single link is handed to the first connect call
pub struct ScriptedChannel {
    link: Mutex<Option<LiveLink>>,
}

impl ScriptedChannel {
    pub fn new() -> (Arc<Self>, RemoteEnd) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();

        let channel = Arc::new(Self {
            link: Mutex::new(Some(LiveLink {
                events: event_rx,
                frames: frame_tx,
            })),
        });
        let remote = RemoteEnd {
            events: event_tx,
            frames: frame_rx,
        };

        (channel, remote)
    }
}

#[async_trait::async_trait]
impl LiveChannel for ScriptedChannel {
    async fn connect(&self, _config: &ChannelConfig) -> Result<LiveLink> {
        self.link
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("scripted channel already connected"))
    }
}

/// Channel that always refuses to connect
pub struct FailingChannel;

#[async_trait::async_trait]
impl LiveChannel for FailingChannel {
    async fn connect(&self, _config: &ChannelConfig) -> Result<LiveLink> {
        anyhow::bail!("connection refused")
    }
}

/// Channel whose connect never resolves
pub struct PendingChannel;

#[async_trait::async_trait]
impl LiveChannel for PendingChannel {
    async fn connect(&self, _config: &ChannelConfig) -> Result<LiveLink> {
        futures::future::pending().await
    }
}

/// Poll until the session reaches the expected state
pub async fn wait_for_state(session: &LiveSession, expected: SessionState) {
    let deadline = async {
        while session.state() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), deadline)
        .await
        .unwrap_or_else(|_| {
            panic!(
                "session stuck in {:?}, expected {:?}",
                session.state(),
                expected
            )
        });
}

/// Poll until a snapshot satisfies the predicate
pub async fn wait_for_snapshot<F>(session: &LiveSession, predicate: F) -> SessionSnapshot
where
    F: Fn(&SessionSnapshot) -> bool,
{
    let deadline = async {
        loop {
            let snapshot = session.snapshot().await;
            if predicate(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(2), deadline)
        .await
        .expect("snapshot never matched")
}

/// Base64 payload for `seconds` of silence at the output rate
pub fn silence_payload(seconds: f64) -> String {
    let samples = vec![0.0f32; (seconds * 24000.0) as usize];
    encode_frame(&samples, 24000).data
}

/// A server event carrying only an audio payload
pub fn audio_event(seconds: f64) -> ServerEvent {
    ServerEvent {
        audio: Some(silence_payload(seconds)),
        ..Default::default()
    }
}
