use anyhow::{Context, Result};
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::duplex::{ChannelConfig, LiveChannel, LiveLink};
use super::events::{ServerEvent, SessionOpen};
use crate::audio::EncodedFrame;

/// Buffer for inbound server events
const EVENT_BUFFER_SIZE: usize = 256;

fn subject(session_id: &str, kind: &str) -> String {
    format!("live.{}.{}", session_id, kind)
}

/// Live duplex channel over NATS.
///
/// Frames go out on `live.<session>.audio`, server events come back on
/// `live.<session>.events`; the session is announced on
/// `live.<session>.open` and ended with a marker on `live.<session>.close`.
pub struct NatsLiveChannel {
    url: String,
}

impl NatsLiveChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl LiveChannel for NatsLiveChannel {
    async fn connect(&self, config: &ChannelConfig) -> Result<LiveLink> {
        info!("Connecting to NATS at {}", self.url);

        let client = async_nats::connect(&self.url)
            .await
            .context("failed to connect to NATS")?;

        let mut subscriber = client
            .subscribe(subject(&config.session_id, "events"))
            .await
            .context("failed to subscribe to server events")?;

        // Announce the session so the model service can set up its side
        let open = SessionOpen {
            session_id: config.session_id.clone(),
            model: config.model.clone(),
            voice: config.voice.clone(),
            system_prompt: config.system_prompt.clone(),
            input_sample_rate: config.input_sample_rate,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        client
            .publish(
                subject(&config.session_id, "open"),
                serde_json::to_vec(&open)?.into(),
            )
            .await
            .context("failed to announce session open")?;
        client
            .flush()
            .await
            .context("failed to flush session-open announcement")?;

        let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(EVENT_BUFFER_SIZE);
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<EncodedFrame>();

        // Inbound: forward server events until the subscription or the
        // session side of the channel goes away
        tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match serde_json::from_slice::<ServerEvent>(&message.payload) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("failed to parse server event: {}", e);
                    }
                }
            }
            debug!("inbound event stream ended");
        });

        // Outbound: drain encoded frames onto the audio subject in send
        // order, then mark the session closed
        let audio_subject = subject(&config.session_id, "audio");
        let close_subject = subject(&config.session_id, "close");
        let outbound = client.clone();
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                let payload = match serde_json::to_vec(&frame) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("failed to serialize audio frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = outbound.publish(audio_subject.clone(), payload.into()).await {
                    error!("failed to publish audio frame: {}", e);
                    break;
                }
            }

            if let Err(e) = outbound.publish(close_subject, Vec::new().into()).await {
                warn!("failed to publish session close: {}", e);
            }
            let _ = outbound.flush().await;
            debug!("uplink ended");
        });

        info!("live channel open for session {}", config.session_id);

        Ok(LiveLink {
            events: event_rx,
            frames: frame_tx,
        })
    }
}
