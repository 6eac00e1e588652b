use anyhow::Result;
use tokio::sync::mpsc;

use super::events::ServerEvent;
use crate::audio::EncodedFrame;

/// Parameters for opening a live channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub session_id: String,
    /// Model identifier passed through to the remote service
    pub model: String,
    /// Voice the model should answer with
    pub voice: String,
    pub system_prompt: String,
    /// Sample rate of the uplinked PCM frames
    pub input_sample_rate: u32,
}

/// A connected duplex link to the model service.
///
/// Inbound server events arrive on `events` in wire order; encoded frames
/// pushed into `frames` are delivered upstream in send order. Dropping
/// both halves closes the link: the transport ends its inbound forwarding
/// when `events` is dropped and its uplink when every `frames` sender is
/// gone. A remote close surfaces as `events` yielding `None`.
pub struct LiveLink {
    pub events: mpsc::Receiver<ServerEvent>,
    pub frames: mpsc::UnboundedSender<EncodedFrame>,
}

/// Realtime duplex channel service.
///
/// `connect` resolves only once the transport is established and
/// subscribed; a successful return is the open acknowledgment.
#[async_trait::async_trait]
pub trait LiveChannel: Send + Sync {
    async fn connect(&self, config: &ChannelConfig) -> Result<LiveLink>;
}
