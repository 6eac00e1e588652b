use serde::{Deserialize, Serialize};

use crate::audio::{CaptureConfig, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use crate::channel::ChannelConfig;

/// Configuration for one live session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Unique session identifier (e.g. "live-<uuid>")
    pub session_id: String,

    /// Model identifier passed through to the remote service
    pub model: String,

    /// Voice the model answers with
    pub voice: String,

    /// System prompt sent when the channel opens
    pub system_prompt: String,

    /// Microphone sample rate (the remote service expects 16kHz)
    pub input_sample_rate: u32,

    /// Playback sample rate (the remote service answers at 24kHz)
    pub output_sample_rate: u32,

    /// Capture frame size in samples
    pub frame_size: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            session_id: format!("live-{}", uuid::Uuid::new_v4()),
            model: "flash-native-audio".to_string(),
            voice: "Zephyr".to_string(),
            system_prompt: "You are a friendly, helpful voice assistant.".to_string(),
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            frame_size: 4096,
        }
    }
}

impl LiveConfig {
    pub(crate) fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            session_id: self.session_id.clone(),
            model: self.model.clone(),
            voice: self.voice.clone(),
            system_prompt: self.system_prompt.clone(),
            input_sample_rate: self.input_sample_rate,
        }
    }

    pub(crate) fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.input_sample_rate,
            frame_size: self.frame_size,
        }
    }
}
