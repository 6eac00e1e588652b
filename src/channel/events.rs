use serde::{Deserialize, Serialize};

/// One inbound message from the model service.
///
/// Every field is optional; a message may carry any combination of
/// transcript fragments, an audio payload and turn/interruption flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Partial transcript of what the user said
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_transcript: Option<String>,

    /// Partial transcript of what the model is saying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_transcript: Option<String>,

    /// Base64 16-bit PCM audio at the output sample rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,

    /// The current conversational turn is complete
    #[serde(default)]
    pub turn_complete: bool,

    /// The model was interrupted; pending playback must be discarded
    #[serde(default)]
    pub interrupted: bool,
}

/// Session-open announcement published when a live channel connects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOpen {
    pub session_id: String,
    pub model: String,
    pub voice: String,
    pub system_prompt: String,
    /// Sample rate of the uplinked PCM frames
    pub input_sample_rate: u32,
    pub timestamp: String, // RFC3339
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_defaults_to_empty() {
        let event: ServerEvent = serde_json::from_str("{}").unwrap();
        assert!(event.user_transcript.is_none());
        assert!(event.model_transcript.is_none());
        assert!(event.audio.is_none());
        assert!(!event.turn_complete);
        assert!(!event.interrupted);
    }

    #[test]
    fn test_event_roundtrip() {
        let event = ServerEvent {
            model_transcript: Some("merhaba".to_string()),
            turn_complete: true,
            ..Default::default()
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.model_transcript.as_deref(), Some("merhaba"));
        assert!(parsed.turn_complete);
        assert!(!parsed.interrupted);
    }

    #[test]
    fn test_absent_optionals_are_not_serialized() {
        let json = serde_json::to_string(&ServerEvent::default()).unwrap();
        assert!(!json.contains("user_transcript"));
        assert!(!json.contains("audio"));
    }
}
