use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionState;

/// Point-in-time view of a live session for the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub state: SessionState,

    /// When the session object was created
    pub started_at: DateTime<Utc>,

    /// Seconds since the session was created
    pub duration_secs: f64,

    /// What the user has said in the current turn
    pub user_transcript: String,

    /// What the model has said in the current turn
    pub model_transcript: String,

    /// Encoded frames handed to the uplink so far
    pub frames_sent: usize,

    /// Audio chunks scheduled for playback so far
    pub chunks_played: usize,
}
