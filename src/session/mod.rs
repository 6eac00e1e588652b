pub mod config;
pub mod session;
pub mod snapshot;
pub mod transcript;

pub use config::LiveConfig;
pub use session::{LiveSession, SessionState};
pub use snapshot::SessionSnapshot;
pub use transcript::TranscriptAccumulator;
