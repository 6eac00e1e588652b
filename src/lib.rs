pub mod audio;
pub mod channel;
pub mod config;
pub mod http;
pub mod session;

pub use audio::{
    decode_frame, encode_frame, AudioDevice, AudioDeviceFactory, CaptureConfig, CapturePipeline,
    CaptureSource, EncodedFrame, HardwareDevice, PlaybackChunk, PlaybackScheduler, PlaybackSink,
    SyntheticDevice,
};
pub use channel::{ChannelConfig, LiveChannel, LiveLink, NatsLiveChannel, ServerEvent};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{LiveConfig, LiveSession, SessionSnapshot, SessionState, TranscriptAccumulator};
