pub mod capture;
pub mod codec;
pub mod device;
pub mod hardware;
pub mod playback;
pub mod synthetic;

pub use capture::CapturePipeline;
pub use codec::{decode_frame, encode_frame, EncodedFrame, PlaybackChunk, INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
pub use device::{AudioDevice, AudioDeviceFactory, CaptureConfig, CaptureFrame, CaptureSource, PlaybackSink, SourceId};
pub use hardware::HardwareDevice;
pub use playback::PlaybackScheduler;
pub use synthetic::SyntheticDevice;
