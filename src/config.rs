use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveSettings,
    pub audio: AudioSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct LiveSettings {
    /// Model identifier passed through to the remote service
    pub model: String,
    /// Default voice for synthesized answers
    pub voice: String,
    /// Default system prompt
    pub system_prompt: String,
    /// NATS server URL for the duplex channel transport
    pub nats_url: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    /// Audio device kind: "hardware" or "synthetic"
    pub device: String,
    /// Microphone sample rate (the remote service expects 16kHz)
    pub input_sample_rate: u32,
    /// Playback sample rate (the remote service answers at 24kHz)
    pub output_sample_rate: u32,
    /// Capture frame size in samples
    pub frame_size: usize,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
