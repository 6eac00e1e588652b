use std::sync::Arc;
use tokio::sync::RwLock;

use crate::audio::AudioDevice;
use crate::channel::LiveChannel;
use crate::config::Config;
use crate::session::LiveSession;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single live session slot; only one overlay at a time
    pub live: Arc<RwLock<Option<Arc<LiveSession>>>>,

    /// Duplex channel service used for new sessions
    pub channel: Arc<dyn LiveChannel>,

    /// Audio device used for new sessions
    pub device: Arc<dyn AudioDevice>,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>, channel: Arc<dyn LiveChannel>, device: Arc<dyn AudioDevice>) -> Self {
        Self {
            live: Arc::new(RwLock::new(None)),
            channel,
            device,
            config,
        }
    }
}
