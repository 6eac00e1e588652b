pub mod duplex;
pub mod events;
pub mod nats;

pub use duplex::{ChannelConfig, LiveChannel, LiveLink};
pub use events::{ServerEvent, SessionOpen};
pub use nats::NatsLiveChannel;
