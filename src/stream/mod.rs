pub mod client;
pub mod events;
pub mod subscription;

pub use client::{ConnectionState, ConnectionStateEvent, StreamClient};
pub use events::{MarketEvent, UserEvent};
