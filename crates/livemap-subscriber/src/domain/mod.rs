//! Domain layer for livemap-subscriber.

pub mod config;

pub use config::{PollConfig, SubscriberConfig, WatchConfig};
