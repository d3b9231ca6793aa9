//! Domain layer for livemap-relay.
//!
//! Plain configuration types.  The infrastructure layer (and `main.rs`) is
//! responsible for filling them from CLI arguments and environment variables.

pub mod config;

pub use config::{RateLimitConfig, RelayConfig, UpstreamConfig};
