//! Application layer for livemap-relay.
//!
//! Owns the subscriber set and the per-IP rate limiter, and defines the
//! snapshot seam the REST routes call through.  Nothing here opens a socket.

pub mod broadcaster;
pub mod rate_limit;
pub mod relay_service;
pub mod snapshot;

pub use broadcaster::{Broadcaster, FanOut, Frame, SubscriberId, Subscription};
pub use rate_limit::{RateLimited, RateLimiter};
pub use relay_service::{HealthReport, RelayService, SharedRelay};
pub use snapshot::{SnapshotError, SnapshotSource};
