//! Infrastructure layer for livemap-subscriber.
//!
//! - [`link`] – the reconnecting WebSocket to the relay's `/ws`.
//! - [`poller`] – interval polling of the relay's `/api` snapshots.

pub mod link;
pub mod poller;

pub use link::SubscriberLink;
pub use poller::{PollError, Snapshot, SnapshotPoller};
