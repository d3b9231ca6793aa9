//! Reconnecting-link building blocks shared by the upstream and subscriber links.

pub mod state;
pub mod timer;

use thiserror::Error;

pub use state::LinkState;
pub use timer::ReconnectTimer;

/// Why one connection attempt or session of a link ended.
///
/// Links never surface these to their callers.  They are logged and turned
/// into a scheduled reconnect.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The WebSocket handshake did not complete.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The established connection failed while reading or writing.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote side closed the connection.
    #[error("connection closed by peer")]
    Closed,
}
