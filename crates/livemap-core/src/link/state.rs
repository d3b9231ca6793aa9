//! Connection state machine for a reconnecting link.
//!
//! ```text
//!            connect()            on open
//! Disconnected ──────▶ Connecting ───────▶ Connected
//!      ▲                   │                   │
//!      │   attempt failed  │   close / error   │
//!      └───────────────────┴───────────────────┘
//!          (reconnect timer scheduled here)
//! ```
//!
//! There is no terminal state: a link cycles through these until the owning
//! process shuts it down.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a link currently is in its connect/reconnect cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No connection and no attempt in flight.  A reconnect may be pending.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is open and frames are flowing.
    Connected,
}

impl LinkState {
    /// Returns `true` only for [`LinkState::Connected`].
    pub fn is_connected(self) -> bool {
        matches!(self, LinkState::Connected)
    }

    /// Returns `true` if the state machine allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed so repeated close/error
    /// notifications for one connection are harmless.
    pub fn can_transition_to(self, next: LinkState) -> bool {
        use LinkState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        ) || self == next
    }

    /// Short lowercase label used in logs and the health endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
