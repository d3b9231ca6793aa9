//! livemap-subscriber library crate.
//!
//! The client side of the relay: a [`SubscriberLink`] that keeps one
//! WebSocket open to the relay's `/ws` endpoint (reconnecting after a fixed
//! delay), and a [`DashboardState`] that interprets relayed frames and polled
//! snapshots the way the browser dashboard does.
//!
//! ```text
//! relay /ws ──▶ [infrastructure::link] ──latest message──▶ [application::dashboard]
//! relay /api ─▶ [infrastructure::poller] ──snapshots────▶ [application::dashboard]
//! ```
//!
//! [`SubscriberLink`]: infrastructure::SubscriberLink
//! [`DashboardState`]: application::DashboardState

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: dashboard state derived from relayed frames.
pub mod application;

/// Infrastructure layer: relay WebSocket link and REST poller.
pub mod infrastructure;
