//! livemap-relay library crate.
//!
//! This crate keeps a single WebSocket open to the game server's live map
//! feed and fans every frame out to any number of browser subscribers.  It
//! also proxies two read-only REST snapshots (roster and chat log) so the
//! browser never needs the upstream access token.
//!
//! # Architecture
//!
//! ```text
//! Game server live map (WebSocket)        Game server REST (/chatlog, /playerlocations)
//!         │                                              │
//!   [infrastructure::upstream]            [infrastructure::snapshot_client]
//!         │ frames (opaque text)                         │
//!   [application::broadcaster]  ◀──  [application::relay_service]  ──▶ rate limiter
//!         │ one queue per subscriber                     │
//!   [infrastructure::server]  /ws                 /api/chatlog, /api/playerlocations, /api/health
//!         │
//! Browsers (N subscribers)
//! ```
//!
//! # Layer rules
//!
//! - `domain` holds configuration only (no I/O, no env reads).
//! - `application` owns the subscriber set, the relay service, and the rate
//!   limiter.  It never opens a socket.
//! - `infrastructure` owns every socket: the upstream client, the axum
//!   server, and the HTTP snapshot client.
//!
//! The relay never parses relayed frames.  The only frame it produces itself
//! is the `connection_status` greeting each new subscriber receives.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: fan-out, relay service, rate limiting.
pub mod application;

/// Infrastructure layer: upstream WebSocket, HTTP/WS server, snapshot client.
pub mod infrastructure;
