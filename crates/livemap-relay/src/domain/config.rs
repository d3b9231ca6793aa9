//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments (each of which falls back to an
//! environment variable); tests build it directly or start from
//! [`RelayConfig::default`].
//!
//! The defaults point at a game server on localhost with a placeholder
//! token.  They are meant for local development, not production.

use std::net::SocketAddr;
use std::time::Duration;

/// Everything the relay needs to know about the game server.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    /// Live map WebSocket, e.g. `ws://10.0.0.5:8585/map/ws/`.
    pub ws_url: String,

    /// Base URL of the REST API that serves `/chatlog` and `/playerlocations`.
    pub base_url: String,

    /// Access token appended as `?token=` to every REST call.
    pub token: String,

    /// Fixed delay between losing the live map connection and the next
    /// attempt.  Retries never give up and never back off.
    pub reconnect_delay: Duration,

    /// How many chat lines to request from `/chatlog`.
    pub chat_log_count: u32,

    /// Per-request timeout for REST snapshot fetches.
    pub request_timeout: Duration,
}

impl UpstreamConfig {
    /// Joins `path` onto [`UpstreamConfig::base_url`] with exactly one slash.
    ///
    /// ```rust
    /// use livemap_relay::domain::UpstreamConfig;
    ///
    /// let cfg = UpstreamConfig { base_url: "http://host:7878/".into(), ..Default::default() };
    /// assert_eq!(cfg.endpoint_url("chatlog"), "http://host:7878/chatlog");
    /// ```
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:8585/map/ws/".to_string(),
            base_url: "http://127.0.0.1:7878".to_string(),
            token: "yourtoken".to_string(),
            reconnect_delay: Duration::from_secs(5),
            chat_log_count: 15,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Fixed-window request budget applied per client IP on `/api` routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(1),
        }
    }
}

/// All runtime configuration for the relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Address the HTTP server (REST + `/ws`) binds to.
    pub bind_addr: SocketAddr,
    pub upstream: UpstreamConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for RelayConfig {
    /// | Field                     | Default                       |
    /// |---------------------------|-------------------------------|
    /// | bind_addr                 | `0.0.0.0:5000`                |
    /// | upstream.ws_url           | `ws://127.0.0.1:8585/map/ws/` |
    /// | upstream.base_url         | `http://127.0.0.1:7878`       |
    /// | upstream.reconnect_delay  | 5 seconds                     |
    /// | rate_limit                | 10 requests / 1 second        |
    fn default() -> Self {
        Self {
            // Compile-time-known valid socket address.
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            upstream: UpstreamConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
