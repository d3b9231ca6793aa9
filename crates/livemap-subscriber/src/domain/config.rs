//! Subscriber and dashboard configuration.

use std::time::Duration;

/// Settings for one [`SubscriberLink`](crate::infrastructure::SubscriberLink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// The relay's WebSocket endpoint, e.g. `ws://10.0.0.2:5000/ws`.
    pub relay_url: String,
    /// Fixed delay between losing the relay and the next attempt.
    pub reconnect_delay: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://127.0.0.1:5000/ws".to_string(),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl SubscriberConfig {
    /// The relay's HTTP base URL, derived from [`SubscriberConfig::relay_url`].
    ///
    /// `ws://host:5000/ws` becomes `http://host:5000`; `wss://` becomes
    /// `https://`.  The path is dropped.
    pub fn http_base_url(&self) -> String {
        let (scheme, rest) = match self.relay_url.split_once("://") {
            Some(("wss", rest)) => ("https", rest),
            Some((_, rest)) => ("http", rest),
            None => ("http", self.relay_url.as_str()),
        };
        let authority = rest.split('/').next().unwrap_or(rest);
        format!("{scheme}://{authority}")
    }
}

/// How often the dashboard polls the relay's `/api` snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Relay HTTP base, e.g. `http://10.0.0.2:5000`.
    pub base_url: String,
    pub roster_interval: Duration,
    pub chat_interval: Duration,
}

impl PollConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            roster_interval: Duration::from_secs(2),
            chat_interval: Duration::from_secs(5),
        }
    }
}

/// All runtime configuration for `livemap-watch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchConfig {
    pub subscriber: SubscriberConfig,
    /// `None` disables REST polling.
    pub poll: Option<PollConfig>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
