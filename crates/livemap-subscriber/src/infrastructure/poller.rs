//! Periodic polling of the relay's REST snapshots.
//!
//! The browser dashboard refreshes the roster every 2 s and the chat log
//! every 5 s.  [`SnapshotPoller::run`] does the same and hands each raw body
//! to the caller over a channel.  A failed poll is logged and skipped; the
//! next tick tries again.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::PollConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One polled body, not yet parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Body of `GET /api/playerlocations`.
    Roster(String),
    /// Body of `GET /api/chatlog`.
    Chat(String),
}

/// Why one poll produced no snapshot.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("poll request failed: {0}")]
    Request(String),

    /// The relay answered with a non-success status (including 429).
    #[error("relay returned HTTP {0}")]
    Status(u16),
}

/// HTTP client for the relay's snapshot routes.
pub struct SnapshotPoller {
    client: Client,
    config: PollConfig,
}

impl SnapshotPoller {
    /// # Errors
    ///
    /// Returns [`PollError::Request`] if the HTTP client cannot be built.
    pub fn new(config: PollConfig) -> Result<Self, PollError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PollError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Fetches the current roster body.
    pub async fn fetch_roster(&self) -> Result<String, PollError> {
        self.get("api/playerlocations").await
    }

    /// Fetches the current chat log body.
    pub async fn fetch_chat(&self) -> Result<String, PollError> {
        self.get("api/chatlog").await
    }

    async fn get(&self, path: &str) -> Result<String, PollError> {
        let url = format!("{}/{path}", self.config.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PollError::Status(resp.status().as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| PollError::Request(e.to_string()))
    }

    /// Polls both endpoints on their intervals until `shutdown` fires or the
    /// receiver is dropped.  The first poll of each happens immediately.
    ///
    /// A request still in flight when `shutdown` fires is abandoned.
    pub async fn run(self, tx: mpsc::Sender<Snapshot>, shutdown: CancellationToken) {
        let mut roster_tick = interval(self.config.roster_interval);
        let mut chat_tick = interval(self.config.chat_interval);
        roster_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        chat_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let roster = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = roster_tick.tick() => true,
                _ = chat_tick.tick() => false,
            };
            let request = async {
                if roster {
                    self.fetch_roster().await.map(Snapshot::Roster)
                } else {
                    self.fetch_chat().await.map(Snapshot::Chat)
                }
            };
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = request => polled,
            };

            match polled {
                Ok(snapshot) => {
                    if tx.send(snapshot).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("snapshot poll failed: {e}"),
            }
        }
        debug!("snapshot poller stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
