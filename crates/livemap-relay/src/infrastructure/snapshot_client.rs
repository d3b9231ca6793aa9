//! HTTP client for the game server's REST snapshots.
//!
//! Bodies are returned as raw text.  The token is sent as a query parameter
//! because that is the only auth the upstream plugin accepts; it is never
//! logged.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::application::{SnapshotError, SnapshotSource};
use crate::domain::UpstreamConfig;

/// [`SnapshotSource`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: Client,
    config: UpstreamConfig,
}

impl HttpSnapshotSource {
    /// Builds a client with the configured per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Request`] if the TLS backend cannot be
    /// initialised.
    pub fn new(config: UpstreamConfig) -> Result<Self, SnapshotError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SnapshotError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Result<String, SnapshotError> {
        let url = self.config.endpoint_url(path);
        debug!(%url, "fetching snapshot");

        let resp = self
            .client
            .get(&url)
            .query(query)
            .query(&[("token", self.config.token.as_str())])
            .send()
            .await
            .map_err(|e| SnapshotError::Request(e.without_url().to_string()))?;

        if !resp.status().is_success() {
            return Err(SnapshotError::Status(resp.status().as_u16()));
        }

        resp.text()
            .await
            .map_err(|e| SnapshotError::Request(e.without_url().to_string()))
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn chat_log(&self) -> Result<String, SnapshotError> {
        let count = self.config.chat_log_count.to_string();
        self.fetch("chatlog", &[("count", count)]).await
    }

    async fn player_locations(&self) -> Result<String, SnapshotError> {
        self.fetch("playerlocations", &[]).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
