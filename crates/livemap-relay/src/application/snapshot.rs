//! Seam between the REST proxy routes and the game server's snapshot API.
//!
//! The relay does not interpret snapshot bodies.  It forwards the raw JSON
//! text, so the trait returns `String` and leaves parsing to consumers.

use async_trait::async_trait;
use thiserror::Error;

/// Failure fetching a snapshot from the game server.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The request could not be sent or the body could not be read.
    #[error("snapshot request failed: {0}")]
    Request(String),

    /// The game server answered with a non-success status.
    #[error("snapshot endpoint returned HTTP {0}")]
    Status(u16),
}

/// Source of read-only snapshots served under `/api`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Raw body of the most recent chat lines.
    async fn chat_log(&self) -> Result<String, SnapshotError>;

    /// Raw body of the current player roster.
    async fn player_locations(&self) -> Result<String, SnapshotError>;
}
