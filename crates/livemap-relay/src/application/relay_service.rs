//! The one shared object behind every route.
//!
//! A single [`RelayService`] is built in `main` and handed to axum as router
//! state.  It bundles the subscriber set, the snapshot source, and the rate
//! limiter, and reads the upstream link's state from a `watch` channel.  It
//! never owns the upstream connection itself.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use livemap_core::LinkState;
use serde::Serialize;
use tokio::sync::watch;

use super::broadcaster::Broadcaster;
use super::rate_limit::{RateLimited, RateLimiter};
use super::snapshot::SnapshotSource;
use crate::domain::RateLimitConfig;

/// Shared handle used as axum state.
pub type SharedRelay = Arc<RelayService>;

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub upstream: LinkState,
    pub subscribers: usize,
    pub uptime_secs: u64,
}

/// Process-wide relay state handed to every axum handler.
///
/// Built once in `main` and shared as [`SharedRelay`].
pub struct RelayService {
    broadcaster: Arc<Broadcaster>,
    snapshots: Arc<dyn SnapshotSource>,
    limiter: RateLimiter,
    started_at: Instant,
}

impl RelayService {
    /// Builds the service around the upstream state channel.
    ///
    /// The matching `watch::Sender` belongs to the upstream link.
    pub fn new(
        rate_limit: RateLimitConfig,
        snapshots: Arc<dyn SnapshotSource>,
        upstream: watch::Receiver<LinkState>,
    ) -> Self {
        Self {
            broadcaster: Arc::new(Broadcaster::new(upstream)),
            snapshots,
            limiter: RateLimiter::new(rate_limit),
            started_at: Instant::now(),
        }
    }

    /// The subscriber set.  The upstream link holds a clone of this `Arc`.
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// The source the `/api` proxy routes read from.
    pub fn snapshots(&self) -> &dyn SnapshotSource {
        self.snapshots.as_ref()
    }

    /// Counts one `/api` request from `ip` against its budget.
    pub fn check_rate(&self, ip: IpAddr) -> Result<(), RateLimited> {
        self.limiter.check(ip, Instant::now())
    }

    /// Current status for `GET /api/health`.
    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            timestamp: Utc::now(),
            upstream: self.broadcaster.upstream_state(),
            subscribers: self.broadcaster.subscriber_count().await,
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
