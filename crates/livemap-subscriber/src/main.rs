//! livemap-watch: headless LiveMap dashboard.
//!
//! Subscribes to a relay's `/ws` endpoint, keeps the same state the browser
//! dashboard keeps (roster, chunk cache, connection indicator, chat), and
//! logs a one-line summary whenever it changes.  Optionally polls the relay's
//! `/api` snapshots on the dashboard's intervals.
//!
//! # Environment variable overrides
//!
//! | Variable                 | Default                  |
//! |--------------------------|--------------------------|
//! | `LIVEMAP_RELAY_URL`      | `ws://127.0.0.1:5000/ws` |
//! | `LIVEMAP_RECONNECT_SECS` | `3`                      |
//! | `LIVEMAP_POLL`           | off                      |

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use livemap_subscriber::application::DashboardState;
use livemap_subscriber::domain::{PollConfig, SubscriberConfig, WatchConfig};
use livemap_subscriber::infrastructure::{Snapshot, SnapshotPoller, SubscriberLink};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Headless LiveMap dashboard.
#[derive(Debug, Parser)]
#[command(
    name = "livemap-watch",
    about = "Follows a LiveMap relay and logs dashboard state",
    version
)]
struct Cli {
    /// The relay's WebSocket endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:5000/ws", env = "LIVEMAP_RELAY_URL")]
    relay_url: String,

    /// Seconds to wait before reconnecting to the relay.
    #[arg(long, default_value_t = 3, env = "LIVEMAP_RECONNECT_SECS")]
    reconnect_secs: u64,

    /// Also poll the relay's roster and chat snapshots.
    #[arg(long, env = "LIVEMAP_POLL")]
    poll: bool,

    /// Roster poll interval in seconds.
    #[arg(long, default_value_t = 2)]
    roster_interval_secs: u64,

    /// Chat poll interval in seconds.
    #[arg(long, default_value_t = 5)]
    chat_interval_secs: u64,
}

impl Cli {
    /// # Errors
    ///
    /// Returns an error if the relay URL is not a `ws://` or `wss://` URL or
    /// an interval is zero.
    fn into_watch_config(self) -> anyhow::Result<WatchConfig> {
        if !(self.relay_url.starts_with("ws://") || self.relay_url.starts_with("wss://")) {
            anyhow::bail!(
                "relay URL must start with ws:// or wss://: '{}'",
                self.relay_url
            );
        }
        if self.roster_interval_secs == 0 || self.chat_interval_secs == 0 {
            anyhow::bail!("poll intervals must be at least one second");
        }

        let subscriber = SubscriberConfig {
            relay_url: self.relay_url,
            reconnect_delay: Duration::from_secs(self.reconnect_secs),
        };
        let poll = self.poll.then(|| PollConfig {
            roster_interval: Duration::from_secs(self.roster_interval_secs),
            chat_interval: Duration::from_secs(self.chat_interval_secs),
            ..PollConfig::new(subscriber.http_base_url())
        });

        Ok(WatchConfig { subscriber, poll })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_watch_config()?;
    info!(
        "livemap-watch starting: relay={}, polling={}",
        config.subscriber.relay_url,
        config.poll.is_some()
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                signal_token.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let (snapshot_tx, mut snapshot_rx) = mpsc::channel(16);
    if let Some(poll) = config.poll.clone() {
        let poller = SnapshotPoller::new(poll).context("failed to build poll HTTP client")?;
        tokio::spawn(poller.run(snapshot_tx, shutdown.clone()));
    } else {
        drop(snapshot_tx);
    }

    let link = SubscriberLink::connect(config.subscriber);
    let mut states = link.watch_state();
    let mut frames = link.frames();
    let mut dashboard = DashboardState::new();
    let mut polling = config.poll.is_some();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                dashboard.set_link_state(state);
                info!(link = %state, "{}", dashboard.summary());
            }
            frame = frames.recv() => {
                let Some(text) = frame else {
                    break;
                };
                match dashboard.apply_message(&text) {
                    Ok(kind) => {
                        debug!(kind, "applied relay frame");
                        if kind == "connection_status" {
                            info!("{}", dashboard.summary());
                        }
                    }
                    Err(e) => warn!("ignoring relay frame: {e}"),
                }
            }
            snapshot = snapshot_rx.recv(), if polling => {
                let applied = match snapshot {
                    Some(Snapshot::Roster(body)) => dashboard.apply_player_snapshot(&body),
                    Some(Snapshot::Chat(body)) => dashboard.apply_chat_snapshot(&body),
                    None => {
                        polling = false;
                        continue;
                    }
                };
                match applied {
                    Ok(()) => debug!("{}", dashboard.summary()),
                    Err(e) => warn!("ignoring snapshot: {e}"),
                }
            }
        }
    }

    link.teardown().await;
    info!("livemap-watch stopped: {}", dashboard.summary());
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
