//! LiveMap relay entry point.
//!
//! Keeps one WebSocket open to the game server's live map feed and fans
//! every frame out to browser subscribers on `/ws`.  Also proxies the game
//! server's chat log and player roster under `/api` so the access token never
//! reaches the browser.
//!
//! # Usage
//!
//! ```text
//! livemap-relay [OPTIONS]
//!
//! Options:
//!   --bind <IP>                 Bind address [default: 0.0.0.0]
//!   --port <PORT>               HTTP/WebSocket port [default: 5000]
//!   --upstream-ws-url <URL>     Live map WebSocket [default: ws://127.0.0.1:8585/map/ws/]
//!   --upstream-base-url <URL>   REST API base [default: http://127.0.0.1:7878]
//!   --token <TOKEN>             REST API token [default: yourtoken]
//!   --reconnect-secs <SECS>     Upstream reconnect delay [default: 5]
//!   --rate-limit <N>            /api requests per window per IP [default: 10]
//!   --rate-window-ms <MS>       Rate-limit window [default: 1000]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                  | Default                       |
//! |---------------------------|-------------------------------|
//! | `LIVEMAP_BIND`            | `0.0.0.0`                     |
//! | `PORT`                    | `5000`                        |
//! | `TERRARIA_WS_URL`         | `ws://127.0.0.1:8585/map/ws/` |
//! | `TERRARIA_BASE_URL`       | `http://127.0.0.1:7878`       |
//! | `TERRARIA_TOKEN`          | `yourtoken`                   |
//! | `LIVEMAP_RECONNECT_SECS`  | `5`                           |
//! | `LIVEMAP_RATE_LIMIT`      | `10`                          |
//! | `LIVEMAP_RATE_WINDOW_MS`  | `1000`                        |
//!
//! CLI args take precedence when both are present.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use livemap_core::LinkState;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use livemap_relay::application::RelayService;
use livemap_relay::domain::{RateLimitConfig, RelayConfig, UpstreamConfig};
use livemap_relay::infrastructure::{run_server, HttpSnapshotSource, UpstreamLink};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// WebSocket fan-out relay for a game server's live map.
#[derive(Debug, Parser)]
#[command(
    name = "livemap-relay",
    about = "Relays a game server's live map WebSocket to many browser subscribers",
    version
)]
struct Cli {
    /// IP address to bind the HTTP/WebSocket server to.
    #[arg(long, default_value = "0.0.0.0", env = "LIVEMAP_BIND")]
    bind: String,

    /// Port for the HTTP/WebSocket server.
    #[arg(long, default_value_t = 5000, env = "PORT")]
    port: u16,

    /// The game server's live map WebSocket URL.
    #[arg(
        long,
        default_value = "ws://127.0.0.1:8585/map/ws/",
        env = "TERRARIA_WS_URL"
    )]
    upstream_ws_url: String,

    /// Base URL of the game server's REST API.
    #[arg(long, default_value = "http://127.0.0.1:7878", env = "TERRARIA_BASE_URL")]
    upstream_base_url: String,

    /// Access token for the REST API.
    #[arg(
        long,
        default_value = "yourtoken",
        env = "TERRARIA_TOKEN",
        hide_env_values = true
    )]
    token: String,

    /// Seconds to wait before reconnecting to the live map.
    #[arg(long, default_value_t = 5, env = "LIVEMAP_RECONNECT_SECS")]
    reconnect_secs: u64,

    /// `/api` requests allowed per window per client IP.
    #[arg(long, default_value_t = 10, env = "LIVEMAP_RATE_LIMIT")]
    rate_limit: u32,

    /// Rate-limit window length in milliseconds.
    #[arg(long, default_value_t = 1000, env = "LIVEMAP_RATE_WINDOW_MS")]
    rate_window_ms: u64,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` is not an IP address or an upstream URL
    /// uses the wrong scheme.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address: '{}'", self.bind))?;

        if !(self.upstream_ws_url.starts_with("ws://")
            || self.upstream_ws_url.starts_with("wss://"))
        {
            anyhow::bail!(
                "upstream WebSocket URL must start with ws:// or wss://: '{}'",
                self.upstream_ws_url
            );
        }
        if !(self.upstream_base_url.starts_with("http://")
            || self.upstream_base_url.starts_with("https://"))
        {
            anyhow::bail!(
                "upstream base URL must start with http:// or https://: '{}'",
                self.upstream_base_url
            );
        }

        Ok(RelayConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            upstream: UpstreamConfig {
                ws_url: self.upstream_ws_url,
                base_url: self.upstream_base_url,
                token: self.token,
                reconnect_delay: Duration::from_secs(self.reconnect_secs),
                ..UpstreamConfig::default()
            },
            rate_limit: RateLimitConfig {
                max_requests: self.rate_limit,
                window: Duration::from_millis(self.rate_window_ms),
            },
        })
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

    let config = Cli::parse().into_relay_config()?;

    info!(
        "LiveMap relay starting: bind={}, upstream={}, api={}",
        config.bind_addr, config.upstream.ws_url, config.upstream.base_url
    );

    // ── Graceful shutdown ─────────────────────────────────────────────────────
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

    // ── Wiring ────────────────────────────────────────────────────────────────
    let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
    let snapshots = HttpSnapshotSource::new(config.upstream.clone())
        .context("failed to build snapshot HTTP client")?;
    let relay = Arc::new(RelayService::new(
        config.rate_limit,
        Arc::new(snapshots),
        state_rx,
    ));

    let link = UpstreamLink::new(&config.upstream, Arc::clone(relay.broadcaster()), state_tx);
    let link_task = tokio::spawn(link.run(shutdown.clone()));

    let served = run_server(config.bind_addr, relay, shutdown.clone()).await;

    // The server may have failed before Ctrl+C; stop the link either way.
    shutdown.cancel();
    link_task.await.context("upstream link task panicked")?;
    served?;

    info!("LiveMap relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
