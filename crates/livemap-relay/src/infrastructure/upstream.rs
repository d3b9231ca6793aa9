//! The relay's single connection to the game server's live map feed.
//!
//! [`UpstreamLink::run`] is one task that drives the link state machine:
//!
//! ```text
//! disconnected ─▶ connecting ─┬─▶ connected ─▶ disconnected ─(delay)─▶ connecting ─▶ …
//!                             └─▶ disconnected (attempt failed)
//! ```
//!
//! Every text frame is handed to the [`Broadcaster`] untouched.  Losing the
//! connection (or failing to open it) schedules exactly one reconnect after
//! the configured delay.  Retries never stop and never back off; only the
//! shutdown token ends the loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use livemap_core::{LinkError, LinkState, ReconnectTimer};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::{Broadcaster, Frame};
use crate::domain::UpstreamConfig;

type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Owns the upstream WebSocket and its reconnect timer.
pub struct UpstreamLink {
    url: String,
    reconnect_delay: Duration,
    broadcaster: Arc<Broadcaster>,
    state: watch::Sender<LinkState>,
    timer: ReconnectTimer,
}

impl UpstreamLink {
    /// Creates an idle link.  Nothing connects until [`UpstreamLink::run`].
    ///
    /// `state` is the sending half of the channel the broadcaster was built
    /// with, so new subscribers see this link's connectivity.
    pub fn new(
        config: &UpstreamConfig,
        broadcaster: Arc<Broadcaster>,
        state: watch::Sender<LinkState>,
    ) -> Self {
        Self {
            url: config.ws_url.clone(),
            reconnect_delay: config.reconnect_delay,
            broadcaster,
            state,
            timer: ReconnectTimer::new(),
        }
    }

    /// Connects, relays, and reconnects until `shutdown` fires.
    ///
    /// Never returns an error: connection failures are logged and retried.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(url = %self.url, "upstream link starting");

        loop {
            self.set_state(LinkState::Connecting);

            let attempt = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match attempt {
                Ok((ws, _response)) => {
                    self.timer.cancel();
                    self.set_state(LinkState::Connected);
                    info!(url = %self.url, "connected to upstream");

                    match self.pump(ws, &shutdown).await {
                        Ok(()) => break,
                        Err(e) => warn!("upstream connection lost: {e}"),
                    }
                }
                Err(e) => {
                    let err = LinkError::Connect {
                        url: self.url.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{err}");
                }
            }

            self.set_state(LinkState::Disconnected);
            self.timer.schedule(self.reconnect_delay);
            debug!(delay = ?self.reconnect_delay, "upstream reconnect scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.timer.wait() => {}
            }
        }

        self.timer.cancel();
        self.set_state(LinkState::Disconnected);
        info!("upstream link stopped");
    }

    /// Reads frames until the connection ends.
    ///
    /// Returns `Ok(())` only when `shutdown` fired; every other exit is the
    /// reason the connection was lost.
    async fn pump(
        &self,
        mut ws: UpstreamStream,
        shutdown: &CancellationToken,
    ) -> Result<(), LinkError> {
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                next = ws.next() => next,
            };

            match next {
                Some(Ok(WsMessage::Text(text))) => self.forward(Frame::from(text)).await,
                Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => self.forward(Frame::from(text)).await,
                    Err(e) => warn!(
                        len = e.as_bytes().len(),
                        "dropping binary upstream frame that is not UTF-8"
                    ),
                },
                Some(Ok(WsMessage::Close(_))) | None => return Err(LinkError::Closed),
                // Ping/pong are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(LinkError::Transport(e.to_string())),
            }
        }
    }

    async fn forward(&self, frame: Frame) {
        let len = frame.as_str().len();
        let outcome = self.broadcaster.broadcast(frame).await;
        debug!(
            len,
            delivered = outcome.delivered,
            skipped = outcome.skipped,
            "relayed upstream frame"
        );
    }

    fn set_state(&self, next: LinkState) {
        let prev = *self.state.borrow();
        if prev == next {
            return;
        }
        debug_assert!(
            prev.can_transition_to(next),
            "illegal upstream transition {prev} -> {next}"
        );
        self.state.send_replace(next);
        debug!(from = %prev, to = %next, "upstream state changed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
