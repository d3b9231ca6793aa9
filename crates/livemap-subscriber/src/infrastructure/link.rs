//! Reconnecting WebSocket link from a consumer to the relay.
//!
//! [`SubscriberLink::connect`] spawns one driver task that runs the same
//! state machine as the relay's upstream link, with its own reconnect timer.
//! The handle exposes what a UI needs: the current [`LinkState`], the most
//! recent message (overwrite semantics, no history), and a `send` that only
//! works while connected.
//!
//! The latest-message slot drops frames that arrive faster than its reader
//! wakes up.  Consumers that must apply every frame (a chunk cache, say) take
//! a lossless stream from [`SubscriberLink::frames`] instead.
//!
//! Outbound messages accepted just before a disconnect are discarded, never
//! replayed on the next connection.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use livemap_core::{LinkError, LinkState, ReconnectTimer};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::SubscriberConfig;

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open lossless frame streams handed out by [`SubscriberLink::frames`].
type FrameTaps = Arc<Mutex<Vec<mpsc::UnboundedSender<Arc<str>>>>>;

/// Handle to a running subscriber link.
///
/// Dropping the handle tears the link down without waiting for the driver;
/// [`SubscriberLink::teardown`] also waits for it to finish.
#[derive(Debug)]
pub struct SubscriberLink {
    state: watch::Receiver<LinkState>,
    latest: watch::Receiver<Option<Arc<str>>>,
    taps: FrameTaps,
    outbound: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl SubscriberLink {
    /// Starts connecting to `config.relay_url` in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: SubscriberConfig) -> Self {
        let (state_tx, state_rx) = watch::channel(LinkState::Disconnected);
        let (latest_tx, latest_rx) = watch::channel(None);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let taps = FrameTaps::default();

        let driver = Driver {
            url: config.relay_url,
            reconnect_delay: config.reconnect_delay,
            state: state_tx,
            latest: latest_tx,
            taps: Arc::clone(&taps),
            outbound: outbound_rx,
            timer: ReconnectTimer::new(),
        };
        let task = tokio::spawn(driver.run(shutdown.clone()));

        Self {
            state: state_rx,
            latest: latest_rx,
            taps,
            outbound: outbound_tx,
            shutdown,
            driver: Some(task),
        }
    }

    /// The link's current state.
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Returns `true` while the relay connection is open.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// The most recent message received from the relay, if any.
    ///
    /// Each new message replaces the previous one.  The value survives
    /// reconnects until the next message arrives.
    pub fn latest_message(&self) -> Option<Arc<str>> {
        self.latest.borrow().clone()
    }

    /// A receiver that is notified every time a message arrives.
    pub fn watch_messages(&self) -> watch::Receiver<Option<Arc<str>>> {
        self.latest.clone()
    }

    /// A stream of every message received from now on, in arrival order.
    ///
    /// Nothing is skipped or coalesced.  The stream ends when the link is
    /// torn down.  Messages that arrived before the call are not replayed.
    pub fn frames(&self) -> mpsc::UnboundedReceiver<Arc<str>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// A receiver that is notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.state.clone()
    }

    /// Sends `message` to the relay if the link is connected.
    ///
    /// Returns `false`, and does nothing, when the link is not connected.
    pub fn send(&self, message: impl Into<String>) -> bool {
        if !self.is_connected() {
            debug!("send while not connected; dropped");
            return false;
        }
        self.outbound.send(message.into()).is_ok()
    }

    /// Cancels any pending reconnect, closes the connection, and waits for
    /// the driver task to exit.
    pub async fn teardown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.driver.take() {
            if let Err(e) = task.await {
                warn!("subscriber link driver ended abnormally: {e}");
            }
        }
    }
}

impl Drop for SubscriberLink {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ── Driver task ───────────────────────────────────────────────────────────────

struct Driver {
    url: String,
    reconnect_delay: Duration,
    state: watch::Sender<LinkState>,
    latest: watch::Sender<Option<Arc<str>>>,
    taps: FrameTaps,
    outbound: mpsc::UnboundedReceiver<String>,
    timer: ReconnectTimer,
}

impl Driver {
    async fn run(mut self, shutdown: CancellationToken) {
        loop {
            self.set_state(LinkState::Connecting);

            let attempt = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match attempt {
                Ok((ws, _response)) => {
                    self.timer.cancel();
                    self.discard_outbound();
                    self.set_state(LinkState::Connected);
                    info!(url = %self.url, "connected to relay");

                    match self.session(ws, &shutdown).await {
                        Ok(()) => break,
                        Err(e) => warn!("relay connection lost: {e}"),
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
            self.discard_outbound();
            self.timer.schedule(self.reconnect_delay);
            debug!(delay = ?self.reconnect_delay, "relay reconnect scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.timer.wait() => {}
            }
        }

        self.timer.cancel();
        self.set_state(LinkState::Disconnected);
        // Ends every frame stream.
        self.taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("subscriber link stopped");
    }

    /// Runs one connection.  `Ok(())` means the link was torn down.
    async fn session(
        &mut self,
        mut ws: RelayStream,
        shutdown: &CancellationToken,
    ) -> Result<(), LinkError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
                outbound = self.outbound.recv() => {
                    let Some(text) = outbound else {
                        // Every handle is gone.
                        let _ = ws.close(None).await;
                        return Ok(());
                    };
                    ws.send(WsMessage::Text(text))
                        .await
                        .map_err(|e| LinkError::Transport(e.to_string()))?;
                }
                inbound = ws.next() => match inbound {
                    Some(Ok(WsMessage::Text(text))) => self.publish(Arc::from(text)),
                    Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => self.publish(Arc::from(text)),
                        Err(_) => warn!("ignoring binary relay frame that is not UTF-8"),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => return Err(LinkError::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(LinkError::Transport(e.to_string())),
                },
            }
        }
    }

    /// Hands one inbound message to every frame stream, then overwrites the
    /// latest-message slot.  Streams whose receiver is gone are forgotten.
    fn publish(&self, message: Arc<str>) {
        self.taps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tap| tap.send(Arc::clone(&message)).is_ok());
        self.latest.send_replace(Some(message));
    }

    /// Drops queued outbound messages so none cross a reconnect.
    fn discard_outbound(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "discarded unsent messages");
        }
    }

    fn set_state(&self, next: LinkState) {
        let prev = *self.state.borrow();
        if prev == next {
            return;
        }
        debug_assert!(
            prev.can_transition_to(next),
            "illegal subscriber transition {prev} -> {next}"
        );
        self.state.send_replace(next);
        debug!(from = %prev, to = %next, "subscriber link state changed");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(url: String, delay: Duration) -> SubscriberConfig {
        SubscriberConfig {
            relay_url: url,
            reconnect_delay: delay,
        }
    }

    #[tokio::test]
    async fn test_send_before_connect_is_rejected() {
        // Arrange: nothing listens here
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let link = SubscriberLink::connect(config(format!("ws://{addr}/ws"), Duration::from_secs(60)));

        // Act
        let accepted = link.send("hello");

        // Assert
        assert!(!accepted);
        assert!(!link.is_connected());
        link.teardown().await;
    }

    #[tokio::test]
    async fn test_latest_message_overwrites() {
        // Arrange: a relay that sends two frames
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(WsMessage::Text("first".into())).await.unwrap();
            ws.send(WsMessage::Text("second".into())).await.unwrap();
            while ws.next().await.is_some() {}
        });
        let link = SubscriberLink::connect(config(format!("ws://{addr}/ws"), Duration::from_secs(60)));
        let mut messages = link.watch_messages();

        // Act
        timeout(WAIT, messages.wait_for(|m| m.as_deref() == Some("second")))
            .await
            .unwrap()
            .unwrap();

        // Assert: only the latest is retained
        assert_eq!(link.latest_message().as_deref(), Some("second"));
        link.teardown().await;
    }

    #[tokio::test]
    async fn test_teardown_while_waiting_to_reconnect() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let link = SubscriberLink::connect(config(format!("ws://{addr}/ws"), Duration::from_secs(3600)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = link.watch_state();

        // Act
        timeout(WAIT, link.teardown()).await.unwrap();

        // Assert
        assert_eq!(*state.borrow(), LinkState::Disconnected);
    }

    #[tokio::test]
    async fn test_frame_stream_ends_on_teardown() {
        // Arrange
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let link = SubscriberLink::connect(config(format!("ws://{addr}/ws"), Duration::from_secs(60)));
        let mut frames = link.frames();

        // Act
        link.teardown().await;

        // Assert
        assert!(timeout(WAIT, frames.recv()).await.unwrap().is_none());
    }
}
