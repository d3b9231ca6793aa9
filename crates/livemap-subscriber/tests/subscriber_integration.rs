//! End-to-end tests for `SubscriberLink` against a scripted relay.
//!
//! The fake relay accepts WebSocket connections on an ephemeral port and hands
//! each one to the test as a [`Conn`]: the test can push frames down it, hang
//! it up, and read whatever the subscriber sent.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use livemap_core::LinkState;
use livemap_subscriber::application::DashboardState;
use livemap_subscriber::domain::SubscriberConfig;
use livemap_subscriber::infrastructure::SubscriberLink;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

// ── Fake relay ────────────────────────────────────────────────────────────────

enum Cmd {
    Send(String),
    Hangup,
}

/// One accepted subscriber connection, seen from the relay side.
struct Conn {
    cmds: mpsc::UnboundedSender<Cmd>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl Conn {
    fn send(&self, text: impl Into<String>) {
        self.cmds.send(Cmd::Send(text.into())).unwrap();
    }

    fn hangup(&self) {
        self.cmds.send(Cmd::Hangup).unwrap();
    }

    async fn next_inbound(&mut self) -> Option<String> {
        timeout(WAIT, self.inbound.recv()).await.expect("relay side timed out")
    }
}

/// Returns the relay's `ws://` URL and a stream of accepted connections.
async fn fake_relay() -> (String, mpsc::UnboundedReceiver<Conn>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let Ok(mut ws) = accept_async(tcp).await else {
                continue;
            };
            let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            if accepted_tx
                .send(Conn {
                    cmds: cmd_tx,
                    inbound: in_rx,
                })
                .is_err()
            {
                return;
            }

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        cmd = cmd_rx.recv() => match cmd {
                            Some(Cmd::Send(text)) => {
                                if ws.send(Message::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            // Drop the socket without a close handshake.
                            Some(Cmd::Hangup) | None => break,
                        },
                        msg = ws.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                let _ = in_tx.send(text);
                            }
                            Some(Ok(_)) => {}
                            Some(Err(_)) | None => break,
                        },
                    }
                }
            });
        }
    });

    (format!("ws://{addr}/ws"), accepted_rx)
}

async fn next_conn(accepted: &mut mpsc::UnboundedReceiver<Conn>) -> Conn {
    timeout(WAIT, accepted.recv())
        .await
        .expect("no connection accepted")
        .expect("relay stopped")
}

async fn wait_for_state(link: &SubscriberLink, want: LinkState) {
    let mut states = link.watch_state();
    timeout(WAIT, states.wait_for(|s| *s == want))
        .await
        .unwrap_or_else(|_| panic!("link never reached {want}"))
        .unwrap();
}

fn connect(url: String, delay: Duration) -> SubscriberLink {
    SubscriberLink::connect(SubscriberConfig {
        relay_url: url,
        reconnect_delay: delay,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_reaches_relay_when_connected() {
    // Arrange
    let (url, mut accepted) = fake_relay().await;
    let link = connect(url, Duration::from_secs(60));
    let mut conn = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;

    // Act
    let sent = link.send("ping");

    // Assert
    assert!(sent);
    assert_eq!(conn.next_inbound().await.as_deref(), Some("ping"));
    link.teardown().await;
}

#[tokio::test]
async fn test_send_while_disconnected_never_reaches_next_connection() {
    // Arrange
    let (url, mut accepted) = fake_relay().await;
    let link = connect(url, Duration::from_millis(300));
    let first = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;

    // Act: lose the connection and try to send during the gap
    first.hangup();
    wait_for_state(&link, LinkState::Disconnected).await;
    let during = link.send("during");

    let mut second = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;
    let after = link.send("after");

    // Assert
    assert!(!during);
    assert!(after);
    assert_eq!(second.next_inbound().await.as_deref(), Some("after"));
    link.teardown().await;
}

#[tokio::test]
async fn test_reconnects_after_hangup_and_keeps_latest_message() {
    // Arrange
    let (url, mut accepted) = fake_relay().await;
    let link = connect(url, Duration::from_millis(50));
    let first = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;
    let mut messages = link.watch_messages();
    first.send("seq1");
    timeout(WAIT, messages.wait_for(|m| m.as_deref() == Some("seq1")))
        .await
        .unwrap()
        .unwrap();

    // Act
    first.hangup();
    let second = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;

    // Assert: the last message survives the reconnect until replaced
    assert_eq!(link.latest_message().as_deref(), Some("seq1"));
    second.send("seq2");
    timeout(WAIT, messages.wait_for(|m| m.as_deref() == Some("seq2")))
        .await
        .unwrap()
        .unwrap();
    link.teardown().await;
}

#[tokio::test]
async fn test_teardown_closes_connection() {
    // Arrange
    let (url, mut accepted) = fake_relay().await;
    let link = connect(url, Duration::from_millis(50));
    let mut conn = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;
    let states = link.watch_state();

    // Act
    timeout(WAIT, link.teardown()).await.unwrap();

    // Assert: the relay side sees the socket end and nothing reconnects
    assert_eq!(conn.next_inbound().await, None);
    assert_eq!(*states.borrow(), LinkState::Disconnected);
    assert!(timeout(Duration::from_millis(300), accepted.recv()).await.is_err());
}

#[tokio::test]
async fn test_relayed_frames_drive_dashboard() {
    // Arrange
    let (url, mut accepted) = fake_relay().await;
    let link = connect(url, Duration::from_secs(60));
    let conn = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;
    let mut messages = link.watch_messages();
    let mut dashboard = DashboardState::new();
    dashboard.set_link_state(link.state());

    let frames = [
        json!({"type": "connection_status", "connected": true, "timestamp": "2026-01-01T00:00:00Z"}),
        json!({"type": "player_update", "players": [
            {"name": "Guide", "x": 10, "y": 20, "active": true},
            {"name": "Nurse", "x": 30, "y": 40, "active": false}
        ]}),
        json!({"type": "chunk_update", "chunkX": 0, "chunkY": 0, "width": 1, "height": 1,
               "colors": ["#123456"], "mapWidth": 8400, "mapHeight": 2400}),
        json!({"type": "weather_update", "rain": true}),
    ];

    // Act: one frame at a time, since only the latest is retained
    let mut kinds = Vec::new();
    for frame in frames {
        let text = frame.to_string();
        conn.send(text.clone());
        timeout(WAIT, messages.wait_for(|m| m.as_deref() == Some(text.as_str())))
            .await
            .unwrap()
            .unwrap();
        kinds.push(dashboard.apply_message(&text).unwrap());
    }

    // Assert
    assert_eq!(
        kinds,
        ["connection_status", "player_update", "chunk_update", "unknown"]
    );
    assert!(dashboard.connected);
    assert!(dashboard.upstream_connected);
    assert_eq!(dashboard.players.len(), 2);
    assert_eq!(dashboard.active_players(), 1);
    assert_eq!(dashboard.chunks.len(), 1);
    assert_eq!(dashboard.map_size, (8400, 2400));
    link.teardown().await;
}

#[tokio::test]
async fn test_chunk_burst_reaches_dashboard_in_full() {
    // Arrange
    let (url, mut accepted) = fake_relay().await;
    let link = connect(url, Duration::from_secs(60));
    let mut frames = link.frames();
    let conn = next_conn(&mut accepted).await;
    wait_for_state(&link, LinkState::Connected).await;
    let mut dashboard = DashboardState::new();

    // Act: 50 chunks back to back, faster than any consumer wakes up
    for x in 0..50 {
        conn.send(
            json!({"type": "chunk_update", "chunkX": x, "chunkY": 0, "width": 1, "height": 1,
                   "colors": ["#000000"]})
            .to_string(),
        );
    }
    for _ in 0..50 {
        let text = timeout(WAIT, frames.recv())
            .await
            .expect("frame stream stalled")
            .expect("frame stream ended");
        dashboard.apply_message(&text).unwrap();
    }

    // Assert: every chunk was cached, in order
    assert_eq!(dashboard.chunks.len(), 50);
    assert!((0..50).all(|x| dashboard.chunks.contains_key(&(x, 0))));
    link.teardown().await;
}
