//! Fan-out of upstream frames to every subscribed downstream connection.
//!
//! Each subscriber is represented by the sending half of an unbounded
//! `mpsc` queue.  The `/ws` session task owns the receiving half and drains
//! it into the subscriber's socket, so [`Broadcaster::broadcast`] never waits
//! on a slow browser.
//!
//! # Subscriber set invariant
//!
//! An id is in the set from [`Broadcaster::subscribe`] until the session
//! calls [`Broadcaster::unsubscribe`] on close or error.  `broadcast` skips a
//! queue whose receiver is already gone but leaves the entry for the session
//! to remove, so the count can briefly include a connection that has just
//! died.

use std::collections::HashMap;
use std::fmt;

use axum::extract::ws::Utf8Bytes;
use livemap_core::{encode_event, ConnectionStatus, LinkState, RelayEvent};
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// One relayed text frame.  Cloning bumps a refcount, so every subscriber
/// queue and socket write shares the buffer built at the upstream boundary.
pub type Frame = Utf8Bytes;

/// Identity of one downstream connection.  Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Returned by [`Broadcaster::subscribe`].  The caller owns the queue.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    /// Frames for this subscriber, in upstream arrival order.  The first frame
    /// is always the `connection_status` greeting.
    pub frames: mpsc::UnboundedReceiver<Frame>,
}

/// What happened during one [`Broadcaster::broadcast`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Subscribers the frame was queued for.
    pub delivered: usize,
    /// Subscribers whose queue was already closed.
    pub skipped: usize,
}

/// Tracks open downstream connections and copies every frame to each of them.
#[derive(Debug)]
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::UnboundedSender<Frame>>>,
    upstream: watch::Receiver<LinkState>,
}

impl Broadcaster {
    /// Creates an empty broadcaster that reports `upstream` in its greeting.
    pub fn new(upstream: watch::Receiver<LinkState>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            upstream,
        }
    }

    /// Current state of the upstream link.
    pub fn upstream_state(&self) -> LinkState {
        *self.upstream.borrow()
    }

    /// Registers a new subscriber and queues its `connection_status` greeting.
    ///
    /// The greeting is queued while the write lock is held, so no broadcast
    /// can place a data frame ahead of it.
    pub async fn subscribe(&self) -> Subscription {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut subs = self.subscribers.write().await;
        let connected = self.upstream_state().is_connected();
        match status_frame(connected) {
            // The receiver is in hand, so this send cannot fail.
            Ok(frame) => {
                let _ = tx.send(frame);
            }
            Err(e) => warn!(subscriber = %id, "failed to encode status frame: {e}"),
        }
        subs.insert(id, tx);
        let total = subs.len();
        drop(subs);

        debug!(subscriber = %id, connected, total, "subscriber added");
        Subscription { id, frames: rx }
    }

    /// Removes a subscriber.  Removing an unknown id is a no-op.
    ///
    /// Returns `true` if the id was present.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "subscriber removed");
        }
        removed
    }

    /// Queues `frame` for every subscriber whose queue is still open.
    ///
    /// The set is snapshotted first and the lock released before sending.
    /// A closed queue is skipped and does not affect the others.
    pub async fn broadcast(&self, frame: Frame) -> FanOut {
        let targets: Vec<(SubscriberId, mpsc::UnboundedSender<Frame>)> = {
            let subs = self.subscribers.read().await;
            subs.iter().map(|(id, tx)| (*id, tx.clone())).collect()
        };

        let mut outcome = FanOut::default();
        for (id, tx) in targets {
            if tx.is_closed() || tx.send(frame.clone()).is_err() {
                debug!(subscriber = %id, "subscriber queue closed; skipping");
                outcome.skipped += 1;
            } else {
                outcome.delivered += 1;
            }
        }
        outcome
    }

    /// Number of subscribers currently in the set.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

/// Encodes the greeting sent to every new subscriber.
fn status_frame(connected: bool) -> Result<Frame, livemap_core::ProtocolError> {
    let text = encode_event(&RelayEvent::ConnectionStatus(ConnectionStatus::now(
        connected,
    )))?;
    Ok(Frame::from(text))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
