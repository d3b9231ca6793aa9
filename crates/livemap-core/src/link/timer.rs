//! Single-slot, cancellable reconnect timer.
//!
//! A link that loses its connection must wait a fixed delay before trying
//! again, and it must never have two reconnect attempts racing each other.
//! Holding the pending delay in one `Option` slot makes that a structural
//! invariant: [`ReconnectTimer::schedule`] overwrites (and thereby cancels)
//! whatever was pending, and [`ReconnectTimer::cancel`] empties the slot.
//!
//! The timer does not spawn anything.  The owning link awaits
//! [`ReconnectTimer::wait`] inside its own `select!` loop, so the delay re-enters
//! the link's event loop instead of blocking a thread.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// Holds at most one pending reconnect delay.
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    pending: Option<Pin<Box<Sleep>>>,
}

impl ReconnectTimer {
    /// Creates an idle timer with nothing scheduled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a reconnect `delay` from now, replacing any pending one.
    ///
    /// Returns `true` if an earlier pending delay was discarded.
    pub fn schedule(&mut self, delay: Duration) -> bool {
        let replaced = self.pending.is_some();
        self.pending = Some(Box::pin(sleep(delay)));
        replaced
    }

    /// Cancels the pending delay, if any.  Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Returns `true` while a delay is scheduled and has not yet fired.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// When the pending delay will fire, if one is scheduled.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|s| s.deadline())
    }

    /// Resolves when the pending delay elapses, then empties the slot.
    ///
    /// With nothing scheduled this never resolves, so it can sit in a
    /// `select!` arm unconditionally.  Dropping the future before it resolves
    /// leaves the delay pending.
    pub async fn wait(&mut self) {
        match self.pending.as_mut() {
            Some(delay) => {
                delay.await;
                self.pending = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
