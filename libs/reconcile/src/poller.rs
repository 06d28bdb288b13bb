//! Status polling.
//!
//! [`StatusPoller::wait_for`] is the single wait primitive behind every
//! lifecycle transition. It polls `describe` at a fixed interval and stops on
//! the first of:
//!
//! - the observed status is accepted by the target,
//! - describe reports not-found (absence is final, it is never retried),
//! - the deadline passes,
//! - describe fails with anything other than not-found,
//! - the cancellation signal is raised.

use std::sync::Arc;
use std::time::Duration;

use nbr_id::ResourceName;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::client::ResourceClient;
use crate::error::{ReconcileError, RemoteCall};
use crate::observed::ObservedState;
use crate::status::WaitTarget;

/// Floor for the poll interval; a zero interval would spin on describe.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How a successful wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The resource reached an accepted status.
    Reached(ObservedState),

    /// Describe reported not-found.
    Absent,
}

/// Cancellation signal for waits.
///
/// Wraps the receiving half of a `watch` flag; raising the flag to `true`
/// interrupts any wait promptly.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A signal that is never raised.
    pub fn never() -> Self {
        Self { signal: None }
    }

    pub fn from_watch(signal: watch::Receiver<bool>) -> Self {
        Self {
            signal: Some(signal),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep until `deadline`. Returns true if cancelled first.
    async fn sleep_until(&mut self, deadline: Instant) -> bool {
        loop {
            let Some(rx) = self.signal.as_mut() else {
                tokio::time::sleep_until(deadline).await;
                return false;
            };

            if *rx.borrow() {
                return true;
            }

            let sender_dropped = tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return false,
                changed = rx.changed() => changed.is_err(),
            };

            // The flag can no longer change.
            if sender_dropped {
                self.signal = None;
            }
        }
    }
}

/// Fixed-interval status poller.
pub struct StatusPoller {
    client: Arc<dyn ResourceClient>,
    interval: Duration,
    cancel: Cancellation,
}

impl StatusPoller {
    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn new(client: Arc<dyn ResourceClient>, interval: Duration) -> Self {
        Self {
            client,
            interval: interval.max(MIN_POLL_INTERVAL),
            cancel: Cancellation::never(),
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Poll until the resource satisfies `target`, is gone, or `timeout`
    /// elapses. The deadline is measured from the start of this call.
    #[instrument(skip(self), fields(name = %name, target = %target))]
    pub async fn wait_for(
        &self,
        name: &ResourceName,
        target: &WaitTarget,
        timeout: Duration,
    ) -> Result<WaitOutcome, ReconcileError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut cancel = self.cancel.clone();
        let mut polls: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled { name: name.clone() });
            }

            polls = polls.saturating_add(1);
            match self.client.describe(name).await {
                Ok(state) if target.accepts(state.status) => {
                    debug!(status = %state.status, polls, "Reached target status");
                    return Ok(WaitOutcome::Reached(state));
                }
                Ok(state) => {
                    debug!(status = %state.status, polls, "Waiting for status change");
                }
                Err(e) if e.is_not_found() => {
                    if target.waits_for_absence() {
                        debug!(polls, "Notebook instance gone");
                    } else {
                        debug!(polls, "Notebook instance disappeared while waiting");
                    }
                    return Ok(WaitOutcome::Absent);
                }
                Err(e) => {
                    return Err(ReconcileError::remote(name, RemoteCall::Describe, e));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ReconcileError::Timeout {
                    name: name.clone(),
                    target: target.clone(),
                    elapsed: now.duration_since(started),
                });
            }

            let next = (now + self.interval).min(deadline);
            if cancel.sleep_until(next).await {
                return Err(ReconcileError::Cancelled { name: name.clone() });
            }
        }
    }
}
