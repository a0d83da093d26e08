//! Bounded client-side status polling.
//!
//! The poller is an explicit task with its interval, attempt budget, status
//! source, and sleeper all injected, with no ambient timers, so tests drive it
//! deterministically with a scripted source and a no-op sleeper.
//!
//! Exhausting the attempt budget is a distinct [`PollOutcome::TimedOut`]:
//! the payment may still settle later through the callback path, so timeout
//! must never be presented as failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use posh_schemas::PaymentStatus;

// ---------------------------------------------------------------------------
// Injection seams
// ---------------------------------------------------------------------------

/// Where the poller reads payment status from. Production implementations
/// call the status endpoint (which in turn may query the gateway); tests
/// script a sequence.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// A transport error is transient: the attempt is consumed and polling
    /// continues.
    async fn fetch(&self) -> Result<PaymentStatus, String>;
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper for production use.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ---------------------------------------------------------------------------
// CancelToken
// ---------------------------------------------------------------------------

/// Cooperative cancellation for the polling loop. Cancelling interrupts an
/// in-flight sleep immediately; teardown never leaves a dangling timer.
#[derive(Clone, Default)]
pub struct CancelToken {
    notify: Arc<Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call before or during `run`, and more than once.
    pub fn cancel(&self) {
        self.notify.notify_one();
    }
}

// ---------------------------------------------------------------------------
// StatusPoller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Paid,
    Failed,
    /// Attempt budget exhausted with no terminal verdict. Distinct from
    /// `Failed`: the payment may still resolve.
    TimedOut,
    Cancelled,
}

pub struct StatusPoller {
    interval: Duration,
    max_attempts: u32,
}

impl StatusPoller {
    /// `interval` between attempts, `max_attempts` total fetches. The
    /// storefront default is 3 seconds × 40 attempts (≈ two minutes).
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        debug_assert!(max_attempts > 0, "a zero-attempt poller never resolves");
        Self {
            interval,
            max_attempts,
        }
    }

    /// Poll until a terminal status, cancellation, or budget exhaustion.
    pub async fn run(
        &self,
        source: &dyn StatusSource,
        sleeper: &dyn Sleeper,
        cancel: &CancelToken,
    ) -> PollOutcome {
        for attempt in 1..=self.max_attempts {
            match source.fetch().await {
                Ok(PaymentStatus::Paid) => return PollOutcome::Paid,
                Ok(PaymentStatus::Failed) => return PollOutcome::Failed,
                Ok(PaymentStatus::Pending) | Ok(PaymentStatus::Unpaid) => {}
                Err(err) => {
                    tracing::debug!(attempt, %err, "status fetch failed; will retry");
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = cancel.notify.notified() => return PollOutcome::Cancelled,
                    _ = sleeper.sleep(self.interval) => {}
                }
            }
        }
        PollOutcome::TimedOut
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
