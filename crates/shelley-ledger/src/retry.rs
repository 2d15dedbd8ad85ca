//! Bounded retries with exponential backoff.
//!
//! A failed call is retried only when its error is
//! [`LedgerError::Unavailable`]. Whether a given HTTP failure counts as
//! unavailable depends on the call's [`Idempotency`]: a query can be repeated
//! freely, a submission only while the ledger provably never saw it.

use shelley_core::error::LedgerError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Doublings stop after this many attempts.
const MAX_BACKOFF_SHIFT: u32 = 5;

/// How many times to try a call and how long to wait in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves as one.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubled for each later attempt.
    pub base_delay: Duration,
    /// Upper bound on any single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1600),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Run `call` until it succeeds, fails terminally, or attempts run out.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(op, attempt, "ledger: succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "ledger: transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(op, attempts, error = %e, "ledger: giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// How a transport failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportFailure {
    /// No connection was established; nothing was sent.
    Connect,
    /// The request was sent but no answer arrived in time.
    Timeout,
    /// Anything else, such as a reset mid-response.
    Other,
}

/// Whether repeating a call can change ledger state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Idempotency {
    /// Read-only; safe to repeat.
    Safe,
    /// Transaction submission; repeating after delivery risks a double send.
    Submit,
}

impl Idempotency {
    /// Map a transport failure to a ledger error.
    pub fn classify_transport(self, failure: TransportFailure, detail: String) -> LedgerError {
        match (self, failure) {
            (Idempotency::Safe, _) | (Idempotency::Submit, TransportFailure::Connect) => {
                LedgerError::Unavailable(detail)
            }
            (Idempotency::Submit, _) => LedgerError::AmbiguousSubmission(detail),
        }
    }

    /// Map a non-success HTTP status to a ledger error.
    ///
    /// 429 is always retryable: the gateway throttled the call before it
    /// reached the ledger.
    pub fn classify_status(self, status: u16, detail: String) -> LedgerError {
        let detail = format!("HTTP {status}: {detail}");
        match (self, status) {
            (_, 429) => LedgerError::Unavailable(detail),
            (Idempotency::Safe, 500..=599) => LedgerError::Unavailable(detail),
            (Idempotency::Safe, _) => LedgerError::Request(detail),
            (Idempotency::Submit, 500..=599) => LedgerError::AmbiguousSubmission(detail),
            (Idempotency::Submit, _) => LedgerError::Rejected(detail),
        }
    }
}
