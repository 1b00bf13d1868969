//! Bounded exponential-backoff retry around a single step.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, warn};

use crate::steps::{
    AttemptRecord, ErrorKind, Metrics, OperationError, OperationOutcome, StepResult,
    ATTEMPT_HISTORY_KEY,
};

use super::cancel::CancellationToken;

/// Retry parameters applied uniformly to every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first. Values below 1 act as 1.
    pub max_attempts: u32,

    /// Delay after the first failed attempt; doubles on each retry.
    pub base_delay: Duration,

    /// Upper bound on the exponential part of the delay.
    pub max_delay: Duration,

    /// Add a random delay in `[0, base_delay)` to each sleep.
    pub jitter: bool,

    /// Whether a timed-out attempt may be retried.
    pub retry_timeouts: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
            retry_timeouts: true,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with jitter enabled.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Enable or disable retrying timed-out attempts.
    pub fn with_retry_timeouts(mut self, retry_timeouts: bool) -> Self {
        self.retry_timeouts = retry_timeouts;
        self
    }

    fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the retry that follows failed attempt number `attempt`.
    ///
    /// `min(base_delay * 2^(attempt-1), max_delay)`, without jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn jitter_delay(&self) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        if !self.jitter || base == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..base))
    }

    /// Whether an error of this kind may be retried.
    pub fn is_retryable(&self, error: &OperationError) -> bool {
        match error.kind {
            ErrorKind::Transient => true,
            ErrorKind::Timeout => self.retry_timeouts,
            ErrorKind::Fatal | ErrorKind::Cancelled => false,
        }
    }

    /// Run `action` until it succeeds, fails fatally, or the attempt budget runs out.
    ///
    /// `action` receives the 1-based attempt number. When `retryable` is false
    /// the first failure is final regardless of its kind. Backoff sleeps end
    /// early if `cancel` fires, and no further attempt is made.
    pub fn execute<F>(
        &self,
        step_id: &str,
        retryable: bool,
        cancel: &CancellationToken,
        mut action: F,
    ) -> StepResult
    where
        F: FnMut(u32) -> OperationOutcome,
    {
        let limit = self.attempt_limit();
        let started_at = Utc::now();
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let attempt_started = Utc::now();
            let outcome = action(attempt);
            let attempt_finished = Utc::now();

            history.push(AttemptRecord {
                attempt,
                started_at: attempt_started,
                finished_at: attempt_finished,
                error_kind: outcome.as_ref().err().map(|e| e.kind),
            });

            let error = match outcome {
                Ok(mut metrics) => {
                    record_history(&mut metrics, &history);
                    debug!(step = step_id, attempt, "Step succeeded");
                    return StepResult::succeeded(
                        step_id,
                        attempt,
                        started_at,
                        attempt_finished,
                        metrics,
                    );
                }
                Err(error) => error,
            };

            let may_retry = retryable && self.is_retryable(&error);
            if !may_retry || attempt >= limit {
                if may_retry {
                    warn!(
                        step = step_id,
                        attempts = attempt,
                        "Retry budget exhausted: {}",
                        error
                    );
                }
                let mut metrics = Metrics::new();
                record_history(&mut metrics, &history);
                return StepResult::failed(
                    step_id,
                    attempt,
                    started_at,
                    attempt_finished,
                    error,
                    metrics,
                );
            }

            let delay = self.backoff_delay(attempt) + self.jitter_delay();
            warn!(
                step = step_id,
                attempt,
                max_attempts = limit,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed: {}. Retrying",
                error
            );

            if cancel.wait_timeout(delay) {
                let mut metrics = Metrics::new();
                record_history(&mut metrics, &history);
                return StepResult::failed(
                    step_id,
                    attempt,
                    started_at,
                    Utc::now(),
                    OperationError::cancelled(format!(
                        "run cancelled during backoff after attempt {}: {}",
                        attempt, error.message
                    )),
                    metrics,
                );
            }
        }
    }
}

fn record_history(metrics: &mut Metrics, history: &[AttemptRecord]) {
    if let Ok(value) = serde_json::to_value(history) {
        metrics.insert(ATTEMPT_HISTORY_KEY.to_string(), value);
    }
}
