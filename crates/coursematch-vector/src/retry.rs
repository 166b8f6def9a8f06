//! Retry policy and a shared rate-limit gate for provider calls.
//!
//! `RetryPolicy` decides *whether* a failed attempt may be retried (via a
//! predicate over [`ProviderError`]) and *how long* to wait:
//! `base * 2^attempt + jitter`, capped at `max_delay`.
//!
//! `RateLimitGate` is shared by every call made through one embedder. When
//! any call is throttled it closes the gate for the backoff delay, and every
//! other in-flight call waits on the same gate instead of running its own
//! independent backoff against an already throttled provider.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use coursematch_core::config::RetryConfig;

use crate::embedding::ProviderError;

/// Classifies provider errors into retryable and fatal.
pub type RetryPredicate = fn(&ProviderError) -> bool;

/// Default predicate: only explicit rate-limit signals are retried.
pub fn only_rate_limits(err: &ProviderError) -> bool {
    err.is_rate_limited()
}

/// Retry on rate limits and on per-attempt timeouts.
pub fn rate_limits_and_timeouts(err: &ProviderError) -> bool {
    matches!(
        err,
        ProviderError::RateLimited { .. } | ProviderError::Timeout(_)
    )
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
    retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter,
            retryable: only_rate_limits,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }

    /// Replace the retryable-error predicate.
    pub fn with_predicate(mut self, retryable: RetryPredicate) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn should_retry(&self, err: &ProviderError) -> bool {
        (self.retryable)(err)
    }

    /// Exponential delay after the failed attempt number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let exp = self.base_delay.saturating_mul(factor);
        exp.saturating_add(self.random_jitter()).min(self.max_delay)
    }

    /// Delay before the next attempt, honoring a provider `retry_after` hint
    /// when it asks for more than our own backoff.
    pub fn delay_for(&self, attempt: u32, err: &ProviderError) -> Duration {
        let backoff = self.backoff(attempt);
        match err.retry_after() {
            Some(hint) if hint > backoff => hint.min(self.max_delay),
            _ => backoff,
        }
    }

    fn random_jitter(&self) -> Duration {
        let max_ms = self.jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

/// Shared pause shared by all concurrent calls against one provider.
#[derive(Debug, Clone)]
pub struct RateLimitGate {
    origin: Instant,
    /// Milliseconds after `origin` at which calls may resume.
    resume_at_ms: Arc<AtomicU64>,
}

impl RateLimitGate {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            resume_at_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Close the gate for at least `delay`. Overlapping pauses never shorten
    /// one another.
    pub fn pause_for(&self, delay: Duration) {
        let target = self.elapsed_ms().saturating_add(delay.as_millis() as u64);
        self.resume_at_ms.fetch_max(target, Ordering::AcqRel);
    }

    /// Time left until the gate reopens.
    pub fn remaining(&self) -> Duration {
        let resume = self.resume_at_ms.load(Ordering::Acquire);
        Duration::from_millis(resume.saturating_sub(self.elapsed_ms()))
    }

    pub fn is_paused(&self) -> bool {
        !self.remaining().is_zero()
    }

    /// Wait until no pause is in effect.
    pub async fn wait_ready(&self) {
        loop {
            let remaining = self.remaining();
            if remaining.is_zero() {
                return;
            }
            tokio::time::sleep(remaining).await;
        }
    }
}

impl Default for RateLimitGate {
    fn default() -> Self {
        Self::new()
    }
}
