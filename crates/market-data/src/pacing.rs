//! Request pacing and retry policy

use config::{BackoffKind, ProviderSettings};
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{MarketDataError, Result};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Minimum interval between requests to one provider.
///
/// A single-cell token bucket shared by every worker talking to that
/// provider, so request cadence does not grow with concurrency. A zero
/// interval disables limiting.
pub struct RequestLimiter {
    min_interval: Duration,
    limiter: Option<Limiter>,
}

impl fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLimiter")
            .field("min_interval", &self.min_interval)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

impl RequestLimiter {
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(RateLimiter::direct);
        Self {
            min_interval,
            limiter,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Wait until the next request is allowed, or until `cancel` fires
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(MarketDataError::Cancelled);
        }
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        if limiter.check().is_ok() {
            return Ok(());
        }

        debug!(interval_ms = self.min_interval.as_millis() as u64, "Rate limiting: waiting for slot");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MarketDataError::Cancelled),
            _ = limiter.until_ready() => Ok(()),
        }
    }
}

/// Bounded retry schedule for one page request
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per page, including the first
    pub max_attempts: u32,
    pub kind: BackoffKind,
    /// Sleep after a rate-limit response
    pub rate_limit_backoff: Duration,
    /// First sleep after a transport failure
    pub transient_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            max_attempts: settings.max_retries.max(1),
            kind: settings.backoff,
            rate_limit_backoff: Duration::from_secs(settings.rate_limit_backoff_seconds),
            transient_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(settings.max_backoff_seconds),
        }
    }

    /// Sleep before retrying after the `attempt`-th (1-based) rate limit
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        self.scaled(self.rate_limit_backoff, attempt)
    }

    /// Sleep before retrying after the `attempt`-th transport failure.
    /// Always grows, whatever the configured kind.
    pub fn transient_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.transient_backoff
            .saturating_mul(factor)
            .min(self.max_backoff.max(self.transient_backoff))
    }

    fn scaled(&self, base: Duration, attempt: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => base,
            BackoffKind::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(self.max_backoff.max(base))
            }
        }
    }
}

/// Sleep unless cancelled first
pub async fn cancellable_sleep(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(MarketDataError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(MarketDataError::Cancelled),
        _ = sleep(duration) => Ok(()),
    }
}
