//! Request spacing for the target site.
//!
//! One [`Throttle`] is shared (behind an `Arc`) by every strategy and every
//! concurrent search that talks to the same site. Spacing is a GCRA quota
//! with a burst of one, so grants are at least `min_interval` apart no
//! matter how many searches are waiting.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use tokio::time::Instant;
use tracing::debug;

type SiteRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a minimum interval between successive outbound requests.
pub struct Throttle {
    min_interval: Duration,

    /// `None` when the interval is zero.
    limiter: Option<SiteRateLimiter>,
}

impl Throttle {
    /// Create a throttle. A zero interval never waits.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| RateLimiter::direct(quota.allow_burst(nonzero!(1u32))));
        Self {
            min_interval,
            limiter,
        }
    }

    /// Create a throttle ready to be shared.
    pub fn shared(min_interval: Duration) -> Arc<Self> {
        Arc::new(Self::new(min_interval))
    }

    /// A throttle that never waits.
    pub fn unlimited() -> Arc<Self> {
        Self::shared(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for the next grant and return when it was given.
    pub async fn acquire(&self) -> Instant {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!(
                    interval_ms = self.min_interval.as_millis() as u64,
                    "Throttling request"
                );
                limiter.until_ready().await;
            }
        }
        Instant::now()
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("min_interval", &self.min_interval)
            .finish_non_exhaustive()
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Grants are decided on the limiter's clock and stamped on tokio's.
    const SLACK: Duration = Duration::from_millis(2);

    #[tokio::test]
    async fn test_successive_grants_are_spaced() {
        let throttle = Throttle::new(Duration::from_millis(50));
        let first = throttle.acquire().await;
        let second = throttle.acquire().await;
        let third = throttle.acquire().await;

        assert!(second - first >= Duration::from_millis(50) - SLACK);
        assert!(third - second >= Duration::from_millis(50) - SLACK);
    }

    #[tokio::test]
    async fn test_first_grant_does_not_wait() {
        let throttle = Throttle::new(Duration::from_secs(60));
        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_concurrent_callers_respect_spacing() {
        let throttle = Throttle::shared(Duration::from_millis(30));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let throttle = Arc::clone(&throttle);
            handles.push(tokio::spawn(async move { throttle.acquire().await }));
        }

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();
        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(30) - SLACK);
        }
    }

    #[tokio::test]
    async fn test_zero_interval_is_unlimited() {
        let throttle = Throttle::unlimited();
        let start = Instant::now();
        for _ in 0..10 {
            throttle.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_contended_grants_stay_spaced() {
        let throttle = Throttle::shared(Duration::from_millis(40));
        let start = Instant::now();
        throttle.acquire().await;

        let waiting = tokio::spawn({
            let throttle = Arc::clone(&throttle);
            async move { throttle.acquire().await }
        });
        let late = throttle.acquire().await;
        let waited = waiting.await.unwrap();

        let (first, second) = if late < waited { (late, waited) } else { (waited, late) };
        assert!(first - start >= Duration::from_millis(40) - SLACK);
        assert!(second - first >= Duration::from_millis(40) - SLACK);
    }
}
