//! Request throttling for adapters that talk to rate-limited sources.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::adapter::AdapterError;
use crate::config::RateLimit;
use crate::CrawlContext;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared token bucket; clones draw from the same budget.
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<DirectRateLimiter>,
}

impl Throttle {
    pub fn new(rate_limit: RateLimit) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_limit(rate_limit))),
        }
    }

    /// Takes one unit of budget without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Waits for budget, giving up when the crawl context finishes first.
    pub async fn acquire(&self, ctx: &CrawlContext) -> Result<(), AdapterError> {
        ctx.run(self.limiter.until_ready()).await.map(|_| ())
    }
}

fn quota_from_limit(rate_limit: RateLimit) -> Quota {
    let burst = NonZeroU32::new(rate_limit.quota_limit).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell =
        (rate_limit.quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);

    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
