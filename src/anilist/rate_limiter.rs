use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{direct::NotKeyed, InMemoryState};
use governor::{Quota, RateLimiter as GovernorRateLimiter};

/// Spaces out requests to stay under AniList's published rate limit.
///
/// Grounded on the teacher's `infrastructure::http_client::rate_limit_client`
/// governor setup (`for_anilist`'s `create_rate_limiter`), narrowed to the
/// single direct, unkeyed limiter this client needs — one process talks to
/// one AniList account, so there is no per-key state to track.
pub struct RateLimiter {
    inner: GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>,
}

impl RateLimiter {
    /// `requests_per_second` below 1 is expressed as a period between
    /// single-token refills (e.g. 0.5/s -> one token every 2s), matching
    /// AniList's published 30 req/min budget.
    pub fn new(requests_per_second: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / requests_per_second);
        let quota = Quota::with_period(period)
            .expect("positive requests_per_second yields a nonzero period")
            .allow_burst(NonZeroU32::new(1).expect("1 is nonzero"));
        Self {
            inner: GovernorRateLimiter::direct(quota),
        }
    }

    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}
