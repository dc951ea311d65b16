use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::provider::ProviderError;
use crate::provider_policy::ProviderPolicy;
use crate::ProviderId;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate budget checked before every upstream call. Exhaustion is reported
/// as `RateLimited` without touching the network.
#[derive(Clone)]
pub struct RequestBudget {
    provider_id: ProviderId,
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
}

impl RequestBudget {
    pub fn new(provider_id: ProviderId, quota_window: Duration, quota_limit: u32) -> Self {
        Self {
            provider_id,
            limiter: Arc::new(RateLimiter::direct(quota_from_window(quota_window, quota_limit))),
            clock: DefaultClock::default(),
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(policy.provider_id, policy.quota_window, policy.quota_limit)
    }

    /// Takes one cell of budget, or returns how long until one frees up.
    pub fn acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    pub fn acquire_or_error(&self) -> Result<(), ProviderError> {
        self.acquire().map_err(|wait| {
            ProviderError::rate_limited(format!(
                "{} request budget exhausted; retry in {} ms",
                self.provider_id,
                wait.as_millis()
            ))
        })
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let burst = NonZeroU32::new(quota_limit.max(1)).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(burst.get())).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
