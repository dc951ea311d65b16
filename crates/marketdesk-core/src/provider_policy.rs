use std::time::Duration;

use crate::ProviderId;

const QUOTA_WINDOW: Duration = Duration::from_secs(60);
const UPSTREAM_TIMEOUT_MS: u64 = 5_000;

/// Client-side request budget and timeout for one upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub timeout_ms: u64,
}

impl ProviderPolicy {
    /// Free-tier budgets per minute. Synthetic data is local and unmetered.
    pub fn default_for(provider_id: ProviderId) -> Option<Self> {
        let quota_limit = match provider_id {
            ProviderId::Alpaca => 200,
            ProviderId::Polygon => 100,
            ProviderId::Finnhub => 60,
            ProviderId::Synthetic => return None,
        };
        Some(Self {
            provider_id,
            quota_window: QUOTA_WINDOW,
            quota_limit,
            timeout_ms: UPSTREAM_TIMEOUT_MS,
        })
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}
