//! # Provider Adapters
//!
//! | Adapter | Upstream | Auth |
//! |---------|----------|------|
//! | [`AlpacaAdapter`] | Alpaca trading + market data REST | key id + secret headers |
//! | [`PolygonAdapter`] | Polygon aggregates REST | bearer key |
//! | [`FinnhubAdapter`] | Finnhub REST (socket lives in [`crate::stream`]) | token header |
//! | [`SyntheticProvider`] | seeded random walk, no network | none |
//!
//! HTTP adapters share one request path: budget check, transport call,
//! status mapping, JSON decode.

pub mod alpaca;
pub mod finnhub;
pub mod polygon;
pub mod synthetic;

pub use alpaca::AlpacaAdapter;
pub use finnhub::FinnhubAdapter;
pub use polygon::PolygonAdapter;
pub use synthetic::{base_price, SyntheticProvider};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse};
use crate::provider::{decode_response, ProviderError, ProviderErrorKind};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::RequestBudget;
use crate::{BarResolution, ProviderId, Symbol};

/// Authenticated, budgeted path to one HTTP upstream.
#[derive(Clone)]
pub(crate) struct Upstream {
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    auth_headers: BTreeMap<String, String>,
    budget: Option<RequestBudget>,
    timeout_ms: u64,
}

impl Upstream {
    pub(crate) fn new(provider: ProviderId, http_client: Arc<dyn HttpClient>, auth: &[HttpAuth]) -> Self {
        let mut auth_headers = BTreeMap::new();
        for scheme in auth {
            scheme.apply(&mut auth_headers);
        }

        let policy = ProviderPolicy::default_for(provider);
        Self {
            provider,
            http_client,
            auth_headers,
            budget: policy.as_ref().map(RequestBudget::from_policy),
            timeout_ms: policy
                .map(|policy| policy.timeout_ms)
                .unwrap_or(crate::http_client::DEFAULT_TIMEOUT_MS),
        }
    }

    pub(crate) fn set_policy(&mut self, policy: Option<&ProviderPolicy>) {
        self.budget = policy.map(RequestBudget::from_policy);
        if let Some(policy) = policy {
            self.timeout_ms = policy.timeout_ms;
        }
    }

    async fn send(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        if let Some(budget) = &self.budget {
            budget.acquire_or_error()?;
        }

        let mut request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        request
            .headers
            .extend(self.auth_headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        self.http_client
            .execute(request)
            .await
            .map_err(|error| ProviderError::from_http(self.provider, &error))
    }

    pub(crate) async fn get_json<T>(&self, url: &str) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(url).await?;
        decode_response(self.provider, response)
    }

    /// Connectivity check: any failure reads as `false`.
    pub(crate) async fn ping(&self, url: &str) -> Option<HttpResponse> {
        match self.send(url).await {
            Ok(response) if response.is_success() => Some(response),
            Ok(response) => {
                debug!(provider = %self.provider, status = response.status, "connectivity check rejected");
                None
            }
            Err(error) => {
                debug!(provider = %self.provider, %error, "connectivity check failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("provider", &self.provider)
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

/// Optional quote ingredient: credential and budget failures still abort,
/// anything else degrades to "missing".
pub(crate) fn optional_leg<T>(
    provider: ProviderId,
    leg: &'static str,
    ticker: &Symbol,
    result: Result<T, ProviderError>,
) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error)
            if matches!(
                error.kind(),
                ProviderErrorKind::Unauthorized | ProviderErrorKind::RateLimited
            ) =>
        {
            Err(error)
        }
        Err(error) => {
            debug!(%provider, %ticker, leg, %error, "quote ingredient unavailable, falling back");
            Ok(None)
        }
    }
}

pub(crate) fn encode_symbol(ticker: &Symbol) -> String {
    urlencoding::encode(ticker.as_str()).into_owned()
}

/// Upstream volumes arrive as JSON numbers, sometimes fractional.
pub(crate) fn volume_from(value: Option<f64>) -> Option<u64> {
    value
        .filter(|volume| volume.is_finite() && *volume >= 0.0)
        .map(|volume| volume.round() as u64)
}

pub(crate) fn resolution_multiplier(resolution: BarResolution) -> u32 {
    match resolution {
        BarResolution::Minutes(n) | BarResolution::Hours(n) => n.max(1),
        BarResolution::Day | BarResolution::Week | BarResolution::Month => 1,
    }
}

pub(crate) fn symbol_seed(ticker: &Symbol) -> u64 {
    ticker.as_str().bytes().fold(13_u64, |acc, byte| {
        acc.wrapping_mul(29).wrapping_add(u64::from(byte))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failure_is_not_tolerated() {
        let ticker = Symbol::parse("AAPL").expect("valid");
        let leg: Result<f64, _> = Err(ProviderError::unauthorized("bad key"));
        let error = optional_leg(ProviderId::Alpaca, "trade", &ticker, leg).expect_err("must abort");
        assert_eq!(error.kind(), ProviderErrorKind::Unauthorized);
    }

    #[test]
    fn transport_failure_degrades_to_missing() {
        let ticker = Symbol::parse("AAPL").expect("valid");
        let leg: Result<f64, _> = Err(ProviderError::transport("reset"));
        let value = optional_leg(ProviderId::Alpaca, "trade", &ticker, leg).expect("tolerated");
        assert_eq!(value, None);
    }

    #[test]
    fn fractional_volume_rounds() {
        assert_eq!(volume_from(Some(1234.6)), Some(1235));
        assert_eq!(volume_from(Some(-1.0)), None);
        assert_eq!(volume_from(None), None);
    }
}
