use std::sync::Arc;

use serde::Deserialize;

use super::{encode_symbol, optional_leg, resolution_multiplier, volume_from, Upstream};
use crate::http_client::{HttpAuth, HttpClient, ReqwestHttpClient};
use crate::normalizer::derive_quote;
use crate::provider::{MarketDataProvider, ProviderError, ProviderFuture};
use crate::provider_policy::ProviderPolicy;
use crate::{
    BarResolution, LatestTrade, ProviderBar, ProviderId, Quote, QuoteInputs, RangeSpec,
    RawTimestamp, Symbol, UtcDateTime,
};

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

const AGGREGATES_LIMIT: u32 = 50_000;

/// Polygon aggregates adapter.
#[derive(Debug, Clone)]
pub struct PolygonAdapter {
    upstream: Upstream,
    base_url: String,
}

impl PolygonAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::default()), api_key)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            upstream: Upstream::new(
                ProviderId::Polygon,
                http_client,
                &[HttpAuth::BearerToken(api_key.into())],
            ),
            base_url: String::from(DEFAULT_BASE_URL),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_policy(mut self, policy: Option<ProviderPolicy>) -> Self {
        self.upstream.set_policy(policy.as_ref());
        self
    }

    async fn previous_close(&self, ticker: &Symbol) -> Result<ProviderBar, ProviderError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/prev?adjusted=true",
            self.base_url,
            encode_symbol(ticker)
        );
        let payload: PolygonAggregatesResponse = self.upstream.get_json(&url).await?;
        payload
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(PolygonAggregate::into_provider_bar)
            .ok_or_else(|| ProviderError::not_found(format!("polygon has no previous close for {ticker}")))
    }

    async fn last_trade(&self, ticker: &Symbol) -> Result<LatestTrade, ProviderError> {
        let url = format!("{}/v2/last/trade/{}", self.base_url, encode_symbol(ticker));
        let payload: PolygonLastTradeResponse = self.upstream.get_json(&url).await?;
        let trade = payload
            .results
            .ok_or_else(|| ProviderError::not_found(format!("polygon has no trades for {ticker}")))?;

        Ok(LatestTrade {
            price: trade.p,
            timestamp: RawTimestamp::EpochNanos(trade.t),
        })
    }
}

impl MarketDataProvider for PolygonAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Polygon
    }

    fn check_connectivity<'a>(&'a self) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            let url = format!("{}/v3/reference/tickers?market=stocks&limit=1", self.base_url);
            let Some(response) = self.upstream.ping(&url).await else {
                return false;
            };
            serde_json::from_str::<PolygonStatus>(&response.body)
                .map(|payload| payload.status.as_deref() == Some("OK"))
                .unwrap_or(false)
        })
    }

    fn fetch_quote<'a>(&'a self, ticker: &'a Symbol) -> ProviderFuture<'a, Result<Quote, ProviderError>> {
        Box::pin(async move {
            let now = UtcDateTime::now();
            let (previous, trade) = tokio::join!(self.previous_close(ticker), self.last_trade(ticker));

            // The previous session aggregate doubles as the fallback price source.
            let (trade, previous) = match (trade, previous) {
                (Err(error), Err(_)) => return Err(error),
                (trade, previous) => (
                    optional_leg(ProviderId::Polygon, "trade", ticker, trade)?,
                    optional_leg(ProviderId::Polygon, "previous_close", ticker, previous)?,
                ),
            };

            let inputs = match trade {
                Some(trade) => QuoteInputs {
                    trade: Some(trade),
                    latest_bar: None,
                    previous_bar: previous,
                },
                // No trade: the previous session is both price and reference.
                None => QuoteInputs {
                    trade: None,
                    latest_bar: previous.clone(),
                    previous_bar: previous,
                },
            };

            derive_quote(ticker, &inputs, now)
        })
    }

    fn fetch_bars<'a>(
        &'a self,
        ticker: &'a Symbol,
        range: &'a RangeSpec,
    ) -> ProviderFuture<'a, Result<Vec<ProviderBar>, ProviderError>> {
        Box::pin(async move {
            let url = format!(
                "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}?adjusted=true&sort=asc&limit={}",
                self.base_url,
                encode_symbol(ticker),
                resolution_multiplier(range.resolution),
                timespan(range.resolution),
                range.start.unix_millis(),
                range.end.unix_millis(),
                AGGREGATES_LIMIT,
            );

            let payload: PolygonAggregatesResponse = self.upstream.get_json(&url).await?;
            let bars: Vec<ProviderBar> = payload
                .results
                .unwrap_or_default()
                .into_iter()
                .map(PolygonAggregate::into_provider_bar)
                .collect();

            if bars.is_empty() {
                return Err(ProviderError::not_found(format!(
                    "polygon returned no aggregates for {ticker}"
                )));
            }
            Ok(bars)
        })
    }
}

fn timespan(resolution: BarResolution) -> &'static str {
    match resolution {
        BarResolution::Minutes(_) => "minute",
        BarResolution::Hours(_) => "hour",
        BarResolution::Day => "day",
        BarResolution::Week => "week",
        BarResolution::Month => "month",
    }
}

#[derive(Debug, Deserialize)]
struct PolygonStatus {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PolygonAggregatesResponse {
    #[serde(default)]
    results: Option<Vec<PolygonAggregate>>,
}

#[derive(Debug, Deserialize)]
struct PolygonAggregate {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: Option<f64>,
}

impl PolygonAggregate {
    fn into_provider_bar(self) -> ProviderBar {
        ProviderBar::new(
            RawTimestamp::EpochMillis(self.t),
            self.o,
            self.h,
            self.l,
            self.c,
            volume_from(self.v),
        )
    }
}

#[derive(Debug, Deserialize)]
struct PolygonLastTradeResponse {
    results: Option<PolygonTrade>,
}

#[derive(Debug, Deserialize)]
struct PolygonTrade {
    p: f64,
    t: i128,
}
