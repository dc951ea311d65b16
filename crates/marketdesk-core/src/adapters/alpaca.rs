use std::sync::Arc;

use serde::Deserialize;
use time::Duration;

use super::{encode_symbol, optional_leg, resolution_multiplier, volume_from, Upstream};
use crate::http_client::{HttpAuth, HttpClient, ReqwestHttpClient};
use crate::normalizer::derive_quote;
use crate::provider::{MarketDataProvider, ProviderError, ProviderFuture};
use crate::provider_policy::ProviderPolicy;
use crate::{
    BarResolution, LatestTrade, ProviderBar, ProviderId, Quote, QuoteInputs, RangeSpec,
    RawTimestamp, Symbol, UtcDateTime,
};

pub const DEFAULT_API_BASE_URL: &str = "https://paper-api.alpaca.markets";
pub const DEFAULT_DATA_BASE_URL: &str = "https://data.alpaca.markets";

const BARS_PAGE_LIMIT: u32 = 1_000;

/// Alpaca brokerage adapter. Account endpoint for connectivity, market-data
/// endpoints for trades and bars.
#[derive(Debug, Clone)]
pub struct AlpacaAdapter {
    upstream: Upstream,
    api_base_url: String,
    data_base_url: String,
}

impl AlpacaAdapter {
    pub fn new(key_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::default()), key_id, secret_key)
    }

    pub fn with_http_client(
        http_client: Arc<dyn HttpClient>,
        key_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        let auth = [
            HttpAuth::Header {
                name: String::from("APCA-API-KEY-ID"),
                value: key_id.into(),
            },
            HttpAuth::Header {
                name: String::from("APCA-API-SECRET-KEY"),
                value: secret_key.into(),
            },
        ];

        Self {
            upstream: Upstream::new(ProviderId::Alpaca, http_client, &auth),
            api_base_url: String::from(DEFAULT_API_BASE_URL),
            data_base_url: String::from(DEFAULT_DATA_BASE_URL),
        }
    }

    pub fn with_base_urls(mut self, api_base_url: impl Into<String>, data_base_url: impl Into<String>) -> Self {
        self.api_base_url = trim_base(api_base_url.into());
        self.data_base_url = trim_base(data_base_url.into());
        self
    }

    /// Overrides the request budget; `None` disables client-side limiting.
    pub fn with_policy(mut self, policy: Option<ProviderPolicy>) -> Self {
        self.upstream.set_policy(policy.as_ref());
        self
    }

    fn stock_url(&self, ticker: &Symbol, suffix: &str) -> String {
        format!(
            "{}/v2/stocks/{}/{}",
            self.data_base_url,
            encode_symbol(ticker),
            suffix
        )
    }

    async fn latest_trade(&self, ticker: &Symbol) -> Result<LatestTrade, ProviderError> {
        let payload: AlpacaLatestTradeResponse = self
            .upstream
            .get_json(&self.stock_url(ticker, "trades/latest"))
            .await?;
        let trade = payload
            .trade
            .ok_or_else(|| ProviderError::not_found(format!("alpaca has no trades for {ticker}")))?;

        Ok(LatestTrade {
            price: trade.p,
            timestamp: RawTimestamp::Rfc3339(trade.t),
        })
    }

    async fn latest_bar(&self, ticker: &Symbol) -> Result<ProviderBar, ProviderError> {
        let payload: AlpacaLatestBarResponse = self
            .upstream
            .get_json(&self.stock_url(ticker, "bars/latest"))
            .await?;
        payload
            .bar
            .map(AlpacaBar::into_provider_bar)
            .ok_or_else(|| ProviderError::not_found(format!("alpaca has no bars for {ticker}")))
    }

    async fn previous_daily_bar(&self, ticker: &Symbol, now: UtcDateTime) -> Result<ProviderBar, ProviderError> {
        let url = format!(
            "{}?timeframe=1Day&start={}&end={}&limit=1",
            self.stock_url(ticker, "bars"),
            urlencoding::encode(&(now - Duration::days(1)).format_rfc3339()),
            urlencoding::encode(&now.format_rfc3339()),
        );
        let payload: AlpacaBarsResponse = self.upstream.get_json(&url).await?;
        payload
            .bars
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(AlpacaBar::into_provider_bar)
            .ok_or_else(|| ProviderError::not_found(format!("alpaca has no daily bar for {ticker}")))
    }
}

impl MarketDataProvider for AlpacaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alpaca
    }

    fn check_connectivity<'a>(&'a self) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            let url = format!("{}/v2/account", self.api_base_url);
            self.upstream.ping(&url).await.is_some()
        })
    }

    fn fetch_quote<'a>(&'a self, ticker: &'a Symbol) -> ProviderFuture<'a, Result<Quote, ProviderError>> {
        Box::pin(async move {
            let now = UtcDateTime::now();
            let (trade, latest_bar, previous_bar) = tokio::join!(
                self.latest_trade(ticker),
                self.latest_bar(ticker),
                self.previous_daily_bar(ticker, now),
            );

            // Without either price source there is nothing to fall back on.
            let (trade, latest_bar) = match (trade, latest_bar) {
                (Err(error), Err(_)) => return Err(error),
                (trade, latest_bar) => (
                    optional_leg(ProviderId::Alpaca, "trade", ticker, trade)?,
                    optional_leg(ProviderId::Alpaca, "latest_bar", ticker, latest_bar)?,
                ),
            };
            let previous_bar = optional_leg(ProviderId::Alpaca, "previous_bar", ticker, previous_bar)?;

            derive_quote(
                ticker,
                &QuoteInputs {
                    trade,
                    latest_bar,
                    previous_bar,
                },
                now,
            )
        })
    }

    fn fetch_bars<'a>(
        &'a self,
        ticker: &'a Symbol,
        range: &'a RangeSpec,
    ) -> ProviderFuture<'a, Result<Vec<ProviderBar>, ProviderError>> {
        Box::pin(async move {
            let url = format!(
                "{}?timeframe={}&start={}&end={}&limit={}&adjustment=raw&feed=iex&sort=asc",
                self.stock_url(ticker, "bars"),
                timeframe(range.resolution),
                urlencoding::encode(&range.start.format_rfc3339()),
                urlencoding::encode(&range.end.format_rfc3339()),
                BARS_PAGE_LIMIT,
            );

            let payload: AlpacaBarsResponse = self.upstream.get_json(&url).await?;
            let bars: Vec<ProviderBar> = payload
                .bars
                .unwrap_or_default()
                .into_iter()
                .map(AlpacaBar::into_provider_bar)
                .collect();

            if bars.is_empty() {
                return Err(ProviderError::not_found(format!(
                    "alpaca returned no bars for {ticker}"
                )));
            }
            Ok(bars)
        })
    }
}

fn timeframe(resolution: BarResolution) -> String {
    let multiplier = resolution_multiplier(resolution);
    match resolution {
        BarResolution::Minutes(_) => format!("{multiplier}Min"),
        BarResolution::Hours(_) => format!("{multiplier}Hour"),
        BarResolution::Day => String::from("1Day"),
        BarResolution::Week => String::from("1Week"),
        BarResolution::Month => String::from("1Month"),
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

#[derive(Debug, Deserialize)]
struct AlpacaLatestTradeResponse {
    trade: Option<AlpacaTrade>,
}

#[derive(Debug, Deserialize)]
struct AlpacaTrade {
    t: String,
    p: f64,
}

#[derive(Debug, Deserialize)]
struct AlpacaLatestBarResponse {
    bar: Option<AlpacaBar>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBarsResponse {
    #[serde(default)]
    bars: Option<Vec<AlpacaBar>>,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: Option<f64>,
}

impl AlpacaBar {
    fn into_provider_bar(self) -> ProviderBar {
        ProviderBar::new(
            RawTimestamp::Rfc3339(self.t),
            self.o,
            self.h,
            self.l,
            self.c,
            volume_from(self.v),
        )
    }
}
