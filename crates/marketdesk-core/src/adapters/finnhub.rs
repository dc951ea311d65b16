use std::sync::Arc;

use serde::Deserialize;

use super::{encode_symbol, volume_from, Upstream};
use crate::http_client::{HttpAuth, HttpClient, ReqwestHttpClient};
use crate::normalizer::derive_quote;
use crate::provider::{MarketDataProvider, ProviderError, ProviderFuture};
use crate::provider_policy::ProviderPolicy;
use crate::{
    BarResolution, LatestTrade, ProviderBar, ProviderId, Quote, QuoteInputs, RangeSpec,
    RawTimestamp, Symbol, UtcDateTime,
};

pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Finnhub REST adapter. The push socket is handled by
/// [`crate::stream::TradeStreamManager`].
#[derive(Debug, Clone)]
pub struct FinnhubAdapter {
    upstream: Upstream,
    base_url: String,
}

impl FinnhubAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::default()), api_key)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        let auth = HttpAuth::Header {
            name: String::from("X-Finnhub-Token"),
            value: api_key.into(),
        };
        Self {
            upstream: Upstream::new(ProviderId::Finnhub, http_client, &[auth]),
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
}

impl MarketDataProvider for FinnhubAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Finnhub
    }

    fn check_connectivity<'a>(&'a self) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            let url = format!("{}/stock/symbol?exchange=US", self.base_url);
            self.upstream.ping(&url).await.is_some()
        })
    }

    fn fetch_quote<'a>(&'a self, ticker: &'a Symbol) -> ProviderFuture<'a, Result<Quote, ProviderError>> {
        Box::pin(async move {
            let url = format!("{}/quote?symbol={}", self.base_url, encode_symbol(ticker));
            let payload: FinnhubQuote = self.upstream.get_json(&url).await?;

            // Finnhub answers unknown tickers with an all-zero quote.
            if payload.c == 0.0 && payload.t == 0 {
                return Err(ProviderError::not_found(format!("finnhub does not know {ticker}")));
            }

            let timestamp = RawTimestamp::EpochSeconds(payload.t);
            // Before the open Finnhub reports o/h/l as 0.
            let session_field = |value: Option<f64>| value.filter(|value| *value > 0.0).unwrap_or(payload.c);
            let session = ProviderBar::new(
                timestamp.clone(),
                session_field(payload.o),
                session_field(payload.h),
                session_field(payload.l),
                payload.c,
                None,
            );
            let previous = payload.pc.map(|pc| {
                ProviderBar::new(RawTimestamp::EpochSeconds(payload.t), pc, pc, pc, pc, None)
            });

            derive_quote(
                ticker,
                &QuoteInputs {
                    trade: Some(LatestTrade {
                        price: payload.c,
                        timestamp,
                    }),
                    latest_bar: Some(session),
                    previous_bar: previous,
                },
                UtcDateTime::now(),
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
                "{}/stock/candle?symbol={}&resolution={}&from={}&to={}",
                self.base_url,
                encode_symbol(ticker),
                resolution_code(range.resolution),
                range.start.unix_seconds(),
                range.end.unix_seconds(),
            );

            let payload: FinnhubCandles = self.upstream.get_json(&url).await?;
            match payload.s.as_str() {
                "ok" => {}
                "no_data" => {
                    return Err(ProviderError::not_found(format!(
                        "finnhub has no candles for {ticker}"
                    )))
                }
                other => {
                    return Err(ProviderError::malformed(format!(
                        "finnhub candle status '{other}' for {ticker}"
                    )))
                }
            }

            let bars = payload.into_provider_bars()?;
            if bars.is_empty() {
                return Err(ProviderError::not_found(format!(
                    "finnhub returned no candles for {ticker}"
                )));
            }
            Ok(bars)
        })
    }
}

fn resolution_code(resolution: BarResolution) -> String {
    match resolution {
        BarResolution::Minutes(n) => n.max(1).to_string(),
        BarResolution::Hours(n) => (n.max(1) * 60).to_string(),
        BarResolution::Day => String::from("D"),
        BarResolution::Week => String::from("W"),
        BarResolution::Month => String::from("M"),
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    c: f64,
    #[serde(default)]
    o: Option<f64>,
    #[serde(default)]
    h: Option<f64>,
    #[serde(default)]
    l: Option<f64>,
    #[serde(default)]
    pc: Option<f64>,
    #[serde(default)]
    t: i64,
}

#[derive(Debug, Deserialize)]
struct FinnhubCandles {
    s: String,
    #[serde(default)]
    t: Vec<i64>,
    #[serde(default)]
    o: Vec<f64>,
    #[serde(default)]
    h: Vec<f64>,
    #[serde(default)]
    l: Vec<f64>,
    #[serde(default)]
    c: Vec<f64>,
    #[serde(default)]
    v: Vec<f64>,
}

impl FinnhubCandles {
    /// Column arrays to records. Ragged columns mean a broken payload.
    fn into_provider_bars(self) -> Result<Vec<ProviderBar>, ProviderError> {
        let len = self.t.len();
        if [self.o.len(), self.h.len(), self.l.len(), self.c.len()]
            .iter()
            .any(|column| *column != len)
        {
            return Err(ProviderError::malformed(
                "finnhub candle columns have different lengths",
            ));
        }

        Ok((0..len)
            .map(|i| {
                ProviderBar::new(
                    RawTimestamp::EpochSeconds(self.t[i]),
                    self.o[i],
                    self.h[i],
                    self.l[i],
                    self.c[i],
                    volume_from(self.v.get(i).copied()),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse, ScriptedHttpClient};
    use crate::provider::ProviderErrorKind;

    fn adapter(client: Arc<ScriptedHttpClient>) -> FinnhubAdapter {
        FinnhubAdapter::with_http_client(client, "fh-token")
            .with_base_url("https://finnhub.test/api/v1")
            .with_policy(None)
    }

    fn ticker() -> Symbol {
        Symbol::parse("NVDA").expect("valid symbol")
    }

    fn week() -> RangeSpec {
        crate::resolver::resolve(crate::SymbolicRange::OneWeek, UtcDateTime::now())
    }

    #[tokio::test]
    async fn quote_maps_fields_and_token_header() {
        let client = Arc::new(ScriptedHttpClient::new().route(
            "/quote?symbol=NVDA",
            HttpResponse::ok_json(r#"{"c":121.0,"d":1.0,"dp":0.83,"h":122.0,"l":119.5,"o":120.0,"pc":120.0,"t":1717430400}"#),
        ));

        let quote = adapter(client.clone()).fetch_quote(&ticker()).await.expect("quote");
        assert_eq!(quote.price, 121.0);
        assert_eq!(quote.previous_close, 120.0);
        assert_eq!(quote.low, Some(119.5));
        assert_eq!(quote.timestamp.unix_seconds(), 1_717_430_400);
        assert_eq!(
            client.recorded_requests()[0].headers.get("x-finnhub-token").map(String::as_str),
            Some("fh-token")
        );
    }

    #[tokio::test]
    async fn pre_open_zero_session_fields_fall_back_to_the_last_price() {
        let client = Arc::new(ScriptedHttpClient::new().route(
            "/quote?symbol=NVDA",
            HttpResponse::ok_json(r#"{"c":121.0,"d":null,"dp":null,"h":0,"l":0,"o":0,"pc":120.0,"t":1717430400}"#),
        ));

        let quote = adapter(client).fetch_quote(&ticker()).await.expect("quote");
        assert_eq!(quote.open, Some(121.0));
        assert_eq!(quote.high, Some(121.0));
        assert_eq!(quote.low, Some(121.0));
        assert_eq!(quote.previous_close, 120.0);
    }

    #[tokio::test]
    async fn zero_quote_is_unknown_ticker() {
        let client = Arc::new(ScriptedHttpClient::new().route(
            "/quote",
            HttpResponse::ok_json(r#"{"c":0,"d":null,"dp":null,"h":0,"l":0,"o":0,"pc":0,"t":0}"#),
        ));

        let error = adapter(client).fetch_quote(&ticker()).await.expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::NotFound);
    }

    #[tokio::test]
    async fn candles_zip_columns() {
        let client = Arc::new(ScriptedHttpClient::new().route(
            "/stock/candle",
            HttpResponse::ok_json(r#"{"s":"ok","t":[1717000000,1717003600],"o":[1.0,2.0],"h":[1.5,2.5],"l":[0.5,1.5],"c":[1.2,2.2],"v":[100,200]}"#),
        ));

        let bars = adapter(client.clone()).fetch_bars(&ticker(), &week()).await.expect("bars");
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp, RawTimestamp::EpochSeconds(1_717_003_600));
        assert_eq!(bars[1].volume, Some(200));
        assert!(client.recorded_requests()[0].url.contains("resolution=60"));
    }

    #[tokio::test]
    async fn no_data_status_is_not_found() {
        let client = Arc::new(
            ScriptedHttpClient::new().route("/stock/candle", HttpResponse::ok_json(r#"{"s":"no_data"}"#)),
        );

        let error = adapter(client).fetch_bars(&ticker(), &week()).await.expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::NotFound);
    }

    #[tokio::test]
    async fn connectivity_is_false_on_server_error_and_transport_failure() {
        let failing = Arc::new(ScriptedHttpClient::new().route("/stock/symbol", HttpResponse::status(500)));
        let unreachable = Arc::new(ScriptedHttpClient::new().fail("/stock/symbol", HttpError::new("dns")));

        assert!(!adapter(failing).check_connectivity().await);
        assert!(!adapter(unreachable).check_connectivity().await);
    }
}
