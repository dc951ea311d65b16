use std::sync::Arc;

use marketdesk_core::{
    normalize, resolve, AlpacaAdapter, FinnhubAdapter, HttpError, HttpResponse, MarketDataProvider,
    PolygonAdapter, ProviderErrorKind, ProviderId, ScriptedHttpClient, Symbol, SymbolicRange,
    SyntheticProvider, UtcDateTime,
};

fn http_provider(id: ProviderId, client: Arc<ScriptedHttpClient>) -> Arc<dyn MarketDataProvider> {
    match id {
        ProviderId::Alpaca => Arc::new(
            AlpacaAdapter::with_http_client(client, "key", "secret")
                .with_base_urls("https://api.test", "https://data.test")
                .with_policy(None),
        ),
        ProviderId::Polygon => Arc::new(
            PolygonAdapter::with_http_client(client, "key")
                .with_base_url("https://polygon.test")
                .with_policy(None),
        ),
        ProviderId::Finnhub => Arc::new(
            FinnhubAdapter::with_http_client(client, "key")
                .with_base_url("https://finnhub.test/api/v1")
                .with_policy(None),
        ),
        ProviderId::Synthetic => Arc::new(SyntheticProvider::default()),
    }
}

const HTTP_PROVIDERS: [ProviderId; 3] = [ProviderId::Alpaca, ProviderId::Polygon, ProviderId::Finnhub];

fn ticker() -> Symbol {
    Symbol::parse("AAPL").expect("valid symbol")
}

#[tokio::test]
async fn status_codes_map_to_the_same_kinds_on_every_http_provider() {
    let cases = [
        (401, ProviderErrorKind::Unauthorized),
        (403, ProviderErrorKind::Unauthorized),
        (404, ProviderErrorKind::NotFound),
        (429, ProviderErrorKind::RateLimited),
        (503, ProviderErrorKind::Transport),
    ];
    let range = resolve(SymbolicRange::OneMonth, UtcDateTime::now());

    for id in HTTP_PROVIDERS {
        for (status, kind) in cases {
            let client = Arc::new(ScriptedHttpClient::new().route("test", HttpResponse::status(status)));
            let provider = http_provider(id, client);

            let quote_error = provider
                .fetch_quote(&ticker())
                .await
                .expect_err("quote must fail");
            assert_eq!(quote_error.kind(), kind, "provider '{id}': quote status {status}");

            let bars_error = provider
                .fetch_bars(&ticker(), &range)
                .await
                .expect_err("bars must fail");
            assert_eq!(bars_error.kind(), kind, "provider '{id}': bars status {status}");
        }
    }
}

#[tokio::test]
async fn connectivity_is_false_on_server_error_and_transport_failure() {
    for id in HTTP_PROVIDERS {
        let server_error = Arc::new(ScriptedHttpClient::new().route("test", HttpResponse::status(500)));
        assert!(
            !http_provider(id, server_error).check_connectivity().await,
            "provider '{id}': 500"
        );

        let unreachable = Arc::new(ScriptedHttpClient::new().fail("test", HttpError::new("dns failure")));
        assert!(
            !http_provider(id, unreachable).check_connectivity().await,
            "provider '{id}': transport"
        );
    }
}

#[tokio::test]
async fn garbage_payload_is_malformed_response() {
    let range = resolve(SymbolicRange::OneWeek, UtcDateTime::now());

    for id in HTTP_PROVIDERS {
        let client = Arc::new(ScriptedHttpClient::new().route("test", HttpResponse::ok_json("<html>")));
        let error = http_provider(id, client)
            .fetch_bars(&ticker(), &range)
            .await
            .expect_err("bars must fail");
        assert_eq!(error.kind(), ProviderErrorKind::MalformedResponse, "provider '{id}'");
    }
}

#[tokio::test]
async fn every_provider_yields_the_canonical_shape() {
    let now = UtcDateTime::now();
    let range = resolve(SymbolicRange::OneMonth, now);
    let day_ms = 86_400_000_i64;
    let start_ms = range.start.unix_millis() + day_ms;

    let payloads = [
        (
            ProviderId::Alpaca,
            ScriptedHttpClient::new()
                .route(
                    "/trades/latest",
                    HttpResponse::ok_json(r#"{"trade":{"t":"2024-06-03T19:59:59Z","p":190.0}}"#),
                )
                .route(
                    "/bars/latest",
                    HttpResponse::ok_json(r#"{"bar":{"t":"2024-06-03T19:55:00Z","o":189.0,"h":191.0,"l":188.0,"c":190.0,"v":1000}}"#),
                )
                .route(
                    "/bars?",
                    HttpResponse::ok_json(format!(
                        r#"{{"bars":[{{"t":"{}","o":180.0,"h":182.0,"l":179.0,"c":181.0,"v":10}},{{"t":"{}","o":181.0,"h":183.0,"l":180.0,"c":182.0,"v":11}}]}}"#,
                        UtcDateTime::from_unix_millis(start_ms).expect("valid").format_rfc3339(),
                        UtcDateTime::from_unix_millis(start_ms + day_ms).expect("valid").format_rfc3339(),
                    )),
                ),
        ),
        (
            ProviderId::Polygon,
            ScriptedHttpClient::new()
                .route(
                    "/prev",
                    HttpResponse::ok_json(r#"{"status":"OK","results":[{"o":180.0,"h":182.0,"l":179.0,"c":181.0,"v":10,"t":1717185600000}]}"#),
                )
                .route(
                    "/last/trade/",
                    HttpResponse::ok_json(r#"{"status":"OK","results":{"p":190.0,"t":1717430400123456789}}"#),
                )
                .route(
                    "/range/",
                    HttpResponse::ok_json(format!(
                        r#"{{"status":"OK","results":[{{"o":181.0,"h":183.0,"l":180.0,"c":182.0,"v":11,"t":{}}},{{"o":180.0,"h":182.0,"l":179.0,"c":181.0,"v":10,"t":{}}}]}}"#,
                        start_ms + day_ms,
                        start_ms,
                    )),
                ),
        ),
        (
            ProviderId::Finnhub,
            ScriptedHttpClient::new()
                .route(
                    "/quote?",
                    HttpResponse::ok_json(r#"{"c":190.0,"h":191.0,"l":188.0,"o":189.0,"pc":181.0,"t":1717430400}"#),
                )
                .route(
                    "/stock/candle",
                    HttpResponse::ok_json(format!(
                        r#"{{"s":"ok","t":[{},{}],"o":[180.0,181.0],"h":[182.0,183.0],"l":[179.0,180.0],"c":[181.0,182.0],"v":[10,11]}}"#,
                        start_ms / 1000,
                        (start_ms + day_ms) / 1000,
                    )),
                ),
        ),
    ];

    for (id, client) in payloads {
        let provider = http_provider(id, Arc::new(client));
        assert_eq!(provider.id(), id);

        let quote = provider.fetch_quote(&ticker()).await.unwrap_or_else(|error| {
            panic!("provider '{id}' quote failed: {error}")
        });
        assert_eq!(quote.ticker.as_str(), "AAPL", "provider '{id}': ticker");
        assert_eq!(quote.price, 190.0, "provider '{id}': price");
        assert!(quote.change_percent.is_finite(), "provider '{id}': percent");

        let bars = provider.fetch_bars(&ticker(), &range).await.unwrap_or_else(|error| {
            panic!("provider '{id}' bars failed: {error}")
        });
        let series = normalize(&bars);
        assert_eq!(series.len(), 2, "provider '{id}': bar count");
        assert!(
            series.bars()[0].timestamp < series.bars()[1].timestamp,
            "provider '{id}': ascending"
        );
        assert_eq!(series.bars()[0].close, 181.0, "provider '{id}': oldest close");
    }
}

#[tokio::test]
async fn synthetic_provider_honors_the_same_contract() {
    let provider = http_provider(ProviderId::Synthetic, Arc::new(ScriptedHttpClient::new()));
    assert!(provider.check_connectivity().await);

    for range in SymbolicRange::ALL {
        let window = resolve(range, UtcDateTime::now());
        let bars = provider.fetch_bars(&ticker(), &window).await.expect("bars");
        let series = normalize(&bars);
        assert!(!series.is_empty(), "range {range}");
        assert!(series.bars().iter().all(|bar| window.contains(bar.timestamp)), "range {range}");
    }

    let quote = provider.fetch_quote(&ticker()).await.expect("quote");
    assert!(quote.price > 0.0);
}
