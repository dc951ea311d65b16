//! Error taxonomy, user-facing messages, config failures and secret redaction.

use std::sync::Arc;
use std::time::Duration;

use marketdesk_core::config::{ENV_ALPACA_API_KEY, ENV_POLL_INTRADAY_MS, ENV_PROVIDER, ENV_SYNTHETIC_SEED};
use marketdesk_core::{
    AlpacaAdapter, ApiToken, Config, ConfigError, HttpResponse, MarketDataProvider, ProviderError,
    ProviderErrorKind, ProviderId, RequestBudget, ScriptedHttpClient, SessionStore, Symbol,
    SymbolicRange, ValidationError,
};

fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    move |name| {
        pairs
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| String::from(*value))
    }
}

// =============================================================================
// Provider errors
// =============================================================================

#[test]
fn every_kind_has_a_stable_code() {
    let cases = [
        (ProviderError::not_found("x"), "provider.not_found"),
        (ProviderError::unauthorized("x"), "provider.unauthorized"),
        (ProviderError::rate_limited("x"), "provider.rate_limited"),
        (ProviderError::transport("x"), "provider.transport"),
        (ProviderError::malformed("x"), "provider.malformed_response"),
    ];
    for (error, code) in cases {
        assert_eq!(error.code(), code);
        assert!(error.to_string().contains(code), "{error}");
    }
}

#[test]
fn context_names_the_ticker_and_range_without_changing_the_kind() {
    let ticker = Symbol::parse("NVDA").expect("valid");
    let error = ProviderError::transport("connection reset").with_context(&ticker, Some(SymbolicRange::OneWeek));

    assert_eq!(error.kind(), ProviderErrorKind::Transport);
    let context = error.context().expect("context");
    assert_eq!(context.ticker, ticker);
    assert_eq!(context.range, Some(SymbolicRange::OneWeek));
    assert_eq!(error.to_string(), "connection reset (provider.transport) [ticker=NVDA range=1W]");
    assert_eq!(error.user_message(), "Could not reach market data for NVDA");
}

#[test]
fn user_messages_do_not_leak_upstream_details() {
    let error = ProviderError::unauthorized("alpaca upstream returned status 401 for key PKSECRET");
    assert_eq!(error.user_message(), "Market data credentials were rejected");
    assert!(!error.user_message().contains("PKSECRET"));

    let bare = ProviderError::not_found("empty");
    assert_eq!(bare.user_message(), "No data found for request");
}

#[test]
fn exhausted_budget_is_rate_limited_without_a_request() {
    let budget = RequestBudget::new(ProviderId::Polygon, Duration::from_secs(60), 1);
    assert!(budget.acquire_or_error().is_ok());

    let error = budget.acquire_or_error().expect_err("budget spent");
    assert_eq!(error.kind(), ProviderErrorKind::RateLimited);
    assert!(error.message().starts_with("polygon request budget exhausted"), "{}", error.message());
}

#[tokio::test]
async fn rejected_credentials_on_the_trade_leg_abort_the_quote() {
    // Given: the trade endpoint rejects the key but bars would still answer
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route("/trades/latest", HttpResponse::status(401))
            .route(
                "/bars/latest",
                HttpResponse::ok_json(r#"{"bar":{"t":"2024-06-03T19:55:00Z","o":1.0,"h":2.0,"l":0.5,"c":1.5,"v":10}}"#),
            )
            .route("/bars?", HttpResponse::ok_json(r#"{"bars":[]}"#)),
    );
    let adapter = AlpacaAdapter::with_http_client(client, "key", "secret").with_policy(None);

    // When: a quote is requested
    let error = adapter
        .fetch_quote(&Symbol::parse("AAPL").expect("valid"))
        .await
        .expect_err("must fail");

    // Then: the auth failure surfaces instead of a degraded quote
    assert_eq!(error.kind(), ProviderErrorKind::Unauthorized);
}

#[tokio::test]
async fn missing_trade_falls_back_to_the_latest_bar() {
    let client = Arc::new(
        ScriptedHttpClient::new()
            .route("/trades/latest", HttpResponse::status(404))
            .route(
                "/bars/latest",
                HttpResponse::ok_json(r#"{"bar":{"t":"2024-06-03T19:55:00Z","o":1.0,"h":2.0,"l":0.5,"c":1.5,"v":10}}"#),
            )
            .route("/bars?", HttpResponse::ok_json(r#"{"bars":[]}"#)),
    );
    let adapter = AlpacaAdapter::with_http_client(client, "key", "secret").with_policy(None);

    let quote = adapter
        .fetch_quote(&Symbol::parse("AAPL").expect("valid"))
        .await
        .expect("quote from bar");
    assert_eq!(quote.price, 1.5);
    // No daily history: the bar's open is the reference.
    assert_eq!(quote.previous_close, 1.0);
    assert_eq!(quote.change_percent, 50.0);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn invalid_tickers_are_rejected_before_any_request() {
    assert_eq!(Symbol::parse("   "), Err(ValidationError::EmptySymbol));
    assert!(matches!(
        Symbol::parse("1ABC"),
        Err(ValidationError::SymbolInvalidStart { ch: '1' })
    ));
    assert!(matches!(
        Symbol::parse("AB C"),
        Err(ValidationError::SymbolInvalidChar { ch: ' ', .. })
    ));
}

#[test]
fn blank_tokens_never_create_a_session() {
    let session = SessionStore::new();
    assert_eq!(session.login("  ").map(|_| ()), Err(ValidationError::EmptyCredential));
    assert!(!session.is_authenticated());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn explicit_provider_without_credentials_is_a_config_error() {
    let error = Config::from_lookup(lookup(&[(ENV_PROVIDER, "polygon")])).expect_err("must fail");
    assert!(matches!(
        error,
        ConfigError::MissingCredential {
            provider: ProviderId::Polygon,
            ..
        }
    ));
}

#[test]
fn unknown_provider_and_bad_numbers_are_reported_with_the_variable() {
    let error = Config::from_lookup(lookup(&[(ENV_PROVIDER, "yahoo")])).expect_err("must fail");
    assert!(matches!(error, ConfigError::InvalidValue { var, .. } if var == ENV_PROVIDER));

    let error = Config::from_lookup(lookup(&[(ENV_POLL_INTRADAY_MS, "0")])).expect_err("must fail");
    assert!(matches!(error, ConfigError::InvalidValue { var, .. } if var == ENV_POLL_INTRADAY_MS));

    let error = Config::from_lookup(lookup(&[(ENV_SYNTHETIC_SEED, "abc")])).expect_err("must fail");
    assert!(error.to_string().contains(ENV_SYNTHETIC_SEED), "{error}");
}

#[test]
fn half_an_alpaca_key_pair_falls_back_to_synthetic() {
    let config = Config::from_lookup(lookup(&[(ENV_ALPACA_API_KEY, "PKONLY")])).expect("config");
    assert_eq!(config.provider(), ProviderId::Synthetic);
    assert!(config.stream_config().is_err());
}

// =============================================================================
// Redaction
// =============================================================================

#[test]
fn secrets_never_appear_in_debug_output() {
    let token = ApiToken::new("tok-very-secret").expect("token");
    assert!(!format!("{token:?}").contains("very-secret"));

    let session = SessionStore::new();
    session.login("tok-very-secret").expect("login");
    assert!(!format!("{session:?}").contains("very-secret"));

    let config = Config::default()
        .with_api_token("tok-very-secret")
        .with_finnhub_api_key("fh-very-secret");
    let rendered = format!("{config:?}");
    assert!(!rendered.contains("very-secret"), "{rendered}");

    let adapter = AlpacaAdapter::new("PK-very-secret", "sk-very-secret");
    assert!(!format!("{adapter:?}").contains("very-secret"));
}
