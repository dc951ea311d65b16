//! # Provider Contract
//!
//! Every upstream (Alpaca, Polygon, Finnhub, the synthetic generator) is
//! reached through [`MarketDataProvider`]. Adapters return provider-native
//! [`ProviderBar`] records; turning them into a [`crate::CanonicalSeries`] is
//! the normalizer's job.
//!
//! ```rust,ignore
//! use marketdesk_core::{MarketDataProvider, SyntheticProvider, Symbol};
//!
//! let provider = SyntheticProvider::default();
//! let quote = provider.fetch_quote(&Symbol::parse("AAPL")?).await?;
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::http_client::{HttpError, HttpResponse};
use crate::{ProviderBar, ProviderId, Quote, RangeSpec, Symbol, SymbolicRange};

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Single capability contract implemented by every market-data upstream.
pub trait MarketDataProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Authenticated lightweight call. Any failure reads as `false`.
    fn check_connectivity<'a>(&'a self) -> ProviderFuture<'a, bool>;

    fn fetch_quote<'a>(&'a self, ticker: &'a Symbol) -> ProviderFuture<'a, Result<Quote, ProviderError>>;

    /// Raw bars covering `range`. An empty answer is `NotFound`.
    fn fetch_bars<'a>(
        &'a self,
        ticker: &'a Symbol,
        range: &'a RangeSpec,
    ) -> ProviderFuture<'a, Result<Vec<ProviderBar>, ProviderError>>;
}

/// Failure category surfaced by provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    NotFound,
    Unauthorized,
    RateLimited,
    Transport,
    MalformedResponse,
}

/// Request the error happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorContext {
    pub ticker: Symbol,
    pub range: Option<SymbolicRange>,
}

/// Adapter error: a kind, a human message and optional request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    context: Option<ErrorContext>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unauthorized, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }

    /// Maps a non-success HTTP status.
    pub fn from_status(provider: ProviderId, status: u16) -> Self {
        let message = format!("{provider} upstream returned status {status}");
        match status {
            401 | 403 => Self::unauthorized(message),
            404 => Self::not_found(message),
            429 => Self::rate_limited(message),
            _ => Self::transport(message),
        }
    }

    pub fn from_http(provider: ProviderId, error: &HttpError) -> Self {
        Self::transport(format!("{provider} {error}"))
    }

    /// Attaches the `(ticker, range)` being served. The kind is unchanged.
    pub fn with_context(mut self, ticker: &Symbol, range: Option<SymbolicRange>) -> Self {
        self.context = Some(ErrorContext {
            ticker: ticker.clone(),
            range,
        });
        self
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        self.context.as_ref()
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::NotFound => "provider.not_found",
            ProviderErrorKind::Unauthorized => "provider.unauthorized",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::Transport => "provider.transport",
            ProviderErrorKind::MalformedResponse => "provider.malformed_response",
        }
    }

    /// Short text suitable for the dashboard error slot.
    pub fn user_message(&self) -> String {
        let subject = match &self.context {
            Some(ErrorContext { ticker, .. }) => ticker.to_string(),
            None => String::from("request"),
        };
        match self.kind {
            ProviderErrorKind::NotFound => format!("No data found for {subject}"),
            ProviderErrorKind::Unauthorized => String::from("Market data credentials were rejected"),
            ProviderErrorKind::RateLimited => String::from("Rate limit reached, try again shortly"),
            ProviderErrorKind::Transport => format!("Could not reach market data for {subject}"),
            ProviderErrorKind::MalformedResponse => {
                format!("Received unreadable market data for {subject}")
            }
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())?;
        if let Some(context) = &self.context {
            write!(f, " [ticker={}", context.ticker)?;
            if let Some(range) = context.range {
                write!(f, " range={range}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {}

/// Maps a raw HTTP response to a decoded body, applying the status mapping.
pub(crate) fn decode_response<T>(provider: ProviderId, response: HttpResponse) -> Result<T, ProviderError>
where
    T: DeserializeOwned,
{
    if !response.is_success() {
        return Err(ProviderError::from_status(provider, response.status));
    }

    serde_json::from_str(&response.body)
        .map_err(|error| ProviderError::malformed(format!("{provider} payload: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_kinds() {
        let cases = [
            (401, ProviderErrorKind::Unauthorized),
            (403, ProviderErrorKind::Unauthorized),
            (404, ProviderErrorKind::NotFound),
            (429, ProviderErrorKind::RateLimited),
            (500, ProviderErrorKind::Transport),
            (302, ProviderErrorKind::Transport),
        ];
        for (status, kind) in cases {
            assert_eq!(ProviderError::from_status(ProviderId::Polygon, status).kind(), kind);
        }
    }

    #[test]
    fn context_keeps_kind_and_renders() {
        let ticker = Symbol::parse("AAPL").expect("valid");
        let error = ProviderError::rate_limited("slow down")
            .with_context(&ticker, Some(SymbolicRange::OneWeek));

        assert_eq!(error.kind(), ProviderErrorKind::RateLimited);
        assert_eq!(error.code(), "provider.rate_limited");
        assert_eq!(
            error.to_string(),
            "slow down (provider.rate_limited) [ticker=AAPL range=1W]"
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        let error = decode_response::<serde_json::Value>(
            ProviderId::Finnhub,
            HttpResponse::ok_json("{not json"),
        )
        .expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::MalformedResponse);
    }
}
