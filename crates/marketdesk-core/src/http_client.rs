//! GET-only transport seam for the HTTP adapters.
//!
//! [`ReqwestHttpClient`] talks to the network; [`ScriptedHttpClient`] answers
//! from a table of URL fragments so adapters can be exercised offline.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;

pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

/// Credential placement on an upstream request.
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    BearerToken(String),
    Header { name: String, value: String },
}

impl HttpAuth {
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        let (name, value) = match self {
            Self::BearerToken(token) => (String::from("authorization"), format!("Bearer {token}")),
            Self::Header { name, value } => (name.to_ascii_lowercase(), value.clone()),
        };
        headers.insert(name, value);
    }
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            Self::Header { name, .. } => write!(f, "Header({name}: <redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Lower-cased names.
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_auth(mut self, auth: &HttpAuth) -> Self {
        auth.apply(&mut self.headers);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.status, 200..=299)
    }
}

/// Where a request died before a status line was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Timeout,
    Connect,
    Body,
    Other,
}

impl HttpErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Body => "body",
            Self::Other => "request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(HttpErrorKind::Other, message)
    }

    pub fn with_kind(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failure: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for HttpError {}

pub trait HttpClient: Send + Sync {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a>;
}

type Route = (String, Result<HttpResponse, HttpError>);

/// Offline transport answering from a table of URL fragments.
///
/// The first route whose fragment occurs in the request URL wins; unmatched
/// requests get a 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedHttpClient {
    routes: Vec<Route>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: impl Into<String>, response: HttpResponse) -> Self {
        self.routes.push((fragment.into(), Ok(response)));
        self
    }

    pub fn fail(mut self, fragment: impl Into<String>, error: HttpError) -> Self {
        self.routes.push((fragment.into(), Err(error)));
        self
    }

    pub fn recorded_requests(&self) -> Vec<HttpRequest> {
        self.requests().clone()
    }

    fn requests(&self) -> MutexGuard<'_, Vec<HttpRequest>> {
        match self.requests.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn answer(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map_or_else(|| Ok(HttpResponse::status(404)), |(_, answer)| answer.clone())
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        let answer = self.answer(&request.url);
        self.requests().push(request);
        Box::pin(async move { answer })
    }
}

/// Network transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("marketdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let builder = request.headers.iter().fold(
                self.client
                    .get(&request.url)
                    .timeout(Duration::from_millis(request.timeout_ms)),
                |builder, (name, value)| builder.header(name, value),
            );

            let response = builder.send().await.map_err(classify)?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|error| HttpError::with_kind(HttpErrorKind::Body, error.to_string()))?;

            Ok(HttpResponse { status, body })
        })
    }
}

fn classify(error: reqwest::Error) -> HttpError {
    let kind = if error.is_timeout() {
        HttpErrorKind::Timeout
    } else if error.is_connect() {
        HttpErrorKind::Connect
    } else {
        HttpErrorKind::Other
    };
    // Drop the URL: it can carry an api key query parameter.
    HttpError::with_kind(kind, error.without_url().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_and_header_auth_land_in_lowercase_headers() {
        let request = HttpRequest::get("https://example.test/quote")
            .with_auth(&HttpAuth::BearerToken(String::from("token-123")))
            .with_auth(&HttpAuth::Header {
                name: String::from("X-Finnhub-Token"),
                value: String::from("secret"),
            });

        assert_eq!(request.header("Authorization"), Some("Bearer token-123"));
        assert_eq!(request.header("x-finnhub-token"), Some("secret"));
    }

    #[test]
    fn auth_debug_is_redacted() {
        let auth = HttpAuth::Header {
            name: String::from("X-Finnhub-Token"),
            value: String::from("secret"),
        };
        assert!(!format!("{auth:?}").contains("secret"));
        assert!(!format!("{:?}", HttpAuth::BearerToken(String::from("secret"))).contains("secret"));
    }

    #[test]
    fn error_display_names_the_failure_stage() {
        let error = HttpError::with_kind(HttpErrorKind::Timeout, "after 3000 ms");
        assert_eq!(error.to_string(), "timeout failure: after 3000 ms");
        assert_eq!(HttpError::new("dns").kind(), HttpErrorKind::Other);
    }

    #[tokio::test]
    async fn scripted_client_matches_first_fragment_and_records() {
        let client = ScriptedHttpClient::new()
            .route("/quote", HttpResponse::ok_json("{\"c\":1}"))
            .route("/", HttpResponse::status(500));

        let quote = client
            .execute(HttpRequest::get("https://example.test/quote?symbol=A"))
            .await
            .expect("scripted");
        let other = client
            .execute(HttpRequest::get("https://example.test/other"))
            .await
            .expect("scripted");
        let unmatched = client
            .execute(HttpRequest::get("nowhere"))
            .await
            .expect("scripted");

        assert_eq!(quote.status, 200);
        assert_eq!(other.status, 500);
        assert_eq!(unmatched.status, 404);
        assert_eq!(client.recorded_requests().len(), 3);
    }
}
