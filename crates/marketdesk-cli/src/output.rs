use marketdesk_core::{ProviderError, ProviderErrorKind, ProviderId, UtcDateTime};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::CliError;

/// Machine-readable result of one command.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: Uuid,
    pub provider: ProviderId,
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl EnvelopeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
        }
    }
}

impl From<&ProviderError> for EnvelopeError {
    fn from(error: &ProviderError) -> Self {
        Self {
            code: String::from(error.code()),
            message: error.to_string(),
            retryable: matches!(
                error.kind(),
                ProviderErrorKind::RateLimited | ProviderErrorKind::Transport
            ),
        }
    }
}

impl Envelope {
    pub fn new(provider: ProviderId, latency_ms: u64, data: Value, errors: Vec<EnvelopeError>) -> Self {
        Self {
            meta: EnvelopeMeta {
                request_id: Uuid::new_v4(),
                provider,
                generated_at: UtcDateTime::now(),
                latency_ms,
            },
            data,
            errors,
        }
    }
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    println!("{payload}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_shape() {
        let envelope = Envelope::new(
            ProviderId::Synthetic,
            12,
            json!({ "ok": true }),
            vec![EnvelopeError::from(&ProviderError::rate_limited("budget"))],
        );
        let value = serde_json::to_value(&envelope).expect("serializes");

        assert_eq!(value["meta"]["provider"], "synthetic");
        assert_eq!(value["meta"]["latency_ms"], 12);
        assert_eq!(value["errors"][0]["code"], "provider.rate_limited");
        assert_eq!(value["errors"][0]["retryable"], true);
        assert_eq!(envelope.meta.request_id.get_version_num(), 4);
    }

    #[test]
    fn errors_omitted_when_empty() {
        let envelope = Envelope::new(ProviderId::Alpaca, 0, Value::Null, Vec::new());
        let value = serde_json::to_value(&envelope).expect("serializes");
        assert!(value.get("errors").is_none());
    }
}
