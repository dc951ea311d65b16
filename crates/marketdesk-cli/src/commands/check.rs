use marketdesk_core::{Config, MarketDataProvider, ProviderId};
use serde::Serialize;

use crate::error::CliError;
use crate::output::EnvelopeError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct CheckResponseData {
    provider: ProviderId,
    connected: bool,
    available: Vec<ProviderId>,
}

pub async fn run(config: &Config, provider: &dyn MarketDataProvider) -> Result<CommandResult, CliError> {
    let connected = provider.check_connectivity().await;
    let data = serde_json::to_value(CheckResponseData {
        provider: provider.id(),
        connected,
        available: config.available_providers(),
    })?;

    let result = CommandResult::ok(provider.id(), data);
    if connected {
        return Ok(result);
    }
    Ok(result.with_error(EnvelopeError::new(
        "provider.unreachable",
        format!("{} did not answer the connectivity check", provider.id()),
    )))
}
