use marketdesk_core::{MarketDataProvider, Quote, Symbol};
use serde::Serialize;
use tracing::warn;

use crate::cli::QuoteArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct QuoteResponseData {
    quote: Option<Quote>,
}

pub async fn run(args: &QuoteArgs, provider: &dyn MarketDataProvider) -> Result<CommandResult, CliError> {
    let ticker = Symbol::parse(&args.symbol)?;

    match provider.fetch_quote(&ticker).await {
        Ok(quote) => {
            let data = serde_json::to_value(QuoteResponseData { quote: Some(quote) })?;
            Ok(CommandResult::ok(provider.id(), data))
        }
        Err(error) => {
            let error = error.with_context(&ticker, None);
            warn!(%error, "quote failed");
            let data = serde_json::to_value(QuoteResponseData { quote: None })?;
            Ok(CommandResult::ok(provider.id(), data).with_provider_error(&error))
        }
    }
}
