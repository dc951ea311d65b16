use std::sync::Arc;

use marketdesk_core::{
    Config, DeskError, MarketDataProvider, MarketDesk, Quote, SessionStore, SimulatedFill,
};
use serde::Serialize;
use tracing::warn;

use crate::cli::OrderArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct OrderResponseData {
    fill: Option<SimulatedFill>,
    quote: Option<Quote>,
    message: Option<String>,
}

pub async fn run(
    args: &OrderArgs,
    config: &Config,
    provider: Arc<dyn MarketDataProvider>,
) -> Result<CommandResult, CliError> {
    let session = Arc::new(SessionStore::new());
    let Some(token) = config.api_token() else {
        return Err(CliError::NotLoggedIn);
    };
    session.login(token)?;

    let provider_id = provider.id();
    let desk = MarketDesk::new(provider, Arc::clone(&session), config.poll_intervals());
    desk.check_connectivity().await;

    let fill = match desk.search(&args.symbol).await {
        Ok(_) => desk.place_order(args.side.into(), &args.quantity)?,
        Err(DeskError::Provider(error)) => {
            warn!(%error, "order lookup failed");
            let data = serde_json::to_value(OrderResponseData {
                fill: None,
                quote: None,
                message: desk.snapshot().error,
            })?;
            return Ok(CommandResult::ok(provider_id, data).with_provider_error(&error));
        }
        Err(error) => return Err(error.into()),
    };

    let snapshot = desk.snapshot();
    desk.stop_polling();
    session.logout();

    let data = serde_json::to_value(OrderResponseData {
        fill: Some(fill),
        quote: snapshot.quote,
        message: snapshot.error,
    })?;
    Ok(CommandResult::ok(provider_id, data))
}
