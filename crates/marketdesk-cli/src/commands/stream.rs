use std::time::Duration;

use marketdesk_core::{Config, ProviderId, Symbol, TradeStreamManager, TradeTick};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::StreamArgs;
use crate::error::CliError;
use crate::output::EnvelopeError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct StreamResponseData {
    ticker: Symbol,
    trades: Vec<TradeTick>,
}

pub async fn run(args: &StreamArgs, config: &Config) -> Result<CommandResult, CliError> {
    let ticker = Symbol::parse(&args.symbol)?;
    let manager = TradeStreamManager::connect(config.stream_config()?);

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut subscription = manager.subscribe(&ticker, move |tick: &TradeTick| {
        let _ = sender.send(tick.clone());
    });

    let mut trades = super::collection_buffer(args.trades);
    let _ = tokio::time::timeout(Duration::from_secs(args.timeout_secs), async {
        while trades.len() < args.trades {
            let Some(tick) = receiver.recv().await else {
                break;
            };
            debug!(symbol = %tick.symbol, price = tick.price, "trade");
            trades.push(tick);
        }
    })
    .await;

    subscription.cancel();
    manager.shutdown();

    let collected = trades.len();
    let data = serde_json::to_value(StreamResponseData { ticker, trades })?;
    let result = CommandResult::ok(ProviderId::Finnhub, data);
    if collected == args.trades {
        return Ok(result);
    }
    Ok(result.with_error(EnvelopeError::new(
        "stream.incomplete",
        format!(
            "received {collected} of {} trades within {}s",
            args.trades, args.timeout_secs
        ),
    )))
}
