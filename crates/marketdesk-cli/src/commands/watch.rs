use std::sync::Arc;

use marketdesk_core::{Config, MarketDataProvider, Poller, Symbol, SymbolicRange, UtcDateTime};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::WatchArgs;
use crate::error::CliError;
use crate::output::EnvelopeError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct PriceTick {
    price: f64,
    received_at: UtcDateTime,
}

#[derive(Debug, Serialize)]
struct WatchResponseData {
    ticker: Symbol,
    range: SymbolicRange,
    interval_ms: u64,
    ticks: Vec<PriceTick>,
}

pub async fn run(
    args: &WatchArgs,
    config: &Config,
    provider: Arc<dyn MarketDataProvider>,
) -> Result<CommandResult, CliError> {
    let ticker = Symbol::parse(&args.symbol)?;
    let range = SymbolicRange::parse_lenient(&args.range);
    let interval = config.poll_intervals().for_range(range);
    let wanted = args.ticks as usize;
    let provider_id = provider.id();

    let (sender, mut receiver) = mpsc::unbounded_channel();
    let mut handle = Poller::start(provider, ticker.clone(), interval, move |price| {
        let _ = sender.send(PriceTick {
            price,
            received_at: UtcDateTime::now(),
        });
    });

    // Failed ticks are skipped, so allow two extra intervals.
    let deadline = interval * (args.ticks + 2);
    let mut ticks = super::collection_buffer(wanted);
    let _ = tokio::time::timeout(deadline, async {
        while ticks.len() < wanted {
            let Some(tick) = receiver.recv().await else {
                break;
            };
            info!(%ticker, price = tick.price, "price update");
            ticks.push(tick);
        }
    })
    .await;
    handle.cancel();

    let collected = ticks.len();
    let data = serde_json::to_value(WatchResponseData {
        ticker,
        range,
        interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        ticks,
    })?;

    let result = CommandResult::ok(provider_id, data);
    if collected == wanted {
        return Ok(result);
    }
    Ok(result.with_error(EnvelopeError::new(
        "watch.incomplete",
        format!("received {collected} of {wanted} price updates"),
    )))
}
