use marketdesk_core::{
    normalize, resolve, CanonicalSeries, MarketDataProvider, ProviderError, RangeSpec, Symbol,
    SymbolicRange, UtcDateTime,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::BarsArgs;
use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct BarsResponseData {
    ticker: Symbol,
    range: SymbolicRange,
    window: RangeSpec,
    bars: CanonicalSeries,
}

pub async fn run(args: &BarsArgs, provider: &dyn MarketDataProvider) -> Result<CommandResult, CliError> {
    let ticker = Symbol::parse(&args.symbol)?;
    let range = SymbolicRange::parse_lenient(&args.range);
    let window = resolve(range, UtcDateTime::now());
    debug!(%ticker, %range, resolution = %window.resolution, "fetching bars");

    let result = provider
        .fetch_bars(&ticker, &window)
        .await
        .map(|bars| normalize(&bars))
        .and_then(|series| {
            if series.is_empty() {
                Err(ProviderError::not_found("no bars in the requested window"))
            } else {
                Ok(series)
            }
        });

    let (bars, error) = match result {
        Ok(series) => (series, None),
        Err(error) => {
            let error = error.with_context(&ticker, Some(range));
            warn!(%error, "bars failed");
            (CanonicalSeries::empty(), Some(error))
        }
    };

    let data = serde_json::to_value(BarsResponseData {
        ticker,
        range,
        window,
        bars,
    })?;
    let result = CommandResult::ok(provider.id(), data);
    Ok(match error {
        Some(error) => result.with_provider_error(&error),
        None => result,
    })
}
