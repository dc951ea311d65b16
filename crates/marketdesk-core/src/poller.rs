//! Cancellable repeating quote fetch.
//!
//! One tokio task per active ticker. A tick waits for the interval, fetches
//! a quote and hands the price to the callback; the next tick is scheduled
//! only after the current one finished, so ticks never overlap. Fetch
//! failures are logged and the loop keeps going.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::MarketDataProvider;
use crate::Symbol;

type PriceCallback = Box<dyn FnMut(f64) + Send>;
type SharedCallback = Arc<Mutex<Option<PriceCallback>>>;

/// Entry point for starting polling loops.
pub struct Poller;

impl Poller {
    /// Starts polling `ticker` every `interval`. Must be called inside a tokio runtime.
    pub fn start<F>(
        provider: Arc<dyn MarketDataProvider>,
        ticker: Symbol,
        interval: Duration,
        callback: F,
    ) -> PollHandle
    where
        F: FnMut(f64) + Send + 'static,
    {
        let callback: SharedCallback = Arc::new(Mutex::new(Some(Box::new(callback))));
        let cancel = CancellationToken::new();

        debug!(%ticker, interval_ms = interval.as_millis() as u64, "poller started");
        let task = tokio::spawn(poll_loop(
            provider,
            ticker,
            interval,
            Arc::clone(&callback),
            cancel.clone(),
        ));

        PollHandle {
            callback,
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of a running poll loop. Dropping it cancels the loop.
pub struct PollHandle {
    callback: SharedCallback,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stops the loop. Idempotent. Once this returns no callback invocation
    /// starts; one already running finishes first. Must not be called from
    /// inside the callback itself.
    pub fn cancel(&mut self) {
        let removed = match self.callback.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if removed.is_some() {
            debug!("poller cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollHandle")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

async fn poll_loop(
    provider: Arc<dyn MarketDataProvider>,
    ticker: Symbol,
    interval: Duration,
    callback: SharedCallback,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = provider.fetch_quote(&ticker) => result,
        };

        match result {
            Ok(quote) => {
                let Ok(mut guard) = callback.lock() else {
                    break;
                };
                match guard.as_mut() {
                    Some(callback) => callback(quote.price),
                    None => break,
                }
            }
            Err(error) => {
                warn!(%ticker, provider = %provider.id(), %error, "poll tick failed");
            }
        }
    }
    debug!(%ticker, "poller stopped");
}
