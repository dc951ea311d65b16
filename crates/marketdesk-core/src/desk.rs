//! # Market desk
//!
//! Composition root for one dashboard view: the selected ticker and range,
//! the displayed series and quote, the live price and the last error.
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`MarketDesk::check_connectivity`] | records whether the provider answers |
//! | [`MarketDesk::search`] | loads quote + bars for a new ticker, restarts the poller |
//! | [`MarketDesk::select_range`] | reloads the current ticker for another range |
//! | [`MarketDesk::snapshot`] | copy of the current view |
//! | [`MarketDesk::place_order`] | prices a simulated order against the displayed quote |
//!
//! Every load carries a generation number. A response is published only if
//! its generation is still the newest one issued; anything older is dropped.
//! The view mutex is never held across an `.await` and never held while the
//! poller is cancelled.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::normalizer::normalize;
use crate::order::{parse_quantity, simulate_fill, OrderSide, SimulatedFill};
use crate::poller::{PollHandle, Poller};
use crate::provider::{MarketDataProvider, ProviderError};
use crate::resolver::{resolve, PollIntervals};
use crate::session::SessionStore;
use crate::{
    CanonicalSeries, ProviderId, Quote, Symbol, SymbolicRange, UtcDateTime, ValidationError,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DeskError {
    #[error("not logged in")]
    NotAuthenticated,
    #[error("API connection is not available")]
    Disconnected,
    #[error("no quote loaded")]
    NoQuote,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// What happened to a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response became the displayed view.
    Published,
    /// A newer request was issued while this one was in flight.
    Superseded,
    /// Range recorded; nothing selected to reload.
    NoSelection,
}

/// Copy of the desk's view state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeskSnapshot {
    pub ticker: Option<Symbol>,
    pub range: SymbolicRange,
    pub series: CanonicalSeries,
    pub quote: Option<Quote>,
    pub last_price: Option<f64>,
    pub error: Option<String>,
    pub connected: Option<bool>,
    pub loading: bool,
    pub polling: bool,
}

#[derive(Debug, Default)]
struct ViewState {
    generation: u64,
    ticker: Option<Symbol>,
    range: SymbolicRange,
    series: CanonicalSeries,
    quote: Option<Quote>,
    last_price: Option<f64>,
    error: Option<String>,
    connected: Option<bool>,
    loading: bool,
}

impl ViewState {
    fn clear_data(&mut self) {
        self.series = CanonicalSeries::empty();
        self.quote = None;
        self.last_price = None;
    }
}

/// One ticker view over a market-data provider.
pub struct MarketDesk {
    provider: Arc<dyn MarketDataProvider>,
    session: Arc<SessionStore>,
    intervals: PollIntervals,
    view: Arc<Mutex<ViewState>>,
    poller: Mutex<Option<PollHandle>>,
}

impl MarketDesk {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        session: Arc<SessionStore>,
        intervals: PollIntervals,
    ) -> Self {
        Self {
            provider,
            session,
            intervals,
            view: Arc::new(Mutex::new(ViewState::default())),
            poller: Mutex::new(None),
        }
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider.id()
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Probes the provider and records the answer.
    pub async fn check_connectivity(&self) -> bool {
        let connected = self.provider.check_connectivity().await;

        let mut view = lock(&self.view);
        view.connected = Some(connected);
        if connected {
            info!(provider = %self.provider.id(), "provider reachable");
        } else {
            warn!(provider = %self.provider.id(), "provider connectivity check failed");
            view.error = Some(String::from("Failed to verify API connection"));
        }
        connected
    }

    /// Looks up `input` for the selected range.
    pub async fn search(&self, input: &str) -> Result<LoadOutcome, DeskError> {
        self.ensure_session()?;
        if lock(&self.view).connected == Some(false) {
            return Err(self.fail_without_load(
                DeskError::Disconnected,
                "Cannot search stocks: API connection is not available",
            ));
        }

        let ticker = match Symbol::parse(input) {
            Ok(ticker) => ticker,
            Err(error) => {
                return Err(self.fail_without_load(error.into(), "Please enter a valid ticker symbol"));
            }
        };

        let (generation, range) = {
            let mut view = lock(&self.view);
            view.generation += 1;
            view.ticker = Some(ticker.clone());
            view.clear_data();
            view.error = None;
            view.loading = true;
            (view.generation, view.range)
        };

        self.load(ticker, range, generation, true).await
    }

    /// Switches the range and reloads the selected ticker, if any.
    pub async fn select_range(&self, range: SymbolicRange) -> Result<LoadOutcome, DeskError> {
        self.ensure_session()?;

        let (generation, ticker) = {
            let mut view = lock(&self.view);
            view.range = range;
            let Some(ticker) = view.ticker.clone() else {
                return Ok(LoadOutcome::NoSelection);
            };
            view.generation += 1;
            view.loading = true;
            (view.generation, ticker)
        };

        self.load(ticker, range, generation, false).await
    }

    pub fn snapshot(&self) -> DeskSnapshot {
        let polling = lock(&self.poller)
            .as_ref()
            .is_some_and(|handle| !handle.is_cancelled());
        let view = lock(&self.view);
        DeskSnapshot {
            ticker: view.ticker.clone(),
            range: view.range,
            series: view.series.clone(),
            quote: view.quote.clone(),
            last_price: view.last_price,
            error: view.error.clone(),
            connected: view.connected,
            loading: view.loading,
            polling,
        }
    }

    /// Prices a simulated order for the displayed ticker.
    pub fn place_order(&self, side: OrderSide, quantity: &str) -> Result<SimulatedFill, DeskError> {
        self.ensure_session()?;

        let quote = lock(&self.view).quote.clone();
        let Some(quote) = quote else {
            return Err(self.fail_without_load(DeskError::NoQuote, "Search for a ticker before trading"));
        };
        let quantity = match parse_quantity(quantity) {
            Ok(quantity) => quantity,
            Err(error) => {
                return Err(self.fail_without_load(error.into(), "Please enter a valid quantity"));
            }
        };

        let fill = simulate_fill(&quote, side, quantity)?;
        info!(
            order_id = %fill.order_id,
            ticker = %fill.symbol,
            side = %fill.side,
            quantity = fill.quantity,
            total = fill.total,
            "simulated order filled"
        );
        Ok(fill)
    }

    /// Stops the poller. The view stays as it is.
    pub fn stop_polling(&self) {
        if let Some(mut handle) = lock(&self.poller).take() {
            handle.cancel();
        }
    }

    async fn load(
        &self,
        ticker: Symbol,
        range: SymbolicRange,
        generation: u64,
        is_search: bool,
    ) -> Result<LoadOutcome, DeskError> {
        let window = resolve(range, UtcDateTime::now());
        debug!(%ticker, %range, generation, start = %window.start, end = %window.end, "loading view");

        let (quote, bars) = tokio::join!(
            self.provider.fetch_quote(&ticker),
            self.provider.fetch_bars(&ticker, &window),
        );
        let result = quote.and_then(|quote| {
            let series = normalize(&bars?);
            if series.is_empty() {
                return Err(ProviderError::not_found("no bars in the requested window"));
            }
            Ok((quote, series))
        });

        {
            let mut view = lock(&self.view);
            if view.generation != generation {
                debug!(%ticker, %range, generation, current = view.generation, "discarding stale response");
                return Ok(LoadOutcome::Superseded);
            }
            view.loading = false;

            match result {
                Ok((quote, series)) => {
                    view.last_price = Some(quote.price);
                    view.quote = Some(quote);
                    view.series = series;
                    view.error = None;
                    view.connected = Some(true);
                }
                Err(error) => {
                    let error = error.with_context(&ticker, Some(range));
                    warn!(%error, "view load failed");
                    view.clear_data();
                    let message = if is_search {
                        view.ticker = None;
                        format!("Could not load data for \"{ticker}\". {}", error.user_message())
                    } else {
                        format!("Could not load {range} data for \"{ticker}\". {}", error.user_message())
                    };
                    view.error = Some(message);
                    drop(view);
                    self.stop_polling();
                    return Err(error.into());
                }
            }
        }

        self.restart_poller(ticker, range, generation);
        Ok(LoadOutcome::Published)
    }

    fn restart_poller(&self, ticker: Symbol, range: SymbolicRange, generation: u64) {
        let mut slot = lock(&self.poller);
        if lock(&self.view).generation != generation {
            return;
        }
        if let Some(mut previous) = slot.take() {
            previous.cancel();
        }

        let view = Arc::clone(&self.view);
        let watched = ticker.clone();
        *slot = Some(Poller::start(
            Arc::clone(&self.provider),
            ticker,
            self.intervals.for_range(range),
            move |price| {
                let mut view = lock(&view);
                if view.ticker.as_ref() == Some(&watched) && view.quote.is_some() {
                    view.last_price = Some(price);
                }
            },
        ));
    }

    fn ensure_session(&self) -> Result<(), DeskError> {
        if self.session.is_authenticated() {
            return Ok(());
        }
        Err(self.fail_without_load(DeskError::NotAuthenticated, "Please log in to use the market desk"))
    }

    fn fail_without_load(&self, error: DeskError, message: &str) -> DeskError {
        lock(&self.view).error = Some(String::from(message));
        error
    }
}

impl Drop for MarketDesk {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

impl std::fmt::Debug for MarketDesk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDesk")
            .field("provider", &self.provider.id())
            .field("intervals", &self.intervals)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
