//! # Trade Stream
//!
//! Connection manager for the Finnhub trade socket. One manager per process,
//! passed explicitly to whoever needs live trades.
//!
//! - The first handler for a symbol sends `{"type":"subscribe","symbol":S}`;
//!   removing the last one sends `{"type":"unsubscribe","symbol":S}`.
//! - `{"type":"trade","data":[..]}` frames fan out to every handler of each
//!   trade's symbol. Other frame types are ignored.
//! - The connection task reconnects after a delay and re-subscribes every
//!   registered symbol.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Symbol, UtcDateTime};

pub const DEFAULT_STREAM_URL: &str = "wss://ws.finnhub.io";

/// One trade print pushed by the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeTick {
    pub symbol: String,
    pub price: f64,
    pub timestamp: UtcDateTime,
    pub volume: Option<f64>,
}

/// Control frame sent to the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Subscribe { symbol: String },
    Unsubscribe { symbol: String },
}

impl ControlFrame {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Delay between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Spread each delay by up to +/- 10%.
    pub jitter: bool,
}

impl Default for ReconnectPolicy {
    /// Fixed 5 s between attempts.
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let seconds = (self.initial.as_secs_f64() * self.multiplier.powi(exponent))
            .min(self.max.as_secs_f64());

        let seconds = if self.jitter {
            seconds * (0.9 + fastrand::f64() * 0.2)
        } else {
            seconds
        };
        Duration::from_secs_f64(seconds.max(0.0))
    }
}

/// Socket endpoint and credentials.
#[derive(Clone)]
pub struct StreamConfig {
    pub url: String,
    pub token: String,
    pub reconnect: ReconnectPolicy,
}

impl StreamConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            url: String::from(DEFAULT_STREAM_URL),
            token: token.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}?token={}", self.url, urlencoding::encode(&self.token))
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

type TradeHandler = Arc<dyn Fn(&TradeTick) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: BTreeMap<String, BTreeMap<u64, TradeHandler>>,
}

impl Registry {
    fn add(&mut self, symbol: &str, handler: TradeHandler) -> (u64, Option<ControlFrame>) {
        self.next_id += 1;
        let id = self.next_id;
        let entry = self.handlers.entry(symbol.to_owned()).or_default();
        let first = entry.is_empty();
        entry.insert(id, handler);

        let frame = first.then(|| ControlFrame::Subscribe {
            symbol: symbol.to_owned(),
        });
        (id, frame)
    }

    fn remove(&mut self, symbol: &str, id: u64) -> Option<ControlFrame> {
        let entry = self.handlers.get_mut(symbol)?;
        entry.remove(&id)?;
        if !entry.is_empty() {
            return None;
        }

        self.handlers.remove(symbol);
        Some(ControlFrame::Unsubscribe {
            symbol: symbol.to_owned(),
        })
    }

    fn symbols(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    fn handlers_for(&self, symbol: &str) -> Vec<TradeHandler> {
        self.handlers
            .get(symbol)
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default()
    }
}

struct Shared {
    registry: Mutex<Registry>,
    outbound: mpsc::UnboundedSender<ControlFrame>,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn send(&self, frame: ControlFrame) {
        debug!(frame = %frame.to_json(), "queueing control frame");
        // A closed channel means the connection task is gone; nothing to tell.
        let _ = self.outbound.send(frame);
    }

    fn unsubscribe(&self, symbol: &str, id: u64) {
        let frame = self.registry().remove(symbol, id);
        if let Some(frame) = frame {
            self.send(frame);
        }
    }

    fn dispatch(&self, text: &str) -> usize {
        let frame: InboundFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(error) => {
                debug!(%error, "ignoring unreadable socket frame");
                return 0;
            }
        };
        if frame.kind != "trade" {
            return 0;
        }

        let mut delivered = 0;
        for trade in frame.data {
            let handlers = self.registry().handlers_for(&trade.s);
            if handlers.is_empty() {
                continue;
            }

            let tick = TradeTick {
                timestamp: UtcDateTime::from_unix_millis(trade.t).unwrap_or_else(|_| UtcDateTime::now()),
                symbol: trade.s,
                price: trade.p,
                volume: trade.v,
            };
            for handler in handlers {
                handler(&tick);
                delivered += 1;
            }
        }
        delivered
    }
}

/// Explicit owner of the trade socket and its handler registry.
pub struct TradeStreamManager {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TradeStreamManager {
    /// Spawns the connection task. Must be called inside a tokio runtime.
    pub fn connect(config: StreamConfig) -> Self {
        let (outbound, frames) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::default()),
            outbound,
        });
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_connection(
            config,
            Arc::clone(&shared),
            frames,
            cancel.clone(),
        ));

        Self {
            shared,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Manager without a socket. Control frames go to the returned receiver
    /// and inbound frames are fed through [`Self::dispatch`].
    pub fn detached() -> (Self, mpsc::UnboundedReceiver<ControlFrame>) {
        let (outbound, frames) = mpsc::unbounded_channel();
        let manager = Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                outbound,
            }),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        };
        (manager, frames)
    }

    pub fn subscribe<F>(&self, symbol: &Symbol, handler: F) -> TradeSubscription
    where
        F: Fn(&TradeTick) + Send + Sync + 'static,
    {
        let (id, frame) = self.shared.registry().add(symbol.as_str(), Arc::new(handler));
        if let Some(frame) = frame {
            self.shared.send(frame);
        }

        TradeSubscription {
            shared: Arc::clone(&self.shared),
            symbol: symbol.as_str().to_owned(),
            id,
            active: true,
        }
    }

    /// Routes one inbound text frame. Returns the number of handler calls.
    pub fn dispatch(&self, text: &str) -> usize {
        self.shared.dispatch(text)
    }

    pub fn subscribed_symbols(&self) -> Vec<String> {
        self.shared.registry().symbols()
    }

    /// Stops the connection task. Registered handlers stay registered.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let task = match self.task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if task.is_some() {
            info!("trade stream shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TradeStreamManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle for one registered handler. Cancelling is idempotent and also
/// happens on drop.
pub struct TradeSubscription {
    shared: Arc<Shared>,
    symbol: String,
    id: u64,
    active: bool,
}

impl TradeSubscription {
    pub fn cancel(&mut self) {
        if std::mem::take(&mut self.active) {
            self.shared.unsubscribe(&self.symbol, self.id);
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for TradeSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Vec<InboundTrade>,
}

#[derive(Debug, Deserialize)]
struct InboundTrade {
    s: String,
    p: f64,
    t: i64,
    #[serde(default)]
    v: Option<f64>,
}

async fn run_connection(
    config: StreamConfig,
    shared: Arc<Shared>,
    mut frames: mpsc::UnboundedReceiver<ControlFrame>,
    cancel: CancellationToken,
) {
    let mut attempt = 0_u32;

    'outer: while !cancel.is_cancelled() {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            connected = tokio_tungstenite::connect_async(config.endpoint()) => connected,
        };

        match connected {
            Ok((socket, _)) => {
                attempt = 0;
                info!(url = %config.url, "trade stream connected");
                let (mut sink, mut inbound) = socket.split();

                // Queued frames are superseded by a full re-subscribe.
                while frames.try_recv().is_ok() {}
                let symbols = shared.registry().symbols();
                for symbol in symbols {
                    let frame = ControlFrame::Subscribe { symbol };
                    if let Err(error) = sink.send(Message::Text(frame.to_json())).await {
                        warn!(%error, "re-subscribe failed");
                        break;
                    }
                }

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = sink.close().await;
                            break 'outer;
                        }
                        frame = frames.recv() => {
                            let Some(frame) = frame else { break 'outer };
                            if let Err(error) = sink.send(Message::Text(frame.to_json())).await {
                                warn!(%error, "control frame send failed");
                                break;
                            }
                        }
                        message = inbound.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                shared.dispatch(&text);
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                info!("trade stream closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(error)) => {
                                warn!(%error, "trade stream read failed");
                                break;
                            }
                        },
                    }
                }
            }
            Err(error) => {
                warn!(url = %config.url, %error, "trade stream connect failed");
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = config.reconnect.delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling trade stream reconnect");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("trade stream task finished");
}
