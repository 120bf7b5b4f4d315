// src/client/tick_feed.rs

// 📦 External crates
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

// 🧠 Internal modules
use crate::async_actors::connection::{ConnectionError, ListenerHandle, Multiplexer};
use crate::domain::ticks::{TickWindow, DEFAULT_CHART_POINTS};
use crate::model::Tick;

type TaggedTick = (Option<String>, Tick);

/// Live tick stream for one symbol, backed by a venue subscription and a
/// message listener. Call [`TickFeed::close`] before switching symbols.
pub struct TickFeed {
    multiplexer: Multiplexer,
    symbol: String,
    subscription_id: String,
    listener: ListenerHandle,
    ticks: mpsc::Receiver<TaggedTick>,
    pending_first: Option<Tick>,
    last_epoch: Option<i64>,
    window: TickWindow,
    closed: bool,
}

impl TickFeed {
    pub(crate) async fn open(multiplexer: Multiplexer, symbol: &str) -> Result<Self, ConnectionError> {
        // Buffer holds at most one chart's worth.
        let (sender, ticks) = mpsc::channel(DEFAULT_CHART_POINTS);

        // Listen before subscribing so no tick between the confirmation and
        // registration is lost.
        let listener = multiplexer.on_message(forward_ticks(symbol.to_string(), sender));

        let subscription = match multiplexer.subscribe_ticks(symbol).await {
            Ok(subscription) => subscription,
            Err(e) => {
                listener.unregister();
                return Err(e);
            }
        };

        Ok(Self {
            multiplexer,
            symbol: symbol.to_string(),
            subscription_id: subscription.subscription_id,
            listener,
            ticks,
            pending_first: Some(subscription.first_tick),
            last_epoch: None,
            window: TickWindow::default(),
            closed: false,
        })
    }

    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    #[must_use]
    pub fn window(&self) -> &TickWindow {
        &self.window
    }

    /// Next tick of this subscription, oldest first. Returns `None` once the
    /// feed is closed. Does not notice a dropped connection; wrap in a timeout.
    pub async fn next(&mut self) -> Option<Tick> {
        if let Some(first) = self.pending_first.take() {
            self.accept(&first);
            return Some(first);
        }

        while let Some((subscription_id, tick)) = self.ticks.recv().await {
            if subscription_id
                .as_deref()
                .is_some_and(|id| id != self.subscription_id)
            {
                continue;
            }
            if self.last_epoch.is_some_and(|last| tick.epoch <= last) {
                continue;
            }
            self.accept(&tick);
            return Some(tick);
        }
        None
    }

    /// Stops listening and forgets the venue subscription.
    pub async fn close(mut self) -> Result<(), ConnectionError> {
        self.closed = true;
        self.listener.unregister();
        self.ticks.close();
        self.multiplexer.unsubscribe(&self.subscription_id).await
    }

    fn accept(&mut self, tick: &Tick) {
        self.last_epoch = Some(tick.epoch);
        if !self.window.push(tick) {
            warn!(symbol = %self.symbol, epoch = tick.epoch, "⚠️ Tick epoch out of range");
        }
    }
}

impl Drop for TickFeed {
    fn drop(&mut self) {
        if !self.closed {
            self.listener.unregister();
            debug!(
                subscription_id = %self.subscription_id,
                "Tick feed dropped without close; venue subscription left open"
            );
        }
    }
}

/// Forwards `symbol` ticks; when the reader lags and the buffer is full the
/// new tick is dropped.
fn forward_ticks(
    symbol: String,
    sender: mpsc::Sender<TaggedTick>,
) -> impl Fn(&Value) + Send + Sync + 'static {
    move |message: &Value| {
        if let Some(tagged) = tick_for(message, &symbol) {
            if let Err(TrySendError::Full(_)) = sender.try_send(tagged) {
                debug!(%symbol, "Tick buffer full, dropping tick");
            }
        }
    }
}

fn tick_for(message: &Value, symbol: &str) -> Option<TaggedTick> {
    if message.get("msg_type").and_then(Value::as_str) != Some("tick") {
        return None;
    }
    let tick: Tick = serde_json::from_value(message.get("tick")?.clone()).ok()?;
    if tick.symbol != symbol {
        return None;
    }
    let subscription_id = message
        .pointer("/subscription/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| tick.id.clone());
    Some((subscription_id, tick))
}
