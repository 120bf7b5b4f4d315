// src/async_actors/connection/mod.rs

// 🌍 Standard library
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// 📦 External crates
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};
use url::Url;

// 🧠 Internal modules
mod actor;
mod errors;
pub mod listeners;
pub mod transport;

pub use errors::ConnectionError;
pub use listeners::{Listener, ListenerHandle, ListenerId, ListenerRegistry};
pub use transport::{FrameSink, FrameStream, Transport, WebSocketTransport};

use crate::async_actors::messages::{ConnectionCommand, VenueRequest};
use crate::config::{ConfigError, VenueConfig};
use crate::model::{Tick, TickSubscription};
use actor::ConnectionActor;

const COMMAND_CHANNEL_CAPACITY: usize = 64;

type ConnectFuture = Shared<BoxFuture<'static, Result<ConnectionHandle, ConnectionError>>>;

#[derive(Debug, Clone)]
struct ConnectionHandle {
    commands: mpsc::Sender<ConnectionCommand>,
}

impl ConnectionHandle {
    fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }
}

enum ConnectionState {
    Disconnected,
    Connecting { attempt: u64, future: ConnectFuture },
    Connected(ConnectionHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

struct Inner {
    url: Url,
    request_timeout: Duration,
    transport: Arc<dyn Transport>,
    state: Mutex<ConnectionState>,
    attempts: AtomicU64,
    // Attempts numbered at or below this were closed by `close()`.
    closed_through: AtomicU64,
    next_req_id: Arc<AtomicU64>,
    listeners: Arc<ListenerRegistry>,
}

/// One shared venue connection, multiplexing correlated requests and
/// listener fan-out. Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Multiplexer {
    inner: Arc<Inner>,
}

impl Multiplexer {
    pub fn new(config: &VenueConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_transport(
            config.endpoint()?,
            config.request_timeout,
            Arc::new(WebSocketTransport),
        ))
    }

    #[must_use]
    pub fn with_transport(
        url: Url,
        request_timeout: Duration,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                url,
                request_timeout,
                transport,
                state: Mutex::new(ConnectionState::Disconnected),
                attempts: AtomicU64::new(0),
                closed_through: AtomicU64::new(0),
                next_req_id: Arc::new(AtomicU64::new(1)),
                listeners: Arc::new(ListenerRegistry::default()),
            }),
        }
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        match &*self.inner.lock_state() {
            ConnectionState::Connected(handle) if handle.is_alive() => ConnectionStatus::Connected,
            ConnectionState::Connecting { .. } => ConnectionStatus::Connecting,
            _ => ConnectionStatus::Disconnected,
        }
    }

    /// Opens the connection unless one is open or being opened; concurrent
    /// callers all await the same attempt.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.handle().await.map(|_| ())
    }

    /// Sends `request` and resolves with the reply's `response_field`.
    pub async fn request(&self, request: &VenueRequest) -> Result<Value, ConnectionError> {
        self.request_with_timeout(request, self.inner.request_timeout)
            .await
    }

    pub async fn request_with_timeout(
        &self,
        request: &VenueRequest,
        limit: Duration,
    ) -> Result<Value, ConnectionError> {
        let mut message = self.exchange(request, limit).await?;
        Ok(message
            .get_mut(request.response_field())
            .map(Value::take)
            .unwrap_or_default())
    }

    /// Starts a tick stream for `symbol`. Only the confirming tick is returned
    /// here; later ticks arrive through [`Multiplexer::on_message`].
    pub async fn subscribe_ticks(&self, symbol: &str) -> Result<TickSubscription, ConnectionError> {
        let request = VenueRequest::Ticks {
            symbol: symbol.to_string(),
        };
        let message = self.exchange(&request, self.inner.request_timeout).await?;

        let subscription_id = message
            .pointer("/subscription/id")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectionError::Parse("tick reply has no subscription id".into()))?
            .to_string();
        let first_tick: Tick = serde_json::from_value(message["tick"].clone())
            .map_err(|e| ConnectionError::Parse(e.to_string()))?;

        info!(symbol, %subscription_id, "📈 Subscribed to ticks");
        Ok(TickSubscription {
            subscription_id,
            first_tick,
        })
    }

    /// Stops a tick stream. Fails with `UnknownSubscription` when the venue
    /// did not recognise the id.
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ConnectionError> {
        let request = VenueRequest::Forget {
            subscription_id: subscription_id.to_string(),
        };
        let acknowledged = self.request(&request).await?;
        let forgotten = acknowledged
            .as_u64()
            .map(|n| n != 0)
            .or_else(|| acknowledged.as_bool())
            .unwrap_or(false);

        if !forgotten {
            return Err(ConnectionError::UnknownSubscription(
                subscription_id.to_string(),
            ));
        }
        info!(%subscription_id, "Unsubscribed from ticks");
        Ok(())
    }

    /// Registers `listener` for every inbound message. Listeners survive
    /// reconnection.
    pub fn on_message<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.listeners.register(Arc::new(listener))
    }

    pub fn unregister(&self, id: ListenerId) -> bool {
        self.inner.listeners.unregister(id)
    }

    /// Closes the live connection, failing whatever is still pending. An
    /// attempt still in flight is abandoned: its waiters get `Closed` and the
    /// socket it opens is shut. The next request reconnects.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.inner.lock_state();
            self.inner
                .closed_through
                .store(self.inner.attempts.load(Ordering::SeqCst), Ordering::SeqCst);
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };
        if let ConnectionState::Connected(handle) = previous {
            if handle.commands.send(ConnectionCommand::Close).await.is_err() {
                debug!("Connection already closed");
            }
        }
    }

    async fn exchange(
        &self,
        request: &VenueRequest,
        limit: Duration,
    ) -> Result<Value, ConnectionError> {
        let handle = self.handle().await?;
        let req_id = self.inner.next_req_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();

        handle
            .commands
            .send(ConnectionCommand::Request {
                req_id,
                payload: request.to_payload(req_id),
                response_field: request.response_field(),
                reply,
            })
            .await
            .map_err(|_| ConnectionError::Closed)?;
        debug!(req_id, "➡️ {request}");

        match timeout(limit, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ConnectionError::Closed),
            Err(_) => {
                warn!(req_id, "⏰ No reply to {request} within {limit:?}");
                let _ = handle.commands.send(ConnectionCommand::Cancel { req_id }).await;
                Err(ConnectionError::Timeout {
                    req_id,
                    timeout: limit,
                })
            }
        }
    }

    async fn handle(&self) -> Result<ConnectionHandle, ConnectionError> {
        let (attempt, future) = {
            let mut state = self.inner.lock_state();
            match &*state {
                ConnectionState::Connected(handle) if handle.is_alive() => {
                    return Ok(handle.clone());
                }
                ConnectionState::Connecting { attempt, future } => (*attempt, future.clone()),
                _ => {
                    let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = Arc::clone(&self.inner).open(attempt).boxed().shared();
                    *state = ConnectionState::Connecting {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let outcome = future.await;

        let superseded = {
            let mut state = self.inner.lock_state();
            if matches!(&*state, ConnectionState::Connecting { attempt: current, .. } if *current == attempt)
            {
                *state = match &outcome {
                    Ok(handle) => ConnectionState::Connected(handle.clone()),
                    Err(_) => ConnectionState::Disconnected,
                };
            }
            attempt <= self.inner.closed_through.load(Ordering::SeqCst)
        };

        match outcome {
            Ok(handle) if superseded => {
                debug!(attempt, "Connection closed while it was being opened");
                // Every waiter may try; the actor stops on the first.
                let _ = handle.commands.send(ConnectionCommand::Close).await;
                Err(ConnectionError::Closed)
            }
            outcome => outcome,
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn open(self: Arc<Self>, attempt: u64) -> Result<ConnectionHandle, ConnectionError> {
        info!(attempt, "🔌 Connecting to {}", self.url);
        let opened = timeout(self.request_timeout, self.transport.open(&self.url))
            .await
            .map_err(|_| ConnectionError::Transport("timed out opening connection".into()))
            .and_then(|opened| opened);

        let (sink, stream) = match opened {
            Ok(halves) => halves,
            Err(e) => {
                warn!(attempt, "❌ Failed to connect: {e}");
                return Err(e);
            }
        };

        let (commands, command_receiver) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let actor = ConnectionActor::new(
            format!("venue-{attempt}"),
            command_receiver,
            sink,
            stream,
            Arc::clone(&self.listeners),
            Arc::clone(&self.next_req_id),
        );
        tokio::spawn(actor.run().in_current_span());

        info!(attempt, "✅ Connected");
        Ok(ConnectionHandle { commands })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devtools::{MockTransport, MockVenue};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn multiplexer(transport: Arc<MockTransport>, limit: Duration) -> Multiplexer {
        let url = Url::parse("wss://venue.test/websockets/v3?app_id=1").unwrap();
        Multiplexer::with_transport(url, limit, transport)
    }

    async fn connected(
        limit: Duration,
    ) -> (Multiplexer, MockVenue, mpsc::UnboundedReceiver<MockVenue>) {
        let (transport, mut venues) = MockTransport::new();
        let mux = multiplexer(transport, limit);
        mux.connect().await.unwrap();
        let venue = venues.recv().await.unwrap();
        (mux, venue, venues)
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_attempt() {
        let (transport, _venues) = MockTransport::with_connect_delay(Duration::from_millis(50));
        let mux = multiplexer(transport.clone(), Duration::from_secs(5));

        let (a, b, c) = tokio::join!(mux.connect(), mux.connect(), mux.connect());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(transport.opens(), 1);
        assert_eq!(mux.status(), ConnectionStatus::Connected);

        mux.connect().await.unwrap();
        assert_eq!(transport.opens(), 1);
    }

    #[tokio::test]
    async fn failed_attempt_is_shared_then_retried() {
        let (transport, _venues) = MockTransport::with_connect_delay(Duration::from_millis(20));
        transport.refuse_connections(true);
        let mux = multiplexer(transport.clone(), Duration::from_secs(5));

        let (a, b) = tokio::join!(mux.connect(), mux.connect());
        assert!(matches!(a, Err(ConnectionError::Transport(_))));
        assert_eq!(a, b);
        assert_eq!(transport.opens(), 1);
        assert_eq!(mux.status(), ConnectionStatus::Disconnected);

        transport.refuse_connections(false);
        mux.connect().await.unwrap();
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test]
    async fn replies_out_of_order_reach_their_callers() {
        let (mux, mut venue, _venues) = connected(Duration::from_secs(5)).await;

        let first = tokio::spawn({
            let mux = mux.clone();
            async move {
                mux.request(&VenueRequest::ContractsFor { symbol: "R_100".into() })
                    .await
            }
        });
        let first_request = venue.next_request().await.unwrap();

        let second = tokio::spawn({
            let mux = mux.clone();
            async move {
                mux.request(&VenueRequest::ContractsFor { symbol: "R_50".into() })
                    .await
            }
        });
        let second_request = venue.next_request().await.unwrap();
        assert_ne!(first_request["req_id"], second_request["req_id"]);

        venue.reply_to(&second_request, "contracts_for", json!({ "for": "R_50" }));
        venue.reply_to(&first_request, "contracts_for", json!({ "for": "R_100" }));

        assert_eq!(first.await.unwrap().unwrap(), json!({ "for": "R_100" }));
        assert_eq!(second.await.unwrap().unwrap(), json!({ "for": "R_50" }));
    }

    #[tokio::test]
    async fn venue_error_fails_only_that_request() {
        let (mux, mut venue, _venues) = connected(Duration::from_secs(5)).await;

        let failing = tokio::spawn({
            let mux = mux.clone();
            async move {
                mux.request(&VenueRequest::ContractsFor { symbol: "NOPE".into() })
                    .await
            }
        });
        let bad = venue.next_request().await.unwrap();

        let passing = tokio::spawn({
            let mux = mux.clone();
            async move { mux.request(&VenueRequest::ActiveSymbols).await }
        });
        let good = venue.next_request().await.unwrap();

        venue.reject(&bad, "InvalidSymbol", "Symbol NOPE is invalid");
        venue.reply_to(&good, "active_symbols", json!([]));

        assert_eq!(
            failing.await.unwrap(),
            Err(ConnectionError::Venue {
                code: "InvalidSymbol".into(),
                message: "Symbol NOPE is invalid".into(),
            })
        );
        assert_eq!(passing.await.unwrap().unwrap(), json!([]));
    }

    #[tokio::test]
    async fn unanswered_request_times_out_and_late_reply_goes_to_listeners() {
        let (mux, mut venue, _venues) = connected(Duration::from_millis(50)).await;
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        mux.on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = mux.request(&VenueRequest::ActiveSymbols).await;
        let request = venue.next_request().await.unwrap();
        let req_id = request["req_id"].as_u64().unwrap();
        assert_eq!(
            outcome,
            Err(ConnectionError::Timeout {
                req_id,
                timeout: Duration::from_millis(50),
            })
        );

        venue.reply_to(&request, "active_symbols", json!([]));
        let next = tokio::spawn({
            let mux = mux.clone();
            async move { mux.request(&VenueRequest::ContractsForCompany).await }
        });
        let follow_up = venue.next_request().await.unwrap();
        venue.reply_to(&follow_up, "contracts_for_company", json!({ "available": [] }));

        assert!(next.await.unwrap().is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_loss_fails_pending_and_next_call_reconnects() {
        let (transport, mut venues) = MockTransport::new();
        let mux = multiplexer(transport.clone(), Duration::from_secs(5));

        let pending = tokio::spawn({
            let mux = mux.clone();
            async move { mux.request(&VenueRequest::ActiveSymbols).await }
        });
        let mut venue = venues.recv().await.unwrap();
        venue.next_request().await.unwrap();
        venue.fail("connection reset");

        assert_eq!(
            pending.await.unwrap(),
            Err(ConnectionError::Transport("connection reset".into()))
        );

        let retry = tokio::spawn({
            let mux = mux.clone();
            async move { mux.request(&VenueRequest::ActiveSymbols).await }
        });
        let mut venue = venues.recv().await.unwrap();
        let request = venue.next_request().await.unwrap();
        venue.reply_to(&request, "active_symbols", json!([]));

        assert!(retry.await.unwrap().is_ok());
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test]
    async fn malformed_frame_keeps_connection_usable() {
        let (mux, mut venue, _venues) = connected(Duration::from_secs(5)).await;

        let pending = tokio::spawn({
            let mux = mux.clone();
            async move { mux.request(&VenueRequest::ActiveSymbols).await }
        });
        let request = venue.next_request().await.unwrap();
        venue.send_raw("{not json");
        venue.reply_to(&request, "active_symbols", json!([{ "symbol": "R_100" }]));

        assert_eq!(
            pending.await.unwrap().unwrap(),
            json!([{ "symbol": "R_100" }])
        );
        assert_eq!(mux.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn subscribe_and_forget() {
        let (mux, mut venue, _venues) = connected(Duration::from_secs(5)).await;

        let subscribing = tokio::spawn({
            let mux = mux.clone();
            async move { mux.subscribe_ticks("R_100").await }
        });
        let request = venue.next_request().await.unwrap();
        assert_eq!(request["ticks"], "R_100");
        assert_eq!(request["subscribe"], 1);
        venue.reply(json!({
            "msg_type": "tick",
            "tick": { "symbol": "R_100", "epoch": 1_700_000_000, "quote": 1.5, "ask": 1.6, "bid": 1.4 },
            "subscription": { "id": "sub-1" },
            "req_id": request["req_id"],
        }));

        let subscription = subscribing.await.unwrap().unwrap();
        assert_eq!(subscription.subscription_id, "sub-1");
        assert_eq!(subscription.first_tick.ask, 1.6);

        let forgetting = tokio::spawn({
            let mux = mux.clone();
            async move { mux.unsubscribe("sub-1").await }
        });
        let forget = venue.next_request().await.unwrap();
        assert_eq!(forget["forget"], "sub-1");
        venue.reply_to(&forget, "forget", json!(1));
        assert!(forgetting.await.unwrap().is_ok());

        let unknown = tokio::spawn({
            let mux = mux.clone();
            async move { mux.unsubscribe("sub-404").await }
        });
        let forget = venue.next_request().await.unwrap();
        venue.reply_to(&forget, "forget", json!(0));
        assert_eq!(
            unknown.await.unwrap(),
            Err(ConnectionError::UnknownSubscription("sub-404".into()))
        );
    }

    #[tokio::test]
    async fn listeners_see_every_message_until_unregistered() {
        let (mux, venue, _venues) = connected(Duration::from_secs(5)).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (all_tx, mut all_rx) = mpsc::unbounded_channel();

        mux.on_message(|_| panic!("broken listener"));
        let handle = mux.on_message(move |message| {
            let _ = tx.send(message["n"].clone());
        });
        mux.on_message(move |message| {
            let _ = all_tx.send(message["n"].clone());
        });

        venue.reply(json!({ "msg_type": "tick", "n": 1 }));
        assert_eq!(rx.recv().await.unwrap(), json!(1));
        assert_eq!(all_rx.recv().await.unwrap(), json!(1));

        assert!(handle.unregister());
        assert!(!mux.unregister(handle.id()));
        venue.reply(json!({ "msg_type": "tick", "n": 2 }));
        assert_eq!(all_rx.recv().await.unwrap(), json!(2));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_during_connect_abandons_the_attempt() {
        let (transport, mut venues) = MockTransport::with_connect_delay(Duration::from_millis(100));
        let mux = multiplexer(transport.clone(), Duration::from_secs(5));

        let first = tokio::spawn({
            let mux = mux.clone();
            async move { mux.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(mux.status(), ConnectionStatus::Connecting);
        mux.close().await;

        assert_eq!(first.await.unwrap(), Err(ConnectionError::Closed));
        let mut abandoned = venues.recv().await.unwrap();
        assert!(abandoned.next_request().await.is_none());

        mux.connect().await.unwrap();
        assert_eq!(transport.opens(), 2);
        assert_eq!(mux.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn late_tick_confirmation_is_forgotten() {
        let (mux, mut venue, _venues) = connected(Duration::from_millis(50)).await;

        let outcome = mux.subscribe_ticks("R_100").await;
        assert!(matches!(outcome, Err(ConnectionError::Timeout { .. })));

        let request = venue.next_request().await.unwrap();
        venue.reply(json!({
            "msg_type": "tick",
            "tick": { "symbol": "R_100", "epoch": 1_700_000_000, "ask": 1.6, "bid": 1.4 },
            "subscription": { "id": "sub-late" },
            "req_id": request["req_id"],
        }));

        let forget = venue.next_request().await.unwrap();
        assert_eq!(forget["forget"], "sub-late");
        assert!(forget["req_id"].as_u64().unwrap() > request["req_id"].as_u64().unwrap());
    }

    #[tokio::test]
    async fn close_fails_pending_and_allows_reconnect() {
        let (transport, mut venues) = MockTransport::new();
        let mux = multiplexer(transport.clone(), Duration::from_secs(5));

        let pending = tokio::spawn({
            let mux = mux.clone();
            async move { mux.request(&VenueRequest::ActiveSymbols).await }
        });
        let mut venue = venues.recv().await.unwrap();
        venue.next_request().await.unwrap();

        mux.close().await;
        assert_eq!(pending.await.unwrap(), Err(ConnectionError::Closed));
        assert_eq!(mux.status(), ConnectionStatus::Disconnected);

        mux.connect().await.unwrap();
        assert_eq!(transport.opens(), 2);
    }
}
