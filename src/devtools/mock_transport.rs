// src/devtools/mock_transport.rs

// 🌍 Standard library
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// 📦 External crates
use async_trait::async_trait;
use futures_util::{sink, stream};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use url::Url;

// 🧠 Internal modules
use crate::async_actors::connection::{ConnectionError, FrameSink, FrameStream, Transport};

/// In-memory stand-in for the venue socket. Every successful `open` hands the
/// far end of the new connection to the test as a [`MockVenue`].
pub struct MockTransport {
    opens: AtomicUsize,
    refuse: AtomicBool,
    connect_delay: Duration,
    venues: mpsc::UnboundedSender<MockVenue>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockVenue>) {
        Self::with_connect_delay(Duration::ZERO)
    }

    #[must_use]
    pub fn with_connect_delay(
        connect_delay: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MockVenue>) {
        let (venues, receiver) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            opens: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            connect_delay,
            venues,
        });
        (transport, receiver)
    }

    /// Number of connection attempts made so far, failed ones included.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, _url: &Url) -> Result<(FrameSink, FrameStream), ConnectionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("connection refused".into()));
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel::<String>();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Result<String, ConnectionError>>();

        let sink = sink::unfold(request_tx, |tx, text: String| async move {
            tx.send(text).map_err(|_| ConnectionError::Closed)?;
            Ok::<_, ConnectionError>(tx)
        });
        let stream = stream::unfold(frame_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });

        let _ = self.venues.send(MockVenue {
            requests: request_rx,
            frames: frame_tx,
        });
        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

/// Far end of one mock connection. Dropping it ends the client's stream.
pub struct MockVenue {
    requests: mpsc::UnboundedReceiver<String>,
    frames: mpsc::UnboundedSender<Result<String, ConnectionError>>,
}

impl MockVenue {
    /// Next request the client wrote, or `None` once the client side is gone.
    ///
    /// # Panics
    /// Panics if the client wrote something that is not JSON.
    pub async fn next_request(&mut self) -> Option<Value> {
        let text = self.requests.recv().await?;
        Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
    }

    pub fn reply(&self, message: Value) {
        let _ = self.frames.send(Ok(message.to_string()));
    }

    /// Successful reply to `request` carrying `body` under `msg_type`.
    pub fn reply_to(&self, request: &Value, msg_type: &str, body: Value) {
        self.reply(json!({
            "echo_req": request,
            "msg_type": msg_type,
            msg_type: body,
            "req_id": request["req_id"],
        }));
    }

    /// Venue-side error reply to `request`.
    pub fn reject(&self, request: &Value, code: &str, message: &str) {
        self.reply(json!({
            "echo_req": request,
            "error": { "code": code, "message": message },
            "req_id": request["req_id"],
        }));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.frames.send(Ok(text.to_string()));
    }

    /// Surfaces a transport failure on the client's stream.
    pub fn fail(&self, reason: &str) {
        let _ = self
            .frames
            .send(Err(ConnectionError::Transport(reason.to_string())));
    }
}
