// src/async_actors/connection/actor.rs

// 🌍 Standard library
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// 📦 External crates
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn, Instrument};

// 🧠 Internal modules
use super::listeners::ListenerRegistry;
use super::transport::{FrameSink, FrameStream};
use super::ConnectionError;
use crate::async_actors::messages::{ConnectionCommand, ReplySender, VenueRequest};

const SEND_CLOSE_FRAME_TIMEOUT: u64 = 3;
const TICK_FIELD: &str = "tick";

struct PendingRequest {
    response_field: &'static str,
    reply: ReplySender,
}

/// Owns one live connection: writes outbound requests, correlates replies by
/// `req_id` and fans every inbound message out to the listeners.
pub(crate) struct ConnectionActor {
    actor_id: String,
    command_receiver: mpsc::Receiver<ConnectionCommand>,
    sink: FrameSink,
    stream: FrameStream,
    pending: HashMap<u64, PendingRequest>,
    // Cancelled tick subscriptions whose confirmation may still arrive.
    abandoned: HashSet<u64>,
    listeners: Arc<ListenerRegistry>,
    next_req_id: Arc<AtomicU64>,
}

impl ConnectionActor {
    pub(crate) fn new(
        actor_id: String,
        command_receiver: mpsc::Receiver<ConnectionCommand>,
        sink: FrameSink,
        stream: FrameStream,
        listeners: Arc<ListenerRegistry>,
        next_req_id: Arc<AtomicU64>,
    ) -> Self {
        Self {
            actor_id,
            command_receiver,
            sink,
            stream,
            pending: HashMap::new(),
            abandoned: HashSet::new(),
            listeners,
            next_req_id,
        }
    }

    pub(crate) async fn run(mut self) {
        let span = tracing::info_span!(
            "ConnectionActor",
            actor_id = %self.actor_id
        );

        async move {
            let reason = loop {
                tokio::select! {
                    frame = self.stream.next() => {
                        match frame {
                            Some(Ok(text)) => {
                                if let Some(subscription_id) = self.handle_frame(&text) {
                                    if let Err(e) = self.forget_orphan(subscription_id).await {
                                        error!("Failed to forget orphaned subscription: {e}");
                                        break e;
                                    }
                                }
                            }
                            Some(Err(ConnectionError::Parse(e))) => {
                                warn!("⚠️ Dropping undecodable frame: {e}");
                            }
                            Some(Err(e)) => {
                                error!("Error receiving venue message: {e}");
                                break e;
                            }
                            None => {
                                info!("Venue stream ended");
                                break ConnectionError::Closed;
                            }
                        }
                    }

                    command = self.command_receiver.recv() => {
                        match command {
                            Some(command) => {
                                if let Some(reason) = self.handle_command(command).await {
                                    break reason;
                                }
                            }
                            None => {
                                debug!("All connection handles dropped");
                                break ConnectionError::Closed;
                            }
                        }
                    }
                }
            };
            self.tear_down(reason);
        }
        .instrument(span)
        .await
    }

    /// Returns the reason to stop, if the command ended the connection.
    async fn handle_command(&mut self, command: ConnectionCommand) -> Option<ConnectionError> {
        match command {
            ConnectionCommand::Request {
                req_id,
                payload,
                response_field,
                reply,
            } => {
                let text = match serde_json::to_string(&payload) {
                    Ok(text) => text,
                    Err(e) => {
                        let _ = reply.send(Err(ConnectionError::Parse(e.to_string())));
                        return None;
                    }
                };
                self.pending.insert(
                    req_id,
                    PendingRequest {
                        response_field,
                        reply,
                    },
                );
                match self.sink.send(text).await {
                    Ok(()) => {
                        debug!(req_id, "Sent request to venue: {payload}");
                        None
                    }
                    Err(e) => {
                        error!(req_id, "Failed to send request to venue: {e}");
                        Some(e)
                    }
                }
            }
            ConnectionCommand::Cancel { req_id } => {
                if let Some(pending) = self.pending.remove(&req_id) {
                    debug!(req_id, "Dropped pending request");
                    if pending.response_field == TICK_FIELD {
                        self.abandoned.insert(req_id);
                    }
                }
                None
            }
            ConnectionCommand::Close => {
                self.send_close_frame().await;
                Some(ConnectionError::Closed)
            }
        }
    }

    /// Returns the id of a subscription nobody is waiting for any more.
    fn handle_frame(&mut self, text: &str) -> Option<String> {
        let message: Value = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("⚠️ Failed to parse venue message: {e}");
                return None;
            }
        };

        self.listeners.dispatch(&message);

        let req_id = message.get("req_id").and_then(Value::as_u64);
        let subscription_id = message
            .pointer("/subscription/id")
            .and_then(Value::as_str)
            .map(str::to_string);

        match req_id.and_then(|id| self.pending.remove(&id)) {
            Some(pending) => {
                let outcome = resolve(&message, pending.response_field);
                if pending.reply.send(outcome).is_err() {
                    debug!(?req_id, "Requester went away before the reply arrived");
                    return subscription_id;
                }
            }
            None if req_id.is_some_and(|id| self.abandoned.remove(&id)) => {
                return subscription_id;
            }
            None => {
                if let Some(error) = message.get("error") {
                    warn!(?req_id, "Uncorrelated venue error: {error}");
                }
            }
        }
        None
    }

    async fn forget_orphan(&mut self, subscription_id: String) -> Result<(), ConnectionError> {
        let req_id = self.next_req_id.fetch_add(1, Ordering::Relaxed);
        warn!(req_id, %subscription_id, "Forgetting subscription confirmed after its requester gave up");
        let payload = VenueRequest::Forget { subscription_id }.to_payload(req_id);
        self.sink.send(payload.to_string()).await
    }

    async fn send_close_frame(&mut self) {
        debug!("Sending close frame");
        match timeout(
            Duration::from_secs(SEND_CLOSE_FRAME_TIMEOUT),
            self.sink.close(),
        )
        .await
        {
            Ok(Ok(())) => debug!("Successfully closed venue connection"),
            Ok(Err(e)) => warn!("Failed to close venue connection: {e}"),
            Err(_) => warn!("Timeout while closing venue connection"),
        }
    }

    fn tear_down(&mut self, reason: ConnectionError) {
        // Handles must see the connection as gone before pending work is failed.
        self.command_receiver.close();
        while let Ok(command) = self.command_receiver.try_recv() {
            if let ConnectionCommand::Request { reply, .. } = command {
                let _ = reply.send(Err(reason.clone()));
            }
        }

        if !self.pending.is_empty() {
            warn!(
                pending = self.pending.len(),
                "Failing pending requests: {reason}"
            );
        }
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(reason.clone()));
        }
        info!("Connection torn down: {reason}");
    }
}

fn resolve(message: &Value, response_field: &str) -> Result<Value, ConnectionError> {
    if let Some(error) = message.get("error") {
        return Err(ConnectionError::from_venue(error));
    }
    if message.get(response_field).is_none() {
        return Err(ConnectionError::Parse(format!(
            "reply is missing `{response_field}`"
        )));
    }
    Ok(message.clone())
}
