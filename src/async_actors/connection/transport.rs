// src/async_actors/connection/transport.rs

// 🌍 Standard library
use std::pin::Pin;

// 📦 External crates
use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tracing::{debug, info};
use tungstenite::Message;
use url::Url;

// 🧠 Internal modules
use super::ConnectionError;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ConnectionError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ConnectionError>> + Send>>;

/// Opens the duplex text channel the connection actor runs on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), ConnectionError>;
}

/// Production transport over `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &Url) -> Result<(FrameSink, FrameStream), ConnectionError> {
        debug!("Attempting to create WebSocket stream to {url}");
        let (ws_stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        let (write_half, read_half) = ws_stream.split();

        let sink = write_half
            .sink_map_err(|e| ConnectionError::Transport(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, ConnectionError>(Message::Text(text.into()))));

        // Ping/pong is answered by tungstenite; only payload frames are surfaced.
        let stream = read_half.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|e| ConnectionError::Parse(e.to_string())),
                ),
                Ok(Message::Close(frame)) => {
                    info!("Venue sent close frame: {:?}", frame);
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(ConnectionError::Transport(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
