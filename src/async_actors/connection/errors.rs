// src/async_actors/connection/errors.rs

// 🌍 Standard library
use std::time::Duration;

// 📦 External crates
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    // -------------------------------------------------------
    // Transport errors, broadcast to every pending request
    // -------------------------------------------------------
    #[error("❌ Transport error: {0}")]
    Transport(String),
    #[error("❌ Connection closed")]
    Closed,

    // -------------------------------------------------------
    // Request errors, local to one caller
    // -------------------------------------------------------
    #[error("❌ Venue error {code}: {message}")]
    Venue { code: String, message: String },
    #[error("❌ Request {req_id} timed out after {timeout:?}")]
    Timeout { req_id: u64, timeout: Duration },
    #[error("❌ Parse error: {0}")]
    Parse(String),
    #[error("❌ Unknown subscription: {0}")]
    UnknownSubscription(String),
}

impl ConnectionError {
    /// `true` for failures that took the whole connection down.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Closed)
    }

    pub(crate) fn from_venue(error: &serde_json::Value) -> Self {
        let field = |name: &str| {
            error
                .get(name)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self::Venue {
            code: field("code"),
            message: field("message"),
        }
    }
}
