// src/async_actors/messages.rs

// 🌍 Standard library
use std::fmt;

// 📦 External crates
use serde_json::{json, Value};
use tokio::sync::oneshot;

// 🧠 Internal modules
use crate::async_actors::connection::ConnectionError;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_LANDING_COMPANY: &str = "svg";
const PRODUCT_TYPE: &str = "basic";

/// Outbound calls this crate makes to the venue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueRequest {
    ActiveSymbols,
    ContractsForCompany,
    ContractsFor { symbol: String },
    Ticks { symbol: String },
    Forget { subscription_id: String },
}

impl VenueRequest {
    /// Wire payload, tagged with `req_id` so the reply can be correlated.
    #[must_use]
    pub fn to_payload(&self, req_id: u64) -> Value {
        let mut payload = match self {
            Self::ActiveSymbols => json!({
                "active_symbols": "brief",
                "product_type": PRODUCT_TYPE,
            }),
            Self::ContractsForCompany => json!({ "contracts_for_company": 1 }),
            Self::ContractsFor { symbol } => json!({
                "contracts_for": symbol,
                "currency": DEFAULT_CURRENCY,
                "landing_company": DEFAULT_LANDING_COMPANY,
                "product_type": PRODUCT_TYPE,
            }),
            Self::Ticks { symbol } => json!({ "ticks": symbol, "subscribe": 1 }),
            Self::Forget { subscription_id } => json!({ "forget": subscription_id }),
        };
        payload["req_id"] = json!(req_id);
        payload
    }

    /// Top-level field a successful reply carries.
    #[must_use]
    pub const fn response_field(&self) -> &'static str {
        match self {
            Self::ActiveSymbols => "active_symbols",
            Self::ContractsForCompany => "contracts_for_company",
            Self::ContractsFor { .. } => "contracts_for",
            Self::Ticks { .. } => "tick",
            Self::Forget { .. } => "forget",
        }
    }
}

impl fmt::Display for VenueRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActiveSymbols => write!(f, "active_symbols"),
            Self::ContractsForCompany => write!(f, "contracts_for_company"),
            Self::ContractsFor { symbol } => write!(f, "contracts_for {symbol}"),
            Self::Ticks { symbol } => write!(f, "ticks {symbol}"),
            Self::Forget { subscription_id } => write!(f, "forget {subscription_id}"),
        }
    }
}

pub type ReplySender = oneshot::Sender<Result<Value, ConnectionError>>;

#[derive(Debug)]
pub enum ConnectionCommand {
    Request {
        req_id: u64,
        payload: Value,
        response_field: &'static str,
        reply: ReplySender,
    },
    /// Drops the pending entry for a request whose caller gave up.
    Cancel { req_id: u64 },
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_match_venue_shapes() {
        assert_eq!(
            VenueRequest::ActiveSymbols.to_payload(1),
            json!({ "active_symbols": "brief", "product_type": "basic", "req_id": 1 })
        );
        assert_eq!(
            VenueRequest::ContractsForCompany.to_payload(2),
            json!({ "contracts_for_company": 1, "req_id": 2 })
        );
        assert_eq!(
            VenueRequest::ContractsFor { symbol: "R_100".into() }.to_payload(3),
            json!({
                "contracts_for": "R_100",
                "currency": "USD",
                "landing_company": "svg",
                "product_type": "basic",
                "req_id": 3
            })
        );
        assert_eq!(
            VenueRequest::Ticks { symbol: "R_50".into() }.to_payload(4),
            json!({ "ticks": "R_50", "subscribe": 1, "req_id": 4 })
        );
        assert_eq!(
            VenueRequest::Forget { subscription_id: "abc".into() }.to_payload(5),
            json!({ "forget": "abc", "req_id": 5 })
        );
    }

    #[test]
    fn response_fields() {
        assert_eq!(VenueRequest::ActiveSymbols.response_field(), "active_symbols");
        assert_eq!(
            VenueRequest::Ticks { symbol: "R_50".into() }.response_field(),
            "tick"
        );
    }
}
