// src/model/mod.rs

// 📦 External crates
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A tradable instrument as listed by `active_symbols`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSymbol {
    pub symbol: String,
    pub display_name: String,
    #[serde(default)]
    pub symbol_type: String,
    pub market: String,
    pub market_display_name: String,
    pub submarket: String,
    pub submarket_display_name: String,
    pub pip: f64,
    #[serde(default, deserialize_with = "bool_from_flag")]
    pub allow_forward_starting: bool,
    #[serde(default, deserialize_with = "bool_from_flag")]
    pub is_trading_suspended: bool,
    #[serde(default, deserialize_with = "bool_from_flag")]
    pub exchange_is_open: bool,
}

/// A raw contract offering from `contracts_for` / `contracts_for_company`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractType {
    pub contract_category: String,
    #[serde(default)]
    pub contract_category_display: String,
    #[serde(default)]
    pub barrier_category: String,
    pub contract_type: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub default_stake: f64,
    #[serde(default)]
    pub min_contract_duration: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractsFor {
    #[serde(default)]
    pub available: Vec<ContractType>,
    #[serde(default)]
    pub unavailable: Vec<ContractType>,
}

/// One direction of a contract category, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SentimentPair {
    pub contract_type: String,
    pub sentiment: String,
}

impl SentimentPair {
    pub fn of(contract: &ContractType) -> Self {
        Self {
            contract_type: contract.contract_type.clone(),
            sentiment: contract.sentiment.clone(),
        }
    }
}

/// A normalized contract category ready for a selection control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedContractType {
    pub contract_category: String,
    pub contract_category_display: String,
    pub barrier_category: String,
    pub sentiments: Vec<SentimentPair>,
    pub display_name: String,
    pub default_stake: f64,
    pub min_contract_duration: String,
    pub name: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub epoch: i64,
    #[serde(default)]
    pub quote: f64,
    #[serde(default)]
    pub ask: f64,
    #[serde(default)]
    pub bid: f64,
    #[serde(default)]
    pub pip_size: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Tick {
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.epoch, 0)
    }
}

/// Result of a successful tick subscription: the id needed for `forget`
/// plus the tick that confirmed it.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSubscription {
    pub subscription_id: String,
    pub first_tick: Tick,
}

// The venue sends boolean flags as 0/1.
fn bool_from_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i64),
        Bool(bool),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Int(value) => value != 0,
        Flag::Bool(value) => value,
    })
}
