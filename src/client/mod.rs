// src/client/mod.rs

// 📦 External crates
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

// 🧠 Internal modules
pub mod tick_feed;
pub use tick_feed::TickFeed;

use crate::async_actors::connection::{ConnectionError, ListenerHandle, Multiplexer};
use crate::async_actors::messages::VenueRequest;
use crate::domain::contracts::{category_for_display, find_matching_contract};
use crate::model::{ActiveSymbol, ContractType, ContractsFor, TickSubscription};

/// Typed venue API over a shared [`Multiplexer`].
#[derive(Clone)]
pub struct VenueClient {
    multiplexer: Multiplexer,
}

impl VenueClient {
    #[must_use]
    pub fn new(multiplexer: Multiplexer) -> Self {
        Self { multiplexer }
    }

    #[must_use]
    pub fn multiplexer(&self) -> &Multiplexer {
        &self.multiplexer
    }

    pub async fn get_active_symbols(&self) -> Result<Vec<ActiveSymbol>, ConnectionError> {
        let symbols: Vec<ActiveSymbol> =
            decode_field(self.multiplexer.request(&VenueRequest::ActiveSymbols).await?)?;
        info!("Fetched {} active symbols", symbols.len());
        Ok(symbols)
    }

    pub async fn get_contracts_for_company(&self) -> Result<ContractsFor, ConnectionError> {
        decode_field(
            self.multiplexer
                .request(&VenueRequest::ContractsForCompany)
                .await?,
        )
    }

    pub async fn get_contracts_for_symbol(
        &self,
        symbol: &str,
    ) -> Result<ContractsFor, ConnectionError> {
        let request = VenueRequest::ContractsFor {
            symbol: symbol.to_string(),
        };
        decode_field(self.multiplexer.request(&request).await?)
    }

    pub async fn subscribe_ticks(&self, symbol: &str) -> Result<TickSubscription, ConnectionError> {
        self.multiplexer.subscribe_ticks(symbol).await
    }

    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<(), ConnectionError> {
        self.multiplexer.unsubscribe(subscription_id).await
    }

    pub fn on_message<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.multiplexer.on_message(listener)
    }

    /// Raw contract behind a category picked by display name (or raw key) for
    /// `symbol`. Its stake and minimum duration seed the trade form.
    pub async fn selected_contract(
        &self,
        symbol: &str,
        display: &str,
    ) -> Result<Option<ContractType>, ConnectionError> {
        let category = category_for_display(display).unwrap_or(display);
        let contracts = self.get_contracts_for_symbol(symbol).await?;
        let selected = find_matching_contract(&contracts.available, category).cloned();
        debug!(symbol, category, found = selected.is_some(), "Contract lookup");
        Ok(selected)
    }

    pub async fn tick_feed(&self, symbol: &str) -> Result<TickFeed, ConnectionError> {
        TickFeed::open(self.multiplexer.clone(), symbol).await
    }

    pub async fn close(&self) {
        self.multiplexer.close().await;
    }
}

fn decode_field<T: DeserializeOwned>(value: Value) -> Result<T, ConnectionError> {
    serde_json::from_value(value).map_err(|e| ConnectionError::Parse(e.to_string()))
}
