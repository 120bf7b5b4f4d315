// src/main.rs

// 🌍 Standard library
use std::error::Error;
use std::time::Duration;

// 📦 External crates
use dotenv::dotenv;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};

// 🧠 Internal modules
use trade_client::domain::contracts::{display_name, normalize_contracts, RISE_FALL};
use trade_client::domain::trade_params::{TimeUnit, TradeParameters};
use trade_client::{Multiplexer, VenueClient, VenueConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install default TLS provider")?;

    // Logging configuration
    tracing_subscriber::fmt::init();

    let config = VenueConfig::from_env()?;
    info!("Venue endpoint: {}", config.endpoint()?);

    let client = VenueClient::new(Multiplexer::new(&config)?);

    let (symbols, company) = match tokio::try_join!(
        client.get_active_symbols(),
        client.get_contracts_for_company()
    ) {
        Ok(fetched) => fetched,
        Err(e) if e.is_transport() => {
            error!("❌ Venue unreachable at {}: {e}", config.endpoint()?);
            return Err(e.into());
        }
        Err(e) => {
            error!("❌ Market list request failed: {e}");
            return Err(e.into());
        }
    };

    let open_symbols: Vec<_> = symbols
        .iter()
        .filter(|s| s.exchange_is_open && !s.is_trading_suspended)
        .collect();
    for symbol in open_symbols.iter().take(10) {
        info!(
            "{:<12} {:<30} {}",
            symbol.symbol, symbol.display_name, symbol.market_display_name
        );
    }

    let categories = normalize_contracts(&company.available);
    for category in &categories {
        info!(
            "📋 {} ({} variants)",
            category.contract_category_display,
            category.sentiments.len()
        );
    }

    let Some(symbol) = open_symbols.first().map(|s| s.symbol.clone()) else {
        warn!("No open markets right now");
        client.close().await;
        return Ok(());
    };

    match client.selected_contract(&symbol, display_name(RISE_FALL)).await? {
        Some(contract) => {
            let mut params = TradeParameters::for_contract(&contract);
            params.time_unit = TimeUnit::Ticks;
            params.duration = Some(5);
            match params.validate() {
                Ok(()) => info!("🧾 Trade form for {symbol}: {params:?}"),
                Err(e) => warn!("Trade form for {symbol} is invalid: {e}"),
            }
        }
        None => warn!("{symbol} offers no {} contracts", display_name(RISE_FALL)),
    }

    let mut feed = client.tick_feed(&symbol).await?;
    let deadline = Instant::now() + Duration::from_secs(config.tick_seconds);
    while let Ok(Some(tick)) = time::timeout_at(deadline, feed.next()).await {
        info!("📈 {} ask={} bid={}", tick.symbol, tick.ask, tick.bid);
    }
    if let Some(point) = feed.window().latest() {
        info!(
            "Chart holds {} points, last at {}",
            feed.window().len(),
            point.label()
        );
    }

    if let Err(e) = feed.close().await {
        warn!("Failed to forget tick subscription: {e}");
    }
    client.close().await;

    info!("Main function is exiting.");
    Ok(())
}
