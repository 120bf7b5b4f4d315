// src/lib.rs

pub mod async_actors;
pub mod client;
pub mod config;
pub mod domain;
pub mod model;

#[cfg(any(test, feature = "dev-fixtures"))]
pub mod devtools;

pub use async_actors::{ConnectionError, Multiplexer};
pub use client::{TickFeed, VenueClient};
pub use config::VenueConfig;
