// src/async_actors/mod.rs

pub mod connection;
pub mod messages;

pub use connection::{ConnectionError, ConnectionStatus, ListenerHandle, Multiplexer};
pub use messages::VenueRequest;
