// src/devtools/mod.rs

pub mod fixtures;
pub mod mock_transport;

pub use mock_transport::{MockTransport, MockVenue};
