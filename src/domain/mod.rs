// src/domain/mod.rs

pub mod contracts;
pub mod ticks;
pub mod trade_params;
pub use contracts::{find_matching_contract, normalize_contracts};
pub use ticks::{ChartPoint, TickWindow};
pub use trade_params::{TradeParameters, TradeParamsError};
