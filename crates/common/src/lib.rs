//! Shared types, configuration, error handling, and clock for the HFT core.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, Timestamp};
pub use config::HftConfig;
pub use error::{Error, Result};
pub use types::{Liquidity, OrderType, Px, Qty, Side, Symbol, Ts, Venue};
