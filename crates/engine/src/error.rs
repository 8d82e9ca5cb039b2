//! Construction-time errors for the engine crate. Steady-state pipeline
//! operation never raises — see the orchestrator's error handling design.

use hft_common::Symbol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown venue: {0}")]
    UnknownVenue(String),

    #[error("no venue available to route signal for {0}")]
    NoVenueAvailable(Symbol),
}

pub type Result<T> = std::result::Result<T, EngineError>;
