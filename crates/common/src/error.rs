//! Shared error type for the HFT core.
//!
//! Steady-state pipeline operation never raises (see the error handling
//! design): rejections, drops, and circuit breaks are all represented as
//! data, not exceptions. `Error` exists for fallible *setup* — bad config,
//! an unknown venue, a malformed order request at the API boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown venue: {0}")]
    UnknownVenue(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load config file {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
