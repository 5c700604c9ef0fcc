//! Error types for market data retrieval

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Broker API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Malformed market data: {0}")]
    Malformed(String),

    #[error("No market data returned for {0}")]
    Empty(String),

    #[error("Broker credentials not configured")]
    NotConfigured,
}

pub type DataResult<T> = Result<T, DataError>;
