//! Error taxonomy for the forecasting pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    /// Transport-level failure talking to a market data source
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Upstream answered, but not with something usable
    #[error("{source_name} API error ({status}): {message}")]
    Api {
        source_name: &'static str,
        status: u16,
        message: String,
    },

    #[error("no data from {source_name} for {symbol}")]
    NoData {
        source_name: &'static str,
        symbol: String,
    },

    #[error("insufficient data: got {got} points, need at least {needed}")]
    InsufficientData { got: usize, needed: usize },

    #[error("all market data sources failed for {symbol}")]
    AllSourcesFailed { symbol: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
}
