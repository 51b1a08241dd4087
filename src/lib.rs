// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod forecast;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod scoring;
pub mod training;

// Re-export commonly used types
pub use api::MarketData;
pub use error::ForecastError;
pub use models::*;
pub use persistence::RecordStore;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
