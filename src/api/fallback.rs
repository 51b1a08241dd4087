use super::MarketData;
use crate::error::ForecastError;
use crate::models::{Candle, PricePoint};
use crate::Result;
use async_trait::async_trait;

/// Tries each source in order and returns the first success
pub struct FallbackMarketData {
    sources: Vec<Box<dyn MarketData>>,
}

impl FallbackMarketData {
    pub fn new(sources: Vec<Box<dyn MarketData>>) -> Self {
        Self { sources }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    fn all_failed(symbol: &str) -> crate::error::ForecastError {
        ForecastError::AllSourcesFailed {
            symbol: symbol.to_string(),
        }
    }
}

#[async_trait]
impl MarketData for FallbackMarketData {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        for source in &self.sources {
            match source.recent_closes(symbol, limit).await {
                Ok(points) => return Ok(points),
                Err(e) => {
                    tracing::info!("{} closes failed for {}: {}", source.name(), symbol, e);
                }
            }
        }
        Err(Self::all_failed(symbol).into())
    }

    async fn candles(&self, symbol: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Candle>> {
        for source in &self.sources {
            match source.candles(symbol, start_ms, end_ms).await {
                Ok(candles) if !candles.is_empty() => return Ok(candles),
                Ok(_) => {
                    tracing::info!("{} returned no candles for {}", source.name(), symbol);
                }
                Err(e) => {
                    tracing::info!("{} candles failed for {}: {}", source.name(), symbol, e);
                }
            }
        }
        Err(Self::all_failed(symbol).into())
    }

    async fn last_close(&self, symbol: &str) -> Result<f64> {
        for source in &self.sources {
            match source.last_close(symbol).await {
                Ok(price) => return Ok(price),
                Err(e) => {
                    tracing::info!("{} last close failed for {}: {}", source.name(), symbol, e);
                }
            }
        }
        Err(Self::all_failed(symbol).into())
    }
}
