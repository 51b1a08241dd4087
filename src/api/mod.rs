pub mod binance;
pub mod coincap;
pub mod cryptocompare;
pub mod fallback;
pub mod http;

pub use binance::BinanceClient;
pub use coincap::CoinCapClient;
pub use cryptocompare::CryptoCompareClient;
pub use fallback::FallbackMarketData;

use crate::error::ForecastError;
use crate::models::{Candle, PricePoint};
use crate::Result;
use async_trait::async_trait;

/// A source of minute-resolution price history for a trading pair
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// Up to `limit` most recent 1m closes, oldest first
    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>>;

    /// 1m OHLC candles with `start_ms <= t <= end_ms`, oldest first
    async fn candles(&self, symbol: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Candle>>;

    /// Latest 1m close
    async fn last_close(&self, symbol: &str) -> Result<f64> {
        let points = self.recent_closes(symbol, 2).await?;
        points
            .last()
            .map(|p| p.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .ok_or_else(|| {
                ForecastError::NoData {
                    source_name: self.name(),
                    symbol: symbol.to_string(),
                }
                .into()
            })
    }
}

/// `BTCUSDT` -> `BTC`
pub fn base_asset(symbol: &str) -> &str {
    symbol
        .strip_suffix("USDT")
        .filter(|base| !base.is_empty())
        .unwrap_or(symbol)
}
