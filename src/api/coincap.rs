use super::http::RetryingHttp;
use super::{base_asset, MarketData};
use crate::error::ForecastError;
use crate::models::{Candle, PricePoint};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const COINCAP_API_BASE: &str = "https://api.coincap.io";
const SOURCE: &str = "CoinCap";
const RATE_LIMIT_RPM: u32 = 200;

/// CoinCap asset ids for the tracked base assets
fn asset_id(base: &str) -> Option<&'static str> {
    let id = match base {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "XRP" => "xrp",
        "BNB" => "binance-coin",
        "SOL" => "solana",
        "DOGE" => "dogecoin",
        "ADA" => "cardano",
        "LTC" => "litecoin",
        "SHIB" => "shiba-inu",
        "PUMP" => "pump",
        _ => return None,
    };
    Some(id)
}

/// CoinCap `/v2/candles` client (Binance m1 candles quoted in USD)
#[derive(Clone)]
pub struct CoinCapClient {
    http: RetryingHttp,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Numbers arrive as strings or as JSON numbers
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn parse_candle(row: &Value) -> Option<Candle> {
    let t = ["period", "time", "timestamp"]
        .iter()
        .find_map(|key| row.get(*key).and_then(number))?;
    let close = ["close", "priceClose"]
        .iter()
        .find_map(|key| row.get(*key).and_then(number))
        .filter(|c| c.is_finite() && *c > 0.0)?;

    Some(Candle {
        timestamp_ms: t as i64,
        high: row.get("high").and_then(number).unwrap_or(close),
        low: row.get("low").and_then(number).unwrap_or(close),
        close,
    })
}

impl CoinCapClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self> {
        Ok(Self {
            http: RetryingHttp::new(SOURCE, timeout, RATE_LIMIT_RPM, max_retries)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn with_fast_retries(mut self) -> Self {
        self.http = self.http.with_initial_backoff(Duration::from_millis(1));
        self
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>> {
        let Some(id) = asset_id(base_asset(symbol)) else {
            return Err(ForecastError::NoData {
                source_name: SOURCE,
                symbol: symbol.to_string(),
            }
            .into());
        };

        let url = format!("{}/v2/candles", self.base_url);
        let query = [
            ("exchange", "binance".to_string()),
            ("interval", "m1".to_string()),
            ("base", id.to_string()),
            ("quote", "usd".to_string()),
            ("start", start_ms.to_string()),
            ("end", end_ms.to_string()),
        ];

        let response: CandlesResponse = self.http.get_json(&url, &query).await?;
        let mut candles: Vec<Candle> = response.data.iter().filter_map(parse_candle).collect();
        candles.sort_by_key(|c| c.timestamp_ms);

        Ok(candles)
    }
}

#[async_trait]
impl MarketData for CoinCapClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        let end_ms = Utc::now().timestamp_millis();
        let start_ms = end_ms - limit as i64 * 60_000;

        let candles = self.fetch_candles(symbol, start_ms, end_ms).await?;
        if candles.is_empty() {
            return Err(ForecastError::NoData {
                source_name: SOURCE,
                symbol: symbol.to_string(),
            }
            .into());
        }

        tracing::debug!("Fetched {} closes for {} from CoinCap", candles.len(), symbol);

        let skip = candles.len().saturating_sub(limit);
        Ok(candles.into_iter().skip(skip).map(PricePoint::from).collect())
    }

    async fn candles(&self, symbol: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Candle>> {
        Ok(self
            .fetch_candles(symbol, start_ms, end_ms)
            .await?
            .into_iter()
            .filter(|c| c.timestamp_ms >= start_ms && c.timestamp_ms <= end_ms)
            .collect())
    }
}
