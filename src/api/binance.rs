use super::http::RetryingHttp;
use super::MarketData;
use crate::error::ForecastError;
use crate::models::{Candle, PricePoint};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub const BINANCE_API_BASE: &str = "https://api.binance.com";
const SOURCE: &str = "Binance";
const KLINES_PAGE_LIMIT: usize = 1000;
// klines cost 2 weight of a 1200/min budget
const RATE_LIMIT_RPM: u32 = 600;
const PAGE_REST_MS: u64 = 100;

/// Binance spot klines client
#[derive(Clone)]
pub struct BinanceClient {
    http: RetryingHttp,
    base_url: String,
    page_rest: Duration,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self> {
        Ok(Self {
            http: RetryingHttp::new(SOURCE, timeout, RATE_LIMIT_RPM, max_retries)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_rest: Duration::from_millis(PAGE_REST_MS),
        })
    }

    /// Shorten backoff and page rests (tests)
    pub fn with_fast_retries(mut self) -> Self {
        self.http = self.http.with_initial_backoff(Duration::from_millis(1));
        self.page_rest = Duration::ZERO;
        self
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        limit: usize,
        end_ms: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let mut query = vec![
            ("symbol", symbol.to_string()),
            ("interval", "1m".to_string()),
            ("limit", limit.clamp(1, KLINES_PAGE_LIMIT).to_string()),
        ];
        if let Some(end) = end_ms {
            query.push(("endTime", end.to_string()));
        }

        let rows: Vec<Vec<Value>> = self.http.get_json(&url, &query).await?;
        let total = rows.len();
        let candles: Vec<Candle> = rows.iter().filter_map(|row| parse_kline(row)).collect();

        if candles.len() < total {
            tracing::warn!(
                "Dropped {} unparseable klines for {}",
                total - candles.len(),
                symbol
            );
        }

        Ok(candles)
    }
}

/// `[openTime, open, high, low, close, ...]` with prices as strings
fn parse_kline(row: &[Value]) -> Option<Candle> {
    let number = |v: &Value| -> Option<f64> {
        match v {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    };

    Some(Candle {
        timestamp_ms: row.first()?.as_i64()?,
        high: number(row.get(2)?)?,
        low: number(row.get(3)?)?,
        close: number(row.get(4)?)?,
    })
}

#[async_trait]
impl MarketData for BinanceClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        let candles = self.fetch_klines(symbol, limit, None).await?;
        if candles.len() < 2 {
            return Err(ForecastError::NoData {
                source_name: SOURCE,
                symbol: symbol.to_string(),
            }
            .into());
        }

        tracing::debug!("Fetched {} closes for {} from Binance", candles.len(), symbol);

        Ok(candles.into_iter().map(PricePoint::from).collect())
    }

    /// Walks `endTime` backwards one page at a time until `start_ms` is covered
    async fn candles(&self, symbol: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Candle>> {
        let mut pages: Vec<Vec<Candle>> = Vec::new();
        let mut cursor = end_ms;

        loop {
            let page = self
                .fetch_klines(symbol, KLINES_PAGE_LIMIT, Some(cursor))
                .await?;
            let Some(oldest) = page.first().map(|c| c.timestamp_ms) else {
                break;
            };
            let full_page = page.len() >= KLINES_PAGE_LIMIT;
            pages.push(page);

            if oldest <= start_ms || !full_page {
                break;
            }
            cursor = oldest - 1;
            tokio::time::sleep(self.page_rest).await;
        }

        let candles: Vec<Candle> = pages
            .into_iter()
            .rev()
            .flatten()
            .filter(|c| c.timestamp_ms >= start_ms && c.timestamp_ms <= end_ms)
            .collect();

        tracing::info!("Fetched {} 1m candles for {} from Binance", candles.len(), symbol);

        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn kline_json(t: i64, close: f64) -> String {
        format!(
            r#"[{t},"{o}","{h}","{l}","{c}","1.0",{ct},"0",1,"0","0","0"]"#,
            t = t,
            o = close,
            h = close + 1.0,
            l = close - 1.0,
            c = close,
            ct = t + 59_999
        )
    }

    fn klines_body(start_t: i64, count: usize) -> String {
        let rows: Vec<String> = (0..count)
            .map(|i| kline_json(start_t + i as i64 * 60_000, 100.0 + i as f64))
            .collect();
        format!("[{}]", rows.join(","))
    }

    fn test_client(url: &str) -> BinanceClient {
        BinanceClient::new(url, Duration::from_secs(5), 2)
            .unwrap()
            .with_fast_retries()
    }

    #[test]
    fn test_parse_kline() {
        let row: Vec<Value> = serde_json::from_str(&kline_json(60_000, 42.5)).unwrap();
        let candle = parse_kline(&row).unwrap();

        assert_eq!(candle.timestamp_ms, 60_000);
        assert_eq!(candle.close, 42.5);
        assert_eq!(candle.high, 43.5);
        assert_eq!(candle.low, 41.5);
    }

    #[test]
    fn test_parse_kline_rejects_short_row() {
        let row: Vec<Value> = serde_json::from_str(r#"[1, "2"]"#).unwrap();
        assert!(parse_kline(&row).is_none());
    }

    #[tokio::test]
    async fn test_recent_closes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "1m".into()),
                Matcher::UrlEncoded("limit".into(), "60".into()),
            ]))
            .with_status(200)
            .with_body(klines_body(0, 60))
            .create_async()
            .await;

        let client = test_client(&server.url());
        let closes = client.recent_closes("BTCUSDT", 60).await.unwrap();

        assert_eq!(closes.len(), 60);
        assert_eq!(closes[0].close, 100.0);
        assert_eq!(closes[59].timestamp_ms, 59 * 60_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_recent_closes_too_few() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(klines_body(0, 1))
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client.recent_closes("BTCUSDT", 60).await;
        assert!(result.unwrap_err().to_string().contains("no data"));
    }

    #[tokio::test]
    async fn test_last_close() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::UrlEncoded("limit".into(), "2".into()))
            .with_status(200)
            .with_body(klines_body(0, 2))
            .create_async()
            .await;

        let client = test_client(&server.url());
        assert_eq!(client.last_close("ETHUSDT").await.unwrap(), 101.0);
    }

    #[tokio::test]
    async fn test_candles_paginates_backwards() {
        let mut server = mockito::Server::new_async().await;
        let page_start = 10_000 * 60_000;

        // Newest page: full 1000 bars
        let newest = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::UrlEncoded(
                "endTime".into(),
                (page_start + 2_000 * 60_000).to_string(),
            ))
            .with_status(200)
            .with_body(klines_body(page_start + 1_000 * 60_000, 1000))
            .create_async()
            .await;

        // Older page: partial, ends pagination
        let older = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::UrlEncoded(
                "endTime".into(),
                (page_start + 1_000 * 60_000 - 1).to_string(),
            ))
            .with_status(200)
            .with_body(klines_body(page_start + 500 * 60_000, 500))
            .create_async()
            .await;

        let client = test_client(&server.url());
        let start = page_start;
        let end = page_start + 2_000 * 60_000;
        let candles = client.candles("BTCUSDT", start, end).await.unwrap();

        assert_eq!(candles.len(), 1500);
        assert!(candles
            .windows(2)
            .all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
        newest.assert_async().await;
        older.assert_async().await;
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_recent_closes_live() {
        let client = BinanceClient::new(BINANCE_API_BASE, Duration::from_secs(10), 3).unwrap();
        let closes = client.recent_closes("BTCUSDT", 60).await.unwrap();
        assert!(closes.len() >= 20);
        assert!(closes.iter().all(|p| p.close > 0.0));
    }
}
