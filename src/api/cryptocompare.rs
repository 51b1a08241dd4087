use super::http::RetryingHttp;
use super::{base_asset, MarketData};
use crate::error::ForecastError;
use crate::models::{Candle, PricePoint};
use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub const CRYPTOCOMPARE_API_BASE: &str = "https://min-api.cryptocompare.com";
const SOURCE: &str = "CryptoCompare";
const HISTO_PAGE_LIMIT: usize = 2000;
const RATE_LIMIT_RPM: u32 = 300;
const PAGE_REST_MS: u64 = 250;

/// CryptoCompare `histominute` client, quoting against USD
#[derive(Clone)]
pub struct CryptoCompareClient {
    http: RetryingHttp,
    base_url: String,
    page_rest: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: HistoData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HistoData {
    #[serde(default)]
    data: Vec<HistoRow>,
}

#[derive(Debug, Deserialize)]
struct HistoRow {
    time: i64,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
}

impl HistoRow {
    fn to_candle(&self) -> Option<Candle> {
        let close = self.close.filter(|c| *c > 0.0)?;
        Some(Candle {
            timestamp_ms: self.time * 1000,
            high: self.high.unwrap_or(close),
            low: self.low.unwrap_or(close),
            close,
        })
    }
}

impl CryptoCompareClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self> {
        Ok(Self {
            http: RetryingHttp::new(SOURCE, timeout, RATE_LIMIT_RPM, max_retries)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_rest: Duration::from_millis(PAGE_REST_MS),
        })
    }

    pub fn with_fast_retries(mut self) -> Self {
        self.http = self.http.with_initial_backoff(Duration::from_millis(1));
        self.page_rest = Duration::ZERO;
        self
    }

    async fn fetch_histominute(
        &self,
        symbol: &str,
        limit: usize,
        to_ts_secs: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/data/v2/histominute", self.base_url);
        let mut query = vec![
            ("fsym", base_asset(symbol).to_string()),
            ("tsym", "USD".to_string()),
            ("limit", limit.clamp(1, HISTO_PAGE_LIMIT).to_string()),
            ("aggregate", "1".to_string()),
        ];
        if let Some(to_ts) = to_ts_secs {
            query.push(("toTs", to_ts.to_string()));
        }

        let response: HistoResponse = self.http.get_json(&url, &query).await?;
        if response.response == "Error" {
            return Err(ForecastError::Api {
                source_name: SOURCE,
                status: 200,
                message: response.message,
            }
            .into());
        }

        Ok(response
            .data
            .data
            .iter()
            .filter_map(HistoRow::to_candle)
            .collect())
    }
}

#[async_trait]
impl MarketData for CryptoCompareClient {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        let candles = self.fetch_histominute(symbol, limit, None).await?;
        if candles.is_empty() {
            return Err(ForecastError::NoData {
                source_name: SOURCE,
                symbol: symbol.to_string(),
            }
            .into());
        }

        tracing::debug!(
            "Fetched {} closes for {} from CryptoCompare",
            candles.len(),
            symbol
        );

        Ok(candles.into_iter().map(PricePoint::from).collect())
    }

    async fn candles(&self, symbol: &str, start_ms: i64, end_ms: i64) -> Result<Vec<Candle>> {
        let mut pages: Vec<Vec<Candle>> = Vec::new();
        let mut cursor_secs = end_ms.div_euclid(1000);

        loop {
            let page = self
                .fetch_histominute(symbol, HISTO_PAGE_LIMIT, Some(cursor_secs))
                .await?;
            let Some(oldest) = page.first().map(|c| c.timestamp_ms) else {
                break;
            };
            pages.push(page);

            if oldest <= start_ms {
                break;
            }
            let next = oldest.div_euclid(1000) - 60;
            if next >= cursor_secs {
                break;
            }
            cursor_secs = next;
            tokio::time::sleep(self.page_rest).await;
        }

        Ok(pages
            .into_iter()
            .rev()
            .flatten()
            .filter(|c| c.timestamp_ms >= start_ms && c.timestamp_ms <= end_ms)
            .collect())
    }
}
