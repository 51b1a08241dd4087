use crate::error::ForecastError;
use crate::Result;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;
const USER_AGENT: &str = concat!("forecastbot/", env!("CARGO_PKG_VERSION"));

/// Rate-limited JSON GET with bounded retries
///
/// Server errors, 429s and transport errors are retried with exponential
/// backoff (429 waits twice as long); other 4xx fail immediately.
/// Cloning shares the rate limiter.
#[derive(Clone)]
pub struct RetryingHttp {
    client: Client,
    source_name: &'static str,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl RetryingHttp {
    pub fn new(
        source_name: &'static str,
        timeout: Duration,
        requests_per_minute: u32,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(ForecastError::from)?;

        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            source_name,
            rate_limiter,
            max_retries: max_retries.max(1),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first backoff step (later steps double it)
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn source_name(&self) -> &'static str {
        self.source_name
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.pow(attempt.saturating_sub(1))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut last_error: Option<ForecastError> = None;

        for attempt in 1..=self.max_retries {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body = response.text().await.map_err(ForecastError::from)?;
                        return serde_json::from_str(&body)
                            .map_err(|e| ForecastError::from(e).into());
                    }

                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    let error = ForecastError::Api {
                        source_name: self.source_name,
                        status: status.as_u16(),
                        message,
                    };

                    if !retryable {
                        return Err(error.into());
                    }

                    if attempt < self.max_retries {
                        let mut wait = self.backoff(attempt);
                        if status.as_u16() == 429 {
                            wait *= 2;
                        }
                        tracing::warn!(
                            "{} returned {}, retrying in {}ms (attempt {}/{})",
                            self.source_name,
                            status,
                            wait.as_millis(),
                            attempt,
                            self.max_retries
                        );
                        tokio::time::sleep(wait).await;
                    }
                    last_error = Some(error);
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        let wait = self.backoff(attempt);
                        tracing::warn!(
                            "Network error from {}: {}, retrying in {}ms (attempt {}/{})",
                            self.source_name,
                            e,
                            wait.as_millis(),
                            attempt,
                            self.max_retries
                        );
                        tokio::time::sleep(wait).await;
                    }
                    last_error = Some(ForecastError::from(e));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ForecastError::Api {
                source_name: self.source_name,
                status: 0,
                message: format!("failed after {} attempts", self.max_retries),
            })
            .into())
    }
}
