// Offline fitting of scorer parameters from historical candles
pub mod artifact;
pub mod dataset;
pub mod logreg;

pub use artifact::{ArtifactStore, ModelArtifact};
pub use dataset::{build_dataset, Dataset};
pub use logreg::{fit, FitSettings, LogisticModel, Scaler};

use crate::api::MarketData;
use crate::error::ForecastError;
use crate::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Below this many history rows the fit is still run, with a warning
const THIN_HISTORY_ROWS: usize = 2000;

#[derive(Debug, Clone)]
pub struct TrainerSettings {
    pub days: u32,
    pub dead_zone: f64,
    pub min_samples: usize,
    pub fit: FitSettings,
    pub rest_interval: Duration,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            days: 30,
            dead_zone: 0.001,
            min_samples: 200,
            fit: FitSettings::default(),
            rest_interval: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone)]
pub enum HorizonResult {
    Saved {
        horizon: u32,
        n_samples: usize,
        accuracy: f64,
        path: PathBuf,
    },
    /// Too few labelled samples to fit
    Skipped { horizon: u32, n_samples: usize },
}

#[derive(Debug, Clone)]
pub struct TrainFailure {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct TrainReport {
    pub results: Vec<(String, HorizonResult)>,
    pub failures: Vec<TrainFailure>,
}

impl TrainReport {
    pub fn saved(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, r)| matches!(r, HorizonResult::Saved { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results.len() - self.saved()
    }
}

/// Fetches a long candle window per symbol and fits one model per horizon
pub struct Trainer<M> {
    market: M,
    artifacts: ArtifactStore,
    settings: TrainerSettings,
}

impl<M: MarketData> Trainer<M> {
    pub fn new(market: M, artifacts: ArtifactStore, settings: TrainerSettings) -> Self {
        Self {
            market,
            artifacts,
            settings,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Train every horizon for one symbol on candles ending at `now`
    pub async fn train_symbol(
        &self,
        symbol: &str,
        horizons: &[u32],
        now: DateTime<Utc>,
    ) -> Result<Vec<HorizonResult>> {
        let end_ms = now.timestamp_millis();
        let start = now - ChronoDuration::days(i64::from(self.settings.days));
        let start_ms = start.timestamp_millis();

        let candles = self.market.candles(symbol, start_ms, end_ms).await?;
        if candles.is_empty() {
            return Err(ForecastError::NoData {
                source_name: self.market.name(),
                symbol: symbol.to_string(),
            }
            .into());
        }
        if candles.len() < THIN_HISTORY_ROWS {
            tracing::warn!(
                "⚠️  Only {} history rows for {} (wanted {}+)",
                candles.len(),
                symbol,
                THIN_HISTORY_ROWS
            );
        }

        let mut results = Vec::with_capacity(horizons.len());
        for &horizon in horizons {
            let dataset = build_dataset(&candles, horizon, self.settings.dead_zone);
            let n_samples = dataset.len();

            if n_samples < self.settings.min_samples {
                tracing::warn!(
                    "Skipping {} {}m: {} samples (need {})",
                    symbol,
                    horizon,
                    n_samples,
                    self.settings.min_samples
                );
                results.push(HorizonResult::Skipped { horizon, n_samples });
                continue;
            }

            let model = fit(&dataset, &self.settings.fit);
            let accuracy = model.accuracy(&dataset);
            let artifact = ModelArtifact::from_model(&model, symbol, horizon, n_samples, now);
            let path = self.artifacts.save(&artifact)?;

            tracing::info!(
                symbol = %symbol,
                horizon,
                n_samples,
                dropped = dataset.dropped,
                up_rate = %format!("{:.3}", dataset.positive_rate()),
                accuracy = %format!("{:.3}", accuracy),
                "💾 Saved model to {}",
                path.display()
            );

            results.push(HorizonResult::Saved {
                horizon,
                n_samples,
                accuracy,
                path,
            });
        }

        Ok(results)
    }

    pub async fn run(&self, symbols: &[String], horizons: &[u32]) -> TrainReport {
        self.run_at(symbols, horizons, Utc::now()).await
    }

    /// Train all symbols; a failing symbol is recorded and skipped
    pub async fn run_at(
        &self,
        symbols: &[String],
        horizons: &[u32],
        now: DateTime<Utc>,
    ) -> TrainReport {
        let mut report = TrainReport::default();

        for (i, symbol) in symbols.iter().enumerate() {
            tracing::info!("📚 Training {} over {} days", symbol, self.settings.days);

            match self.train_symbol(symbol, horizons, now).await {
                Ok(results) => report
                    .results
                    .extend(results.into_iter().map(|r| (symbol.clone(), r))),
                Err(e) => {
                    tracing::error!("Training {} failed: {}", symbol, e);
                    report.failures.push(TrainFailure {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }

            if i + 1 < symbols.len() && !self.settings.rest_interval.is_zero() {
                tokio::time::sleep(self.settings.rest_interval).await;
            }
        }

        report
    }
}
