//! Runtime configuration
//!
//! Layered in order: built-in defaults, an optional `forecast.toml` in the
//! working directory, then `FORECAST_*` environment variables. List values
//! in the environment are comma separated (`FORECAST_SYMBOLS=BTCUSDT,ETHUSDT`).

use crate::api::binance::BINANCE_API_BASE;
use crate::api::coincap::COINCAP_API_BASE;
use crate::api::cryptocompare::CRYPTOCOMPARE_API_BASE;
use crate::error::ForecastError;
use crate::evaluation::EvaluatorSettings;
use crate::forecast::EmitterSettings;
use crate::training::{FitSettings, TrainerSettings};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_SYMBOLS: &[&str] = &[
    "BTCUSDT", "ETHUSDT", "XRPUSDT", "BNBUSDT", "SOLUSDT", "DOGEUSDT", "ADAUSDT", "LTCUSDT",
    "SHIBUSDT", "PUMPUSDT",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub symbols: Vec<String>,
    /// Forecast horizons in minutes
    pub horizons: Vec<u32>,
    /// Records under `{data_dir}/{SYMBOL}/{H}m.jsonl`, models under
    /// `{data_dir}/models`
    pub data_dir: String,

    pub no_trade_min_conf: f64,
    pub no_trade_min_range_pct: f64,
    pub eval_margin_minutes: u32,
    pub max_records_per_file: usize,
    pub seed: Option<u64>,

    pub rest_interval_ms: u64,
    pub http_timeout_secs: u64,
    pub max_retries: u32,
    pub binance_base_url: String,
    pub cryptocompare_base_url: String,
    pub coincap_base_url: String,

    pub train_days: u32,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub dead_zone: f64,
    pub min_train_samples: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            horizons: vec![15, 60],
            data_dir: "data".to_string(),
            no_trade_min_conf: 0.62,
            no_trade_min_range_pct: 0.30,
            eval_margin_minutes: 2,
            max_records_per_file: 20_000,
            seed: None,
            rest_interval_ms: 150,
            http_timeout_secs: 10,
            max_retries: 3,
            binance_base_url: BINANCE_API_BASE.to_string(),
            cryptocompare_base_url: CRYPTOCOMPARE_API_BASE.to_string(),
            coincap_base_url: COINCAP_API_BASE.to_string(),
            train_days: 30,
            learning_rate: 0.05,
            epochs: 60,
            l2: 0.001,
            dead_zone: 0.001,
            min_train_samples: 200,
        }
    }
}

impl AppConfig {
    /// Load from `forecast.toml` (optional) and the environment
    pub fn load() -> crate::Result<Self> {
        Self::load_from("forecast")
    }

    /// Load with an explicit config file stem; a missing file is fine
    pub fn load_from(file_stem: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("FORECAST")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .with_list_parse_key("horizons"),
            )
            .build()
            .map_err(|e| ForecastError::Config(e.to_string()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| ForecastError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.symbols.is_empty() {
            return Err(ForecastError::Config("no symbols configured".into()).into());
        }
        if self.horizons.is_empty() || self.horizons.contains(&0) {
            return Err(ForecastError::Config(format!(
                "horizons must be positive minutes, got {:?}",
                self.horizons
            ))
            .into());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            ))
            .into());
        }
        if self.dead_zone < 0.0 || self.l2 < 0.0 {
            return Err(
                ForecastError::Config("dead_zone and l2 must not be negative".into()).into(),
            );
        }
        Ok(())
    }

    pub fn rest_interval(&self) -> Duration {
        Duration::from_millis(self.rest_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn emitter_settings(&self) -> EmitterSettings {
        EmitterSettings {
            no_trade_min_conf: self.no_trade_min_conf,
            no_trade_min_range_pct: self.no_trade_min_range_pct,
            max_records_per_stream: (self.max_records_per_file > 0)
                .then_some(self.max_records_per_file),
            rest_interval: self.rest_interval(),
            ..EmitterSettings::default()
        }
    }

    pub fn evaluator_settings(&self) -> EvaluatorSettings {
        EvaluatorSettings {
            safety_margin_ms: i64::from(self.eval_margin_minutes) * 60_000,
            rest_interval: self.rest_interval(),
        }
    }

    pub fn trainer_settings(&self) -> TrainerSettings {
        TrainerSettings {
            days: self.train_days,
            dead_zone: self.dead_zone,
            min_samples: self.min_train_samples,
            fit: FitSettings {
                learning_rate: self.learning_rate,
                epochs: self.epochs,
                l2: self.l2,
            },
            rest_interval: self.rest_interval(),
        }
    }
}

/// Parse a `A,B,C` symbol list, upper-casing and dropping blanks
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
