use super::slot_guard::{self, SlotDecision};
use crate::api::MarketData;
use crate::error::ForecastError;
use crate::indicators::{build_features, FEATURE_WINDOW};
use crate::models::{ForecastRecord, Outcome, AUTO_SOURCE};
use crate::persistence::RecordStore;
use crate::scoring::{price_bounds, Score, Scorer};
use crate::Result;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// Emission thresholds and pacing
#[derive(Debug, Clone)]
pub struct EmitterSettings {
    /// Fewer closes than this aborts the symbol/horizon
    pub min_points: usize,
    /// Below this confidence the record is written as No-Trade
    pub no_trade_min_conf: f64,
    /// Below this upper range bound (percent) the record is No-Trade
    pub no_trade_min_range_pct: f64,
    /// Rotate a stream once it grows past this many entries
    pub max_records_per_stream: Option<usize>,
    /// Pause between symbols to respect upstream rate limits
    pub rest_interval: Duration,
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            min_points: 20,
            no_trade_min_conf: 0.62,
            no_trade_min_range_pct: 0.30,
            max_records_per_stream: Some(20_000),
            rest_interval: Duration::from_millis(150),
        }
    }
}

impl EmitterSettings {
    /// Initial state for a fresh forecast: too weak a signal is No-Trade
    pub fn classify(&self, score: &Score) -> Outcome {
        if score.confidence < self.no_trade_min_conf
            || score.range_pct[1] < self.no_trade_min_range_pct
        {
            Outcome::NoTrade
        } else {
            Outcome::Pending
        }
    }
}

/// Result of one emission attempt
#[derive(Debug, Clone, PartialEq)]
pub enum EmitOutcome {
    Written(ForecastRecord),
    /// Slot already has a forecast
    SameSlot { slot: i64 },
    /// Store already held this exact record
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct EmitFailure {
    pub symbol: String,
    pub horizon: u32,
    pub error: String,
}

/// What a run did, per symbol/horizon pair
#[derive(Debug, Clone, Default)]
pub struct EmitReport {
    pub written: Vec<ForecastRecord>,
    pub suppressed: usize,
    pub failures: Vec<EmitFailure>,
}

impl EmitReport {
    pub fn no_trade_count(&self) -> usize {
        self.written
            .iter()
            .filter(|r| r.outcome == Outcome::NoTrade)
            .count()
    }
}

/// Fetch -> features -> score -> slot guard -> append, per symbol/horizon
pub struct ForecastEmitter<M, S> {
    market: M,
    store: S,
    scorer: Scorer,
    settings: EmitterSettings,
    rng: StdRng,
}

impl<M: MarketData, S: RecordStore> ForecastEmitter<M, S> {
    pub fn new(market: M, store: S, settings: EmitterSettings) -> Self {
        Self {
            market,
            store,
            scorer: Scorer::default(),
            settings,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_scorer(mut self, scorer: Scorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Fix the tie-break RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Closes requested for a horizon: `max(60, horizon + 20)`
    pub fn window_size(horizon: u32) -> usize {
        FEATURE_WINDOW.max(horizon as usize + 20)
    }

    /// Emit at most one forecast for `symbol`/`horizon` at `now_ms`
    pub async fn emit_one(
        &mut self,
        symbol: &str,
        horizon: u32,
        now_ms: i64,
    ) -> Result<EmitOutcome> {
        let points = self
            .market
            .recent_closes(symbol, Self::window_size(horizon))
            .await?;

        let closes: Vec<f64> = points
            .iter()
            .map(|p| p.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect();

        if closes.len() < self.settings.min_points {
            return Err(ForecastError::InsufficientData {
                got: closes.len(),
                needed: self.settings.min_points,
            }
            .into());
        }

        let base = closes[closes.len() - 1];
        let features = build_features(&closes);
        let score = self.scorer.score(&features, &mut self.rng);

        let last = self.store.last_record(symbol, horizon)?;
        if let SlotDecision::Suppress { slot } = slot_guard::check(last.as_ref(), now_ms, horizon)
        {
            tracing::info!(
                symbol = %symbol,
                horizon,
                slot,
                "Already have a forecast for this slot, skipping"
            );
            return Ok(EmitOutcome::SameSlot { slot });
        }

        let record = self.build_record(symbol, horizon, now_ms, base, &score);
        if !self.store.append(symbol, horizon, &record)? {
            return Ok(EmitOutcome::Duplicate);
        }

        tracing::info!(
            symbol = %symbol,
            horizon,
            dir = ?record.dir,
            conf = %format!("{:.2}", record.conf),
            range = %format!("{:.2}-{:.2}%", record.range[0], record.range[1]),
            outcome = ?record.outcome,
            "Wrote forecast"
        );

        if let Some(max) = self.settings.max_records_per_stream {
            // Rotation is best-effort; the record is already written
            if let Err(e) = self.store.rotate(symbol, horizon, max) {
                tracing::warn!("Rotation failed for {} {}m: {}", symbol, horizon, e);
            }
        }

        Ok(EmitOutcome::Written(record))
    }

    fn build_record(
        &self,
        symbol: &str,
        horizon: u32,
        now_ms: i64,
        base: f64,
        score: &Score,
    ) -> ForecastRecord {
        let (price_lo, price_hi) = price_bounds(base, score.direction, score.range_pct);

        ForecastRecord {
            id: ForecastRecord::make_id(symbol, now_ms, horizon),
            t: now_ms,
            src: AUTO_SOURCE.to_string(),
            dir: score.direction,
            conf: score.confidence,
            range: score.range_pct,
            price_lo,
            price_hi,
            base,
            horizon,
            outcome: self.settings.classify(score),
            extra: Default::default(),
        }
    }

    /// Run every symbol × horizon pair using the wall clock
    pub async fn run(&mut self, symbols: &[String], horizons: &[u32]) -> EmitReport {
        self.run_with_clock(symbols, horizons, || Utc::now().timestamp_millis())
            .await
    }

    /// Run every symbol × horizon pair; a failing pair never stops the others
    pub async fn run_with_clock<F: FnMut() -> i64>(
        &mut self,
        symbols: &[String],
        horizons: &[u32],
        mut clock: F,
    ) -> EmitReport {
        let mut report = EmitReport::default();

        for (i, symbol) in symbols.iter().enumerate() {
            for &horizon in horizons {
                let now_ms = clock();
                match self.emit_one(symbol, horizon, now_ms).await {
                    Ok(EmitOutcome::Written(record)) => report.written.push(record),
                    Ok(EmitOutcome::SameSlot { .. }) | Ok(EmitOutcome::Duplicate) => {
                        report.suppressed += 1
                    }
                    Err(e) => {
                        tracing::error!("Prediction failed for {} {}m: {}", symbol, horizon, e);
                        report.failures.push(EmitFailure {
                            symbol: symbol.clone(),
                            horizon,
                            error: e.to_string(),
                        });
                    }
                }
            }

            if i + 1 < symbols.len() && !self.settings.rest_interval.is_zero() {
                tokio::time::sleep(self.settings.rest_interval).await;
            }
        }

        report
    }
}
