use crate::api::MarketData;
use crate::forecast::horizon_ms;
use crate::models::{Direction, Outcome, StoredEntry};
use crate::persistence::RecordStore;
use crate::Result;
use chrono::Utc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    /// Extra wait past the horizon so the realised candle has closed
    pub safety_margin_ms: i64,
    /// Pause between symbols
    pub rest_interval: Duration,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            safety_margin_ms: 2 * 60_000,
            rest_interval: Duration::from_millis(150),
        }
    }
}

/// Per-stream summary of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEvaluation {
    pub symbol: String,
    pub horizon: u32,
    /// Pending records turned into Correct/Wrong
    pub resolved: usize,
    pub correct: usize,
    /// Pending records not yet old enough
    pub too_young: usize,
    /// Old enough, but no price was available this run
    pub deferred: usize,
    /// Pending records that could not be judged (bad base price)
    pub skipped: usize,
}

impl StreamEvaluation {
    pub fn changed(&self) -> bool {
        self.resolved > 0
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationFailure {
    pub symbol: String,
    pub horizon: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub streams: Vec<StreamEvaluation>,
    pub failures: Vec<EvaluationFailure>,
}

impl EvaluationReport {
    pub fn resolved(&self) -> usize {
        self.streams.iter().map(|s| s.resolved).sum()
    }

    pub fn any_changed(&self) -> bool {
        self.streams.iter().any(StreamEvaluation::changed)
    }
}

/// Direction-only judgement: a non-positive move counts as Down
pub fn resolve_outcome(direction: Direction, base: f64, current: f64) -> Outcome {
    let delta = current / base - 1.0;
    let up = delta > 0.0;

    match (up, direction) {
        (true, Direction::Up) | (false, Direction::Down) => Outcome::Correct,
        _ => Outcome::Wrong,
    }
}

/// Current price for one stream, fetched lazily and at most once
enum PriceCache {
    Unfetched,
    Fetched(f64),
    Failed,
}

/// Resolves Pending forecasts once their horizon (plus margin) has passed
pub struct OutcomeEvaluator<M, S> {
    market: M,
    store: S,
    settings: EvaluatorSettings,
}

impl<M: MarketData, S: RecordStore> OutcomeEvaluator<M, S> {
    pub fn new(market: M, store: S, settings: EvaluatorSettings) -> Self {
        Self {
            market,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Evaluate one (symbol, horizon) stream at `now_ms`
    ///
    /// The stream is rewritten only if something was resolved. Opaque and
    /// already-final entries pass through untouched, in order.
    pub async fn evaluate_stream(
        &self,
        symbol: &str,
        horizon: u32,
        now_ms: i64,
    ) -> Result<StreamEvaluation> {
        let mut entries = self.store.load(symbol, horizon)?;
        let mut summary = StreamEvaluation {
            symbol: symbol.to_string(),
            horizon,
            ..StreamEvaluation::default()
        };

        if entries.is_empty() {
            tracing::debug!("No records for {} {}m", symbol, horizon);
            return Ok(summary);
        }

        let due_after = horizon_ms(horizon) + self.settings.safety_margin_ms;
        let mut price = PriceCache::Unfetched;

        for entry in entries.iter_mut() {
            let StoredEntry::Forecast(record) = entry else {
                continue;
            };
            if record.outcome != Outcome::Pending {
                continue;
            }
            if !(record.base.is_finite() && record.base > 0.0) {
                tracing::warn!(
                    id = %record.id,
                    base = record.base,
                    "Unusable base price, leaving Pending"
                );
                summary.skipped += 1;
                continue;
            }
            if now_ms.saturating_sub(record.t) < due_after {
                summary.too_young += 1;
                continue;
            }

            if let PriceCache::Unfetched = price {
                price = match self.market.last_close(symbol).await {
                    Ok(p) if p.is_finite() && p > 0.0 => PriceCache::Fetched(p),
                    Ok(p) => {
                        tracing::warn!("Ignoring unusable price {} for {}", p, symbol);
                        PriceCache::Failed
                    }
                    Err(e) => {
                        tracing::warn!("Price fetch failed for {}: {}", symbol, e);
                        PriceCache::Failed
                    }
                };
            }

            let PriceCache::Fetched(current) = price else {
                summary.deferred += 1;
                continue;
            };

            record.outcome = resolve_outcome(record.dir, record.base, current);
            summary.resolved += 1;
            if record.outcome == Outcome::Correct {
                summary.correct += 1;
            }
        }

        if summary.changed() {
            self.store.replace_all(symbol, horizon, &entries)?;
            tracing::info!(
                symbol = %symbol,
                horizon,
                resolved = summary.resolved,
                correct = summary.correct,
                "Updated record stream"
            );
        } else {
            tracing::debug!("No changes for {} {}m", symbol, horizon);
        }

        Ok(summary)
    }

    pub async fn run(&self, symbols: &[String], horizons: &[u32]) -> EvaluationReport {
        self.run_at(symbols, horizons, Utc::now().timestamp_millis())
            .await
    }

    /// Evaluate every stream; one failing stream never stops the rest
    pub async fn run_at(
        &self,
        symbols: &[String],
        horizons: &[u32],
        now_ms: i64,
    ) -> EvaluationReport {
        let mut report = EvaluationReport::default();

        for (i, symbol) in symbols.iter().enumerate() {
            for &horizon in horizons {
                match self.evaluate_stream(symbol, horizon, now_ms).await {
                    Ok(summary) => report.streams.push(summary),
                    Err(e) => {
                        tracing::error!("Evaluating {} {}m failed: {}", symbol, horizon, e);
                        report.failures.push(EvaluationFailure {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, ForecastRecord, PricePoint, AUTO_SOURCE};
    use crate::persistence::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const HORIZON: u32 = 15;
    const DUE: i64 = 15 * 60_000 + 2 * 60_000;

    struct PriceSource {
        price: Option<f64>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MarketData for PriceSource {
        fn name(&self) -> &'static str {
            "price"
        }

        async fn recent_closes(&self, _symbol: &str, _limit: usize) -> Result<Vec<PricePoint>> {
            Err("not used".into())
        }

        async fn candles(&self, _symbol: &str, _start: i64, _end: i64) -> Result<Vec<Candle>> {
            Err("not used".into())
        }

        async fn last_close(&self, _symbol: &str) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.price.ok_or_else(|| "offline".into())
        }
    }

    fn setup(
        price: Option<f64>,
    ) -> (OutcomeEvaluator<PriceSource, MemoryStore>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let settings = EvaluatorSettings {
            rest_interval: Duration::ZERO,
            ..EvaluatorSettings::default()
        };
        let source = PriceSource {
            price,
            calls: calls.clone(),
        };
        (OutcomeEvaluator::new(source, MemoryStore::new(), settings), calls)
    }

    fn pending(t: i64, dir: Direction) -> ForecastRecord {
        ForecastRecord {
            id: ForecastRecord::make_id("BTCUSDT", t, HORIZON),
            t,
            src: AUTO_SOURCE.to_string(),
            dir,
            conf: 0.7,
            range: [0.5, 1.0],
            price_lo: 100.5,
            price_hi: 101.0,
            base: 100.0,
            horizon: HORIZON,
            outcome: Outcome::Pending,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_resolve_outcome() {
        assert_eq!(resolve_outcome(Direction::Up, 100.0, 100.8), Outcome::Correct);
        assert_eq!(resolve_outcome(Direction::Up, 100.0, 99.5), Outcome::Wrong);
        assert_eq!(resolve_outcome(Direction::Down, 100.0, 99.5), Outcome::Correct);
        assert_eq!(resolve_outcome(Direction::Down, 100.0, 100.8), Outcome::Wrong);
        // Flat counts as not-up
        assert_eq!(resolve_outcome(Direction::Down, 100.0, 100.0), Outcome::Correct);
        assert_eq!(resolve_outcome(Direction::Up, 100.0, 100.0), Outcome::Wrong);
    }

    #[tokio::test]
    async fn test_young_record_untouched() {
        let (evaluator, calls) = setup(Some(100.8));
        let record = pending(0, Direction::Up);
        evaluator.store().append("BTCUSDT", HORIZON, &record).unwrap();

        let summary = evaluator
            .evaluate_stream("BTCUSDT", HORIZON, DUE - 1)
            .await
            .unwrap();

        assert_eq!(summary.too_young, 1);
        assert!(!summary.changed());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(evaluator.store().records("BTCUSDT", HORIZON).unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_due_record_resolves_once() {
        let (evaluator, calls) = setup(Some(100.8));
        evaluator
            .store()
            .append("BTCUSDT", HORIZON, &pending(0, Direction::Up))
            .unwrap();

        let first = evaluator.evaluate_stream("BTCUSDT", HORIZON, DUE).await.unwrap();
        assert_eq!(first.resolved, 1);
        assert_eq!(first.correct, 1);

        let stored = evaluator.store().records("BTCUSDT", HORIZON).unwrap();
        assert_eq!(stored[0].outcome, Outcome::Correct);

        // Second pass is a no-op
        let second = evaluator
            .evaluate_stream("BTCUSDT", HORIZON, DUE + 60_000)
            .await
            .unwrap();
        assert_eq!(second.resolved, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.store().records("BTCUSDT", HORIZON).unwrap(), stored);
    }

    #[tokio::test]
    async fn test_resolution_keeps_unknown_keys() {
        let (evaluator, _) = setup(Some(100.8));
        let mut record = pending(0, Direction::Up);
        record
            .extra
            .insert("model".to_string(), serde_json::json!("v2"));
        evaluator.store().append("BTCUSDT", HORIZON, &record).unwrap();

        let summary = evaluator.evaluate_stream("BTCUSDT", HORIZON, DUE).await.unwrap();
        assert_eq!(summary.resolved, 1);

        let stored = evaluator.store().last_record("BTCUSDT", HORIZON).unwrap().unwrap();
        assert_eq!(stored.outcome, Outcome::Correct);
        assert_eq!(stored.extra["model"], "v2");
    }

    #[tokio::test]
    async fn test_far_past_timestamp_is_due() {
        let (evaluator, _) = setup(Some(100.8));
        evaluator
            .store()
            .append("BTCUSDT", HORIZON, &pending(i64::MIN, Direction::Up))
            .unwrap();

        let summary = evaluator.evaluate_stream("BTCUSDT", HORIZON, DUE).await.unwrap();

        assert_eq!(summary.too_young, 0);
        assert_eq!(summary.resolved, 1);
    }

    #[tokio::test]
    async fn test_price_fetched_once_per_stream() {
        let (evaluator, calls) = setup(Some(99.5));
        for i in 0..3 {
            evaluator
                .store()
                .append("BTCUSDT", HORIZON, &pending(i * 1_000, Direction::Up))
                .unwrap();
        }

        let summary = evaluator
            .evaluate_stream("BTCUSDT", HORIZON, DUE + 10_000)
            .await
            .unwrap();

        assert_eq!(summary.resolved, 3);
        assert_eq!(summary.correct, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_pending() {
        let (evaluator, calls) = setup(None);
        evaluator
            .store()
            .append("BTCUSDT", HORIZON, &pending(0, Direction::Up))
            .unwrap();
        evaluator
            .store()
            .append("BTCUSDT", HORIZON, &pending(1, Direction::Down))
            .unwrap();

        let summary = evaluator.evaluate_stream("BTCUSDT", HORIZON, DUE + 1).await.unwrap();

        assert_eq!(summary.deferred, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(evaluator
            .store()
            .records("BTCUSDT", HORIZON)
            .unwrap()
            .iter()
            .all(|r| r.outcome == Outcome::Pending));
    }

    #[tokio::test]
    async fn test_final_and_opaque_entries_pass_through() {
        let (evaluator, calls) = setup(Some(100.8));
        let mut no_trade = pending(0, Direction::Down);
        no_trade.outcome = Outcome::NoTrade;
        let mut wrong = pending(1, Direction::Down);
        wrong.outcome = Outcome::Wrong;
        let opaque = StoredEntry::Opaque(serde_json::json!({"t": 0, "outcome": "Pending"}));
        let due = pending(2, Direction::Down);

        let entries = vec![
            StoredEntry::Forecast(no_trade.clone()),
            opaque.clone(),
            StoredEntry::Forecast(wrong.clone()),
            StoredEntry::Forecast(due.clone()),
        ];
        evaluator
            .store()
            .replace_all("BTCUSDT", HORIZON, &entries)
            .unwrap();

        let summary = evaluator.evaluate_stream("BTCUSDT", HORIZON, DUE + 2).await.unwrap();
        assert_eq!(summary.resolved, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let after = evaluator.store().load("BTCUSDT", HORIZON).unwrap();
        let mut resolved = due;
        resolved.outcome = Outcome::Wrong;
        assert_eq!(
            after,
            vec![
                StoredEntry::Forecast(no_trade),
                opaque,
                StoredEntry::Forecast(wrong),
                StoredEntry::Forecast(resolved),
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_base_is_skipped() {
        let (evaluator, calls) = setup(Some(100.8));
        let mut record = pending(0, Direction::Up);
        record.base = 0.0;
        evaluator.store().append("BTCUSDT", HORIZON, &record).unwrap();

        let summary = evaluator.evaluate_stream("BTCUSDT", HORIZON, DUE).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            evaluator.store().records("BTCUSDT", HORIZON).unwrap()[0].outcome,
            Outcome::Pending
        );
    }

    #[tokio::test]
    async fn test_run_covers_all_streams() {
        let (evaluator, _) = setup(Some(100.8));
        evaluator
            .store()
            .append("BTCUSDT", 15, &pending(0, Direction::Up))
            .unwrap();

        let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        let report = evaluator.run_at(&symbols, &[15, 60], DUE).await;

        assert_eq!(report.streams.len(), 4);
        assert!(report.failures.is_empty());
        assert_eq!(report.resolved(), 1);
        assert!(report.any_changed());
    }
}
