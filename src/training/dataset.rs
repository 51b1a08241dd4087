use crate::indicators::FeatureHistory;
use crate::models::Candle;

/// Points needed before indicators are warmed up
pub const WARMUP_POINTS: usize = 15;

/// Labelled samples: one standardisable feature row per usable index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<[f64; 6]>,
    /// 1.0 when the forward return cleared the dead-zone upwards, 0.0 when
    /// it cleared it downwards
    pub labels: Vec<f64>,
    /// Samples dropped for falling inside the dead-zone
    pub dropped: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positive_rate(&self) -> f64 {
        if self.labels.is_empty() {
            return 0.0;
        }
        self.labels.iter().sum::<f64>() / self.labels.len() as f64
    }
}

/// Build a labelled dataset from 1m candles for a horizon in minutes
///
/// Index `i` runs from the warm-up point to `len - horizon - 1` (exclusive);
/// its label is the sign of `close[i + horizon] / close[i] - 1` once that
/// move exceeds `dead_zone` in either direction.
pub fn build_dataset(candles: &[Candle], horizon: u32, dead_zone: f64) -> Dataset {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let h = horizon as usize;
    let end = closes.len().saturating_sub(h + 1);

    let mut dataset = Dataset::default();
    if end <= WARMUP_POINTS {
        return dataset;
    }

    let history = FeatureHistory::new(&closes);

    for i in WARMUP_POINTS..end {
        let now = closes[i];
        if !(now.is_finite() && now > 0.0) {
            continue;
        }

        let forward = closes[i + h] / now - 1.0;
        let label = if forward > dead_zone {
            1.0
        } else if forward < -dead_zone {
            0.0
        } else {
            dataset.dropped += 1;
            continue;
        };

        let Some(features) = history.at(i) else {
            continue;
        };
        let row = features.as_array();
        if row.iter().any(|v| !v.is_finite()) {
            continue;
        }

        dataset.rows.push(row);
        dataset.labels.push(label);
    }

    dataset
}
