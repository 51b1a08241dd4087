use super::moving_average::{calculate_ema_series, calculate_ema_slope, slope_at};
use super::rsi::{calculate_rsi14, calculate_rsi_series};
use super::volatility::{calculate_returns, calculate_sigma, calculate_sigma_at};
use serde::{Deserialize, Serialize};

/// Number of closes the online builder looks at
pub const FEATURE_WINDOW: usize = 60;

/// Feature names in vector order, as written into model artifacts
pub const FEATURE_NAMES: [&str; 6] = [
    "rsi",
    "ema5_slope",
    "ema15_slope",
    "momentum",
    "lastRet",
    "sigma",
];

const MOMENTUM_LOOKBACK: usize = 15;
const SIGMA_LOOKBACK: usize = 30;

/// Fixed 6-dimensional feature record derived from a close series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// RSI(14), in [0, 100]
    pub rsi: f64,
    pub ema_slope5: f64,
    pub ema_slope15: f64,
    pub momentum: f64,
    pub last_return: f64,
    /// Std-dev of single-step returns
    pub sigma: f64,
}

impl FeatureVector {
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.rsi,
            self.ema_slope5,
            self.ema_slope15,
            self.momentum,
            self.last_return,
            self.sigma,
        ]
    }

    /// Look a feature up by its artifact name
    pub fn by_name(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.as_array()[i])
    }
}

/// Build the online feature vector from the most recent closes
///
/// Uses the last 60 closes (or all of them when fewer). Never fails:
/// short series fall back to neutral values, and rejecting windows that
/// are too short overall is up to the caller.
pub fn build_features(closes: &[f64]) -> FeatureVector {
    let window = if closes.len() > FEATURE_WINDOW {
        &closes[closes.len() - FEATURE_WINDOW..]
    } else {
        closes
    };

    let (first, last) = match (window.first(), window.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => {
            return FeatureVector {
                rsi: calculate_rsi14(window),
                ema_slope5: 0.0,
                ema_slope15: 0.0,
                momentum: 0.0,
                last_return: 0.0,
                sigma: calculate_sigma(window),
            }
        }
    };

    let returns = calculate_returns(window);

    FeatureVector {
        rsi: calculate_rsi14(window),
        ema_slope5: calculate_ema_slope(window, 5),
        ema_slope15: calculate_ema_slope(window, 15),
        momentum: last / first - 1.0,
        last_return: returns.last().copied().unwrap_or(0.0),
        sigma: calculate_sigma(window),
    }
}

/// Point-in-time feature extraction over a long close history
///
/// Indicator series are computed once; `at(i)` only reads data up to `i`.
pub struct FeatureHistory<'a> {
    closes: &'a [f64],
    ema5: Vec<f64>,
    ema15: Vec<f64>,
    rsi: Vec<f64>,
}

impl<'a> FeatureHistory<'a> {
    pub fn new(closes: &'a [f64]) -> Self {
        Self {
            closes,
            ema5: calculate_ema_series(closes, 5),
            ema15: calculate_ema_series(closes, 15),
            rsi: calculate_rsi_series(closes),
        }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Features as observable at index `i`; `None` when `i` is out of range
    pub fn at(&self, i: usize) -> Option<FeatureVector> {
        if i >= self.closes.len() {
            return None;
        }

        let close = self.closes[i];
        let anchor = self.closes[i.saturating_sub(MOMENTUM_LOOKBACK)].max(1e-9);
        let last_return = if i >= 1 {
            close / self.closes[i - 1] - 1.0
        } else {
            0.0
        };

        Some(FeatureVector {
            rsi: self.rsi[i],
            ema_slope5: slope_at(&self.ema5, i),
            ema_slope15: slope_at(&self.ema15, i),
            momentum: close / anchor - 1.0,
            last_return,
            sigma: calculate_sigma_at(self.closes, i, SIGMA_LOOKBACK),
        })
    }
}
