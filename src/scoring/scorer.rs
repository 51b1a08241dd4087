use super::params::ScoreParams;
use crate::indicators::FeatureVector;
use crate::models::Direction;
use rand::Rng;

pub const MIN_CONFIDENCE: f64 = 0.55;
pub const MAX_CONFIDENCE: f64 = 0.95;
pub const MIN_RANGE_PCT: f64 = 0.2;
pub const MAX_RANGE_PCT: f64 = 2.0;
pub const MIN_LO_PCT: f64 = 0.10;

/// Distance from 0.5 inside which the probability counts as a tie
const TIE_BAND: f64 = 1e-3;
/// Total width of the random nudge applied to a tie (±0.01)
const TIE_NUDGE: f64 = 0.02;

/// Scorer output for one feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub p_up: f64,
    pub direction: Direction,
    /// Clamped to [0.55, 0.95]
    pub confidence: f64,
    /// `[lo_pct, hi_pct]`
    pub range_pct: [f64; 2],
}

/// Sigmoid clamped to exact 0/1 outside ±40
pub fn sigmoid(z: f64) -> f64 {
    if z < -40.0 {
        0.0
    } else if z > 40.0 {
        1.0
    } else {
        1.0 / (1.0 + (-z).exp())
    }
}

/// Turns features into a direction, confidence and expected move range
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    params: ScoreParams,
}

impl Scorer {
    pub fn new(params: ScoreParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ScoreParams {
        &self.params
    }

    /// Raw probability of an up move, before any tie-break
    pub fn probability_up(&self, features: &FeatureVector) -> f64 {
        sigmoid(self.params.logit(features))
    }

    /// Score a feature vector
    ///
    /// A probability within 1e-3 of 0.5 is nudged by a random amount in
    /// ±0.01 drawn from `rng`; pass a seeded RNG for reproducible output.
    pub fn score<R: Rng + ?Sized>(&self, features: &FeatureVector, rng: &mut R) -> Score {
        let mut p_up = self.probability_up(features);
        if (p_up - 0.5).abs() < TIE_BAND {
            p_up += (rng.gen::<f64>() - 0.5) * TIE_NUDGE;
        }

        let direction = if p_up >= 0.5 {
            Direction::Up
        } else {
            Direction::Down
        };

        Score {
            p_up,
            direction,
            confidence: p_up.max(1.0 - p_up).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE),
            range_pct: expected_range_pct(features),
        }
    }
}

/// Expected move band in percent, from volatility and momentum
pub fn expected_range_pct(features: &FeatureVector) -> [f64; 2] {
    let raw = 0.8 * features.sigma * 100.0 + 0.6 * features.momentum.abs() * 100.0;
    let hi = if raw.is_finite() {
        raw.clamp(MIN_RANGE_PCT, MAX_RANGE_PCT)
    } else {
        MAX_RANGE_PCT
    };
    let lo = (hi * 0.55).max(MIN_LO_PCT);
    [lo, hi]
}

/// Map a percent band onto absolute prices on the forecast side of `base`
///
/// Up: `[base·(1+lo), base·(1+hi)]`, both above base.
/// Down: `[base·(1−hi), base·(1−lo)]`, both below base.
/// The returned pair is always `(price_lo, price_hi)` with `price_lo <= price_hi`.
pub fn price_bounds(base: f64, direction: Direction, range_pct: [f64; 2]) -> (f64, f64) {
    let [lo, hi] = range_pct;
    match direction {
        Direction::Up => (base * (1.0 + lo / 100.0), base * (1.0 + hi / 100.0)),
        Direction::Down => (base * (1.0 - hi / 100.0), base * (1.0 - lo / 100.0)),
    }
}
