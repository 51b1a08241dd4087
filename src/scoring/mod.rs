// Directional scoring: features -> probability, confidence, move range
pub mod params;
pub mod scorer;

pub use params::ScoreParams;
pub use scorer::{
    expected_range_pct, price_bounds, sigmoid, Score, Scorer, MAX_CONFIDENCE, MIN_CONFIDENCE,
};
