// Technical indicators and feature extraction
// EMA, RSI and return volatility feed the 6-value feature vector

pub mod features;
pub mod moving_average;
pub mod rsi;
pub mod volatility;

pub use features::{build_features, FeatureHistory, FeatureVector, FEATURE_NAMES, FEATURE_WINDOW};
pub use moving_average::{calculate_ema_series, calculate_ema_slope, calculate_rolling_sma};
pub use rsi::{calculate_rsi14, calculate_rsi_series};
pub use volatility::{calculate_returns, calculate_sigma, calculate_stddev, SIGMA_FLOOR};
