use crate::indicators::FeatureVector;
use serde::{Deserialize, Serialize};

/// Logistic scoring parameters
///
/// Features are standardised with `(x - norm_mean) / norm_scale` before the
/// weighted sum. A zero scale is treated as 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreParams {
    pub weights: [f64; 6],
    pub bias: f64,
    pub norm_mean: [f64; 6],
    pub norm_scale: [f64; 6],
}

impl ScoreParams {
    /// Hand-tuned parameters used by the live emitter
    pub fn builtin() -> Self {
        Self {
            weights: [0.35, 0.45, 0.25, 0.80, 0.30, -0.15],
            bias: 0.0,
            norm_mean: [50.0, 0.0, 0.0, 0.0, 0.0, 0.003],
            norm_scale: [12.0, 0.5, 0.3, 0.01, 0.005, 0.002],
        }
    }

    pub fn standardize(&self, features: &FeatureVector) -> [f64; 6] {
        let raw = features.as_array();
        let mut out = [0.0; 6];
        for i in 0..6 {
            let scale = if self.norm_scale[i] == 0.0 {
                1.0
            } else {
                self.norm_scale[i]
            };
            out[i] = (raw[i] - self.norm_mean[i]) / scale;
        }
        out
    }

    /// `bias + Σ weight_i * standardized_i`
    pub fn logit(&self, features: &FeatureVector) -> f64 {
        self.standardize(features)
            .iter()
            .zip(self.weights.iter())
            .fold(self.bias, |z, (x, w)| z + w * x)
    }
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral_features() -> FeatureVector {
        FeatureVector {
            rsi: 50.0,
            ema_slope5: 0.0,
            ema_slope15: 0.0,
            momentum: 0.0,
            last_return: 0.0,
            sigma: 0.003,
        }
    }

    #[test]
    fn test_builtin_neutral_logit_is_zero() {
        let params = ScoreParams::builtin();
        assert_eq!(params.logit(&neutral_features()), 0.0);
    }

    #[test]
    fn test_zero_scale_treated_as_one() {
        let params = ScoreParams {
            weights: [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            bias: 0.0,
            norm_mean: [40.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            norm_scale: [0.0; 6],
        };

        let standardized = params.standardize(&neutral_features());
        assert_eq!(standardized[0], 10.0);
        assert_eq!(params.logit(&neutral_features()), 10.0);
    }

    #[test]
    fn test_momentum_dominates_builtin() {
        let mut features = neutral_features();
        features.momentum = 0.02;

        // (0.02 / 0.01) * 0.8
        assert!((ScoreParams::builtin().logit(&features) - 1.6).abs() < 1e-12);
    }
}
