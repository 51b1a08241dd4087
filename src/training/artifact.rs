use super::logreg::LogisticModel;
use crate::error::ForecastError;
use crate::indicators::FEATURE_NAMES;
use crate::scoring::ScoreParams;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactScaler {
    pub mu: Vec<f64>,
    pub sd: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub trained_at: DateTime<Utc>,
    pub symbol: String,
    pub horizon: u32,
    pub n_samples: usize,
}

/// Trained parameters for one (symbol, horizon), as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Column order of `W`, `scaler.mu` and `scaler.sd`
    pub features: Vec<String>,
    #[serde(rename = "W")]
    pub weights: Vec<f64>,
    #[serde(rename = "b")]
    pub bias: f64,
    pub scaler: ArtifactScaler,
    pub meta: ArtifactMeta,
}

impl ModelArtifact {
    pub fn from_model(
        model: &LogisticModel,
        symbol: &str,
        horizon: u32,
        n_samples: usize,
        trained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            features: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            weights: model.weights.to_vec(),
            bias: model.bias,
            scaler: ArtifactScaler {
                mu: model.scaler.mu.to_vec(),
                sd: model.scaler.sd.to_vec(),
            },
            meta: ArtifactMeta {
                trained_at,
                symbol: symbol.to_string(),
                horizon,
                n_samples,
            },
        }
    }
}

/// Columns are matched by feature name, so an artifact listing the same
/// features in another order still maps correctly
impl TryFrom<&ModelArtifact> for ScoreParams {
    type Error = ForecastError;

    fn try_from(artifact: &ModelArtifact) -> std::result::Result<Self, Self::Error> {
        let n = artifact.features.len();
        if artifact.weights.len() != n
            || artifact.scaler.mu.len() != n
            || artifact.scaler.sd.len() != n
        {
            return Err(ForecastError::InvalidArtifact(format!(
                "{} features but {} weights, {} means, {} scales",
                n,
                artifact.weights.len(),
                artifact.scaler.mu.len(),
                artifact.scaler.sd.len()
            )));
        }

        let mut params = ScoreParams {
            weights: [0.0; 6],
            bias: artifact.bias,
            norm_mean: [0.0; 6],
            norm_scale: [1.0; 6],
        };

        for (slot, name) in FEATURE_NAMES.iter().enumerate() {
            let col = artifact
                .features
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| {
                    ForecastError::InvalidArtifact(format!("missing feature {}", name))
                })?;

            params.weights[slot] = artifact.weights[col];
            params.norm_mean[slot] = artifact.scaler.mu[col];
            params.norm_scale[slot] = artifact.scaler.sd[col];
        }

        Ok(params)
    }
}

/// Model artifacts under `{root}/models/{SYMBOL}/{H}m.json`
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, symbol: &str, horizon: u32) -> PathBuf {
        self.root
            .join("models")
            .join(symbol)
            .join(format!("{}m.json", horizon))
    }

    pub fn save(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        let path = self.path_for(&artifact.meta.symbol, artifact.meta.horizon);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).map_err(ForecastError::from)?;

        let body = serde_json::to_string_pretty(artifact).map_err(ForecastError::from)?;
        let tmp = dir.join(format!(".{}m.{}.tmp", artifact.meta.horizon, uuid::Uuid::new_v4()));
        fs::write(&tmp, body).map_err(ForecastError::from)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(ForecastError::from(e).into());
        }

        Ok(path)
    }

    pub fn load(&self, symbol: &str, horizon: u32) -> Result<Option<ModelArtifact>> {
        let path = self.path_for(symbol, horizon);
        if !path.exists() {
            return Ok(None);
        }
        let body = fs::read_to_string(&path).map_err(ForecastError::from)?;
        let artifact = serde_json::from_str(&body).map_err(ForecastError::from)?;
        Ok(Some(artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::logreg::Scaler;
    use chrono::TimeZone;

    fn model() -> LogisticModel {
        LogisticModel {
            weights: [0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            bias: -0.05,
            scaler: Scaler {
                mu: [50.0, 0.0, 0.0, 0.0, 0.0, 0.003],
                sd: [12.0, 0.5, 0.3, 0.01, 0.005, 0.002],
            },
        }
    }

    fn artifact() -> ModelArtifact {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        ModelArtifact::from_model(&model(), "BTCUSDT", 15, 1234, at)
    }

    #[test]
    fn test_json_layout() {
        let value = serde_json::to_value(artifact()).unwrap();

        assert_eq!(
            value["features"],
            serde_json::json!(["rsi", "ema5_slope", "ema15_slope", "momentum", "lastRet", "sigma"])
        );
        assert_eq!(value["W"][3], 0.4);
        assert_eq!(value["b"], -0.05);
        assert_eq!(value["scaler"]["mu"][0], 50.0);
        assert_eq!(value["scaler"]["sd"][5], 0.002);
        assert_eq!(value["meta"]["symbol"], "BTCUSDT");
        assert_eq!(value["meta"]["horizon"], 15);
        assert_eq!(value["meta"]["n_samples"], 1234);
        assert!(value["meta"]["trained_at"].as_str().unwrap().starts_with("2025-01-02T03:04:05"));
    }

    #[test]
    fn test_into_score_params() {
        let params = ScoreParams::try_from(&artifact()).unwrap();

        assert_eq!(params.weights, [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(params.bias, -0.05);
        assert_eq!(params.norm_mean, ScoreParams::builtin().norm_mean);
        assert_eq!(params.norm_scale, ScoreParams::builtin().norm_scale);
    }

    #[test]
    fn test_maps_by_feature_name() {
        let mut art = artifact();
        art.features.swap(0, 5);
        art.weights.swap(0, 5);
        art.scaler.mu.swap(0, 5);
        art.scaler.sd.swap(0, 5);

        let params = ScoreParams::try_from(&art).unwrap();
        assert_eq!(params.weights[0], 0.1);
        assert_eq!(params.weights[5], 0.6);
        assert_eq!(params.norm_mean[0], 50.0);
    }

    #[test]
    fn test_rejects_incomplete_artifact() {
        let mut art = artifact();
        art.features.pop();
        assert!(ScoreParams::try_from(&art).is_err());

        let mut art = artifact();
        art.features[1] = "ema7_slope".to_string();
        let err = ScoreParams::try_from(&art).unwrap_err();
        assert!(err.to_string().contains("missing feature ema5_slope"));
    }

    #[test]
    fn test_store_round_trip() {
        let root =
            std::env::temp_dir().join(format!("forecastbot-models-{}", uuid::Uuid::new_v4()));
        let store = ArtifactStore::new(root.clone());

        assert!(store.load("BTCUSDT", 15).unwrap().is_none());

        let path = store.save(&artifact()).unwrap();
        assert_eq!(path, root.join("models").join("BTCUSDT").join("15m.json"));
        let loaded = store.load("BTCUSDT", 15).unwrap().unwrap();
        let expected = artifact();
        assert_eq!(loaded.features, expected.features);
        assert_eq!(loaded.meta, expected.meta);
        for (a, b) in loaded.weights.iter().zip(expected.weights.iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        let leftovers = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .map(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(leftovers, 0);

        let _ = fs::remove_dir_all(&root);
    }
}
