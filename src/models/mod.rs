use serde::{Deserialize, Serialize};

/// One closing price at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp_ms: i64,
    pub close: f64,
}

/// OHLC candle used by the offline trainer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<Candle> for PricePoint {
    fn from(candle: Candle) -> Self {
        Self {
            timestamp_ms: candle.timestamp_ms,
            close: candle.close,
        }
    }
}

/// Forecast direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Resolution state of a forecast
///
/// `Pending` is the only state the evaluator ever touches. `NoTrade` is
/// assigned at emission and is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Correct,
    Wrong,
    #[serde(rename = "No-Trade")]
    NoTrade,
}

/// Source tag written into every record emitted by this crate
pub const AUTO_SOURCE: &str = "auto";

/// A single persisted forecast (one JSONL line)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastRecord {
    pub id: String,
    /// Emission time, ms since epoch
    pub t: i64,
    pub src: String,
    pub dir: Direction,
    pub conf: f64,
    /// `[lo_pct, hi_pct]`, percent units
    pub range: [f64; 2],
    #[serde(rename = "priceLo")]
    pub price_lo: f64,
    #[serde(rename = "priceHi")]
    pub price_hi: f64,
    pub base: f64,
    /// Minutes
    pub horizon: u32,
    pub outcome: Outcome,
    /// Keys written by other producers, carried through rewrites
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ForecastRecord {
    pub fn make_id(symbol: &str, t_ms: i64, horizon: u32) -> String {
        format!("{}-{}-{}", symbol, t_ms, horizon)
    }
}

/// A line read back from a record file
///
/// Lines that are valid JSON but not a complete `ForecastRecord` are kept
/// verbatim so a whole-file rewrite never loses them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StoredEntry {
    Forecast(ForecastRecord),
    Opaque(serde_json::Value),
}

impl StoredEntry {
    pub fn as_forecast(&self) -> Option<&ForecastRecord> {
        match self {
            StoredEntry::Forecast(record) => Some(record),
            StoredEntry::Opaque(_) => None,
        }
    }
}

impl From<ForecastRecord> for StoredEntry {
    fn from(record: ForecastRecord) -> Self {
        StoredEntry::Forecast(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ForecastRecord {
        ForecastRecord {
            id: ForecastRecord::make_id("BTCUSDT", 1_700_000_000_000, 15),
            t: 1_700_000_000_000,
            src: AUTO_SOURCE.to_string(),
            dir: Direction::Up,
            conf: 0.71,
            range: [0.5, 1.0],
            price_lo: 100.5,
            price_hi: 101.0,
            base: 100.0,
            horizon: 15,
            outcome: Outcome::Pending,
            extra: Default::default(),
        }
    }

    #[test]
    fn test_record_wire_field_names() {
        let json = serde_json::to_value(sample_record()).unwrap();
        let obj = json.as_object().unwrap();

        for key in [
            "id", "t", "src", "dir", "conf", "range", "priceLo", "priceHi", "base", "horizon",
            "outcome",
        ] {
            assert!(obj.contains_key(key), "missing wire field {}", key);
        }
        assert_eq!(obj.len(), 11);
        assert_eq!(json["dir"], "Up");
        assert_eq!(json["outcome"], "Pending");
    }

    #[test]
    fn test_no_trade_wire_name() {
        let json = serde_json::to_string(&Outcome::NoTrade).unwrap();
        assert_eq!(json, "\"No-Trade\"");

        let parsed: Outcome = serde_json::from_str("\"No-Trade\"").unwrap();
        assert_eq!(parsed, Outcome::NoTrade);
    }

    #[test]
    fn test_incomplete_line_is_opaque() {
        let line = r#"{"id":"x","t":1,"outcome":"Pending"}"#;
        let entry: StoredEntry = serde_json::from_str(line).unwrap();

        assert!(entry.as_forecast().is_none());
        assert!(matches!(entry, StoredEntry::Opaque(_)));
    }

    #[test]
    fn test_complete_line_is_forecast() {
        let line = serde_json::to_string(&sample_record()).unwrap();
        let entry: StoredEntry = serde_json::from_str(&line).unwrap();

        assert_eq!(entry.as_forecast(), Some(&sample_record()));
    }

    #[test]
    fn test_unknown_keys_are_carried() {
        let mut value = serde_json::to_value(sample_record()).unwrap();
        value["model"] = serde_json::json!("v2");
        value["note"] = serde_json::json!({"by": "manual"});

        let entry: StoredEntry = serde_json::from_value(value.clone()).unwrap();
        let record = entry.as_forecast().unwrap();
        assert_eq!(record.extra["model"], "v2");
        assert_eq!(record.id, sample_record().id);

        assert_eq!(serde_json::to_value(record).unwrap(), value);
    }

    #[test]
    fn test_make_id() {
        assert_eq!(ForecastRecord::make_id("ETHUSDT", 42, 60), "ETHUSDT-42-60");
    }
}
