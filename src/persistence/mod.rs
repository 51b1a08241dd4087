// Forecast record persistence
//
// One record stream per (symbol, horizon). Appends are idempotent and
// whole-stream rewrites are atomic, so locking can be layered on later
// without touching call sites.
pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

use crate::models::{ForecastRecord, StoredEntry};
use crate::Result;

/// Share of entries kept when a stream is rotated
const ROTATE_KEEP_RATIO: f64 = 0.8;

pub trait RecordStore: Send + Sync {
    /// Every entry in stream order. Unparseable lines are dropped.
    fn load(&self, symbol: &str, horizon: u32) -> Result<Vec<StoredEntry>>;

    /// Append one record; returns `false` without writing when the stream's
    /// last record already carries the same id
    fn append(&self, symbol: &str, horizon: u32, record: &ForecastRecord) -> Result<bool>;

    /// Atomically replace the whole stream
    fn replace_all(&self, symbol: &str, horizon: u32, entries: &[StoredEntry]) -> Result<()>;

    /// Complete forecast records only
    fn records(&self, symbol: &str, horizon: u32) -> Result<Vec<ForecastRecord>> {
        Ok(self
            .load(symbol, horizon)?
            .into_iter()
            .filter_map(|entry| match entry {
                StoredEntry::Forecast(record) => Some(record),
                StoredEntry::Opaque(_) => None,
            })
            .collect())
    }

    /// The most recent complete record, if any
    fn last_record(&self, symbol: &str, horizon: u32) -> Result<Option<ForecastRecord>> {
        Ok(self
            .load(symbol, horizon)?
            .into_iter()
            .rev()
            .find_map(|entry| match entry {
                StoredEntry::Forecast(record) => Some(record),
                StoredEntry::Opaque(_) => None,
            }))
    }

    /// Retention: once a stream exceeds `max_entries`, keep only its newest
    /// 80%. Remaining entries keep their order. Returns how many were removed.
    fn rotate(&self, symbol: &str, horizon: u32, max_entries: usize) -> Result<usize> {
        let entries = self.load(symbol, horizon)?;
        if entries.len() <= max_entries {
            return Ok(0);
        }

        let keep = (max_entries as f64 * ROTATE_KEEP_RATIO).floor() as usize;
        let removed = entries.len() - keep;
        self.replace_all(symbol, horizon, &entries[removed..])?;

        tracing::info!(
            symbol = %symbol,
            horizon,
            removed,
            "Rotated record stream"
        );

        Ok(removed)
    }
}

/// True when appending `record` after `last` would duplicate it
pub(crate) fn is_duplicate(last: Option<&ForecastRecord>, record: &ForecastRecord) -> bool {
    last.map(|l| l.id == record.id).unwrap_or(false)
}
