use super::{is_duplicate, RecordStore};
use crate::models::{ForecastRecord, StoredEntry};
use crate::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-process record store
///
/// Clones share the same streams, like the candle buffer it replaces.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<(String, u32), Vec<StoredEntry>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(symbol: &str, horizon: u32) -> (String, u32) {
        (symbol.to_string(), horizon)
    }
}

impl RecordStore for MemoryStore {
    fn load(&self, symbol: &str, horizon: u32) -> Result<Vec<StoredEntry>> {
        let data = self.data.read().map_err(|e| e.to_string())?;
        Ok(data
            .get(&Self::key(symbol, horizon))
            .cloned()
            .unwrap_or_default())
    }

    fn append(&self, symbol: &str, horizon: u32, record: &ForecastRecord) -> Result<bool> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        let stream = data.entry(Self::key(symbol, horizon)).or_default();

        let last = stream.iter().rev().find_map(StoredEntry::as_forecast);
        if is_duplicate(last, record) {
            return Ok(false);
        }

        stream.push(StoredEntry::Forecast(record.clone()));
        Ok(true)
    }

    fn replace_all(&self, symbol: &str, horizon: u32, entries: &[StoredEntry]) -> Result<()> {
        let mut data = self.data.write().map_err(|e| e.to_string())?;
        data.insert(Self::key(symbol, horizon), entries.to_vec());
        Ok(())
    }
}
