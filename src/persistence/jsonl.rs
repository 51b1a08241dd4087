use super::{is_duplicate, RecordStore};
use crate::error::ForecastError;
use crate::models::{ForecastRecord, StoredEntry};
use crate::Result;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Line-delimited JSON record files under `{root}/{SYMBOL}/{H}m.jsonl`
#[derive(Debug, Clone)]
pub struct JsonlStore {
    root: PathBuf,
}

impl JsonlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, symbol: &str, horizon: u32) -> PathBuf {
        self.root.join(symbol).join(format!("{}m.jsonl", horizon))
    }

    fn parse_line(line: &[u8], path: &Path, line_no: usize) -> Option<StoredEntry> {
        match serde_json::from_slice::<StoredEntry>(line) {
            Ok(entry @ StoredEntry::Forecast(_)) => Some(entry),
            Ok(StoredEntry::Opaque(value)) if value.is_object() => {
                Some(StoredEntry::Opaque(value))
            }
            Ok(StoredEntry::Opaque(_)) | Err(_) => {
                tracing::debug!(
                    "Skipping malformed line {} in {}",
                    line_no,
                    path.display()
                );
                None
            }
        }
    }
}

/// Make sure the next append starts on a fresh line even if a previous
/// writer died mid-line
fn ensure_trailing_newline(file: &mut fs::File) -> std::io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }

    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.seek(SeekFrom::End(0))?;
        file.write_all(b"\n")?;
    }
    Ok(())
}

impl RecordStore for JsonlStore {
    fn load(&self, symbol: &str, horizon: u32) -> Result<Vec<StoredEntry>> {
        let path = self.path_for(symbol, horizon);
        if !path.exists() {
            return Ok(Vec::new());
        }

        // Bytes, not a String: one line of bad UTF-8 only loses that line
        let content = fs::read(&path).map_err(ForecastError::from)?;
        let entries = content
            .split(|b| *b == b'\n')
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_ascii()))
            .filter(|(_, line)| !line.is_empty())
            .filter_map(|(line_no, line)| Self::parse_line(line, &path, line_no))
            .collect();

        Ok(entries)
    }

    fn append(&self, symbol: &str, horizon: u32, record: &ForecastRecord) -> Result<bool> {
        if is_duplicate(self.last_record(symbol, horizon)?.as_ref(), record) {
            tracing::debug!(id = %record.id, "Record already appended, skipping");
            return Ok(false);
        }

        let path = self.path_for(symbol, horizon);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ForecastError::from)?;
        }

        let line = serde_json::to_string(record).map_err(ForecastError::from)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(ForecastError::from)?;
        ensure_trailing_newline(&mut file).map_err(ForecastError::from)?;
        writeln!(file, "{}", line).map_err(ForecastError::from)?;

        Ok(true)
    }

    fn replace_all(&self, symbol: &str, horizon: u32, entries: &[StoredEntry]) -> Result<()> {
        let path = self.path_for(symbol, horizon);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).map_err(ForecastError::from)?;

        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry).map_err(ForecastError::from)?);
            buf.push('\n');
        }

        // Write-then-rename so readers never see a half-written stream
        let tmp = dir.join(format!(".{}m.{}.tmp", horizon, uuid::Uuid::new_v4()));
        fs::write(&tmp, buf).map_err(ForecastError::from)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(ForecastError::from(e).into());
        }

        tracing::debug!("Rewrote {} ({} entries)", path.display(), entries.len());

        Ok(())
    }
}
