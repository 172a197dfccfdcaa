//! CSV implementation of the record store

use crate::storage::traits::{RecordStore, StorageError, StorageResult};
use crate::storage::Record;
use crate::url::extract_paper_id;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Column order of the output store
pub const STORE_HEADER: [&str; 4] = ["abstract_text", "source_url", "license_info", "label"];

/// One row of the output store, in column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRow {
    pub abstract_text: String,
    pub source_url: String,
    pub license_info: String,
    pub label: String,
}

impl From<&Record> for StoreRow {
    fn from(record: &Record) -> Self {
        Self {
            abstract_text: record.body_text().to_string(),
            source_url: record.source_url().to_string(),
            license_info: record.license_info().to_string(),
            label: record.label().to_string(),
        }
    }
}

/// Append-only CSV store
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file exists and already holds at least a header
    fn has_content(&self) -> bool {
        fs::metadata(&self.path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false)
    }

    fn try_load_ids(&self) -> StorageResult<HashSet<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let url_column = reader
            .headers()?
            .iter()
            .position(|h| h == "source_url")
            .ok_or(StorageError::MissingColumn("source_url"))?;

        let mut ids = HashSet::new();
        for (line, row) in reader.records().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!("Skipping unreadable row {} in {}: {}", line + 1, self.path.display(), e);
                    continue;
                }
            };

            if let Some(id) = row.get(url_column).and_then(extract_paper_id) {
                ids.insert(id.to_string());
            }
        }

        Ok(ids)
    }
}

impl RecordStore for CsvStore {
    fn load_existing_ids(&self) -> HashSet<String> {
        if !self.path.exists() {
            return HashSet::new();
        }

        match self.try_load_ids() {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(
                    "Could not read existing store {}: {}; starting with an empty history",
                    self.path.display(),
                    e
                );
                HashSet::new()
            }
        }
    }

    fn append(&mut self, records: &[Record]) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let write_header = !self.has_content();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        write_or_rollback(&file, |file| {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file);

            if write_header {
                writer.write_record(STORE_HEADER)?;
            }
            for record in records {
                writer.serialize(StoreRow::from(record))?;
            }
            writer.flush()?;
            Ok(())
        })?;

        Ok(records.len())
    }
}

/// Runs `write` against `file`, truncating back to the starting length on error
///
/// A failed batch leaves no partial rows behind; the buffered records are
/// written in full by the next flush.
fn write_or_rollback<F>(file: &File, write: F) -> StorageResult<()>
where
    F: FnOnce(&File) -> StorageResult<()>,
{
    let start_len = file.metadata()?.len();

    if let Err(e) = write(file) {
        if let Err(truncate_err) = file.set_len(start_len) {
            tracing::error!(
                "Could not roll back partial write to {} bytes: {}",
                start_len,
                truncate_err
            );
        }
        return Err(e);
    }

    Ok(())
}

/// Reads every row of a store
pub fn read_rows(path: &Path) -> StorageResult<Vec<StoreRow>> {
    let mut reader = csv::ReaderBuilder::new().from_path(path)?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}
