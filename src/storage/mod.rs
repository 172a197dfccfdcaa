//! Storage module for persisting harvested records
//!
//! This module handles the output store, including:
//! - Loading previously harvested identifiers for resumption
//! - Buffering new records and flushing them append-only
//! - The fixed CSV schema shared with downstream tooling

mod buffer;
mod csv_store;
mod traits;

pub use buffer::{BufferedStore, FlushBuffer};
pub use csv_store::{read_rows, CsvStore, StoreRow, STORE_HEADER};
pub use traits::{RecordStore, StorageError, StorageResult};

use std::fmt;
use std::str::FromStr;

/// Provenance label attached to every harvested record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Text written by a person
    Human,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "Human",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Human" => Ok(Self::Human),
            other => Err(format!("Unknown label: {}", other)),
        }
    }
}

/// One harvested abstract
///
/// Records are immutable once built; the identifier is always the one carried
/// by `source_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    id: String,
    body_text: String,
    source_url: String,
    license_info: String,
    label: Label,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        body_text: impl Into<String>,
        source_url: impl Into<String>,
        license_info: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            body_text: body_text.into(),
            source_url: source_url.into(),
            license_info: license_info.into(),
            label: Label::Human,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn license_info(&self) -> &str {
        &self.license_info
    }

    pub fn label(&self) -> Label {
        self.label
    }
}
