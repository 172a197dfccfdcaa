//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and the
//! associated error type.

use crate::storage::Record;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store is missing the '{0}' column")]
    MissingColumn(&'static str),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for append-only record stores
///
/// A store never rewrites existing rows; every identifier it holds must be
/// recoverable from the row's source URL alone.
pub trait RecordStore {
    /// Identifiers of every record already in the store
    ///
    /// A missing or unreadable store yields an empty set; implementations log
    /// the failure instead of returning it.
    fn load_existing_ids(&self) -> HashSet<String>;

    /// Appends records in order, returning how many rows were written
    fn append(&mut self, records: &[Record]) -> StorageResult<usize>;
}
