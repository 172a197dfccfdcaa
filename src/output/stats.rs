//! Statistics for an existing output store
//!
//! This module reads a store without touching the network and summarises
//! what a resumed run would start from.

use crate::storage::{read_rows, StorageError, StoreRow};
use crate::url::extract_paper_id;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Output store summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStatistics {
    /// Data rows, header excluded
    pub rows: u64,

    /// Distinct identifiers recovered from source URLs
    pub unique_ids: u64,

    /// Rows whose identifier already appeared earlier in the store
    pub duplicate_ids: u64,

    /// Rows whose source URL carries no identifier
    pub rows_without_id: u64,

    /// Row count per label value
    pub labels: BTreeMap<String, u64>,

    /// Mean abstract length in characters
    pub mean_abstract_chars: f64,
}

/// Loads statistics from a CSV store
///
/// A missing store yields empty statistics.
///
/// # Arguments
///
/// * `path` - The output store to read
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully computed statistics
/// * `Err(StorageError)` - The store exists but could not be read
pub fn load_statistics(path: &Path) -> Result<StoreStatistics, StorageError> {
    if !path.exists() {
        return Ok(StoreStatistics::default());
    }
    Ok(compute_statistics(&read_rows(path)?))
}

/// Computes statistics over already loaded rows
pub fn compute_statistics(rows: &[StoreRow]) -> StoreStatistics {
    let mut stats = StoreStatistics::default();
    let mut seen: HashMap<&str, u64> = HashMap::new();
    let mut total_chars: u64 = 0;

    for row in rows {
        stats.rows += 1;
        total_chars += row.abstract_text.chars().count() as u64;
        *stats.labels.entry(row.label.clone()).or_insert(0) += 1;

        match extract_paper_id(&row.source_url) {
            Some(id) => {
                let count = seen.entry(id).or_insert(0);
                if *count > 0 {
                    stats.duplicate_ids += 1;
                }
                *count += 1;
            }
            None => stats.rows_without_id += 1,
        }
    }

    stats.unique_ids = seen.len() as u64;
    if stats.rows > 0 {
        stats.mean_abstract_chars = total_chars as f64 / stats.rows as f64;
    }
    stats
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
/// * `target` - The configured target, for a progress line
pub fn print_statistics(stats: &StoreStatistics, target: u64) {
    println!("=== Store Statistics ===\n");

    println!("Overview:");
    println!("  Rows: {}", stats.rows);
    println!("  Unique ids: {}", stats.unique_ids);
    println!("  Duplicate ids: {}", stats.duplicate_ids);
    println!("  Rows without an id: {}", stats.rows_without_id);
    println!("  Mean abstract length: {:.0} chars", stats.mean_abstract_chars);
    println!();

    if !stats.labels.is_empty() {
        println!("Labels:");
        for (label, count) in &stats.labels {
            println!("  {}: {}", label, count);
        }
        println!();
    }

    let progress = if target > 0 {
        (stats.unique_ids as f64 / target as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Progress: {:.1}% ({} / {} unique records)",
        progress.min(100.0),
        stats.unique_ids,
        target
    );
}
