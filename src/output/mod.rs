//! Output module for run summaries and store reports
//!
//! This module handles:
//! - Summarising an existing output store (`--stats`)
//! - Rendering the report of a finished crawl run

pub mod stats;

pub use stats::{compute_statistics, load_statistics, print_statistics, StoreStatistics};

use crate::crawler::CrawlReport;

/// Prints a finished run's report to stdout
///
/// # Arguments
///
/// * `report` - The report returned by the orchestrator
pub fn print_report(report: &CrawlReport) {
    println!("=== Harvest Summary ===\n");
    println!("Outcome: {}", report.outcome);
    println!(
        "Records: {} new, {} existing, {} / {} total",
        report.new_records,
        report.preexisting,
        report.total(),
        report.target
    );
    println!(
        "Categories: {} visited, {} abandoned",
        report.categories_visited, report.categories_abandoned
    );
    println!("Session rebuilds: {}", report.session_rotations);
    println!("Saves: {}", report.flushes);

    let seconds = report.duration().num_seconds();
    println!(
        "Duration: {}h {:02}m {:02}s",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    );
}
