//! Configuration module for the harvester
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus the environment switch that must be set before any harvesting
//! happens.
//!
//! # Example
//!
//! ```no_run
//! use arxiv_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting up to {} records", config.crawler.target);
//! ```

mod gate;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, DEFAULT_BASE_URL, DEFAULT_CATEGORIES,
    DEFAULT_LICENSE,
};

// Re-export parser functions
pub use gate::{ensure_harvest_allowed, harvest_allowed, HARVEST_ENABLE_VALUE, HARVEST_ENABLE_VAR};
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
