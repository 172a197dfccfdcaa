//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the deduplication set plus the running quota counters for
//!   one run. It is created from the output store at startup and never
//!   persisted itself.

mod crawl_state;

pub use crawl_state::CrawlState;
