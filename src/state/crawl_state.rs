use std::collections::HashSet;

/// Deduplication set and quota bookkeeping for one run
///
/// The identifier set is the single source of truth for deduplication. Ids are
/// only ever added through [`CrawlState::claim`], which also advances the
/// collected count, so `collected == seen.len() - preexisting` always holds.
#[derive(Debug, Clone)]
pub struct CrawlState {
    seen_ids: HashSet<String>,
    preexisting: u64,
    collected: u64,
    target: u64,
}

impl CrawlState {
    /// Seeds the state from identifiers already present in the output store
    pub fn new(existing_ids: HashSet<String>, target: u64) -> Self {
        let preexisting = existing_ids.len() as u64;
        Self {
            seen_ids: existing_ids,
            preexisting,
            collected: 0,
            target,
        }
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    /// Number of identifiers loaded from the store at startup
    pub fn preexisting(&self) -> u64 {
        self.preexisting
    }

    /// Number of new records claimed during this run
    pub fn collected(&self) -> u64 {
        self.collected
    }

    /// Running total of unique records, old and new
    pub fn total(&self) -> u64 {
        self.preexisting + self.collected
    }

    /// Records still needed to reach the target
    pub fn remaining(&self) -> u64 {
        self.target.saturating_sub(self.total())
    }

    pub fn is_complete(&self) -> bool {
        self.total() >= self.target
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    /// Inserts `id` if unseen and counts it as collected
    ///
    /// Returns false, changing nothing, when the id is already known.
    pub fn claim(&mut self, id: &str) -> bool {
        if self.seen_ids.contains(id) {
            return false;
        }
        self.seen_ids.insert(id.to_string());
        self.collected += 1;
        true
    }
}
