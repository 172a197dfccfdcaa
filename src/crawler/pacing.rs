//! Quota-driven pacing policy
//!
//! The scan plan for a category is a pure function of how many records are
//! still needed. The less that remains, the smaller the step, the shorter the
//! delays and the quicker a barren offset range is abandoned.
//!
//! | tier | remaining | step | tolerance | delay (s) |
//! |------|-----------|------|-----------|-----------|
//! | Final | <= 40 | 25 | 1 | 0.05-0.1 |
//! | Ultra | <= 50 | 5 | 1 | 0.2-0.4 |
//! | Fast | <= 100 | 10 | 2 | 0.5-1.0 |
//! | Reduced | < 500 | 25 | 2 | 1.0-2.0 |
//! | Standard | otherwise | 50 | 10 | 1.5-3.0 |
//!
//! A resumed run with the same remaining count gets exactly the same plan.

use crate::crawler::delay::DelayBounds;
use std::fmt;

/// Deepest offset scanned by the wider tiers
pub const MAX_OFFSET: u64 = 5000;

/// Offset past which the Standard tier abandons a range that yields nothing new
pub const STANDARD_STALE_OFFSET: u64 = 1000;

/// Named pacing tiers, most aggressive first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    Final,
    Ultra,
    Fast,
    Reduced,
    Standard,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Final => "final",
            Self::Ultra => "ultra",
            Self::Fast => "fast",
            Self::Reduced => "reduced",
            Self::Standard => "standard",
        };
        f.write_str(name)
    }
}

/// What a page that parses but yields nothing new does to the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePagePolicy {
    /// Counts toward the range's empty-page tolerance
    CountTowardTolerance,
    /// Abandons the range once the offset is beyond the given value
    AbandonPast(u64),
}

/// A stepped run of listing offsets
///
/// Ascending ranges run from `start` up to `stop` (exclusive); descending
/// ranges run from `start` down to `stop` (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRange {
    start: u64,
    stop: u64,
    step: u64,
    descending: bool,
}

impl OffsetRange {
    pub const fn ascending(start: u64, stop: u64, step: u64) -> Self {
        Self {
            start,
            stop,
            step,
            descending: false,
        }
    }

    pub const fn descending(start: u64, stop: u64, step: u64) -> Self {
        Self {
            start,
            stop,
            step,
            descending: true,
        }
    }

    pub fn offsets(&self) -> OffsetIter {
        OffsetIter {
            range: *self,
            next: Some(self.start),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for OffsetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{}>{} step {}", self.start, self.stop, self.step)
        } else {
            write!(f, "{}..{} step {}", self.start, self.stop, self.step)
        }
    }
}

/// Iterator over the offsets of an [`OffsetRange`]
#[derive(Debug, Clone)]
pub struct OffsetIter {
    range: OffsetRange,
    next: Option<u64>,
}

impl Iterator for OffsetIter {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let current = self.next?;
        let in_range = if self.range.descending {
            current > self.range.stop
        } else {
            current < self.range.stop
        };

        if !in_range || self.range.step == 0 {
            self.next = None;
            return None;
        }

        self.next = if self.range.descending {
            current.checked_sub(self.range.step)
        } else {
            current.checked_add(self.range.step)
        };
        Some(current)
    }
}

/// Scan parameters selected for one category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingTier {
    pub kind: TierKind,
    pub offset_ranges: Vec<OffsetRange>,
    pub step_size: u64,
    pub empty_page_tolerance: u32,
    pub delay: DelayBounds,
    pub stale_pages: StalePagePolicy,
}

/// Selects the pacing tier for the number of records still needed
///
/// # Example
///
/// ```
/// use arxiv_harvest::crawler::{tier_for, TierKind};
///
/// assert_eq!(tier_for(40).kind, TierKind::Final);
/// assert_eq!(tier_for(41).kind, TierKind::Ultra);
/// assert_eq!(tier_for(3000).kind, TierKind::Standard);
/// ```
pub fn tier_for(remaining_needed: u64) -> PacingTier {
    if remaining_needed <= 40 {
        PacingTier {
            kind: TierKind::Final,
            offset_ranges: vec![OffsetRange::ascending(0, 500, 25)],
            step_size: 25,
            empty_page_tolerance: 1,
            delay: DelayBounds::millis(50, 100),
            stale_pages: StalePagePolicy::CountTowardTolerance,
        }
    } else if remaining_needed <= 50 {
        let step = 5;
        PacingTier {
            kind: TierKind::Ultra,
            offset_ranges: vec![
                OffsetRange::ascending(0, 5000, step),
                OffsetRange::ascending(5000, 10000, step),
                OffsetRange::ascending(10000, 15000, step),
                OffsetRange::descending(15000 - step, 0, step),
                OffsetRange::ascending(0, 1000, step),
                OffsetRange::ascending(100, 1500, step),
                OffsetRange::ascending(200, 2000, step),
                OffsetRange::ascending(500, 2500, step),
                OffsetRange::ascending(1000, 3500, step),
                OffsetRange::ascending(2000, 4500, step),
                OffsetRange::ascending(3000, 5500, step),
                OffsetRange::ascending(4000, 6500, step),
            ],
            step_size: step,
            empty_page_tolerance: 1,
            delay: DelayBounds::millis(200, 400),
            stale_pages: StalePagePolicy::CountTowardTolerance,
        }
    } else if remaining_needed <= 100 {
        let step = 10;
        PacingTier {
            kind: TierKind::Fast,
            offset_ranges: vec![
                OffsetRange::ascending(0, 3000, step),
                OffsetRange::ascending(3000, 6000, step),
                OffsetRange::ascending(6000, 10000, step),
                OffsetRange::descending(10000 - step, 0, step),
                OffsetRange::ascending(100, 2000, step),
                OffsetRange::ascending(500, 2500, step),
                OffsetRange::ascending(1000, 3500, step),
            ],
            step_size: step,
            empty_page_tolerance: 2,
            delay: DelayBounds::millis(500, 1000),
            stale_pages: StalePagePolicy::CountTowardTolerance,
        }
    } else if remaining_needed < 500 {
        let step = 25;
        PacingTier {
            kind: TierKind::Reduced,
            offset_ranges: vec![
                OffsetRange::ascending(0, 2000, step),
                OffsetRange::ascending(2000, 4000, step),
                OffsetRange::ascending(4000, MAX_OFFSET, step),
                OffsetRange::descending(MAX_OFFSET - step, 0, step),
            ],
            step_size: step,
            empty_page_tolerance: 2,
            delay: DelayBounds::millis(1000, 2000),
            stale_pages: StalePagePolicy::CountTowardTolerance,
        }
    } else {
        let step = 50;
        PacingTier {
            kind: TierKind::Standard,
            offset_ranges: vec![OffsetRange::ascending(0, MAX_OFFSET, step)],
            step_size: step,
            empty_page_tolerance: 10,
            delay: DelayBounds::millis(1500, 3000),
            stale_pages: StalePagePolicy::AbandonPast(STANDARD_STALE_OFFSET),
        }
    }
}
