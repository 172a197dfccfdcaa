//! Opt-in switch for network harvesting
//!
//! Harvesting is off unless the operator sets the environment variable to the
//! exact enabling value.

use crate::HarvestError;

/// Environment variable that enables harvesting
pub const HARVEST_ENABLE_VAR: &str = "ARXIV_HARVEST_ALLOW";

/// The only value that enables harvesting
pub const HARVEST_ENABLE_VALUE: &str = "1";

/// Returns true when `value` is exactly the enabling value
pub fn harvest_allowed(value: Option<&str>) -> bool {
    value == Some(HARVEST_ENABLE_VALUE)
}

/// Checks the process environment
pub fn ensure_harvest_allowed() -> Result<(), HarvestError> {
    let value = std::env::var(HARVEST_ENABLE_VAR).ok();
    if harvest_allowed(value.as_deref()) {
        Ok(())
    } else {
        Err(HarvestError::Disabled {
            var: HARVEST_ENABLE_VAR,
        })
    }
}
