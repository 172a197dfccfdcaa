//! Randomised waits
//!
//! Every sleep in the crawler goes through [`pause`], which samples a uniform
//! duration from a [`DelayBounds`] and applies the configured scale.

use std::time::Duration;

/// Inclusive bounds for a uniformly sampled delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayBounds {
    pub min: Duration,
    pub max: Duration,
}

impl DelayBounds {
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const fn secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    /// Draws a duration in `[min, max]`
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let span = self.max - self.min;
        self.min + span.mul_f64(fastrand::f64())
    }
}

/// Sleeps for a sampled duration multiplied by `scale`
pub async fn pause(bounds: DelayBounds, scale: f64) {
    let delay = scaled(bounds.sample(), scale);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn scaled(delay: Duration, scale: f64) -> Duration {
    if scale <= 0.0 || !scale.is_finite() {
        Duration::ZERO
    } else {
        delay.mul_f64(scale)
    }
}
