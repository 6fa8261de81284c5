//! Filter configuration types
//!
//! This module defines the two tuning values the adapter applies to
//! combined location updates. Each is a plain `f64`; a sentinel value turns the
//! corresponding filter off. By default both filters are off and every update
//! passes.

use crate::types::{BlocksError, Result};
use serde::{Deserialize, Serialize};

/// Accuracy filter value that disables the accuracy filter
pub const UPDATE_ACCURACY_FILTER_NONE: f64 = f64::INFINITY;

/// Age filter value that disables the age filter
pub const LOCATION_AGE_FILTER_NONE: f64 = f64::INFINITY;

/// Disabled filters serialize as `null` and read back as the sentinel
///
/// JSON has no infinity, so without this a default policy would not survive
/// a round trip.
mod sentinel {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        let value = if value.is_infinite() && value.is_sign_positive() {
            None
        } else {
            Some(*value)
        };
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// Filtering policy for combined location updates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Minimum distance in meters a fix must move from the last delivered
    /// fix to be delivered, unless its accuracy improved
    #[serde(default = "default_accuracy_filter", with = "sentinel")]
    pub min_accuracy_improvement_m: f64,

    /// Maximum age in seconds a fix may have to be delivered
    #[serde(default = "default_age_filter", with = "sentinel")]
    pub max_age_s: f64,
}

fn default_accuracy_filter() -> f64 {
    UPDATE_ACCURACY_FILTER_NONE
}

fn default_age_filter() -> f64 {
    LOCATION_AGE_FILTER_NONE
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            min_accuracy_improvement_m: UPDATE_ACCURACY_FILTER_NONE,
            max_age_s: LOCATION_AGE_FILTER_NONE,
        }
    }
}

impl FilterPolicy {
    /// Create a policy with both filters disabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the accuracy improvement threshold in meters
    pub fn with_accuracy_filter(mut self, meters: f64) -> Self {
        self.min_accuracy_improvement_m = meters;
        self
    }

    /// Builder method: set the maximum fix age in seconds
    pub fn with_age_filter(mut self, seconds: f64) -> Self {
        self.max_age_s = seconds;
        self
    }

    pub fn accuracy_filter_enabled(&self) -> bool {
        self.min_accuracy_improvement_m != UPDATE_ACCURACY_FILTER_NONE
    }

    pub fn age_filter_enabled(&self) -> bool {
        self.max_age_s != LOCATION_AGE_FILTER_NONE
    }

    /// Check that both thresholds are real numbers
    ///
    /// Negative thresholds are allowed; they simply can never be satisfied.
    pub fn validate(&self) -> Result<()> {
        if self.min_accuracy_improvement_m.is_nan() {
            return Err(BlocksError::InvalidConfiguration(
                "accuracy filter is NaN".to_string(),
            ));
        }
        if self.max_age_s.is_nan() {
            return Err(BlocksError::InvalidConfiguration(
                "age filter is NaN".to_string(),
            ));
        }
        Ok(())
    }
}
