//! Location update filter
//!
//! Decides which fixes reach the combined-update callback. A fix is rejected
//! when it is older than the age threshold, or when it is neither more precise
//! than the last delivered fix nor at least the accuracy threshold away from it.

use crate::config::FilterPolicy;
use crate::types::{Coordinate, Location, Timestamp};

/// The most recent fix that passed the filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastAcceptedReading {
    pub coordinate: Coordinate,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    pub timestamp: Timestamp,
}

impl From<&Location> for LastAcceptedReading {
    fn from(location: &Location) -> Self {
        Self {
            coordinate: location.coordinate,
            accuracy: location.horizontal_accuracy,
            timestamp: location.timestamp,
        }
    }
}

/// Why a fix did not pass the filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Fix is older than the age threshold
    Stale { age_s: f64 },
    /// Fix is no more precise than the last delivered one and moved less
    /// than the threshold
    NoImprovement {
        accuracy: f64,
        last_accuracy: f64,
        distance_m: f64,
    },
    /// Fix carries a negative accuracy while the accuracy filter is on
    Invalid { accuracy: f64 },
}

/// Filter state: the policy plus the last accepted reading
#[derive(Debug, Clone, Default)]
pub struct UpdateFilter {
    policy: FilterPolicy,
    last_accepted: Option<LastAcceptedReading>,
}

impl UpdateFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        Self {
            policy,
            last_accepted: None,
        }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Replace the policy; the last accepted reading is kept
    pub fn set_policy(&mut self, policy: FilterPolicy) {
        self.policy = policy;
    }

    pub fn policy_mut(&mut self) -> &mut FilterPolicy {
        &mut self.policy
    }

    pub fn last_accepted(&self) -> Option<&LastAcceptedReading> {
        self.last_accepted.as_ref()
    }

    /// Forget the last accepted reading
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    /// Run the acceptance algorithm for one fix
    ///
    /// On acceptance the fix becomes the new last accepted reading.
    pub fn check(&mut self, location: &Location, now: Timestamp) -> Result<(), Rejection> {
        if self.policy.age_filter_enabled() {
            let age_s = location.age_seconds(now);
            if age_s > self.policy.max_age_s {
                return Err(Rejection::Stale { age_s });
            }
        }

        if self.policy.accuracy_filter_enabled() {
            let accuracy = location.horizontal_accuracy;
            if !location.is_valid() {
                return Err(Rejection::Invalid { accuracy });
            }

            if let Some(last) = &self.last_accepted {
                let threshold = self.policy.min_accuracy_improvement_m;
                let distance_m = last.coordinate.distance_to(&location.coordinate);
                let improved = accuracy < last.accuracy;
                // Negative thresholds can never be met
                let moved = threshold >= 0.0 && distance_m >= threshold;
                if !improved && !moved {
                    return Err(Rejection::NoImprovement {
                        accuracy,
                        last_accuracy: last.accuracy,
                        distance_m,
                    });
                }
            }
        }

        self.last_accepted = Some(LastAcceptedReading::from(location));
        Ok(())
    }

    /// Convenience wrapper around [`UpdateFilter::check`]
    pub fn accept(&mut self, location: &Location, now: Timestamp) -> bool {
        self.check(location, now).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn fix(accuracy: f64, secs: i64) -> Location {
        Location::new(Coordinate::new(59.91, 10.75), accuracy, at(secs))
    }

    fn fix_at(latitude: f64, accuracy: f64) -> Location {
        Location::new(Coordinate::new(latitude, 10.75), accuracy, at(0))
    }

    #[test]
    fn test_no_filters_accept_everything() {
        let mut filter = UpdateFilter::default();
        for accuracy in [100.0, 200.0, 5.0, 5000.0] {
            assert!(filter.accept(&fix(accuracy, -3600), at(0)));
        }
        assert_eq!(filter.last_accepted().unwrap().accuracy, 5000.0);
    }

    #[test]
    fn test_age_filter() {
        let mut filter = UpdateFilter::new(FilterPolicy::new().with_age_filter(5.0));

        assert_eq!(
            filter.check(&fix(10.0, 0), at(10)),
            Err(Rejection::Stale { age_s: 10.0 })
        );
        assert!(filter.last_accepted().is_none());

        // Exactly at the threshold still passes
        assert!(filter.accept(&fix(10.0, 5), at(10)));
        // Future timestamps have negative age
        assert!(filter.accept(&fix(10.0, 20), at(10)));
    }

    #[test]
    fn test_accuracy_filter_sequence() {
        let mut filter = UpdateFilter::new(FilterPolicy::new().with_accuracy_filter(50.0));

        let delivered: Vec<f64> = [100.0, 60.0, 40.0, 45.0]
            .into_iter()
            .filter(|accuracy| filter.accept(&fix(*accuracy, 0), at(0)))
            .collect();

        assert_eq!(delivered, vec![100.0, 60.0, 40.0]);
        assert_eq!(filter.last_accepted().unwrap().accuracy, 40.0);
    }

    #[test]
    fn test_accuracy_filter_rejects_worse_reading() {
        let mut filter = UpdateFilter::new(FilterPolicy::new().with_accuracy_filter(50.0));
        assert!(filter.accept(&fix(80.0, 0), at(0)));
        assert_eq!(
            filter.check(&fix(90.0, 0), at(0)),
            Err(Rejection::NoImprovement {
                accuracy: 90.0,
                last_accuracy: 80.0,
                distance_m: 0.0
            })
        );
        // Equal accuracy without movement is not an improvement
        assert!(!filter.accept(&fix(80.0, 0), at(0)));
        // Precise but stationary fixes are not repeated
        assert!(filter.accept(&fix(10.0, 0), at(0)));
        assert!(!filter.accept(&fix(30.0, 0), at(0)));
    }

    #[test]
    fn test_movement_beyond_threshold_accepted() {
        let mut filter = UpdateFilter::new(FilterPolicy::new().with_accuracy_filter(50.0));
        assert!(filter.accept(&fix_at(59.910, 40.0), at(0)));

        // ~22 m north, worse accuracy: not enough movement
        assert!(!filter.accept(&fix_at(59.9102, 80.0), at(0)));
        // ~111 m north, worse accuracy: moved far enough
        assert!(filter.accept(&fix_at(59.911, 80.0), at(0)));
        assert_eq!(filter.last_accepted().unwrap().accuracy, 80.0);
    }

    #[test]
    fn test_invalid_fix_never_becomes_last_reading() {
        let mut filter = UpdateFilter::new(FilterPolicy::new().with_accuracy_filter(50.0));
        assert!(filter.accept(&fix(60.0, 0), at(0)));
        assert_eq!(
            filter.check(&fix(-1.0, 0), at(0)),
            Err(Rejection::Invalid { accuracy: -1.0 })
        );
        assert_eq!(filter.last_accepted().unwrap().accuracy, 60.0);
        assert!(filter.accept(&fix(55.0, 0), at(0)));

        // Without the accuracy filter invalid fixes pass through untouched
        let mut open = UpdateFilter::default();
        assert!(open.accept(&fix(-1.0, 0), at(0)));
    }

    #[test]
    fn test_negative_accuracy_threshold_needs_improvement() {
        let mut filter = UpdateFilter::new(FilterPolicy::new().with_accuracy_filter(-1.0));
        assert!(filter.accept(&fix(30.0, 0), at(0)));
        assert!(!filter.accept(&fix(30.0, 0), at(0)));
        assert!(filter.accept(&fix(29.0, 0), at(0)));
    }

    #[test]
    fn test_reset_forgets_last_reading() {
        let mut filter = UpdateFilter::new(FilterPolicy::new().with_accuracy_filter(50.0));
        assert!(filter.accept(&fix(60.0, 0), at(0)));
        assert!(!filter.accept(&fix(70.0, 0), at(0)));
        filter.reset();
        assert!(filter.accept(&fix(70.0, 0), at(0)));
    }
}
