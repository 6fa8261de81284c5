//! Core types for the location blocks library
//!
//! This module defines the values that flow between a location service and the
//! adapter: position fixes, headings, monitored regions and authorization
//! states, plus the error types. The service produces these, the adapter routes
//! them, and client callbacks consume them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, BlocksError>;

/// A geographic coordinate in degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to +90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to +180)
    pub longitude: f64,
}

/// Mean Earth radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle (haversine) distance to `other` in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// One reported position fix
///
/// The lower the accuracy value in meters, the more precise the fix is.
/// A negative accuracy marks an invalid fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Reported position
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius in meters
    pub horizontal_accuracy: f64,
    /// Altitude in meters above sea level (if known)
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Ground speed in meters per second (if known)
    #[serde(default)]
    pub speed: Option<f64>,
    /// Course over ground in degrees (if known)
    #[serde(default)]
    pub course: Option<f64>,
    /// When the service determined this fix
    pub timestamp: Timestamp,
}

impl Location {
    /// Create a fix with only the fields the filters look at
    pub fn new(coordinate: Coordinate, horizontal_accuracy: f64, timestamp: Timestamp) -> Self {
        Self {
            coordinate,
            horizontal_accuracy,
            altitude: None,
            speed: None,
            course: None,
            timestamp,
        }
    }

    /// Age of this fix in seconds relative to `now`
    ///
    /// Fixes stamped in the future have a negative age.
    pub fn age_seconds(&self, now: Timestamp) -> f64 {
        let elapsed = now.signed_duration_since(self.timestamp);
        match elapsed.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            // Out of microsecond range (~292k years)
            None => elapsed.num_seconds() as f64,
        }
    }

    /// True if the service marked this fix as invalid
    pub fn is_valid(&self) -> bool {
        self.horizontal_accuracy >= 0.0
    }
}

/// A compass heading reading, independent of position fixes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading relative to magnetic north in degrees (0-360)
    pub magnetic_heading: f64,
    /// Heading relative to true north in degrees; negative if unavailable
    pub true_heading: f64,
    /// Maximum deviation in degrees; negative means invalid
    pub heading_accuracy: f64,
    pub timestamp: Timestamp,
}

/// A circular geofence monitored by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Client-chosen identifier
    pub identifier: String,
    /// Center of the region
    pub center: Coordinate,
    /// Radius in meters
    pub radius: f64,
}

impl Region {
    pub fn new(identifier: impl Into<String>, center: Coordinate, radius: f64) -> Self {
        Self {
            identifier: identifier.into(),
            center,
            radius,
        }
    }
}

/// Authorization state reported by the location service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    NotDetermined,
    /// Location access is restricted (e.g. parental controls)
    Restricted,
    /// The user denied location access
    Denied,
    /// Access granted at any time
    AuthorizedAlways,
    /// Access granted while the client is in use
    AuthorizedWhenInUse,
}

impl AuthorizationStatus {
    /// True for either of the granted states
    pub fn is_authorized(self) -> bool {
        matches!(
            self,
            AuthorizationStatus::AuthorizedAlways | AuthorizationStatus::AuthorizedWhenInUse
        )
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationStatus::NotDetermined => write!(f, "NotDetermined"),
            AuthorizationStatus::Restricted => write!(f, "Restricted"),
            AuthorizationStatus::Denied => write!(f, "Denied"),
            AuthorizationStatus::AuthorizedAlways => write!(f, "AuthorizedAlways"),
            AuthorizationStatus::AuthorizedWhenInUse => write!(f, "AuthorizedWhenInUse"),
        }
    }
}

/// Error reported by the location service
///
/// Opaque to the adapter: it is forwarded verbatim to the registered callback
/// and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("location service error {code}: {message}")]
pub struct ServiceError {
    /// Service-specific error code
    pub code: i64,
    /// Human readable description
    pub message: String,
}

impl ServiceError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors raised by the library itself
#[derive(Debug, thiserror::Error)]
pub enum BlocksError {
    #[error("Invalid filter configuration: {0}")]
    InvalidConfiguration(String),
}

/// What a combined-update callback wants after seeing an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateControl {
    /// Keep receiving updates
    #[default]
    Continue,
    /// Stop location updates
    Stop,
}

impl UpdateControl {
    pub fn is_stop(self) -> bool {
        self == UpdateControl::Stop
    }
}

impl From<bool> for UpdateControl {
    /// `true` means "stop requested"
    fn from(stop: bool) -> Self {
        if stop {
            UpdateControl::Stop
        } else {
            UpdateControl::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_location_age() {
        let fix = Location::new(Coordinate::new(59.91, 10.75), 10.0, at(0));
        assert_eq!(fix.age_seconds(at(10)), 10.0);
        assert_eq!(fix.age_seconds(at(0)), 0.0);
        assert_eq!(fix.age_seconds(at(0) - Duration::milliseconds(1500)), -1.5);
    }

    #[test]
    fn test_location_validity() {
        let mut fix = Location::new(Coordinate::new(0.0, 0.0), 5.0, at(0));
        assert!(fix.is_valid());
        fix.horizontal_accuracy = -1.0;
        assert!(!fix.is_valid());
    }

    #[test]
    fn test_authorization_status() {
        assert!(AuthorizationStatus::AuthorizedAlways.is_authorized());
        assert!(AuthorizationStatus::AuthorizedWhenInUse.is_authorized());
        assert!(!AuthorizationStatus::Denied.is_authorized());
        assert!(!AuthorizationStatus::NotDetermined.is_authorized());
        assert_eq!(format!("{}", AuthorizationStatus::Restricted), "Restricted");
    }

    #[test]
    fn test_update_control_from_bool() {
        assert_eq!(UpdateControl::from(true), UpdateControl::Stop);
        assert_eq!(UpdateControl::from(false), UpdateControl::Continue);
        assert_eq!(UpdateControl::default(), UpdateControl::Continue);
    }

    #[test]
    fn test_service_error_display() {
        let err = ServiceError::new(1, "denied");
        assert_eq!(format!("{}", err), "location service error 1: denied");
    }

    #[test]
    fn test_coordinate_distance() {
        let oslo = Coordinate::new(59.9139, 10.7522);
        assert_eq!(oslo.distance_to(&oslo), 0.0);

        // One thousandth of a degree of latitude is ~111 m
        let north = Coordinate::new(59.9149, 10.7522);
        let d = oslo.distance_to(&north);
        assert!((d - 111.2).abs() < 0.5, "distance was {}", d);
        assert_eq!(d, north.distance_to(&oslo));

        // Oslo to Bergen is roughly 305 km
        let bergen = Coordinate::new(60.3913, 5.3221);
        let d = oslo.distance_to(&bergen);
        assert!((d - 305_000.0).abs() < 5_000.0, "distance was {}", d);
    }
}
