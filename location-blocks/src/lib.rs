//! Location Blocks Library
//!
//! Closure-based callbacks for single-delegate location services.
//!
//! # Architecture
//!
//! A location service talks to exactly one delegate. This library provides an
//! adapter that takes that delegate slot and turns it into:
//! - one callback slot per event kind (location batch, authorization change,
//!   region enter/exit, region monitoring start/failure, heading update,
//!   calibration display query)
//! - a filtered "combined update" callback that receives one fix at a time and
//!   decides when to stop tracking
//!
//! Filtering applies only to the combined path: a fix must be fresh enough
//! (maximum age) and must either be more precise than the last delivered fix or
//! lie at least the accuracy threshold away from it.
//!
//! The library does NOT:
//! - Produce location fixes (the service does)
//! - Prompt for permissions
//! - Retry failed updates
//!
//! # Example Usage
//!
//! ```no_run
//! use location_blocks::{FilterPolicy, LocationBlocks, LocationService, UpdateControl};
//! use std::rc::Rc;
//!
//! fn track<S: LocationService + 'static>(service: Rc<S>) {
//!     let blocks = LocationBlocks::attach(&service);
//!     let mut blocks = blocks.borrow_mut();
//!
//!     blocks.set_filter_policy(
//!         FilterPolicy::new()
//!             .with_accuracy_filter(50.0)
//!             .with_age_filter(5.0),
//!     );
//!
//!     blocks.on_authorization_changed(|status| println!("Authorization: {}", status));
//!
//!     blocks.start_tracking(|update| match update {
//!         Ok(location) => {
//!             println!("Fix at {} (±{} m)", location.coordinate, location.horizontal_accuracy);
//!             // Stop once the fix is good enough
//!             (location.horizontal_accuracy <= 10.0).into()
//!         }
//!         Err(e) => {
//!             eprintln!("Location error: {}", e);
//!             UpdateControl::Continue
//!         }
//!     });
//! }
//! ```

// Public modules
pub mod adapter;
pub mod config;
pub mod filter;
pub mod registry;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use adapter::{Clock, LocationBlocks, TrackingState};
pub use config::{FilterPolicy, LOCATION_AGE_FILTER_NONE, UPDATE_ACCURACY_FILTER_NONE};
pub use filter::{LastAcceptedReading, Rejection, UpdateFilter};
pub use registry::{Callback, CallbackRegistry, NotificationKind};
pub use service::{is_location_updates_available, LocationDelegate, LocationService};
pub use types::{
    AuthorizationStatus, BlocksError, Coordinate, Heading, Location, Region, Result,
    ServiceError, Timestamp, UpdateControl,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: default policy lets everything through
        let policy = FilterPolicy::default();
        assert!(!policy.accuracy_filter_enabled());
        assert!(!policy.age_filter_enabled());
        assert!(!VERSION.is_empty());
    }
}
