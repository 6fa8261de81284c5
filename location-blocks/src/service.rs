//! Location service boundary
//!
//! The location service itself is an external collaborator. [`LocationService`]
//! is what the adapter calls into; [`LocationDelegate`] is what the service
//! calls back with events. A service holds exactly one delegate at a time.

use crate::types::{AuthorizationStatus, Heading, Location, Region, ServiceError};
use std::cell::RefCell;
use std::rc::Rc;

/// Requests the adapter can make of a location service
///
/// Methods take `&self`: the service is shared behind an `Rc` and is expected
/// to use interior mutability for its own state.
pub trait LocationService {
    /// Install the single delegate, replacing any previous one
    fn set_delegate(&self, delegate: Rc<RefCell<dyn LocationDelegate>>);

    /// Begin producing location updates
    fn request_start(&self);

    /// Stop producing location updates
    ///
    /// Events already in flight may still be delivered afterwards.
    fn request_stop(&self);

    /// Current authorization status
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Whether location services are enabled on this platform
    fn location_services_enabled(&self) -> bool;
}

/// Events a location service delivers to its delegate
///
/// All events arrive on the thread the delegate was installed from. A service
/// must not call back into its delegate while a delegate method is running.
pub trait LocationDelegate {
    fn handle_location_batch(&mut self, locations: &[Location]);

    fn handle_location_failure(&mut self, error: &ServiceError);

    fn handle_authorization_change(&mut self, status: AuthorizationStatus);

    fn handle_region_entered(&mut self, region: &Region);

    fn handle_region_exited(&mut self, region: &Region);

    fn handle_region_monitoring_failed(&mut self, region: &Region, error: &ServiceError);

    fn handle_region_monitoring_started(&mut self, region: &Region);

    fn handle_heading_update(&mut self, heading: &Heading);

    /// Return true to show the heading calibration display
    fn handle_calibration_query(&mut self) -> bool;
}

/// Check that location services are enabled and the user granted access
///
/// Reads live state from the service on every call.
pub fn is_location_updates_available<S: LocationService + ?Sized>(service: &S) -> bool {
    service.location_services_enabled() && service.authorization_status().is_authorized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct StaticService {
        enabled: Cell<bool>,
        status: Cell<AuthorizationStatus>,
    }

    impl LocationService for StaticService {
        fn set_delegate(&self, _delegate: Rc<RefCell<dyn LocationDelegate>>) {}
        fn request_start(&self) {}
        fn request_stop(&self) {}
        fn authorization_status(&self) -> AuthorizationStatus {
            self.status.get()
        }
        fn location_services_enabled(&self) -> bool {
            self.enabled.get()
        }
    }

    #[test]
    fn test_updates_available_reflects_live_state() {
        let service = StaticService {
            enabled: Cell::new(true),
            status: Cell::new(AuthorizationStatus::NotDetermined),
        };
        assert!(!is_location_updates_available(&service));

        service.status.set(AuthorizationStatus::AuthorizedWhenInUse);
        assert!(is_location_updates_available(&service));

        service.enabled.set(false);
        assert!(!is_location_updates_available(&service));

        service.enabled.set(true);
        service.status.set(AuthorizationStatus::Denied);
        assert!(!is_location_updates_available(&service));
    }
}
