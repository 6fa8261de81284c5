//! Delegate-to-callback adapter
//!
//! [`LocationBlocks`] installs itself as the sole delegate of a location
//! service and fans each delegate event out to the callback registered for it.
//! Location updates travel two paths:
//!
//! - the raw batch callback sees every batch unfiltered, tracking or not
//! - the combined-update callback installed by [`LocationBlocks::start_tracking`]
//!   sees one fix at a time, after the [`UpdateFilter`] accepted it, and returns
//!   an [`UpdateControl`] to keep going or stop
//!
//! The adapter holds only a weak reference to its service, so it never keeps
//! the service alive.

use crate::config::FilterPolicy;
use crate::filter::{LastAcceptedReading, Rejection, UpdateFilter};
use crate::registry::{Callback, CallbackRegistry, NotificationKind};
use crate::service::{is_location_updates_available, LocationDelegate, LocationService};
use crate::types::{
    AuthorizationStatus, Heading, Location, Region, ServiceError, Timestamp, UpdateControl,
};
use chrono::Utc;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Tracking state of the combined-update path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    /// Not delivering combined updates
    #[default]
    Idle,
    /// Combined updates are flowing
    Tracking,
}

/// Source of "now" for the age filter
pub type Clock = Box<dyn Fn() -> Timestamp>;

/// Closure-based front end for a single-delegate location service
pub struct LocationBlocks<S: LocationService + ?Sized> {
    /// Back-reference to the adapted service
    service: Weak<S>,
    registry: CallbackRegistry,
    filter: UpdateFilter,
    state: TrackingState,
    clock: Clock,
}

impl<S: LocationService + ?Sized + 'static> LocationBlocks<S> {
    /// Create an adapter and install it as the service's delegate
    ///
    /// Any delegate the service had before is replaced. The returned handle
    /// is shared with the service; the adapter itself only keeps a weak
    /// reference to the service.
    pub fn attach(service: &Rc<S>) -> Rc<RefCell<Self>> {
        let adapter = Rc::new(RefCell::new(Self {
            service: Rc::downgrade(service),
            registry: CallbackRegistry::new(),
            filter: UpdateFilter::default(),
            state: TrackingState::Idle,
            clock: Box::new(Utc::now),
        }));
        service.set_delegate(adapter.clone());
        log::debug!("Location blocks adapter attached");
        adapter
    }
}

impl<S: LocationService + ?Sized> LocationBlocks<S> {
    /// Check that location services are enabled and access was granted
    pub fn is_location_updates_available(service: &S) -> bool {
        is_location_updates_available(service)
    }

    /// The adapted service, if it is still alive
    pub fn service(&self) -> Option<Rc<S>> {
        self.service.upgrade()
    }

    /// Replace the clock used by the age filter
    pub fn set_clock<F>(&mut self, clock: F)
    where
        F: Fn() -> Timestamp + 'static,
    {
        self.clock = Box::new(clock);
    }

    pub fn filter_policy(&self) -> &FilterPolicy {
        self.filter.policy()
    }

    /// Replace both filter thresholds; takes effect with the next fix
    pub fn set_filter_policy(&mut self, policy: FilterPolicy) {
        log::debug!(
            "Filter policy set: accuracy={} m, max age={} s",
            policy.min_accuracy_improvement_m,
            policy.max_age_s
        );
        self.filter.set_policy(policy);
    }

    pub fn update_accuracy_filter(&self) -> f64 {
        self.filter.policy().min_accuracy_improvement_m
    }

    /// Set the accuracy improvement threshold in meters
    ///
    /// Pass [`crate::UPDATE_ACCURACY_FILTER_NONE`] to disable it.
    pub fn set_update_accuracy_filter(&mut self, meters: f64) {
        self.filter.policy_mut().min_accuracy_improvement_m = meters;
    }

    pub fn update_age_filter(&self) -> f64 {
        self.filter.policy().max_age_s
    }

    /// Set the maximum fix age in seconds
    ///
    /// Pass [`crate::LOCATION_AGE_FILTER_NONE`] to disable it.
    pub fn set_update_age_filter(&mut self, seconds: f64) {
        self.filter.policy_mut().max_age_s = seconds;
    }

    /// The last fix delivered to the combined-update callback
    pub fn last_accepted(&self) -> Option<&LastAcceptedReading> {
        self.filter.last_accepted()
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == TrackingState::Tracking
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Register a callback under its own kind, replacing any previous one
    pub fn register(&mut self, callback: Callback) {
        self.registry.register(callback);
    }

    /// Receive every location batch, unfiltered
    pub fn on_location_batch<F>(&mut self, callback: F)
    where
        F: FnMut(&[Location]) + 'static,
    {
        self.register(Callback::LocationBatch(Box::new(callback)));
    }

    pub fn on_authorization_changed<F>(&mut self, callback: F)
    where
        F: FnMut(AuthorizationStatus) + 'static,
    {
        self.register(Callback::AuthorizationChanged(Box::new(callback)));
    }

    pub fn on_region_entered<F>(&mut self, callback: F)
    where
        F: FnMut(&Region) + 'static,
    {
        self.register(Callback::RegionEntered(Box::new(callback)));
    }

    pub fn on_region_exited<F>(&mut self, callback: F)
    where
        F: FnMut(&Region) + 'static,
    {
        self.register(Callback::RegionExited(Box::new(callback)));
    }

    pub fn on_region_monitoring_failed<F>(&mut self, callback: F)
    where
        F: FnMut(&Region, &ServiceError) + 'static,
    {
        self.register(Callback::RegionMonitoringFailed(Box::new(callback)));
    }

    pub fn on_region_monitoring_started<F>(&mut self, callback: F)
    where
        F: FnMut(&Region) + 'static,
    {
        self.register(Callback::RegionMonitoringStarted(Box::new(callback)));
    }

    pub fn on_heading_updated<F>(&mut self, callback: F)
    where
        F: FnMut(&Heading) + 'static,
    {
        self.register(Callback::HeadingUpdated(Box::new(callback)));
    }

    /// Decide whether the heading calibration display is shown
    ///
    /// Without a callback the answer is `false`.
    pub fn on_calibration_display_query<F>(&mut self, callback: F)
    where
        F: FnMut() -> bool + 'static,
    {
        self.register(Callback::CalibrationDisplayQuery(Box::new(callback)));
    }

    /// Start location updates, delivering filtered fixes to `callback`
    ///
    /// Replaces any previous combined-update callback, forgets the last
    /// accepted fix and asks the service to start. Calling this while already
    /// tracking restarts the service with the new callback.
    ///
    /// The callback must not call back into the adapter; it returns
    /// [`UpdateControl::Stop`] to end tracking instead.
    pub fn start_tracking<F>(&mut self, callback: F)
    where
        F: FnMut(Result<&Location, &ServiceError>) -> UpdateControl + 'static,
    {
        self.register(Callback::CombinedUpdate(Box::new(callback)));
        self.filter.reset();

        match self.service.upgrade() {
            Some(service) => service.request_start(),
            None => log::warn!("Location service is gone, start request dropped"),
        }

        if self.state == TrackingState::Tracking {
            log::info!("Location tracking restarted");
        } else {
            log::info!("Location tracking started");
        }
        self.state = TrackingState::Tracking;
    }

    /// Stop location updates
    ///
    /// Does nothing when not tracking, so the service sees at most one stop
    /// request per tracking session.
    pub fn stop_tracking(&mut self) {
        if self.state == TrackingState::Idle {
            return;
        }
        self.state = TrackingState::Idle;

        match self.service.upgrade() {
            Some(service) => service.request_stop(),
            None => log::warn!("Location service is gone, stop request dropped"),
        }
        log::info!("Location tracking stopped");
    }

    /// Hand one update (or error) to the combined-update callback
    fn deliver_combined(&mut self, update: Result<&Location, &ServiceError>) -> UpdateControl {
        match self.registry.lookup_mut(NotificationKind::CombinedUpdate) {
            Some(Callback::CombinedUpdate(callback)) => callback(update),
            _ => UpdateControl::Continue,
        }
    }
}

impl<S: LocationService + ?Sized> LocationDelegate for LocationBlocks<S> {
    fn handle_location_batch(&mut self, locations: &[Location]) {
        log::trace!("Location batch of {} fix(es)", locations.len());

        if let Some(Callback::LocationBatch(callback)) =
            self.registry.lookup_mut(NotificationKind::LocationBatch)
        {
            callback(locations);
        }

        for location in locations {
            if self.state != TrackingState::Tracking {
                break;
            }

            let now = (self.clock)();
            match self.filter.check(location, now) {
                Ok(()) => {}
                Err(Rejection::Stale { age_s }) => {
                    log::debug!("Dropped stale fix ({:.1} s old)", age_s);
                    continue;
                }
                Err(Rejection::NoImprovement {
                    accuracy,
                    last_accuracy,
                    distance_m,
                }) => {
                    log::debug!(
                        "Dropped fix at {:.1} m, last delivered was {:.1} m and {:.1} m away",
                        accuracy,
                        last_accuracy,
                        distance_m
                    );
                    continue;
                }
                Err(Rejection::Invalid { accuracy }) => {
                    log::debug!("Dropped invalid fix (accuracy {:.1} m)", accuracy);
                    continue;
                }
            }

            if self.deliver_combined(Ok(location)).is_stop() {
                log::debug!("Update callback requested stop");
                self.stop_tracking();
            }
        }
    }

    fn handle_location_failure(&mut self, error: &ServiceError) {
        log::debug!("Location failure: {}", error);
        if self.deliver_combined(Err(error)).is_stop() {
            log::debug!("Update callback requested stop after error");
            self.stop_tracking();
        }
    }

    fn handle_authorization_change(&mut self, status: AuthorizationStatus) {
        log::debug!("Authorization changed: {}", status);
        if let Some(Callback::AuthorizationChanged(callback)) =
            self.registry.lookup_mut(NotificationKind::AuthorizationChanged)
        {
            callback(status);
        }
    }

    fn handle_region_entered(&mut self, region: &Region) {
        log::trace!("Entered region {}", region.identifier);
        if let Some(Callback::RegionEntered(callback)) =
            self.registry.lookup_mut(NotificationKind::RegionEntered)
        {
            callback(region);
        }
    }

    fn handle_region_exited(&mut self, region: &Region) {
        log::trace!("Exited region {}", region.identifier);
        if let Some(Callback::RegionExited(callback)) =
            self.registry.lookup_mut(NotificationKind::RegionExited)
        {
            callback(region);
        }
    }

    fn handle_region_monitoring_failed(&mut self, region: &Region, error: &ServiceError) {
        log::debug!("Monitoring failed for region {}: {}", region.identifier, error);
        if let Some(Callback::RegionMonitoringFailed(callback)) =
            self.registry.lookup_mut(NotificationKind::RegionMonitoringFailed)
        {
            callback(region, error);
        }
    }

    fn handle_region_monitoring_started(&mut self, region: &Region) {
        log::trace!("Monitoring started for region {}", region.identifier);
        if let Some(Callback::RegionMonitoringStarted(callback)) =
            self.registry.lookup_mut(NotificationKind::RegionMonitoringStarted)
        {
            callback(region);
        }
    }

    fn handle_heading_update(&mut self, heading: &Heading) {
        if let Some(Callback::HeadingUpdated(callback)) =
            self.registry.lookup_mut(NotificationKind::HeadingUpdated)
        {
            callback(heading);
        }
    }

    fn handle_calibration_query(&mut self) -> bool {
        match self.registry.lookup_mut(NotificationKind::CalibrationDisplayQuery) {
            Some(Callback::CalibrationDisplayQuery(callback)) => callback(),
            _ => false,
        }
    }
}

impl<S: LocationService + ?Sized> fmt::Debug for LocationBlocks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationBlocks")
            .field("service_alive", &(self.service.strong_count() > 0))
            .field("registry", &self.registry)
            .field("filter", &self.filter)
            .field("state", &self.state)
            .finish()
    }
}
