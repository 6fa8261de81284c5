//! Trace replay
//!
//! Plays a recorded trace through a [`LocationBlocks`] adapter. The
//! [`ReplayService`] stands in for the real location service: it records the
//! adapter's start/stop requests and hands each trace event to its delegate.
//! The adapter's clock follows the delivery time of the current event, so age
//! filtering behaves as it did when the trace was captured.

use crate::trace::{TraceEvent, TraceRecord};
use location_blocks::{
    AuthorizationStatus, Coordinate, FilterPolicy, LocationBlocks, LocationDelegate,
    LocationService, ServiceError, Timestamp, UpdateControl,
};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Location service that replays recorded events
pub struct ReplayService {
    delegate: RefCell<Option<Rc<RefCell<dyn LocationDelegate>>>>,
    authorization: Cell<AuthorizationStatus>,
    start_requests: Cell<usize>,
    stop_requests: Cell<usize>,
}

impl ReplayService {
    pub fn new() -> Self {
        Self {
            delegate: RefCell::new(None),
            authorization: Cell::new(AuthorizationStatus::NotDetermined),
            start_requests: Cell::new(0),
            stop_requests: Cell::new(0),
        }
    }

    /// Hand one event to the installed delegate
    fn deliver(&self, event: &TraceEvent) {
        if let TraceEvent::AuthorizationChanged { status } = event {
            self.authorization.set(*status);
        }

        let Some(delegate) = self.delegate.borrow().clone() else {
            log::warn!("No delegate installed, dropping {} event", event.name());
            return;
        };
        let mut delegate = delegate.borrow_mut();

        match event {
            TraceEvent::Locations { fixes } => delegate.handle_location_batch(fixes),
            TraceEvent::LocationFailed { error } => delegate.handle_location_failure(error),
            TraceEvent::AuthorizationChanged { status } => {
                delegate.handle_authorization_change(*status)
            }
            TraceEvent::RegionEntered { region } => delegate.handle_region_entered(region),
            TraceEvent::RegionExited { region } => delegate.handle_region_exited(region),
            TraceEvent::RegionMonitoringFailed { region, error } => {
                delegate.handle_region_monitoring_failed(region, error)
            }
            TraceEvent::RegionMonitoringStarted { region } => {
                delegate.handle_region_monitoring_started(region)
            }
            TraceEvent::HeadingUpdated { heading } => delegate.handle_heading_update(heading),
            TraceEvent::CalibrationQuery => {
                let show = delegate.handle_calibration_query();
                log::debug!("Calibration display requested: {}", show);
            }
        }
    }
}

impl Default for ReplayService {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationService for ReplayService {
    fn set_delegate(&self, delegate: Rc<RefCell<dyn LocationDelegate>>) {
        *self.delegate.borrow_mut() = Some(delegate);
    }

    fn request_start(&self) {
        log::debug!("Replay service: start requested");
        self.start_requests.set(self.start_requests.get() + 1);
    }

    fn request_stop(&self) {
        log::debug!("Replay service: stop requested");
        self.stop_requests.set(self.stop_requests.get() + 1);
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        self.authorization.get()
    }

    fn location_services_enabled(&self) -> bool {
        true
    }
}

/// Replay settings
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub policy: FilterPolicy,
    /// Return `Stop` from the update callback after this many fixes
    pub stop_after: Option<usize>,
}

/// A fix the combined-update callback received
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveredFix {
    /// Delivery time of the batch that carried the fix
    pub delivered_at: Timestamp,
    pub coordinate: Coordinate,
    pub horizontal_accuracy: f64,
    pub timestamp: Timestamp,
}

/// What each callback saw during a replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub trace_records: usize,
    pub raw_batches: usize,
    pub raw_fixes: usize,
    pub delivered: Vec<DeliveredFix>,
    pub errors: Vec<ServiceError>,
    /// Non-location events by kind
    pub events: BTreeMap<String, usize>,
    pub start_requests: usize,
    pub stop_requests: usize,
    pub still_tracking: bool,
    pub updates_available: bool,
}

impl ReplayReport {
    fn count_event(&mut self, name: &str) {
        *self.events.entry(name.to_string()).or_insert(0) += 1;
    }
}

/// Replay `records` through a fresh adapter and report what it delivered
pub fn run(records: &[TraceRecord], options: &ReplayOptions) -> ReplayReport {
    let service = Rc::new(ReplayService::new());
    let blocks = LocationBlocks::attach(&service);
    let report = Rc::new(RefCell::new(ReplayReport {
        trace_records: records.len(),
        ..ReplayReport::default()
    }));
    let clock = Rc::new(Cell::new(
        records.first().map(|r| r.at).unwrap_or_else(chrono::Utc::now),
    ));

    {
        let mut adapter = blocks.borrow_mut();
        adapter.set_filter_policy(options.policy);

        let now = clock.clone();
        adapter.set_clock(move || now.get());

        let r = report.clone();
        adapter.on_location_batch(move |fixes| {
            let mut report = r.borrow_mut();
            report.raw_batches += 1;
            report.raw_fixes += fixes.len();
        });

        let r = report.clone();
        adapter.on_authorization_changed(move |status| {
            log::info!("Authorization changed to {}", status);
            r.borrow_mut().count_event("authorization_changed");
        });

        let r = report.clone();
        adapter.on_region_entered(move |region| {
            log::info!("Entered region {}", region.identifier);
            r.borrow_mut().count_event("region_entered");
        });

        let r = report.clone();
        adapter.on_region_exited(move |region| {
            log::info!("Exited region {}", region.identifier);
            r.borrow_mut().count_event("region_exited");
        });

        let r = report.clone();
        adapter.on_region_monitoring_failed(move |region, error| {
            log::warn!("Monitoring failed for region {}: {}", region.identifier, error);
            let mut report = r.borrow_mut();
            report.count_event("region_monitoring_failed");
            report.errors.push(error.clone());
        });

        let r = report.clone();
        adapter.on_region_monitoring_started(move |_| {
            r.borrow_mut().count_event("region_monitoring_started");
        });

        let r = report.clone();
        adapter.on_heading_updated(move |_| {
            r.borrow_mut().count_event("heading_updated");
        });

        let r = report.clone();
        adapter.on_calibration_display_query(move || {
            r.borrow_mut().count_event("calibration_query");
            false
        });

        let r = report.clone();
        let now = clock.clone();
        let stop_after = options.stop_after;
        adapter.start_tracking(move |update| {
            let mut report = r.borrow_mut();
            match update {
                Ok(location) => {
                    report.delivered.push(DeliveredFix {
                        delivered_at: now.get(),
                        coordinate: location.coordinate,
                        horizontal_accuracy: location.horizontal_accuracy,
                        timestamp: location.timestamp,
                    });
                }
                Err(error) => {
                    log::warn!("Location update failed: {}", error);
                    report.errors.push(error.clone());
                }
            }

            match stop_after {
                Some(limit) if report.delivered.len() >= limit => UpdateControl::Stop,
                _ => UpdateControl::Continue,
            }
        });
    }

    for record in records {
        clock.set(record.at);
        log::trace!("Replaying {} event at {}", record.event.name(), record.at);
        service.deliver(&record.event);
    }

    let still_tracking = blocks.borrow().is_tracking();
    let updates_available = LocationBlocks::<ReplayService>::is_location_updates_available(&service);

    let mut report = report.borrow().clone();
    report.start_requests = service.start_requests.get();
    report.stop_requests = service.stop_requests.get();
    report.still_tracking = still_tracking;
    report.updates_available = updates_available;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::parse_trace;

    const TRACE: &str = r#"
{"at":"2024-05-01T12:00:00Z","event":{"type":"authorization_changed","status":"authorized_when_in_use"}}
{"at":"2024-05-01T12:00:01Z","event":{"type":"locations","fixes":[{"coordinate":{"latitude":59.91,"longitude":10.75},"horizontal_accuracy":100.0,"timestamp":"2024-05-01T12:00:01Z"},{"coordinate":{"latitude":59.91,"longitude":10.75},"horizontal_accuracy":60.0,"timestamp":"2024-05-01T12:00:01Z"}]}}
{"at":"2024-05-01T12:00:02Z","event":{"type":"locations","fixes":[{"coordinate":{"latitude":59.91,"longitude":10.75},"horizontal_accuracy":40.0,"timestamp":"2024-05-01T12:00:02Z"},{"coordinate":{"latitude":59.91,"longitude":10.75},"horizontal_accuracy":45.0,"timestamp":"2024-05-01T12:00:02Z"}]}}
{"at":"2024-05-01T12:00:20Z","event":{"type":"locations","fixes":[{"coordinate":{"latitude":59.91,"longitude":10.75},"horizontal_accuracy":5.0,"timestamp":"2024-05-01T12:00:10Z"}]}}
{"at":"2024-05-01T12:00:21Z","event":{"type":"location_failed","error":{"code":0,"message":"location unknown"}}}
{"at":"2024-05-01T12:00:22Z","event":{"type":"calibration_query"}}
"#;

    fn accuracies(report: &ReplayReport) -> Vec<f64> {
        report.delivered.iter().map(|d| d.horizontal_accuracy).collect()
    }

    #[test]
    fn test_replay_without_filters() {
        let records = parse_trace(TRACE).unwrap();
        let report = run(&records, &ReplayOptions::default());

        assert_eq!(report.trace_records, 6);
        assert_eq!(report.raw_batches, 3);
        assert_eq!(report.raw_fixes, 5);
        assert_eq!(accuracies(&report), vec![100.0, 60.0, 40.0, 45.0, 5.0]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.events.get("authorization_changed"), Some(&1));
        assert_eq!(report.events.get("calibration_query"), Some(&1));
        assert_eq!(report.start_requests, 1);
        assert_eq!(report.stop_requests, 0);
        assert!(report.still_tracking);
        assert!(report.updates_available);
    }

    #[test]
    fn test_replay_with_filters() {
        let records = parse_trace(TRACE).unwrap();
        let options = ReplayOptions {
            policy: FilterPolicy::new()
                .with_accuracy_filter(50.0)
                .with_age_filter(5.0),
            stop_after: None,
        };
        let report = run(&records, &options);

        // 45 m is worse than 40 m; the 5 m fix is 10 s old on delivery
        assert_eq!(accuracies(&report), vec![100.0, 60.0, 40.0]);
        assert_eq!(report.raw_fixes, 5);
    }

    #[test]
    fn test_replay_stop_after() {
        let records = parse_trace(TRACE).unwrap();
        let options = ReplayOptions {
            policy: FilterPolicy::new(),
            stop_after: Some(1),
        };
        let report = run(&records, &options);

        assert_eq!(accuracies(&report), vec![100.0]);
        assert_eq!(report.stop_requests, 1);
        assert!(!report.still_tracking);
        // Later batches still reach the raw callback
        assert_eq!(report.raw_batches, 3);
        // The failure is still forwarded after stopping
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_replay_demo_walk() {
        let records = parse_trace(include_str!("../../demos/walk.jsonl")).unwrap();
        let config: crate::config::AppConfig =
            toml::from_str(include_str!("../../demos/replay.toml")).unwrap();
        let options = ReplayOptions {
            policy: config.filters.to_policy(),
            stop_after: config.replay.stop_after,
        };
        let report = run(&records, &options);

        // Cached 1414 m fix is a day old; 70 m arrives after a 10 m fix
        assert_eq!(accuracies(&report), vec![165.0, 65.0, 10.0, 5.0]);
        assert_eq!(report.trace_records, 9);
        assert_eq!(report.raw_batches, 4);
        assert_eq!(report.raw_fixes, 6);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.stop_requests, 1);
        assert!(!report.still_tracking);
        assert_eq!(report.events.get("region_entered"), Some(&1));
        assert_eq!(report.events.get("heading_updated"), Some(&1));
    }
}
