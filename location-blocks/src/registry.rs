//! Callback registry
//!
//! Stores at most one callback per notification kind. Registering a callback
//! for a kind that already has one replaces it; nothing is queued.

use crate::types::{AuthorizationStatus, Heading, Location, Region, ServiceError, UpdateControl};
use std::collections::HashMap;
use std::fmt;

/// Receives every location batch exactly as the service delivered it
pub type LocationBatchCallback = Box<dyn FnMut(&[Location])>;

/// Receives filtered fixes (or service errors) and decides whether to keep going
pub type UpdateCallback =
    Box<dyn FnMut(std::result::Result<&Location, &ServiceError>) -> UpdateControl>;

pub type AuthorizationCallback = Box<dyn FnMut(AuthorizationStatus)>;

/// Used for region entered, exited and monitoring started
pub type RegionCallback = Box<dyn FnMut(&Region)>;

pub type RegionFailureCallback = Box<dyn FnMut(&Region, &ServiceError)>;

pub type HeadingCallback = Box<dyn FnMut(&Heading)>;

/// Answers whether the heading calibration display should be shown
pub type CalibrationCallback = Box<dyn FnMut() -> bool>;

/// Kinds of notification a callback can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotificationKind {
    LocationBatch,
    CombinedUpdate,
    AuthorizationChanged,
    RegionEntered,
    RegionExited,
    RegionMonitoringFailed,
    RegionMonitoringStarted,
    HeadingUpdated,
    CalibrationDisplayQuery,
}

impl NotificationKind {
    /// All kinds, in declaration order
    pub const ALL: [NotificationKind; 9] = [
        NotificationKind::LocationBatch,
        NotificationKind::CombinedUpdate,
        NotificationKind::AuthorizationChanged,
        NotificationKind::RegionEntered,
        NotificationKind::RegionExited,
        NotificationKind::RegionMonitoringFailed,
        NotificationKind::RegionMonitoringStarted,
        NotificationKind::HeadingUpdated,
        NotificationKind::CalibrationDisplayQuery,
    ];
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationKind::LocationBatch => "location_batch",
            NotificationKind::CombinedUpdate => "combined_update",
            NotificationKind::AuthorizationChanged => "authorization_changed",
            NotificationKind::RegionEntered => "region_entered",
            NotificationKind::RegionExited => "region_exited",
            NotificationKind::RegionMonitoringFailed => "region_monitoring_failed",
            NotificationKind::RegionMonitoringStarted => "region_monitoring_started",
            NotificationKind::HeadingUpdated => "heading_updated",
            NotificationKind::CalibrationDisplayQuery => "calibration_display_query",
        };
        write!(f, "{}", name)
    }
}

/// A registered callback, tagged with the notification it handles
pub enum Callback {
    LocationBatch(LocationBatchCallback),
    CombinedUpdate(UpdateCallback),
    AuthorizationChanged(AuthorizationCallback),
    RegionEntered(RegionCallback),
    RegionExited(RegionCallback),
    RegionMonitoringFailed(RegionFailureCallback),
    RegionMonitoringStarted(RegionCallback),
    HeadingUpdated(HeadingCallback),
    CalibrationDisplayQuery(CalibrationCallback),
}

impl Callback {
    /// The notification kind this callback is stored under
    pub fn kind(&self) -> NotificationKind {
        match self {
            Callback::LocationBatch(_) => NotificationKind::LocationBatch,
            Callback::CombinedUpdate(_) => NotificationKind::CombinedUpdate,
            Callback::AuthorizationChanged(_) => NotificationKind::AuthorizationChanged,
            Callback::RegionEntered(_) => NotificationKind::RegionEntered,
            Callback::RegionExited(_) => NotificationKind::RegionExited,
            Callback::RegionMonitoringFailed(_) => NotificationKind::RegionMonitoringFailed,
            Callback::RegionMonitoringStarted(_) => NotificationKind::RegionMonitoringStarted,
            Callback::HeadingUpdated(_) => NotificationKind::HeadingUpdated,
            Callback::CalibrationDisplayQuery(_) => NotificationKind::CalibrationDisplayQuery,
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({})", self.kind())
    }
}

/// One callback slot per notification kind
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    slots: HashMap<NotificationKind, Callback>,
}

impl CallbackRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a callback under its kind, replacing any previous one
    ///
    /// Returns true if a previous callback was replaced.
    pub fn register(&mut self, callback: Callback) -> bool {
        let kind = callback.kind();
        let replaced = self.slots.insert(kind, callback).is_some();
        if replaced {
            log::debug!("Replaced {} callback", kind);
        } else {
            log::trace!("Registered {} callback", kind);
        }
        replaced
    }

    /// Look up the callback registered for a kind
    pub fn lookup(&self, kind: NotificationKind) -> Option<&Callback> {
        self.slots.get(&kind)
    }

    /// Mutable lookup, needed to invoke the stored closure
    pub fn lookup_mut(&mut self, kind: NotificationKind) -> Option<&mut Callback> {
        self.slots.get_mut(&kind)
    }

    pub fn is_registered(&self, kind: NotificationKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Registered kinds in declaration order
    pub fn registered_kinds(&self) -> Vec<NotificationKind> {
        NotificationKind::ALL
            .into_iter()
            .filter(|kind| self.slots.contains_key(kind))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_empty_registry() {
        let registry = CallbackRegistry::new();
        assert!(registry.is_empty());
        for kind in NotificationKind::ALL {
            assert!(registry.lookup(kind).is_none());
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CallbackRegistry::new();
        assert!(!registry.register(Callback::CalibrationDisplayQuery(Box::new(|| true))));
        assert!(!registry.register(Callback::HeadingUpdated(Box::new(|_: &Heading| {}))));

        assert_eq!(
            registry.registered_kinds(),
            vec![
                NotificationKind::HeadingUpdated,
                NotificationKind::CalibrationDisplayQuery
            ]
        );

        match registry.lookup_mut(NotificationKind::CalibrationDisplayQuery) {
            Some(Callback::CalibrationDisplayQuery(cb)) => assert!(cb()),
            other => panic!("unexpected slot: {:?}", other),
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let calls = Rc::new(Cell::new((0, 0)));
        let mut registry = CallbackRegistry::new();

        let first = calls.clone();
        registry.register(Callback::AuthorizationChanged(Box::new(move |_: AuthorizationStatus| {
            let (a, b) = first.get();
            first.set((a + 1, b));
        })));

        let second = calls.clone();
        let replaced = registry.register(Callback::AuthorizationChanged(Box::new(move |_: AuthorizationStatus| {
            let (a, b) = second.get();
            second.set((a, b + 1));
        })));
        assert!(replaced);
        assert_eq!(registry.len(), 1);

        if let Some(Callback::AuthorizationChanged(cb)) =
            registry.lookup_mut(NotificationKind::AuthorizationChanged)
        {
            cb(AuthorizationStatus::Denied);
        }
        assert_eq!(calls.get(), (0, 1));
    }

    #[test]
    fn test_callback_kind_and_debug() {
        let callback = Callback::RegionExited(Box::new(|_: &Region| {}));
        assert_eq!(callback.kind(), NotificationKind::RegionExited);
        assert_eq!(format!("{:?}", callback), "Callback(region_exited)");
    }
}
