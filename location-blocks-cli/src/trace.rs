//! Recorded service event traces
//!
//! A trace is a JSON Lines file: one delegate event per line, stamped with the
//! time the service delivered it. Blank lines and `#` comments are skipped.
//!
//! ```text
//! {"at":"2024-05-01T12:00:00Z","event":{"type":"authorization_changed","status":"authorized_when_in_use"}}
//! {"at":"2024-05-01T12:00:01Z","event":{"type":"locations","fixes":[...]}}
//! ```

use anyhow::{Context, Result};
use location_blocks::{AuthorizationStatus, Heading, Location, Region, ServiceError, Timestamp};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One delivered event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TraceRecord {
    /// When the service delivered the event
    pub at: Timestamp,
    pub event: TraceEvent,
}

/// Delegate events as they appear in a trace
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    Locations { fixes: Vec<Location> },
    LocationFailed { error: ServiceError },
    AuthorizationChanged { status: AuthorizationStatus },
    RegionEntered { region: Region },
    RegionExited { region: Region },
    RegionMonitoringFailed { region: Region, error: ServiceError },
    RegionMonitoringStarted { region: Region },
    HeadingUpdated { heading: Heading },
    CalibrationQuery,
}

impl TraceEvent {
    /// Short name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            TraceEvent::Locations { .. } => "locations",
            TraceEvent::LocationFailed { .. } => "location_failed",
            TraceEvent::AuthorizationChanged { .. } => "authorization_changed",
            TraceEvent::RegionEntered { .. } => "region_entered",
            TraceEvent::RegionExited { .. } => "region_exited",
            TraceEvent::RegionMonitoringFailed { .. } => "region_monitoring_failed",
            TraceEvent::RegionMonitoringStarted { .. } => "region_monitoring_started",
            TraceEvent::HeadingUpdated { .. } => "heading_updated",
            TraceEvent::CalibrationQuery => "calibration_query",
        }
    }
}

/// Errors while reading a trace
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Malformed trace record on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse trace records from JSON Lines text
pub fn parse_trace(content: &str) -> std::result::Result<Vec<TraceRecord>, TraceError> {
    let mut records = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record = serde_json::from_str(line).map_err(|source| TraceError::Malformed {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Load a trace file
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file: {:?}", path))?;

    let records = parse_trace(&content)
        .with_context(|| format!("Failed to parse trace file: {:?}", path))?;

    log::debug!("Loaded {} trace record(s) from {:?}", records.len(), path);
    Ok(records)
}
