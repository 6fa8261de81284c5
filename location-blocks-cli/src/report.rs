//! Report generation
//!
//! Renders a [`ReplayReport`] as plain text or JSON.

use crate::replay::ReplayReport;
use anyhow::Result;
use std::io::Write;

/// Write a human readable summary
pub fn write_text(report: &ReplayReport, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "═══════════════════════════════════════════════")?;
    writeln!(out, "  Location Blocks - Replay Report")?;
    writeln!(out, "═══════════════════════════════════════════════\n")?;

    writeln!(out, "Trace records:      {}", report.trace_records)?;
    writeln!(out, "Raw batches:        {}", report.raw_batches)?;
    writeln!(out, "Raw fixes:          {}", report.raw_fixes)?;
    writeln!(out, "Delivered fixes:    {}", report.delivered.len())?;
    writeln!(out, "Service errors:     {}", report.errors.len())?;
    writeln!(
        out,
        "Start/stop requests: {}/{}",
        report.start_requests, report.stop_requests
    )?;
    writeln!(
        out,
        "Still tracking:     {}",
        if report.still_tracking { "yes" } else { "no" }
    )?;
    writeln!(
        out,
        "Updates available:  {}",
        if report.updates_available { "yes" } else { "no" }
    )?;

    if !report.events.is_empty() {
        writeln!(out, "\nOther events:")?;
        for (name, count) in &report.events {
            writeln!(out, "  {:<28} {}", name, count)?;
        }
    }

    if !report.delivered.is_empty() {
        writeln!(out, "\nDelivered fixes:")?;
        writeln!(out, "───────────────────────────────────────────────")?;
        for fix in &report.delivered {
            let age = fix.delivered_at.signed_duration_since(fix.timestamp);
            writeln!(
                out,
                "  {}  {}  ±{:.1} m  (age {:.1} s)",
                fix.delivered_at.format("%H:%M:%S%.3f"),
                fix.coordinate,
                fix.horizontal_accuracy,
                age.num_milliseconds() as f64 / 1000.0
            )?;
        }
    }

    if !report.errors.is_empty() {
        writeln!(out, "\nErrors:")?;
        for error in &report.errors {
            writeln!(out, "  {}", error)?;
        }
    }

    Ok(())
}

/// Write the report as pretty-printed JSON
pub fn write_json(report: &ReplayReport, out: &mut dyn Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}
