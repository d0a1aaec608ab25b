//! `rr inspect`: load a log and print a summary.

use std::path::Path;

use anyhow::{Context, Result};

use rr_core::VehicleId;

use crate::config::Config;
use crate::input;

pub fn run(file: &Path, config: &Config) -> Result<()> {
    let rows = input::read_rows(file)?;

    // Large logs load off the tick path; joining here is the readiness
    // gate before any playback starts.
    let task = rr_core::load_in_background(rows, config.engine_config());
    let session = task.join().context("failed to load telemetry log")?;

    let store = session.store();
    let vehicles: Vec<&str> = store.vehicles().iter().map(VehicleId::as_str).collect();

    println!("Log: {}", file.display());
    println!("  events:   {}", store.len());
    println!("  vehicles: {} ({})", vehicles.len(), vehicles.join(", "));
    if let Some((start, end)) = store.time_range() {
        println!(
            "  time:     {} - {} ({:.1}s)",
            start.format("%H:%M:%S"),
            end.format("%H:%M:%S"),
            store.total_seconds()
        );
    }
    println!("  track:    {:.0} m", store.track_length());

    match session.caution_summary() {
        Some(summary) => println!(
            "  cautions: {} (total {:.0}s, longest {:.0}s)",
            summary.count,
            summary.total_secs,
            summary.longest.duration_secs()
        ),
        None => println!("  cautions: none"),
    }

    Ok(())
}
