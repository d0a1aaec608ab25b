//! `rr cautions`: list detected caution periods.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use rr_core::{CautionPeriod, CautionSummary};

use crate::commands::build_session;
use crate::config::Config;

#[derive(Serialize)]
struct Report<'a> {
    periods: &'a [CautionPeriod],
    summary: Option<CautionSummary>,
}

pub fn run(file: &Path, config: &Config, json: bool) -> Result<()> {
    let session = build_session(file, config)?;
    let periods = session.cautions();

    if json {
        let report = Report {
            periods,
            summary: session.caution_summary(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if periods.is_empty() {
        println!("No caution periods detected.");
        return Ok(());
    }

    println!("#   start     end       duration");
    for (i, period) in periods.iter().enumerate() {
        println!(
            "{:<3} {}  {}  {:.0}s",
            i + 1,
            period.start.format("%H:%M:%S"),
            period.end.format("%H:%M:%S"),
            period.duration_secs()
        );
    }

    if let Some(summary) = session.caution_summary() {
        println!();
        println!(
            "{} cautions, {:.0}s total, mean {:.0}s, longest {:.0}s, shortest {:.0}s",
            summary.count,
            summary.total_secs,
            summary.mean_secs,
            summary.longest.duration_secs(),
            summary.shortest.duration_secs()
        );
    }

    Ok(())
}
