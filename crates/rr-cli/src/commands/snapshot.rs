//! `rr snapshot`: reconstruct the field at one cursor position.

use std::path::Path;

use anyhow::Result;

use rr_core::{CautionStatus, TrackSection};

use crate::commands::build_session;
use crate::config::Config;

pub fn run(file: &Path, config: &Config, at: usize, json: bool) -> Result<()> {
    let mut session = build_session(file, config)?;
    session.seek(at);
    let snapshot = session.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let time = snapshot
        .time
        .map_or_else(|| "--:--:--".to_string(), |t| t.format("%H:%M:%S").to_string());
    let flag = match &snapshot.caution {
        CautionStatus::Green => "GREEN".to_string(),
        CautionStatus::Yellow { remaining_secs, .. } => {
            format!("YELLOW ({remaining_secs:.0}s left)")
        }
    };

    println!(
        "Index {index}/{total}  time {time}  lap {lap}  {flag}",
        index = snapshot.index,
        total = snapshot.total_events,
        lap = snapshot.lap,
    );

    for v in &snapshot.vehicles {
        let section = match v.section {
            TrackSection::Curve => "curve",
            TrackSection::Straight => "straight",
        };
        println!(
            "  P{rank} {id}  lap {lap}  {sector:?} {section}  speed {speed:.0} (top {top:.0})  \
             gap {gap:.1}s  delta {delta:.1}s  wear {wear:.0}%  brakes {brake:.0}C  engine {engine:.0}C",
            rank = v.rank,
            id = v.vehicle,
            lap = v.lap,
            sector = v.sector,
            speed = v.speed,
            top = v.top_speed,
            gap = v.gap_next_secs,
            delta = v.delta_leader_secs,
            wear = v.tire_wear,
            brake = v.brake_temp,
            engine = v.engine_temp
        );
    }

    for advisory in &snapshot.advisories {
        println!(
            "  advisory {id}: {decision} (confidence {conf:.0}%, pit probability {prob:.0}%)",
            id = advisory.vehicle,
            decision = advisory.decision.as_str(),
            conf = advisory.confidence.value() * 100.0,
            prob = advisory.pit_probability.value() * 100.0
        );
    }

    Ok(())
}
