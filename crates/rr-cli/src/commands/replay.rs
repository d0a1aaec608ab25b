//! `rr replay`: tick through a log, printing one frame per tick.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use rr_core::{CautionStatus, PlaybackMode, RaceSnapshot};

use crate::commands::build_session;
use crate::config::Config;

pub struct Options {
    pub rate: u32,
    pub interval_ms: u64,
    pub ticks: Option<u64>,
    pub json: bool,
}

pub fn run(file: &Path, config: &Config, options: &Options) -> Result<()> {
    let mut session = build_session(file, config)?;
    session.set_rate(options.rate);
    session.play();

    let mut ticks = 0u64;
    while session.mode() == PlaybackMode::Playing {
        let snapshot = session.tick();
        if options.json {
            println!("{}", serde_json::to_string(&snapshot)?);
        } else {
            print_frame(&snapshot);
        }

        ticks += 1;
        if options.ticks.is_some_and(|limit| ticks >= limit) {
            session.pause();
            break;
        }
        if options.interval_ms > 0 && session.mode() == PlaybackMode::Playing {
            std::thread::sleep(Duration::from_millis(options.interval_ms));
        }
    }

    if !options.json {
        print_closing(&mut session);
    }
    Ok(())
}

fn print_frame(snapshot: &RaceSnapshot) {
    let time = snapshot
        .time
        .map_or_else(|| "--:--:--".to_string(), |t| t.format("%H:%M:%S").to_string());

    let flag = match &snapshot.caution {
        CautionStatus::Green => "GREEN".to_string(),
        CautionStatus::Yellow { remaining_secs, .. } => {
            format!("YELLOW {remaining_secs:.0}s left")
        }
    };

    let leader = snapshot
        .leader
        .as_ref()
        .map_or("-", rr_core::VehicleId::as_str);

    println!(
        "[{time}] {index}/{total} lap {lap} {flag} leader {leader}",
        index = snapshot.index,
        total = snapshot.total_events,
        lap = snapshot.lap,
    );

    for advisory in &snapshot.advisories {
        println!(
            "    {} {} (confidence {:.0}%, pit {:.0}%, wear {:.0}%, pits in {:.0}m)",
            advisory.vehicle,
            advisory.decision.as_str(),
            advisory.confidence.value() * 100.0,
            advisory.pit_probability.value() * 100.0,
            advisory.tire_wear,
            advisory.distance_to_pits_m
        );
    }
}

fn print_closing(session: &mut rr_core::ReplaySession) {
    let snapshot = session.snapshot();

    println!();
    println!("Final standings:");
    for vehicle in &snapshot.vehicles {
        println!(
            "  P{rank} {id}  lap {lap}  top {top:.0}  wear {wear:.0}%",
            rank = vehicle.rank,
            id = vehicle.vehicle,
            lap = vehicle.lap,
            top = vehicle.top_speed,
            wear = vehicle.tire_wear
        );
    }

    if let Some(summary) = session.caution_summary() {
        println!(
            "Cautions: {} ({:.0}s total, {:.1}% of the race)",
            summary.count,
            summary.total_secs,
            100.0 * summary.total_secs / snapshot.total_secs.max(1.0)
        );
    }
}
