//! Per-vehicle race state reconstruction.
//!
//! The log carries no position or lap fields, so everything here is
//! derived: ranking from per-stream timestamp progress, laps from
//! `lap_distance` resets, sectors from track thirds, gaps from a fixed
//! distance-to-time ratio, and condition estimates from trailing ring
//! buffers. The buffers are updated incrementally as the cursor sweeps
//! forward; nothing rescans the log per tick.

use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{Signal, TelemetryEvent};
use crate::store::{EventStore, SignalSweeper};
use crate::types::VehicleId;

/// Steering angle beyond which the car is considered cornering, degrees.
const CURVE_STEERING_DEG: f64 = 20.0;
/// Lateral acceleration beyond which the car is considered cornering, g.
const CURVE_LATERAL_G: f64 = 0.4;
/// Mean front/rear brake above this while steering marks trail braking.
const TRAIL_BRAKE_PCT: f64 = 20.0;
/// Steering angle paired with braking that marks trail braking, degrees.
const TRAIL_STEERING_DEG: f64 = 15.0;

/// Configuration for state reconstruction.
#[derive(Debug, Clone)]
pub struct ReconstructConfig {
    /// A `lap_distance` drop larger than this counts as a lap reset.
    /// Default: 1000.0.
    pub lap_reset_threshold: f64,

    /// Trailing readings kept per `(vehicle, signal)` for the condition
    /// estimates. Default: 100.
    pub trailing_window: usize,

    /// Distance-to-time ratio for gap estimates, meters per second.
    /// Default: 80.0. A heuristic, not a timing-loop measurement.
    pub gap_meters_per_second: f64,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            lap_reset_threshold: 1000.0,
            trailing_window: 100,
            gap_meters_per_second: 80.0,
        }
    }
}

/// One of the three equal track segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sector {
    S1,
    S2,
    S3,
}

/// Whether the car is currently cornering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSection {
    Straight,
    Curve,
}

/// A bounded trailing window of raw readings.
#[derive(Debug, Clone)]
struct RollingWindow {
    values: VecDeque<f64>,
    cap: usize,
}

impl RollingWindow {
    fn new(cap: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.cap {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of the window; zero when empty (the documented default for
    /// absent signals).
    #[expect(
        clippy::cast_precision_loss,
        reason = "window lengths are bounded by the configured cap"
    )]
    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "window lengths are bounded by the configured cap"
    )]
    fn mean_abs(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().map(|v| v.abs()).sum::<f64>() / self.values.len() as f64
    }

    fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }
}

/// Incrementally maintained per-vehicle derived state.
#[derive(Debug, Clone)]
struct VehicleTracker {
    /// Most advanced timestamp seen in this vehicle's stream.
    last_seen_at: DateTime<Utc>,
    /// Lap counter; starts at 1, incremented on `lap_distance` resets.
    lap: u32,
    last_lap_distance: Option<f64>,
    top_speed: f64,
    speed: RollingWindow,
    brake_front: RollingWindow,
    rpm: RollingWindow,
    acc_lateral: RollingWindow,
    acc_longitudinal: RollingWindow,
}

impl VehicleTracker {
    fn new(seen_at: DateTime<Utc>, window: usize) -> Self {
        Self {
            last_seen_at: seen_at,
            lap: 1,
            last_lap_distance: None,
            top_speed: 0.0,
            speed: RollingWindow::new(window),
            brake_front: RollingWindow::new(window),
            rpm: RollingWindow::new(window),
            acc_lateral: RollingWindow::new(window),
            acc_longitudinal: RollingWindow::new(window),
        }
    }
}

/// Snapshot of one vehicle's derived race state at the cursor.
///
/// Ephemeral: recomputed every tick, never persisted. Signals the vehicle
/// has not reported yet appear as zero.
#[derive(Debug, Clone, Serialize)]
pub struct VehicleSnapshot {
    pub vehicle: VehicleId,
    /// 1-based race position.
    pub rank: usize,
    pub lap: u32,
    pub sector: Sector,
    pub section: TrackSection,
    pub speed: f64,
    pub top_speed: f64,
    /// Minimum trailing speed while cornering; `None` on straights.
    pub apex_speed: Option<f64>,
    pub gear: i32,
    pub rpm: f64,
    pub throttle: f64,
    pub brake_front: f64,
    pub brake_rear: f64,
    pub steering: f64,
    pub acc_lateral: f64,
    pub acc_longitudinal: f64,
    pub lap_distance: f64,
    /// Estimated seconds behind the leader; zero for the leader.
    pub delta_leader_secs: f64,
    /// Estimated seconds behind the vehicle one rank ahead.
    pub gap_next_secs: f64,
    pub brake_temp: f64,
    pub engine_temp: f64,
    /// Driving intensity score, 0-100.
    pub intensity: f64,
    /// Tire wear estimate, 0-100.
    pub tire_wear: f64,
    pub trail_braking: bool,
}

/// The reconstructed field at a cursor position.
#[derive(Debug, Clone, Serialize)]
pub struct FieldState {
    /// Vehicle judged most race-advanced, if any telemetry has been seen.
    pub leader: Option<VehicleId>,
    /// The leader's lap counter; 1 before any telemetry.
    pub lap: u32,
    /// Per-vehicle snapshots in rank order.
    pub vehicles: Vec<VehicleSnapshot>,
}

/// Reconstructs per-vehicle race state as the cursor advances.
#[derive(Debug)]
pub struct Reconstructor {
    config: ReconstructConfig,
    trackers: HashMap<VehicleId, VehicleTracker>,
    next_index: usize,
}

impl Reconstructor {
    /// Creates a reconstructor with no observed telemetry.
    #[must_use]
    pub fn new(config: ReconstructConfig) -> Self {
        Self {
            config,
            trackers: HashMap::new(),
            next_index: 0,
        }
    }

    /// Sweeps forward so the trackers reflect every event at or before
    /// `index`. Backward moves are ignored; use [`reset`](Self::reset).
    pub fn advance_to(&mut self, store: &EventStore, index: usize) {
        let end = index.min(store.len().saturating_sub(1));
        while self.next_index <= end {
            if let Some(event) = store.log().get(self.next_index) {
                self.observe(event);
            }
            self.next_index += 1;
        }
    }

    /// Drops all derived state; the next sweep rebuilds from the start.
    pub fn reset(&mut self) {
        self.trackers.clear();
        self.next_index = 0;
    }

    fn observe(&mut self, event: &TelemetryEvent) {
        let window = self.config.trailing_window;
        let tracker = self
            .trackers
            .entry(event.vehicle.clone())
            .or_insert_with(|| VehicleTracker::new(event.timestamp, window));
        tracker.last_seen_at = tracker.last_seen_at.max(event.timestamp);

        match event.engine_signal() {
            Some(Signal::Speed) => {
                tracker.top_speed = tracker.top_speed.max(event.value);
                tracker.speed.push(event.value);
            }
            Some(Signal::BrakeFront) => tracker.brake_front.push(event.value),
            Some(Signal::Rpm) => tracker.rpm.push(event.value),
            Some(Signal::AccLateral) => tracker.acc_lateral.push(event.value),
            Some(Signal::AccLongitudinal) => tracker.acc_longitudinal.push(event.value),
            Some(Signal::LapDistance) => {
                let reset = tracker
                    .last_lap_distance
                    .is_some_and(|prev| prev - event.value > self.config.lap_reset_threshold);
                if reset {
                    tracker.lap += 1;
                }
                tracker.last_lap_distance = Some(event.value);
            }
            _ => {}
        }
    }

    /// Computes the field at the swept position.
    ///
    /// Ranking orders vehicles by most advanced stream timestamp,
    /// descending, with ties broken by vehicle identifier so the result is
    /// deterministic for a fixed cursor index.
    #[must_use]
    pub fn compute(&self, store: &EventStore, sweeper: &SignalSweeper, index: usize) -> FieldState {
        let mut ranked: Vec<(&VehicleId, DateTime<Utc>)> = self
            .trackers
            .iter()
            .map(|(vehicle, tracker)| (vehicle, tracker.last_seen_at))
            .collect();
        ranked.sort_by_key(|&(vehicle, seen)| (Reverse(seen), vehicle.clone()));

        let leader = ranked.first().map(|&(vehicle, _)| vehicle.clone());
        let lap = leader
            .as_ref()
            .and_then(|l| self.trackers.get(l))
            .map_or(1, |t| t.lap);

        let elapsed_fraction = store
            .log()
            .get(index)
            .map_or(0.0, |event| store.elapsed_fraction(event.timestamp));

        let leader_distance = leader
            .as_ref()
            .map_or(0.0, |l| sweeper.latest_or_zero(l, Signal::LapDistance));

        let mut vehicles = Vec::with_capacity(ranked.len());
        let mut ahead_distance = leader_distance;
        for (position, &(vehicle, _)) in ranked.iter().enumerate() {
            let snapshot = self.vehicle_snapshot(
                store,
                sweeper,
                vehicle,
                position + 1,
                leader_distance,
                ahead_distance,
                elapsed_fraction,
            );
            ahead_distance = snapshot.lap_distance;
            vehicles.push(snapshot);
        }

        FieldState {
            leader,
            lap,
            vehicles,
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "gear telemetry is a small integer on the wire"
    )]
    #[expect(
        clippy::too_many_arguments,
        reason = "per-vehicle context is cheaper to pass than to restructure"
    )]
    fn vehicle_snapshot(
        &self,
        store: &EventStore,
        sweeper: &SignalSweeper,
        vehicle: &VehicleId,
        rank: usize,
        leader_distance: f64,
        ahead_distance: f64,
        elapsed_fraction: f64,
    ) -> VehicleSnapshot {
        let tracker = &self.trackers[vehicle];
        let track_length = store.track_length();

        let speed = sweeper.latest_or_zero(vehicle, Signal::Speed);
        let steering = sweeper.latest_or_zero(vehicle, Signal::Steering);
        let acc_lateral = sweeper.latest_or_zero(vehicle, Signal::AccLateral);
        let brake_front = sweeper.latest_or_zero(vehicle, Signal::BrakeFront);
        let brake_rear = sweeper.latest_or_zero(vehicle, Signal::BrakeRear);
        let lap_distance = sweeper.latest_or_zero(vehicle, Signal::LapDistance);

        let sector = sector_of(lap_distance, track_length);
        let section = if steering.abs() > CURVE_STEERING_DEG || acc_lateral.abs() > CURVE_LATERAL_G
        {
            TrackSection::Curve
        } else {
            TrackSection::Straight
        };

        let (delta_leader_secs, gap_next_secs) = if rank == 1 {
            (0.0, 0.0)
        } else {
            (
                self.gap_seconds(leader_distance - lap_distance, track_length),
                self.gap_seconds(ahead_distance - lap_distance, track_length),
            )
        };

        let mean_brake = tracker.brake_front.mean();
        let mean_abs_long = tracker.acc_longitudinal.mean_abs();
        let intensity = (20.0 * tracker.acc_lateral.mean_abs() + 20.0 * mean_abs_long
            + 0.5 * mean_brake)
            .min(100.0);
        let tire_wear = (100.0 * elapsed_fraction
            + 30.0 * mean_brake / 100.0
            + 20.0 * mean_abs_long / 10.0)
            .min(100.0);
        let trail_braking = (brake_front + brake_rear) / 2.0 > TRAIL_BRAKE_PCT
            && steering.abs() > TRAIL_STEERING_DEG;

        let apex_speed = match section {
            TrackSection::Curve => tracker.speed.min(),
            TrackSection::Straight => None,
        };

        VehicleSnapshot {
            vehicle: vehicle.clone(),
            rank,
            lap: tracker.lap,
            sector,
            section,
            speed,
            top_speed: tracker.top_speed,
            apex_speed,
            gear: sweeper.latest_or_zero(vehicle, Signal::Gear) as i32,
            rpm: sweeper.latest_or_zero(vehicle, Signal::Rpm),
            throttle: sweeper.latest_or_zero(vehicle, Signal::Throttle),
            brake_front,
            brake_rear,
            steering,
            acc_lateral,
            acc_longitudinal: sweeper.latest_or_zero(vehicle, Signal::AccLongitudinal),
            lap_distance,
            delta_leader_secs,
            gap_next_secs,
            brake_temp: 100.0 + (tracker.brake_front.mean() / 100.0) * 500.0,
            engine_temp: 80.0 + (tracker.rpm.mean() / 8000.0) * 30.0,
            intensity,
            tire_wear,
            trail_braking,
        }
    }

    /// Converts a lap-distance difference to an estimated time gap,
    /// wrapping by track length when the other car is a lap ahead.
    fn gap_seconds(&self, mut distance: f64, track_length: f64) -> f64 {
        if distance < 0.0 {
            distance += track_length;
        }
        distance / self.config.gap_meters_per_second
    }
}

fn sector_of(lap_distance: f64, track_length: f64) -> Sector {
    if lap_distance < track_length / 3.0 {
        Sector::S1
    } else if lap_distance < track_length * 2.0 / 3.0 {
        Sector::S2
    } else {
        Sector::S3
    }
}
