//! Immutable event store and the incremental latest-value cache.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::event::{EventLog, Signal, TelemetryEvent};
use crate::types::VehicleId;

/// Track length assumed when a log carries no `lap_distance` readings.
const FALLBACK_TRACK_LENGTH: f64 = 4000.0;

/// The loaded telemetry log plus metadata derived once at load.
///
/// Immutable after construction and therefore safe for unsynchronized
/// concurrent reads. Per-session mutable state (the read position and its
/// caches) lives elsewhere: see [`SignalSweeper`] and the session types.
#[derive(Debug, Clone)]
pub struct EventStore {
    log: EventLog,
    vehicles: Vec<VehicleId>,
    track_length: f64,
    time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl EventStore {
    /// Wraps a log, deriving the vehicle roster, track length, and time
    /// range in one pass.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        let mut vehicles: Vec<VehicleId> = Vec::new();
        let mut max_lap_distance: Option<f64> = None;

        for event in log.events() {
            if !vehicles.contains(&event.vehicle) {
                vehicles.push(event.vehicle.clone());
            }
            if event.engine_signal() == Some(Signal::LapDistance) {
                max_lap_distance =
                    Some(max_lap_distance.map_or(event.value, |m| m.max(event.value)));
            }
        }
        // Sorted roster keeps every per-vehicle listing deterministic.
        vehicles.sort();

        let time_range = match (log.events().first(), log.events().last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        };

        Self {
            log,
            vehicles,
            track_length: max_lap_distance.unwrap_or(FALLBACK_TRACK_LENGTH),
            time_range,
        }
    }

    /// The underlying ordered log.
    #[must_use]
    pub const fn log(&self) -> &EventLog {
        &self.log
    }

    /// Number of events in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Every vehicle observed anywhere in the log, sorted by identifier.
    #[must_use]
    pub fn vehicles(&self) -> &[VehicleId] {
        &self.vehicles
    }

    /// Track length: the maximum `lap_distance` observed across the log,
    /// or a 4 km fallback when the signal is absent.
    #[must_use]
    pub const fn track_length(&self) -> f64 {
        self.track_length
    }

    /// First and last timestamps of the log, if non-empty.
    #[must_use]
    pub const fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.time_range
    }

    /// Total covered duration in seconds (zero for empty logs).
    #[must_use]
    pub fn total_seconds(&self) -> f64 {
        self.time_range
            .map_or(0.0, |(start, end)| delta_seconds(end - start))
    }

    /// Fraction of the log's time span elapsed at `time`, in \[0.0, 1.0\].
    #[must_use]
    pub fn elapsed_fraction(&self, time: DateTime<Utc>) -> f64 {
        let Some((start, _)) = self.time_range else {
            return 0.0;
        };
        let total = self.total_seconds();
        if total <= 0.0 {
            return 0.0;
        }
        (delta_seconds(time - start) / total).clamp(0.0, 1.0)
    }
}

/// Converts a time delta to fractional seconds.
#[expect(
    clippy::cast_precision_loss,
    reason = "replay spans are far below 2^52 milliseconds"
)]
pub(crate) fn delta_seconds(delta: chrono::TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

/// Incrementally maintained last-seen value cache per `(vehicle, signal)`.
///
/// The playback cursor only moves forward (except on full reset), so the
/// latest value as of the cursor is maintained by sweeping newly revealed
/// events past the cache instead of rescanning backward on every lookup.
/// [`reset`](Self::reset) drops the cache so a reset-to-zero rebuilds it
/// from empty.
#[derive(Debug, Default)]
pub struct SignalSweeper {
    latest: HashMap<(VehicleId, Signal), f64>,
    next_index: usize,
}

impl SignalSweeper {
    /// Creates an empty sweeper positioned before the first event.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps forward so the cache reflects every event at or before
    /// `index`. Indices already swept are skipped; moving backward is a
    /// no-op (use [`reset`](Self::reset) first).
    pub fn advance_to(&mut self, store: &EventStore, index: usize) {
        let end = index.min(store.len().saturating_sub(1));
        while self.next_index <= end {
            if let Some(event) = store.log().get(self.next_index) {
                self.observe(event);
            }
            self.next_index += 1;
        }
    }

    /// Most recent value for `(vehicle, signal)` among swept events.
    #[must_use]
    pub fn latest(&self, vehicle: &VehicleId, signal: Signal) -> Option<f64> {
        self.latest.get(&(vehicle.clone(), signal)).copied()
    }

    /// Like [`latest`](Self::latest) but zero-defaulting, matching the
    /// documented treatment of absent signals in derived metrics.
    #[must_use]
    pub fn latest_or_zero(&self, vehicle: &VehicleId, signal: Signal) -> f64 {
        self.latest(vehicle, signal).unwrap_or(0.0)
    }

    /// Invalidates the cache; the next sweep rebuilds it from the log start.
    pub fn reset(&mut self) {
        self.latest.clear();
        self.next_index = 0;
    }

    fn observe(&mut self, event: &TelemetryEvent) {
        if let Some(signal) = event.engine_signal() {
            self.latest
                .insert((event.vehicle.clone(), signal), event.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawRecord;

    fn raw(ts: &str, vehicle: &str, signal: &str, value: f64) -> RawRecord {
        RawRecord {
            timestamp: Some(ts.to_string()),
            vehicle_id: Some(vehicle.to_string()),
            signal_name: Some(signal.to_string()),
            value: Some(value),
        }
    }

    fn store(rows: &[RawRecord]) -> EventStore {
        EventStore::new(EventLog::ingest(rows).unwrap())
    }

    #[test]
    fn roster_is_sorted_and_deduplicated() {
        let s = store(&[
            raw("2024-06-01T14:00:00Z", "GR-02", "speed", 1.0),
            raw("2024-06-01T14:00:01Z", "GR-01", "speed", 2.0),
            raw("2024-06-01T14:00:02Z", "GR-02", "speed", 3.0),
        ]);
        let names: Vec<_> = s.vehicles().iter().map(VehicleId::as_str).collect();
        assert_eq!(names, vec!["GR-01", "GR-02"]);
    }

    #[test]
    fn track_length_is_max_observed_lap_distance() {
        let s = store(&[
            raw("2024-06-01T14:00:00Z", "GR-01", "lap_distance", 1200.0),
            raw("2024-06-01T14:00:01Z", "GR-01", "lap_distance", 3900.0),
            raw("2024-06-01T14:00:02Z", "GR-01", "lap_distance", 100.0),
        ]);
        assert!((s.track_length() - 3900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn track_length_falls_back_without_signal() {
        let s = store(&[raw("2024-06-01T14:00:00Z", "GR-01", "speed", 100.0)]);
        assert!((s.track_length() - 4000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sweeper_tracks_latest_value_per_signal() {
        let s = store(&[
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 100.0),
            raw("2024-06-01T14:00:01Z", "GR-01", "speed", 110.0),
            raw("2024-06-01T14:00:02Z", "GR-01", "rpm", 7000.0),
            raw("2024-06-01T14:00:03Z", "GR-01", "speed", 120.0),
        ]);
        let vehicle = VehicleId::new("GR-01").unwrap();

        let mut sweeper = SignalSweeper::new();
        sweeper.advance_to(&s, 1);
        assert_eq!(sweeper.latest(&vehicle, Signal::Speed), Some(110.0));
        assert_eq!(sweeper.latest(&vehicle, Signal::Rpm), None);

        sweeper.advance_to(&s, 3);
        assert_eq!(sweeper.latest(&vehicle, Signal::Speed), Some(120.0));
        assert_eq!(sweeper.latest(&vehicle, Signal::Rpm), Some(7000.0));
    }

    #[test]
    fn sweeper_ignores_backward_moves() {
        let s = store(&[
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 100.0),
            raw("2024-06-01T14:00:01Z", "GR-01", "speed", 110.0),
        ]);
        let vehicle = VehicleId::new("GR-01").unwrap();

        let mut sweeper = SignalSweeper::new();
        sweeper.advance_to(&s, 1);
        sweeper.advance_to(&s, 0);
        assert_eq!(sweeper.latest(&vehicle, Signal::Speed), Some(110.0));
    }

    #[test]
    fn sweeper_reset_rebuilds_from_empty() {
        let s = store(&[
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 100.0),
            raw("2024-06-01T14:00:01Z", "GR-01", "speed", 110.0),
        ]);
        let vehicle = VehicleId::new("GR-01").unwrap();

        let mut sweeper = SignalSweeper::new();
        sweeper.advance_to(&s, 1);
        sweeper.reset();
        assert_eq!(sweeper.latest(&vehicle, Signal::Speed), None);

        sweeper.advance_to(&s, 0);
        assert_eq!(sweeper.latest(&vehicle, Signal::Speed), Some(100.0));
    }

    #[test]
    fn elapsed_fraction_clamps() {
        let s = store(&[
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 100.0),
            raw("2024-06-01T14:01:40Z", "GR-01", "speed", 110.0),
        ]);
        let (start, end) = s.time_range().unwrap();
        assert!((s.elapsed_fraction(start) - 0.0).abs() < f64::EPSILON);
        assert!((s.elapsed_fraction(end) - 1.0).abs() < f64::EPSILON);
        let mid = start + chrono::Duration::seconds(50);
        assert!((s.elapsed_fraction(mid) - 0.5).abs() < 1e-9);
    }
}
