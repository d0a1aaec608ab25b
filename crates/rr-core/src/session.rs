//! Replay session: the owning façade over the engine.
//!
//! One session owns the loaded [`EventStore`], the caution list computed at
//! load, and all per-replay mutable state (cursor, caches, advisory
//! bridge). Ticks are cooperative and synchronous: `advance → sweep →
//! reconstruct → advise` runs to completion before the snapshot is handed
//! to the presentation layer. Nothing here is global; drop the session and
//! every trace of the replay goes with it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::advisory::{AdvisoryBridge, AdvisoryDecision, PitClassifier};
use crate::caution::{
    CautionConfig, CautionPeriod, CautionSummary, caution_at, detect_cautions, summarize,
};
use crate::playback::{PlaybackConfig, PlaybackCursor, PlaybackMode};
use crate::reconstruct::{ReconstructConfig, Reconstructor, VehicleSnapshot};
use crate::store::{EventStore, SignalSweeper, delta_seconds};
use crate::types::{CircuitId, VehicleId};

/// Aggregated engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub caution: CautionConfig,
    pub playback: PlaybackConfig,
    pub reconstruct: ReconstructConfig,
}

/// Flag state at the cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "flag", rename_all = "lowercase")]
pub enum CautionStatus {
    /// Racing conditions.
    Green,
    /// Inside a caution period.
    Yellow {
        period: CautionPeriod,
        /// Seconds until the caution lifts.
        remaining_secs: f64,
    },
}

impl CautionStatus {
    /// Whether a caution is active.
    #[must_use]
    pub const fn is_yellow(&self) -> bool {
        matches!(self, Self::Yellow { .. })
    }
}

/// Everything the presentation layer needs for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct RaceSnapshot {
    /// Timestamp of the event at the cursor; `None` for an empty log.
    pub time: Option<DateTime<Utc>>,
    /// Seconds into the recording at the cursor.
    pub elapsed_secs: f64,
    /// Total seconds covered by the recording.
    pub total_secs: f64,
    /// Cursor position.
    pub index: usize,
    /// Log length.
    pub total_events: usize,
    pub mode: PlaybackMode,
    /// The leader's lap counter.
    pub lap: u32,
    pub leader: Option<VehicleId>,
    pub caution: CautionStatus,
    /// Per-vehicle snapshots in rank order.
    pub vehicles: Vec<VehicleSnapshot>,
    /// Sticky pit advisories, sorted by vehicle.
    pub advisories: Vec<AdvisoryDecision>,
}

/// A loaded replay, ready to tick.
#[derive(Debug)]
pub struct ReplaySession {
    store: EventStore,
    cautions: Vec<CautionPeriod>,
    cursor: PlaybackCursor,
    sweeper: SignalSweeper,
    reconstructor: Reconstructor,
    bridge: AdvisoryBridge,
}

impl ReplaySession {
    /// Builds a session from a loaded store, detecting cautions once.
    #[must_use]
    pub fn new(store: EventStore, config: &EngineConfig) -> Self {
        let cautions = detect_cautions(&store, &config.caution);
        tracing::info!(
            events = store.len(),
            vehicles = store.vehicles().len(),
            cautions = cautions.len(),
            "replay session loaded"
        );
        let cursor = PlaybackCursor::new(store.len(), config.playback.clone());
        Self {
            cautions,
            cursor,
            sweeper: SignalSweeper::new(),
            reconstructor: Reconstructor::new(config.reconstruct.clone()),
            bridge: AdvisoryBridge::new(),
            store,
        }
    }

    /// Attaches a pit classifier and the circuit it should be queried for.
    #[must_use]
    pub fn with_classifier(
        mut self,
        classifier: Box<dyn PitClassifier>,
        circuit: CircuitId,
        circuit_code: i64,
    ) -> Self {
        self.bridge = AdvisoryBridge::new().with_classifier(classifier, circuit, circuit_code);
        self
    }

    /// The loaded store.
    #[must_use]
    pub const fn store(&self) -> &EventStore {
        &self.store
    }

    /// The caution periods detected at load.
    #[must_use]
    pub fn cautions(&self) -> &[CautionPeriod] {
        &self.cautions
    }

    /// Aggregate caution statistics; `None` for a caution-free race.
    #[must_use]
    pub fn caution_summary(&self) -> Option<CautionSummary> {
        summarize(&self.cautions)
    }

    /// Current playback mode.
    #[must_use]
    pub const fn mode(&self) -> PlaybackMode {
        self.cursor.mode()
    }

    /// Current cursor index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.cursor.index()
    }

    /// Begins or resumes playback.
    pub fn play(&mut self) {
        self.cursor.start();
    }

    /// Pauses playback.
    pub fn pause(&mut self) {
        self.cursor.pause();
    }

    /// Sets the playback rate multiplier.
    pub fn set_rate(&mut self, rate: u32) {
        self.cursor.set_rate(rate);
    }

    /// Moves the cursor forward to `index` without playing.
    pub fn seek(&mut self, index: usize) {
        self.cursor.seek(index);
    }

    /// Full reset: cursor to zero, caches rebuilt from empty, advisory
    /// cache cleared. The store and caution list are untouched.
    pub fn reset(&mut self) {
        self.cursor.reset();
        self.sweeper.reset();
        self.reconstructor.reset();
        self.bridge.clear();
    }

    /// Runs one tick: advance the cursor, then recompute the frame.
    pub fn tick(&mut self) -> RaceSnapshot {
        self.cursor.advance();
        self.compose()
    }

    /// Recomputes the frame at the current cursor without advancing.
    pub fn snapshot(&mut self) -> RaceSnapshot {
        self.compose()
    }

    fn compose(&mut self) -> RaceSnapshot {
        let index = self.cursor.index();
        self.sweeper.advance_to(&self.store, index);
        self.reconstructor.advance_to(&self.store, index);

        let time = self.store.log().get(index).map(|e| e.timestamp);
        let field = self.reconstructor.compute(&self.store, &self.sweeper, index);

        let caution = time
            .and_then(|t| caution_at(&self.cautions, t).map(|p| (p.clone(), t)))
            .map_or(CautionStatus::Green, |(period, t)| CautionStatus::Yellow {
                remaining_secs: delta_seconds(period.end - t).max(0.0),
                period,
            });

        if let CautionStatus::Yellow { period, .. } = &caution {
            self.bridge.evaluate(&self.store, period, &field);
        }

        let elapsed_secs = match (self.store.time_range(), time) {
            (Some((start, _)), Some(t)) => delta_seconds(t - start),
            _ => 0.0,
        };

        RaceSnapshot {
            time,
            elapsed_secs,
            total_secs: self.store.total_seconds(),
            index,
            total_events: self.store.len(),
            mode: self.cursor.mode(),
            lap: field.lap,
            leader: field.leader,
            caution,
            vehicles: field.vehicles,
            advisories: self.bridge.advisories(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::{ClassifierError, FeatureVector, PitDecision, Prediction};
    use crate::event::{EventLog, RawRecord};
    use crate::types::Confidence;

    fn raw(secs: usize, vehicle: &str, signal: &str, value: f64) -> RawRecord {
        RawRecord {
            timestamp: Some(format!(
                "2024-06-01T14:{:02}:{:02}Z",
                secs / 60,
                secs % 60
            )),
            vehicle_id: Some(vehicle.to_string()),
            signal_name: Some(signal.to_string()),
            value: Some(value),
        }
    }

    /// A log with a 50-second field-wide caution in the middle.
    fn caution_rows() -> Vec<RawRecord> {
        let mut rows = Vec::new();
        for i in 0..150 {
            let speed = if (40..90).contains(&i) { 15.0 } else { 80.0 };
            rows.push(raw(i, "A", "speed", speed));
            rows.push(raw(i, "B", "speed", speed));
        }
        rows
    }

    fn session(rows: &[RawRecord]) -> ReplaySession {
        let store = EventStore::new(EventLog::ingest(rows).unwrap());
        ReplaySession::new(store, &EngineConfig::default())
    }

    struct AlwaysPit;

    impl PitClassifier for AlwaysPit {
        fn predict(
            &self,
            _features: &FeatureVector,
            _circuit: &CircuitId,
        ) -> Result<Prediction, ClassifierError> {
            Ok(Prediction {
                decision: PitDecision::Pit,
                confidence: Confidence::clamped(0.95),
                pit_probability: Confidence::clamped(0.8),
            })
        }
    }

    struct AlwaysFails;

    impl PitClassifier for AlwaysFails {
        fn predict(
            &self,
            _features: &FeatureVector,
            _circuit: &CircuitId,
        ) -> Result<Prediction, ClassifierError> {
            Err("boom".into())
        }
    }

    #[test]
    fn tick_runs_to_the_end_and_stops() {
        let mut s = session(&caution_rows());
        s.play();
        s.set_rate(25);

        let mut snapshots = 0;
        while s.mode() == PlaybackMode::Playing {
            let snap = s.tick();
            assert!(snap.index < snap.total_events);
            snapshots += 1;
            assert!(snapshots < 1000, "replay never terminated");
        }

        assert_eq!(s.index(), s.store().len() - 1);
        assert_eq!(s.mode(), PlaybackMode::Stopped);
    }

    #[test]
    fn caution_status_goes_yellow_inside_the_period() {
        let mut s = session(&caution_rows());
        assert_eq!(s.cautions().len(), 1);

        // Index 130 lands at second 65, inside the 40s..90s caution.
        s.seek(130);
        let snap = s.snapshot();
        assert!(snap.caution.is_yellow());
        if let CautionStatus::Yellow { remaining_secs, .. } = snap.caution {
            assert!(remaining_secs > 0.0);
        }
    }

    #[test]
    fn advisories_appear_during_caution_and_stick_afterward() {
        let store = EventStore::new(EventLog::ingest(&caution_rows()).unwrap());
        let mut s = ReplaySession::new(store, &EngineConfig::default()).with_classifier(
            Box::new(AlwaysPit),
            CircuitId::new("indianapolis").unwrap(),
            1,
        );

        s.seek(130);
        let during = s.snapshot();
        assert!(during.caution.is_yellow());
        assert_eq!(during.advisories.len(), 2);
        assert_eq!(during.advisories[0].decision, PitDecision::Pit);

        // After the caution lifts the decision is still displayed.
        s.seek(s.store().len() - 1);
        let after = s.snapshot();
        assert!(!after.caution.is_yellow());
        assert_eq!(after.advisories.len(), 2);
    }

    #[test]
    fn failing_classifier_yields_no_advisories_and_playback_continues() {
        let store = EventStore::new(EventLog::ingest(&caution_rows()).unwrap());
        let mut s = ReplaySession::new(store, &EngineConfig::default()).with_classifier(
            Box::new(AlwaysFails),
            CircuitId::new("indianapolis").unwrap(),
            1,
        );

        s.play();
        s.set_rate(2);
        while s.mode() == PlaybackMode::Playing {
            let snap = s.tick();
            assert!(snap.advisories.is_empty());
        }
        assert_eq!(s.index(), s.store().len() - 1);
    }

    #[test]
    fn reset_clears_cursor_caches_and_advisories() {
        let store = EventStore::new(EventLog::ingest(&caution_rows()).unwrap());
        let mut s = ReplaySession::new(store, &EngineConfig::default()).with_classifier(
            Box::new(AlwaysPit),
            CircuitId::new("indianapolis").unwrap(),
            1,
        );

        s.seek(130);
        assert!(!s.snapshot().advisories.is_empty());

        s.reset();
        assert_eq!(s.index(), 0);
        assert_eq!(s.mode(), PlaybackMode::Stopped);
        let snap = s.snapshot();
        assert!(snap.advisories.is_empty());
    }

    #[test]
    fn snapshot_does_not_advance_the_cursor() {
        let mut s = session(&caution_rows());
        s.play();
        let before = s.index();
        let _ = s.snapshot();
        assert_eq!(s.index(), before);
    }

    #[test]
    fn empty_log_snapshot_is_degenerate_but_total() {
        let mut s = session(&[]);
        let snap = s.snapshot();
        assert!(snap.time.is_none());
        assert_eq!(snap.total_events, 0);
        assert!(snap.vehicles.is_empty());
        assert_eq!(snap.caution, CautionStatus::Green);
    }

    #[test]
    fn caution_summary_matches_detected_periods() {
        let s = session(&caution_rows());
        let summary = s.caution_summary().unwrap();
        assert_eq!(summary.count, 1);
        assert!(summary.total_secs >= 30.0);
    }
}
