//! Pit-stop advisories from the external classifier.
//!
//! The classifier itself is an external collaborator consumed only through
//! [`PitClassifier`]. The bridge is active only while the cursor sits
//! inside a caution period: it assembles one feature vector per vehicle,
//! queries the classifier once per `(caution, vehicle)` pair, and keeps the
//! latest decision per vehicle until a later caution supersedes it. A
//! failing or absent classifier degrades to "no advisory" and never
//! disturbs playback.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::caution::CautionPeriod;
use crate::event::Signal;
use crate::reconstruct::FieldState;
use crate::store::EventStore;
use crate::types::{CircuitId, Confidence, VehicleId};

/// Caution longer than this is a "long" caution, seconds.
const LONG_CAUTION_SECS: f64 = 300.0;
/// Caution shorter than this is a "short" caution, seconds.
const SHORT_CAUTION_SECS: f64 = 60.0;
/// Mean speed below this marks a near-standstill caution.
const VERY_LOW_SPEED: f64 = 10.0;

/// Feature names in the exact order the classifier was trained with.
///
/// This order is part of the prediction contract; the classifier rejects
/// or silently misreads vectors assembled differently.
pub const FEATURE_SCHEMA: [&str; 9] = [
    "yellow_duration",
    "min_speed",
    "avg_speed",
    "speed_variance",
    "is_long_yellow",
    "is_short_yellow",
    "very_low_speed",
    "circuit_encoded",
    "race_encoded",
];

/// Typed feature vector for one vehicle in one caution period.
///
/// Derived features (variance, the three flags) are computed from the base
/// measurements so they cannot drift out of agreement with them.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Caution length in seconds.
    pub caution_duration_secs: f64,
    /// Minimum speed the vehicle reached inside the caution window.
    pub min_speed: f64,
    /// Mean speed of the vehicle inside the caution window.
    pub avg_speed: f64,
    /// Encoded circuit, from the externally supplied lookup table.
    pub circuit_code: i64,
    /// Encoded race; the contract defaults this to 0.
    pub race_code: i64,
}

impl FeatureVector {
    /// Builds a vector with the default race encoding.
    #[must_use]
    pub const fn new(
        caution_duration_secs: f64,
        min_speed: f64,
        avg_speed: f64,
        circuit_code: i64,
    ) -> Self {
        Self {
            caution_duration_secs,
            min_speed,
            avg_speed,
            circuit_code,
            race_code: 0,
        }
    }

    /// Spread between mean and minimum speed.
    #[must_use]
    pub fn speed_variance(&self) -> f64 {
        self.avg_speed - self.min_speed
    }

    /// Values in [`FEATURE_SCHEMA`] order.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "encoded circuit/race labels are small integers"
    )]
    pub fn to_values(&self) -> [f64; 9] {
        [
            self.caution_duration_secs,
            self.min_speed,
            self.avg_speed,
            self.speed_variance(),
            f64::from(u8::from(self.caution_duration_secs > LONG_CAUTION_SECS)),
            f64::from(u8::from(self.caution_duration_secs < SHORT_CAUTION_SECS)),
            f64::from(u8::from(self.avg_speed < VERY_LOW_SPEED)),
            self.circuit_code as f64,
            self.race_code as f64,
        ]
    }
}

/// The classifier's verdict for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PitDecision {
    Pit,
    NoPit,
}

impl PitDecision {
    /// Contract string form ("PIT" / "NO_PIT").
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pit => "PIT",
            Self::NoPit => "NO_PIT",
        }
    }
}

/// A raw prediction from the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub decision: PitDecision,
    pub confidence: Confidence,
    pub pit_probability: Confidence,
}

/// Error type classifiers may surface; the bridge only logs it.
pub type ClassifierError = Box<dyn std::error::Error + Send + Sync>;

/// The prediction contract the engine consumes.
///
/// Implementations wrap whatever transport the deployment uses (the
/// bundled HTTP client, a test stub). Errors degrade gracefully: the
/// bridge records no new decision and playback continues. `Send` so a
/// session carrying a classifier can come back from the loader's worker
/// thread.
pub trait PitClassifier: Send {
    /// Predicts the pit decision for one feature vector.
    fn predict(
        &self,
        features: &FeatureVector,
        circuit: &CircuitId,
    ) -> Result<Prediction, ClassifierError>;
}

/// A pit advisory retained for display.
///
/// Sticky: the most recent decision per vehicle stays visible until a
/// later caution period produces a new one, or a full reset clears it.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisoryDecision {
    pub vehicle: VehicleId,
    pub decision: PitDecision,
    pub confidence: Confidence,
    pub pit_probability: Confidence,
    /// Tire wear estimate (0-100) at the time of the decision.
    pub tire_wear: f64,
    /// Distance to the pit entry, folded to the nearer side of the
    /// start/finish line, meters.
    pub distance_to_pits_m: f64,
    /// Start of the caution period that produced this decision.
    pub caution_start: DateTime<Utc>,
}

/// A classifier together with the circuit it answers for.
struct ActiveClassifier {
    classifier: Box<dyn PitClassifier>,
    circuit: CircuitId,
    circuit_code: i64,
}

/// Owns the per-vehicle decision cache and talks to the classifier.
#[derive(Default)]
pub struct AdvisoryBridge {
    active: Option<ActiveClassifier>,
    decisions: HashMap<VehicleId, AdvisoryDecision>,
}

impl std::fmt::Debug for AdvisoryBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisoryBridge")
            .field("circuit", &self.active.as_ref().map(|a| &a.circuit))
            .field("decisions", &self.decisions.len())
            .finish()
    }
}

impl AdvisoryBridge {
    /// Creates a bridge without a classifier; advisories stay empty until
    /// one is attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a classifier and the circuit it should be queried for.
    #[must_use]
    pub fn with_classifier(
        mut self,
        classifier: Box<dyn PitClassifier>,
        circuit: CircuitId,
        circuit_code: i64,
    ) -> Self {
        self.active = Some(ActiveClassifier {
            classifier,
            circuit,
            circuit_code,
        });
        self
    }

    /// Evaluates the field during a caution period.
    ///
    /// Each `(caution, vehicle)` pair is queried once; later ticks inside
    /// the same caution reuse the cached decision. Classifier errors are
    /// logged and skipped, leaving the cache untouched.
    pub fn evaluate(&mut self, store: &EventStore, period: &CautionPeriod, field: &FieldState) {
        let Some(active) = &self.active else {
            return;
        };

        for snapshot in &field.vehicles {
            let already_decided = self
                .decisions
                .get(&snapshot.vehicle)
                .is_some_and(|d| d.caution_start == period.start);
            if already_decided {
                continue;
            }

            let Some((min_speed, avg_speed)) =
                caution_speed_stats(store, period, &snapshot.vehicle)
            else {
                continue;
            };

            let features = FeatureVector::new(
                period.duration_secs(),
                min_speed,
                avg_speed,
                active.circuit_code,
            );

            match active.classifier.predict(&features, &active.circuit) {
                Ok(prediction) => {
                    self.decisions.insert(
                        snapshot.vehicle.clone(),
                        AdvisoryDecision {
                            vehicle: snapshot.vehicle.clone(),
                            decision: prediction.decision,
                            confidence: prediction.confidence,
                            pit_probability: prediction.pit_probability,
                            tire_wear: snapshot.tire_wear,
                            distance_to_pits_m: distance_to_pits(
                                snapshot.lap_distance,
                                store.track_length(),
                            ),
                            caution_start: period.start,
                        },
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        vehicle = %snapshot.vehicle,
                        %error,
                        "classifier unavailable, keeping prior advisory"
                    );
                }
            }
        }
    }

    /// Current advisories, sorted by vehicle for deterministic output.
    #[must_use]
    pub fn advisories(&self) -> Vec<AdvisoryDecision> {
        let mut all: Vec<AdvisoryDecision> = self.decisions.values().cloned().collect();
        all.sort_by(|a, b| a.vehicle.cmp(&b.vehicle));
        all
    }

    /// Drops every cached decision. Called on full reset only.
    pub fn clear(&mut self) {
        self.decisions.clear();
    }
}

/// Minimum and mean speed of one vehicle inside a caution window, from the
/// full log. `None` when the vehicle reported no speed there.
#[must_use]
pub fn caution_speed_stats(
    store: &EventStore,
    period: &CautionPeriod,
    vehicle: &VehicleId,
) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut sum = 0.0;
    let mut count = 0u32;
    for event in store.log().events() {
        if event.timestamp < period.start {
            continue;
        }
        if event.timestamp > period.end {
            break;
        }
        if event.engine_signal() == Some(Signal::Speed) && &event.vehicle == vehicle {
            min = min.min(event.value);
            sum += event.value;
            count += 1;
        }
    }
    (count > 0).then(|| (min, sum / f64::from(count)))
}

/// Distance to the pit entry assuming pits sit at the start/finish line.
fn distance_to_pits(lap_distance: f64, track_length: f64) -> f64 {
    if lap_distance < track_length / 2.0 {
        lap_distance
    } else {
        track_length - lap_distance
    }
}
