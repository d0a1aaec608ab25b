//! Replay engine core for race telemetry.
//!
//! This crate reconstructs live race state from a recorded long-format
//! telemetry log:
//! - Event log: validated, time-ordered readings with no position fields
//! - Caution detection: windowed speed averaging over the whole log
//! - Playback: a monotonically advancing cursor driven by external ticks
//! - Reconstruction: ranking, laps, sectors, gaps, and wear estimates
//! - Advisories: pit decisions from an external classifier behind a trait

pub mod advisory;
pub mod caution;
pub mod event;
pub mod loader;
pub mod playback;
pub mod reconstruct;
pub mod session;
pub mod store;
pub mod types;

pub use advisory::{
    AdvisoryBridge, AdvisoryDecision, ClassifierError, FEATURE_SCHEMA, FeatureVector,
    PitClassifier, PitDecision, Prediction,
};
pub use caution::{CautionConfig, CautionPeriod, CautionSummary, detect_cautions, summarize};
pub use event::{EventLog, RawRecord, Signal, TelemetryEvent};
pub use loader::{LoadError, LoadTask, load, load_in_background};
pub use playback::{PlaybackConfig, PlaybackCursor, PlaybackMode};
pub use reconstruct::{
    FieldState, ReconstructConfig, Reconstructor, Sector, TrackSection, VehicleSnapshot,
};
pub use session::{CautionStatus, EngineConfig, RaceSnapshot, ReplaySession};
pub use store::{EventStore, SignalSweeper};
pub use types::{CircuitId, Confidence, ValidationError, VehicleId};
