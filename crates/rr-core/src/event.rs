//! Raw telemetry rows and the ordered event log.
//!
//! Input logs arrive in long format: one row per `(timestamp, vehicle,
//! signal)` reading, with no explicit position or lap fields. [`EventLog`]
//! validates the rows, normalizes signal names, and fixes the global replay
//! order: ascending timestamp, ties broken by original arrival order.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{ValidationError, VehicleId};

/// The fixed signal vocabulary the reconstructor consumes.
///
/// Wire names follow the recording format (`acc_x`, `aps`, ...); the enum
/// carries the semantic reading of each channel. Rows with signals outside
/// this set are stored but ignored by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Vehicle speed in speed units (km/h in the sample logs).
    Speed,
    /// Selected gear.
    Gear,
    /// Engine revolutions per minute.
    Rpm,
    /// Front brake pressure, percent.
    BrakeFront,
    /// Rear brake pressure, percent.
    BrakeRear,
    /// Steering angle in degrees.
    Steering,
    /// Lateral acceleration in g (`acc_x` on the wire).
    AccLateral,
    /// Longitudinal acceleration in g (`acc_y` on the wire).
    AccLongitudinal,
    /// Throttle position (`aps` on the wire).
    Throttle,
    /// Odometer-like distance into the current lap, meters.
    LapDistance,
}

impl Signal {
    /// Every signal the engine consumes.
    pub const ALL: [Self; 10] = [
        Self::Speed,
        Self::Gear,
        Self::Rpm,
        Self::BrakeFront,
        Self::BrakeRear,
        Self::Steering,
        Self::AccLateral,
        Self::AccLongitudinal,
        Self::Throttle,
        Self::LapDistance,
    ];

    /// Canonical wire name for this signal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Speed => "speed",
            Self::Gear => "gear",
            Self::Rpm => "rpm",
            Self::BrakeFront => "brake_front",
            Self::BrakeRear => "brake_rear",
            Self::Steering => "steering",
            Self::AccLateral => "acc_x",
            Self::AccLongitudinal => "acc_y",
            Self::Throttle => "aps",
            Self::LapDistance => "lap_distance",
        }
    }

    /// Parses a wire name, accepting known aliases.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "speed" => Some(Self::Speed),
            "gear" => Some(Self::Gear),
            "rpm" => Some(Self::Rpm),
            "brake_front" => Some(Self::BrakeFront),
            "brake_rear" => Some(Self::BrakeRear),
            "steering" => Some(Self::Steering),
            "acc_x" => Some(Self::AccLateral),
            "acc_y" => Some(Self::AccLongitudinal),
            "aps" | "throttle" => Some(Self::Throttle),
            "lap_distance" => Some(Self::LapDistance),
            _ => None,
        }
    }
}

/// A loosely-typed telemetry row as read from an input file.
///
/// All fields are optional so that presence can be validated explicitly
/// during ingest rather than failing opaquely at deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    /// RFC 3339 timestamp of the reading.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Identifier of the vehicle the reading belongs to.
    #[serde(default)]
    pub vehicle_id: Option<String>,
    /// Wire name of the signal (e.g., `speed`, `lap_distance`).
    #[serde(default)]
    pub signal_name: Option<String>,
    /// The reading itself.
    #[serde(default)]
    pub value: Option<f64>,
}

/// A validated telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    /// When the reading was recorded.
    pub timestamp: DateTime<Utc>,
    /// The vehicle the reading belongs to.
    pub vehicle: VehicleId,
    /// Normalized wire name of the signal.
    pub signal: String,
    /// The reading. Always finite.
    pub value: f64,
}

impl TelemetryEvent {
    /// Returns the engine signal this event carries, if it is part of the
    /// fixed vocabulary.
    #[must_use]
    pub fn engine_signal(&self) -> Option<Signal> {
        Signal::from_wire(&self.signal)
    }
}

/// The immutable, time-ordered telemetry log.
///
/// Owned exclusively by the session that loaded it; read-only after
/// construction. Timestamps are globally non-decreasing.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<TelemetryEvent>,
}

impl EventLog {
    /// Validates raw rows and builds an ordered log.
    ///
    /// Every row must carry `timestamp`, `vehicle_id`, `signal_name`, and a
    /// finite `value`; an offending row aborts the ingest with a
    /// [`ValidationError`] and nothing is constructed. Rows are sorted by
    /// timestamp with a stable sort, so same-timestamp rows keep their
    /// original arrival order.
    pub fn ingest(rows: &[RawRecord]) -> Result<Self, ValidationError> {
        let events = validate_rows(rows, 0)?;
        Ok(Self::from_events(events))
    }

    /// Builds a log from already-validated events, fixing the replay order.
    #[must_use]
    pub fn from_events(mut events: Vec<TelemetryEvent>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self { events }
    }

    /// Number of events in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log contains no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event at `index`, if in bounds.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TelemetryEvent> {
        self.events.get(index)
    }

    /// All events in replay order.
    #[must_use]
    pub fn events(&self) -> &[TelemetryEvent] {
        &self.events
    }
}

/// Validates a batch of rows into events, reporting errors with row indices
/// offset by `base`.
///
/// Rows are independent, so validation fans out with rayon; order is
/// preserved in the output.
pub(crate) fn validate_rows(
    rows: &[RawRecord],
    base: usize,
) -> Result<Vec<TelemetryEvent>, ValidationError> {
    rows.par_iter()
        .enumerate()
        .map(|(i, row)| validate_row(row, base + i))
        .collect()
}

fn validate_row(row: &RawRecord, index: usize) -> Result<TelemetryEvent, ValidationError> {
    let timestamp = row
        .timestamp
        .as_deref()
        .ok_or(ValidationError::MissingField {
            row: index,
            field: "timestamp",
        })?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidTimestamp {
            row: index,
            value: timestamp.to_string(),
        })?;

    let vehicle_id = row
        .vehicle_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField {
            row: index,
            field: "vehicle_id",
        })?;
    let vehicle = VehicleId::new(vehicle_id)?;

    let signal_name = row
        .signal_name
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField {
            row: index,
            field: "signal_name",
        })?;
    // Normalize aliases (e.g. `throttle` -> `aps`) so downstream lookups
    // see one name per channel.
    let signal = Signal::from_wire(signal_name)
        .map_or_else(|| signal_name.to_string(), |s| s.as_str().to_string());

    let value = row.value.ok_or(ValidationError::MissingField {
        row: index,
        field: "value",
    })?;
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { row: index, value });
    }

    Ok(TelemetryEvent {
        timestamp,
        vehicle,
        signal,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ts: &str, vehicle: &str, signal: &str, value: f64) -> RawRecord {
        RawRecord {
            timestamp: Some(ts.to_string()),
            vehicle_id: Some(vehicle.to_string()),
            signal_name: Some(signal.to_string()),
            value: Some(value),
        }
    }

    #[test]
    fn ingest_sorts_by_timestamp() {
        let rows = vec![
            raw("2024-06-01T14:00:10Z", "GR-01", "speed", 120.0),
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 100.0),
            raw("2024-06-01T14:00:05Z", "GR-02", "speed", 110.0),
        ];

        let log = EventLog::ingest(&rows).unwrap();
        let times: Vec<_> = log.events().iter().map(|e| e.timestamp).collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert!((log.get(0).unwrap().value - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ingest_preserves_arrival_order_for_ties() {
        let rows = vec![
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 1.0),
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 2.0),
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 3.0),
        ];

        let log = EventLog::ingest(&rows).unwrap();
        let values: Vec<_> = log.events().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn ingest_rejects_missing_timestamp() {
        let mut row = raw("2024-06-01T14:00:00Z", "GR-01", "speed", 1.0);
        row.timestamp = None;
        let err = EventLog::ingest(&[row]).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingField {
                field: "timestamp",
                ..
            }
        ));
    }

    #[test]
    fn ingest_rejects_bad_timestamp() {
        let row = RawRecord {
            timestamp: Some("yesterday".to_string()),
            ..raw("", "GR-01", "speed", 1.0)
        };
        let err = EventLog::ingest(&[row]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimestamp { .. }));
    }

    #[test]
    fn ingest_rejects_nan_value() {
        let row = raw("2024-06-01T14:00:00Z", "GR-01", "speed", f64::NAN);
        let err = EventLog::ingest(&[row]).unwrap_err();
        assert!(matches!(err, ValidationError::NonFiniteValue { .. }));
    }

    #[test]
    fn ingest_reports_offending_row_index() {
        let rows = vec![
            raw("2024-06-01T14:00:00Z", "GR-01", "speed", 1.0),
            RawRecord::default(),
        ];
        let err = EventLog::ingest(&rows).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { row: 1, .. }));
    }

    #[test]
    fn ingest_normalizes_throttle_alias() {
        let rows = vec![raw("2024-06-01T14:00:00Z", "GR-01", "throttle", 80.0)];
        let log = EventLog::ingest(&rows).unwrap();
        assert_eq!(log.get(0).unwrap().signal, "aps");
        assert_eq!(log.get(0).unwrap().engine_signal(), Some(Signal::Throttle));
    }

    #[test]
    fn unknown_signals_pass_through() {
        let rows = vec![raw("2024-06-01T14:00:00Z", "GR-01", "fuel_flow", 3.2)];
        let log = EventLog::ingest(&rows).unwrap();
        assert_eq!(log.get(0).unwrap().signal, "fuel_flow");
        assert_eq!(log.get(0).unwrap().engine_signal(), None);
    }

    #[test]
    fn signal_wire_names_roundtrip() {
        for signal in Signal::ALL {
            assert_eq!(Signal::from_wire(signal.as_str()), Some(signal));
        }
    }

    #[test]
    fn raw_record_deserializes_with_missing_fields() {
        let parsed: RawRecord = serde_json::from_str(r#"{"timestamp":"t"}"#).unwrap();
        assert!(parsed.vehicle_id.is_none());
        assert!(parsed.value.is_none());
    }
}
