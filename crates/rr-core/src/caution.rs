//! Caution ("yellow flag") detection.
//!
//! A caution is a sustained low-speed interval. Detection is a pure
//! function of the loaded log, run once at load time: speed readings are
//! pooled across all vehicles, bucketed into fixed windows, and a caution
//! opens when a windowed mean first drops below the threshold and closes
//! when it recovers. Pooling the whole field into one average conflates
//! field-wide cautions with single-vehicle slowdowns; that is the
//! documented behavior, not an accident of implementation.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::event::Signal;
use crate::store::{EventStore, delta_seconds};

/// Configuration for caution detection.
#[derive(Debug, Clone)]
pub struct CautionConfig {
    /// Windowed mean speed below this value opens a caution. Default: 50.0.
    pub speed_threshold: f64,

    /// Width of the averaging windows in seconds. Default: 5.
    pub window_secs: i64,

    /// Intervals shorter than this are discarded. Default: 30 seconds.
    pub min_duration_secs: i64,
}

impl Default for CautionConfig {
    fn default() -> Self {
        Self {
            speed_threshold: 50.0,
            window_secs: 5,
            min_duration_secs: 30,
        }
    }
}

/// A detected caution interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CautionPeriod {
    /// Start of the first low-speed window.
    pub start: DateTime<Utc>,
    /// Start of the first recovered window.
    pub end: DateTime<Utc>,
}

impl CautionPeriod {
    /// Interval length in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        delta_seconds(self.end - self.start)
    }

    /// Whether `time` falls inside this interval (inclusive bounds).
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start <= time && time <= self.end
    }
}

impl Serialize for CautionPeriod {
    /// Serialized with the derived duration so consumers see the full
    /// `{start, end, duration}` shape without recomputing it.
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("CautionPeriod", 3)?;
        state.serialize_field("start", &self.start)?;
        state.serialize_field("end", &self.end)?;
        state.serialize_field("duration_secs", &self.duration_secs())?;
        state.end()
    }
}

/// Detects caution periods over the full log.
///
/// Total function: a log without speed readings yields an empty list. An
/// interval still open at the end of the log is discarded. The returned
/// periods are non-overlapping and sorted by start time.
#[must_use]
pub fn detect_cautions(store: &EventStore, config: &CautionConfig) -> Vec<CautionPeriod> {
    let window_secs = config.window_secs.max(1);

    // Mean speed per fixed window, pooled across vehicles. BTreeMap keeps
    // the windows in ascending time order.
    let mut windows: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for event in store.log().events() {
        if event.engine_signal() != Some(Signal::Speed) {
            continue;
        }
        let bucket = event.timestamp.timestamp().div_euclid(window_secs) * window_secs;
        let entry = windows.entry(bucket).or_insert((0.0, 0));
        entry.0 += event.value;
        entry.1 += 1;
    }

    let mut periods = Vec::new();
    let mut open: Option<i64> = None;

    for (&bucket, &(sum, count)) in &windows {
        let mean = sum / f64::from(count);
        match open {
            None if mean < config.speed_threshold => open = Some(bucket),
            Some(start) if mean >= config.speed_threshold => {
                if bucket - start >= config.min_duration_secs {
                    periods.push(CautionPeriod {
                        start: window_time(start),
                        end: window_time(bucket),
                    });
                }
                open = None;
            }
            _ => {}
        }
    }
    // An interval still open at the end of the log is not reported.

    periods
}

/// Returns the caution containing `time`, if any.
#[must_use]
pub fn caution_at(periods: &[CautionPeriod], time: DateTime<Utc>) -> Option<&CautionPeriod> {
    periods.iter().find(|p| p.contains(time))
}

/// Aggregate statistics over a race's caution periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CautionSummary {
    /// Number of retained periods.
    pub count: usize,
    /// Sum of all durations in seconds.
    pub total_secs: f64,
    /// Mean duration in seconds.
    pub mean_secs: f64,
    /// Longest period.
    pub longest: CautionPeriod,
    /// Shortest period.
    pub shortest: CautionPeriod,
}

/// Summarizes detected periods; `None` when the list is empty.
#[must_use]
pub fn summarize(periods: &[CautionPeriod]) -> Option<CautionSummary> {
    let first = periods.first()?;
    let total_secs: f64 = periods.iter().map(CautionPeriod::duration_secs).sum();
    let mut longest = first;
    let mut shortest = first;
    for period in periods {
        if period.duration_secs() > longest.duration_secs() {
            longest = period;
        }
        if period.duration_secs() < shortest.duration_secs() {
            shortest = period;
        }
    }
    #[expect(
        clippy::cast_precision_loss,
        reason = "period counts are small"
    )]
    let mean_secs = total_secs / periods.len() as f64;
    Some(CautionSummary {
        count: periods.len(),
        total_secs,
        mean_secs,
        longest: longest.clone(),
        shortest: shortest.clone(),
    })
}

fn window_time(epoch_secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(epoch_secs, 0).single().unwrap_or_default()
}
