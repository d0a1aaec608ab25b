//! JSONL telemetry log reading.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use rr_core::RawRecord;

/// Reads a JSONL log into raw rows, one object per line.
///
/// Blank lines are skipped. Field validation happens later during ingest;
/// this only requires each line to be a JSON object.
pub fn read_rows(path: &Path) -> Result<Vec<RawRecord>> {
    let file =
        File::open(path).with_context(|| format!("failed to open log {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", number + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let row: RawRecord = serde_json::from_str(&line)
            .with_context(|| format!("line {} is not a telemetry row", number + 1))?;
        rows.push(row);
    }

    tracing::debug!(rows = rows.len(), path = %path.display(), "read telemetry log");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_rows_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2024-06-01T14:00:00Z","vehicle_id":"GR-01","signal_name":"speed","value":80.0}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2024-06-01T14:00:01Z","vehicle_id":"GR-01","signal_name":"speed","value":81.0}}"#
        )
        .unwrap();

        let rows = read_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vehicle_id.as_deref(), Some("GR-01"));
    }

    #[test]
    fn reports_the_offending_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        let err = read_rows(file.path()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(read_rows(Path::new("/nonexistent/race.jsonl")).is_err());
    }
}
