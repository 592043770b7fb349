//! Hardware generation classification.
//!
//! Two incompatible record formats exist across the logger's hardware
//! revisions. The classifier inspects either a directory of log files or the
//! device's state file and tags the session with a [`Generation`], which
//! drives every downstream parsing rule.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlightLogError, LogResult};

/// Marker present only in modern-generation device state files.
const MODERN_STATE_MARKER: &str = "FUS_Ver";
/// Marker present only in legacy-generation device state files.
const LEGACY_STATE_MARKER: &str = "Firmware version";

/// File stem identifying the onboard sensor log of a modern session.
pub const SENSOR_FILE_STEM: &str = "SENSOR";

/// Hardware generation of a logging session.
///
/// Immutable once classified; determines all downstream parsing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// Single GPS-only channel, fixed two-row header.
    Legacy,
    /// Multi-channel, metadata-prefixed header with explicit section delimiter.
    Modern,
}

/// Classify the hardware generation from the contents of a log directory.
///
/// The directory is assumed to contain a single log session; no recursion is
/// performed. The heuristic is a simple one: the presence of a `SENSOR.CSV`
/// file marks a modern session, otherwise legacy. Trimmed data files, if
/// present, are not considered.
pub fn classify_log_dir(log_dir: &Path) -> LogResult<Generation> {
    let mut saw_csv = false;
    let mut saw_sensor = false;
    for entry in std::fs::read_dir(log_dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            continue;
        }

        saw_csv = true;
        if path
            .file_stem()
            .is_some_and(|stem| stem == SENSOR_FILE_STEM)
        {
            saw_sensor = true;
        }
    }

    if !saw_csv {
        return Err(FlightLogError::NoLogsFound);
    }

    let generation = if saw_sensor {
        Generation::Modern
    } else {
        Generation::Legacy
    };
    debug!(?generation, dir = %log_dir.display(), "classified log directory");

    Ok(generation)
}

/// Classify the hardware generation from raw device state text.
///
/// The structure of the state file differs significantly enough between the
/// two hardware revisions that a marker-token search reliably distinguishes
/// them.
pub fn classify_device_state(device_state: &str) -> LogResult<Generation> {
    if device_state.contains(MODERN_STATE_MARKER) {
        Ok(Generation::Modern)
    } else if device_state.contains(LEGACY_STATE_MARKER) {
        Ok(Generation::Legacy)
    } else {
        Err(FlightLogError::UnknownDevice)
    }
}

/// Classify the hardware generation from a device state file on disk.
pub fn classify_device(state_filepath: &Path) -> LogResult<Generation> {
    if !state_filepath.exists() {
        return Err(FlightLogError::NoDeviceState);
    }

    let device_state = std::fs::read_to_string(state_filepath)?;
    classify_device_state(&device_state)
}

/// Parse raw `param: value` pairs from a device state or configuration file.
///
/// Parameters are returned in their raw string form. `;` is treated as a
/// comment character; any text following it on a line is ignored, and blank
/// lines are skipped.
pub fn parse_device_params(filepath: &Path) -> LogResult<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(filepath)?;

    let mut params = BTreeMap::new();
    for line in contents.lines() {
        if line.trim().is_empty() || line.starts_with(';') {
            continue;
        }

        let kv_pair = line.split(';').next().unwrap_or_default().trim();
        if kv_pair.is_empty() {
            continue;
        }

        let (param, value) = kv_pair.split_once(':').ok_or_else(|| {
            FlightLogError::RawLogParse(format!(
                "Malformed device parameter line: '{line}'"
            ))
        })?;
        params.insert(param.trim().to_string(), value.trim().to_string());
    }

    Ok(params)
}
