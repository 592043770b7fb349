//! Session containers aggregating one logging interval's decoded data.
//!
//! A modern-generation session pairs a GPS track with a map of sensor channel
//! tables and the device/session identity decoded from the log header; a
//! legacy session carries only the track. Sessions are constructed by the
//! parse pipelines in [`crate::parse`] or reloaded from a previously exported
//! file tree by [`FlightLog::from_csv`], and are mutated in place by the trim
//! and filter operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::STANDARD_SEA_LEVEL_PRESSURE_PA;
use crate::derive;
use crate::error::{FlightLogError, LogResult};
use crate::generation::Generation;
use crate::table::{DataTable, TrackTable};
use crate::trim;

/// Channel id under which the track schema is stored, for both generations.
pub const TRACK_CHANNEL_ID: &str = "GNSS";

/// Column and unit information for one sensor channel's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSchema {
    /// Ordered column names.
    pub columns: Vec<String>,
    /// Unit strings, parallel to `columns`.
    pub units: Vec<String>,
    /// Channel identifier shared between the header and each record row.
    pub id: String,
}

impl ChannelSchema {
    /// Build a schema, enforcing that columns and units are the same length.
    pub fn new(columns: Vec<String>, units: Vec<String>, id: &str) -> LogResult<Self> {
        if columns.len() != units.len() {
            return Err(FlightLogError::HeaderParse(format!(
                "Channel '{}' declares {} columns but {} units",
                id,
                columns.len(),
                units.len()
            )));
        }

        Ok(Self {
            columns,
            units,
            id: id.to_string(),
        })
    }
}

/// Device and session identity for a modern-generation logger.
///
/// `first_sensor_timestamp` is the raw onboard-clock time of the earliest
/// sensor record; it must be set by the grouping stage before channel tables
/// can be derived. `ground_pressure_pa` is the atmospheric pressure at ground
/// level used by the pressure altitude derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device firmware version string.
    pub firmware_version: String,
    /// Device hardware identifier.
    pub device_id: String,
    /// Logging session identifier.
    pub session_id: String,
    /// Per-channel column/unit schemas, keyed by channel id.
    pub sensor_info: BTreeMap<String, ChannelSchema>,
    /// Hardware generation of the session.
    pub generation: Generation,
    /// Onboard-clock seconds of the earliest sensor record.
    pub first_sensor_timestamp: Option<f64>,
    /// Ground-level atmospheric pressure reference, in Pascals.
    pub ground_pressure_pa: f64,
}

impl DeviceInfo {
    /// Build identity metadata with the default pressure reference.
    pub fn new(
        firmware_version: String,
        device_id: String,
        session_id: String,
        sensor_info: BTreeMap<String, ChannelSchema>,
    ) -> Self {
        Self {
            firmware_version,
            device_id,
            session_id,
            sensor_info,
            generation: Generation::Modern,
            first_sensor_timestamp: None,
            ground_pressure_pa: STANDARD_SEA_LEVEL_PRESSURE_PA,
        }
    }
}

/// Metadata for a legacy-generation logger.
///
/// Legacy hardware has only the GPS sensor; its column names and units are
/// nonetheless stored under the track channel id to align with the structure
/// of the modern metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyDeviceInfo {
    /// Per-channel column/unit schemas (a single track entry).
    pub sensor_info: BTreeMap<String, ChannelSchema>,
    /// Hardware generation of the session.
    pub generation: Generation,
}

/// One decoded legacy-generation logging session.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFlightLog {
    /// GPS track data.
    pub track: TrackTable,
    /// Device metadata.
    pub device_info: LegacyDeviceInfo,
}

impl LegacyFlightLog {
    /// Shift the GPS coordinates so the track begins at the provided location.
    pub fn normalize_gps(&mut self, start_coord: (f64, f64)) -> LogResult<()> {
        derive::normalize_gps_location(&mut self.track, start_coord)
    }
}

/// One decoded modern-generation logging session.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightLog {
    /// GPS track data.
    pub track: TrackTable,
    /// Sensor channel tables, keyed by channel id.
    pub sensors: BTreeMap<String, DataTable>,
    /// Device and session identity.
    pub device_info: DeviceInfo,
    trimmed: bool,
}

impl FlightLog {
    /// Assemble a session from decoded parts.
    pub fn new(
        track: TrackTable,
        sensors: BTreeMap<String, DataTable>,
        device_info: DeviceInfo,
    ) -> Self {
        Self {
            track,
            sensors,
            device_info,
            trimmed: false,
        }
    }

    /// Whether the session's elapsed-time origin is no longer the original
    /// log start.
    ///
    /// Informational only; a trimmed session supports every further
    /// operation, though its `first_sensor_timestamp` no longer corresponds
    /// to the trimmed data's time zero.
    pub fn is_trimmed(&self) -> bool {
        self.trimmed
    }

    /// Trim every channel table and the track to the provided elapsed-time
    /// window, re-zeroing each table's elapsed time to the trimmed start.
    ///
    /// Each table is trimmed independently against its own `elapsed_time`
    /// column; cross-channel alignment is already captured by the track's
    /// `elapsed_time_sensor` column when present.
    pub fn trim_log(&mut self, elapsed_start: f64, elapsed_end: f64) -> LogResult<()> {
        for table in self.sensors.values_mut() {
            trim::trim_table(table, elapsed_start, elapsed_end)?;
        }
        trim::trim_track(&mut self.track, elapsed_start, elapsed_end)?;

        self.trimmed = true;
        Ok(())
    }

    /// Filter the acceleration axes with the provided series filter.
    ///
    /// See [`derive::filter_accel`] for the produced columns.
    pub fn filter_accel<F>(&mut self, filter: F, filter_derived: bool) -> LogResult<()>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let table = self.sensors.get_mut("IMU").ok_or_else(|| {
            FlightLogError::InvalidArgument("Session contains no IMU channel".to_string())
        })?;

        derive::filter_accel(table, filter, filter_derived)
    }

    /// Filter the barometric pressure column with the provided series filter.
    ///
    /// See [`derive::filter_baro`] for the produced columns.
    pub fn filter_baro<F>(&mut self, filter: F, filter_derived: bool) -> LogResult<()>
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let ground_pressure_pa = self.device_info.ground_pressure_pa;
        let table = self.sensors.get_mut("BARO").ok_or_else(|| {
            FlightLogError::InvalidArgument("Session contains no BARO channel".to_string())
        })?;

        derive::filter_baro(table, filter, filter_derived, ground_pressure_pa)
    }

    /// Shift the GPS coordinates so the track begins at the provided location.
    pub fn normalize_gps(&mut self, start_coord: (f64, f64)) -> LogResult<()> {
        derive::normalize_gps_location(&mut self.track, start_coord)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn test_schema_length_invariant() {
        let result = ChannelSchema::new(
            vec!["time".to_string(), "pressure".to_string()],
            vec!["s".to_string()],
            "BARO",
        );
        assert!(matches!(result, Err(FlightLogError::HeaderParse(_))));
    }

    #[test]
    fn test_device_info_json_round_trip() {
        let mut sensor_info = BTreeMap::new();
        sensor_info.insert(
            "SENSOR".to_string(),
            ChannelSchema::new(vec!["a".to_string()], vec!["b".to_string()], "SENSOR").unwrap(),
        );
        let device_info = DeviceInfo::new(
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            sensor_info,
        );

        let raw = serde_json::to_string(&device_info).unwrap();
        let reloaded: DeviceInfo = serde_json::from_str(&raw).unwrap();
        assert_eq!(reloaded, device_info);
    }

    #[test]
    fn test_device_info_missing_field_raises() {
        let result = serde_json::from_str::<DeviceInfo>(r#"{"some_random_field": 1}"#);
        assert!(result.is_err());
    }

    fn session_with_elapsed() -> FlightLog {
        let sensor = DataTable::from_columns(
            vec!["elapsed_time".to_string()],
            vec![vec![0.0, 1.0, 2.0, 3.0]],
        )
        .unwrap();

        let start = Utc::now();
        let track = TrackTable {
            time: (0..4).map(|s| start + Duration::seconds(s)).collect(),
            data: DataTable::from_columns(
                vec!["elapsed_time".to_string()],
                vec![vec![0.0, 1.0, 2.0, 3.0]],
            )
            .unwrap(),
        };

        let mut sensors = BTreeMap::new();
        sensors.insert("VBAT".to_string(), sensor);

        FlightLog::new(
            track,
            sensors,
            DeviceInfo::new(
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                BTreeMap::new(),
            ),
        )
    }

    #[test]
    fn test_trim_marks_session_and_rezeros() {
        let mut session = session_with_elapsed();
        assert!(!session.is_trimmed());

        session.trim_log(1.0, 2.0).unwrap();
        assert!(session.is_trimmed());

        assert_eq!(
            session.sensors["VBAT"].column("elapsed_time"),
            Some(&[0.0, 1.0][..])
        );
        assert_eq!(
            session.track.data.column("elapsed_time"),
            Some(&[0.0, 1.0][..])
        );
        assert_eq!(session.track.n_rows(), 2);
    }

    #[test]
    fn test_filter_missing_channel_raises() {
        let mut session = session_with_elapsed();
        let result = session.filter_accel(|s| s.to_vec(), false);
        assert!(matches!(result, Err(FlightLogError::InvalidArgument(_))));
    }
}
