//! Flight log serialization to and from a directory of CSV files.
//!
//! A serialized session lives under `<base_dir>/<device_id>/<session_id>/`
//! and contains one CSV per sensor channel, a `TRACK.CSV` for the GPS track,
//! and a `device_info.json` metadata file that marks the directory as a
//! processed flight log.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::derive;
use crate::error::{FlightLogError, LogResult};
use crate::session::{DeviceInfo, FlightLog};
use crate::table::{DataTable, TrackTable};

/// File stem reserved for the serialized GPS track.
const TRACK_FILE_STEM: &str = "TRACK";

/// Filename of the serialized device metadata.
const DEVICE_INFO_FILENAME: &str = "device_info.json";

/// Recursively collect every `device_info.json` below `base_dir`.
fn find_device_info_files(base_dir: &Path, found: &mut Vec<PathBuf>) -> LogResult<()> {
    for entry in fs::read_dir(base_dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_device_info_files(&path, found)?;
        } else if path.file_name().is_some_and(|name| name == DEVICE_INFO_FILENAME) {
            found.push(path);
        }
    }

    Ok(())
}

impl FlightLog {
    /// Serialize the flight log below `base_dir`, overwriting any existing
    /// files for the same device and session.
    ///
    /// When `normalize_gps` is set, the exported track's coordinates are
    /// shifted to begin at `(0, 0)`; the in-memory log is left untouched.
    /// Returns the session directory the files were written to.
    pub fn to_csv(&self, base_dir: &Path, normalize_gps: bool) -> LogResult<PathBuf> {
        let session_dir = base_dir
            .join(&self.device_info.device_id)
            .join(&self.device_info.session_id);
        fs::create_dir_all(&session_dir)?;

        let mut track = self.track.clone();
        if normalize_gps {
            derive::normalize_gps_location(&mut track, (0.0, 0.0))?;
        }
        track.write_csv(&session_dir.join(format!("{TRACK_FILE_STEM}.CSV")))?;

        for (channel_id, table) in &self.sensors {
            table.write_csv(&session_dir.join(format!("{channel_id}.CSV")))?;
            debug!(channel = %channel_id, "Wrote sensor channel");
        }

        let device_info_file = fs::File::create(session_dir.join(DEVICE_INFO_FILENAME))?;
        serde_json::to_writer_pretty(device_info_file, &self.device_info)?;

        info!(dir = %session_dir.display(), "Serialized flight log");
        Ok(session_dir)
    }

    /// Reload a flight log serialized by [`FlightLog::to_csv`].
    ///
    /// `base_dir` is searched recursively for a `device_info.json`; exactly
    /// one serialized session must be present below it.
    pub fn from_csv(base_dir: &Path) -> LogResult<Self> {
        let mut device_info_files = Vec::new();
        find_device_info_files(base_dir, &mut device_info_files)?;

        let device_info_filepath = match device_info_files.as_slice() {
            [single] => single,
            [] => {
                return Err(FlightLogError::NoProcessedFlightLog(format!(
                    "No serialized flight log found below '{}'",
                    base_dir.display()
                )));
            }
            _ => return Err(FlightLogError::MultipleChildLogs),
        };

        let device_info: DeviceInfo =
            serde_json::from_reader(fs::File::open(device_info_filepath)?)?;

        // device_info.json always sits next to the session's CSV files
        let session_dir = device_info_filepath
            .parent()
            .ok_or_else(|| {
                FlightLogError::InvalidArgument(
                    "Device metadata file has no parent directory".to_string(),
                )
            })?;

        let mut track = None;
        let mut sensors = BTreeMap::new();
        for entry in fs::read_dir(session_dir)? {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !path.is_file() || !is_csv {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            if stem == TRACK_FILE_STEM {
                track = Some(TrackTable::read_csv(&path)?);
            } else {
                sensors.insert(stem.to_string(), DataTable::read_csv(&path)?);
            }
        }

        let Some(track) = track else {
            return Err(FlightLogError::InvalidArgument(
                "Track data file could not be located".to_string(),
            ));
        };
        if sensors.is_empty() {
            return Err(FlightLogError::InvalidArgument(
                "No sensor data files could be located".to_string(),
            ));
        }

        info!(dir = %session_dir.display(), "Reloaded serialized flight log");
        Ok(FlightLog::new(track, sensors, device_info))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::session::ChannelSchema;

    fn sample_log() -> FlightLog {
        let track = TrackTable {
            time: vec![
                Utc.with_ymd_and_hms(2023, 4, 20, 12, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2023, 4, 20, 12, 0, 1).unwrap(),
            ],
            data: DataTable::from_columns(
                vec!["lat".to_string(), "lon".to_string()],
                vec![vec![33.65, 33.66], vec![-117.74, -117.75]],
            )
            .unwrap(),
        };

        let mut sensors = BTreeMap::new();
        sensors.insert(
            "BARO".to_string(),
            DataTable::from_columns(
                vec!["time".to_string(), "pressure".to_string()],
                vec![vec![1.0, 1.5], vec![101_000.0, 100_000.0]],
            )
            .unwrap(),
        );

        let mut sensor_info = BTreeMap::new();
        sensor_info.insert(
            "BARO".to_string(),
            ChannelSchema::new(
                vec!["time".to_string(), "pressure".to_string()],
                vec!["s".to_string(), "Pa".to_string()],
                "BARO",
            )
            .unwrap(),
        );
        let mut device_info = DeviceInfo::new(
            "v2023.09.22".to_string(),
            "device123".to_string(),
            "session456".to_string(),
            sensor_info,
        );
        device_info.first_sensor_timestamp = Some(1.0);

        FlightLog::new(track, sensors, device_info)
    }

    #[test]
    fn test_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let log = sample_log();

        let session_dir = log.to_csv(tmp.path(), false).unwrap();
        assert_eq!(session_dir, tmp.path().join("device123").join("session456"));
        assert!(session_dir.join("TRACK.CSV").is_file());
        assert!(session_dir.join("BARO.CSV").is_file());
        assert!(session_dir.join("device_info.json").is_file());

        let reloaded = FlightLog::from_csv(tmp.path()).unwrap();
        assert_eq!(reloaded.device_info, log.device_info);
        assert_eq!(reloaded.track.time, log.track.time);
        assert_eq!(
            reloaded.track.data.column("lat").unwrap(),
            log.track.data.column("lat").unwrap()
        );
        assert_eq!(
            reloaded.sensors["BARO"].column("pressure").unwrap(),
            log.sensors["BARO"].column("pressure").unwrap()
        );
    }

    #[test]
    fn test_to_csv_normalize_leaves_source_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let log = sample_log();

        let session_dir = log.to_csv(tmp.path(), true).unwrap();
        assert_eq!(log.track.data.column("lat").unwrap()[0], 33.65);

        let reloaded_track =
            TrackTable::read_csv(&session_dir.join("TRACK.CSV")).unwrap();
        assert_eq!(reloaded_track.data.column("lat").unwrap()[0], 0.0);
    }

    #[test]
    fn test_from_csv_empty_dir_raises() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            FlightLog::from_csv(tmp.path()),
            Err(FlightLogError::NoProcessedFlightLog(_))
        ));
    }

    #[test]
    fn test_from_csv_multiple_sessions_raise() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = sample_log();
        log.to_csv(tmp.path(), false).unwrap();
        log.device_info.session_id = "session789".to_string();
        log.to_csv(tmp.path(), false).unwrap();

        assert!(matches!(
            FlightLog::from_csv(tmp.path()),
            Err(FlightLogError::MultipleChildLogs)
        ));
    }

    #[test]
    fn test_from_csv_missing_track_raises() {
        let tmp = tempfile::tempdir().unwrap();
        let session_dir = sample_log().to_csv(tmp.path(), false).unwrap();
        fs::remove_file(session_dir.join("TRACK.CSV")).unwrap();

        match FlightLog::from_csv(tmp.path()) {
            Err(FlightLogError::InvalidArgument(msg)) => assert!(msg.contains("Track data")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_from_csv_missing_sensors_raises() {
        let tmp = tempfile::tempdir().unwrap();
        let session_dir = sample_log().to_csv(tmp.path(), false).unwrap();
        fs::remove_file(session_dir.join("BARO.CSV")).unwrap();

        match FlightLog::from_csv(tmp.path()) {
            Err(FlightLogError::InvalidArgument(msg)) => assert!(msg.contains("sensor data")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
