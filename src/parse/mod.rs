//! Flight log parsing pipelines for both hardware generations.
//!
//! The top-level entry point is [`parse_log_directory`], which parses a
//! modern log directory (sensor file plus track file) into a synchronized
//! [`FlightLog`]. Legacy single-file logs are handled by [`load_legacy`] and
//! [`batch_load_legacy`].

pub mod header;
pub mod records;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::derive;
use crate::error::{FlightLogError, LogResult};
use crate::generation::Generation;
use crate::session::{
    ChannelSchema, DeviceInfo, FlightLog, LegacyDeviceInfo, LegacyFlightLog, TRACK_CHANNEL_ID,
};
use crate::sync;
use crate::table::{self, DataTable, TrackTable};

/// Channel id of the onboard time reference used for GPS synchronization.
const TIME_CHANNEL_ID: &str = "TIME";

/// Read a file into a list of its lines, without terminators.
fn read_lines(filepath: &Path) -> LogResult<Vec<String>> {
    Ok(fs::read_to_string(filepath)?
        .lines()
        .map(str::to_string)
        .collect())
}

/// Parse a modern sensor log file into per-channel tables and device metadata.
pub fn parse_sensor_file(
    filepath: &Path,
    ground_pressure_pa: f64,
) -> LogResult<(BTreeMap<String, DataTable>, DeviceInfo)> {
    let lines = read_lines(filepath)?;
    let (header_lines, data_lines) =
        header::split_sensor_data(&lines, Generation::Modern, header::DATA_PARTITION_KEYWORD)?;

    let mut device_info = header::parse_header(&header_lines)?;
    device_info.ground_pressure_pa = ground_pressure_pa;

    let (grouped, first_timestamp) = records::partition_sensor_data(&data_lines)?;
    device_info.first_sensor_timestamp = Some(first_timestamp);

    let sensors = records::raw_to_tables(&grouped, &device_info)?;
    debug!(
        channels = sensors.len(),
        first_timestamp, "Parsed sensor log"
    );

    Ok((sensors, device_info))
}

/// Parse a modern track log file into a timestamped table and its metadata.
pub fn parse_track_file(filepath: &Path) -> LogResult<(TrackTable, DeviceInfo)> {
    let lines = read_lines(filepath)?;
    let (header_lines, data_lines) =
        header::split_sensor_data(&lines, Generation::Modern, header::DATA_PARTITION_KEYWORD)?;

    let device_info = header::parse_header(&header_lines)?;
    let schema = device_info
        .sensor_info
        .get(TRACK_CHANNEL_ID)
        .ok_or_else(|| {
            FlightLogError::HeaderParse(format!(
                "Could not locate column header information for {TRACK_CHANNEL_ID} channel"
            ))
        })?;

    let track = records::track_to_table(&data_lines, schema)?;
    debug!(rows = track.n_rows(), "Parsed track log");

    Ok((track, device_info))
}

/// Parse a modern log directory into a synchronized [`FlightLog`].
///
/// When `prefer_processed` is set, a previously serialized session below
/// `log_dir` is reloaded instead of re-parsing the raw files; if none is
/// found, a warning is emitted and raw parsing proceeds. Other reload
/// failures are surfaced as-is.
///
/// The track gains an `elapsed_time_sensor` column aligning its rows with
/// the sensor channels' elapsed time.
pub fn parse_log_directory(
    log_dir: &Path,
    settings: &Settings,
    prefer_processed: bool,
    normalize_gps: bool,
) -> LogResult<FlightLog> {
    if prefer_processed {
        match FlightLog::from_csv(log_dir) {
            Ok(log) => {
                info!(dir = %log_dir.display(), "Reloaded processed flight log");
                return Ok(log);
            }
            Err(FlightLogError::NoProcessedFlightLog(_)) => {
                warn!(
                    dir = %log_dir.display(),
                    "No processed flight log found, falling back to raw parsing"
                );
            }
            Err(err) => return Err(err),
        }
    }

    let sensor_filepath = log_dir.join(&settings.parsing.sensor_filename);
    if !sensor_filepath.is_file() {
        return Err(FlightLogError::InvalidArgument(format!(
            "Could not locate '{}' in directory: '{}'",
            settings.parsing.sensor_filename,
            log_dir.display()
        )));
    }

    let track_filepath = log_dir.join(&settings.parsing.track_filename);
    if !track_filepath.is_file() {
        return Err(FlightLogError::InvalidArgument(format!(
            "Could not locate '{}' in directory: '{}'",
            settings.parsing.track_filename,
            log_dir.display()
        )));
    }

    let (sensors, device_info) =
        parse_sensor_file(&sensor_filepath, settings.parsing.ground_pressure_pa)?;
    let (mut track, _) = parse_track_file(&track_filepath)?;

    if normalize_gps {
        derive::normalize_gps_location(&mut track, (0.0, 0.0))?;
    }

    let time_channel = sensors.get(TIME_CHANNEL_ID).ok_or_else(|| {
        FlightLogError::RawLogParse(format!(
            "Log contains no {TIME_CHANNEL_ID} channel to synchronize against"
        ))
    })?;
    let track_offset = sync::calculate_sync_delta(&track, time_channel)?;
    sync::add_sync_column(&mut track, track_offset)?;

    info!(
        device_id = %device_info.device_id,
        session_id = %device_info.session_id,
        track_offset,
        "Parsed flight log"
    );

    Ok(FlightLog::new(track, sensors, device_info))
}

/// Load a legacy single-file track log.
///
/// Legacy files carry two header rows: column names, then parenthesized unit
/// strings. The time column's unit cell is empty in the raw file and is
/// recorded as `datetime`.
pub fn load_legacy(filepath: &Path, normalize_gps: bool) -> LogResult<LegacyFlightLog> {
    let lines = read_lines(filepath)?;
    let (header_lines, data_lines) = header::split_sensor_data(&lines, Generation::Legacy, "")?;

    if header_lines.len() != 2 {
        return Err(FlightLogError::RawLogParse(format!(
            "Log file does not contain a two-row header: '{}'",
            filepath.display()
        )));
    }

    let names: Vec<String> = header_lines[0].split(',').map(str::to_string).collect();
    let mut units: Vec<String> = header_lines[1]
        .split(',')
        .map(|unit| unit.trim_matches(&['(', ')'][..]).to_string())
        .collect();
    if let Some(first_unit) = units.first_mut() {
        *first_unit = "datetime".to_string();
    }

    let mut time = Vec::with_capacity(data_lines.len());
    let mut rows = Vec::with_capacity(data_lines.len());
    for line in &data_lines {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != names.len() {
            return Err(FlightLogError::RawLogParse(format!(
                "Track record contains {} fields, expected {}: '{line}'",
                fields.len(),
                names.len()
            )));
        }

        time.push(table::parse_datetime_lenient(fields[0])?);
        rows.push(
            fields[1..]
                .iter()
                .map(|field| table::parse_float(field))
                .collect::<LogResult<Vec<f64>>>()?,
        );
    }

    let data = DataTable::from_rows(names[1..].to_vec(), &rows)?;
    let mut track = TrackTable { time, data };
    derive::derive_track_columns(&mut track)?;

    if normalize_gps {
        derive::normalize_gps_location(&mut track, (0.0, 0.0))?;
    }

    let mut sensor_info = BTreeMap::new();
    sensor_info.insert(
        TRACK_CHANNEL_ID.to_string(),
        ChannelSchema::new(names, units, TRACK_CHANNEL_ID)?,
    );

    Ok(LegacyFlightLog {
        track,
        device_info: LegacyDeviceInfo {
            sensor_info,
            generation: Generation::Legacy,
        },
    })
}

/// Load every legacy log file directly inside `log_dir`, keyed by file stem.
///
/// Subdirectories are not descended into. A directory with no log files
/// yields an empty map.
pub fn batch_load_legacy(
    log_dir: &Path,
    normalize_gps: bool,
) -> LogResult<BTreeMap<String, LegacyFlightLog>> {
    let mut logs = BTreeMap::new();
    for entry in fs::read_dir(log_dir)? {
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

        logs.insert(stem.to_string(), load_legacy(&path, normalize_gps)?);
    }

    info!(count = logs.len(), dir = %log_dir.display(), "Loaded legacy logs");
    Ok(logs)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use approx::assert_relative_eq;

    use super::*;

    const SAMPLE_LEGACY_LOG: &str = "\
time,lat,lon,hMSL,velN,velE,velD,hAcc,vAcc,sAcc,heading,cAcc,gpsFix,numSV
,(deg),(deg),(m),(m/s),(m/s),(m/s),(m),(m),(m/s),(deg),(deg),,
2021-04-20T12:34:20.00Z,33.6568828,-117.7466357,630.0,3.0,4.0,0.02,1.0,1.5,0.5,0.0,180.0,3,5
2021-04-20T12:34:20.20Z,33.6568829,-117.7466358,630.5,6.0,8.0,0.03,1.0,1.5,0.5,0.0,180.0,3,5";

    fn write_legacy_log(dir: &Path, name: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        write!(file, "{SAMPLE_LEGACY_LOG}").unwrap();
    }

    #[test]
    fn test_load_legacy() {
        let tmp = tempfile::tempdir().unwrap();
        write_legacy_log(tmp.path(), "24-04-20.CSV");

        let log = load_legacy(&tmp.path().join("24-04-20.CSV"), false).unwrap();
        assert_eq!(log.device_info.generation, Generation::Legacy);

        let schema = &log.device_info.sensor_info[TRACK_CHANNEL_ID];
        assert_eq!(schema.units[0], "datetime");
        assert_eq!(schema.units[1], "deg");

        assert_eq!(log.track.n_rows(), 2);
        assert_eq!(log.track.data.column("elapsed_time").unwrap(), &[0.0, 0.2]);
        let speed = log.track.data.column("groundspeed").unwrap();
        assert_relative_eq!(speed[0], 5.0);
        assert_relative_eq!(speed[1], 10.0);
    }

    #[test]
    fn test_load_legacy_normalized_gps() {
        let tmp = tempfile::tempdir().unwrap();
        write_legacy_log(tmp.path(), "24-04-20.CSV");

        let log = load_legacy(&tmp.path().join("24-04-20.CSV"), true).unwrap();
        let lat = log.track.data.column("lat").unwrap();
        assert_relative_eq!(lat[0], 0.0);
        assert_relative_eq!(lat[1], 1e-7, epsilon = 1e-12);
    }

    #[test]
    fn test_load_legacy_truncated_header_raises() {
        let tmp = tempfile::tempdir().unwrap();
        let filepath = tmp.path().join("short.CSV");
        fs::write(&filepath, "time,lat,lon\n").unwrap();

        assert!(matches!(
            load_legacy(&filepath, false),
            Err(FlightLogError::RawLogParse(_))
        ));
    }

    #[test]
    fn test_batch_load_legacy() {
        let tmp = tempfile::tempdir().unwrap();
        write_legacy_log(tmp.path(), "24-04-20.CSV");
        write_legacy_log(tmp.path(), "24-04-21.CSV");
        fs::write(tmp.path().join("notes.txt"), "not a log").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();
        write_legacy_log(&tmp.path().join("nested"), "24-04-22.CSV");

        let logs = batch_load_legacy(tmp.path(), false).unwrap();
        let stems: Vec<&String> = logs.keys().collect();
        assert_eq!(stems, vec!["24-04-20", "24-04-21"]);
    }

    #[test]
    fn test_parse_log_directory_missing_sensor_file_raises() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::default();

        match parse_log_directory(tmp.path(), &settings, false, false) {
            Err(FlightLogError::InvalidArgument(msg)) => assert!(msg.contains("SENSOR.CSV")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
