//! Data-section decoding for modern logs.
//!
//! Sensor records interleave all channels in one stream; each line opens with
//! a `$`-prefixed channel id followed by that channel's values, the first of
//! which is always the onboard-clock timestamp. Track records carry a
//! datetime string and a trailing integer satellite count instead.

use std::collections::BTreeMap;

use crate::derive;
use crate::error::{FlightLogError, LogResult};
use crate::session::{ChannelSchema, DeviceInfo};
use crate::table::{self, DataTable, TrackTable};

/// Group interleaved sensor records by channel id.
///
/// Returns the per-channel raw rows along with the timestamp of the first
/// record in the stream, which defines the session's time zero for the
/// elapsed-time derivation.
pub fn partition_sensor_data(
    data_lines: &[String],
) -> LogResult<(BTreeMap<String, Vec<Vec<f64>>>, f64)> {
    let first_line = data_lines
        .first()
        .ok_or_else(|| FlightLogError::RawLogParse("Log contains no data records".to_string()))?;

    let first_timestamp = first_line
        .split(',')
        .nth(1)
        .map(table::parse_float)
        .transpose()?
        .ok_or_else(|| {
            FlightLogError::RawLogParse(format!(
                "Could not read timestamp from first data record: '{first_line}'"
            ))
        })?;

    let mut grouped: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
    for line in data_lines {
        let mut fields = line.split(',');
        let Some(channel_id) = fields.next() else {
            continue;
        };

        let row = fields.map(table::parse_float).collect::<LogResult<Vec<f64>>>()?;
        grouped
            .entry(channel_id.trim_start_matches('$').to_string())
            .or_default()
            .push(row);
    }

    Ok((grouped, first_timestamp))
}

/// Build per-channel tables from grouped raw rows.
///
/// Rows within a channel must share the width of that channel's first row,
/// and that width must match the channel's declared schema. Each table gains
/// an `elapsed_time` column zeroed at the session's first sensor record plus
/// any derived quantities for its channel kind.
pub fn raw_to_tables(
    grouped: &BTreeMap<String, Vec<Vec<f64>>>,
    device_info: &DeviceInfo,
) -> LogResult<BTreeMap<String, DataTable>> {
    let first_timestamp = device_info.first_sensor_timestamp.ok_or_else(|| {
        FlightLogError::RawLogParse(
            "First timestamp for logging session not specified".to_string(),
        )
    })?;

    let mut tables = BTreeMap::new();
    for (channel_id, rows) in grouped {
        let expected = rows.first().map_or(0, Vec::len);
        if let Some(bad_row) = rows.iter().find(|row| row.len() != expected) {
            return Err(FlightLogError::ColumnShape {
                channel: channel_id.clone(),
                expected,
                actual: bad_row.len(),
                first_bad_time: bad_row.first().copied().unwrap_or(f64::NAN),
            });
        }

        let schema = device_info.sensor_info.get(channel_id).ok_or_else(|| {
            FlightLogError::HeaderParse(format!(
                "Could not locate column header information for {channel_id} channel"
            ))
        })?;

        if schema.columns.len() != expected {
            return Err(FlightLogError::HeaderParse(format!(
                "Number of column headers for {channel_id} do not match the number of data \
                 columns present (expected: {expected}, received: {})",
                schema.columns.len()
            )));
        }

        let mut table = DataTable::from_rows(schema.columns.clone(), rows)?;

        let elapsed: Vec<f64> = table
            .require_column("time")?
            .iter()
            .map(|t| t - first_timestamp)
            .collect();
        table.set_column("elapsed_time", elapsed)?;

        derive::apply_channel_derived(&mut table, channel_id, device_info.ground_pressure_pa)?;
        tables.insert(channel_id.clone(), table);
    }

    Ok(tables)
}

/// Decode the track file's data lines into a timestamped table.
///
/// Each line carries the channel marker, a datetime string, the numeric track
/// fields, and a trailing satellite count that must parse as an integer.
pub fn track_to_table(data_lines: &[String], schema: &ChannelSchema) -> LogResult<TrackTable> {
    let mut time = Vec::with_capacity(data_lines.len());
    let mut rows = Vec::with_capacity(data_lines.len());

    for line in data_lines {
        let fields: Vec<&str> = line.split(',').collect();

        // Marker field plus one field per schema column.
        if fields.len() != schema.columns.len() + 1 {
            return Err(FlightLogError::RawLogParse(format!(
                "Track record contains {} fields, expected {}: '{line}'",
                fields.len(),
                schema.columns.len() + 1
            )));
        }

        time.push(table::parse_datetime_lenient(fields[1])?);

        let mut row: Vec<f64> = fields[2..fields.len() - 1]
            .iter()
            .map(|field| table::parse_float(field))
            .collect::<LogResult<_>>()?;

        let n_satellites: i64 = fields[fields.len() - 1].trim().parse().map_err(|_| {
            FlightLogError::RawLogParse(format!(
                "Could not read satellite count from track record: '{line}'"
            ))
        })?;
        row.push(n_satellites as f64);

        rows.push(row);
    }

    let data = DataTable::from_rows(schema.columns[1..].to_vec(), &rows)?;
    let mut track = TrackTable { time, data };
    derive::derive_track_columns(&mut track)?;

    Ok(track)
}
