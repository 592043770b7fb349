//! Raw log section splitting and metadata header decoding.
//!
//! Modern-generation logs open with a metadata header: `$VAR,name,value`
//! device variables followed by `$COL`/`$UNIT` row pairs describing each
//! channel's record layout, terminated by a `$DATA` delimiter line. Legacy
//! logs have a fixed two-row header with no delimiter.

use std::collections::BTreeMap;

use crate::error::{FlightLogError, LogResult};
use crate::generation::Generation;
use crate::session::{ChannelSchema, DeviceInfo, TRACK_CHANNEL_ID};

/// Line prefix delimiting the header and data sections of a modern log.
pub const DATA_PARTITION_KEYWORD: &str = "$DATA";

/// Prefix of device variable lines in a modern header.
const VAR_PREFIX: &str = "$VAR";
/// Prefix of channel column-name lines in a modern header.
const COL_PREFIX: &str = "$COL";

/// Split raw log lines into their header and data sections.
///
/// Legacy logs have no partition keyword but are assumed to have exactly two
/// header lines. Modern logs are split at the first line beginning with
/// `partition_keyword`; the keyword line itself belongs to neither section.
pub fn split_sensor_data(
    lines: &[String],
    generation: Generation,
    partition_keyword: &str,
) -> LogResult<(Vec<String>, Vec<String>)> {
    match generation {
        Generation::Legacy => {
            let split = lines.len().min(2);
            Ok((lines[..split].to_vec(), lines[split..].to_vec()))
        }
        Generation::Modern => {
            for (idx, line) in lines.iter().enumerate() {
                if line.starts_with(partition_keyword) {
                    return Ok((lines[..idx].to_vec(), lines[idx + 1..].to_vec()));
                }
            }

            Err(FlightLogError::RawLogParse(format!(
                "Could not locate line containing '{partition_keyword}', \
                 please check data file for issues"
            )))
        }
    }
}

/// Decode a modern log's header lines into device identity and channel
/// schemas.
///
/// Device metadata lines are prefixed by `$VAR`; `FIRMWARE_VER`, `DEVICE_ID`,
/// and `SESSION_ID` are retained and all other variables ignored. Metadata
/// scanning stops at the first `$COL` line; the remaining lines are consumed
/// in strict `$COL`/`$UNIT` pairs, keyed by the channel id in their second
/// field.
pub fn parse_header(header_lines: &[String]) -> LogResult<DeviceInfo> {
    let mut firmware_version = String::new();
    let mut device_id = String::new();
    let mut session_id = String::new();

    let schema_start = header_lines
        .iter()
        .position(|line| line.starts_with(COL_PREFIX))
        .unwrap_or(header_lines.len());

    for line in &header_lines[..schema_start] {
        if !line.starts_with(VAR_PREFIX) {
            continue;
        }

        let mut fields = line.splitn(3, ',');
        let (Some(_), Some(name), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        match name {
            "FIRMWARE_VER" => firmware_version = value.to_string(),
            "DEVICE_ID" => device_id = value.to_string(),
            "SESSION_ID" => session_id = value.to_string(),
            _ => {}
        }
    }

    if firmware_version.is_empty() {
        return Err(FlightLogError::HeaderParse(
            "Could not locate device firmware version".to_string(),
        ));
    }

    if device_id.is_empty() {
        return Err(FlightLogError::HeaderParse(
            "Could not locate device ID".to_string(),
        ));
    }

    if session_id.is_empty() {
        return Err(FlightLogError::HeaderParse(
            "Could not locate session ID".to_string(),
        ));
    }

    let schema_lines = &header_lines[schema_start..];
    if schema_lines.len() % 2 != 0 {
        return Err(FlightLogError::HeaderParse(
            "At least one channel type lacks column or unit information".to_string(),
        ));
    }

    let mut sensor_info = BTreeMap::new();
    for pair in schema_lines.chunks_exact(2) {
        let mut column_fields = pair[0].split(',');
        let (Some(_), Some(channel_id)) = (column_fields.next(), column_fields.next()) else {
            return Err(FlightLogError::HeaderParse(format!(
                "Malformed channel column line: '{}'",
                pair[0]
            )));
        };
        let columns: Vec<String> = column_fields.map(str::to_string).collect();

        let mut units: Vec<String> = pair[1].split(',').skip(2).map(str::to_string).collect();

        // The track file's header does not provide a unit string for its time
        // column, which carries a datetime string rather than a raw float.
        if channel_id == TRACK_CHANNEL_ID {
            if let Some(first_unit) = units.first_mut() {
                if first_unit.is_empty() {
                    *first_unit = "datetime".to_string();
                }
            }
        }

        sensor_info.insert(
            channel_id.to_string(),
            ChannelSchema::new(columns, units, channel_id)?,
        );
    }

    Ok(DeviceInfo::new(
        firmware_version,
        device_id,
        session_id,
        sensor_info,
    ))
}
