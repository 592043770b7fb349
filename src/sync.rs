//! Alignment of the GPS track clock with the onboard sensor clock.
//!
//! The onboard sensor stream and the GPS track stream are clocked
//! independently; the sensor log's `TIME` reference channel carries periodic
//! GPS time-of-week readings alongside the onboard elapsed time recorded at
//! the same instant, which is enough to recover the offset between the two
//! clocks.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{FlightLogError, LogResult};
use crate::table::{DataTable, TrackTable};

/// Unix timestamp of the GPS epoch, 1980-01-06T00:00:00Z.
const GPS_EPOCH_UNIX: i64 = 315_964_800;

static GPS_EPOCH: Lazy<DateTime<Utc>> =
    Lazy::new(|| DateTime::from_timestamp(GPS_EPOCH_UNIX, 0).expect("GPS epoch is representable"));

/// The GPS epoch as a UTC instant.
pub fn gps_epoch() -> DateTime<Utc> {
    *GPS_EPOCH
}

/// Fractional seconds as a chrono duration, to microsecond resolution.
fn seconds_duration(seconds: f64) -> Duration {
    Duration::microseconds((seconds * 1e6).round() as i64)
}

/// First value of the named column, failing on an empty reference channel.
fn first_value(time_channel: &DataTable, column: &str) -> LogResult<f64> {
    time_channel
        .require_column(column)?
        .first()
        .copied()
        .ok_or_else(|| {
            FlightLogError::Processing(format!(
                "Time reference channel contains no '{column}' samples"
            ))
        })
}

/// Calculate the time delta, in seconds, required to align the track and
/// sensor data.
///
/// The reference channel's first sample gives a GPS week number and time of
/// week, which locate an absolute UTC instant; subtracting the onboard
/// elapsed time recorded at that sample yields the onboard clock's absolute
/// start. The returned offset is the gap between the track's first recorded
/// timestamp and that start instant. Sensor logging typically begins before
/// the first GPS fix, so the offset is typically positive.
///
/// No leap second correction is applied; the GPS chip output is assumed to be
/// already corrected.
pub fn calculate_sync_delta(track: &TrackTable, time_channel: &DataTable) -> LogResult<f64> {
    let Some(&track_start) = track.time.first() else {
        return Err(FlightLogError::Processing(
            "Cannot synchronize an empty track".to_string(),
        ));
    };

    let week = first_value(time_channel, "week")?;
    let tow = first_value(time_channel, "tow")?;
    let elapsed = first_value(time_channel, "elapsed_time")?;

    let gps_instant = gps_epoch() + Duration::weeks(week as i64) + seconds_duration(tow);
    let sensor_start = gps_instant - seconds_duration(elapsed);

    let track_offset =
        (track_start - sensor_start).num_microseconds().unwrap_or(0) as f64 / 1e6;
    debug!(track_offset, "calculated track sync offset");

    Ok(track_offset)
}

/// Append an `elapsed_time_sensor` column expressing the track's elapsed time
/// on the onboard sensor clock's time base.
///
/// The column is additive and does not replace the track's own
/// `elapsed_time`.
pub fn add_sync_column(track: &mut TrackTable, track_offset: f64) -> LogResult<()> {
    let synced: Vec<f64> = track
        .data
        .require_column("elapsed_time")?
        .iter()
        .map(|&t| t + track_offset)
        .collect();
    track.data.set_column("elapsed_time_sensor", synced)?;

    Ok(())
}
