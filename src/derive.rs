//! Physics-derived quantities for decoded channel and track data.
//!
//! Every channel table gains an `elapsed_time` column immediately after
//! decoding; further derived columns are dispatched by [`ChannelKind`]:
//! pressure altitude for the barometric channel, vector-sum acceleration for
//! the IMU channel, and groundspeed for the GPS track. Channel ids with no
//! known kind pass through with only `elapsed_time`, so firmware-added
//! channels parse without a hard failure.
//!
//! Caller-supplied smoothing filters may be applied to the acceleration axes
//! or the barometric pressure column; filtered data lands in `_filt`-suffixed
//! sibling columns and the dependent derived quantities are recomputed from
//! the filtered inputs.

use chrono::{DateTime, Utc};

use crate::error::{FlightLogError, LogResult};
use crate::table::{DataTable, TrackTable};

/// Meters to feet conversion factor.
const M_TO_FT: f64 = 3.2808;

/// Exponent of the standard-atmosphere pressure altitude model.
const LAPSE_EXPONENT: f64 = 1.0 / 5.225;

/// Known channel kinds, keyed by the channel id carried in the log header.
///
/// Unrecognized ids map to `Passthrough`, which receives no channel-specific
/// derived columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// GPS track stream.
    Gnss,
    /// Accelerometer/gyro stream.
    Imu,
    /// Barometric pressure stream.
    Baro,
    /// GPS time-of-week reference stream.
    Time,
    /// Any other channel; parsed but not specially derived.
    Passthrough,
}

impl ChannelKind {
    /// Map a raw channel id onto its kind.
    pub fn from_id(channel_id: &str) -> Self {
        match channel_id {
            "GNSS" => Self::Gnss,
            "IMU" => Self::Imu,
            "BARO" => Self::Baro,
            "TIME" => Self::Time,
            _ => Self::Passthrough,
        }
    }
}

/// Pressure altitude columns from pressure data, assuming standard lapse rate.
///
/// Returns `(press_alt_m, press_alt_ft)`.
pub fn pressure_altitude(pressure: &[f64], ground_pressure_pa: f64) -> (Vec<f64>, Vec<f64>) {
    let press_alt_m: Vec<f64> = pressure
        .iter()
        .map(|&p| 44_330.0 * (1.0 - (p / ground_pressure_pa).powf(LAPSE_EXPONENT)))
        .collect();
    let press_alt_ft = press_alt_m.iter().map(|&m| m * M_TO_FT).collect();

    (press_alt_m, press_alt_ft)
}

/// Vector magnitude of the three acceleration axes.
pub fn total_accel(ax: &[f64], ay: &[f64], az: &[f64]) -> Vec<f64> {
    ax.iter()
        .zip(ay)
        .zip(az)
        .map(|((&x, &y), &z)| (x * x + y * y + z * z).sqrt())
        .collect()
}

/// Horizontal groundspeed from the north/east velocity components, in m/s.
pub fn groundspeed(vel_n: &[f64], vel_e: &[f64]) -> Vec<f64> {
    vel_n
        .iter()
        .zip(vel_e)
        .map(|(&n, &e)| n.hypot(e))
        .collect()
}

/// Seconds elapsed since the first timestamp of the provided time vector.
pub fn elapsed_seconds(time: &[DateTime<Utc>]) -> Vec<f64> {
    let Some(&start) = time.first() else {
        return Vec::new();
    };

    time.iter()
        .map(|&t| (t - start).num_microseconds().unwrap_or(0) as f64 / 1e6)
        .collect()
}

/// Append channel-specific derived columns to a decoded channel table.
///
/// The table is assumed to already carry its raw columns; tables whose kind
/// requires no extra derivation are passed through unchanged.
pub fn apply_channel_derived(
    table: &mut DataTable,
    channel_id: &str,
    ground_pressure_pa: f64,
) -> LogResult<()> {
    match ChannelKind::from_id(channel_id) {
        ChannelKind::Baro => {
            let (alt_m, alt_ft) =
                pressure_altitude(table.require_column("pressure")?, ground_pressure_pa);
            table.set_column("press_alt_m", alt_m)?;
            table.set_column("press_alt_ft", alt_ft)?;
        }
        ChannelKind::Imu => {
            let accel = total_accel(
                table.require_column("ax")?,
                table.require_column("ay")?,
                table.require_column("az")?,
            );
            table.set_column("total_accel", accel)?;
        }
        _ => {}
    }

    Ok(())
}

/// Append `elapsed_time` and `groundspeed` columns to a decoded track table.
///
/// Elapsed time is referenced to the track's own first timestamp; the track is
/// clocked independently of the onboard sensor stream.
pub fn derive_track_columns(track: &mut TrackTable) -> LogResult<()> {
    if track.is_empty() {
        return Err(FlightLogError::Processing(
            "Cannot derive columns for an empty track".to_string(),
        ));
    }

    let elapsed = elapsed_seconds(&track.time);
    track.data.set_column("elapsed_time", elapsed)?;

    let speed = groundspeed(
        track.data.require_column("velN")?,
        track.data.require_column("velE")?,
    );
    track.data.set_column("groundspeed", speed)?;

    Ok(())
}

/// Apply a series filter, enforcing that the output length matches the input.
fn filter_series<F>(filter: &F, series: &[f64]) -> LogResult<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let filtered = filter(series);
    if filtered.len() != series.len() {
        return Err(FlightLogError::Processing(format!(
            "Filter function returned {} values for a series of {}",
            filtered.len(),
            series.len()
        )));
    }

    Ok(filtered)
}

/// Filter the acceleration axes, recomputing total acceleration from the
/// filtered components.
///
/// Filtered data is saved to `_filt`-suffixed sibling columns. If
/// `filter_derived` is true, the filter is also applied to the recomputed
/// `total_accel_filt` column itself.
pub fn filter_accel<F>(table: &mut DataTable, filter: F, filter_derived: bool) -> LogResult<()>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    for axis in ["ax", "ay", "az"] {
        let filtered = filter_series(&filter, table.require_column(axis)?)?;
        table.set_column(&format!("{axis}_filt"), filtered)?;
    }

    let mut accel_filt = total_accel(
        table.require_column("ax_filt")?,
        table.require_column("ay_filt")?,
        table.require_column("az_filt")?,
    );
    if filter_derived {
        accel_filt = filter_series(&filter, &accel_filt)?;
    }
    table.set_column("total_accel_filt", accel_filt)?;

    Ok(())
}

/// Filter the barometric pressure column, recomputing the pressure altitude
/// columns from the filtered data.
///
/// Filtered data is saved to `_filt`-suffixed sibling columns. If
/// `filter_derived` is true, the filter is also applied to the recomputed
/// pressure altitude columns themselves.
pub fn filter_baro<F>(
    table: &mut DataTable,
    filter: F,
    filter_derived: bool,
    ground_pressure_pa: f64,
) -> LogResult<()>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let pressure_filt = filter_series(&filter, table.require_column("pressure")?)?;
    table.set_column("pressure_filt", pressure_filt)?;

    let (mut alt_m, mut alt_ft) =
        pressure_altitude(table.require_column("pressure_filt")?, ground_pressure_pa);
    if filter_derived {
        alt_m = filter_series(&filter, &alt_m)?;
        alt_ft = filter_series(&filter, &alt_ft)?;
    }
    table.set_column("press_alt_m_filt", alt_m)?;
    table.set_column("press_alt_ft_filt", alt_ft)?;

    Ok(())
}

/// Shift the track's GPS coordinates so they begin at the provided location.
pub fn normalize_gps_location(track: &mut TrackTable, start_coord: (f64, f64)) -> LogResult<()> {
    for (column, start) in [("lat", start_coord.0), ("lon", start_coord.1)] {
        let values = track.data.require_column(column)?;
        let Some(&first) = values.first() else {
            continue;
        };

        let shifted = values.iter().map(|&v| v - first + start).collect();
        track.data.set_column(column, shifted)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn imu_table() -> DataTable {
        DataTable::from_columns(
            vec!["ax".to_string(), "ay".to_string(), "az".to_string()],
            vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]],
        )
        .unwrap()
    }

    fn baro_table() -> DataTable {
        DataTable::from_columns(
            vec!["pressure".to_string()],
            vec![vec![101_000.0, 100_000.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_pressure_altitude_truth() {
        let (alt_m, alt_ft) = pressure_altitude(&[101_000.0], 101_325.0);
        assert_relative_eq!(alt_m[0], 27.2485, max_relative = 1e-4);
        assert_relative_eq!(alt_ft[0], 89.3968, max_relative = 1e-4);
    }

    #[test]
    fn test_total_accel_vector_sum() {
        let accel = total_accel(&[1.0], &[2.0], &[3.0]);
        assert_relative_eq!(accel[0], 14.0_f64.sqrt());
    }

    #[test]
    fn test_channel_kind_passthrough_fallback() {
        assert_eq!(ChannelKind::from_id("BARO"), ChannelKind::Baro);
        assert_eq!(ChannelKind::from_id("HUM"), ChannelKind::Passthrough);
    }

    #[test]
    fn test_passthrough_channel_unchanged() {
        let mut table = DataTable::from_columns(
            vec!["time".to_string(), "voltage".to_string()],
            vec![vec![1.0], vec![3.7]],
        )
        .unwrap();

        apply_channel_derived(&mut table, "VBAT", 101_325.0).unwrap();
        assert_eq!(table.n_cols(), 2);
    }

    #[test]
    fn test_filter_accel() {
        let mut table = imu_table();
        filter_accel(&mut table, |s| s.iter().map(|v| v * 2.0).collect(), false).unwrap();

        assert_eq!(table.column("ax_filt"), Some(&[2.0, 4.0][..]));
        assert_eq!(table.column("ay_filt"), Some(&[6.0, 8.0][..]));
        assert_eq!(table.column("az_filt"), Some(&[10.0, 12.0][..]));

        let accel_filt = table.column("total_accel_filt").unwrap();
        assert_relative_eq!(accel_filt[0], 11.8321, max_relative = 1e-4);
        assert_relative_eq!(accel_filt[1], 14.9666, max_relative = 1e-4);
    }

    #[test]
    fn test_filter_accel_filter_derived() {
        let mut table = imu_table();
        filter_accel(&mut table, |s| s.iter().map(|v| v * 2.0).collect(), true).unwrap();

        // Filtering the derived column doubles it again
        let accel_filt = table.column("total_accel_filt").unwrap();
        assert_relative_eq!(accel_filt[0], 23.6643, max_relative = 1e-4);
        assert_relative_eq!(accel_filt[1], 29.9333, max_relative = 1e-4);
    }

    #[test]
    fn test_filter_baro() {
        let mut table = baro_table();
        filter_baro(
            &mut table,
            |s| s.iter().map(|v| v - 1_000.0).collect(),
            false,
            101_325.0,
        )
        .unwrap();

        assert_eq!(table.column("pressure_filt"), Some(&[100_000.0, 99_000.0][..]));

        let alt_m = table.column("press_alt_m_filt").unwrap();
        assert_relative_eq!(alt_m[0], 111.5370, max_relative = 1e-4);
        assert_relative_eq!(alt_m[1], 196.5099, max_relative = 1e-4);

        let alt_ft = table.column("press_alt_ft_filt").unwrap();
        assert_relative_eq!(alt_ft[0], 365.9306, max_relative = 1e-4);
        assert_relative_eq!(alt_ft[1], 644.7096, max_relative = 1e-4);
    }

    #[test]
    fn test_filter_baro_filter_derived() {
        let mut table = baro_table();
        filter_baro(
            &mut table,
            |s| s.iter().map(|v| v - 1_000.0).collect(),
            true,
            101_325.0,
        )
        .unwrap();

        let alt_m = table.column("press_alt_m_filt").unwrap();
        assert_relative_eq!(alt_m[0], -888.4630, max_relative = 1e-4);
        assert_relative_eq!(alt_m[1], -803.4901, max_relative = 1e-4);

        let alt_ft = table.column("press_alt_ft_filt").unwrap();
        assert_relative_eq!(alt_ft[0], -634.0694, max_relative = 1e-4);
        assert_relative_eq!(alt_ft[1], -355.2904, max_relative = 1e-4);
    }

    #[test]
    fn test_filter_length_mismatch_rejected() {
        let mut table = imu_table();
        let result = filter_accel(&mut table, |_| vec![1.0], false);
        assert!(matches!(result, Err(FlightLogError::Processing(_))));
    }

    #[test]
    fn test_normalize_gps_location() {
        let data = DataTable::from_columns(
            vec!["lat".to_string(), "lon".to_string()],
            vec![vec![1.0, 2.0], vec![1.0, 3.0]],
        )
        .unwrap();
        let mut track = TrackTable {
            time: vec![Utc::now(), Utc::now()],
            data,
        };

        normalize_gps_location(&mut track, (0.0, 0.0)).unwrap();
        assert_eq!(track.data.column("lat"), Some(&[0.0, 1.0][..]));
        assert_eq!(track.data.column("lon"), Some(&[0.0, 2.0][..]));
    }
}
