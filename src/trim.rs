//! Trimming of logged sessions to a window of interest.
//!
//! Two independent trim paths exist: a tabular trim over decoded channel
//! tables, driven by an elapsed-time window, and a raw-text trim that slices
//! the data section of an on-disk log file by row index without decoding it.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{FlightLogError, LogResult};
use crate::generation::Generation;
use crate::parse::header::{split_sensor_data, DATA_PARTITION_KEYWORD};
use crate::table::{DataTable, TrackTable};

/// First index of the value in `values` closest to the provided query.
///
/// Ties on absolute difference resolve to the first occurrence; queries
/// outside the data range clamp to the nearest end.
pub fn closest_index(values: &[f64], query: f64) -> LogResult<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in values.iter().enumerate() {
        let delta = (value - query).abs();
        if best.map_or(true, |(_, best_delta)| delta < best_delta) {
            best = Some((idx, delta));
        }
    }

    best.map(|(idx, _)| idx).ok_or_else(|| {
        FlightLogError::Processing("Could not locate closest value in an empty series".to_string())
    })
}

/// Resolve an elapsed-time window to the closed row range `[start, end]`.
fn window_indices(elapsed: &[f64], start: f64, end: f64) -> LogResult<(usize, usize)> {
    Ok((closest_index(elapsed, start)?, closest_index(elapsed, end)?))
}

/// Re-zero a table's `elapsed_time` column by subtracting its first value.
fn rezero_elapsed(table: &mut DataTable) -> LogResult<()> {
    let elapsed = table.require_column("elapsed_time")?;
    let Some(&first) = elapsed.first() else {
        return Ok(());
    };

    let rezeroed = elapsed.iter().map(|&t| t - first).collect();
    table.set_column("elapsed_time", rezeroed)?;

    Ok(())
}

/// Trim a channel table to the rows closest to the provided elapsed-time
/// window, re-zeroing elapsed time to the new start.
pub fn trim_table(table: &mut DataTable, elapsed_start: f64, elapsed_end: f64) -> LogResult<()> {
    let (l_idx, r_idx) =
        window_indices(table.require_column("elapsed_time")?, elapsed_start, elapsed_end)?;
    *table = table.slice_rows(l_idx, r_idx);
    rezero_elapsed(table)?;

    Ok(())
}

/// Trim the track table to the rows closest to the provided elapsed-time
/// window, re-zeroing elapsed time to the new start.
///
/// The synchronized `elapsed_time_sensor` column, if present, is sliced with
/// the rest of the data but deliberately not re-zeroed; it expresses time on
/// the onboard sensor clock's base.
pub fn trim_track(track: &mut TrackTable, elapsed_start: f64, elapsed_end: f64) -> LogResult<()> {
    let (l_idx, r_idx) = window_indices(
        track.data.require_column("elapsed_time")?,
        elapsed_start,
        elapsed_end,
    )?;
    *track = track.slice_rows(l_idx, r_idx);
    rezero_elapsed(&mut track.data)?;

    Ok(())
}

/// Trim a raw log file to the data rows between two row indices, without
/// decoding it.
///
/// Indices are row-positional within the data section and end-inclusive;
/// `start_idx` defaults to the first row and `end_idx` to the last. Negative
/// indices are rejected before anything is written. The trimmed log is
/// written next to the source file with `filename_suffix` appended to its
/// stem, overwriting any existing file of that name, and always carries an
/// explicit data-section delimiter (legacy inputs gain one).
pub fn trim_data_file(
    filepath: &Path,
    start_idx: Option<i64>,
    end_idx: Option<i64>,
    generation: Generation,
    filename_suffix: &str,
) -> LogResult<PathBuf> {
    if start_idx.is_some_and(|idx| idx < 0) || end_idx.is_some_and(|idx| idx < 0) {
        return Err(FlightLogError::InvalidArgument(
            "Specified indices must be non-negative".to_string(),
        ));
    }

    let contents = std::fs::read_to_string(filepath)?;
    let lines: Vec<String> = contents.lines().map(str::to_string).collect();
    let (header, data) = split_sensor_data(&lines, generation, DATA_PARTITION_KEYWORD)?;

    let start = start_idx.unwrap_or(0) as usize;
    let end_excl = end_idx.map_or(data.len(), |idx| (idx as usize + 1).min(data.len()));

    let out_name = match (filepath.file_stem(), filepath.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{}{}.{}",
            stem.to_string_lossy(),
            filename_suffix,
            ext.to_string_lossy()
        ),
        _ => {
            return Err(FlightLogError::InvalidArgument(format!(
                "Cannot derive trimmed filename for '{}'",
                filepath.display()
            )))
        }
    };
    let out_filepath = filepath.with_file_name(out_name);

    let mut out_file = std::fs::File::create(&out_filepath)?;
    for line in &header {
        writeln!(out_file, "{line}")?;
    }
    writeln!(out_file, "{DATA_PARTITION_KEYWORD}")?;
    for line in data.iter().take(end_excl).skip(start) {
        writeln!(out_file, "{line}")?;
    }

    info!(out = %out_filepath.display(), "wrote trimmed log file");

    Ok(out_filepath)
}
