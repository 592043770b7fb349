//! Owned column-major tables for decoded channel and track data.
//!
//! Each channel of a logging session is materialized into a [`DataTable`]: an
//! ordered set of named `f64` columns of equal length. The GPS track stream
//! carries a leading datetime column and is stored as a [`TrackTable`], which
//! pairs a timestamp vector with a `DataTable` of its numeric columns.
//!
//! Tables are owned, exclusively-held values; every derivation or trim step
//! mutates the single owner rather than aliasing shared state. Row order is
//! the order encountered in the source log and is load-bearing for elapsed
//! time and trim semantics.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{FlightLogError, LogResult};

/// An ordered collection of named numeric columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl DataTable {
    /// Create an empty table with no columns.
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Build a table from row-major data with the provided column names.
    ///
    /// Every row must have exactly `names.len()` fields.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> LogResult<Self> {
        let width = names.len();
        let mut columns = vec![Vec::with_capacity(rows.len()); width];
        for row in rows {
            if row.len() != width {
                return Err(FlightLogError::InvalidArgument(format!(
                    "Row width {} does not match column count {}",
                    row.len(),
                    width
                )));
            }

            for (col, value) in columns.iter_mut().zip(row) {
                col.push(*value);
            }
        }

        Ok(Self { names, columns })
    }

    /// Build a table directly from named columns.
    ///
    /// All columns must share the same length.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> LogResult<Self> {
        if names.len() != columns.len() {
            return Err(FlightLogError::InvalidArgument(format!(
                "Provided {} names for {} columns",
                names.len(),
                columns.len()
            )));
        }

        if let Some(first) = columns.first() {
            if columns.iter().any(|c| c.len() != first.len()) {
                return Err(FlightLogError::InvalidArgument(
                    "All columns must share the same length".to_string(),
                ));
            }
        }

        Ok(Self { names, columns })
    }

    /// Ordered column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Column data by name, if present.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.columns[idx].as_slice())
    }

    /// Column data by name, failing if the column is absent.
    pub fn require_column(&self, name: &str) -> LogResult<&[f64]> {
        self.column(name).ok_or_else(|| {
            FlightLogError::InvalidArgument(format!("Log data does not contain column '{name}'"))
        })
    }

    /// Insert a column, replacing any existing column of the same name.
    ///
    /// New columns are appended after the existing ones. The column length
    /// must match the table's row count unless the table has no columns yet.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> LogResult<()> {
        if !self.columns.is_empty() && values.len() != self.n_rows() {
            return Err(FlightLogError::Processing(format!(
                "Column '{}' has {} values, table holds {} rows",
                name,
                values.len(),
                self.n_rows()
            )));
        }

        match self.names.iter().position(|n| n == name) {
            Some(idx) => self.columns[idx] = values,
            None => {
                self.names.push(name.to_string());
                self.columns.push(values);
            }
        }

        Ok(())
    }

    /// Copy of the row at the given index.
    pub fn row(&self, idx: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[idx]).collect()
    }

    /// New table containing rows `start..=end` (both indices inclusive).
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| c[start..=end].to_vec())
            .collect();

        Self {
            names: self.names.clone(),
            columns,
        }
    }

    /// Write the table to a CSV file, overwriting any existing file.
    pub fn write_csv(&self, path: &Path) -> LogResult<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        writer.write_record(&self.names)?;

        for idx in 0..self.n_rows() {
            let record: Vec<String> = self.columns.iter().map(|c| format_float(c[idx])).collect();
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Read a previously exported all-numeric CSV file.
    pub fn read_csv(path: &Path) -> LogResult<Self> {
        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = record
                .iter()
                .map(parse_float)
                .collect::<LogResult<Vec<f64>>>()?;
            rows.push(row);
        }

        Self::from_rows(names, &rows)
    }
}

impl Default for DataTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The GPS track stream: a datetime column plus numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackTable {
    /// UTC timestamp of each track record.
    pub time: Vec<DateTime<Utc>>,
    /// Numeric track columns (position, velocity, accuracy, derived values).
    pub data: DataTable,
}

impl TrackTable {
    /// Number of track records.
    pub fn n_rows(&self) -> usize {
        self.time.len()
    }

    /// Whether the track holds no records.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// New track containing rows `start..=end` (both indices inclusive).
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        Self {
            time: self.time[start..=end].to_vec(),
            data: self.data.slice_rows(start, end),
        }
    }

    /// Write the track to a CSV file with a leading `time` column.
    pub fn write_csv(&self, path: &Path) -> LogResult<()> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);

        let mut header = vec!["time".to_string()];
        header.extend(self.data.names().iter().cloned());
        writer.write_record(&header)?;

        for idx in 0..self.n_rows() {
            let mut record =
                vec![self.time[idx].to_rfc3339_opts(SecondsFormat::Micros, true)];
            record.extend(self.data.row(idx).into_iter().map(format_float));
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Read a previously exported track CSV file.
    ///
    /// The first column must be named `time` and carry ISO-8601 datetimes.
    pub fn read_csv(path: &Path) -> LogResult<Self> {
        let mut reader = csv::Reader::from_reader(File::open(path)?);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        if headers.first().map(String::as_str) != Some("time") {
            return Err(FlightLogError::RawLogParse(
                "Track data must lead with a 'time' column".to_string(),
            ));
        }

        let names: Vec<String> = headers[1..].to_vec();
        let mut time = Vec::new();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut fields = record.iter();
            let raw_time = fields.next().ok_or_else(|| {
                FlightLogError::RawLogParse("Encountered empty track record".to_string())
            })?;

            time.push(parse_datetime_lenient(raw_time)?);
            rows.push(fields.map(parse_float).collect::<LogResult<Vec<f64>>>()?);
        }

        Ok(Self {
            time,
            data: DataTable::from_rows(names, &rows)?,
        })
    }
}

/// Format a float for CSV output.
///
/// Integral values are written without a fractional part so integer-valued
/// source fields (e.g. satellite counts) survive an export/import round trip
/// unchanged.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Parse a single numeric CSV field.
pub(crate) fn parse_float(raw: &str) -> LogResult<f64> {
    raw.trim().parse::<f64>().map_err(|_| {
        FlightLogError::RawLogParse(format!("Could not convert field '{raw}' to a number"))
    })
}

/// Parse an ISO-8601-like datetime string, assuming UTC when no offset is given.
pub(crate) fn parse_datetime_lenient(raw: &str) -> LogResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| {
            FlightLogError::RawLogParse(format!("Could not parse datetime field '{raw}'"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> DataTable {
        DataTable::from_rows(
            vec!["time".to_string(), "pressure".to_string()],
            &[vec![1.0, 101_000.0], vec![2.0, 100_500.5]],
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_column_access() {
        let table = sample_table();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.n_cols(), 2);
        assert_eq!(table.column("pressure"), Some(&[101_000.0, 100_500.5][..]));
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn test_from_rows_ragged_rejected() {
        let result = DataTable::from_rows(
            vec!["a".to_string(), "b".to_string()],
            &[vec![1.0, 2.0], vec![3.0]],
        );
        assert!(matches!(result, Err(FlightLogError::InvalidArgument(_))));
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut table = sample_table();
        table.set_column("pressure", vec![1.0, 2.0]).unwrap();

        // Replacement must not change the column ordering
        assert_eq!(table.names(), &["time".to_string(), "pressure".to_string()]);
        assert_eq!(table.column("pressure"), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_set_column_length_mismatch_rejected() {
        let mut table = sample_table();
        let result = table.set_column("extra", vec![1.0]);
        assert!(matches!(result, Err(FlightLogError::Processing(_))));
    }

    #[test]
    fn test_slice_rows_inclusive() {
        let table = DataTable::from_rows(
            vec!["v".to_string()],
            &[vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
        )
        .unwrap();

        let sliced = table.slice_rows(1, 2);
        assert_eq!(sliced.column("v"), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        let table = sample_table();
        table.write_csv(&path).unwrap();

        let reloaded = DataTable::read_csv(&path).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_format_float_integral() {
        assert_eq!(format_float(5.0), "5");
        assert_eq!(format_float(-3.0), "-3");
        assert_eq!(format_float(0.5), "0.5");
    }

    #[test]
    fn test_parse_datetime_lenient_variants() {
        let with_offset = parse_datetime_lenient("2021-04-20T12:34:20.00Z").unwrap();
        let naive = parse_datetime_lenient("2021-04-20T12:34:20.000000").unwrap();
        assert_eq!(with_offset, naive);

        assert!(parse_datetime_lenient("not-a-time").is_err());
    }
}
