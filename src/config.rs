//! Application settings with layered configuration sources.
//!
//! Settings are resolved in three layers, later layers overriding earlier
//! ones: built-in defaults, an optional TOML file, and environment variables
//! prefixed with `FLIGHTLOG_` (e.g. `FLIGHTLOG_PARSING__GROUND_PRESSURE_PA`).

use std::path::Path;

use serde::Deserialize;

use crate::error::LogResult;

/// Standard day sea level pressure, in Pascals.
pub const STANDARD_SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;

/// Settings for the raw log parsing pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsingSettings {
    /// Filename of the onboard sensor log within a modern log directory.
    pub sensor_filename: String,
    /// Filename of the GPS track log within a modern log directory.
    pub track_filename: String,
    /// Ground-level atmospheric pressure reference for altitude derivation.
    pub ground_pressure_pa: f64,
}

/// Settings for the trim engine.
#[derive(Debug, Clone, Deserialize)]
pub struct TrimSettings {
    /// Suffix appended to the file stem of raw-trimmed log files.
    pub filename_suffix: String,
}

/// Top-level application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Parsing pipeline settings.
    pub parsing: ParsingSettings,
    /// Trim engine settings.
    pub trim: TrimSettings,
}

impl Settings {
    /// Load settings from defaults, an optional TOML file, and the environment.
    pub fn new(config_path: Option<&Path>) -> LogResult<Self> {
        let mut builder = config::Config::builder()
            .set_default("parsing.sensor_filename", "SENSOR.CSV")?
            .set_default("parsing.track_filename", "TRACK.CSV")?
            .set_default("parsing.ground_pressure_pa", STANDARD_SEA_LEVEL_PRESSURE_PA)?
            .set_default("trim.filename_suffix", "_trimmed")?;

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("FLIGHTLOG").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parsing: ParsingSettings {
                sensor_filename: "SENSOR.CSV".to_string(),
                track_filename: "TRACK.CSV".to_string(),
                ground_pressure_pa: STANDARD_SEA_LEVEL_PRESSURE_PA,
            },
            trim: TrimSettings {
                filename_suffix: "_trimmed".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.parsing.sensor_filename, "SENSOR.CSV");
        assert_eq!(settings.parsing.track_filename, "TRACK.CSV");
        assert_eq!(
            settings.parsing.ground_pressure_pa,
            STANDARD_SEA_LEVEL_PRESSURE_PA
        );
        assert_eq!(settings.trim.filename_suffix, "_trimmed");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[parsing]\nground_pressure_pa = 100000.0").unwrap();

        let settings = Settings::new(Some(file.path())).unwrap();
        assert_eq!(settings.parsing.ground_pressure_pa, 100_000.0);

        // Unrelated defaults are untouched
        assert_eq!(settings.parsing.sensor_filename, "SENSOR.CSV");
    }
}
