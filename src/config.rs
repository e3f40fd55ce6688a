//! Log configuration.
//!
//! Loaded once from a JSON document and immutable afterwards. Every numeric
//! field is validated up front so the writer never has to re-check it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pattern::FilenamePattern;
use crate::rotation::RotationPolicy;

/// Subdirectory of `log_dir` holding rotated archives.
pub const ARCHIVE_DIR: &str = "archive";

/// Bytes per configured megabyte.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

const SECS_PER_HOUR: f64 = 3600.0;
const SECS_PER_DAY: f64 = 86_400.0;

/// Configuration for a [`BufferedLog`](crate::BufferedLog).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory holding the active file(s) and the `archive/` subdirectory.
    pub log_dir: PathBuf,

    /// Time template for the active file name, e.g. `sensors_%Y%m%d.csv`.
    pub filename_pattern: String,

    /// Number of buffered entries that triggers a flush.
    pub buffer_size: usize,

    /// Age of the active file that triggers rotation.
    pub rotate_every_hours: f64,

    /// Size of the active file that triggers rotation.
    pub max_size_mb: f64,

    /// Data rows in the active file that trigger rotation.
    /// Absent means unbounded.
    #[serde(default)]
    pub rotate_after_lines: Option<u64>,

    /// Age after which archives are deleted.
    pub retention_days: f64,
}

impl LogConfig {
    /// Defaults for everything but the directory.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            filename_pattern: "sensors_%Y%m%d.csv".to_string(),
            buffer_size: 100,
            rotate_every_hours: 24.0,
            max_size_mb: 10.0,
            rotate_after_lines: None,
            retention_days: 7.0,
        }
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        let config: LogConfig = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LogConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::Config("buffer_size must be at least 1".into()));
        }
        if self.rotate_after_lines == Some(0) {
            return Err(Error::Config("rotate_after_lines must be at least 1".into()));
        }
        positive("rotate_every_hours", self.rotate_every_hours)?;
        positive("max_size_mb", self.max_size_mb)?;
        if !self.retention_days.is_finite() || self.retention_days < 0.0 {
            return Err(Error::Config(format!(
                "retention_days must be a non-negative number, got {}",
                self.retention_days
            )));
        }
        self.rotate_every()?;
        self.retention()?;
        self.pattern()?;
        Ok(())
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.log_dir.join(ARCHIVE_DIR)
    }

    pub fn pattern(&self) -> Result<FilenamePattern> {
        FilenamePattern::parse(&self.filename_pattern)
    }

    pub fn rotate_every(&self) -> Result<Duration> {
        duration("rotate_every_hours", self.rotate_every_hours * SECS_PER_HOUR)
    }

    pub fn retention(&self) -> Result<Duration> {
        duration("retention_days", self.retention_days * SECS_PER_DAY)
    }

    /// Size limit in bytes, rounded up so a fractional limit is never undercut.
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb * BYTES_PER_MB).ceil() as u64
    }

    pub fn rotation_policy(&self) -> Result<RotationPolicy> {
        Ok(RotationPolicy {
            max_age: self.rotate_every()?,
            max_size_bytes: self.max_size_bytes(),
            max_lines: self.rotate_after_lines,
        })
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("logs")
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

fn duration(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::Config(format!("{name} out of range: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "log_dir": "./logs",
        "filename_pattern": "sensors_%Y%m%d.csv",
        "buffer_size": 10,
        "rotate_every_hours": 0.5,
        "max_size_mb": 1.5,
        "retention_days": 30
    }"#;

    #[test]
    fn test_parse_without_line_limit() {
        let config = LogConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.buffer_size, 10);
        assert_eq!(config.rotate_after_lines, None);
        assert_eq!(config.rotate_every().unwrap(), Duration::from_secs(1800));
        assert_eq!(config.retention().unwrap(), Duration::from_secs(30 * 86_400));
        assert_eq!(config.max_size_bytes(), 1_572_864);
        assert_eq!(config.archive_dir(), PathBuf::from("./logs/archive"));
    }

    #[test]
    fn test_parse_with_line_limit() {
        let json = SAMPLE.replace("\"retention_days\": 30", "\"retention_days\": 30, \"rotate_after_lines\": 500");
        let config = LogConfig::from_json(&json).unwrap();
        assert_eq!(config.rotate_after_lines, Some(500));
    }

    #[test]
    fn test_missing_required_field() {
        let json = SAMPLE.replace("\"buffer_size\": 10,", "");
        assert!(matches!(LogConfig::from_json(&json), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = LogConfig::new("logs");
        config.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = LogConfig::new("logs");
        config.rotate_every_hours = -1.0;
        assert!(config.validate().is_err());

        let mut config = LogConfig::new("logs");
        config.max_size_mb = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = LogConfig::new("logs");
        config.rotate_after_lines = Some(0);
        assert!(config.validate().is_err());

        let mut config = LogConfig::new("logs");
        config.filename_pattern = "sensors.txt".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retention_is_allowed() {
        let mut config = LogConfig::new("logs");
        config.retention_days = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = LogConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized = LogConfig::from_json(&json).unwrap();
        assert_eq!(config, deserialized);
    }
}
