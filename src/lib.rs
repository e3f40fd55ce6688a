//! Buffered, rotating log for timestamped sensor readings.
//!
//! Readings are buffered in memory and written as `;`-delimited rows to an
//! active file named from a time template. The active file is rotated by
//! age, size or row count into gzip archives, archives past the retention
//! window are deleted, and [`BufferedLog::read_logs`] reads back across the
//! live file and every archive.
//!
//! ```rust,no_run
//! use sensorlog::{BufferedLog, LogConfig};
//! use time::OffsetDateTime;
//!
//! let config = LogConfig::load("config.json")?;
//! let mut log = BufferedLog::new(config)?;
//! log.start()?;
//! log.log_reading("temp_1", OffsetDateTime::now_utc(), 21.5, "°C")?;
//! log.stop()?;
//!
//! let end = OffsetDateTime::now_utc();
//! for entry in log.read_logs(end - time::Duration::hours(1), end, Some("temp_1")) {
//!     println!("{:?}", entry?);
//! }
//! # Ok::<(), sensorlog::Error>(())
//! ```

pub mod archive;
pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod pattern;
pub mod reader;
pub mod retention;
pub mod rotation;
pub mod source;
pub mod writer;

pub use archive::{ArchiveKind, ArchiveOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LogConfig;
pub use entry::LogEntry;
pub use error::{Error, Result};
pub use reader::{read_logs, HistoryReader, LogQuery};
pub use retention::{sweep_archives, SweepStats};
pub use rotation::{RotationPolicy, RotationReason};
pub use source::{DataSource, Reading, SensorArray};
pub use writer::BufferedLog;
