//! Buffered writer for the active data file.
//!
//! [`BufferedLog`] owns the one open file of a log directory. Accepted
//! entries are held in memory until `buffer_size` of them accumulate, then
//! written as one batch and synced. After every accepted entry the rotation
//! policy is consulted; a due rotation flushes, closes, archives, sweeps
//! expired archives and reopens before the call returns.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use time::OffsetDateTime;

use crate::archive::{archive_file, ArchiveOutcome};
use crate::clock::{Clock, SystemClock};
use crate::config::LogConfig;
use crate::entry::{LogEntry, DELIMITER, HEADER};
use crate::error::{Error, Result};
use crate::pattern::FilenamePattern;
use crate::reader::{HistoryReader, LogQuery};
use crate::retention::sweep_archives;
use crate::rotation::{FileState, RotationPolicy, RotationReason};

struct ActiveFile {
    path: PathBuf,
    file: File,
}

/// Single writer for one log directory.
pub struct BufferedLog {
    config: LogConfig,
    pattern: FilenamePattern,
    policy: RotationPolicy,
    retention: Duration,
    clock: Box<dyn Clock>,
    active: Option<ActiveFile>,
    buffer: Vec<LogEntry>,
    line_count: u64,
    last_rotation: OffsetDateTime,
    rotations: u64,
}

impl BufferedLog {
    /// Creates a stopped log driven by the system clock.
    pub fn new(config: LogConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(config: LogConfig, clock: impl Clock) -> Result<Self> {
        config.validate()?;
        let pattern = config.pattern()?;
        let policy = config.rotation_policy()?;
        let retention = config.retention()?;
        let last_rotation = clock.now();
        Ok(Self {
            buffer: Vec::with_capacity(config.buffer_size),
            config,
            pattern,
            policy,
            retention,
            clock: Box::new(clock),
            active: None,
            line_count: 0,
            last_rotation,
            rotations: 0,
        })
    }

    /// Opens the active file for the current period.
    ///
    /// A new file gets the header row immediately. An existing file (left by
    /// an earlier run in the same period) is reopened for append and its
    /// data rows are counted. Starting an already started log stops it first.
    pub fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            self.stop()?;
        }

        let now = self.clock.now();
        std::fs::create_dir_all(self.config.archive_dir())?;
        let path = self.config.log_dir.join(self.pattern.render(now));

        let has_content = std::fs::metadata(&path)
            .map(|meta| meta.len() > 0)
            .unwrap_or(false);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let line_count = if has_content {
            count_data_rows(&path)?
        } else {
            append_batch(&mut file, &encode_rows([HEADER])?)?;
            file.sync_data()?;
            0
        };

        log::info!("opened {} ({} existing rows)", path.display(), line_count);
        self.active = Some(ActiveFile { path, file });
        self.line_count = line_count;
        self.last_rotation = now;
        Ok(())
    }

    /// Accepts one reading from a data source.
    pub fn log_reading(
        &mut self,
        source_id: &str,
        timestamp: OffsetDateTime,
        value: f64,
        unit: &str,
    ) -> Result<()> {
        self.log(LogEntry::new(source_id, timestamp, value, unit))
    }

    /// Accepts one entry, flushing when the buffer is full and rotating when
    /// the policy says so.
    pub fn log(&mut self, entry: LogEntry) -> Result<()> {
        if self.active.is_none() {
            return Err(Error::NotStarted);
        }

        self.buffer.push(entry);
        if self.buffer.len() >= self.config.buffer_size {
            self.flush()?;
        }

        if let Some(reason) = self.rotation_due()? {
            self.rotate_for(reason)?;
        }
        Ok(())
    }

    /// Writes every buffered entry to the active file and syncs it.
    ///
    /// The batch is appended in one write. If that write fails the file is
    /// cut back to its previous length and the buffer is kept, so a later
    /// flush writes each entry exactly once.
    pub fn flush(&mut self) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        if self.buffer.is_empty() {
            return Ok(());
        }

        let rows = self
            .buffer
            .iter()
            .map(LogEntry::to_fields)
            .collect::<Result<Vec<_>>>()?;
        append_batch(&mut active.file, &encode_rows(&rows)?)?;
        active.file.sync_data()?;

        let written = self.buffer.len();
        self.line_count += written as u64;
        self.buffer.clear();
        log::debug!(
            "flushed {} rows to {} ({} total)",
            written,
            active.path.display(),
            self.line_count
        );
        Ok(())
    }

    /// Flushes and closes the active file. Does nothing when already stopped.
    pub fn stop(&mut self) -> Result<()> {
        self.flush()?;
        if let Some(active) = self.active.take() {
            active.file.sync_all()?;
            log::info!("closed {}", active.path.display());
        }
        self.line_count = 0;
        Ok(())
    }

    /// Evaluates the rotation policy against the active file.
    ///
    /// Returns `None` when the log is stopped.
    pub fn rotation_due(&self) -> Result<Option<RotationReason>> {
        let Some(active) = self.active.as_ref() else {
            return Ok(None);
        };
        let size_bytes = match std::fs::metadata(&active.path) {
            Ok(meta) => Some(meta.len()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        let age = (self.clock.now() - self.last_rotation)
            .try_into()
            .unwrap_or(Duration::ZERO);
        Ok(self.policy.evaluate(&FileState {
            age,
            size_bytes,
            line_count: self.line_count,
        }))
    }

    /// Rotates the active file now, regardless of the policy.
    ///
    /// Returns the archive written for the previous file, or `None` if that
    /// file had disappeared from disk. If archiving fails the log is left
    /// stopped with the previous file untouched; calling [`start`] reopens it.
    ///
    /// [`start`]: BufferedLog::start
    pub fn rotate(&mut self) -> Result<Option<ArchiveOutcome>> {
        let path = self
            .active
            .as_ref()
            .map(|active| active.path.clone())
            .ok_or(Error::NotStarted)?;
        log::info!("rotating {} on request", path.display());
        self.rotate_path(path)
    }

    fn rotate_for(&mut self, reason: RotationReason) -> Result<()> {
        if let Some(active) = self.active.as_ref() {
            log::info!(
                "rotating {} ({} limit reached, {} rows)",
                active.path.display(),
                reason,
                self.line_count
            );
            let path = active.path.clone();
            self.rotate_path(path)?;
        }
        Ok(())
    }

    fn rotate_path(&mut self, path: PathBuf) -> Result<Option<ArchiveOutcome>> {
        self.stop()?;

        let rotated_at = self.clock.now();
        let archive_dir = self.config.archive_dir();
        let outcome = if path.exists() {
            Some(archive_file(&path, &archive_dir, rotated_at)?)
        } else {
            log::warn!("{} vanished before rotation", path.display());
            None
        };

        let stats = sweep_archives(&archive_dir, self.retention, rotated_at);
        if !stats.deleted.is_empty() || stats.has_errors() {
            log::info!("retention sweep: {}", stats.summary());
        }

        self.start()?;
        self.rotations += 1;
        Ok(outcome)
    }

    /// Historical entries in `[start, end]`, optionally for one source.
    ///
    /// Only flushed rows are visible; call [`flush`](BufferedLog::flush) or
    /// [`stop`](BufferedLog::stop) first to include buffered entries.
    pub fn read_logs(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
        source_id: Option<&str>,
    ) -> HistoryReader {
        let mut query = LogQuery::new(start, end);
        if let Some(id) = source_id {
            query = query.source(id);
        }
        HistoryReader::new(&self.config.log_dir, query)
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }

    /// Durable data rows in the active file.
    pub fn line_count(&self) -> u64 {
        self.line_count
    }

    /// Entries accepted but not yet written.
    pub fn buffered(&self) -> &[LogEntry] {
        &self.buffer
    }

    pub fn last_rotation(&self) -> OffsetDateTime {
        self.last_rotation
    }

    /// Rotations performed since this log was created.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }
}

impl Drop for BufferedLog {
    fn drop(&mut self) {
        if self.active.is_some() {
            if let Err(err) = self.stop() {
                log::error!("failed to stop log on drop: {err}");
            }
        }
    }
}

/// Renders rows as delimited text, quoting fields where needed.
fn encode_rows<I, R>(rows: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row)?;
    }
    writer.into_inner().map_err(|e| Error::from(e.into_error()))
}

/// Appends `bytes` in full or not at all.
fn append_batch(file: &mut File, bytes: &[u8]) -> Result<()> {
    let len = file.metadata()?.len();
    if let Err(err) = file.write_all(bytes) {
        if let Err(trunc) = file.set_len(len) {
            log::error!("rolling back partial write failed: {trunc}");
        }
        return Err(err.into());
    }
    Ok(())
}

/// Rows in an existing data file, minus the header row.
fn count_data_rows(path: &Path) -> Result<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut record = csv::ByteRecord::new();
    let mut rows = 0u64;
    while reader.read_byte_record(&mut record)? {
        rows += 1;
    }
    Ok(rows.saturating_sub(1))
}
