//! Historical read-back over live and archived data files.
//!
//! A [`HistoryReader`] walks, in order, the live `*.csv` files in the log
//! directory, the gzip archives in `archive/`, and finally any plain `*.csv`
//! archives there. Within each group files are visited in name order and rows
//! in file order; there is no global sort.
//!
//! Rows that do not parse are skipped. A file that fails part-way (I/O error,
//! corrupt gzip stream) yields one [`Error::ReadFile`] and the reader moves on
//! to the next file.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use flate2::read::GzDecoder;
use time::OffsetDateTime;

use crate::archive::ARCHIVE_EXTENSION;
use crate::config::ARCHIVE_DIR;
use crate::entry::{LogEntry, DELIMITER};
use crate::error::{Error, Result};
use crate::pattern::DATA_EXTENSION;

/// Time range and optional source filter for a read.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub source_id: Option<String>,
}

impl LogQuery {
    /// Matches every source between `start` and `end`, both inclusive.
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start,
            end,
            source_id: None,
        }
    }

    /// Restricts the query to one source id (exact match).
    pub fn source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if entry.timestamp < self.start || entry.timestamp > self.end {
            return false;
        }
        match &self.source_id {
            Some(id) => entry.source_id == *id,
            None => true,
        }
    }
}

/// How a discovered data file is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Live file directly in the log directory.
    Live,
    /// gzip archive in the archive directory.
    Compressed,
    /// Uncompressed fallback archive.
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSource {
    pub path: PathBuf,
    pub kind: SourceKind,
}

/// Lists every data file under `log_dir` in read order.
pub fn discover_sources(log_dir: &Path) -> Result<Vec<LogSource>> {
    let archive_dir = log_dir.join(ARCHIVE_DIR);
    let mut sources = Vec::new();
    for path in list_files(log_dir, |name| has_extension(name, DATA_EXTENSION))? {
        sources.push(LogSource {
            path,
            kind: SourceKind::Live,
        });
    }
    for path in list_files(&archive_dir, |name| has_extension(name, ARCHIVE_EXTENSION))? {
        sources.push(LogSource {
            path,
            kind: SourceKind::Compressed,
        });
    }
    for path in list_files(&archive_dir, |name| has_extension(name, DATA_EXTENSION))? {
        sources.push(LogSource {
            path,
            kind: SourceKind::Plain,
        });
    }
    Ok(sources)
}

fn has_extension(name: &str, ext: &str) -> bool {
    name.len() > ext.len() + 1
        && name.ends_with(ext)
        && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
}

fn list_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if keep(name) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Lazy, restartable sequence of matching entries.
///
/// Nothing touches the filesystem until the first call to `next`.
pub struct HistoryReader {
    log_dir: PathBuf,
    query: LogQuery,
    pending: Option<VecDeque<LogSource>>,
    current: Option<FileRows>,
}

impl HistoryReader {
    pub fn new(log_dir: impl Into<PathBuf>, query: LogQuery) -> Self {
        Self {
            log_dir: log_dir.into(),
            query,
            pending: None,
            current: None,
        }
    }

    pub fn query(&self) -> &LogQuery {
        &self.query
    }

    /// Drops per-file errors (they are still logged) and yields entries only.
    pub fn entries(self) -> impl Iterator<Item = LogEntry> {
        self.filter_map(|item| item.ok())
    }
}

impl Iterator for HistoryReader {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_none() {
            match discover_sources(&self.log_dir) {
                Ok(sources) => self.pending = Some(sources.into()),
                Err(err) => {
                    self.pending = Some(VecDeque::new());
                    log::warn!("listing {} failed: {err}", self.log_dir.display());
                    return Some(Err(err));
                }
            }
        }

        loop {
            if let Some(rows) = self.current.as_mut() {
                match rows.next_match(&self.query) {
                    Ok(Some(entry)) => return Some(Ok(entry)),
                    Ok(None) => self.current = None,
                    Err(err) => {
                        let path = rows.path.clone();
                        self.current = None;
                        return Some(Err(file_error(path, err)));
                    }
                }
            }

            let source = self.pending.as_mut()?.pop_front()?;
            match FileRows::open(&source) {
                Ok(rows) => self.current = Some(rows),
                Err(err) => return Some(Err(file_error(source.path, err))),
            }
        }
    }
}

fn file_error(path: PathBuf, err: Error) -> Error {
    log::warn!("skipping rest of {}: {err}", path.display());
    Error::ReadFile {
        path,
        source: Box::new(err),
    }
}

/// Reads `log_dir` without a writer.
pub fn read_logs(
    log_dir: impl Into<PathBuf>,
    start: OffsetDateTime,
    end: OffsetDateTime,
    source_id: Option<&str>,
) -> HistoryReader {
    let mut query = LogQuery::new(start, end);
    if let Some(id) = source_id {
        query = query.source(id);
    }
    HistoryReader::new(log_dir, query)
}

struct FileRows {
    path: PathBuf,
    reader: csv::Reader<Box<dyn Read>>,
    record: StringRecord,
}

impl FileRows {
    fn open(source: &LogSource) -> Result<Self> {
        let file = File::open(&source.path)?;
        let input: Box<dyn Read> = match source.kind {
            SourceKind::Compressed => Box::new(GzDecoder::new(file)),
            SourceKind::Live | SourceKind::Plain => Box::new(file),
        };
        // The header row never parses as a record, so it is skipped along
        // with any other malformed row.
        let reader = csv::ReaderBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(false)
            .flexible(true)
            .from_reader(input);
        Ok(Self {
            path: source.path.clone(),
            reader,
            record: StringRecord::new(),
        })
    }

    fn next_match(&mut self, query: &LogQuery) -> Result<Option<LogEntry>> {
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(false) => return Ok(None),
                Ok(true) => match LogEntry::from_record(&self.record) {
                    Some(entry) if query.matches(&entry) => return Ok(Some(entry)),
                    Some(_) => {}
                    None => log::trace!(
                        "{}: skipping malformed row {:?}",
                        self.path.display(),
                        self.record
                    ),
                },
                Err(err) if matches!(err.kind(), csv::ErrorKind::Utf8 { .. }) => {
                    log::trace!("{}: skipping non-utf8 row", self.path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
