//! Record type and its delimited row format.
//!
//! Every data file, live or archived, is a `;`-delimited file whose first
//! row is [`HEADER`] followed by one row per [`LogEntry`]:
//!
//! ```text
//! timestamp;source_id;value;unit
//! 2025-01-01 15:30:00.125000000;temp_1;21.37;°C
//! ```

use csv::StringRecord;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::Result;

/// Field delimiter shared by the writer and the reader.
pub const DELIMITER: u8 = b';';

/// Header row written once at the top of every data file.
pub const HEADER: [&str; FIELD_COUNT] = ["timestamp", "source_id", "value", "unit"];

/// Number of fields in a well-formed row.
pub const FIELD_COUNT: usize = 4;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:9]");

// Accepts any number of fractional digits so rows produced by other tools
// with millisecond or microsecond precision still parse.
const TIMESTAMP_PARSE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");

/// One measurement from one data source.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: OffsetDateTime,
    pub source_id: String,
    pub value: f64,
    pub unit: String,
}

impl LogEntry {
    pub fn new(
        source_id: impl Into<String>,
        timestamp: OffsetDateTime,
        value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            source_id: source_id.into(),
            value,
            unit: unit.into(),
        }
    }

    /// Renders the entry as the four row fields, in header order.
    pub fn to_fields(&self) -> Result<[String; FIELD_COUNT]> {
        Ok([
            format_timestamp(self.timestamp)?,
            self.source_id.clone(),
            self.value.to_string(),
            self.unit.clone(),
        ])
    }

    /// Parses a data row. Returns `None` for rows that should be skipped:
    /// wrong field count, unparseable timestamp or unparseable value.
    pub fn from_record(record: &StringRecord) -> Option<Self> {
        if record.len() != FIELD_COUNT {
            return None;
        }
        let timestamp = parse_timestamp(&record[0]).ok()?;
        let value = record[2].trim().parse::<f64>().ok()?;
        Some(Self {
            timestamp,
            source_id: record[1].to_string(),
            value,
            unit: record[3].to_string(),
        })
    }
}

/// Formats an instant as `YYYY-MM-DD HH:MM:SS.fffffffff` in UTC, keeping
/// every nanosecond so a parsed row compares equal to what was logged.
pub fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    Ok(ts.to_offset(UtcOffset::UTC).format(TIMESTAMP_FORMAT)?)
}

/// Parses a timestamp written by [`format_timestamp`]. The text carries no
/// offset and is always interpreted as UTC.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime> {
    let naive = PrimitiveDateTime::parse(text.trim(), TIMESTAMP_PARSE_FORMAT)?;
    Ok(naive.assume_utc())
}
