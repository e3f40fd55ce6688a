//! Time templates for active file names.
//!
//! Templates use the familiar `strftime` specifiers, restricted to the ones
//! that make sense in a file name: `%Y`, `%m`, `%d`, `%H`, `%M`, `%S` and
//! `%%`. The template's granularity decides how many logical files exist per
//! period: `sensors_%Y%m%d.csv` yields one per day, `sensors_%Y%m%d_%H.csv`
//! one per hour.

use std::fmt::Write as _;

use time::OffsetDateTime;

use crate::error::{Error, Result};

/// Extension carried by every live data file.
pub const DATA_EXTENSION: &str = "csv";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// A validated file name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenamePattern {
    template: String,
    parts: Vec<Part>,
}

impl FilenamePattern {
    pub fn parse(template: &str) -> Result<Self> {
        if template.contains('/') || template.contains('\\') {
            return Err(Error::Pattern(format!(
                "{template}: must be a bare file name"
            )));
        }
        if !template.ends_with(&format!(".{DATA_EXTENSION}")) {
            return Err(Error::Pattern(format!(
                "{template}: must end with .{DATA_EXTENSION}"
            )));
        }

        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            let part = match chars.next() {
                Some('%') => {
                    literal.push('%');
                    continue;
                }
                Some('Y') => Part::Year,
                Some('m') => Part::Month,
                Some('d') => Part::Day,
                Some('H') => Part::Hour,
                Some('M') => Part::Minute,
                Some('S') => Part::Second,
                Some(other) => {
                    return Err(Error::Pattern(format!(
                        "{template}: unsupported specifier %{other}"
                    )))
                }
                None => {
                    return Err(Error::Pattern(format!("{template}: dangling %")));
                }
            };
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(part);
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Ok(Self {
            template: template.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Evaluates the template against `at`.
    pub fn render(&self, at: OffsetDateTime) -> String {
        let mut out = String::with_capacity(self.template.len() + 8);
        for part in &self.parts {
            // Writing into a String cannot fail.
            let _ = match part {
                Part::Literal(text) => {
                    out.push_str(text);
                    Ok(())
                }
                Part::Year => write!(out, "{:04}", at.year()),
                Part::Month => write!(out, "{:02}", u8::from(at.month())),
                Part::Day => write!(out, "{:02}", at.day()),
                Part::Hour => write!(out, "{:02}", at.hour()),
                Part::Minute => write!(out, "{:02}", at.minute()),
                Part::Second => write!(out, "{:02}", at.second()),
            };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn renders_daily_template() {
        let pattern = FilenamePattern::parse("sensors_%Y%m%d.csv").unwrap();
        assert_eq!(
            pattern.render(datetime!(2025-01-01 15:30:00 UTC)),
            "sensors_20250101.csv"
        );
    }

    #[test]
    fn renders_every_specifier() {
        let pattern = FilenamePattern::parse("%Y-%m-%d_%H%M%S_100%%.csv").unwrap();
        assert_eq!(
            pattern.render(datetime!(2024-02-29 07:08:09 UTC)),
            "2024-02-29_070809_100%.csv"
        );
    }

    #[test]
    fn rejects_unknown_specifier() {
        let err = FilenamePattern::parse("sensors_%j.csv").unwrap_err();
        assert!(matches!(err, Error::Pattern(_)));
    }

    #[test]
    fn rejects_directories_and_other_extensions() {
        assert!(FilenamePattern::parse("logs/sensors_%Y.csv").is_err());
        assert!(FilenamePattern::parse("sensors_%Y.log").is_err());
        assert!(FilenamePattern::parse("sensors_%.csv").is_err());
    }
}
