use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("invalid filename pattern: {0}")]
    Pattern(String),
    #[error("timestamp error: {0}")]
    Timestamp(String),
    #[error("log not started")]
    NotStarted,
    #[error("source {0} is disabled")]
    SourceDisabled(String),
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Config(value.to_string())
    }
}

impl From<time::error::Format> for Error {
    fn from(value: time::error::Format) -> Self {
        Error::Timestamp(value.to_string())
    }
}

impl From<time::error::Parse> for Error {
    fn from(value: time::error::Parse) -> Self {
        Error::Timestamp(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
