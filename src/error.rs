use std::io;

/// A raw line that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{dialect}: {reason}")]
pub struct ParseError {
    pub dialect: &'static str,
    pub reason: String,
}

impl ParseError {
    pub fn new(dialect: &'static str, reason: impl Into<String>) -> Self {
        Self {
            dialect,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the ordering engine.
///
/// Out-of-order output caused by a window that is too small is not an error
/// and never shows up here.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// A line failed to parse while `ignore_invalid` was off
    #[error("malformed record at line {sequence}: {source}")]
    MalformedRecord {
        sequence: u64,
        line: String,
        #[source]
        source: ParseError,
    },

    /// Invalid construction parameters
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stream that was required to carry records ended without any
    #[error("log was empty")]
    Empty,

    /// Failure reading the underlying line source, passed through unchanged
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl MergeError {
    pub fn config(message: impl Into<String>) -> Self {
        MergeError::Configuration(message.into())
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, MergeError::MalformedRecord { .. })
    }
}

pub type MergeResult<T> = Result<T, MergeError>;
