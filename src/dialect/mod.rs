use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::record::{LogFields, Record};
use crate::source::RecordParser;

pub mod combined;
pub mod s3;

pub use combined::{ApacheLine, CombinedFields, CombinedLine};
pub use s3::S3Line;

/// Format of the bracketed access log timestamp, e.g. `24/Apr/2010:10:00:00 +0100`
pub const STAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

static STAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([0-9]{2}/[A-Za-z]{3}/[0-9]{4}:[0-9]{2}:[0-9]{2}:[0-9]{2} [+-][0-9]{4})\]")
        .expect("failed to compile stamp regex")
});

/// Access log dialect selected per job
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// NCSA combined log format, optionally with an X-Forwarded-For chain
    #[default]
    Combined,
    /// Combined log format with a trailing cookie field
    Apache,
    /// Amazon S3 server access log format
    S3,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Combined => "combined",
            Dialect::Apache => "apache",
            Dialect::S3 => "s3",
        }
    }

    pub fn parse_line(&self, line: &str) -> Result<LogLine, ParseError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        match self {
            Dialect::Combined => CombinedLine::parse(line).map(LogLine::Combined),
            Dialect::Apache => ApacheLine::parse(line).map(LogLine::Apache),
            Dialect::S3 => S3Line::parse(line).map(LogLine::S3),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" | "clf" => Ok(Dialect::Combined),
            "apache" => Ok(Dialect::Apache),
            "s3" => Ok(Dialect::S3),
            other => Err(format!(
                "unknown log format '{}' (expected combined, apache or s3)",
                other
            )),
        }
    }
}

impl RecordParser for Dialect {
    type Payload = LogLine;

    fn parse_record(&self, line: &str, sequence: u64) -> Result<Record<LogLine>, ParseError> {
        let parsed = self.parse_line(line)?;
        Ok(Record::new(parsed.timestamp(), sequence, parsed))
    }
}

/// One parsed access log line of any supported dialect
#[derive(Debug, Clone, PartialEq)]
pub enum LogLine {
    Combined(CombinedLine),
    Apache(ApacheLine),
    S3(S3Line),
}

impl LogLine {
    pub fn dialect(&self) -> Dialect {
        match self {
            LogLine::Combined(_) => Dialect::Combined,
            LogLine::Apache(_) => Dialect::Apache,
            LogLine::S3(_) => Dialect::S3,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.local_timestamp().with_timezone(&Utc)
    }

    /// Timestamp with the offset written in the line
    pub fn local_timestamp(&self) -> DateTime<FixedOffset> {
        match self {
            LogLine::Combined(line) => line.timestamp,
            LogLine::Apache(line) => line.combined.timestamp,
            LogLine::S3(line) => line.timestamp,
        }
    }

    /// Re-render the line in combined log format
    pub fn as_combined_line(&self) -> String {
        match self {
            LogLine::Combined(line) => line.as_combined_line(),
            LogLine::Apache(line) => line.combined.as_combined_line(),
            LogLine::S3(line) => line.as_combined_line(),
        }
    }

    /// Status code as a number
    pub fn status(&self) -> Option<u16> {
        self.field("code").and_then(|code| code.parse().ok())
    }

    /// Response size in bytes; `None` for `-`
    pub fn bytes(&self) -> Option<u64> {
        self.field("size").and_then(|size| size.parse().ok())
    }
}

impl LogFields for LogLine {
    fn field(&self, name: &str) -> Option<&str> {
        match self {
            LogLine::Combined(line) => line.field(name),
            LogLine::Apache(line) => line.field(name),
            LogLine::S3(line) => line.field(name),
        }
    }

    fn as_line(&self) -> &str {
        match self {
            LogLine::Combined(line) => &line.line,
            LogLine::Apache(line) => &line.combined.line,
            LogLine::S3(line) => &line.line,
        }
    }
}

/// Parse the bracketed stamp into an offset-aware time
pub(crate) fn parse_stamp(dialect: &'static str, stamp: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_str(stamp, STAMP_FORMAT)
        .map_err(|e| ParseError::new(dialect, format!("invalid timestamp '{}': {}", stamp, e)))
}

/// First bracketed stamp anywhere in the line, with its parsed time
pub(crate) fn find_stamp(
    dialect: &'static str,
    line: &str,
) -> Result<(String, DateTime<FixedOffset>), ParseError> {
    let stamp = STAMP_REGEX
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| ParseError::new(dialect, "no [dd/Mon/yyyy:HH:MM:SS +zzzz] timestamp in line"))?;
    Ok((stamp.to_string(), parse_stamp(dialect, stamp)?))
}

/// Date and time parts of a validated stamp; the regexes only admit ASCII
/// digits and letters here, so byte offsets are safe.
pub(crate) fn stamp_part<'a>(stamp: &'a str, name: &str) -> Option<&'a str> {
    let range = match name {
        "day" => 0..2,
        "month" => 3..6,
        "year" => 7..11,
        "hour" => 12..14,
        "minute" => 15..17,
        "second" => 18..20,
        "tz" => 21..26,
        _ => return None,
    };
    stamp.get(range)
}
