use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{parse_stamp, stamp_part};
use crate::error::ParseError;

// Amazon S3 server access log. Later S3 revisions append further fields,
// so nothing is anchored after the user agent.
const S3_PATTERN: &str = concat!(
    r#"^(?P<owner>[0-9a-z]+|-) "#,
    r#"(?P<bucket>[a-z0-9.-]+|-) "#,
    r#"\[(?P<stamp>[0-9]{2}/[A-Za-z]{3}/[0-9]{4}:[0-9]{2}:[0-9]{2}:[0-9]{2} [+-][0-9]{4})\] "#,
    r#"(?P<ip>[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}|-|unknown) "#,
    r#"(?P<requester>[\w:/.-]+|-) "#,
    r#"(?P<request>[0-9A-Z]+|-) "#,
    r#"(?P<operation>SOAP\.[\w.]+|REST\.\w+\.\w+|-) "#,
    r#"(?P<key>\S+) "#,
    r#""(?P<verb>[A-Z]+) (?P<req>\S+) (?P<proto>HTTP/1\.[01])" "#,
    r#"(?P<code>[0-9]{3}) "#,
    r#"(?P<error_code>\w+|-) "#,
    r#"(?P<size>[0-9]+|-) "#,
    r#"(?P<filesize>[0-9]+|-) "#,
    r#"(?P<total_time>[0-9]+|-) "#,
    r#"(?P<turnaround_time>[0-9]+|-) "#,
    r#""(?P<ref>.*?)" "#,
    r#""(?P<ua>.*?)""#,
);

static S3_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(S3_PATTERN).expect("failed to compile s3 log regex"));

const S3_FIELDS: &[&str] = &[
    "owner",
    "bucket",
    "ip",
    "requester",
    "request",
    "operation",
    "key",
    "verb",
    "req",
    "proto",
    "code",
    "error_code",
    "size",
    "filesize",
    "total_time",
    "turnaround_time",
    "ref",
    "ua",
];

/// A line of an S3 server access log
#[derive(Debug, Clone, PartialEq)]
pub struct S3Line {
    pub line: String,
    pub stamp: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Values of [`S3_FIELDS`], in the same order
    values: Vec<String>,
}

impl S3Line {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let caps = S3_REGEX
            .captures(line)
            .ok_or_else(|| ParseError::new("s3", "line does not match s3 access log format"))?;

        let stamp = caps.name("stamp").map_or("", |m| m.as_str());
        let values = S3_FIELDS
            .iter()
            .map(|name| caps.name(name).map_or_else(String::new, |m| m.as_str().to_string()))
            .collect();

        Ok(Self {
            line: line.to_string(),
            stamp: stamp.to_string(),
            timestamp: parse_stamp("s3", stamp)?,
            values,
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match S3_FIELDS.iter().position(|f| *f == name) {
            Some(idx) => self.values.get(idx).map(String::as_str).filter(|v| !v.is_empty()),
            None => stamp_part(&self.stamp, name),
        }
    }

    /// Render as a combined log line; S3 has no username so `-` stands in
    pub fn as_combined_line(&self) -> String {
        let get = |name| self.field(name).unwrap_or("-");
        format!(
            r#"{} - - [{}] "{} {} {}" {} {} "{}" "{}""#,
            get("ip"),
            self.stamp,
            get("verb"),
            get("req"),
            get("proto"),
            get("code"),
            get("size"),
            self.field("ref").unwrap_or(""),
            self.field("ua").unwrap_or("")
        )
    }
}
