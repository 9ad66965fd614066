use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{find_stamp, stamp_part};
use crate::error::ParseError;

// Combined Log Format, with an optional X-Forwarded-For chain glued to the client IP
// Example: 10.0.0.1, 192.168.0.7 - - [24/Apr/2010:10:00:00 +0100] "GET / HTTP/1.1" 200 512 "-" "curl/7.19"
const COMBINED_PATTERN: &str = concat!(
    r#"^(?P<ip>[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}|[0-9A-Fa-f]*:[0-9A-Fa-f:.]*|-|unknown)"#,
    r#"(?P<x_forwarded_for>(?:, ?[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3})*)"#,
    r#" - "#,
    r#"(?P<username>\w+|-) "#,
    r#"\[(?P<stamp>[0-9]{2}/[A-Za-z]{3}/[0-9]{4}:[0-9]{2}:[0-9]{2}:[0-9]{2} [+-][0-9]{4})\] "#,
    r#""(?P<verb>[A-Z]+) (?P<req>.*?) (?P<proto>HTTP/[0-9](?:\.[0-9])?)" "#,
    r#"(?P<code>[0-9]{3}) "#,
    r#"(?P<size>[0-9]+|-) "#,
    r#""(?P<ref>.*?)" "#,
    r#""(?P<ua>.*)""#,
);

// Same as above with a trailing cookie field. The user agent may itself contain
// quotes, so a line without the cookie can only be told apart by trying this first.
const APACHE_PATTERN: &str = concat!(
    r#"^(?P<ip>[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}|[0-9A-Fa-f]*:[0-9A-Fa-f:.]*|-|unknown)"#,
    r#"(?P<x_forwarded_for>(?:, ?[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3})*)"#,
    r#" - "#,
    r#"(?P<username>\w+|-) "#,
    r#"\[(?P<stamp>[0-9]{2}/[A-Za-z]{3}/[0-9]{4}:[0-9]{2}:[0-9]{2}:[0-9]{2} [+-][0-9]{4})\] "#,
    r#""(?P<verb>[A-Z]+) (?P<req>.*?) (?P<proto>HTTP/[0-9](?:\.[0-9])?)" "#,
    r#"(?P<code>[0-9]{3}) "#,
    r#"(?P<size>[0-9]+|-) "#,
    r#""(?P<ref>.*?)" "#,
    r#""(?P<ua>.*)""#,
    r#" "(?P<cookie>.*\*|-)""#,
);

static COMBINED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(COMBINED_PATTERN).expect("failed to compile combined log regex"));
static APACHE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(APACHE_PATTERN).expect("failed to compile apache log regex"));

/// Request fields of a line that matched the full combined pattern
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedFields {
    pub ip: String,
    /// `, a.b.c.d` chain following the client address; empty when absent
    pub x_forwarded_for: String,
    pub username: String,
    pub verb: String,
    pub req: String,
    pub proto: String,
    pub code: String,
    pub size: String,
    pub referrer: String,
    pub user_agent: String,
}

fn group<'a>(caps: &Captures<'a>, name: &str) -> &'a str {
    caps.name(name).map_or("", |m| m.as_str())
}

impl CombinedFields {
    fn from_captures(caps: &Captures<'_>) -> Self {
        Self {
            ip: group(caps, "ip").to_string(),
            x_forwarded_for: group(caps, "x_forwarded_for").to_string(),
            username: group(caps, "username").to_string(),
            verb: group(caps, "verb").to_string(),
            req: group(caps, "req").to_string(),
            proto: group(caps, "proto").to_string(),
            code: group(caps, "code").to_string(),
            size: group(caps, "size").to_string(),
            referrer: group(caps, "ref").to_string(),
            user_agent: group(caps, "ua").to_string(),
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "ip" => &self.ip,
            "x_forwarded_for" => &self.x_forwarded_for,
            "username" => &self.username,
            "verb" => &self.verb,
            "req" => &self.req,
            "proto" => &self.proto,
            "code" => &self.code,
            "size" => &self.size,
            "ref" => &self.referrer,
            "ua" => &self.user_agent,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// A line in NCSA combined log format.
///
/// Only the bracketed stamp is required. Lines the full pattern cannot
/// split (a `"-" 408` request, odd client addresses) keep `fields` empty
/// and are written back out verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedLine {
    pub line: String,
    pub stamp: String,
    pub timestamp: DateTime<FixedOffset>,
    pub fields: Option<CombinedFields>,
}

impl CombinedLine {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        Self::with_fields("combined", line, COMBINED_REGEX.captures(line).as_ref())
    }

    fn with_fields(
        dialect: &'static str,
        line: &str,
        caps: Option<&Captures<'_>>,
    ) -> Result<Self, ParseError> {
        let (stamp, timestamp) = find_stamp(dialect, line)?;
        Ok(Self {
            line: line.to_string(),
            stamp,
            timestamp,
            fields: caps.map(CombinedFields::from_captures),
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match self.fields.as_ref().and_then(|fields| fields.get(name)) {
            Some(value) => (!value.is_empty()).then_some(value),
            None => stamp_part(&self.stamp, name),
        }
    }

    pub fn as_combined_line(&self) -> String {
        let Some(f) = &self.fields else {
            return self.line.clone();
        };
        format!(
            r#"{}{} - {} [{}] "{} {} {}" {} {} "{}" "{}""#,
            f.ip,
            f.x_forwarded_for,
            f.username,
            self.stamp,
            f.verb,
            f.req,
            f.proto,
            f.code,
            f.size,
            f.referrer,
            f.user_agent
        )
    }
}

/// Combined log line that may carry a trailing cookie field
#[derive(Debug, Clone, PartialEq)]
pub struct ApacheLine {
    pub combined: CombinedLine,
    pub cookie: Option<String>,
}

impl ApacheLine {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        if let Some(caps) = APACHE_REGEX.captures(line) {
            return Ok(Self {
                combined: CombinedLine::with_fields("apache", line, Some(&caps))?,
                cookie: Some(group(&caps, "cookie").to_string()),
            });
        }
        Ok(Self {
            combined: CombinedLine::with_fields("apache", line, COMBINED_REGEX.captures(line).as_ref())?,
            cookie: None,
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "cookie" => self.cookie.as_deref(),
            _ => self.combined.field(name),
        }
    }
}
