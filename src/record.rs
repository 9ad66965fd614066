use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::cmp::Ordering;
use std::fmt;

/// Field access shared by every log dialect
pub trait LogFields {
    /// Value of a named field, or `None` if the dialect has no such field
    /// or the line left it empty
    fn field(&self, name: &str) -> Option<&str>;

    /// Original text of the line, without the trailing newline
    fn as_line(&self) -> &str;
}

impl LogFields for String {
    fn field(&self, _name: &str) -> Option<&str> {
        None
    }

    fn as_line(&self) -> &str {
        self
    }
}

/// One parsed log line.
///
/// Records compare by `(timestamp, sequence)` only; the payload never takes
/// part in ordering. `sequence` is the 1-based position of the raw line in
/// its source, counting lines that failed to parse.
#[derive(Debug, Clone)]
pub struct Record<P = crate::dialect::LogLine> {
    timestamp: DateTime<Utc>,
    sequence: u64,
    payload: P,
}

impl<P> Record<P> {
    pub fn new(timestamp: DateTime<Utc>, sequence: u64, payload: P) -> Self {
        Self {
            timestamp,
            sequence,
            payload,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Seconds since the Unix epoch, keeping sub-second precision
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp.timestamp() as f64
            + f64::from(self.timestamp.timestamp_subsec_nanos()) / 1_000_000_000.0
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.sequence)
    }

    /// Calendar date of the record in UTC
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> Record<Q> {
        Record {
            timestamp: self.timestamp,
            sequence: self.sequence,
            payload: f(self.payload),
        }
    }
}

impl<P: LogFields> Record<P> {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.payload.field(name)
    }
}

impl<P: LogFields> fmt::Display for Record<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.payload.as_line())
    }
}

impl<P> PartialEq for Record<P> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<P> Eq for Record<P> {}

impl<P> PartialOrd for Record<P> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<P> Ord for Record<P> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Build a UTC instant from whole epoch seconds; handy for synthetic records
pub fn epoch_seconds(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
