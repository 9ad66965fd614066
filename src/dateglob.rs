//! Date-aware globbing over log archives laid out like
//! `/logs/SERVER/YYYY/MM/DD/access.log*`.
//!
//! A pattern is split on `/` and matched one path component at a time.
//! Within a component these tokens are recognised:
//!
//! - `*` matches any run of characters
//! - `SERVER` matches one of the configured server names
//! - `YYYY`, `MM` (01-12) and `DD` (01-31) match digits and record the date
//!   part they stand for
//!
//! Date parts picked up in different components must agree, so
//! `YYYY/MM/access-YYYYMMDD.log` only matches files whose name repeats the
//! directory's year and month.

use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Any,
    Server,
    Year,
    Month,
    Day,
}

/// Date parts collected while matching a path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateParts {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

fn merge_part<T: PartialEq + Copy>(current: Option<T>, other: Option<T>) -> Option<Option<T>> {
    match (current, other) {
        (Some(a), Some(b)) if a != b => None,
        (Some(a), _) => Some(Some(a)),
        (None, b) => Some(b),
    }
}

impl DateParts {
    /// Combine with parts found elsewhere in the path; `None` on a conflict
    pub fn refine(self, other: DateParts) -> Option<DateParts> {
        Some(DateParts {
            year: merge_part(self.year, other.year)?,
            month: merge_part(self.month, other.month)?,
            day: merge_part(self.day, other.day)?,
        })
    }

    fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }

    /// The complete date, if all three parts were seen and form a real day
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day?)
    }

    /// Directory pruning: only a complete date can rule a subtree out,
    /// since later components may still add the missing parts.
    fn may_contain(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        match self.date() {
            Some(_) => self.within(start, end),
            None => true,
        }
    }

    /// Whether a path carrying these parts lies within `start..=end`.
    /// Paths without any date parts always pass; partial or impossible
    /// dates fail as soon as a bound is given.
    fn within(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        if self.is_empty() || (start.is_none() && end.is_none()) {
            return true;
        }
        let Some(date) = self.date() else {
            return false;
        };
        start.map_or(true, |s| date >= s) && end.map_or(true, |e| date <= e)
    }
}

/// Split one path component into tokens; `None` if it is a plain literal
fn split_component(component: &str) -> Option<Vec<Token>> {
    const MARKERS: [(&str, Token); 5] = [
        ("*", Token::Any),
        ("SERVER", Token::Server),
        ("YYYY", Token::Year),
        ("MM", Token::Month),
        ("DD", Token::Day),
    ];

    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = component;
    let mut found = false;

    'scan: while !rest.is_empty() {
        for (marker, token) in &MARKERS {
            if let Some(after) = rest.strip_prefix(marker) {
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(token.clone());
                found = true;
                rest = after;
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            literal.push(c);
        }
        rest = chars.as_str();
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }

    found.then_some(tokens)
}

fn digits(s: &str, width: usize) -> Option<(u32, &str)> {
    let head = s.get(..width)?;
    if !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((head.parse().ok()?, &s[width..]))
}

/// Match `name` against `tokens`, backtracking over `*` and server names
fn match_tokens(tokens: &[Token], name: &str, servers: &[String]) -> Option<DateParts> {
    let Some((token, rest_tokens)) = tokens.split_first() else {
        return name.is_empty().then(DateParts::default);
    };

    match token {
        Token::Literal(text) => {
            let rest = name.strip_prefix(text.as_str())?;
            match_tokens(rest_tokens, rest, servers)
        }
        Token::Any => name
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(name.len()))
            .find_map(|i| match_tokens(rest_tokens, &name[i..], servers)),
        Token::Server => servers.iter().find_map(|server| {
            let rest = name.strip_prefix(server.as_str())?;
            match_tokens(rest_tokens, rest, servers)
        }),
        Token::Year => {
            let (year, rest) = digits(name, 4)?;
            let parts = match_tokens(rest_tokens, rest, servers)?;
            parts.refine(DateParts {
                year: Some(year as i32),
                ..Default::default()
            })
        }
        Token::Month => {
            let (month, rest) = digits(name, 2)?;
            if !(1..=12).contains(&month) {
                return None;
            }
            let parts = match_tokens(rest_tokens, rest, servers)?;
            parts.refine(DateParts {
                month: Some(month),
                ..Default::default()
            })
        }
        Token::Day => {
            let (day, rest) = digits(name, 2)?;
            if !(1..=31).contains(&day) {
                return None;
            }
            let parts = match_tokens(rest_tokens, rest, servers)?;
            parts.refine(DateParts {
                day: Some(day),
                ..Default::default()
            })
        }
    }
}

/// Match a single path component; plain literals must match exactly
pub fn component_match(pattern: &str, name: &str, servers: &[String]) -> Option<DateParts> {
    match split_component(pattern) {
        Some(tokens) => match_tokens(&tokens, name, servers),
        None => (pattern == name).then(DateParts::default),
    }
}

struct Search<'a> {
    servers: &'a [String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    found: Vec<PathBuf>,
}

impl Search<'_> {
    fn walk(&mut self, dir: &Path, parts: &[&str], seen: DateParts) -> io::Result<()> {
        let Some((part, rest)) = parts.split_first() else {
            return Ok(());
        };

        let Some(tokens) = split_component(part) else {
            let path = dir.join(part);
            if rest.is_empty() {
                if path.exists() && seen.within(self.start, self.end) {
                    self.found.push(path);
                }
            } else if path.is_dir() {
                self.walk(&path, rest, seen)?;
            }
            return Ok(());
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(parts_here) = match_tokens(&tokens, name, self.servers) else {
                continue;
            };
            let Some(combined) = seen.refine(parts_here) else {
                continue;
            };
            let path = entry.path();
            if rest.is_empty() {
                if combined.within(self.start, self.end) {
                    self.found.push(path);
                }
            } else if combined.may_contain(self.start, self.end) && path.is_dir() {
                self.walk(&path, rest, combined)?;
            }
        }
        Ok(())
    }
}

/// Find the files matching `pattern`, keeping only dated paths between
/// `start` and `end` (both inclusive) when bounds are given. A pattern
/// without any wildcard names one file and yields nothing once a bound is
/// set, as its date is unknown. Results are sorted.
pub fn candidate_logs(
    pattern: &str,
    servers: &[String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> io::Result<Vec<PathBuf>> {
    let (root, relative) = match pattern.strip_prefix('/') {
        Some(rest) => (PathBuf::from("/"), rest),
        None => (PathBuf::from("."), pattern),
    };
    let parts: Vec<&str> = relative.split('/').filter(|p| !p.is_empty()).collect();

    let has_wildcard = parts.iter().any(|p| split_component(p).is_some());
    if !has_wildcard && (start.is_some() || end.is_some()) {
        return Ok(Vec::new());
    }

    let mut search = Search {
        servers,
        start,
        end,
        found: Vec::new(),
    };
    search.walk(&root, &parts, DateParts::default())?;
    search.found.sort();
    Ok(search.found)
}
