//! ESP-IDF log line parser
//!
//! Expected shape: `L (TIME) TAG: MESSAGE`, where `L` is one of `E W I D V`
//! and `TIME` is milliseconds since boot.
//!
//! Parsing never fails. Anything that doesn't look like a platform log line
//! becomes an `Info` record carrying the whole line as payload.
//!
//! The tag ends at the first `:` after the closing parenthesis. A tag
//! followed by `::` therefore splits at its first colon and the payload keeps
//! the second one: `"I (5) a::b: hi"` gives tag `"a"` and payload `":b: hi"`.

use std::time::{Duration, SystemTime};

use crate::config::TimestampBase;
use crate::record::{LogLevel, LogRecord};

/// Lines shorter than this cannot carry a level prefix and a body.
const MIN_STRUCTURED_LEN: usize = 5;

/// Borrowed fields of a structured line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fields<'a> {
    time: &'a str,
    tag: &'a str,
    payload: &'a str,
}

/// Stateless line parser, parameterized only by how timestamps are anchored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser {
    base: TimestampBase,
}

impl LineParser {
    pub const fn new(base: TimestampBase) -> Self {
        Self { base }
    }

    /// Parse a completed line (terminator and escape sequences already removed).
    pub fn parse(&self, raw: &str) -> LogRecord {
        self.parse_at(raw, SystemTime::now())
    }

    /// Parse with an explicit "now", used whenever the line has no usable timestamp.
    pub fn parse_at(&self, raw: &str, now: SystemTime) -> LogRecord {
        let Some(level) = level_prefix(raw) else {
            return LogRecord::new(now, LogLevel::Info, "", raw);
        };

        match split_fields(raw) {
            Some(fields) => LogRecord::new(
                self.timestamp(fields.time, now),
                level,
                fields.tag,
                fields.payload,
            ),
            None => LogRecord::new(now, level, "", raw),
        }
    }

    fn timestamp(&self, field: &str, now: SystemTime) -> SystemTime {
        if !field.bytes().all(|b| b.is_ascii_digit()) {
            return now;
        }
        field
            .parse::<u64>()
            .ok()
            .and_then(|ms| self.base.epoch().checked_add(Duration::from_millis(ms)))
            .unwrap_or(now)
    }
}

/// Parse with the default (Unix-anchored) timestamp base.
pub fn parse_line(raw: &str) -> LogRecord {
    LineParser::default().parse(raw)
}

/// Level from `"L "` at the start of a line long enough to be structured.
fn level_prefix(line: &str) -> Option<LogLevel> {
    match line.as_bytes() {
        [letter, b' ', ..] if line.len() >= MIN_STRUCTURED_LEN => LogLevel::from_letter(*letter),
        _ => None,
    }
}

/// Split `(TIME) TAG: MESSAGE`. `None` if a delimiter is missing or the
/// parentheses are empty.
fn split_fields(line: &str) -> Option<Fields<'_>> {
    let open = line.find('(')?;
    let close = open + 1 + line[open + 1..].find(')')?;
    if close == open + 1 {
        return None;
    }
    let colon = close + 1 + line[close + 1..].find(':')?;

    let tag = &line[close + 1..colon];
    let rest = &line[colon + 1..];

    Some(Fields {
        time: &line[open + 1..close],
        tag: tag.strip_prefix(' ').unwrap_or(tag),
        payload: rest.strip_prefix(' ').unwrap_or(rest),
    })
}
