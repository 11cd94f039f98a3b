//! Structured log records.

use core::fmt;
use std::time::SystemTime;

/// Log level, as encoded by the leading letter of an ESP-IDF log line.
///
/// Ordered by severity: `Error > Warning > Info > Debug > Verbose`, so a
/// filter reads `record.level >= min`. The discriminants follow ESP-IDF's
/// numbering, where the most severe level is the smallest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    #[default]
    Info = 2,
    Debug = 3,
    Verbose = 4,
}

impl LogLevel {
    /// Map an ESP-IDF level letter (`E W I D V`).
    pub fn from_letter(letter: u8) -> Option<Self> {
        match letter {
            b'E' => Some(LogLevel::Error),
            b'W' => Some(LogLevel::Warning),
            b'I' => Some(LogLevel::Info),
            b'D' => Some(LogLevel::Debug),
            b'V' => Some(LogLevel::Verbose),
            _ => None,
        }
    }

    /// The ESP-IDF level letter.
    pub fn letter(self) -> char {
        match self {
            LogLevel::Error => 'E',
            LogLevel::Warning => 'W',
            LogLevel::Info => 'I',
            LogLevel::Debug => 'D',
            LogLevel::Verbose => 'V',
        }
    }

    /// Convert to string for output.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Verbose => "VERBOSE",
        }
    }

    /// True if `self` is at least as severe as `other`.
    #[inline]
    pub fn is_at_least(self, other: LogLevel) -> bool {
        self >= other
    }

    #[inline]
    fn severity(self) -> u8 {
        LogLevel::Verbose as u8 - self as u8
    }
}

impl Ord for LogLevel {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl PartialOrd for LogLevel {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed log line, parsed.
///
/// Produced once per line and handed to the dispatcher, which owns it from
/// then on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// When the line was logged. See [`TimestampBase`](crate::TimestampBase)
    /// for how the platform's millisecond field is interpreted.
    pub timestamp: SystemTime,
    pub level: LogLevel,
    /// Component tag, empty when the line carried none.
    pub tag: String,
    pub payload: String,
}

impl LogRecord {
    pub fn new(
        timestamp: SystemTime,
        level: LogLevel,
        tag: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            tag: tag.into(),
            payload: payload.into(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}: {}", self.level, self.payload)
        } else {
            write!(f, "{} {}: {}", self.level, self.tag, self.payload)
        }
    }
}
