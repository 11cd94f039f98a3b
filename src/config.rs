//! Module: config
//!
//! Purpose: Build-time constants and construction-time settings.
//!
//! Hook installation itself only takes the passthrough flag; everything
//! else is fixed when the [`LogHook`](crate::LogHook) is built.

use std::time::{Duration, SystemTime};

/// Stack buffer used for the first formatting pass.
///
/// Fragments whose formatted length reaches this size are formatted a
/// second time into a heap buffer. That allocation is the only one on the
/// hook path besides line accumulation; realtime-sensitive callers should
/// keep single log fragments below it.
pub const STACK_FORMAT_LEN: usize = 256;

/// Byte that completes a log line.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Timeout value meaning "block until acquired".
pub const WAIT_FOREVER: u32 = u32::MAX;

/// How the millisecond field of a platform log line maps to wall-clock time.
///
/// The platform prints milliseconds since boot. Without a captured boot
/// epoch that number has no true wall-clock meaning, so the default keeps
/// the historical reading (an offset from the Unix epoch) and callers that
/// know the boot time can anchor it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimestampBase {
    /// Milliseconds are an offset from `UNIX_EPOCH`.
    #[default]
    Unix,
    /// Milliseconds are an offset from the captured boot instant.
    Boot(SystemTime),
}

impl TimestampBase {
    /// Anchor a boot-relative timestamp on the current uptime.
    ///
    /// `uptime` is how long the system has been running right now.
    pub fn boot_from_uptime(now: SystemTime, uptime: Duration) -> Self {
        // Clamp explicitly: SystemTime happily goes below the epoch.
        let boot = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .ok()
            .and_then(|since| since.checked_sub(uptime))
            .map_or(SystemTime::UNIX_EPOCH, |offset| SystemTime::UNIX_EPOCH + offset);
        TimestampBase::Boot(boot)
    }

    /// The instant millisecond offsets are measured from.
    pub fn epoch(self) -> SystemTime {
        match self {
            TimestampBase::Unix => SystemTime::UNIX_EPOCH,
            TimestampBase::Boot(boot) => boot,
        }
    }
}

/// Settings fixed at hook construction.
#[derive(Clone, Copy, Debug, Default)]
pub struct HookConfig {
    pub timestamps: TimestampBase,
}

impl HookConfig {
    pub fn with_timestamps(mut self, timestamps: TimestampBase) -> Self {
        self.timestamps = timestamps;
        self
    }
}
