//! Bridge error types
//!
//! None of these ever reach code that logs through the platform macro: the
//! hook converts them into its integer return value.

/// Bridge error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    /// The formatter reported a negative length
    Format,
    /// The backend could not create a semaphore
    SemaphoreUnavailable,
    /// The backend could not create a task
    TaskUnavailable,
    /// Task name contains an interior NUL
    InvalidTaskName,
}

impl BridgeError {
    /// Get error message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Format => "formatting failed",
            Self::SemaphoreUnavailable => "semaphore creation failed",
            Self::TaskUnavailable => "task creation failed",
            Self::InvalidTaskName => "task name contains NUL",
        }
    }
}

impl core::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for BridgeError {}
