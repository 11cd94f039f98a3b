//! # idf-log-bridge
//!
//! Structured capture of ESP-IDF `ESP_LOGx` output.
//!
//! ## Architecture
//!
//! ```text
//! ESP_LOGx()  ──▶ esp_log vprintf ──▶ LogHook::intercept ──▶ Dispatcher::dispatch
//!                  (redirected)        per-task line buffer     (external, async)
//!                                      LineParser
//! ```
//!
//! - [`hook::LogHook`] owns the installation state and the redirected entry point.
//! - [`parser::LineParser`] turns `"I (1234) wifi: connected"` into a [`LogRecord`].
//! - [`os::AsyncBackend`] is the RTOS primitive layer a dispatcher builds its worker on.
//! - [`platform::Platform`] is the seam over the native log output routine.
//!
//! Logging through the hook never fails visibly: malformed lines degrade to
//! best-effort records, formatting failures are dropped.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod hook;
pub mod os;
pub mod parser;
pub mod platform;
pub mod record;

pub use config::{HookConfig, TimestampBase};
pub use dispatch::Dispatcher;
pub use error::BridgeError;
pub use hook::LogHook;
pub use os::{AsyncBackend, SemaphoreHandle, TaskConfig, TaskHandle};
pub use parser::{parse_line, LineParser};
pub use platform::{Fragment, Platform, Registration};
pub use record::{LogLevel, LogRecord};
