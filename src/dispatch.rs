//! Dispatcher contract.
//!
//! The dispatcher fans records out to sinks and lives outside this crate.
//! The hook only drives its lifecycle:
//!
//! ```text
//! install:   bind backend ──▶ init(backend) ──▶ redirect platform output
//! hook path: dispatch(record) (any task, must not block on sink I/O)
//! uninstall: restore platform output ──▶ shutdown()
//! ```
//!
//! `dispatch` may still be called once after `shutdown` has begun by a hook
//! call that was already in flight on another task. Implementations must
//! tolerate that (dropping the record is fine).

use std::sync::Arc;

use crate::os::AsyncBackend;
use crate::record::LogRecord;

pub trait Dispatcher: Send + Sync {
    /// Called during install, after the backend is bound and before any
    /// `dispatch`. Must be quick: it runs under the installation lock.
    fn init(&self, backend: Arc<dyn AsyncBackend>);

    /// Hand over one record. Non-blocking or bounded latency.
    fn dispatch(&self, record: LogRecord);

    /// Stop accepting records. Runs under the installation lock.
    fn shutdown(&self);
}
