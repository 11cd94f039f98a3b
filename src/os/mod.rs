//! RTOS primitive layer.
//!
//! The minimal set of primitives an asynchronous dispatcher needs to run its
//! own worker: binary semaphores, tasks and a delay. Exactly one backend is
//! bound per [`LogHook`](crate::LogHook); it is handed to the dispatcher in
//! [`Dispatcher::init`](crate::Dispatcher::init).
//!
//! # Handles
//!
//! [`SemaphoreHandle`] and [`TaskHandle`] are plain values. The null handle
//! means "absent or failed": destructive operations on it do nothing,
//! acquisition on it fails. A handle is only meaningful to the backend that
//! created it; mixing backends is the caller's bug and is not detected.

use std::sync::Arc;

use crate::error::BridgeError;

pub use crate::config::WAIT_FOREVER;

#[cfg(target_os = "espidf")]
pub mod freertos;
pub mod soft;

/// Opaque binary-semaphore handle. `SemaphoreHandle::NULL` is "none".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SemaphoreHandle(usize);

/// Opaque task handle. `TaskHandle::NULL` is "none".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle(usize);

macro_rules! raw_handle {
    ($name:ident) => {
        impl $name {
            pub const NULL: Self = Self(0);

            /// Wrap a backend-specific raw value. Zero is the null handle.
            pub const fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> usize {
                self.0
            }

            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::NULL
            }
        }
    };
}

raw_handle!(SemaphoreHandle);
raw_handle!(TaskHandle);

/// Task entry point. Runs once on the new task.
pub type TaskEntry = Box<dyn FnOnce() + Send + 'static>;

/// Task creation parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    pub name: String,
    /// Stack size in bytes.
    pub stack_size: u32,
    pub priority: u32,
    /// Core to pin to, or -1 for no affinity.
    pub core: i32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            name: "log_dispatch".into(),
            stack_size: 4096,
            priority: 5,
            core: -1,
        }
    }
}

impl TaskConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn stack_size(mut self, bytes: u32) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn pinned_to(mut self, core: i32) -> Self {
        self.core = core;
        self
    }

    /// Core affinity, `None` when the task may run anywhere.
    pub fn affinity(&self) -> Option<u32> {
        u32::try_from(self.core).ok()
    }
}

/// RTOS primitives.
///
/// Every operation is constant-time or a bounded wait, and none allocates
/// beyond creating the primitive itself.
pub trait AsyncBackend: Send + Sync {
    /// Create a binary semaphore, initially empty. Null on failure.
    fn create_semaphore(&self) -> SemaphoreHandle;

    /// Destroy a semaphore. No-op on null.
    fn destroy_semaphore(&self, sem: SemaphoreHandle);

    /// Signal a semaphore without blocking. No-op on null.
    fn signal(&self, sem: SemaphoreHandle);

    /// Wait up to `timeout_ms` ([`WAIT_FOREVER`] for no limit).
    ///
    /// Returns whether the semaphore was acquired; always `false` on null.
    fn wait(&self, sem: SemaphoreHandle, timeout_ms: u32) -> bool;

    /// Start a task running `entry`. Null on failure.
    ///
    /// A task whose entry returns is cleaned up by the backend; only call
    /// [`delete_task`](Self::delete_task) on a task that is still running.
    fn create_task(&self, config: &TaskConfig, entry: TaskEntry) -> TaskHandle;

    /// Delete a task. No-op on null.
    fn delete_task(&self, task: TaskHandle);

    /// Block the calling task for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
}

/// A semaphore that destroys itself on drop.
pub struct Semaphore {
    backend: Arc<dyn AsyncBackend>,
    handle: SemaphoreHandle,
}

impl Semaphore {
    pub fn new(backend: Arc<dyn AsyncBackend>) -> Result<Self, BridgeError> {
        let handle = backend.create_semaphore();
        if handle.is_null() {
            return Err(BridgeError::SemaphoreUnavailable);
        }
        Ok(Self { backend, handle })
    }

    #[inline]
    pub fn signal(&self) {
        self.backend.signal(self.handle);
    }

    #[inline]
    pub fn wait(&self, timeout_ms: u32) -> bool {
        self.backend.wait(self.handle, timeout_ms)
    }

    pub fn handle(&self) -> SemaphoreHandle {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.backend.destroy_semaphore(self.handle);
    }
}

impl core::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "os::Semaphore({:#x})", self.handle.as_raw())
    }
}

/// Start a task, turning a null handle into an error.
pub fn spawn(
    backend: &dyn AsyncBackend,
    config: &TaskConfig,
    entry: impl FnOnce() + Send + 'static,
) -> Result<TaskHandle, BridgeError> {
    if config.name.contains('\0') {
        return Err(BridgeError::InvalidTaskName);
    }
    let task = backend.create_task(config, Box::new(entry));
    if task.is_null() {
        Err(BridgeError::TaskUnavailable)
    } else {
        Ok(task)
    }
}
