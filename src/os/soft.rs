//! Software backend on std threads.
//!
//! Same contract as the FreeRTOS backend, for host tests and simulation.
//! Handles are ids into per-backend tables, so a handle from another
//! backend instance is simply unknown (and treated like null).
//!
//! Deleting a soft task only detaches it: std threads cannot be killed, so
//! the entry must return on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use super::{AsyncBackend, SemaphoreHandle, TaskConfig, TaskEntry, TaskHandle, WAIT_FOREVER};

/// Host threads need more stack than an RTOS task config usually asks for.
const MIN_THREAD_STACK: usize = 64 * 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SoftSemaphore {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl SoftSemaphore {
    fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn give(&self) {
        *lock(&self.signaled) = true;
        self.cond.notify_one();
    }

    fn take(&self, timeout_ms: u32) -> bool {
        let guard = lock(&self.signaled);
        let mut guard = if timeout_ms == WAIT_FOREVER {
            self.cond
                .wait_while(guard, |signaled| !*signaled)
                .unwrap_or_else(PoisonError::into_inner)
        } else {
            let timeout = Duration::from_millis(u64::from(timeout_ms));
            self.cond
                .wait_timeout_while(guard, timeout, |signaled| !*signaled)
                .unwrap_or_else(PoisonError::into_inner)
                .0
        };
        core::mem::replace(&mut *guard, false)
    }
}

#[derive(Default)]
struct Tables {
    semaphores: Mutex<HashMap<usize, Arc<SoftSemaphore>>>,
    tasks: Mutex<HashMap<usize, String>>,
}

/// [`AsyncBackend`] built from `Mutex`/`Condvar` and `std::thread`.
pub struct SoftBackend {
    next_id: AtomicUsize,
    tables: Arc<Tables>,
}

impl SoftBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            tables: Arc::new(Tables::default()),
        }
    }

    fn allocate_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn semaphore(&self, sem: SemaphoreHandle) -> Option<Arc<SoftSemaphore>> {
        if sem.is_null() {
            return None;
        }
        lock(&self.tables.semaphores).get(&sem.as_raw()).cloned()
    }

    /// Semaphores created and not yet destroyed.
    pub fn live_semaphores(&self) -> usize {
        lock(&self.tables.semaphores).len()
    }

    /// Tasks whose entry has not returned and that were not deleted.
    pub fn live_tasks(&self) -> usize {
        lock(&self.tables.tasks).len()
    }
}

impl Default for SoftBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncBackend for SoftBackend {
    fn create_semaphore(&self) -> SemaphoreHandle {
        let id = self.allocate_id();
        lock(&self.tables.semaphores).insert(id, Arc::new(SoftSemaphore::new()));
        SemaphoreHandle::from_raw(id)
    }

    fn destroy_semaphore(&self, sem: SemaphoreHandle) {
        if !sem.is_null() {
            lock(&self.tables.semaphores).remove(&sem.as_raw());
        }
    }

    fn signal(&self, sem: SemaphoreHandle) {
        if let Some(sem) = self.semaphore(sem) {
            sem.give();
        }
    }

    fn wait(&self, sem: SemaphoreHandle, timeout_ms: u32) -> bool {
        match self.semaphore(sem) {
            Some(sem) => sem.take(timeout_ms),
            None => false,
        }
    }

    fn create_task(&self, config: &TaskConfig, entry: TaskEntry) -> TaskHandle {
        let id = self.allocate_id();
        lock(&self.tables.tasks).insert(id, config.name.clone());

        let tables = Arc::clone(&self.tables);
        let spawned = thread::Builder::new()
            .name(config.name.clone())
            .stack_size((config.stack_size as usize).max(MIN_THREAD_STACK))
            .spawn(move || {
                entry();
                lock(&tables.tasks).remove(&id);
            });

        match spawned {
            Ok(_) => TaskHandle::from_raw(id),
            Err(_) => {
                lock(&self.tables.tasks).remove(&id);
                TaskHandle::NULL
            }
        }
    }

    fn delete_task(&self, task: TaskHandle) {
        if !task.is_null() {
            lock(&self.tables.tasks).remove(&task.as_raw());
        }
    }

    fn delay_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
