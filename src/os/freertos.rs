//! FreeRTOS backend (ESP-IDF).
//!
//! Binary semaphores are FreeRTOS queues of length one with zero-sized
//! items, which is what `xSemaphoreCreateBinary()` expands to. The
//! semaphore macros are not visible through bindgen, so the queue calls
//! and their constants are used directly.

use core::ffi::c_void;
use core::ptr;
use std::ffi::CString;

use esp_idf_svc::sys;

use super::{AsyncBackend, SemaphoreHandle, TaskConfig, TaskEntry, TaskHandle, WAIT_FOREVER};

// Values of the FreeRTOS macros bindgen cannot capture.
const QUEUE_TYPE_BINARY_SEMAPHORE: u8 = 3;
const SEMAPHORE_QUEUE_LENGTH: sys::UBaseType_t = 1;
const SEMAPHORE_QUEUE_ITEM_LENGTH: sys::UBaseType_t = 0;
const QUEUE_SEND_TO_BACK: sys::BaseType_t = 0;
const PD_TRUE: sys::BaseType_t = 1;
const PD_PASS: sys::BaseType_t = 1;
const NO_AFFINITY: sys::BaseType_t = 0x7FFF_FFFF;
const PORT_MAX_DELAY: sys::TickType_t = sys::TickType_t::MAX;

/// `pdMS_TO_TICKS`.
#[inline]
fn ms_to_ticks(ms: u32) -> sys::TickType_t {
    let ticks = u64::from(ms) * u64::from(sys::configTICK_RATE_HZ) / 1000;
    sys::TickType_t::try_from(ticks).unwrap_or(PORT_MAX_DELAY)
}

#[inline]
fn queue(sem: SemaphoreHandle) -> sys::QueueHandle_t {
    sem.as_raw() as sys::QueueHandle_t
}

/// [`AsyncBackend`] on the ESP-IDF FreeRTOS kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeRtosBackend;

impl FreeRtosBackend {
    pub const fn new() -> Self {
        Self
    }
}

impl AsyncBackend for FreeRtosBackend {
    fn create_semaphore(&self) -> SemaphoreHandle {
        // SAFETY: plain kernel allocation; null on failure.
        let handle = unsafe {
            sys::xQueueGenericCreate(
                SEMAPHORE_QUEUE_LENGTH,
                SEMAPHORE_QUEUE_ITEM_LENGTH,
                QUEUE_TYPE_BINARY_SEMAPHORE,
            )
        };
        SemaphoreHandle::from_raw(handle as usize)
    }

    fn destroy_semaphore(&self, sem: SemaphoreHandle) {
        if !sem.is_null() {
            // SAFETY: non-null handle created by create_semaphore.
            unsafe { sys::vQueueDelete(queue(sem)) }
        }
    }

    fn signal(&self, sem: SemaphoreHandle) {
        if !sem.is_null() {
            // SAFETY: zero-sized item, never blocks (timeout 0).
            unsafe {
                sys::xQueueGenericSend(queue(sem), ptr::null(), 0, QUEUE_SEND_TO_BACK);
            }
        }
    }

    fn wait(&self, sem: SemaphoreHandle, timeout_ms: u32) -> bool {
        if sem.is_null() {
            return false;
        }
        let ticks = if timeout_ms == WAIT_FOREVER {
            PORT_MAX_DELAY
        } else {
            ms_to_ticks(timeout_ms)
        };
        // SAFETY: non-null handle created by create_semaphore.
        unsafe { sys::xQueueSemaphoreTake(queue(sem), ticks) == PD_TRUE }
    }

    fn create_task(&self, config: &TaskConfig, entry: TaskEntry) -> TaskHandle {
        let Ok(name) = CString::new(config.name.as_str()) else {
            return TaskHandle::NULL;
        };
        let core = config
            .affinity()
            .and_then(|core| sys::BaseType_t::try_from(core).ok())
            .unwrap_or(NO_AFFINITY);

        let data = Box::into_raw(Box::new(trampoline::TaskData { entry }));
        let mut handle: sys::TaskHandle_t = ptr::null_mut();

        // SAFETY: FreeRTOS copies the name into the TCB; `data` is owned by
        // the new task from here on, or reclaimed below on failure.
        let result = unsafe {
            sys::xTaskCreatePinnedToCore(
                Some(trampoline::run),
                name.as_ptr(),
                config.stack_size,
                data as *mut c_void,
                config.priority,
                &mut handle,
                core,
            )
        };

        if result == PD_PASS && !handle.is_null() {
            TaskHandle::from_raw(handle as usize)
        } else {
            // SAFETY: the task was never created, so `data` is still ours.
            drop(unsafe { Box::from_raw(data) });
            TaskHandle::NULL
        }
    }

    fn delete_task(&self, task: TaskHandle) {
        if !task.is_null() {
            // SAFETY: non-null handle of a running task.
            unsafe { sys::vTaskDelete(task.as_raw() as sys::TaskHandle_t) }
        }
    }

    fn delay_ms(&self, ms: u32) {
        // SAFETY: always safe from task context.
        unsafe { sys::vTaskDelay(ms_to_ticks(ms)) }
    }
}

/// Closure entry. Double-boxed so the task argument is a thin pointer.
mod trampoline {
    use core::ffi::c_void;
    use core::ptr;

    use esp_idf_svc::sys;

    use crate::os::TaskEntry;

    pub struct TaskData {
        pub entry: TaskEntry,
    }

    pub unsafe extern "C" fn run(arg: *mut c_void) {
        let data: Box<TaskData> = unsafe { Box::from_raw(arg as *mut TaskData) };
        let TaskData { entry } = *data;
        entry();
        // FreeRTOS tasks must not return.
        unsafe { sys::vTaskDelete(ptr::null_mut()) }
    }
}
