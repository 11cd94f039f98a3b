//! ESP-IDF binding: `esp_log_set_vprintf`.
//!
//! ```text
//! ESP_LOGx() ──▶ esp_log_write ──▶ vprintf_hook ──▶ BRIDGE.intercept
//!                                       │
//!                                       └──▶ previous vprintf (passthrough)
//! ```
//!
//! The entry point is a plain `extern "C"` function, so it reaches the hook
//! through one process-wide cell set by [`bridge`].
//!
//! # va_list copies
//!
//! `vsnprintf` and the previous routine both consume the argument list they
//! are given. Every use therefore gets its own copy, the way `va_copy` makes
//! one: on Xtensa the list is a small struct passed by pointer and is copied
//! by value, on RISC-V it is a plain pointer.

use core::ffi::{c_char, c_int};
use std::sync::{Arc, OnceLock};

use esp_idf_svc::sys;

use super::{Fragment, Platform, Registration};
use crate::dispatch::Dispatcher;
use crate::hook::LogHook;
use crate::os::freertos::FreeRtosBackend;

#[cfg(target_arch = "xtensa")]
type RawVaList = *mut sys::__va_list_tag;
#[cfg(not(target_arch = "xtensa"))]
type RawVaList = sys::va_list;

/// A `vprintf`-like routine, as taken by `esp_log_set_vprintf`.
pub type VprintfFn = unsafe extern "C" fn(*const c_char, RawVaList) -> c_int;

static BRIDGE: OnceLock<LogHook<EspLog>> = OnceLock::new();

/// One `vprintf` call: format string plus its argument list.
pub struct VaCall {
    format: *const c_char,
    args: RawVaList,
}

impl VaCall {
    fn with_copy<R>(&self, f: impl FnOnce(RawVaList) -> R) -> R {
        #[cfg(target_arch = "xtensa")]
        {
            // SAFETY: `args` points at the caller's live va_list.
            let mut copy = unsafe { core::ptr::read(self.args) };
            f(&mut copy)
        }
        #[cfg(not(target_arch = "xtensa"))]
        {
            f(self.args)
        }
    }
}

impl Fragment for VaCall {
    fn format_into(&self, buf: &mut [u8]) -> i32 {
        self.with_copy(|args| {
            // SAFETY: `buf` bounds the write; format and args come from the
            // platform's own vprintf call.
            unsafe { sys::vsnprintf(buf.as_mut_ptr() as *mut c_char, buf.len() as _, self.format, args) }
        })
    }
}

/// The ESP-IDF log output routine.
#[derive(Debug, Default, Clone, Copy)]
pub struct EspLog;

impl Platform for EspLog {
    type Call<'a> = VaCall;
    type Handler = VprintfFn;

    fn register(&self) -> Registration<VprintfFn> {
        // SAFETY: swapping the routine is what esp_log_set_vprintf is for.
        let previous = unsafe { sys::esp_log_set_vprintf(Some(vprintf_hook)) };
        Registration::new(previous)
    }

    fn restore(&self, registration: Registration<VprintfFn>) {
        // SAFETY: puts back the routine esp_log_set_vprintf handed us.
        unsafe {
            sys::esp_log_set_vprintf(registration.into_previous());
        }
    }

    fn forward(&self, handler: &VprintfFn, call: &VaCall) {
        // SAFETY: the previous routine gets a private copy of the list.
        call.with_copy(|args| unsafe {
            handler(call.format, args);
        });
    }
}

unsafe extern "C" fn vprintf_hook(format: *const c_char, args: RawVaList) -> c_int {
    match BRIDGE.get() {
        Some(hook) => hook.intercept(&VaCall { format, args }),
        None => 0,
    }
}

/// The process-wide hook, created on first call with the FreeRTOS backend.
///
/// Later calls return the same hook; their `dispatcher` is ignored.
pub fn bridge(dispatcher: Arc<dyn Dispatcher>) -> &'static LogHook<EspLog> {
    BRIDGE.get_or_init(|| LogHook::new(EspLog, Arc::new(FreeRtosBackend::new()), dispatcher))
}

/// Create the process-wide hook if needed and install it.
pub fn install(dispatcher: Arc<dyn Dispatcher>, passthrough: bool) {
    bridge(dispatcher).install(passthrough);
}

/// Uninstall the process-wide hook. No-op if it was never created.
pub fn uninstall() {
    if let Some(hook) = BRIDGE.get() {
        hook.uninstall();
    }
}

pub fn is_installed() -> bool {
    BRIDGE.get().is_some_and(|hook| hook.is_installed())
}
