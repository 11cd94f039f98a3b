//! Simulated log output routine for host tests.
//!
//! Models `esp_log_set_vprintf` with a registration slot. Before the
//! bridge takes over, output goes to a "console" handler that collects
//! everything written, standing in for the UART the default ESP-IDF
//! routine prints to.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Platform, Registration};
use crate::hook::LogHook;

/// A non-bridge output routine.
pub type SimHandler = Arc<dyn Fn(&str) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `None` when a `Display` impl fails; the console prints nothing then.
fn render(args: fmt::Arguments<'_>) -> Option<String> {
    let mut text = String::new();
    fmt::write(&mut text, args).ok()?;
    Some(text)
}

pub struct SimPlatform {
    registered: Mutex<Option<SimHandler>>,
    redirected: AtomicBool,
    console: Arc<Mutex<String>>,
}

impl SimPlatform {
    /// Platform whose default routine writes to the capture console.
    pub fn new() -> Self {
        let console = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&console);
        let handler: SimHandler = Arc::new(move |text: &str| lock(&sink).push_str(text));
        Self {
            registered: Mutex::new(Some(handler)),
            redirected: AtomicBool::new(false),
            console,
        }
    }

    /// Platform with no routine registered at all.
    pub fn without_console() -> Self {
        Self {
            registered: Mutex::new(None),
            redirected: AtomicBool::new(false),
            console: Arc::new(Mutex::new(String::new())),
        }
    }

    /// True while the bridge is the registered routine.
    pub fn is_redirected(&self) -> bool {
        self.redirected.load(Ordering::Acquire)
    }

    /// Everything the console routine has printed.
    pub fn console_output(&self) -> String {
        lock(&self.console).clone()
    }

    /// Emit through whatever routine is registered, like the platform's
    /// log macro does.
    pub fn write(&self, bridge: &LogHook<Self>, args: fmt::Arguments<'_>) -> i32 {
        if self.is_redirected() {
            return bridge.intercept(&args);
        }
        let Some(text) = render(args) else {
            return 0;
        };
        if let Some(handler) = lock(&self.registered).clone() {
            handler(&text);
        }
        i32::try_from(text.len()).unwrap_or(i32::MAX)
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for SimPlatform {
    type Call<'a> = fmt::Arguments<'a>;
    type Handler = SimHandler;

    fn register(&self) -> Registration<SimHandler> {
        let previous = lock(&self.registered).take();
        self.redirected.store(true, Ordering::Release);
        Registration::new(previous)
    }

    fn restore(&self, registration: Registration<SimHandler>) {
        *lock(&self.registered) = registration.into_previous();
        self.redirected.store(false, Ordering::Release);
    }

    fn forward(&self, handler: &SimHandler, call: &fmt::Arguments<'_>) {
        if let Some(text) = render(*call) {
            handler(&text);
        }
    }
}
