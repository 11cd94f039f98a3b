//! Log hook: redirects the platform's log output routine into the dispatcher.
//!
//! # Hook path
//!
//! ```text
//! platform call ──▶ passthrough (copy of args) ──▶ reentrancy guard
//!               ──▶ format (stack, heap if too long) ──▶ task line buffer
//!               ──▶ on '\n': strip escapes ──▶ parse ──▶ dispatch
//! ```
//!
//! The hook path runs on whichever task logs, never takes the installation
//! lock and never reports an error to the caller: a call that cannot be
//! processed returns 0.
//!
//! # Installation
//!
//! `install` and `uninstall` are idempotent and serialized by one lock. The
//! critical section only swaps the registration and runs the dispatcher's
//! lifecycle hooks. [`LogHook::is_installed`] is a lock-free read.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::config::{HookConfig, STACK_FORMAT_LEN};
use crate::context::{self, ReentrancyGuard};
use crate::dispatch::Dispatcher;
use crate::error::BridgeError;
use crate::os::AsyncBackend;
use crate::parser::LineParser;
use crate::platform::{Fragment, Platform, Registration};

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Installation state and hook path for one platform output routine.
///
/// One instance per process in firmware; tests build as many as they like.
/// Partial lines are buffered per task and per hook, so instances never see
/// each other's fragments.
pub struct LogHook<P: Platform> {
    id: u64,
    platform: P,
    backend: Arc<dyn AsyncBackend>,
    dispatcher: Arc<dyn Dispatcher>,
    parser: LineParser,
    installed: AtomicBool,
    passthrough: AtomicBool,
    install_lock: Mutex<()>,
    registration: RwLock<Option<Registration<P::Handler>>>,
}

impl<P: Platform> LogHook<P> {
    pub fn new(platform: P, backend: Arc<dyn AsyncBackend>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self::with_config(platform, backend, dispatcher, HookConfig::default())
    }

    pub fn with_config(
        platform: P,
        backend: Arc<dyn AsyncBackend>,
        dispatcher: Arc<dyn Dispatcher>,
        config: HookConfig,
    ) -> Self {
        Self {
            id: NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed),
            platform,
            backend,
            dispatcher,
            parser: LineParser::new(config.timestamps),
            installed: AtomicBool::new(false),
            passthrough: AtomicBool::new(false),
            install_lock: Mutex::new(()),
            registration: RwLock::new(None),
        }
    }

    /// Take over the platform's log output.
    ///
    /// Binds the backend, initializes the dispatcher with it, then redirects
    /// the platform routine. With `passthrough`, every call is also replayed
    /// to the routine that was registered before. No-op if already installed;
    /// the passthrough flag is not changed in that case.
    pub fn install(&self, passthrough: bool) {
        let installed_now = {
            let _lock = self.install_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if self.installed.load(Ordering::Acquire) {
                false
            } else {
                self.dispatcher.init(Arc::clone(&self.backend));
                self.passthrough.store(passthrough, Ordering::Release);
                {
                    let mut registration =
                        self.registration.write().unwrap_or_else(PoisonError::into_inner);
                    *registration = Some(self.platform.register());
                }
                self.installed.store(true, Ordering::Release);
                true
            }
        };

        if installed_now {
            log::debug!("log hook installed (passthrough: {})", passthrough);
        } else {
            log::debug!("log hook already installed");
        }
    }

    /// Give the platform its previous output routine back and shut the
    /// dispatcher down. No-op if not installed.
    ///
    /// A partial line the calling task had buffered is dropped. Partial lines
    /// left on other tasks stay with this hook and are never delivered to
    /// another one.
    pub fn uninstall(&self) {
        let removed = {
            let _lock = self.install_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.installed.load(Ordering::Acquire) {
                false
            } else {
                {
                    let mut registration =
                        self.registration.write().unwrap_or_else(PoisonError::into_inner);
                    if let Some(registration) = registration.take() {
                        self.platform.restore(registration);
                    }
                }
                self.dispatcher.shutdown();
                self.passthrough.store(false, Ordering::Release);
                self.installed.store(false, Ordering::Release);
                context::discard(self.id);
                true
            }
        };

        if removed {
            log::debug!("log hook removed");
        } else {
            log::debug!("log hook not installed");
        }
    }

    /// Lock-free; safe to call concurrently with install/uninstall.
    #[inline]
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    /// The backend handed to the dispatcher on install.
    pub fn backend(&self) -> &Arc<dyn AsyncBackend> {
        &self.backend
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// True while installed with passthrough to the previous routine.
    pub fn is_passthrough(&self) -> bool {
        self.passthrough.load(Ordering::Acquire)
    }

    /// The redirected output routine.
    ///
    /// Returns the formatted length of `call`, whatever was buffered or
    /// dispatched, or 0 if the call could not be processed.
    pub fn intercept(&self, call: &P::Call<'_>) -> i32 {
        if self.passthrough.load(Ordering::Acquire) {
            // Snapshot, so a concurrent uninstall can't pull it from under us.
            if let Some(previous) = self.previous_handler() {
                self.platform.forward(&previous, call);
            }
        }

        let Some(_guard) = ReentrancyGuard::enter() else {
            return 0;
        };

        let mut stack = [0u8; STACK_FORMAT_LEN];
        let (measured, fragment) = match format_fragment(call, &mut stack) {
            Ok(formatted) => formatted,
            Err(_) => return 0,
        };

        if let Some(line) = context::append(self.id, &fragment) {
            self.flush(line);
        }

        measured
    }

    fn previous_handler(&self) -> Option<P::Handler> {
        self.registration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|registration| registration.previous().cloned())
    }

    fn flush(&self, line: Vec<u8>) {
        if let Some(text) = context::finish_line(line) {
            self.dispatcher.dispatch(self.parser.parse(&text));
        }
    }
}

impl<P: Platform> Drop for LogHook<P> {
    fn drop(&mut self) {
        self.uninstall();
        context::discard(self.id);
    }
}

/// Format into `stack`, or into an exactly sized heap buffer when the
/// output doesn't fit. Returns the measured length and the output bytes.
fn format_fragment<'b, F: Fragment + ?Sized>(
    call: &F,
    stack: &'b mut [u8],
) -> Result<(i32, Cow<'b, [u8]>), BridgeError> {
    let measured = call.format_into(stack);
    let len = usize::try_from(measured).map_err(|_| BridgeError::Format)?;
    if len < stack.len() {
        return Ok((measured, Cow::Borrowed(&stack[..len])));
    }

    // Room for the NUL a C formatter appends.
    let mut heap = vec![0u8; len + 1];
    if call.format_into(&mut heap) < 0 {
        return Err(BridgeError::Format);
    }
    heap.truncate(len);
    Ok((measured, Cow::Owned(heap)))
}
