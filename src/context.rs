//! Per-task line reconstruction and reentrancy state.
//!
//! Platform log macros often emit one line through several output calls
//! (prefix, message, terminator). Fragments accumulate in a buffer owned by
//! the calling task, one per hook, until one ends with [`LINE_TERMINATOR`].
//! Each task only ever touches its own state, so nothing here is locked.
//!
//! Only a trailing terminator completes a line. A fragment with embedded
//! terminators is kept as one line.
//!
//! With the `single-core-guard` feature the reentrancy flag is a single
//! process-wide atomic instead of task-local, for targets whose task-local
//! storage cannot be relied on. That is only sound when one task logs at a
//! time; concurrent loggers would suppress each other.

use core::marker::PhantomData;
use std::cell::RefCell;

use crate::config::LINE_TERMINATOR;

const ESC: u8 = 0x1b;

thread_local! {
    // One partial line per hook that this task has written through.
    static LINES: RefCell<Vec<(u64, Vec<u8>)>> = const { RefCell::new(Vec::new()) };
}

/// Append a fragment to the calling task's buffer for hook `owner`.
///
/// Returns the buffered line, terminator included, once it is complete. The
/// buffer is released in that case.
pub fn append(owner: u64, fragment: &[u8]) -> Option<Vec<u8>> {
    LINES
        .try_with(|lines| {
            let mut lines = lines.try_borrow_mut().ok()?;
            let index = match lines.iter().position(|(id, _)| *id == owner) {
                Some(index) => index,
                None => {
                    lines.push((owner, Vec::new()));
                    lines.len() - 1
                }
            };
            let line = &mut lines[index].1;
            line.extend_from_slice(fragment);
            if line.last() == Some(&LINE_TERMINATOR) {
                Some(lines.swap_remove(index).1)
            } else {
                None
            }
        })
        .ok()
        .flatten()
}

/// Bytes buffered for `owner` on the calling task, waiting for a terminator.
#[cfg(test)]
pub(crate) fn pending(owner: u64) -> usize {
    LINES
        .try_with(|lines| {
            lines
                .try_borrow()
                .ok()
                .and_then(|lines| lines.iter().find(|(id, _)| *id == owner).map(|(_, line)| line.len()))
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

/// Drop the partial line buffered for `owner` on the calling task.
pub(crate) fn discard(owner: u64) {
    let _ = LINES.try_with(|lines| {
        if let Ok(mut lines) = lines.try_borrow_mut() {
            lines.retain(|(id, _)| *id != owner);
        }
    });
}

/// Turn a completed line into text: drop the terminator, strip escape
/// sequences, decode. `None` if nothing is left.
pub fn finish_line(mut line: Vec<u8>) -> Option<String> {
    if line.last() == Some(&LINE_TERMINATOR) {
        line.pop();
    }
    strip_escape_sequences(&mut line);
    if line.is_empty() {
        return None;
    }
    Some(match String::from_utf8(line) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

/// Remove every `ESC [ ... m` sequence in place.
///
/// An `ESC [` with no `m` after it is kept, along with the rest of the line.
pub fn strip_escape_sequences(line: &mut Vec<u8>) {
    let mut out = 0;
    let mut i = 0;
    while i < line.len() {
        if line[i] == ESC && line.get(i + 1) == Some(&b'[') {
            if let Some(end) = line[i + 2..].iter().position(|&b| b == b'm') {
                i += end + 3;
                continue;
            }
            line.copy_within(i.., out);
            out += line.len() - i;
            break;
        }
        line[out] = line[i];
        out += 1;
        i += 1;
    }
    line.truncate(out);
}

/// Marks the calling task as inside the hook. Cleared on drop, on every
/// exit path.
pub struct ReentrancyGuard {
    // Must be dropped on the task that entered.
    _task: PhantomData<*const ()>,
}

#[cfg(not(feature = "single-core-guard"))]
mod flag {
    use std::cell::Cell;

    thread_local! {
        static ACTIVE: Cell<bool> = const { Cell::new(false) };
    }

    pub fn try_set() -> bool {
        ACTIVE
            .try_with(|active| !active.replace(true))
            .unwrap_or(false)
    }

    pub fn clear() {
        let _ = ACTIVE.try_with(|active| active.set(false));
    }
}

#[cfg(feature = "single-core-guard")]
mod flag {
    use core::sync::atomic::{AtomicBool, Ordering};

    static ACTIVE: AtomicBool = AtomicBool::new(false);

    pub fn try_set() -> bool {
        ACTIVE
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn clear() {
        ACTIVE.store(false, Ordering::Release);
    }
}

impl ReentrancyGuard {
    /// `None` if the calling task is already inside the hook.
    pub fn enter() -> Option<Self> {
        flag::try_set().then_some(Self { _task: PhantomData })
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        flag::clear();
    }
}
