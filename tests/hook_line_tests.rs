//! Hook path tests: line reconstruction, escape stripping, reentrancy

use core::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, SystemTime};

use idf_log_bridge::config::STACK_FORMAT_LEN;
use idf_log_bridge::os::soft::SoftBackend;
use idf_log_bridge::platform::sim::SimPlatform;
use idf_log_bridge::{AsyncBackend, Dispatcher, LogHook, LogLevel, LogRecord};

#[derive(Default)]
struct Recorder {
    records: Mutex<Vec<LogRecord>>,
}

impl Recorder {
    fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    fn payloads(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.payload).collect()
    }
}

impl Dispatcher for Recorder {
    fn init(&self, _backend: Arc<dyn AsyncBackend>) {}

    fn dispatch(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
    }

    fn shutdown(&self) {}
}

fn installed_hook() -> (Arc<Recorder>, LogHook<SimPlatform>) {
    let recorder = Arc::new(Recorder::default());
    let hook = LogHook::new(SimPlatform::new(), Arc::new(SoftBackend::new()), recorder.clone());
    hook.install(false);
    (recorder, hook)
}

#[test]
fn test_fragments_make_one_record() {
    let (recorder, hook) = installed_hook();

    hook.intercept(&format_args!("partial"));
    assert!(recorder.records().is_empty());
    hook.intercept(&format_args!("rest\n"));

    assert_eq!(recorder.payloads(), vec!["partialrest"]);
}

#[test]
fn test_platform_style_fragments() {
    let (recorder, hook) = installed_hook();

    hook.intercept(&format_args!("\x1b[0;32mI ({}) {}: ", 1234, "wifi"));
    hook.intercept(&format_args!("connected to {}", "ap-1"));
    hook.intercept(&format_args!("\x1b[0m\n"));

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, LogLevel::Info);
    assert_eq!(records[0].tag, "wifi");
    assert_eq!(records[0].payload, "connected to ap-1");
    assert_eq!(records[0].timestamp, SystemTime::UNIX_EPOCH + Duration::from_millis(1234));
}

#[test]
fn test_escape_sequences_are_stripped() {
    let (recorder, hook) = installed_hook();

    hook.intercept(&format_args!("E (99) drv: failed\x1b[0m\n"));

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, LogLevel::Error);
    assert_eq!(records[0].tag, "drv");
    assert_eq!(records[0].payload, "failed");
    assert!(!records[0].payload.contains('\x1b'));
}

#[test]
fn test_blank_lines_are_not_dispatched() {
    let (recorder, hook) = installed_hook();

    hook.intercept(&format_args!("\n"));
    hook.intercept(&format_args!("\x1b[0m\n"));
    hook.intercept(&format_args!("after\n"));

    assert_eq!(recorder.payloads(), vec!["after"]);
}

#[test]
fn test_embedded_newlines_stay_in_one_record() {
    let (recorder, hook) = installed_hook();

    hook.intercept(&format_args!("I (1) a: one\ntwo\n"));

    assert_eq!(recorder.payloads(), vec!["one\ntwo"]);
}

#[test]
fn test_returns_formatted_length() {
    let (_recorder, hook) = installed_hook();

    assert_eq!(hook.intercept(&format_args!("abc")), 3);
    assert_eq!(hook.intercept(&format_args!("{}\n", 12345)), 6);
}

#[test]
fn test_oversized_fragment_matches_direct_format() {
    let (recorder, hook) = installed_hook();
    let body: String = (0..STACK_FORMAT_LEN * 3)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect();

    let written = hook.intercept(&format_args!("I (7) big: {}|{}\n", body, 42));

    let expected = format!("I (7) big: {}|{}\n", body, 42);
    assert_eq!(written as usize, expected.len());
    assert_eq!(recorder.payloads(), vec![format!("{}|{}", body, 42)]);
}

#[test]
fn test_fragment_at_threshold() {
    let (recorder, hook) = installed_hook();
    let body = "x".repeat(STACK_FORMAT_LEN - 1);

    assert_eq!(hook.intercept(&format_args!("{}", body)) as usize, STACK_FORMAT_LEN - 1);
    assert_eq!(hook.intercept(&format_args!("\n")), 1);

    assert_eq!(recorder.payloads(), vec![body]);
}

struct Broken;

impl fmt::Display for Broken {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        Err(fmt::Error)
    }
}

#[test]
fn test_format_failure_is_dropped() {
    let (recorder, hook) = installed_hook();

    assert_eq!(hook.intercept(&format_args!("bad {}\n", Broken)), 0);
    assert!(recorder.records().is_empty());

    hook.intercept(&format_args!("good\n"));
    assert_eq!(recorder.payloads(), vec!["good"]);
}

/// Logs from inside `dispatch`, the way a sink that itself uses the
/// platform log macro would.
#[derive(Default)]
struct Echo {
    hook: OnceLock<Weak<LogHook<SimPlatform>>>,
    records: Mutex<Vec<LogRecord>>,
    nested: Mutex<Vec<i32>>,
}

impl Dispatcher for Echo {
    fn init(&self, _backend: Arc<dyn AsyncBackend>) {}

    fn dispatch(&self, record: LogRecord) {
        self.records.lock().unwrap().push(record);
        if let Some(hook) = self.hook.get().and_then(Weak::upgrade) {
            let result = hook.platform().write(&hook, format_args!("I (2) sink: echo\n"));
            self.nested.lock().unwrap().push(result);
        }
    }

    fn shutdown(&self) {}
}

#[test]
fn test_nested_logging_is_suppressed() {
    let echo = Arc::new(Echo::default());
    let hook = Arc::new(LogHook::new(
        SimPlatform::new(),
        Arc::new(SoftBackend::new()),
        echo.clone(),
    ));
    echo.hook.set(Arc::downgrade(&hook)).unwrap();
    hook.install(true);

    hook.platform().write(&hook, format_args!("I (1) app: first\n"));

    let records = echo.records.lock().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload, "first");
    assert_eq!(*echo.nested.lock().unwrap(), vec![0]);
    // Passthrough happens before the guard, so the console saw both.
    assert_eq!(
        hook.platform().console_output(),
        "I (1) app: first\nI (2) sink: echo\n"
    );

    // The guard was released: the next call is processed normally.
    hook.platform().write(&hook, format_args!("I (3) app: second\n"));
    assert_eq!(echo.records.lock().unwrap().len(), 2);
}

#[test]
fn test_contexts_do_not_mix() {
    let (recorder, hook) = installed_hook();
    let hook = Arc::new(hook);

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let hook = Arc::clone(&hook);
            thread::spawn(move || {
                for j in 0..50 {
                    hook.intercept(&format_args!("I ({}) t{}: ", j, t));
                    hook.intercept(&format_args!("line {}", j));
                    hook.intercept(&format_args!(" end\n"));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let records = recorder.records();
    assert_eq!(records.len(), 200);
    for t in 0..4 {
        let tag = format!("t{}", t);
        let lines: Vec<_> = records.iter().filter(|r| r.tag == tag).collect();
        assert_eq!(lines.len(), 50);
        // Per-context order is preserved.
        for (j, record) in lines.iter().enumerate() {
            assert_eq!(record.payload, format!("line {} end", j));
        }
    }
}

#[test]
fn test_partial_line_is_private_to_its_context() {
    let (recorder, hook) = installed_hook();
    let hook = Arc::new(hook);

    hook.intercept(&format_args!("I (1) main: begun"));

    let other = {
        let hook = Arc::clone(&hook);
        thread::spawn(move || {
            hook.intercept(&format_args!("I (2) other: whole\n"));
        })
    };
    other.join().unwrap();

    hook.intercept(&format_args!(" and finished\n"));

    assert_eq!(recorder.payloads(), vec!["whole", "begun and finished"]);
}

#[test]
fn test_uninstall_during_logging() {
    let (_recorder, hook) = installed_hook();
    let hook = Arc::new(hook);

    let logger = {
        let hook = Arc::clone(&hook);
        thread::spawn(move || {
            for j in 0..500 {
                hook.platform().write(&hook, format_args!("I ({}) race: {}\n", j, j));
            }
        })
    };
    for _ in 0..50 {
        hook.uninstall();
        hook.install(true);
    }
    logger.join().unwrap();

    assert!(hook.is_installed());
}

#[test]
fn test_format_failure_with_passthrough() {
    let recorder = Arc::new(Recorder::default());
    let hook = LogHook::new(SimPlatform::new(), Arc::new(SoftBackend::new()), recorder.clone());
    hook.install(true);

    assert_eq!(hook.intercept(&format_args!("bad {}\n", Broken)), 0);
    assert!(recorder.records().is_empty());
    assert_eq!(hook.platform().console_output(), "");

    hook.platform().write(&hook, format_args!("I (1) a: good\n"));
    assert_eq!(recorder.payloads(), vec!["good"]);
    assert_eq!(hook.platform().console_output(), "I (1) a: good\n");
}

#[test]
fn test_format_failure_before_install() {
    let (_recorder, hook) = installed_hook();
    hook.uninstall();

    assert_eq!(hook.platform().write(&hook, format_args!("bad {}\n", Broken)), 0);
    assert_eq!(hook.platform().console_output(), "");
}

#[test]
fn test_partial_line_stays_with_its_hook() {
    let (first, hook_a) = installed_hook();
    hook_a.intercept(&format_args!("I (1) a: stale "));
    drop(hook_a);

    let (second, hook_b) = installed_hook();
    hook_b.intercept(&format_args!("I (2) b: fresh\n"));

    assert!(first.records().is_empty());
    let records = second.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].tag, "b");
    assert_eq!(records[0].payload, "fresh");
}

#[test]
fn test_live_hooks_keep_separate_lines() {
    let (first, hook_a) = installed_hook();
    let (second, hook_b) = installed_hook();

    hook_a.intercept(&format_args!("I (1) a: one "));
    hook_b.intercept(&format_args!("I (2) b: two "));
    hook_a.intercept(&format_args!("done\n"));
    hook_b.intercept(&format_args!("done\n"));

    assert_eq!(first.payloads(), vec!["one done"]);
    assert_eq!(second.payloads(), vec!["two done"]);
}

#[test]
fn test_uninstall_drops_partial_line() {
    let (recorder, hook) = installed_hook();
    hook.intercept(&format_args!("I (1) a: cut "));
    hook.uninstall();
    hook.install(false);

    hook.intercept(&format_args!("I (2) a: whole\n"));

    assert_eq!(recorder.payloads(), vec!["whole"]);
}
