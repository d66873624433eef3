use std::thread;
use std::time::Duration;

use glib_bridge::error::BridgeError;
use glib_bridge::main_loop::{MainContext, idle_add, idle_add_with_data, source_remove, timeout_add};

use super::common::{Counter, setup};

/// Iterate the shared context until `done` holds or the budget runs out.
/// Other tests attach sources to the same context, so the return value of
/// each iteration says nothing about ours.
fn spin_until(done: impl Fn() -> bool) {
    let context = MainContext;
    for _ in 0..200 {
        if done() {
            return;
        }
        context.iteration(false);
        thread::sleep(Duration::from_millis(1));
    }
}

fn spin(iterations: usize) {
    for _ in 0..iterations {
        MainContext.iteration(false);
    }
}

#[test]
fn test_idle_callback_without_return_runs_once() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    let id = idle_add(move || c.hit()).unwrap();

    spin_until(|| calls.get() >= 1);
    spin(5);
    assert_eq!(calls.get(), 1);
    assert!(matches!(source_remove(id), Err(BridgeError::HandlerNotFound { .. })));
}

#[test]
fn test_idle_callback_returning_true_stays_attached() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    idle_add(move || {
        c.hit();
        c.get() < 3
    })
    .unwrap();

    spin_until(|| calls.get() >= 3);
    spin(5);
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_idle_with_data_passes_bound_value() {
    setup();
    let seen = Counter::new();
    let s = seen.clone();
    idle_add_with_data(
        move |data: String| {
            assert_eq!(data, "payload");
            s.hit();
        },
        "payload".to_string(),
    )
    .unwrap();

    spin_until(|| seen.get() >= 1);
    assert_eq!(seen.get(), 1);
}

#[test]
fn test_removed_source_never_runs() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    let id = idle_add(move || c.hit()).unwrap();
    source_remove(id).unwrap();

    spin(5);
    assert_eq!(calls.get(), 0);
    assert!(matches!(source_remove(id), Err(BridgeError::HandlerNotFound { .. })));
}

#[test]
fn test_timeout_fires_after_interval() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    let id = timeout_add(20, move || c.hit()).unwrap();
    assert_ne!(id.as_raw(), 0);

    spin_until(|| calls.get() >= 1);
    assert_eq!(calls.get(), 1);
    spin(5);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_repeating_timeout_can_be_removed() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    let id = timeout_add(1, move || {
        c.hit();
        true
    })
    .unwrap();

    spin_until(|| calls.get() >= 2);
    assert!(calls.get() >= 2);
    source_remove(id).unwrap();
    let settled = calls.get();
    spin(5);
    assert_eq!(calls.get(), settled);
}

#[test]
fn test_panicking_source_is_removed() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    let id = idle_add(move || -> bool {
        c.hit();
        panic!("source exploded");
    })
    .unwrap();

    spin_until(|| calls.get() >= 1);
    spin(5);
    assert_eq!(calls.get(), 1);
    assert!(source_remove(id).is_err());
}
