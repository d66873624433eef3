use glib_bridge::error::BridgeError;
use glib_bridge::ffi::probe;
use glib_bridge::object::Object;
use glib_bridge::signal::{Accumulator, SignalBuilder, SignalFlags, SignalId};
use glib_bridge::types::Type;

use super::common::{Counter, object_type, setup};

/// A type with `changed(int)`, `query(string) -> bool` and a detailed
/// `ping` signal.
fn emitter(prefix: &str) -> (Type, SignalId) {
    let t = object_type(prefix);
    let changed = SignalBuilder::new("changed")
        .param_types(&[Type::INT])
        .build(t)
        .unwrap();
    SignalBuilder::new("query")
        .param_types(&[Type::STRING])
        .return_type(Type::BOOL)
        .accumulator(Accumulator::true_handled())
        .build(t)
        .unwrap();
    SignalBuilder::new("ping")
        .flags(SignalFlags::RUN_LAST | SignalFlags::DETAILED)
        .build(t)
        .unwrap();
    (t, changed)
}

// ============================================================================
// Connecting
// ============================================================================

#[test]
fn test_handler_receives_instance_and_arguments() {
    setup();
    let (t, _) = emitter("SignalArgs");
    let obj = Object::new(t, &[]).unwrap();
    let expected = obj.as_ptr();
    let seen = Counter::new();
    let s = seen.clone();
    obj.connect("changed", move |this: Object, value: i32| {
        assert_eq!(this.as_ptr(), expected);
        s.add(value as usize);
    })
    .unwrap();

    obj.emit("changed", &[&5i32]).unwrap();
    obj.emit("changed", &[&6i32]).unwrap();
    assert_eq!(seen.get(), 11);
}

#[test]
fn test_handler_may_ignore_trailing_parameters() {
    setup();
    let (t, _) = emitter("SignalTrailing");
    let obj = Object::new(t, &[]).unwrap();
    let calls = Counter::new();
    let c = calls.clone();
    obj.connect("changed", move || c.hit()).unwrap();

    obj.emit("changed", &[&1i32]).unwrap();
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_handler_ids_are_per_instance() {
    setup();
    let (t, _) = emitter("SignalIds");
    let a = Object::new(t, &[]).unwrap();
    let b = Object::new(t, &[]).unwrap();
    let ha = a.connect("changed", || {}).unwrap();
    let hb = b.connect("changed", || {}).unwrap();
    assert_eq!(ha.as_raw(), hb.as_raw());
    assert!(a.is_connected(ha));
    assert!(b.is_connected(hb));
}

#[test]
fn test_unknown_signal_fails_to_connect() {
    setup();
    let (t, _) = emitter("SignalUnknown");
    let obj = Object::new(t, &[]).unwrap();
    assert!(matches!(
        obj.connect("does-not-exist", || {}),
        Err(BridgeError::EventNotFound { .. })
    ));
}

#[test]
fn test_disconnect_block_and_unblock() {
    setup();
    let (t, _) = emitter("SignalBlock");
    let obj = Object::new(t, &[]).unwrap();
    let calls = Counter::new();
    let c = calls.clone();
    let id = obj.connect("changed", move |_: Object, _: i32| c.hit()).unwrap();

    obj.block_signal(id).unwrap();
    obj.emit("changed", &[&1i32]).unwrap();
    assert_eq!(calls.get(), 0);

    obj.unblock_signal(id).unwrap();
    obj.emit("changed", &[&1i32]).unwrap();
    assert_eq!(calls.get(), 1);

    obj.disconnect(id).unwrap();
    assert!(!obj.is_connected(id));
    obj.emit("changed", &[&1i32]).unwrap();
    assert_eq!(calls.get(), 1);

    assert!(matches!(obj.disconnect(id), Err(BridgeError::HandlerNotFound { .. })));
}

#[test]
fn test_after_handlers_run_after_normal_handlers() {
    setup();
    let (t, _) = emitter("SignalAfter");
    let obj = Object::new(t, &[]).unwrap();
    let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

    let o = order.clone();
    obj.connect_after("changed", move |_: Object, _: i32| o.lock().unwrap().push("after"))
        .unwrap();
    let o = order.clone();
    obj.connect("changed", move |_: Object, _: i32| o.lock().unwrap().push("normal"))
        .unwrap();

    obj.emit("changed", &[&0i32]).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["normal", "after"]);
}

#[test]
fn test_detailed_handler_only_sees_its_detail() {
    setup();
    let (t, _) = emitter("SignalDetail");
    let obj = Object::new(t, &[]).unwrap();
    let any = Counter::new();
    let only_a = Counter::new();
    let c = any.clone();
    obj.connect("ping", move || c.hit()).unwrap();
    let c = only_a.clone();
    obj.connect("ping::a", move || c.hit()).unwrap();

    obj.emit("ping::a", &[]).unwrap();
    obj.emit("ping::b", &[]).unwrap();
    obj.emit("ping", &[]).unwrap();
    assert_eq!(any.get(), 3);
    assert_eq!(only_a.get(), 1);
}

// ============================================================================
// Emitting
// ============================================================================

#[test]
fn test_wrong_argument_count_makes_no_native_call() {
    setup();
    let (t, changed) = emitter("SignalCount");
    let obj = Object::new(t, &[]).unwrap();
    let before = probe::signal_emissions(changed.as_raw());

    assert!(matches!(
        obj.emit("changed", &[]),
        Err(BridgeError::ArgumentMismatch { .. })
    ));
    assert!(matches!(
        obj.emit("changed", &[&1i32, &2i32]),
        Err(BridgeError::ArgumentMismatch { .. })
    ));
    assert_eq!(probe::signal_emissions(changed.as_raw()), before);
}

#[test]
fn test_wrong_argument_type_makes_no_native_call() {
    setup();
    let (t, changed) = emitter("SignalTypes");
    let obj = Object::new(t, &[]).unwrap();
    let before = probe::signal_emissions(changed.as_raw());

    assert!(matches!(
        obj.emit("changed", &[&"five"]),
        Err(BridgeError::ArgumentMismatch { .. })
    ));
    assert!(matches!(
        obj.emit("changed", &[&5i64]),
        Err(BridgeError::ArgumentMismatch { .. })
    ));
    assert_eq!(probe::signal_emissions(changed.as_raw()), before);

    obj.emit("changed", &[&5i32]).unwrap();
    assert_eq!(probe::signal_emissions(changed.as_raw()), before + 1);
}

#[test]
fn test_last_handler_return_wins_without_accumulator() {
    setup();
    let t = object_type("SignalReturn");
    SignalBuilder::new("compute")
        .param_types(&[Type::INT])
        .return_type(Type::INT)
        .build(t)
        .unwrap();
    let obj = Object::new(t, &[]).unwrap();
    obj.connect("compute", |_: Object, x: i32| x + 1).unwrap();
    obj.connect("compute", |_: Object, x: i32| x * 10).unwrap();

    let ret = obj.emit("compute", &[&4i32]).unwrap().unwrap();
    assert_eq!(ret.get::<i32>().unwrap(), 40);
}

#[test]
fn test_true_handled_accumulator_short_circuits() {
    setup();
    let (t, _) = emitter("SignalAccu");
    let obj = Object::new(t, &[]).unwrap();
    let first = Counter::new();
    let second = Counter::new();
    let third = Counter::new();

    let c = first.clone();
    obj.connect("query", move |_: Object, _: String| {
        c.hit();
        false
    })
    .unwrap();
    let c = second.clone();
    obj.connect("query", move |_: Object, q: String| {
        c.hit();
        q == "stop"
    })
    .unwrap();
    let c = third.clone();
    obj.connect("query", move |_: Object, _: String| {
        c.hit();
        false
    })
    .unwrap();

    let handled = obj.emit("query", &[&"stop"]).unwrap().unwrap();
    assert!(handled.get::<bool>().unwrap());
    assert_eq!((first.get(), second.get(), third.get()), (1, 1, 0));

    let handled = obj.emit("query", &[&"go on"]).unwrap().unwrap();
    assert!(!handled.get::<bool>().unwrap());
    assert_eq!((first.get(), second.get(), third.get()), (2, 2, 1));
}

#[test]
fn test_custom_accumulator_sums_results() {
    setup();
    let t = object_type("SignalSum");
    SignalBuilder::new("vote")
        .return_type(Type::INT)
        .accumulator(Accumulator::new(|_, mut accu, handler_return| {
            let total = accu.get::<i32>().unwrap_or(0) + handler_return.get::<i32>().unwrap_or(0);
            accu.set(&total).is_ok()
        }))
        .build(t)
        .unwrap();
    let obj = Object::new(t, &[]).unwrap();
    for n in [1i32, 2, 3] {
        obj.connect("vote", move || n).unwrap();
    }

    let ret = obj.emit("vote", &[]).unwrap().unwrap();
    assert_eq!(ret.get::<i32>().unwrap(), 6);
}

#[test]
fn test_class_handler_runs_at_its_stage() {
    setup();
    let t = object_type("SignalClassHandler");
    let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let o = order.clone();
    SignalBuilder::new("step")
        .flags(SignalFlags::RUN_LAST)
        .class_handler(move || o.lock().unwrap().push("class"))
        .unwrap()
        .build(t)
        .unwrap();
    let obj = Object::new(t, &[]).unwrap();
    let o = order.clone();
    obj.connect("step", move || o.lock().unwrap().push("handler")).unwrap();
    let o = order.clone();
    obj.connect_after("step", move || o.lock().unwrap().push("after")).unwrap();

    obj.emit("step", &[]).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["handler", "class", "after"]);
}

#[test]
fn test_stop_emission_skips_remaining_handlers() {
    setup();
    let (t, _) = emitter("SignalStop");
    let obj = Object::new(t, &[]).unwrap();
    let later = Counter::new();
    obj.connect("changed", |this: Object, _: i32| {
        this.stop_emission_by_name("changed").unwrap();
    })
    .unwrap();
    let c = later.clone();
    obj.connect("changed", move |_: Object, _: i32| c.hit()).unwrap();

    obj.emit("changed", &[&1i32]).unwrap();
    assert_eq!(later.get(), 0);
}

#[test]
fn test_null_argument_is_accepted_for_object_parameter() {
    setup();
    let t = object_type("SignalNullObj");
    SignalBuilder::new("adopted")
        .param_types(&[Type::OBJECT])
        .build(t)
        .unwrap();
    let obj = Object::new(t, &[]).unwrap();
    let nulls = Counter::new();
    let c = nulls.clone();
    obj.connect("adopted", move |_: Object, other: Option<Object>| {
        if other.is_none() {
            c.hit();
        }
    })
    .unwrap();

    let none: Option<Object> = None;
    obj.emit("adopted", &[&none]).unwrap();
    assert_eq!(nulls.get(), 1);
}

#[test]
fn test_signal_lookup_reports_declaration() {
    setup();
    let (t, changed) = emitter("SignalLookup");
    assert_eq!(SignalId::lookup("changed", t), Some(changed));
    assert_eq!(changed.name().as_deref(), Some("changed"));
    assert_eq!(changed.param_types(), vec![Type::INT]);
    assert_eq!(changed.return_type(), Type::NONE);
}
