use glib_bridge::closure::Closure;
use glib_bridge::ffi::probe;
use glib_bridge::object::Object;
use glib_bridge::types::Type;
use glib_bridge::value::{AnyValue, Pointer};

use super::common::{Counter, object_type, setup};

// ============================================================================
// Arity policy
// ============================================================================

#[test]
fn test_missing_arguments_skip_the_call() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    let closure = Closure::new(move |_: i32, _: i32, _: i32| c.hit()).unwrap();

    let ret = closure.invoke(&[&1i32, &2i32]).unwrap();
    assert!(ret.is_none());
    assert_eq!(calls.get(), 0);
    assert_eq!(probe::closure(closure.as_ptr()).invocations, 1);
}

#[test]
fn test_bound_data_fills_the_last_slot() {
    setup();
    let seen = Counter::new();
    let s = seen.clone();
    let closure = Closure::with_data(
        move |a: i32, b: i32, data: String| {
            assert_eq!(data, "bound");
            s.add((a + b) as usize);
        },
        "bound".to_string(),
    )
    .unwrap();

    closure.invoke(&[&1i32, &2i32]).unwrap();
    assert_eq!(seen.get(), 3);
}

#[test]
fn test_bound_data_is_not_passed_when_slots_are_full() {
    setup();
    let seen = Counter::new();
    let s = seen.clone();
    let closure = Closure::with_data(move |a: i32| s.add(a as usize), 100i32).unwrap();

    closure.invoke(&[&5i32]).unwrap();
    assert_eq!(seen.get(), 5);
}

#[test]
fn test_extra_arguments_are_dropped() {
    setup();
    let seen = Counter::new();
    let s = seen.clone();
    let closure = Closure::new(move |a: i32| s.add(a as usize)).unwrap();

    closure.invoke(&[&4i32, &"ignored", &9u64]).unwrap();
    assert_eq!(seen.get(), 4);
}

#[test]
fn test_conversion_failure_skips_the_call() {
    setup();
    let calls = Counter::new();
    let c = calls.clone();
    let closure = Closure::new(move |_: i32| c.hit()).unwrap();

    closure.invoke(&[&"not a number"]).unwrap();
    assert_eq!(calls.get(), 0);
}

// ============================================================================
// Return values
// ============================================================================

#[test]
fn test_return_value_is_written_back() {
    setup();
    let closure = Closure::new(|a: i32, b: i32| a * b).unwrap();
    let ret = closure.invoke(&[&6i32, &7i32]).unwrap().unwrap();
    assert_eq!(ret.get::<i32>().unwrap(), 42);
}

#[test]
fn test_unconvertible_return_leaves_slot_empty() {
    setup();
    struct NotMarshalable;
    let calls = Counter::new();
    let c = calls.clone();
    let closure = Closure::new(move || {
        c.hit();
        NotMarshalable
    })
    .unwrap();

    let ret = closure.invoke(&[]).unwrap();
    assert_eq!(calls.get(), 1);
    assert!(ret.is_none());
}

#[test]
fn test_optional_return_is_written_back() {
    setup();
    let closure = Closure::new(|a: i32| (a > 0).then_some(a)).unwrap();

    let ret = closure.invoke(&[&3i32]).unwrap().unwrap();
    assert_eq!(ret.get::<i32>().unwrap(), 3);

    let ret = closure.invoke(&[&-3i32]).unwrap().unwrap();
    assert_eq!(ret.value_type(), Type::POINTER);
    assert_eq!(ret.get::<Pointer>().unwrap(), Pointer(0));
}

#[test]
fn test_panicking_callable_is_isolated() {
    setup();
    let closure = Closure::new(|_: i32| -> i32 { panic!("boom") }).unwrap();
    let ret = closure.invoke(&[&1i32]).unwrap();
    assert!(ret.is_none());

    // The closure stays usable.
    let ret = closure.invoke(&[&1i32]).unwrap();
    assert!(ret.is_none());
}

// ============================================================================
// Argument adaptation
// ============================================================================

#[test]
fn test_object_argument_reaches_object_parameter() {
    setup();
    let obj = Object::new(object_type("ClosureObjArg"), &[]).unwrap();
    let expected = obj.as_ptr();
    let seen = Counter::new();
    let s = seen.clone();
    let closure = Closure::new(move |o: Object| {
        assert_eq!(o.as_ptr(), expected);
        s.hit();
    })
    .unwrap();

    closure.invoke(&[&obj]).unwrap();
    assert_eq!(seen.get(), 1);
}

#[test]
fn test_null_object_reaches_option_parameter() {
    setup();
    let seen = Counter::new();
    let s = seen.clone();
    let closure = Closure::new(move |o: Option<Object>| {
        assert!(o.is_none());
        s.hit();
    })
    .unwrap();

    let none: Option<Object> = None;
    closure.invoke(&[&none]).unwrap();
    assert_eq!(seen.get(), 1);
}

#[test]
fn test_object_is_unwrapped_to_its_natural_value() {
    setup();
    let t = object_type("ClosureNatural");
    glib_bridge::value::marshal::register_marshaler(t, |_| Ok(Box::new("natural".to_string()))).unwrap();
    let obj = Object::new(t, &[]).unwrap();

    let seen = Counter::new();
    let s = seen.clone();
    let closure = Closure::new(move |name: String| {
        assert_eq!(name, "natural");
        s.hit();
    })
    .unwrap();

    closure.invoke(&[&obj]).unwrap();
    assert_eq!(seen.get(), 1);
}

#[test]
fn test_any_value_parameter_receives_raw_argument() {
    setup();
    let seen = Counter::new();
    let s = seen.clone();
    let closure = Closure::new(move |v: AnyValue| {
        if let Ok(p) = v.downcast::<Pointer>() {
            s.add(p.0);
        }
    })
    .unwrap();

    closure.invoke(&[&Pointer(17)]).unwrap();
    assert_eq!(seen.get(), 17);
}

// ============================================================================
// Lifetime
// ============================================================================

#[test]
fn test_clone_shares_one_native_closure() {
    setup();
    let closure = Closure::new(|| {}).unwrap();
    let ptr = closure.as_ptr();
    let copy = closure.clone();
    drop(closure);
    assert!(!probe::closure(ptr).finalized);
    drop(copy);
    assert!(probe::closure(ptr).finalized);
}
