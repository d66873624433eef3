use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glib_bridge::closure::Closure;
use glib_bridge::error::BridgeError;
use glib_bridge::ffi::{self, probe};
use glib_bridge::object::{
    Object, with_pointer_transfer_full, with_pointer_transfer_none, with_pointer_transfer_original,
};
use glib_bridge::param_spec::{ParamFlags, ParamSpec};
use glib_bridge::subclass::ObjectClass;
use glib_bridge::types::Type;
use glib_bridge::value::EnumValue;

use super::common::{object_type, setup, unowned_type};

// ============================================================================
// Adoption
// ============================================================================

#[test]
fn test_adopt_sinks_floating_reference() {
    setup();
    let ptr = ffi::g_object_new(unowned_type("OwnFloating").into_glib());
    assert!(ffi::g_object_is_floating(ptr));
    assert_eq!(ffi::g_object_ref_count(ptr), 1);

    let obj = Object::adopt(ptr).unwrap();
    assert!(!obj.is_floating());
    assert_eq!(obj.ref_count(), 1);
    assert_eq!(probe::instance(ptr).sinks, 1);
    assert_eq!(probe::instance(ptr).refs, 0);

    drop(obj);
    let after = probe::instance(ptr);
    assert_eq!(after.unrefs, 1);
    assert!(after.freed);
}

#[test]
fn test_adopt_refs_owned_object() {
    setup();
    let ptr = ffi::g_object_new(object_type("OwnNormal").into_glib());
    let obj = Object::adopt(ptr).unwrap();
    assert_eq!(obj.ref_count(), 2);

    drop(obj);
    assert_eq!(ffi::g_object_ref_count(ptr), 1);
    assert!(!probe::instance(ptr).freed);

    ffi::g_object_unref(ptr);
    assert!(probe::instance(ptr).freed);
}

#[test]
fn test_adopt_transfer_full_takes_no_reference() {
    setup();
    let ptr = ffi::g_object_new(object_type("OwnFull").into_glib());
    let obj = Object::adopt_transfer_full(ptr).unwrap();
    assert_eq!(obj.ref_count(), 1);
    assert_eq!(probe::instance(ptr).refs, 0);

    drop(obj);
    let after = probe::instance(ptr);
    assert_eq!(after.unrefs, 1);
    assert!(after.freed);
}

#[test]
fn test_adopt_rejects_null_and_dead_pointers() {
    setup();
    assert!(matches!(
        Object::adopt(ffi::GObjectPtr::NULL),
        Err(BridgeError::NullPointer)
    ));

    let ptr = ffi::g_object_new(object_type("OwnDead").into_glib());
    ffi::g_object_unref(ptr);
    assert!(matches!(Object::adopt(ptr), Err(BridgeError::InvalidInstance)));
}

#[test]
fn test_release_happens_exactly_once() {
    setup();
    let ptr = ffi::g_object_new(unowned_type("OwnOnce").into_glib());
    let freed = Arc::new(AtomicBool::new(false));
    let f = freed.clone();
    probe::on_instance_free(ptr, move || {
        assert!(!f.swap(true, Ordering::SeqCst), "instance freed twice");
    });

    let obj = Object::adopt(ptr).unwrap();
    let copy = obj.clone();
    drop(obj);
    assert!(!freed.load(Ordering::SeqCst));
    drop(copy);
    assert!(freed.load(Ordering::SeqCst));
    assert_eq!(probe::instance(ptr).unrefs, 2);
}

#[test]
fn test_new_sinks_initially_unowned_instances() {
    setup();
    let obj = Object::new(unowned_type("OwnNew"), &[]).unwrap();
    assert!(!obj.is_floating());
    assert_eq!(obj.ref_count(), 1);
}

// ============================================================================
// Scoped ownership
// ============================================================================

#[test]
fn test_original_ownership_restores_floating_state() {
    setup();
    let ptr = ffi::g_object_new(unowned_type("OwnOriginal").into_glib());

    let seen = with_pointer_transfer_original(ptr, |obj| {
        assert!(!obj.is_floating());
        obj.ref_count()
    })
    .unwrap();
    assert_eq!(seen, 1);
    assert!(ffi::g_object_is_floating(ptr));
    assert_eq!(ffi::g_object_ref_count(ptr), 1);

    ffi::g_object_ref_sink(ptr);
    ffi::g_object_unref(ptr);
    assert!(probe::instance(ptr).freed);
}

#[test]
fn test_original_ownership_holds_extra_reference_on_owned_object() {
    setup();
    let obj = Object::new(object_type("OwnOriginalOwned"), &[]).unwrap();
    let inside = obj.with_original_ownership(|| obj.ref_count());
    assert_eq!(inside, 2);
    assert_eq!(obj.ref_count(), 1);
}

#[test]
fn test_nested_original_ownership_is_flat() {
    setup();
    let obj = Object::new(object_type("OwnNested"), &[]).unwrap();
    let inner = obj.with_original_ownership(|| obj.with_original_ownership(|| obj.ref_count()));
    assert_eq!(inner, 2);
    assert_eq!(obj.ref_count(), 1);
}

#[test]
fn test_original_ownership_is_restored_when_body_panics() {
    setup();
    let ptr = ffi::g_object_new(unowned_type("OwnOriginalPanic").into_glib());

    let unwound = std::panic::catch_unwind(|| {
        with_pointer_transfer_original(ptr, |_| -> () { panic!("body failed") })
    });
    assert!(unwound.is_err());
    assert!(ffi::g_object_is_floating(ptr));
    assert_eq!(ffi::g_object_ref_count(ptr), 1);

    // The scope ended, so the next call takes its own reference again.
    let inside = with_pointer_transfer_original(ptr, |obj| {
        with_pointer_transfer_original(ptr, |_| ()).unwrap();
        (obj.is_floating(), obj.ref_count())
    })
    .unwrap();
    assert_eq!(inside, (false, 1));
    assert!(ffi::g_object_is_floating(ptr));

    ffi::g_object_ref_sink(ptr);
    ffi::g_object_unref(ptr);
    assert!(probe::instance(ptr).freed);
}

#[test]
fn test_pointer_transfer_none_and_full() {
    setup();
    let ptr = ffi::g_object_new(object_type("OwnScoped").into_glib());

    let during = with_pointer_transfer_none(ptr, |obj| obj.ref_count()).unwrap();
    assert_eq!(during, 2);
    assert_eq!(ffi::g_object_ref_count(ptr), 1);

    with_pointer_transfer_full(ptr, |obj| assert_eq!(obj.ref_count(), 1)).unwrap();
    assert!(probe::instance(ptr).freed);
}

// ============================================================================
// Properties on plain objects
// ============================================================================

#[test]
fn test_missing_property_is_reported() {
    setup();
    let obj = Object::new(object_type("OwnProps"), &[]).unwrap();
    assert!(matches!(
        obj.property("nope"),
        Err(BridgeError::PropertyNotFound { .. })
    ));
    assert!(matches!(
        obj.set_property("nope", &1i32),
        Err(BridgeError::PropertyNotFound { .. })
    ));
    assert!(matches!(
        Object::new(object_type("OwnCtorProps"), &[("nope", &1i32)]),
        Err(BridgeError::PropertyNotFound { .. })
    ));
}

// ============================================================================
// Failed conversions
// ============================================================================

#[test]
fn test_failed_invoke_releases_converted_arguments() {
    setup();
    let obj = Object::new(object_type("OwnInvokeFail"), &[]).unwrap();
    let closure = Closure::new(|_: Object, _: i32| ()).unwrap();
    let not_an_enum = EnumValue {
        type_: Type::INT,
        value: 1,
    };

    assert!(closure.invoke(&[&obj, &not_an_enum]).is_err());
    assert_eq!(obj.ref_count(), 1);
}

#[test]
fn test_failed_construction_releases_converted_properties() {
    setup();
    let t = object_type("OwnCtorFail");
    let pspec = ParamSpec::object("target", "", "", Type::OBJECT, ParamFlags::READWRITE).unwrap();
    ObjectClass::of(t).unwrap().install_property(1, &pspec).unwrap();
    let obj = Object::new(object_type("OwnCtorTarget"), &[]).unwrap();

    let result = Object::new(t, &[("target", &obj), ("missing", &1i32)]);
    assert!(matches!(result, Err(BridgeError::PropertyNotFound { .. })));
    assert_eq!(obj.ref_count(), 1);
}
