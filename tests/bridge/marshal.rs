use std::any::Any;
use std::fmt::Debug;

use glib_bridge::boxed::ArbitraryValue;
use glib_bridge::error::BridgeError;
use glib_bridge::ffi;
use glib_bridge::object::Object;
use glib_bridge::types::Type;
use glib_bridge::value::marshal::{self, AnyValue};
use glib_bridge::value::{Pointer, ToValue, Value, Variant};

use super::common::{object_type, setup};

fn round_trip<T: Any + Clone + PartialEq + Debug>(x: T) -> T {
    let value = marshal::to_value(&x).unwrap();
    let back: AnyValue = marshal::from_value(value.as_raw()).unwrap();
    match back.downcast::<T>() {
        Ok(v) => *v,
        Err(_) => panic!("{:?} came back as a different type", x),
    }
}

fn assert_round_trips<T: Any + Clone + PartialEq + Debug>(samples: &[T]) {
    for x in samples {
        assert_eq!(&round_trip(x.clone()), x);
    }
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_integer_round_trips_at_the_edges() {
    setup();
    assert_round_trips(&[0i8, i8::MIN, i8::MAX]);
    assert_round_trips(&[0u8, u8::MIN, u8::MAX]);
    assert_round_trips(&[0i32, i32::MIN, i32::MAX]);
    assert_round_trips(&[0u32, u32::MIN, u32::MAX]);
    assert_round_trips(&[0i64, i64::MIN, i64::MAX]);
    assert_round_trips(&[0u64, u64::MIN, u64::MAX]);
}

#[test]
fn test_float_and_bool_round_trips() {
    setup();
    assert_round_trips(&[0.0f32, f32::MIN, f32::MAX, -1.5]);
    assert_round_trips(&[0.0f64, f64::MIN, f64::MAX, f64::EPSILON]);
    assert_round_trips(&[true, false]);
}

#[test]
fn test_string_round_trips_including_empty() {
    setup();
    assert_round_trips(&[String::new(), "hello".to_string(), "ünïcödé".to_string()]);
}

#[test]
fn test_null_pointer_round_trips() {
    setup();
    assert_eq!(round_trip(Pointer(0)), Pointer(0));
    assert_eq!(round_trip(Pointer(0xdead_beef)), Pointer(0xdead_beef));
}

#[test]
fn test_variant_round_trips() {
    setup();
    assert_eq!(round_trip(Variant("(1, 'a')".into())), Variant("(1, 'a')".into()));
}

#[test]
fn test_absent_value_is_typed_null_pointer() {
    setup();
    let v = marshal::to_value(&()).unwrap();
    assert_eq!(v.value_type(), Type::POINTER);
    assert_eq!(v.get::<Pointer>().unwrap(), Pointer(0));

    let none: Option<String> = None;
    let v = none.to_value().unwrap();
    assert_eq!(v.value_type(), Type::POINTER);
}

#[test]
fn test_conversion_is_exact_width() {
    setup();
    let v = 7i64.to_value().unwrap();
    assert!(matches!(v.get::<i32>(), Err(BridgeError::TypeMismatch { .. })));
    assert_eq!(v.get::<i64>().unwrap(), 7);

    let v = 7i32.to_value().unwrap();
    assert!(matches!(v.get::<u32>(), Err(BridgeError::TypeMismatch { .. })));
}

#[test]
fn test_unknown_rust_type_is_unsupported() {
    setup();
    struct Opaque;
    assert!(matches!(
        marshal::to_value(&Opaque),
        Err(BridgeError::UnsupportedType { .. })
    ));
    assert!(matches!(
        marshal::to_value(&vec![1u8, 2, 3]),
        Err(BridgeError::UnsupportedType { .. })
    ));
}

// ============================================================================
// Registry lookup
// ============================================================================

#[test]
fn test_derived_type_falls_back_to_fundamental_marshaler() {
    setup();
    let t = object_type("MarshalFallback");
    assert!(!marshal::has_marshaler(t));
    assert!(marshal::lookup(t).is_ok());
    assert!(matches!(marshal::lookup_exact(t), Err(BridgeError::NoMarshaler(_))));

    let obj = Object::new(t, &[]).unwrap();
    let value = obj.to_value().unwrap();
    let decoded = marshal::from_value(value.as_raw()).unwrap();
    let decoded = decoded.downcast::<Object>().unwrap();
    assert_eq!(*decoded, obj);
}

#[test]
fn test_type_without_any_marshaler_fails() {
    setup();
    let unknown = Type::from_glib(ffi::GType(0x7fff_fff0));
    assert!(matches!(
        marshal::lookup(unknown),
        Err(BridgeError::NoMarshaler(t)) if t == unknown
    ));

    let uninitialized = ffi::GValue::new();
    assert!(matches!(
        marshal::from_value(&uninitialized),
        Err(BridgeError::NoMarshaler(_))
    ));
}

#[test]
fn test_exact_marshaler_wins_and_last_registration_wins() {
    setup();
    let t = object_type("MarshalExact");
    marshal::register_marshaler(t, |_| Ok(Box::new("first".to_string()))).unwrap();
    marshal::register_marshaler(t, |_| Ok(Box::new("second".to_string()))).unwrap();

    let obj = Object::new(t, &[]).unwrap();
    let value = obj.to_value().unwrap();
    let decoded = marshal::from_value(value.as_raw()).unwrap();
    assert_eq!(*decoded.downcast::<String>().unwrap(), "second");
}

#[test]
fn test_custom_transformer_is_preferred() {
    setup();
    #[derive(Clone)]
    struct Celsius(f64);
    marshal::register_transformer(|c: &Celsius| c.0.to_value()).unwrap();

    let v = marshal::to_value(&Celsius(21.5)).unwrap();
    assert_eq!(v.value_type(), Type::F64);
    assert_eq!(v.get::<f64>().unwrap(), 21.5);
}

#[test]
fn test_object_natural_value_uses_most_specific_marshaler() {
    setup();
    let base = object_type("NaturalBase");
    let derived = glib_bridge::ffi::g_type_register_static(
        base.into_glib(),
        &super::common::unique_name("NaturalDerived"),
        &ffi::GTypeInfo::default(),
        0,
    );
    let derived = Type::from_glib(derived);
    marshal::register_marshaler(base, |_| Ok(Box::new(42i32))).unwrap();

    let obj = Object::new(derived, &[]).unwrap();
    let natural = obj.natural_value().unwrap();
    assert_eq!(*natural.downcast::<i32>().unwrap(), 42);
}

// ============================================================================
// Value lifecycle
// ============================================================================

#[test]
fn test_value_unset_is_idempotent() {
    setup();
    let mut v = "text".to_value().unwrap();
    assert!(v.is_valid());
    v.unset();
    v.unset();
    assert!(!v.is_valid());
}

#[test]
fn test_value_of_non_value_type_is_unsupported() {
    setup();
    assert!(matches!(Value::new(Type::NONE), Err(BridgeError::UnsupportedType { .. })));
    assert!(matches!(Value::new(Type::INVALID), Err(BridgeError::UnsupportedType { .. })));
}

#[test]
fn test_object_value_duplicate_takes_a_reference() {
    setup();
    let obj = Object::new(object_type("ValueDup"), &[]).unwrap();
    let before = obj.ref_count();
    let v = obj.to_value().unwrap();
    let dup = v.duplicate().unwrap();
    assert_eq!(obj.ref_count(), before + 2);
    drop(v);
    drop(dup);
    assert_eq!(obj.ref_count(), before);
}

#[test]
fn test_arbitrary_value_crosses_as_boxed() {
    setup();
    let payload = ArbitraryValue::new(vec![1, 2, 3]);
    let v = payload.to_value().unwrap();
    assert_eq!(v.value_type(), ArbitraryValue::static_type());

    let decoded = marshal::from_value(v.as_raw()).unwrap();
    let decoded = decoded.downcast::<ArbitraryValue>().unwrap();
    assert_eq!(decoded.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));

    let copy = v.duplicate().unwrap();
    drop(v);
    let still_there = copy.get::<ArbitraryValue>().unwrap();
    assert!(still_there.is::<Vec<i32>>());
}
