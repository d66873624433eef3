//! The marshaler registry: dynamic conversion between values and Rust values.
//!
//! Decoding ([`from_value`]) looks up a marshaler by the value's exact type,
//! then by its fundamental type. Encoding ([`to_value`]) consults the
//! transformers registered for the Rust type first, then the built-in
//! primitive dispatch.
//!
//! Both tables are read-mostly: lookups share a read lock and registration
//! takes the write lock. Converters are cloned out of the table before they
//! run, so a converter may itself use the registry.

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock, RwLock};

use glib_bridge_sys as ffi;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{EnumValue, FlagsValue, Pointer, ToValue, Value, Variant};
use crate::error::{BridgeError, BridgeResult};
use crate::object::Object;
use crate::param_spec::ParamSpec;
use crate::types::Type;

/// A dynamically typed Rust value.
pub type AnyValue = Box<dyn Any + Send>;

/// Decodes a native value into a Rust value.
pub type MarshalFn = Arc<dyn Fn(&ffi::GValue) -> BridgeResult<AnyValue> + Send + Sync>;

pub(crate) type TransformFn = Arc<dyn Fn(&dyn Any) -> BridgeResult<Value> + Send + Sync>;

/// A marshaler paired with the type it decodes.
#[derive(Clone)]
pub struct TypeMarshaler {
    pub type_: Type,
    pub marshal: MarshalFn,
}

impl TypeMarshaler {
    pub fn new<F>(type_: Type, marshal: F) -> Self
    where
        F: Fn(&ffi::GValue) -> BridgeResult<AnyValue> + Send + Sync + 'static,
    {
        Self {
            type_,
            marshal: Arc::new(marshal),
        }
    }
}

struct MarshalRegistry {
    marshalers: FxHashMap<Type, MarshalFn>,
    transformers: FxHashMap<TypeId, TransformFn>,
}

impl MarshalRegistry {
    fn with_builtins() -> Self {
        let mut registry = MarshalRegistry {
            marshalers: FxHashMap::default(),
            transformers: FxHashMap::default(),
        };
        for tm in builtin_marshalers() {
            registry.marshalers.insert(tm.type_, tm.marshal);
        }
        let (tm, transform) = crate::boxed::arbitrary_value_converters();
        registry.marshalers.insert(tm.type_, tm.marshal);
        registry
            .transformers
            .insert(TypeId::of::<crate::boxed::ArbitraryValue>(), transform);
        registry
    }
}

static REGISTRY: OnceLock<RwLock<MarshalRegistry>> = OnceLock::new();

fn global() -> &'static RwLock<MarshalRegistry> {
    REGISTRY.get_or_init(|| RwLock::new(MarshalRegistry::with_builtins()))
}

// ========== BUILT-IN MARSHALERS ==========

fn expect<T>(v: Option<T>, value: &ffi::GValue, what: &str) -> BridgeResult<T> {
    v.ok_or_else(|| {
        BridgeError::type_mismatch(what, Type::from_glib(value.value_type()).name())
    })
}

fn marshal_object(value: &ffi::GValue) -> BridgeResult<AnyValue> {
    let ptr = value.get_object();
    if ptr.is_null() {
        return Ok(Box::new(Option::<Object>::None));
    }
    Ok(Box::new(Object::from_glib_none(ptr)?))
}

fn marshal_param(value: &ffi::GValue) -> BridgeResult<AnyValue> {
    let ptr = value.get_param();
    if ptr.is_null() {
        return Ok(Box::new(Option::<ParamSpec>::None));
    }
    Ok(Box::new(ParamSpec::from_glib_none(ptr)?))
}

fn builtin_marshalers() -> Vec<TypeMarshaler> {
    vec![
        TypeMarshaler::new(Type::NONE, |_| Ok(Box::new(()))),
        TypeMarshaler::new(Type::I8, |v| Ok(Box::new(expect(v.get_schar(), v, "i8")?))),
        TypeMarshaler::new(Type::U8, |v| Ok(Box::new(expect(v.get_uchar(), v, "u8")?))),
        TypeMarshaler::new(Type::BOOL, |v| {
            Ok(Box::new(expect(v.get_boolean(), v, "bool")?))
        }),
        TypeMarshaler::new(Type::INT, |v| Ok(Box::new(expect(v.get_int(), v, "i32")?))),
        TypeMarshaler::new(Type::UINT, |v| Ok(Box::new(expect(v.get_uint(), v, "u32")?))),
        TypeMarshaler::new(Type::LONG, |v| Ok(Box::new(expect(v.get_long(), v, "i64")?))),
        TypeMarshaler::new(Type::ULONG, |v| {
            Ok(Box::new(expect(v.get_ulong(), v, "u64")?))
        }),
        TypeMarshaler::new(Type::INT64, |v| {
            Ok(Box::new(expect(v.get_int64(), v, "i64")?))
        }),
        TypeMarshaler::new(Type::UINT64, |v| {
            Ok(Box::new(expect(v.get_uint64(), v, "u64")?))
        }),
        TypeMarshaler::new(Type::ENUM, |v| Ok(Box::new(expect(v.get_enum(), v, "enum")?))),
        TypeMarshaler::new(Type::FLAGS, |v| {
            Ok(Box::new(expect(v.get_flags(), v, "flags")?))
        }),
        TypeMarshaler::new(Type::F32, |v| Ok(Box::new(expect(v.get_float(), v, "f32")?))),
        TypeMarshaler::new(Type::F64, |v| {
            Ok(Box::new(expect(v.get_double(), v, "f64")?))
        }),
        // A null string decodes as the empty string.
        TypeMarshaler::new(Type::STRING, |v| match v.data() {
            ffi::GValueData::String(s) => Ok(Box::new(s.clone().unwrap_or_default())),
            _ => Err(BridgeError::type_mismatch("string", Type::from_glib(v.value_type()).name())),
        }),
        TypeMarshaler::new(Type::POINTER, |v| {
            Ok(Box::new(Pointer(expect(v.get_pointer(), v, "pointer")?)))
        }),
        TypeMarshaler::new(Type::BOXED, |v| Ok(Box::new(Pointer(v.get_boxed())))),
        TypeMarshaler::new(Type::PARAM_SPEC, marshal_param),
        TypeMarshaler::new(Type::OBJECT, marshal_object),
        TypeMarshaler::new(Type::INTERFACE, marshal_object),
        TypeMarshaler::new(Type::VARIANT, |v| match v.get_variant() {
            Some(s) => Ok(Box::new(Variant(s.to_string()))),
            None => Ok(Box::new(Option::<Variant>::None)),
        }),
    ]
}

// ========== REGISTRATION ==========

/// Register (or replace) the marshaler for `t`.
pub fn register_marshaler<F>(t: Type, marshal: F) -> BridgeResult<()>
where
    F: Fn(&ffi::GValue) -> BridgeResult<AnyValue> + Send + Sync + 'static,
{
    register_marshalers([TypeMarshaler::new(t, marshal)])
}

/// Register several marshalers under one write lock. Last write wins.
pub fn register_marshalers(marshalers: impl IntoIterator<Item = TypeMarshaler>) -> BridgeResult<()> {
    let mut registry = global().write()?;
    for tm in marshalers {
        debug!(target: "glib_bridge::value", "registering marshaler for {}", tm.type_);
        registry.marshalers.insert(tm.type_, tm.marshal);
    }
    Ok(())
}

/// Register a custom encoder for the Rust type `T`. It takes precedence over
/// the built-in dispatch in [`to_value`].
pub fn register_transformer<T, F>(transform: F) -> BridgeResult<()>
where
    T: Any,
    F: Fn(&T) -> BridgeResult<Value> + Send + Sync + 'static,
{
    let erased: TransformFn = Arc::new(move |any: &dyn Any| match any.downcast_ref::<T>() {
        Some(v) => transform(v),
        None => Err(BridgeError::unsupported(std::any::type_name::<T>())),
    });
    global()
        .write()?
        .transformers
        .insert(TypeId::of::<T>(), erased);
    Ok(())
}

// ========== LOOKUP ==========

/// The marshaler for `t`, falling back to its fundamental type.
pub fn lookup(t: Type) -> BridgeResult<MarshalFn> {
    let registry = global().read()?;
    registry
        .marshalers
        .get(&t)
        .or_else(|| registry.marshalers.get(&t.fundamental()))
        .cloned()
        .ok_or(BridgeError::NoMarshaler(t))
}

/// The marshaler registered for exactly `t`.
pub fn lookup_exact(t: Type) -> BridgeResult<MarshalFn> {
    let registry = global().read()?;
    registry
        .marshalers
        .get(&t)
        .cloned()
        .ok_or(BridgeError::NoMarshaler(t))
}

/// Whether a marshaler is registered for exactly `t`.
pub fn has_marshaler(t: Type) -> bool {
    global()
        .read()
        .map(|r| r.marshalers.contains_key(&t))
        .unwrap_or(false)
}

// ========== CONVERSION ==========

/// Decode a native value into a Rust value.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn from_value(value: &ffi::GValue) -> BridgeResult<AnyValue> {
    let t = Type::from_glib(value.value_type());
    if !t.is_valid() {
        return Err(BridgeError::NoMarshaler(t));
    }
    let marshal = lookup(t)?;
    marshal(value)
}

macro_rules! try_builtin {
    ($value:expr, [$($ty:ty),* $(,)?]) => {
        $(
            if let Some(v) = $value.downcast_ref::<$ty>() {
                return v.to_value();
            }
        )*
    };
}

/// Encode a dynamically typed Rust value.
///
/// `()` and every `None` encode as a null pointer. Rust types without a
/// transformer or a built-in encoding fail with `UnsupportedType`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn to_value(value: &dyn Any) -> BridgeResult<Value> {
    to_value_named(value, "a dynamically typed value")
}

/// Like [`to_value`], naming the value's Rust type in the error when it has
/// no encoding.
pub fn to_value_named(value: &dyn Any, type_name: &str) -> BridgeResult<Value> {
    let transformer = global()
        .read()?
        .transformers
        .get(&(*value).type_id())
        .cloned();
    if let Some(transform) = transformer {
        return transform(value);
    }

    if value.is::<()>() {
        return Ok(Value::null());
    }
    try_builtin!(
        value,
        [
            bool,
            i8,
            u8,
            i32,
            u32,
            i64,
            u64,
            f32,
            f64,
            String,
            &'static str,
            Pointer,
            Variant,
            EnumValue,
            FlagsValue,
            Value,
            Object,
            ParamSpec,
            Option<bool>,
            Option<i8>,
            Option<u8>,
            Option<i32>,
            Option<u32>,
            Option<i64>,
            Option<u64>,
            Option<f32>,
            Option<f64>,
            Option<String>,
            Option<&'static str>,
            Option<Pointer>,
            Option<Variant>,
            Option<EnumValue>,
            Option<FlagsValue>,
            Option<Value>,
            Option<Object>,
            Option<ParamSpec>,
        ]
    );
    Err(BridgeError::unsupported(type_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_none_encodes_as_null_pointer() {
        let nones: [&dyn Any; 6] = [
            &Option::<i32>::None,
            &Option::<bool>::None,
            &Option::<f64>::None,
            &Option::<Variant>::None,
            &Option::<ParamSpec>::None,
            &Option::<Pointer>::None,
        ];
        for none in nones {
            let v = to_value(none).unwrap();
            assert_eq!(v.value_type(), Type::POINTER);
            assert_eq!(v.get::<Pointer>().unwrap(), Pointer(0));
        }
    }

    #[test]
    fn decoded_null_payloads_encode_again() {
        for t in [Type::VARIANT, Type::PARAM_SPEC, Type::OBJECT] {
            let empty = Value::new(t).unwrap();
            let decoded = from_value(empty.as_raw()).unwrap();
            let again = to_value(&*decoded).unwrap();
            assert_eq!(again.get::<Pointer>().unwrap(), Pointer(0));
        }
    }

    #[test]
    fn unsupported_type_error_names_the_type() {
        struct Opaque;
        match to_value_named(&Opaque, std::any::type_name::<Opaque>()) {
            Err(BridgeError::UnsupportedType { type_name }) => assert!(type_name.ends_with("Opaque")),
            other => panic!("expected UnsupportedType, got {:?}", other.map(|v| v.value_type())),
        }
    }
}
