//! Static conversions between Rust types and values.
//!
//! Integer and float conversions are exact-width: an `i32` only comes out of
//! an `INT` (or `ENUM`) value, never out of an `INT64` one.

use glib_bridge_sys as ffi;

use super::Value;
use crate::error::{BridgeError, BridgeResult};
use crate::types::Type;

pub trait ToValue {
    /// The type [`to_value`](ToValue::to_value) produces.
    fn value_type(&self) -> Type;

    fn to_value(&self) -> BridgeResult<Value>;
}

pub trait FromValue: Sized {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self>;
}

/// An untyped native pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Pointer(pub usize);

/// A serialized variant payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variant(pub String);

/// A value of a registered enum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    pub type_: Type,
    pub value: i32,
}

/// A value of a registered flags type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagsValue {
    pub type_: Type,
    pub value: u32,
}

fn mismatch(expected: &str, value: &ffi::GValue) -> BridgeError {
    BridgeError::type_mismatch(expected, Type::from_glib(value.value_type()).name())
}

macro_rules! primitive_conversions {
    ($( $ty:ty, $t:expr, $set:ident, [$($get:ident),+]; )*) => {
        $(
            impl ToValue for $ty {
                fn value_type(&self) -> Type {
                    $t
                }

                fn to_value(&self) -> BridgeResult<Value> {
                    let mut v = Value::new($t)?;
                    v.$set(*self)?;
                    Ok(v)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
                    None$(.or_else(|| value.$get()))+
                        .ok_or_else(|| mismatch(stringify!($ty), value))
                }
            }
        )*
    };
}

primitive_conversions! {
    bool, Type::BOOL, set_bool, [get_boolean];
    i8, Type::I8, set_i8, [get_schar];
    u8, Type::U8, set_u8, [get_uchar];
    i32, Type::INT, set_i32, [get_int, get_enum];
    u32, Type::UINT, set_u32, [get_uint, get_flags];
    i64, Type::INT64, set_i64, [get_int64, get_long];
    u64, Type::UINT64, set_u64, [get_uint64, get_ulong];
    f32, Type::F32, set_f32, [get_float];
    f64, Type::F64, set_f64, [get_double];
}

impl ToValue for str {
    fn value_type(&self) -> Type {
        Type::STRING
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut v = Value::new(Type::STRING)?;
        v.set_string(Some(self))?;
        Ok(v)
    }
}

impl ToValue for &str {
    fn value_type(&self) -> Type {
        Type::STRING
    }

    fn to_value(&self) -> BridgeResult<Value> {
        (**self).to_value()
    }
}

impl ToValue for String {
    fn value_type(&self) -> Type {
        Type::STRING
    }

    fn to_value(&self) -> BridgeResult<Value> {
        self.as_str().to_value()
    }
}

impl FromValue for String {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        match value.data() {
            ffi::GValueData::String(Some(s)) => Ok(s.clone()),
            ffi::GValueData::String(None) => Err(BridgeError::NullPointer),
            _ => Err(mismatch("String", value)),
        }
    }
}

/// `None` encodes as a null pointer.
impl<T: ToValue> ToValue for Option<T> {
    fn value_type(&self) -> Type {
        match self {
            Some(v) => v.value_type(),
            None => Type::POINTER,
        }
    }

    fn to_value(&self) -> BridgeResult<Value> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::null()),
        }
    }
}

impl FromValue for Option<String> {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        match value.data() {
            ffi::GValueData::String(s) => Ok(s.clone()),
            ffi::GValueData::Pointer(0) => Ok(None),
            _ => Err(mismatch("Option<String>", value)),
        }
    }
}

impl ToValue for Pointer {
    fn value_type(&self) -> Type {
        Type::POINTER
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut v = Value::new(Type::POINTER)?;
        v.set_pointer(self.0)?;
        Ok(v)
    }
}

impl FromValue for Pointer {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        match value.data() {
            ffi::GValueData::Pointer(p) | ffi::GValueData::Boxed(p) => Ok(Pointer(*p)),
            _ => Err(mismatch("Pointer", value)),
        }
    }
}

impl ToValue for Variant {
    fn value_type(&self) -> Type {
        Type::VARIANT
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut v = Value::new(Type::VARIANT)?;
        v.set_variant(Some(&self.0))?;
        Ok(v)
    }
}

impl FromValue for Variant {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        match value.data() {
            ffi::GValueData::Variant(Some(s)) => Ok(Variant(s.clone())),
            ffi::GValueData::Variant(None) => Err(BridgeError::NullPointer),
            _ => Err(mismatch("Variant", value)),
        }
    }
}

impl ToValue for EnumValue {
    fn value_type(&self) -> Type {
        self.type_
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut v = Value::new(self.type_)?;
        v.set_enum(self.value)?;
        Ok(v)
    }
}

impl FromValue for EnumValue {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        let v = value.get_enum().ok_or_else(|| mismatch("enum", value))?;
        Ok(EnumValue {
            type_: Type::from_glib(value.value_type()),
            value: v,
        })
    }
}

impl ToValue for FlagsValue {
    fn value_type(&self) -> Type {
        self.type_
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut v = Value::new(self.type_)?;
        v.set_flags(self.value)?;
        Ok(v)
    }
}

impl FromValue for FlagsValue {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        let v = value.get_flags().ok_or_else(|| mismatch("flags", value))?;
        Ok(FlagsValue {
            type_: Type::from_glib(value.value_type()),
            value: v,
        })
    }
}

/// A value converts by duplication.
impl ToValue for Value {
    fn value_type(&self) -> Type {
        Value::value_type(self)
    }

    fn to_value(&self) -> BridgeResult<Value> {
        self.duplicate()
    }
}

impl FromValue for Value {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        super::ValueRef::new(value).duplicate()
    }
}
