//! Native type identifiers.

use std::fmt;

use glib_bridge_sys as ffi;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// A native type id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Type(ffi::GType);

impl Type {
    pub const INVALID: Type = Type(ffi::G_TYPE_INVALID);
    pub const NONE: Type = Type(ffi::G_TYPE_NONE);
    pub const INTERFACE: Type = Type(ffi::G_TYPE_INTERFACE);
    pub const I8: Type = Type(ffi::G_TYPE_CHAR);
    pub const U8: Type = Type(ffi::G_TYPE_UCHAR);
    pub const BOOL: Type = Type(ffi::G_TYPE_BOOLEAN);
    pub const INT: Type = Type(ffi::G_TYPE_INT);
    pub const UINT: Type = Type(ffi::G_TYPE_UINT);
    pub const LONG: Type = Type(ffi::G_TYPE_LONG);
    pub const ULONG: Type = Type(ffi::G_TYPE_ULONG);
    pub const INT64: Type = Type(ffi::G_TYPE_INT64);
    pub const UINT64: Type = Type(ffi::G_TYPE_UINT64);
    pub const ENUM: Type = Type(ffi::G_TYPE_ENUM);
    pub const FLAGS: Type = Type(ffi::G_TYPE_FLAGS);
    pub const F32: Type = Type(ffi::G_TYPE_FLOAT);
    pub const F64: Type = Type(ffi::G_TYPE_DOUBLE);
    pub const STRING: Type = Type(ffi::G_TYPE_STRING);
    pub const POINTER: Type = Type(ffi::G_TYPE_POINTER);
    pub const BOXED: Type = Type(ffi::G_TYPE_BOXED);
    pub const PARAM_SPEC: Type = Type(ffi::G_TYPE_PARAM);
    pub const OBJECT: Type = Type(ffi::G_TYPE_OBJECT);
    pub const VARIANT: Type = Type(ffi::G_TYPE_VARIANT);
    pub const INITIALLY_UNOWNED: Type = Type(ffi::G_TYPE_INITIALLY_UNOWNED);

    pub fn from_glib(t: ffi::GType) -> Self {
        Type(t)
    }

    pub fn into_glib(self) -> ffi::GType {
        self.0
    }

    /// Look a type up by its registered name.
    pub fn from_name(name: &str) -> Option<Type> {
        let t = ffi::g_type_from_name(name);
        (t != ffi::G_TYPE_INVALID).then_some(Type(t))
    }

    pub fn name(self) -> String {
        ffi::g_type_name(self.0).unwrap_or_else(|| "<invalid>".to_string())
    }

    pub fn parent(self) -> Option<Type> {
        let p = ffi::g_type_parent(self.0);
        (p != ffi::G_TYPE_INVALID).then_some(Type(p))
    }

    pub fn fundamental(self) -> Type {
        Type(ffi::g_type_fundamental(self.0))
    }

    pub fn depth(self) -> u32 {
        ffi::g_type_depth(self.0)
    }

    pub fn is_a(self, other: Type) -> bool {
        ffi::g_type_is_a(self.0, other.0)
    }

    pub fn is_valid(self) -> bool {
        self != Type::INVALID
    }

    /// Whether values of this type fit in a `Value`.
    pub fn is_value_type(self) -> bool {
        ffi::g_type_is_value_type(self.0)
    }

    pub fn interfaces(self) -> Vec<Type> {
        ffi::g_type_interfaces(self.0).into_iter().map(Type).collect()
    }

    /// The fundamental kind, if the fundamental id is one of the built-ins.
    pub fn kind(self) -> Option<Fundamental> {
        Fundamental::try_from(self.fundamental().0.0).ok()
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::INVALID
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({}, {})", self.0.0, self.name())
    }
}

/// The built-in fundamental types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(usize)]
pub enum Fundamental {
    Invalid = 0,
    None = 4,
    Interface = 8,
    Char = 12,
    UChar = 16,
    Boolean = 20,
    Int = 24,
    UInt = 28,
    Long = 32,
    ULong = 36,
    Int64 = 40,
    UInt64 = 44,
    Enum = 48,
    Flags = 52,
    Float = 56,
    Double = 60,
    String = 64,
    Pointer = 68,
    Boxed = 72,
    Param = 76,
    Object = 80,
    Variant = 84,
}

impl Fundamental {
    pub fn as_type(self) -> Type {
        Type(ffi::GType(self.into()))
    }

    /// Whether a null pointer is a valid value of this kind.
    pub fn is_nullable(self) -> bool {
        match self {
            Fundamental::Interface
            | Fundamental::String
            | Fundamental::Boxed
            | Fundamental::Param
            | Fundamental::Object
            | Fundamental::Variant => true,
            Fundamental::Invalid
            | Fundamental::None
            | Fundamental::Char
            | Fundamental::UChar
            | Fundamental::Boolean
            | Fundamental::Int
            | Fundamental::UInt
            | Fundamental::Long
            | Fundamental::ULong
            | Fundamental::Int64
            | Fundamental::UInt64
            | Fundamental::Enum
            | Fundamental::Flags
            | Fundamental::Float
            | Fundamental::Double
            | Fundamental::Pointer => false,
        }
    }
}

/// Rust types with a fixed native type.
pub trait StaticType {
    fn static_type() -> Type;
}

macro_rules! static_types {
    ($($ty:ty => $t:expr),* $(,)?) => {
        $(
            impl StaticType for $ty {
                fn static_type() -> Type {
                    $t
                }
            }
        )*
    };
}

static_types! {
    bool => Type::BOOL,
    i8 => Type::I8,
    u8 => Type::U8,
    i32 => Type::INT,
    u32 => Type::UINT,
    i64 => Type::INT64,
    u64 => Type::UINT64,
    f32 => Type::F32,
    f64 => Type::F64,
    String => Type::STRING,
    str => Type::STRING,
}
