//! The tagged value container.
//!
//! A `GValue` is tagged with a type and stores data whose variant always
//! matches that type's fundamental. Only `g_value_init` produces an
//! initialized value, so the tag and the payload cannot drift apart.

use tracing::warn;

use crate::gobject::{g_object_ref, g_object_unref, instance_type};
use crate::gparam::{g_param_spec_ref, g_param_spec_unref};
use crate::gtype::*;
use crate::ptr::{GObjectPtr, GParamSpecPtr};
use crate::state::with_state;

/// Payload of a [`GValue`].
#[derive(Debug, Default, PartialEq)]
pub enum GValueData {
    #[default]
    Empty,
    Boolean(bool),
    Char(i8),
    UChar(u8),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Enum(i32),
    Flags(u32),
    String(Option<String>),
    Pointer(usize),
    Boxed(usize),
    Object(GObjectPtr),
    Param(GParamSpecPtr),
    Variant(Option<String>),
}

impl GValueData {
    /// The zero payload for a fundamental type.
    pub fn zeroed(fundamental: GType) -> Self {
        match fundamental {
            G_TYPE_BOOLEAN => Self::Boolean(false),
            G_TYPE_CHAR => Self::Char(0),
            G_TYPE_UCHAR => Self::UChar(0),
            G_TYPE_INT => Self::Int(0),
            G_TYPE_UINT => Self::UInt(0),
            G_TYPE_LONG => Self::Long(0),
            G_TYPE_ULONG => Self::ULong(0),
            G_TYPE_INT64 => Self::Int64(0),
            G_TYPE_UINT64 => Self::UInt64(0),
            G_TYPE_FLOAT => Self::Float(0.0),
            G_TYPE_DOUBLE => Self::Double(0.0),
            G_TYPE_ENUM => Self::Enum(0),
            G_TYPE_FLAGS => Self::Flags(0),
            G_TYPE_STRING => Self::String(None),
            G_TYPE_POINTER => Self::Pointer(0),
            G_TYPE_BOXED => Self::Boxed(0),
            G_TYPE_PARAM => Self::Param(GParamSpecPtr::NULL),
            G_TYPE_OBJECT | G_TYPE_INTERFACE => Self::Object(GObjectPtr::NULL),
            G_TYPE_VARIANT => Self::Variant(None),
            _ => Self::Empty,
        }
    }

    /// Bitwise copy. Does not take references on refcounted payloads.
    pub(crate) fn shallow(&self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Boolean(v) => Self::Boolean(*v),
            Self::Char(v) => Self::Char(*v),
            Self::UChar(v) => Self::UChar(*v),
            Self::Int(v) => Self::Int(*v),
            Self::UInt(v) => Self::UInt(*v),
            Self::Long(v) => Self::Long(*v),
            Self::ULong(v) => Self::ULong(*v),
            Self::Int64(v) => Self::Int64(*v),
            Self::UInt64(v) => Self::UInt64(*v),
            Self::Float(v) => Self::Float(*v),
            Self::Double(v) => Self::Double(*v),
            Self::Enum(v) => Self::Enum(*v),
            Self::Flags(v) => Self::Flags(*v),
            Self::String(v) => Self::String(v.clone()),
            Self::Pointer(v) => Self::Pointer(*v),
            Self::Boxed(v) => Self::Boxed(*v),
            Self::Object(v) => Self::Object(*v),
            Self::Param(v) => Self::Param(*v),
            Self::Variant(v) => Self::Variant(v.clone()),
        }
    }
}

/// A native tagged value.
#[derive(Debug, Default, PartialEq)]
pub struct GValue {
    g_type: GType,
    data: GValueData,
}

macro_rules! value_accessors {
    ($( $get:ident, $set:ident, $variant:ident, $ty:ty; )*) => {
        $(
            pub fn $get(&self) -> Option<$ty> {
                match self.data {
                    GValueData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            /// Returns `false` when the value does not hold this kind.
            pub fn $set(&mut self, v: $ty) -> bool {
                match &mut self.data {
                    GValueData::$variant(slot) => {
                        *slot = v;
                        true
                    }
                    _ => false,
                }
            }
        )*
    };
}

impl GValue {
    /// An uninitialized value (`G_VALUE_INIT`).
    pub const fn new() -> Self {
        Self {
            g_type: G_TYPE_INVALID,
            data: GValueData::Empty,
        }
    }

    pub fn value_type(&self) -> GType {
        self.g_type
    }

    pub fn data(&self) -> &GValueData {
        &self.data
    }

    pub fn is_initialized(&self) -> bool {
        self.g_type != G_TYPE_INVALID
    }

    value_accessors! {
        get_boolean, set_boolean, Boolean, bool;
        get_schar, set_schar, Char, i8;
        get_uchar, set_uchar, UChar, u8;
        get_int, set_int, Int, i32;
        get_uint, set_uint, UInt, u32;
        get_long, set_long, Long, i64;
        get_ulong, set_ulong, ULong, u64;
        get_int64, set_int64, Int64, i64;
        get_uint64, set_uint64, UInt64, u64;
        get_float, set_float, Float, f32;
        get_double, set_double, Double, f64;
        get_enum, set_enum, Enum, i32;
        get_flags, set_flags, Flags, u32;
        get_pointer, set_pointer, Pointer, usize;
    }

    /// The string payload; `None` for a null string or a non-string value.
    pub fn get_string(&self) -> Option<&str> {
        match &self.data {
            GValueData::String(s) => s.as_deref(),
            _ => None,
        }
    }

    pub fn set_string(&mut self, v: Option<&str>) -> bool {
        match &mut self.data {
            GValueData::String(slot) => {
                *slot = v.map(str::to_string);
                true
            }
            _ => false,
        }
    }

    pub fn get_variant(&self) -> Option<&str> {
        match &self.data {
            GValueData::Variant(s) => s.as_deref(),
            _ => None,
        }
    }

    pub fn set_variant(&mut self, v: Option<&str>) -> bool {
        match &mut self.data {
            GValueData::Variant(slot) => {
                *slot = v.map(str::to_string);
                true
            }
            _ => false,
        }
    }

    /// Null when the value holds no object.
    pub fn get_object(&self) -> GObjectPtr {
        match self.data {
            GValueData::Object(p) => p,
            _ => GObjectPtr::NULL,
        }
    }

    pub fn get_boxed(&self) -> usize {
        match self.data {
            GValueData::Boxed(p) => p,
            _ => 0,
        }
    }

    pub fn get_param(&self) -> GParamSpecPtr {
        match self.data {
            GValueData::Param(p) => p,
            _ => GParamSpecPtr::NULL,
        }
    }

    fn replace_data(&mut self, data: GValueData) -> GValueData {
        std::mem::replace(&mut self.data, data)
    }
}

// ========== LIFECYCLE ==========

/// Initialize `value` to hold the zero value of `t`.
pub fn g_value_init(value: &mut GValue, t: GType) -> bool {
    if value.is_initialized() {
        warn!(target: "glib", "g_value_init: value is already initialized");
        return false;
    }
    let fundamental = with_state(|s| {
        let f = fundamental(s, t);
        if matches!(f, G_TYPE_INVALID | G_TYPE_NONE) {
            None
        } else {
            Some(f)
        }
    });
    let Some(fundamental) = fundamental else {
        warn!(target: "glib", "g_value_init: {:?} is not a value type", t);
        return false;
    };
    value.g_type = t;
    value.data = GValueData::zeroed(fundamental);
    true
}

/// Release the value's payload and return it to the uninitialized state.
pub fn g_value_unset(value: &mut GValue) {
    if !value.is_initialized() {
        return;
    }
    let t = value.g_type;
    let data = std::mem::take(&mut value.data);
    value.g_type = G_TYPE_INVALID;
    release_data(t, data);
}

/// Whether `value` is an initialized value of a known type (`G_IS_VALUE`).
pub fn g_is_value(value: &GValue) -> bool {
    value.is_initialized() && with_state(|s| s.types.contains_key(&value.g_type))
}

pub fn g_value_type_compatible(src: GType, dest: GType) -> bool {
    g_type_is_a(src, dest)
}

/// Copy `src` into an initialized, type-compatible `dest`, taking references
/// on refcounted payloads.
pub fn g_value_copy(src: &GValue, dest: &mut GValue) -> bool {
    if !src.is_initialized() || !dest.is_initialized() {
        warn!(target: "glib", "g_value_copy: source or destination is not initialized");
        return false;
    }
    if !g_value_type_compatible(src.g_type, dest.g_type) {
        warn!(
            target: "glib",
            "g_value_copy: cannot copy {:?} into {:?}", src.g_type, dest.g_type
        );
        return false;
    }
    let copied = duplicate_data(src);
    let old = dest.replace_data(copied);
    release_data(dest.g_type, old);
    true
}

fn duplicate_data(src: &GValue) -> GValueData {
    match src.data {
        GValueData::Object(p) if !p.is_null() => GValueData::Object(g_object_ref(p)),
        GValueData::Param(p) if !p.is_null() => GValueData::Param(g_param_spec_ref(p)),
        GValueData::Boxed(b) if b != 0 => GValueData::Boxed(g_boxed_copy(src.g_type, b)),
        ref other => other.shallow(),
    }
}

fn release_data(t: GType, data: GValueData) {
    match data {
        GValueData::Object(p) if !p.is_null() => g_object_unref(p),
        GValueData::Param(p) if !p.is_null() => g_param_spec_unref(p),
        GValueData::Boxed(b) if b != 0 => g_boxed_free(t, b),
        _ => {}
    }
}

// ========== REFCOUNTED PAYLOADS ==========

fn check_object(value: &GValue, object: GObjectPtr) -> bool {
    if !matches!(value.data, GValueData::Object(_)) {
        warn!(target: "glib", "g_value_set_object: value does not hold an object type");
        return false;
    }
    if object.is_null() {
        return true;
    }
    let t = instance_type(object);
    if t == G_TYPE_INVALID {
        warn!(target: "glib", "g_value_set_object: assertion 'G_IS_OBJECT (v_object)' failed");
        return false;
    }
    if !g_value_type_compatible(t, value.g_type) {
        warn!(
            target: "glib",
            "g_value_set_object: object of type {:?} is not compatible with {:?}", t, value.g_type
        );
        return false;
    }
    true
}

/// Store `object` in `value`, taking a new reference.
pub fn g_value_set_object(value: &mut GValue, object: GObjectPtr) -> bool {
    if !check_object(value, object) {
        return false;
    }
    if !object.is_null() {
        g_object_ref(object);
    }
    let old = value.replace_data(GValueData::Object(object));
    release_data(value.g_type, old);
    true
}

/// Store `object` in `value`, taking over the caller's reference.
pub fn g_value_take_object(value: &mut GValue, object: GObjectPtr) -> bool {
    if !check_object(value, object) {
        return false;
    }
    let old = value.replace_data(GValueData::Object(object));
    release_data(value.g_type, old);
    true
}

/// Store a copy of the boxed payload `boxed`.
pub fn g_value_set_boxed(value: &mut GValue, boxed: usize) -> bool {
    if !matches!(value.data, GValueData::Boxed(_)) {
        warn!(target: "glib", "g_value_set_boxed: value does not hold a boxed type");
        return false;
    }
    let copied = if boxed == 0 {
        0
    } else {
        g_boxed_copy(value.g_type, boxed)
    };
    let old = value.replace_data(GValueData::Boxed(copied));
    release_data(value.g_type, old);
    true
}

/// Store `boxed`, taking ownership of it.
pub fn g_value_take_boxed(value: &mut GValue, boxed: usize) -> bool {
    if !matches!(value.data, GValueData::Boxed(_)) {
        warn!(target: "glib", "g_value_take_boxed: value does not hold a boxed type");
        return false;
    }
    let old = value.replace_data(GValueData::Boxed(boxed));
    release_data(value.g_type, old);
    true
}

/// Store `pspec`, taking a new reference.
pub fn g_value_set_param(value: &mut GValue, pspec: GParamSpecPtr) -> bool {
    if !matches!(value.data, GValueData::Param(_)) {
        warn!(target: "glib", "g_value_set_param: value does not hold a param type");
        return false;
    }
    if !pspec.is_null() {
        g_param_spec_ref(pspec);
    }
    let old = value.replace_data(GValueData::Param(pspec));
    release_data(value.g_type, old);
    true
}
