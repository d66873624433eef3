//! Property descriptors.

use std::fmt;

use bitflags::bitflags;
use glib_bridge_sys as ffi;

use crate::error::{BridgeError, BridgeResult};
use crate::types::Type;
use crate::value::{FromValue, ToValue, Value};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamFlags: u32 {
        const READABLE = ffi::G_PARAM_READABLE;
        const WRITABLE = ffi::G_PARAM_WRITABLE;
        const READWRITE = ffi::G_PARAM_READWRITE;
        const CONSTRUCT = ffi::G_PARAM_CONSTRUCT;
        const CONSTRUCT_ONLY = ffi::G_PARAM_CONSTRUCT_ONLY;
        const LAX_VALIDATION = ffi::G_PARAM_LAX_VALIDATION;
        const STATIC_NAME = ffi::G_PARAM_STATIC_NAME;
        const STATIC_NICK = ffi::G_PARAM_STATIC_NICK;
        const STATIC_BLURB = ffi::G_PARAM_STATIC_BLURB;
        const EXPLICIT_NOTIFY = ffi::G_PARAM_EXPLICIT_NOTIFY;
        const DEPRECATED = ffi::G_PARAM_DEPRECATED;
    }
}

impl Default for ParamFlags {
    fn default() -> Self {
        ParamFlags::READWRITE
    }
}

/// A strong reference to a param spec.
///
/// Specs are created floating; the constructors sink them so the returned
/// value owns a normal reference, and installing the spec on a class adds
/// the class's own.
pub struct ParamSpec {
    ptr: ffi::GParamSpecPtr,
}

macro_rules! ranged_constructors {
    ($( $name:ident($ty:ty) => $raw:ident; )*) => {
        $(
            pub fn $name(
                name: &str,
                nick: &str,
                blurb: &str,
                minimum: $ty,
                maximum: $ty,
                default: $ty,
                flags: ParamFlags,
            ) -> BridgeResult<ParamSpec> {
                ParamSpec::from_new(
                    name,
                    ffi::$raw(name, nick, blurb, minimum, maximum, default, flags.bits()),
                )
            }
        )*
    };
}

impl ParamSpec {
    fn from_new(name: &str, ptr: ffi::GParamSpecPtr) -> BridgeResult<ParamSpec> {
        if ptr.is_null() {
            return Err(BridgeError::registration(name, "invalid param spec"));
        }
        ffi::g_param_spec_ref_sink(ptr);
        Ok(ParamSpec { ptr })
    }

    /// Take a new reference to a spec owned elsewhere.
    pub fn from_glib_none(ptr: ffi::GParamSpecPtr) -> BridgeResult<ParamSpec> {
        if ptr.is_null() {
            return Err(BridgeError::NullPointer);
        }
        if ffi::g_param_spec_ref(ptr).is_null() {
            return Err(BridgeError::InvalidInstance);
        }
        Ok(ParamSpec { ptr })
    }

    pub fn as_ptr(&self) -> ffi::GParamSpecPtr {
        self.ptr
    }

    pub fn string(
        name: &str,
        nick: &str,
        blurb: &str,
        default: Option<&str>,
        flags: ParamFlags,
    ) -> BridgeResult<ParamSpec> {
        ParamSpec::from_new(
            name,
            ffi::g_param_spec_string(name, nick, blurb, default, flags.bits()),
        )
    }

    pub fn boolean(
        name: &str,
        nick: &str,
        blurb: &str,
        default: bool,
        flags: ParamFlags,
    ) -> BridgeResult<ParamSpec> {
        ParamSpec::from_new(
            name,
            ffi::g_param_spec_boolean(name, nick, blurb, default, flags.bits()),
        )
    }

    ranged_constructors! {
        int(i32) => g_param_spec_int;
        uint(u32) => g_param_spec_uint;
        int64(i64) => g_param_spec_int64;
        uint64(u64) => g_param_spec_uint64;
        float(f32) => g_param_spec_float;
        double(f64) => g_param_spec_double;
    }

    pub fn boxed(
        name: &str,
        nick: &str,
        blurb: &str,
        boxed_type: Type,
        flags: ParamFlags,
    ) -> BridgeResult<ParamSpec> {
        ParamSpec::from_new(
            name,
            ffi::g_param_spec_boxed(name, nick, blurb, boxed_type.into_glib(), flags.bits()),
        )
    }

    pub fn object(
        name: &str,
        nick: &str,
        blurb: &str,
        object_type: Type,
        flags: ParamFlags,
    ) -> BridgeResult<ParamSpec> {
        ParamSpec::from_new(
            name,
            ffi::g_param_spec_object(name, nick, blurb, object_type.into_glib(), flags.bits()),
        )
    }

    pub fn pointer(name: &str, nick: &str, blurb: &str, flags: ParamFlags) -> BridgeResult<ParamSpec> {
        ParamSpec::from_new(
            name,
            ffi::g_param_spec_pointer(name, nick, blurb, flags.bits()),
        )
    }

    pub fn name(&self) -> String {
        ffi::g_param_spec_get_name(self.ptr).unwrap_or_default()
    }

    pub fn nick(&self) -> String {
        ffi::g_param_spec_get_nick(self.ptr).unwrap_or_default()
    }

    pub fn blurb(&self) -> String {
        ffi::g_param_spec_get_blurb(self.ptr).unwrap_or_default()
    }

    pub fn flags(&self) -> ParamFlags {
        ParamFlags::from_bits_truncate(ffi::g_param_spec_get_flags(self.ptr))
    }

    pub fn value_type(&self) -> Type {
        Type::from_glib(ffi::g_param_spec_value_type(self.ptr))
    }

    /// The class that installed this spec, `INVALID` before installation.
    pub fn owner_type(&self) -> Type {
        Type::from_glib(ffi::g_param_spec_owner_type(self.ptr))
    }

    pub fn default_value(&self) -> BridgeResult<Value> {
        let mut value = Value::new(self.value_type())?;
        if !ffi::g_param_value_set_default(self.ptr, value.as_raw_mut()) {
            return Err(BridgeError::InvalidInstance);
        }
        Ok(value)
    }
}

impl Clone for ParamSpec {
    fn clone(&self) -> Self {
        ffi::g_param_spec_ref(self.ptr);
        ParamSpec { ptr: self.ptr }
    }
}

impl Drop for ParamSpec {
    fn drop(&mut self) {
        if ffi::g_param_spec_ref_count(self.ptr) > 0 {
            ffi::g_param_spec_unref(self.ptr);
        }
    }
}

impl PartialEq for ParamSpec {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for ParamSpec {}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name())
            .field("value_type", &self.value_type())
            .field("flags", &self.flags())
            .finish()
    }
}

impl ToValue for ParamSpec {
    fn value_type(&self) -> Type {
        Type::PARAM_SPEC
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut value = Value::new(Type::PARAM_SPEC)?;
        value.set_param(self)?;
        Ok(value)
    }
}

impl FromValue for ParamSpec {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        match value.data() {
            ffi::GValueData::Param(p) => ParamSpec::from_glib_none(*p),
            _ => Err(BridgeError::type_mismatch(
                "param spec",
                Type::from_glib(value.value_type()).name(),
            )),
        }
    }
}
