//! Callback signatures and the small structs handed across the native surface.
//!
//! Everything in here mirrors a C declaration: callbacks are
//! `unsafe extern "C" fn` pointers and receive raw `GValue` pointers that may
//! be null.

use crate::gtype::GType;
use crate::gvalue::GValue;
use crate::ptr::{GClassPtr, GClosurePtr, GInterfacePtr, GObjectPtr, GParamSpecPtr};

/// Interned string id. Zero means "no quark".
pub type GQuark = u32;

// ========== TYPE SYSTEM HOOKS ==========

pub type GClassInitFunc = unsafe extern "C" fn(g_class: GClassPtr, class_data: usize);

pub type GInstanceInitFunc = unsafe extern "C" fn(instance: GObjectPtr, g_class: GClassPtr);

pub type GInterfaceInitFunc = unsafe extern "C" fn(g_iface: GInterfacePtr, iface_data: usize);

// ========== OBJECT CLASS VFUNCS ==========

pub type GObjectSetPropertyFunc = unsafe extern "C" fn(
    object: GObjectPtr,
    property_id: u32,
    value: *const GValue,
    pspec: GParamSpecPtr,
);

pub type GObjectGetPropertyFunc = unsafe extern "C" fn(
    object: GObjectPtr,
    property_id: u32,
    value: *mut GValue,
    pspec: GParamSpecPtr,
);

/// Used for the `constructed` and `finalize` slots.
pub type GObjectFunc = unsafe extern "C" fn(object: GObjectPtr);

// ========== CLOSURES AND SIGNALS ==========

pub type GClosureMarshal = unsafe extern "C" fn(
    closure: GClosurePtr,
    return_value: *mut GValue,
    n_param_values: u32,
    param_values: *const GValue,
    invocation_hint: *const GSignalInvocationHint,
    marshal_data: usize,
);

pub type GClosureNotify = unsafe extern "C" fn(data: usize, closure: GClosurePtr);

pub type GSignalAccumulator = unsafe extern "C" fn(
    ihint: *const GSignalInvocationHint,
    return_accu: *mut GValue,
    handler_return: *const GValue,
    data: usize,
) -> bool;

// ========== BOXED TYPES ==========

pub type GBoxedCopyFunc = unsafe extern "C" fn(boxed: usize) -> usize;

pub type GBoxedFreeFunc = unsafe extern "C" fn(boxed: usize);

// ========== STRUCTS ==========

/// Registration info for `g_type_register_static`.
#[derive(Clone, Copy, Default)]
pub struct GTypeInfo {
    pub class_size: u16,
    pub class_init: Option<GClassInitFunc>,
    pub class_data: usize,
    pub instance_size: u16,
    pub instance_init: Option<GInstanceInitFunc>,
}

/// Registration info for `g_type_add_interface_static`.
#[derive(Clone, Copy, Default)]
pub struct GInterfaceInfo {
    pub interface_init: Option<GInterfaceInitFunc>,
    pub interface_data: usize,
}

/// The patchable slots of a `GObjectClass`.
///
/// A new class starts as a copy of its parent's table.
#[derive(Clone, Copy, Default)]
pub struct GObjectClassVTable {
    pub set_property: Option<GObjectSetPropertyFunc>,
    pub get_property: Option<GObjectGetPropertyFunc>,
    pub constructed: Option<GObjectFunc>,
    pub finalize: Option<GObjectFunc>,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GSignalInvocationHint {
    pub signal_id: u32,
    pub detail: GQuark,
    pub run_type: u32,
}

/// Result of `g_signal_query`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GSignalQuery {
    pub signal_id: u32,
    pub signal_name: String,
    pub itype: GType,
    pub signal_flags: u32,
    pub return_type: GType,
    pub param_types: Vec<GType>,
}

impl GSignalQuery {
    pub fn n_params(&self) -> usize {
        self.param_types.len()
    }
}

// ========== FLAG CONSTANTS ==========

pub const G_TYPE_FLAG_ABSTRACT: u32 = 1 << 4;
pub const G_TYPE_FLAG_VALUE_ABSTRACT: u32 = 1 << 5;
pub const G_TYPE_FLAG_FINAL: u32 = 1 << 6;

pub const G_SIGNAL_RUN_FIRST: u32 = 1 << 0;
pub const G_SIGNAL_RUN_LAST: u32 = 1 << 1;
pub const G_SIGNAL_RUN_CLEANUP: u32 = 1 << 2;
pub const G_SIGNAL_NO_RECURSE: u32 = 1 << 3;
pub const G_SIGNAL_DETAILED: u32 = 1 << 4;
pub const G_SIGNAL_ACTION: u32 = 1 << 5;
pub const G_SIGNAL_NO_HOOKS: u32 = 1 << 6;
pub const G_SIGNAL_MUST_COLLECT: u32 = 1 << 7;
pub const G_SIGNAL_DEPRECATED: u32 = 1 << 8;
pub const G_SIGNAL_ACCUMULATOR_FIRST_RUN: u32 = 1 << 17;

pub const G_PARAM_READABLE: u32 = 1 << 0;
pub const G_PARAM_WRITABLE: u32 = 1 << 1;
pub const G_PARAM_READWRITE: u32 = G_PARAM_READABLE | G_PARAM_WRITABLE;
pub const G_PARAM_CONSTRUCT: u32 = 1 << 2;
pub const G_PARAM_CONSTRUCT_ONLY: u32 = 1 << 3;
pub const G_PARAM_LAX_VALIDATION: u32 = 1 << 4;
pub const G_PARAM_STATIC_NAME: u32 = 1 << 5;
pub const G_PARAM_STATIC_NICK: u32 = 1 << 6;
pub const G_PARAM_STATIC_BLURB: u32 = 1 << 7;
pub const G_PARAM_EXPLICIT_NOTIFY: u32 = 1 << 30;
pub const G_PARAM_DEPRECATED: u32 = 1 << 31;
