//! Property descriptors (`GParamSpec`).

use tracing::warn;

use crate::gtype::*;
use crate::gvalue::{GValue, GValueData, g_value_copy, g_value_init, g_value_unset};
use crate::ptr::GParamSpecPtr;
use crate::state::with_state;

/// Allowed range of a numeric property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamRange {
    None,
    Int(i64, i64),
    UInt(u64, u64),
    Float(f64, f64),
}

pub(crate) struct ParamSpecNode {
    pub(crate) name: String,
    pub(crate) nick: String,
    pub(crate) blurb: String,
    pub(crate) flags: u32,
    pub(crate) value_type: GType,
    pub(crate) owner_type: GType,
    pub(crate) param_id: u32,
    pub(crate) default: GValue,
    pub(crate) range: ParamRange,
    pub(crate) ref_count: u32,
    pub(crate) floating: bool,
}

/// Snapshot of the fields property dispatch needs.
pub(crate) struct ParamInfo {
    pub(crate) name: String,
    pub(crate) flags: u32,
    pub(crate) value_type: GType,
    pub(crate) owner_type: GType,
    pub(crate) param_id: u32,
}

pub(crate) fn canonical_name(name: &str) -> String {
    name.replace('_', "-")
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn create(
    name: &str,
    nick: &str,
    blurb: &str,
    value_type: GType,
    default: GValue,
    range: ParamRange,
    flags: u32,
) -> GParamSpecPtr {
    if !valid_name(name) {
        warn!(target: "glib", "g_param_spec: invalid property name '{}'", name);
        return GParamSpecPtr::NULL;
    }
    let pspec = GParamSpecPtr::allocate();
    with_state(|s| {
        s.pspecs.insert(
            pspec,
            ParamSpecNode {
                name: canonical_name(name),
                nick: nick.to_string(),
                blurb: blurb.to_string(),
                flags,
                value_type,
                owner_type: G_TYPE_INVALID,
                param_id: 0,
                default,
                range,
                ref_count: 1,
                floating: true,
            },
        )
    });
    pspec
}

fn default_of(t: GType, fill: impl FnOnce(&mut GValue) -> bool) -> Option<GValue> {
    let mut v = GValue::new();
    if !g_value_init(&mut v, t) || !fill(&mut v) {
        g_value_unset(&mut v);
        return None;
    }
    Some(v)
}

// ========== CONSTRUCTORS ==========

pub fn g_param_spec_boolean(name: &str, nick: &str, blurb: &str, default: bool, flags: u32) -> GParamSpecPtr {
    match default_of(G_TYPE_BOOLEAN, |v| v.set_boolean(default)) {
        Some(d) => create(name, nick, blurb, G_TYPE_BOOLEAN, d, ParamRange::None, flags),
        None => GParamSpecPtr::NULL,
    }
}

macro_rules! ranged_spec {
    ($fn_name:ident, $ty:ty, $gtype:expr, $set:ident, $range:ident, $wide:ty) => {
        pub fn $fn_name(
            name: &str,
            nick: &str,
            blurb: &str,
            minimum: $ty,
            maximum: $ty,
            default: $ty,
            flags: u32,
        ) -> GParamSpecPtr {
            if minimum > maximum || default < minimum || default > maximum {
                warn!(
                    target: "glib",
                    "{}: default {} outside [{}, {}] for '{}'",
                    stringify!($fn_name), default, minimum, maximum, name
                );
                return GParamSpecPtr::NULL;
            }
            match default_of($gtype, |v| v.$set(default)) {
                Some(d) => create(
                    name,
                    nick,
                    blurb,
                    $gtype,
                    d,
                    ParamRange::$range(minimum as $wide, maximum as $wide),
                    flags,
                ),
                None => GParamSpecPtr::NULL,
            }
        }
    };
}

ranged_spec!(g_param_spec_int, i32, G_TYPE_INT, set_int, Int, i64);
ranged_spec!(g_param_spec_uint, u32, G_TYPE_UINT, set_uint, UInt, u64);
ranged_spec!(g_param_spec_int64, i64, G_TYPE_INT64, set_int64, Int, i64);
ranged_spec!(g_param_spec_uint64, u64, G_TYPE_UINT64, set_uint64, UInt, u64);
ranged_spec!(g_param_spec_float, f32, G_TYPE_FLOAT, set_float, Float, f64);
ranged_spec!(g_param_spec_double, f64, G_TYPE_DOUBLE, set_double, Float, f64);

pub fn g_param_spec_string(
    name: &str,
    nick: &str,
    blurb: &str,
    default: Option<&str>,
    flags: u32,
) -> GParamSpecPtr {
    match default_of(G_TYPE_STRING, |v| v.set_string(default)) {
        Some(d) => create(name, nick, blurb, G_TYPE_STRING, d, ParamRange::None, flags),
        None => GParamSpecPtr::NULL,
    }
}

fn typed_spec(name: &str, nick: &str, blurb: &str, t: GType, expected: GType, flags: u32) -> GParamSpecPtr {
    if !g_type_is_a(t, expected) {
        warn!(target: "glib", "property '{}': {:?} is not a {:?} type", name, t, expected);
        return GParamSpecPtr::NULL;
    }
    match default_of(t, |_| true) {
        Some(d) => create(name, nick, blurb, t, d, ParamRange::None, flags),
        None => GParamSpecPtr::NULL,
    }
}

pub fn g_param_spec_boxed(name: &str, nick: &str, blurb: &str, boxed_type: GType, flags: u32) -> GParamSpecPtr {
    typed_spec(name, nick, blurb, boxed_type, G_TYPE_BOXED, flags)
}

pub fn g_param_spec_object(name: &str, nick: &str, blurb: &str, object_type: GType, flags: u32) -> GParamSpecPtr {
    if g_type_fundamental(object_type) == G_TYPE_INTERFACE {
        return typed_spec(name, nick, blurb, object_type, G_TYPE_INTERFACE, flags);
    }
    typed_spec(name, nick, blurb, object_type, G_TYPE_OBJECT, flags)
}

pub fn g_param_spec_pointer(name: &str, nick: &str, blurb: &str, flags: u32) -> GParamSpecPtr {
    typed_spec(name, nick, blurb, G_TYPE_POINTER, G_TYPE_POINTER, flags)
}

// ========== REFERENCE COUNTING ==========

pub fn g_param_spec_ref(pspec: GParamSpecPtr) -> GParamSpecPtr {
    let ok = with_state(|s| match s.pspecs.get_mut(&pspec) {
        Some(node) => {
            node.ref_count += 1;
            true
        }
        None => false,
    });
    if !ok {
        warn!(target: "glib", "g_param_spec_ref: assertion 'G_IS_PARAM_SPEC (pspec)' failed");
        return GParamSpecPtr::NULL;
    }
    pspec
}

pub fn g_param_spec_unref(pspec: GParamSpecPtr) {
    let released = with_state(|s| {
        let node = s.pspecs.get_mut(&pspec)?;
        node.ref_count = node.ref_count.saturating_sub(1);
        if node.ref_count > 0 {
            return Some(None);
        }
        s.pspecs.remove(&pspec).map(|n| Some(n.default))
    });
    match released {
        None => warn!(target: "glib", "g_param_spec_unref: assertion 'G_IS_PARAM_SPEC (pspec)' failed"),
        Some(Some(mut default)) => g_value_unset(&mut default),
        Some(None) => {}
    }
}

pub fn g_param_spec_ref_sink(pspec: GParamSpecPtr) -> GParamSpecPtr {
    let ok = with_state(|s| match s.pspecs.get_mut(&pspec) {
        Some(node) if node.floating => {
            node.floating = false;
            true
        }
        Some(node) => {
            node.ref_count += 1;
            true
        }
        None => false,
    });
    if !ok {
        return GParamSpecPtr::NULL;
    }
    pspec
}

pub fn g_param_spec_ref_count(pspec: GParamSpecPtr) -> u32 {
    with_state(|s| s.pspecs.get(&pspec).map_or(0, |n| n.ref_count))
}

pub fn g_param_spec_is_floating(pspec: GParamSpecPtr) -> bool {
    with_state(|s| s.pspecs.get(&pspec).is_some_and(|n| n.floating))
}

// ========== ACCESSORS ==========

pub fn g_param_spec_get_name(pspec: GParamSpecPtr) -> Option<String> {
    with_state(|s| s.pspecs.get(&pspec).map(|n| n.name.clone()))
}

pub fn g_param_spec_get_nick(pspec: GParamSpecPtr) -> Option<String> {
    with_state(|s| s.pspecs.get(&pspec).map(|n| n.nick.clone()))
}

pub fn g_param_spec_get_blurb(pspec: GParamSpecPtr) -> Option<String> {
    with_state(|s| s.pspecs.get(&pspec).map(|n| n.blurb.clone()))
}

pub fn g_param_spec_get_flags(pspec: GParamSpecPtr) -> u32 {
    with_state(|s| s.pspecs.get(&pspec).map_or(0, |n| n.flags))
}

pub fn g_param_spec_value_type(pspec: GParamSpecPtr) -> GType {
    with_state(|s| s.pspecs.get(&pspec).map_or(G_TYPE_INVALID, |n| n.value_type))
}

pub fn g_param_spec_owner_type(pspec: GParamSpecPtr) -> GType {
    with_state(|s| s.pspecs.get(&pspec).map_or(G_TYPE_INVALID, |n| n.owner_type))
}

pub fn g_param_spec_get_range(pspec: GParamSpecPtr) -> ParamRange {
    with_state(|s| s.pspecs.get(&pspec).map_or(ParamRange::None, |n| n.range))
}

/// Initialize `value` (if needed) and fill it with the property's default.
pub fn g_param_value_set_default(pspec: GParamSpecPtr, value: &mut GValue) -> bool {
    let default = with_state(|s| {
        s.pspecs
            .get(&pspec)
            .map(|n| (n.value_type, n.default.data().shallow()))
    });
    let Some((t, data)) = default else {
        return false;
    };
    if !value.is_initialized() && !g_value_init(value, t) {
        return false;
    }
    // Rebuild the default in a scratch value so g_value_copy takes any
    // references the payload needs.
    let mut scratch = GValue::new();
    g_value_init(&mut scratch, t);
    let filled = match data {
        GValueData::Boolean(b) => scratch.set_boolean(b),
        GValueData::Int(i) => scratch.set_int(i),
        GValueData::UInt(u) => scratch.set_uint(u),
        GValueData::Int64(i) => scratch.set_int64(i),
        GValueData::UInt64(u) => scratch.set_uint64(u),
        GValueData::Float(f) => scratch.set_float(f),
        GValueData::Double(d) => scratch.set_double(d),
        GValueData::String(s) => scratch.set_string(s.as_deref()),
        _ => true,
    };
    let copied = filled && g_value_copy(&scratch, value);
    g_value_unset(&mut scratch);
    copied
}

pub(crate) fn pspec_info(pspec: GParamSpecPtr) -> Option<ParamInfo> {
    with_state(|s| {
        s.pspecs.get(&pspec).map(|n| ParamInfo {
            name: n.name.clone(),
            flags: n.flags,
            value_type: n.value_type,
            owner_type: n.owner_type,
            param_id: n.param_id,
        })
    })
}

/// Whether a numeric `value` lies within the property's range.
pub(crate) fn param_value_in_range(pspec: GParamSpecPtr, value: &GValue) -> bool {
    match (g_param_spec_get_range(pspec), value.data()) {
        (ParamRange::Int(lo, hi), GValueData::Int(v)) => (lo..=hi).contains(&i64::from(*v)),
        (ParamRange::Int(lo, hi), GValueData::Int64(v)) => (lo..=hi).contains(v),
        (ParamRange::UInt(lo, hi), GValueData::UInt(v)) => (lo..=hi).contains(&u64::from(*v)),
        (ParamRange::UInt(lo, hi), GValueData::UInt64(v)) => (lo..=hi).contains(v),
        (ParamRange::Float(lo, hi), GValueData::Float(v)) => (lo..=hi).contains(&f64::from(*v)),
        (ParamRange::Float(lo, hi), GValueData::Double(v)) => (lo..=hi).contains(v),
        _ => true,
    }
}
