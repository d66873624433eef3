//! Object instances, reference counting and properties.

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::callbacks::{
    G_PARAM_CONSTRUCT, G_PARAM_CONSTRUCT_ONLY, G_PARAM_EXPLICIT_NOTIFY, G_PARAM_READABLE, G_PARAM_WRITABLE,
    G_TYPE_FLAG_ABSTRACT, GObjectClassVTable,
};
use crate::gparam::{self, g_param_value_set_default};
use crate::gsignal::{HandlerNode, emit_notify};
use crate::gtype::{
    G_TYPE_INITIALLY_UNOWNED, G_TYPE_INTERFACE, G_TYPE_INVALID, G_TYPE_OBJECT, GType, ancestry,
    ensure_class, is_a,
};
use crate::gvalue::{GValue, g_value_init, g_value_type_compatible, g_value_unset};
use crate::probe::run_free_hooks;
use crate::ptr::{GClassPtr, GObjectPtr, GParamSpecPtr};
use crate::state::with_state;

pub(crate) struct InstanceNode {
    pub(crate) g_type: GType,
    pub(crate) class: GClassPtr,
    pub(crate) ref_count: u32,
    pub(crate) floating: bool,
    pub(crate) finalizing: bool,
    pub(crate) constructing: bool,
    pub(crate) private: FxHashMap<GType, Vec<u8>>,
    pub(crate) handlers: Vec<HandlerNode>,
    pub(crate) next_handler: u64,
    pub(crate) active_emissions: Vec<u32>,
    pub(crate) stopped_emissions: Vec<u32>,
}

// ========== ROOT CLASS ==========

unsafe extern "C" fn root_set_property(
    object: GObjectPtr,
    property_id: u32,
    _value: *const GValue,
    _pspec: GParamSpecPtr,
) {
    warn!(
        target: "glib",
        "{:?}: invalid property id {} (no set_property implementation)", object, property_id
    );
}

unsafe extern "C" fn root_get_property(
    object: GObjectPtr,
    property_id: u32,
    _value: *mut GValue,
    _pspec: GParamSpecPtr,
) {
    warn!(
        target: "glib",
        "{:?}: invalid property id {} (no get_property implementation)", object, property_id
    );
}

unsafe extern "C" fn root_constructed(_object: GObjectPtr) {}

/// Releases the instance memory. Every finalize chain must end here.
unsafe extern "C" fn root_finalize(object: GObjectPtr) {
    let removed = with_state(|s| {
        let node = s.instances.remove(&object)?;
        let probe = s.probes.instances.entry(object).or_default();
        probe.freed = true;
        Some(node)
    });
    if removed.is_none() {
        warn!(target: "glib", "finalize of unknown instance {:?}", object);
        return;
    }
    run_free_hooks(object);
}

pub(crate) fn root_vtable() -> GObjectClassVTable {
    GObjectClassVTable {
        set_property: Some(root_set_property),
        get_property: Some(root_get_property),
        constructed: Some(root_constructed),
        finalize: Some(root_finalize),
    }
}

// ========== CLASS VTABLES ==========

pub fn g_object_class_get_vtable(class: GClassPtr) -> Option<GObjectClassVTable> {
    with_state(|s| s.classes.get(&class).map(|c| c.vtable))
}

/// Replace the class's vtable. Returns `false` for an unknown class.
pub fn g_object_class_set_vtable(class: GClassPtr, vtable: GObjectClassVTable) -> bool {
    with_state(|s| match s.classes.get_mut(&class) {
        Some(node) => {
            node.vtable = vtable;
            true
        }
        None => false,
    })
}

fn vtable_of_type(t: GType) -> Option<GObjectClassVTable> {
    with_state(|s| {
        let class = s.types.get(&t)?.class;
        s.classes.get(&class).map(|c| c.vtable)
    })
}

// ========== PROPERTIES ==========

/// Install `pspec` on `class` under `property_id`. The class takes a reference.
pub fn g_object_class_install_property(class: GClassPtr, property_id: u32, pspec: GParamSpecPtr) -> bool {
    if property_id == 0 {
        warn!(target: "glib", "g_object_class_install_property: property id must be > 0");
        return false;
    }
    let installed = with_state(|s| {
        let Some(owner) = s.classes.get(&class).map(|c| c.g_type) else {
            warn!(target: "glib", "g_object_class_install_property: invalid class");
            return false;
        };
        let Some(name) = s.pspecs.get(&pspec).map(|p| p.name.clone()) else {
            warn!(target: "glib", "g_object_class_install_property: invalid param spec");
            return false;
        };
        let taken = s.classes.get(&class).is_some_and(|c| {
            c.properties
                .iter()
                .any(|(id, p)| *id == property_id || s.pspecs.get(p).is_some_and(|n| n.name == name))
        });
        if taken {
            warn!(
                target: "glib",
                "class {:?} already has a property named '{}' or with id {}", owner, name, property_id
            );
            return false;
        }
        if let Some(node) = s.pspecs.get_mut(&pspec) {
            node.owner_type = owner;
            node.param_id = property_id;
        }
        if let Some(c) = s.classes.get_mut(&class) {
            c.properties.push((property_id, pspec));
        }
        true
    });
    if installed {
        gparam::g_param_spec_ref_sink(pspec);
    }
    installed
}

/// Find a property on `class` or any ancestor class.
pub fn g_object_class_find_property(class: GClassPtr, name: &str) -> GParamSpecPtr {
    let name = gparam::canonical_name(name);
    with_state(|s| {
        let mut current = class;
        while let Some(node) = s.classes.get(&current) {
            let found = node
                .properties
                .iter()
                .find(|(_, p)| s.pspecs.get(p).is_some_and(|n| n.name == name));
            if let Some((_, pspec)) = found {
                return *pspec;
            }
            current = node.parent;
        }
        GParamSpecPtr::NULL
    })
}

/// All properties of `class`, ancestors first.
pub fn g_object_class_list_properties(class: GClassPtr) -> Vec<GParamSpecPtr> {
    with_state(|s| {
        let mut chain = Vec::new();
        let mut current = class;
        while let Some(node) = s.classes.get(&current) {
            chain.push(node.properties.iter().map(|(_, p)| *p).collect::<Vec<_>>());
            current = node.parent;
        }
        chain.into_iter().rev().flatten().collect()
    })
}

/// Validate `value` and hand it to the owning class's `set_property`.
fn dispatch_set_property(object: GObjectPtr, pspec: GParamSpecPtr, value: &GValue) -> bool {
    let Some(info) = gparam::pspec_info(pspec) else {
        return false;
    };
    if !g_value_type_compatible(value.value_type(), info.value_type) {
        warn!(
            target: "glib",
            "property '{}' of type {:?} cannot be set from a value of type {:?}",
            info.name, info.value_type, value.value_type()
        );
        return false;
    }
    if !gparam::param_value_in_range(pspec, value) {
        warn!(target: "glib", "value for property '{}' is out of range", info.name);
        return false;
    }
    let Some(set) = vtable_of_type(info.owner_type).and_then(|v| v.set_property) else {
        return false;
    };
    unsafe { set(object, info.param_id, value as *const GValue, pspec) };
    true
}

fn find_instance_property(object: GObjectPtr, name: &str) -> GParamSpecPtr {
    let class = g_object_get_class(object);
    if class.is_null() {
        return GParamSpecPtr::NULL;
    }
    g_object_class_find_property(class, name)
}

/// Set a property after construction. Emits `notify::<name>` on success.
pub fn g_object_set_property(object: GObjectPtr, name: &str, value: &GValue) -> bool {
    let pspec = find_instance_property(object, name);
    let Some(info) = gparam::pspec_info(pspec) else {
        warn!(target: "glib", "object {:?} has no property named '{}'", object, name);
        return false;
    };
    if info.flags & G_PARAM_WRITABLE == 0 {
        warn!(target: "glib", "property '{}' is not writable", info.name);
        return false;
    }
    let constructing = with_state(|s| s.instances.get(&object).is_some_and(|i| i.constructing));
    if info.flags & G_PARAM_CONSTRUCT_ONLY != 0 && !constructing {
        warn!(target: "glib", "construct property '{}' cannot be set after construction", info.name);
        return false;
    }
    if !dispatch_set_property(object, pspec, value) {
        return false;
    }
    if info.flags & G_PARAM_EXPLICIT_NOTIFY == 0 {
        emit_notify(object, pspec);
    }
    true
}

/// Read a property into `value`, initializing it to the property type if it
/// is not initialized yet.
pub fn g_object_get_property(object: GObjectPtr, name: &str, value: &mut GValue) -> bool {
    let pspec = find_instance_property(object, name);
    let Some(info) = gparam::pspec_info(pspec) else {
        warn!(target: "glib", "object {:?} has no property named '{}'", object, name);
        return false;
    };
    if info.flags & G_PARAM_READABLE == 0 {
        warn!(target: "glib", "property '{}' is not readable", info.name);
        return false;
    }
    if !value.is_initialized() {
        g_value_init(value, info.value_type);
    } else if !g_value_type_compatible(info.value_type, value.value_type()) {
        warn!(
            target: "glib",
            "cannot read property '{}' of type {:?} into a value of type {:?}",
            info.name, info.value_type, value.value_type()
        );
        return false;
    }
    let Some(get) = vtable_of_type(info.owner_type).and_then(|v| v.get_property) else {
        return false;
    };
    unsafe { get(object, info.param_id, value as *mut GValue, pspec) };
    true
}

pub fn g_object_notify(object: GObjectPtr, name: &str) {
    let pspec = find_instance_property(object, name);
    if pspec.is_null() {
        warn!(target: "glib", "object {:?} has no property named '{}'", object, name);
        return;
    }
    emit_notify(object, pspec);
}

pub fn g_object_notify_by_pspec(object: GObjectPtr, pspec: GParamSpecPtr) {
    emit_notify(object, pspec);
}

// ========== CONSTRUCTION ==========

/// Create an instance of `t`, setting the named construct properties.
///
/// Instances of `GInitiallyUnowned` subtypes start with a floating reference.
/// Returns null on failure.
pub fn g_object_new_with_properties(t: GType, names: &[&str], values: &[GValue]) -> GObjectPtr {
    if names.len() != values.len() {
        warn!(target: "glib", "g_object_new_with_properties: names and values differ in length");
        return GObjectPtr::NULL;
    }
    let instantiable = with_state(|s| {
        s.types.get(&t).is_some_and(|n| {
            n.fundamental == G_TYPE_OBJECT && n.flags & G_TYPE_FLAG_ABSTRACT == 0 && t != G_TYPE_INTERFACE
        })
    });
    if !instantiable {
        warn!(target: "glib", "cannot create instance of abstract or non-object type {:?}", t);
        return GObjectPtr::NULL;
    }

    let class = ensure_class(t);
    if class.is_null() {
        return GObjectPtr::NULL;
    }

    let object = GObjectPtr::allocate();
    let init_chain = with_state(|s| {
        let chain: Vec<GType> = ancestry(s, t).into_iter().rev().collect();
        let private = chain
            .iter()
            .filter_map(|t| s.types.get(t).map(|n| (*t, n.private_size)))
            .filter(|(_, size)| *size > 0)
            .map(|(t, size)| (t, vec![0u8; size]))
            .collect();
        s.instances.insert(
            object,
            InstanceNode {
                g_type: t,
                class,
                ref_count: 1,
                floating: is_a(s, t, G_TYPE_INITIALLY_UNOWNED),
                finalizing: false,
                constructing: true,
                private,
                handlers: Vec::new(),
                next_handler: 1,
                active_emissions: Vec::new(),
                stopped_emissions: Vec::new(),
            },
        );
        s.probes.instances.entry(object).or_default();
        chain
            .into_iter()
            .filter_map(|t| {
                let node = s.types.get(&t)?;
                node.info.instance_init.map(|init| (init, node.class))
            })
            .collect::<Vec<_>>()
    });

    for (init, type_class) in init_chain {
        unsafe { init(object, type_class) };
    }

    for (name, value) in names.iter().zip(values) {
        let pspec = g_object_class_find_property(class, name);
        let writable = gparam::pspec_info(pspec).is_some_and(|i| i.flags & G_PARAM_WRITABLE != 0);
        if !writable {
            warn!(target: "glib", "type {:?} has no writable property named '{}'", t, name);
            continue;
        }
        dispatch_set_property(object, pspec, value);
    }

    let supplied: Vec<String> = names.iter().map(|n| gparam::canonical_name(n)).collect();
    for pspec in g_object_class_list_properties(class) {
        let Some(info) = gparam::pspec_info(pspec) else {
            continue;
        };
        let construct = info.flags & (G_PARAM_CONSTRUCT | G_PARAM_CONSTRUCT_ONLY) != 0;
        if !construct || supplied.contains(&info.name) {
            continue;
        }
        let mut default = GValue::new();
        if g_param_value_set_default(pspec, &mut default) {
            dispatch_set_property(object, pspec, &default);
        }
        g_value_unset(&mut default);
    }

    with_state(|s| {
        if let Some(node) = s.instances.get_mut(&object) {
            node.constructing = false;
        }
    });

    if let Some(constructed) = vtable_of_type(t).and_then(|v| v.constructed) {
        unsafe { constructed(object) };
    }
    object
}

pub fn g_object_new(t: GType) -> GObjectPtr {
    g_object_new_with_properties(t, &[], &[])
}

// ========== REFERENCE COUNTING ==========

pub fn g_object_ref(object: GObjectPtr) -> GObjectPtr {
    let ok = with_state(|s| {
        let Some(node) = s.instances.get_mut(&object) else {
            return false;
        };
        node.ref_count += 1;
        s.probes.instances.entry(object).or_default().refs += 1;
        true
    });
    if !ok {
        warn!(target: "glib", "g_object_ref: assertion 'G_IS_OBJECT (object)' failed");
        return GObjectPtr::NULL;
    }
    object
}

/// Drop one reference. The last one disconnects all handlers and runs the
/// class's `finalize` slot.
pub fn g_object_unref(object: GObjectPtr) {
    enum Outcome {
        Invalid,
        Alive,
        Finalize(GClassPtr, Vec<crate::ptr::GClosurePtr>),
    }

    let outcome = with_state(|s| {
        let Some(node) = s.instances.get_mut(&object) else {
            return Outcome::Invalid;
        };
        if node.ref_count == 0 || node.finalizing {
            return Outcome::Invalid;
        }
        node.ref_count -= 1;
        let outcome = if node.ref_count == 0 {
            node.finalizing = true;
            let closures = node.handlers.drain(..).map(|h| h.closure).collect();
            Outcome::Finalize(node.class, closures)
        } else {
            Outcome::Alive
        };
        s.probes.instances.entry(object).or_default().unrefs += 1;
        outcome
    });

    match outcome {
        Outcome::Invalid => {
            warn!(target: "glib", "g_object_unref: assertion 'G_IS_OBJECT (object)' failed");
        }
        Outcome::Alive => {}
        Outcome::Finalize(class, closures) => {
            for closure in closures {
                crate::gclosure::g_closure_unref(closure);
            }
            let finalize = g_object_class_get_vtable(class).and_then(|v| v.finalize);
            match finalize {
                Some(finalize) => unsafe { finalize(object) },
                None => unsafe { root_finalize(object) },
            }
        }
    }
}

/// Claim a floating reference, or take a normal one if not floating.
pub fn g_object_ref_sink(object: GObjectPtr) -> GObjectPtr {
    let ok = with_state(|s| {
        let Some(node) = s.instances.get_mut(&object) else {
            return false;
        };
        let probe = s.probes.instances.entry(object).or_default();
        probe.sinks += 1;
        if node.floating {
            node.floating = false;
        } else {
            node.ref_count += 1;
            probe.refs += 1;
        }
        true
    });
    if !ok {
        warn!(target: "glib", "g_object_ref_sink: assertion 'G_IS_OBJECT (object)' failed");
        return GObjectPtr::NULL;
    }
    object
}

pub fn g_object_is_floating(object: GObjectPtr) -> bool {
    with_state(|s| s.instances.get(&object).is_some_and(|n| n.floating))
}

/// Mark the instance floating again without touching the count.
pub fn g_object_force_floating(object: GObjectPtr) {
    with_state(|s| {
        if let Some(node) = s.instances.get_mut(&object) {
            node.floating = true;
        }
    });
}

/// Current reference count; 0 once the instance is gone.
pub fn g_object_ref_count(object: GObjectPtr) -> u32 {
    with_state(|s| s.instances.get(&object).map_or(0, |n| n.ref_count))
}

/// Whether `object` addresses a live instance (`G_IS_OBJECT`).
pub fn g_is_object(object: GObjectPtr) -> bool {
    !object.is_null() && with_state(|s| s.instances.get(&object).is_some_and(|n| !n.finalizing))
}

pub(crate) fn instance_type(object: GObjectPtr) -> GType {
    with_state(|s| s.instances.get(&object).map_or(G_TYPE_INVALID, |n| n.g_type))
}

/// `G_TYPE_FROM_INSTANCE`.
pub fn g_type_from_instance(object: GObjectPtr) -> GType {
    instance_type(object)
}

/// `G_OBJECT_GET_CLASS`.
pub fn g_object_get_class(object: GObjectPtr) -> GClassPtr {
    with_state(|s| s.instances.get(&object).map_or(GClassPtr::NULL, |n| n.class))
}
