//! Type identifiers, the type table, classes and interfaces.

use tracing::warn;

use crate::callbacks::{
    G_TYPE_FLAG_ABSTRACT, G_TYPE_FLAG_FINAL, GBoxedCopyFunc, GBoxedFreeFunc, GInterfaceInfo,
    GObjectClassVTable, GTypeInfo,
};
use crate::gobject;
use crate::ptr::{GClassPtr, GInterfacePtr, GObjectPtr};
use crate::state::{State, class_init_lock, with_state};

/// A native type id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Debug)]
#[repr(transparent)]
pub struct GType(pub usize);

pub const G_TYPE_FUNDAMENTAL_SHIFT: usize = 2;
pub const G_TYPE_FUNDAMENTAL_MAX: usize = 255 << G_TYPE_FUNDAMENTAL_SHIFT;

pub const fn g_type_make_fundamental(x: usize) -> GType {
    GType(x << G_TYPE_FUNDAMENTAL_SHIFT)
}

pub const G_TYPE_INVALID: GType = g_type_make_fundamental(0);
pub const G_TYPE_NONE: GType = g_type_make_fundamental(1);
pub const G_TYPE_INTERFACE: GType = g_type_make_fundamental(2);
pub const G_TYPE_CHAR: GType = g_type_make_fundamental(3);
pub const G_TYPE_UCHAR: GType = g_type_make_fundamental(4);
pub const G_TYPE_BOOLEAN: GType = g_type_make_fundamental(5);
pub const G_TYPE_INT: GType = g_type_make_fundamental(6);
pub const G_TYPE_UINT: GType = g_type_make_fundamental(7);
pub const G_TYPE_LONG: GType = g_type_make_fundamental(8);
pub const G_TYPE_ULONG: GType = g_type_make_fundamental(9);
pub const G_TYPE_INT64: GType = g_type_make_fundamental(10);
pub const G_TYPE_UINT64: GType = g_type_make_fundamental(11);
pub const G_TYPE_ENUM: GType = g_type_make_fundamental(12);
pub const G_TYPE_FLAGS: GType = g_type_make_fundamental(13);
pub const G_TYPE_FLOAT: GType = g_type_make_fundamental(14);
pub const G_TYPE_DOUBLE: GType = g_type_make_fundamental(15);
pub const G_TYPE_STRING: GType = g_type_make_fundamental(16);
pub const G_TYPE_POINTER: GType = g_type_make_fundamental(17);
pub const G_TYPE_BOXED: GType = g_type_make_fundamental(18);
pub const G_TYPE_PARAM: GType = g_type_make_fundamental(19);
pub const G_TYPE_OBJECT: GType = g_type_make_fundamental(20);
pub const G_TYPE_VARIANT: GType = g_type_make_fundamental(21);

/// `GInitiallyUnowned`: an OBJECT subtype whose instances start floating.
pub const G_TYPE_INITIALLY_UNOWNED: GType = GType(G_TYPE_FUNDAMENTAL_MAX + 4);

pub(crate) const FIRST_DERIVED_TYPE: usize = G_TYPE_FUNDAMENTAL_MAX + 8;

pub(crate) struct BoxedFuncs {
    pub(crate) copy: GBoxedCopyFunc,
    pub(crate) free: GBoxedFreeFunc,
}

pub(crate) struct TypeNode {
    pub(crate) name: String,
    pub(crate) parent: GType,
    pub(crate) fundamental: GType,
    pub(crate) depth: u32,
    pub(crate) flags: u32,
    pub(crate) info: GTypeInfo,
    pub(crate) interfaces: Vec<(GType, GInterfaceInfo)>,
    pub(crate) class: GClassPtr,
    pub(crate) boxed: Option<BoxedFuncs>,
    pub(crate) private_size: usize,
}

pub(crate) struct ClassNode {
    pub(crate) g_type: GType,
    pub(crate) parent: GClassPtr,
    pub(crate) vtable: GObjectClassVTable,
    pub(crate) properties: Vec<(u32, crate::ptr::GParamSpecPtr)>,
    pub(crate) interfaces: Vec<(GType, GInterfacePtr)>,
}

pub(crate) struct InterfaceNode {
    pub(crate) iface_type: GType,
    pub(crate) instance_type: GType,
}

const FUNDAMENTALS: &[(GType, &str)] = &[
    (G_TYPE_NONE, "void"),
    (G_TYPE_INTERFACE, "GInterface"),
    (G_TYPE_CHAR, "gchar"),
    (G_TYPE_UCHAR, "guchar"),
    (G_TYPE_BOOLEAN, "gboolean"),
    (G_TYPE_INT, "gint"),
    (G_TYPE_UINT, "guint"),
    (G_TYPE_LONG, "glong"),
    (G_TYPE_ULONG, "gulong"),
    (G_TYPE_INT64, "gint64"),
    (G_TYPE_UINT64, "guint64"),
    (G_TYPE_ENUM, "GEnum"),
    (G_TYPE_FLAGS, "GFlags"),
    (G_TYPE_FLOAT, "gfloat"),
    (G_TYPE_DOUBLE, "gdouble"),
    (G_TYPE_STRING, "gchararray"),
    (G_TYPE_POINTER, "gpointer"),
    (G_TYPE_BOXED, "GBoxed"),
    (G_TYPE_PARAM, "GParam"),
    (G_TYPE_OBJECT, "GObject"),
    (G_TYPE_VARIANT, "GVariant"),
];

fn node(name: &str, parent: GType, fundamental: GType, depth: u32, flags: u32) -> TypeNode {
    TypeNode {
        name: name.to_string(),
        parent,
        fundamental,
        depth,
        flags,
        info: GTypeInfo::default(),
        interfaces: Vec::new(),
        class: GClassPtr::NULL,
        boxed: None,
        private_size: 0,
    }
}

/// Populate the fundamental types and the root object class.
pub(crate) fn boot(s: &mut State) {
    for &(t, name) in FUNDAMENTALS {
        let flags = match t {
            G_TYPE_ENUM | G_TYPE_FLAGS | G_TYPE_BOXED | G_TYPE_PARAM => G_TYPE_FLAG_ABSTRACT,
            _ => 0,
        };
        s.types.insert(t, node(name, G_TYPE_INVALID, t, 1, flags));
        s.type_names.insert(name.to_string(), t);
    }

    let root = GClassPtr::allocate();
    s.classes.insert(
        root,
        ClassNode {
            g_type: G_TYPE_OBJECT,
            parent: GClassPtr::NULL,
            vtable: gobject::root_vtable(),
            properties: Vec::new(),
            interfaces: Vec::new(),
        },
    );
    if let Some(object) = s.types.get_mut(&G_TYPE_OBJECT) {
        object.class = root;
    }

    let mut unowned = node(
        "GInitiallyUnowned",
        G_TYPE_OBJECT,
        G_TYPE_OBJECT,
        2,
        G_TYPE_FLAG_ABSTRACT,
    );
    unowned.info.class_size = 136;
    unowned.info.instance_size = 24;
    s.types.insert(G_TYPE_INITIALLY_UNOWNED, unowned);
    s.type_names
        .insert("GInitiallyUnowned".to_string(), G_TYPE_INITIALLY_UNOWNED);
}

// ========== STATE HELPERS ==========

pub(crate) fn is_a(s: &State, mut t: GType, is_a_type: GType) -> bool {
    if t == is_a_type {
        return s.types.contains_key(&t);
    }
    while let Some(node) = s.types.get(&t) {
        if t == is_a_type || node.interfaces.iter().any(|(iface, _)| *iface == is_a_type) {
            return true;
        }
        t = node.parent;
    }
    false
}

pub(crate) fn fundamental(s: &State, t: GType) -> GType {
    s.types.get(&t).map_or(G_TYPE_INVALID, |n| n.fundamental)
}

/// `t` and its ancestors, most derived first.
pub(crate) fn ancestry(s: &State, mut t: GType) -> Vec<GType> {
    let mut chain = Vec::new();
    while let Some(node) = s.types.get(&t) {
        chain.push(t);
        t = node.parent;
    }
    chain
}

/// `t`, its ancestors and every interface any of them implements.
pub(crate) fn ancestry_with_interfaces(s: &State, t: GType) -> Vec<GType> {
    let mut chain = ancestry(s, t);
    let interfaces: Vec<GType> = chain
        .iter()
        .filter_map(|t| s.types.get(t))
        .flat_map(|n| n.interfaces.iter().map(|(iface, _)| *iface))
        .collect();
    chain.extend(interfaces);
    chain
}

fn valid_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
}

/// Insert a derived type. Returns `G_TYPE_INVALID` when the name is taken
/// or the parent cannot be derived from.
pub(crate) fn register_derived(
    s: &mut State,
    parent: GType,
    name: &str,
    info: GTypeInfo,
    flags: u32,
) -> GType {
    if !valid_type_name(name) {
        warn!(target: "glib", "type name '{}' is invalid", name);
        return G_TYPE_INVALID;
    }
    if s.type_names.contains_key(name) {
        warn!(target: "glib", "cannot register existing type '{}'", name);
        return G_TYPE_INVALID;
    }
    let Some(parent_node) = s.types.get(&parent) else {
        warn!(target: "glib", "cannot derive '{}' from invalid parent type", name);
        return G_TYPE_INVALID;
    };
    if parent_node.flags & G_TYPE_FLAG_FINAL != 0 {
        warn!(target: "glib", "cannot derive '{}' from final type '{}'", name, parent_node.name);
        return G_TYPE_INVALID;
    }
    let fundamental = parent_node.fundamental;
    let depth = parent_node.depth + 1;

    let t = GType(s.next_type);
    s.next_type += 4;
    let mut derived = node(name, parent, fundamental, depth, flags);
    derived.info = info;
    s.types.insert(t, derived);
    s.type_names.insert(name.to_string(), t);
    t
}

// ========== TYPE QUERIES ==========

pub fn g_type_name(t: GType) -> Option<String> {
    with_state(|s| s.types.get(&t).map(|n| n.name.clone()))
}

pub fn g_type_from_name(name: &str) -> GType {
    with_state(|s| s.type_names.get(name).copied().unwrap_or(G_TYPE_INVALID))
}

pub fn g_type_parent(t: GType) -> GType {
    with_state(|s| s.types.get(&t).map_or(G_TYPE_INVALID, |n| n.parent))
}

pub fn g_type_fundamental(t: GType) -> GType {
    with_state(|s| fundamental(s, t))
}

pub fn g_type_depth(t: GType) -> u32 {
    with_state(|s| s.types.get(&t).map_or(0, |n| n.depth))
}

pub fn g_type_is_a(t: GType, is_a_type: GType) -> bool {
    with_state(|s| is_a(s, t, is_a_type))
}

pub fn g_type_test_flags(t: GType, flags: u32) -> bool {
    with_state(|s| s.types.get(&t).is_some_and(|n| n.flags & flags == flags))
}

/// Whether values of `t` can be stored in a `GValue`.
pub fn g_type_is_value_type(t: GType) -> bool {
    with_state(|s| {
        !matches!(
            fundamental(s, t),
            G_TYPE_INVALID | G_TYPE_NONE
        )
    })
}

/// Interfaces implemented by `t` or any ancestor.
pub fn g_type_interfaces(t: GType) -> Vec<GType> {
    with_state(|s| {
        ancestry(s, t)
            .iter()
            .filter_map(|t| s.types.get(t))
            .flat_map(|n| n.interfaces.iter().map(|(iface, _)| *iface))
            .collect()
    })
}

// ========== REGISTRATION ==========

/// Register a classed or interface type derived from `parent`.
pub fn g_type_register_static(parent: GType, name: &str, info: &GTypeInfo, flags: u32) -> GType {
    with_state(|s| {
        *s.probes
            .type_registrations
            .entry(name.to_string())
            .or_default() += 1;

        let derivable = s
            .types
            .get(&parent)
            .is_some_and(|p| p.fundamental == G_TYPE_OBJECT || parent == G_TYPE_INTERFACE);
        if !derivable {
            warn!(target: "glib", "cannot derive '{}': parent type is not classed", name);
            return G_TYPE_INVALID;
        }
        register_derived(s, parent, name, *info, flags)
    })
}

pub fn g_type_add_interface_static(instance_type: GType, iface_type: GType, info: &GInterfaceInfo) {
    with_state(|s| {
        if fundamental(s, iface_type) != G_TYPE_INTERFACE || iface_type == G_TYPE_INTERFACE {
            warn!(target: "glib", "g_type_add_interface_static: {:?} is not an interface type", iface_type);
            return;
        }
        let Some(node) = s.types.get_mut(&instance_type) else {
            warn!(target: "glib", "g_type_add_interface_static: invalid instance type");
            return;
        };
        if !node.class.is_null() {
            warn!(
                target: "glib",
                "cannot add interface to '{}' after its class was initialized", node.name
            );
            return;
        }
        if node.interfaces.iter().any(|(t, _)| *t == iface_type) {
            warn!(target: "glib", "interface already added to '{}'", node.name);
            return;
        }
        node.interfaces.push((iface_type, *info));
    });
}

// ========== CLASSES ==========

/// Make sure the class of `t` exists, running class and interface init hooks
/// on first use.
pub(crate) fn ensure_class(t: GType) -> GClassPtr {
    let _guard = class_init_lock().lock();

    let (existing, parent, classed) = with_state(|s| match s.types.get(&t) {
        Some(n) => (n.class, n.parent, n.fundamental == G_TYPE_OBJECT),
        None => (GClassPtr::NULL, G_TYPE_INVALID, false),
    });
    if !existing.is_null() {
        return existing;
    }
    if !classed {
        warn!(target: "glib", "cannot create class for unclassed type {:?}", t);
        return GClassPtr::NULL;
    }

    let parent_class = if parent == G_TYPE_INVALID {
        GClassPtr::NULL
    } else {
        ensure_class(parent)
    };

    let created = with_state(|s| {
        let vtable = s
            .classes
            .get(&parent_class)
            .map(|c| c.vtable)
            .unwrap_or_default();
        let class = GClassPtr::allocate();
        s.classes.insert(
            class,
            ClassNode {
                g_type: t,
                parent: parent_class,
                vtable,
                properties: Vec::new(),
                interfaces: Vec::new(),
            },
        );
        let node = s.types.get_mut(&t)?;
        node.class = class;
        Some((class, node.info.class_init, node.info.class_data, node.interfaces.clone()))
    });
    let Some((class, class_init, class_data, interfaces)) = created else {
        return GClassPtr::NULL;
    };

    if let Some(init) = class_init {
        unsafe { init(class, class_data) };
    }

    for (iface_type, info) in interfaces {
        let iface = GInterfacePtr::allocate();
        with_state(|s| {
            s.interfaces.insert(
                iface,
                InterfaceNode {
                    iface_type,
                    instance_type: t,
                },
            );
            if let Some(node) = s.classes.get_mut(&class) {
                node.interfaces.push((iface_type, iface));
            }
        });
        if let Some(init) = info.interface_init {
            unsafe { init(iface, info.interface_data) };
        }
    }

    class
}

/// The class of `t`, initializing it if needed.
pub fn g_type_class_ref(t: GType) -> GClassPtr {
    ensure_class(t)
}

/// The class of `t` if it has been initialized.
pub fn g_type_class_peek(t: GType) -> GClassPtr {
    with_state(|s| s.types.get(&t).map_or(GClassPtr::NULL, |n| n.class))
}

pub fn g_type_class_peek_parent(class: GClassPtr) -> GClassPtr {
    with_state(|s| s.classes.get(&class).map_or(GClassPtr::NULL, |c| c.parent))
}

pub fn g_type_from_class(class: GClassPtr) -> GType {
    with_state(|s| s.classes.get(&class).map_or(G_TYPE_INVALID, |c| c.g_type))
}

/// Reserve `size` bytes of per-instance private data for the class's type.
pub fn g_type_class_add_private(class: GClassPtr, size: usize) {
    with_state(|s| {
        let Some(t) = s.classes.get(&class).map(|c| c.g_type) else {
            warn!(target: "glib", "g_type_class_add_private: invalid class");
            return;
        };
        if let Some(node) = s.types.get_mut(&t) {
            node.private_size += size;
        }
    });
}

// ========== INSTANCE PRIVATE DATA ==========

/// Copy the private block `instance` holds for `private_type` into `out`.
pub fn g_type_instance_private_read(instance: GObjectPtr, private_type: GType, out: &mut [u8]) -> bool {
    with_state(|s| {
        let Some(block) = s
            .instances
            .get(&instance)
            .and_then(|i| i.private.get(&private_type))
        else {
            return false;
        };
        let n = out.len().min(block.len());
        out[..n].copy_from_slice(&block[..n]);
        n == out.len()
    })
}

/// Overwrite the start of the private block `instance` holds for `private_type`.
pub fn g_type_instance_private_write(instance: GObjectPtr, private_type: GType, bytes: &[u8]) -> bool {
    with_state(|s| {
        let Some(block) = s
            .instances
            .get_mut(&instance)
            .and_then(|i| i.private.get_mut(&private_type))
        else {
            return false;
        };
        if bytes.len() > block.len() {
            return false;
        }
        block[..bytes.len()].copy_from_slice(bytes);
        true
    })
}

// ========== INTERFACES ==========

/// The vtable of `iface_type` inside `class` or the nearest ancestor class.
pub fn g_type_interface_peek(class: GClassPtr, iface_type: GType) -> GInterfacePtr {
    with_state(|s| {
        let mut current = class;
        while let Some(node) = s.classes.get(&current) {
            if let Some((_, iface)) = node.interfaces.iter().find(|(t, _)| *t == iface_type) {
                return *iface;
            }
            current = node.parent;
        }
        GInterfacePtr::NULL
    })
}

pub fn g_type_interface_type(iface: GInterfacePtr) -> GType {
    with_state(|s| s.interfaces.get(&iface).map_or(G_TYPE_INVALID, |i| i.iface_type))
}

pub fn g_type_interface_instance_type(iface: GInterfacePtr) -> GType {
    with_state(|s| s.interfaces.get(&iface).map_or(G_TYPE_INVALID, |i| i.instance_type))
}

// ========== BOXED, ENUM AND FLAGS TYPES ==========

pub fn g_boxed_type_register_static(name: &str, copy: GBoxedCopyFunc, free: GBoxedFreeFunc) -> GType {
    with_state(|s| {
        *s.probes
            .type_registrations
            .entry(name.to_string())
            .or_default() += 1;
        let t = register_derived(s, G_TYPE_BOXED, name, GTypeInfo::default(), G_TYPE_FLAG_FINAL);
        if let Some(node) = s.types.get_mut(&t) {
            node.boxed = Some(BoxedFuncs { copy, free });
        }
        t
    })
}

pub fn g_enum_register_static(name: &str) -> GType {
    with_state(|s| register_derived(s, G_TYPE_ENUM, name, GTypeInfo::default(), G_TYPE_FLAG_FINAL))
}

pub fn g_flags_register_static(name: &str) -> GType {
    with_state(|s| register_derived(s, G_TYPE_FLAGS, name, GTypeInfo::default(), G_TYPE_FLAG_FINAL))
}

fn boxed_funcs(t: GType) -> Option<(GBoxedCopyFunc, GBoxedFreeFunc)> {
    with_state(|s| {
        s.types
            .get(&t)
            .and_then(|n| n.boxed.as_ref())
            .map(|b| (b.copy, b.free))
    })
}

/// Copy a boxed payload with its type's copy function.
pub fn g_boxed_copy(t: GType, boxed: usize) -> usize {
    match boxed_funcs(t) {
        Some((copy, _)) if boxed != 0 => unsafe { copy(boxed) },
        Some(_) => 0,
        None => {
            warn!(target: "glib", "g_boxed_copy: {:?} is not a boxed type", t);
            0
        }
    }
}

/// Release a boxed payload with its type's free function.
pub fn g_boxed_free(t: GType, boxed: usize) {
    match boxed_funcs(t) {
        Some((_, free)) if boxed != 0 => unsafe { free(boxed) },
        Some(_) => {}
        None => warn!(target: "glib", "g_boxed_free: {:?} is not a boxed type", t),
    }
}
