use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use glib_bridge::error::BridgeResult;
use glib_bridge::ffi::{self, probe};
use glib_bridge::object::Object;
use glib_bridge::param_spec::{ParamFlags, ParamSpec};
use glib_bridge::subclass::{
    ExtendsInitiallyUnowned, ExtendsObject, Hooks, Interface, ObjectClass, ObjectSubclass, TypeInstance,
    register_interface_type, register_type, registered_type,
};
use glib_bridge::types::Type;
use glib_bridge::value::{ToValue, Value, ValueRef};

use super::common::{Counter as Calls, setup, unique_name};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Counter {
    count: AtomicI32,
    label: Mutex<Option<String>>,
    init_ran: AtomicBool,
    count_when_constructed: AtomicI32,
}

fn counter_set(this: &Counter, _: &Object, index: usize, value: ValueRef<'_>, _: &ParamSpec) {
    match index {
        0 => this.count.store(value.get::<i32>().unwrap_or(-1), Ordering::SeqCst),
        1 => *this.label.lock().unwrap() = value.get::<Option<String>>().unwrap_or(None),
        _ => {}
    }
}

fn counter_get(this: &Counter, _: &Object, index: usize, _: &ParamSpec) -> BridgeResult<Value> {
    match index {
        0 => this.count.load(Ordering::SeqCst).to_value(),
        _ => this.label.lock().unwrap().clone().to_value(),
    }
}

impl ObjectSubclass for Counter {
    fn new() -> Self {
        Counter {
            count_when_constructed: AtomicI32::new(-1),
            ..Counter::default()
        }
    }

    fn class_init(class: &mut ObjectClass) {
        let count = ParamSpec::int(
            "count",
            "Count",
            "Current count",
            0,
            100,
            5,
            ParamFlags::READWRITE | ParamFlags::CONSTRUCT,
        )
        .unwrap();
        let label = ParamSpec::string("label", "Label", "", None, ParamFlags::READWRITE).unwrap();
        class.install_properties(&[count, label]).unwrap();
    }

    fn hooks() -> Hooks<Self> {
        Hooks {
            set_property: Some(counter_set),
            property: Some(counter_get),
            instance_init: Some(|this, _| this.init_ran.store(true, Ordering::SeqCst)),
            constructed: Some(|this, _| {
                this.count_when_constructed
                    .store(this.count.load(Ordering::SeqCst), Ordering::SeqCst)
            }),
            finalize: None,
        }
    }
}

fn counter_type() -> Type {
    register_type::<Counter>("BridgeTestCounter", ExtendsObject, Vec::new()).unwrap()
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_registration_is_idempotent() {
    setup();
    struct Once;
    impl ObjectSubclass for Once {
        fn new() -> Self {
            Once
        }
    }

    let name = unique_name("BridgeOnce");
    let first = register_type::<Once>(&name, ExtendsObject, Vec::new()).unwrap();
    let second = register_type::<Once>(&name, ExtendsObject, Vec::new()).unwrap();
    let renamed = register_type::<Once>("SomethingElse", ExtendsObject, Vec::new()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, renamed);
    assert_eq!(registered_type::<Once>(), Some(first));
    assert_eq!(probe::type_registrations(&name), 1);
    assert_eq!(probe::type_registrations("SomethingElse"), 0);
}

#[test]
fn test_concurrent_registration_registers_once() {
    setup();
    struct Racer;
    impl ObjectSubclass for Racer {
        fn new() -> Self {
            Racer
        }
    }

    let name = unique_name("BridgeRacer");
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let name = name.clone();
            thread::spawn(move || register_type::<Racer>(&name, ExtendsObject, Vec::new()).unwrap())
        })
        .collect();
    let types: Vec<Type> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(types.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(probe::type_registrations(&name), 1);
}

#[test]
fn test_duplicate_native_name_is_rejected() {
    setup();
    struct First;
    impl ObjectSubclass for First {
        fn new() -> Self {
            First
        }
    }
    struct Second;
    impl ObjectSubclass for Second {
        fn new() -> Self {
            Second
        }
    }

    let name = unique_name("BridgeClash");
    register_type::<First>(&name, ExtendsObject, Vec::new()).unwrap();
    assert!(register_type::<Second>(&name, ExtendsObject, Vec::new()).is_err());
    assert_eq!(registered_type::<Second>(), None);
}

#[test]
fn test_unregistered_type_has_no_instance() {
    setup();
    let obj = Object::new(counter_type(), &[]).unwrap();
    struct Stranger;
    impl ObjectSubclass for Stranger {
        fn new() -> Self {
            Stranger
        }
    }
    assert!(obj.instance::<Stranger>().is_none());
}

// ============================================================================
// Instances and properties
// ============================================================================

#[test]
fn test_instance_is_attached_and_initialized() {
    setup();
    let obj = Object::new(counter_type(), &[]).unwrap();
    let counter = obj.instance::<Counter>().unwrap();
    assert!(counter.init_ran.load(Ordering::SeqCst));
}

#[test]
fn test_construct_property_defaults_before_constructed() {
    setup();
    let obj = Object::new(counter_type(), &[]).unwrap();
    let counter = obj.instance::<Counter>().unwrap();
    assert_eq!(counter.count.load(Ordering::SeqCst), 5);
    assert_eq!(counter.count_when_constructed.load(Ordering::SeqCst), 5);

    let obj = Object::new(counter_type(), &[("count", &9i32)]).unwrap();
    let counter = obj.instance::<Counter>().unwrap();
    assert_eq!(counter.count_when_constructed.load(Ordering::SeqCst), 9);
}

#[test]
fn test_properties_route_through_hooks() {
    setup();
    let obj = Object::new(counter_type(), &[]).unwrap();
    obj.set_property("count", &42i32).unwrap();
    obj.set_property("label", &"hello").unwrap();

    assert_eq!(obj.property_as::<i32>("count").unwrap(), 42);
    assert_eq!(obj.property_as::<String>("label").unwrap(), "hello");
    assert_eq!(obj.instance::<Counter>().unwrap().count.load(Ordering::SeqCst), 42);

    let managed = obj.property_managed("count").unwrap();
    assert_eq!(*managed.downcast::<i32>().unwrap(), 42);
    assert_eq!(obj.property_type("label").unwrap(), Type::STRING);
}

#[test]
fn test_property_id_zero_never_reaches_hooks() {
    setup();
    let obj = Object::new(counter_type(), &[]).unwrap();
    let pspec = obj.find_property("count").unwrap();
    let vtable = ffi::g_object_class_get_vtable(obj.class().as_ptr()).unwrap();
    let set = vtable.set_property.unwrap();
    let get = vtable.get_property.unwrap();

    let value = 77i32.to_value().unwrap();
    unsafe { set(obj.as_ptr(), 0, value.as_raw(), pspec.as_ptr()) };
    assert_eq!(obj.instance::<Counter>().unwrap().count.load(Ordering::SeqCst), 5);

    let mut out = Value::new(Type::INT).unwrap();
    unsafe { get(obj.as_ptr(), 0, out.as_raw_mut(), pspec.as_ptr()) };
    assert_eq!(out.get::<i32>().unwrap(), 0);

    unsafe { set(obj.as_ptr(), 1, value.as_raw(), pspec.as_ptr()) };
    assert_eq!(obj.property_as::<i32>("count").unwrap(), 77);
}

#[test]
fn test_property_type_is_checked_before_native_call() {
    setup();
    let obj = Object::new(counter_type(), &[]).unwrap();
    assert!(obj.set_property("count", &"many").is_err());
    assert!(obj.set_property("count", &7u64).is_err());
    assert_eq!(obj.property_as::<i32>("count").unwrap(), 5);
}

#[test]
fn test_set_property_emits_notify() {
    setup();
    let obj = Object::new(counter_type(), &[]).unwrap();
    let notified = Calls::new();
    let n = notified.clone();
    obj.connect("notify::count", move |_: Object, pspec: ParamSpec| {
        assert_eq!(pspec.name(), "count");
        n.hit();
    })
    .unwrap();

    obj.set_property("count", &1i32).unwrap();
    obj.set_property("label", &"ignored").unwrap();
    assert_eq!(notified.get(), 1);
}

#[test]
fn test_class_lists_installed_properties() {
    setup();
    let class = ObjectClass::of(counter_type()).unwrap();
    let names: Vec<String> = class.list_properties().iter().map(ParamSpec::name).collect();
    assert!(names.contains(&"count".to_string()));
    assert!(names.contains(&"label".to_string()));

    let count = class.find_property("count").unwrap();
    assert_eq!(count.owner_type(), counter_type());
    assert_eq!(count.default_value().unwrap().get::<i32>().unwrap(), 5);
}

// ============================================================================
// Capability probing
// ============================================================================

#[test]
fn test_only_provided_hooks_are_patched() {
    setup();
    struct Plain;
    impl ObjectSubclass for Plain {
        fn new() -> Self {
            Plain
        }
    }
    let t = register_type::<Plain>(&unique_name("BridgePlain"), ExtendsObject, Vec::new()).unwrap();
    let plain = ffi::g_object_class_get_vtable(ObjectClass::of(t).unwrap().as_ptr()).unwrap();
    let base = ffi::g_object_class_get_vtable(ObjectClass::of(Type::OBJECT).unwrap().as_ptr()).unwrap();

    assert_eq!(
        plain.set_property.map(|f| f as usize),
        base.set_property.map(|f| f as usize)
    );
    assert_eq!(
        plain.get_property.map(|f| f as usize),
        base.get_property.map(|f| f as usize)
    );
    assert_eq!(
        plain.constructed.map(|f| f as usize),
        base.constructed.map(|f| f as usize)
    );
    assert_ne!(plain.finalize.map(|f| f as usize), base.finalize.map(|f| f as usize));

    let counter = ffi::g_object_class_get_vtable(ObjectClass::of(counter_type()).unwrap().as_ptr()).unwrap();
    assert_ne!(
        counter.set_property.map(|f| f as usize),
        base.set_property.map(|f| f as usize)
    );
}

#[test]
fn test_panicking_hook_is_contained() {
    setup();
    struct Fragile;
    impl ObjectSubclass for Fragile {
        fn new() -> Self {
            Fragile
        }

        fn class_init(class: &mut ObjectClass) {
            let value = ParamSpec::int("value", "", "", 0, 10, 0, ParamFlags::READWRITE).unwrap();
            class.install_properties(&[value]).unwrap();
        }

        fn hooks() -> Hooks<Self> {
            Hooks {
                set_property: Some(|_, _, _, _, _| panic!("setter exploded")),
                property: Some(|_, _, _, _| panic!("getter exploded")),
                ..Hooks::default()
            }
        }
    }
    let t = register_type::<Fragile>(&unique_name("BridgeFragile"), ExtendsObject, Vec::new()).unwrap();
    let obj = Object::new(t, &[]).unwrap();

    obj.set_property("value", &3i32).unwrap();
    assert_eq!(obj.property_as::<i32>("value").unwrap(), 0);
    assert!(obj.is_valid());
}

// ============================================================================
// Teardown
// ============================================================================

static TEARDOWN_FINALIZED: AtomicBool = AtomicBool::new(false);
static TEARDOWN_DROPPED: AtomicBool = AtomicBool::new(false);

struct Tracked;

impl Drop for Tracked {
    fn drop(&mut self) {
        TEARDOWN_DROPPED.store(true, Ordering::SeqCst);
    }
}

impl ObjectSubclass for Tracked {
    fn new() -> Self {
        Tracked
    }

    fn hooks() -> Hooks<Self> {
        Hooks {
            finalize: Some(|_, _| TEARDOWN_FINALIZED.store(true, Ordering::SeqCst)),
            ..Hooks::default()
        }
    }
}

#[test]
fn test_managed_finalizer_runs_before_memory_release() {
    setup();
    let t = register_type::<Tracked>("BridgeTestTracked", ExtendsObject, Vec::new()).unwrap();
    let obj = Object::new(t, &[]).unwrap();
    let ptr = obj.as_ptr();

    let checked = Arc::new(AtomicUsize::new(0));
    let c = checked.clone();
    probe::on_instance_free(ptr, move || {
        assert!(TEARDOWN_FINALIZED.load(Ordering::SeqCst), "finalize hook ran after release");
        assert!(TEARDOWN_DROPPED.load(Ordering::SeqCst), "instance handle outlived the object");
        c.fetch_add(1, Ordering::SeqCst);
    });

    drop(obj);
    assert_eq!(checked.load(Ordering::SeqCst), 1);
    assert!(probe::instance(ptr).freed);
}

static HIERARCHY_LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

fn log(entry: &'static str) {
    HIERARCHY_LOG.lock().unwrap().push(entry);
}

struct Base;

impl ObjectSubclass for Base {
    fn new() -> Self {
        Base
    }

    fn hooks() -> Hooks<Self> {
        Hooks {
            constructed: Some(|_, _| log("base constructed")),
            finalize: Some(|_, _| log("base finalize")),
            ..Hooks::default()
        }
    }
}

struct Derived;

impl ObjectSubclass for Derived {
    fn new() -> Self {
        Derived
    }

    fn hooks() -> Hooks<Self> {
        Hooks {
            constructed: Some(|_, _| log("derived constructed")),
            finalize: Some(|_, _| log("derived finalize")),
            ..Hooks::default()
        }
    }
}

#[test]
fn test_managed_hierarchy_constructs_down_and_finalizes_up() {
    setup();
    let base = register_type::<Base>("BridgeTestBase", ExtendsObject, Vec::new()).unwrap();
    let derived = register_type::<Derived>("BridgeTestDerived", base, Vec::new()).unwrap();
    assert_eq!(derived.parent(), Some(base));

    let obj = Object::new(derived, &[]).unwrap();
    assert!(obj.instance::<Base>().is_some());
    assert!(obj.instance::<Derived>().is_some());
    let ptr = obj.as_ptr();
    probe::on_instance_free(ptr, || log("memory released"));

    drop(obj);
    assert_eq!(
        *HIERARCHY_LOG.lock().unwrap(),
        vec![
            "base constructed",
            "derived constructed",
            "derived finalize",
            "base finalize",
            "memory released",
        ]
    );
}

#[test]
fn test_initially_unowned_subclass_starts_floating() {
    setup();
    struct Widget;
    impl ObjectSubclass for Widget {
        fn new() -> Self {
            Widget
        }
    }
    let t = register_type::<Widget>(&unique_name("BridgeWidget"), ExtendsInitiallyUnowned, Vec::new()).unwrap();
    assert!(t.is_a(Type::INITIALLY_UNOWNED));

    let raw = ffi::g_object_new(t.into_glib());
    assert!(ffi::g_object_is_floating(raw));
    let obj = Object::adopt(raw).unwrap();
    assert!(!obj.is_floating());
    assert!(obj.instance::<Widget>().is_some());
}

// ============================================================================
// Interfaces
// ============================================================================

struct Greeter {
    iface: Type,
    inits: Arc<Mutex<Vec<(Type, Type)>>>,
}

impl Interface for Greeter {
    fn type_(&self) -> Type {
        self.iface
    }

    fn init(&self, instance: &TypeInstance) {
        assert!(!instance.interface.is_null());
        self.inits
            .lock()
            .unwrap()
            .push((instance.type_, instance.class.type_()));
    }
}

#[test]
fn test_interface_init_receives_owning_type_and_class() {
    setup();
    struct Polite;
    impl ObjectSubclass for Polite {
        fn new() -> Self {
            Polite
        }
    }

    let iface = register_interface_type(&unique_name("BridgeGreeter")).unwrap();
    let inits = Arc::new(Mutex::new(Vec::new()));
    let greeter = Greeter {
        iface,
        inits: inits.clone(),
    };
    let t = register_type::<Polite>(&unique_name("BridgePolite"), ExtendsObject, vec![Arc::new(greeter)]).unwrap();

    let obj = Object::new(t, &[]).unwrap();
    assert_eq!(*inits.lock().unwrap(), vec![(t, t)]);
    assert!(obj.interfaces().contains(&iface));
    assert!(t.is_a(iface));

    // The class is initialized once, so is the interface.
    let _again = Object::new(t, &[]).unwrap();
    assert_eq!(inits.lock().unwrap().len(), 1);
}

#[test]
fn test_panicking_finalize_still_releases_memory() {
    setup();
    struct Brittle;
    impl ObjectSubclass for Brittle {
        fn new() -> Self {
            Brittle
        }

        fn hooks() -> Hooks<Self> {
            Hooks {
                finalize: Some(|_, _| panic!("finalize exploded")),
                ..Hooks::default()
            }
        }
    }
    let t = register_type::<Brittle>(&unique_name("BridgeBrittle"), ExtendsObject, Vec::new()).unwrap();
    let obj = Object::new(t, &[]).unwrap();
    let ptr = obj.as_ptr();

    drop(obj);
    assert!(probe::instance(ptr).freed);
}

static STURDY_CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);
static STURDY_FINALIZED: AtomicUsize = AtomicUsize::new(0);

struct Sturdy;

impl ObjectSubclass for Sturdy {
    fn new() -> Self {
        Sturdy
    }

    fn hooks() -> Hooks<Self> {
        Hooks {
            constructed: Some(|_, _| {
                STURDY_CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
            }),
            finalize: Some(|_, _| {
                STURDY_FINALIZED.fetch_add(1, Ordering::SeqCst);
            }),
            ..Hooks::default()
        }
    }
}

struct Shaky;

impl ObjectSubclass for Shaky {
    fn new() -> Self {
        Shaky
    }

    fn hooks() -> Hooks<Self> {
        Hooks {
            constructed: Some(|_, _| panic!("derived constructed exploded")),
            finalize: Some(|_, _| panic!("derived finalize exploded")),
            ..Hooks::default()
        }
    }
}

#[test]
fn test_panicking_level_does_not_stop_the_chain() {
    setup();
    let base = register_type::<Sturdy>(&unique_name("BridgeSturdy"), ExtendsObject, Vec::new()).unwrap();
    let derived = register_type::<Shaky>(&unique_name("BridgeShaky"), base, Vec::new()).unwrap();

    let obj = Object::new(derived, &[]).unwrap();
    assert_eq!(STURDY_CONSTRUCTED.load(Ordering::SeqCst), 1);
    let ptr = obj.as_ptr();

    drop(obj);
    assert_eq!(STURDY_FINALIZED.load(Ordering::SeqCst), 1);
    assert!(probe::instance(ptr).freed);
}
