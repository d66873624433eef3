//! Shared fixtures for the bridge integration tests.
//!
//! Every test runs against the same process-wide native runtime, so types
//! are registered under unique names and counters are per test.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glib_bridge::ffi;
use glib_bridge::logging::{self, LogConfig};
use glib_bridge::types::Type;

static NEXT_NAME: AtomicUsize = AtomicUsize::new(0);

/// Install quiet logging once.
pub fn setup() {
    logging::init_with_config(LogConfig::default());
}

/// A type name no other test uses.
pub fn unique_name(prefix: &str) -> String {
    format!("{}{}", prefix, NEXT_NAME.fetch_add(1, Ordering::SeqCst))
}

/// Register a plain native subtype of `parent` with no hooks.
pub fn native_type(prefix: &str, parent: Type) -> Type {
    let t = Type::from_glib(ffi::g_type_register_static(
        parent.into_glib(),
        &unique_name(prefix),
        &ffi::GTypeInfo::default(),
        0,
    ));
    assert!(t.is_valid(), "registering {} failed", prefix);
    t
}

pub fn object_type(prefix: &str) -> Type {
    native_type(prefix, Type::OBJECT)
}

pub fn unowned_type(prefix: &str) -> Type {
    native_type(prefix, Type::INITIALLY_UNOWNED)
}

/// A shared call counter for handlers.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add(&self, n: usize) {
        self.0.fetch_add(n, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
