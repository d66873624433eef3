//! A bridge between Rust and a GObject-style native object system.
//!
//! The crate wraps native instances, values, closures and signals in owned
//! Rust types, lets Rust types subclass native object types, and routes
//! every native callback through guarded trampolines that resolve Rust
//! state from integer handles.
//!
//! Call [`init`] once at startup to install configuration and logging from
//! the environment. Everything works without it; only log output and the
//! invalid-handle policy depend on it.

pub mod boxed;
pub mod closure;
pub mod config;
pub mod error;
pub mod handle;
mod internal;
pub mod logging;
pub mod main_loop;
pub mod object;
pub mod param_spec;
pub mod signal;
pub mod subclass;
pub mod types;
pub mod value;

pub use glib_bridge_sys as ffi;

/// Install configuration and logging read from the environment.
pub fn init() {
    let config = config::BridgeConfig::from_env();
    logging::init_with_config(config.log.clone());
    config::install(config);
}

pub mod prelude {
    pub use crate::boxed::ArbitraryValue;
    pub use crate::closure::{Callable, Closure, IntoCallable};
    pub use crate::error::{BridgeError, BridgeResult};
    pub use crate::handle::OpaqueHandle;
    pub use crate::main_loop::{MainContext, SourceId, idle_add, source_remove, timeout_add};
    pub use crate::object::Object;
    pub use crate::param_spec::{ParamFlags, ParamSpec};
    pub use crate::signal::{Accumulator, SignalBuilder, SignalFlags, SignalHandlerId, SignalId};
    pub use crate::subclass::{
        ExtendsInitiallyUnowned, ExtendsObject, Hooks, ObjectClass, ObjectSubclass, register_type,
    };
    pub use crate::types::{StaticType, Type};
    pub use crate::value::{AnyValue, FromValue, ToValue, Value, ValueMut, ValueRef};
}
