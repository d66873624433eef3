//! In-process object system runtime.
//!
//! A GObject-shaped type system exposed through the raw, C-style surface the
//! bridge is written against: integer type ids, address-like pointers,
//! `unsafe extern "C"` callbacks and tagged `GValue`s. All state is
//! process-wide.
//!
//! The [`probe`] module exposes counters tests use to observe reference
//! traffic and emissions.

pub mod callbacks;
pub mod gclosure;
pub mod gmain;
pub mod gobject;
pub mod gparam;
pub mod gquark;
pub mod gsignal;
pub mod gtype;
pub mod gvalue;
pub mod probe;
pub mod ptr;

mod state;

pub use callbacks::*;
pub use gclosure::*;
pub use gmain::*;
pub use gobject::*;
pub use gparam::*;
pub use gquark::*;
pub use gsignal::*;
pub use gtype::*;
pub use gvalue::*;
pub use ptr::*;
