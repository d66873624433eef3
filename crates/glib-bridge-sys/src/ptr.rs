//! Address-like handles for native structures.
//!
//! Every native structure is addressed by an integer. Zero is null and
//! addresses are never handed out twice within a process, so a stale address
//! can always be told apart from a live one.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ADDRESS: AtomicUsize = AtomicUsize::new(0x10_0000);

/// Allocate a fresh, never reused address.
pub(crate) fn next_address() -> usize {
    NEXT_ADDRESS.fetch_add(0x10, Ordering::Relaxed)
}

macro_rules! native_ptr {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        #[repr(transparent)]
        pub struct $name(pub usize);

        impl $name {
            /// The null address.
            pub const NULL: Self = Self(0);

            pub fn is_null(self) -> bool {
                self.0 == 0
            }

            pub fn addr(self) -> usize {
                self.0
            }

            pub(crate) fn allocate() -> Self {
                Self(next_address())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }
    };
}

native_ptr!(
    /// A `GObject *` instance.
    GObjectPtr
);
native_ptr!(
    /// A `GObjectClass *` class structure.
    GClassPtr
);
native_ptr!(
    /// A `GClosure *`.
    GClosurePtr
);
native_ptr!(
    /// A `GParamSpec *`.
    GParamSpecPtr
);
native_ptr!(
    /// A `GSource *`.
    GSourcePtr
);
native_ptr!(
    /// A `GTypeInterface *` vtable belonging to one class.
    GInterfacePtr
);
