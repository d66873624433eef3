//! Opaque handles standing in for Rust values inside native memory.
//!
//! Native structures can only hold integers, so any Rust value that must be
//! reachable from native callbacks is parked in a process-wide registry and
//! addressed by an [`OpaqueHandle`]. The registry keeps the value alive until
//! the handle is released.
//!
//! Handles are generational: a released slot is reused with a bumped
//! generation, so a stale handle never resolves to someone else's value.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::error;

use crate::config::{InvalidHandlePolicy, handle_policy};
use crate::error::{BridgeError, BridgeResult};

/// Integer key into the handle registry. Zero is never a valid handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueHandle(u64);

impl OpaqueHandle {
    pub const NULL: OpaqueHandle = OpaqueHandle(0);

    fn new(index: u32, generation: u32) -> Self {
        OpaqueHandle((u64::from(generation) << 32) | (u64::from(index) + 1))
    }

    fn index(self) -> Option<usize> {
        let low = (self.0 & 0xffff_ffff) as usize;
        low.checked_sub(1)
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }

    pub fn from_raw(raw: u64) -> Self {
        OpaqueHandle(raw)
    }

    /// The handle as a pointer-sized word, for native user-data slots.
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub fn from_usize(raw: usize) -> Self {
        OpaqueHandle(raw as u64)
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            Some(index) => write!(f, "OpaqueHandle({}@{})", index, self.generation()),
            None => f.write_str("OpaqueHandle(null)"),
        }
    }
}

type Payload = Arc<dyn Any + Send + Sync>;

struct HandleSlot {
    generation: u32,
    value: Option<Payload>,
}

#[derive(Default)]
struct HandleRegistry {
    slots: Vec<HandleSlot>,
    free_list: Vec<u32>,
    live: usize,
}

impl HandleRegistry {
    fn insert(&mut self, value: Payload) -> OpaqueHandle {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return OpaqueHandle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(HandleSlot {
            generation: 0,
            value: Some(value),
        });
        OpaqueHandle::new(index, 0)
    }

    fn get(&self, handle: OpaqueHandle) -> Option<&Payload> {
        let slot = self.slots.get(handle.index()?)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    fn remove(&mut self, handle: OpaqueHandle) -> Option<Payload> {
        let index = handle.index()?;
        let slot = self.slots.get_mut(index)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index as u32);
        self.live -= 1;
        Some(value)
    }
}

static HANDLES: OnceLock<RwLock<HandleRegistry>> = OnceLock::new();

fn global() -> &'static RwLock<HandleRegistry> {
    HANDLES.get_or_init(|| RwLock::new(HandleRegistry::default()))
}

fn invalid(handle: OpaqueHandle, operation: &str) -> BridgeError {
    match handle_policy() {
        InvalidHandlePolicy::Panic => {
            panic!("{} of invalid handle {:?}", operation, handle)
        }
        InvalidHandlePolicy::Report => {
            error!(target: "glib_bridge::handle", "{} of invalid handle {:?}", operation, handle);
            BridgeError::HandleInvalid {
                handle: handle.as_raw(),
            }
        }
    }
}

/// Park `value` in the registry.
pub fn insert<T: Any + Send + Sync>(value: T) -> BridgeResult<OpaqueHandle> {
    insert_arc(Arc::new(value))
}

/// Park an already shared value in the registry.
pub fn insert_arc(value: Arc<dyn Any + Send + Sync>) -> BridgeResult<OpaqueHandle> {
    Ok(global().write()?.insert(value))
}

/// Resolve a handle to its value.
pub fn get(handle: OpaqueHandle) -> BridgeResult<Arc<dyn Any + Send + Sync>> {
    let found = global().read()?.get(handle).cloned();
    found.ok_or_else(|| invalid(handle, "deref"))
}

/// Resolve a handle and downcast its value.
pub fn get_as<T: Any + Send + Sync>(handle: OpaqueHandle) -> BridgeResult<Arc<T>> {
    get(handle)?
        .downcast::<T>()
        .map_err(|_| BridgeError::type_mismatch(type_name::<T>(), "another handle payload"))
}

/// A second, independently releasable handle to the same value.
pub fn duplicate(handle: OpaqueHandle) -> BridgeResult<OpaqueHandle> {
    let value = get(handle)?;
    insert_arc(value)
}

/// Release a handle. The value is dropped once no other handle or clone
/// refers to it. Releasing twice is reported per the configured
/// [`InvalidHandlePolicy`].
pub fn release(handle: OpaqueHandle) -> BridgeResult<()> {
    let removed = global().write()?.remove(handle);
    match removed {
        // Drop the payload after the lock is gone: its destructor may
        // release other handles.
        Some(value) => {
            drop(value);
            Ok(())
        }
        None => Err(invalid(handle, "release")),
    }
}

pub fn contains(handle: OpaqueHandle) -> bool {
    global()
        .read()
        .map(|r| r.get(handle).is_some())
        .unwrap_or(false)
}

/// Number of handles currently live.
pub fn live_count() -> usize {
    global().read().map(|r| r.live).unwrap_or(0)
}
