//! Arbitrary Rust values carried as a native boxed type.
//!
//! The boxed payload is an [`OpaqueHandle`]: copying the boxed value
//! duplicates the handle and freeing it releases the handle, so the Rust
//! value lives exactly as long as some native copy does.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use glib_bridge_sys as ffi;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{self, OpaqueHandle};
use crate::internal::guard::isolate;
use crate::types::Type;
use crate::value::marshal::{TransformFn, TypeMarshaler};
use crate::value::{FromValue, ToValue, Value};

const TYPE_NAME: &str = "GBridgeArbitraryValue";

#[derive(Clone)]
pub struct ArbitraryValue(pub Arc<dyn Any + Send + Sync>);

unsafe extern "C" fn copy_trampoline(boxed: usize) -> usize {
    isolate("arbitrary value copy", || {
        handle::duplicate(OpaqueHandle::from_usize(boxed))
            .map(OpaqueHandle::as_usize)
            .unwrap_or(0)
    })
    .unwrap_or(0)
}

unsafe extern "C" fn free_trampoline(boxed: usize) {
    isolate("arbitrary value free", || {
        let _ = handle::release(OpaqueHandle::from_usize(boxed));
    });
}

impl ArbitraryValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        ArbitraryValue(Arc::new(value))
    }

    /// The registered boxed type. Registration happens once, on first use.
    pub fn static_type() -> Type {
        static TYPE: OnceLock<Type> = OnceLock::new();
        *TYPE.get_or_init(|| {
            Type::from_glib(ffi::g_boxed_type_register_static(
                TYPE_NAME,
                copy_trampoline,
                free_trampoline,
            ))
        })
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for ArbitraryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArbitraryValue").finish_non_exhaustive()
    }
}

impl ToValue for ArbitraryValue {
    fn value_type(&self) -> Type {
        ArbitraryValue::static_type()
    }

    fn to_value(&self) -> BridgeResult<Value> {
        let mut value = Value::new(ArbitraryValue::static_type())?;
        let h = handle::insert_arc(self.0.clone())?;
        if let Err(e) = value.take_boxed(h.as_usize()) {
            let _ = handle::release(h);
            return Err(e);
        }
        Ok(value)
    }
}

impl FromValue for ArbitraryValue {
    fn from_value(value: &ffi::GValue) -> BridgeResult<Self> {
        let t = Type::from_glib(value.value_type());
        if !t.is_a(ArbitraryValue::static_type()) {
            return Err(BridgeError::type_mismatch(TYPE_NAME, t.name()));
        }
        let boxed = value.get_boxed();
        if boxed == 0 {
            return Err(BridgeError::NullPointer);
        }
        Ok(ArbitraryValue(handle::get(OpaqueHandle::from_usize(boxed))?))
    }
}

/// The marshaler and transformer pre-registered for [`ArbitraryValue`].
pub(crate) fn arbitrary_value_converters() -> (TypeMarshaler, TransformFn) {
    let marshaler = TypeMarshaler::new(ArbitraryValue::static_type(), |v| {
        Ok(Box::new(ArbitraryValue::from_value(v)?))
    });
    let transform: TransformFn = Arc::new(|any: &dyn Any| match any.downcast_ref::<ArbitraryValue>() {
        Some(v) => v.to_value(),
        None => Err(BridgeError::unsupported(TYPE_NAME)),
    });
    (marshaler, transform)
}
