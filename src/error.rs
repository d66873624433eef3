use std::sync::PoisonError;

use thiserror::Error;

use crate::types::Type;

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Unsupported type: no conversion for '{type_name}'")]
    UnsupportedType { type_name: String },

    #[error("No marshaler registered for type {0}")]
    NoMarshaler(Type),

    #[error("Signal '{name}' not found")]
    EventNotFound { name: String },

    #[error("Argument mismatch: {message}")]
    ArgumentMismatch { message: String },

    #[error("Invalid handle {handle:#x}")]
    HandleInvalid { handle: u64 },

    #[error("Allocation failed: {what}")]
    AllocationFailed { what: String },

    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Null pointer")]
    NullPointer,

    #[error("Invalid object instance")]
    InvalidInstance,

    #[error("Property '{name}' not found")]
    PropertyNotFound { name: String },

    #[error("Signal handler {id} not found")]
    HandlerNotFound { id: u64 },

    #[error("Failed to register '{name}': {reason}")]
    RegistrationFailed { name: String, reason: String },

    #[error("Registry lock poisoned")]
    LockPoisoned,
}

impl BridgeError {
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        BridgeError::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    pub fn argument_count(what: &str, expected: usize, got: usize) -> Self {
        BridgeError::ArgumentMismatch {
            message: format!("{} expects {} arguments, got {}", what, expected, got),
        }
    }

    pub fn argument_type(what: &str, index: usize, expected: Type, got: Type) -> Self {
        BridgeError::ArgumentMismatch {
            message: format!(
                "argument {} of {} has type {}, expected {}",
                index, what, got, expected
            ),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        BridgeError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn registration(name: &str, reason: impl Into<String>) -> Self {
        BridgeError::RegistrationFailed {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a caller mistake rather than a runtime failure.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BridgeError::EventNotFound { .. }
                | BridgeError::ArgumentMismatch { .. }
                | BridgeError::PropertyNotFound { .. }
                | BridgeError::TypeMismatch { .. }
        )
    }
}

impl<T> From<PoisonError<T>> for BridgeError {
    fn from(_: PoisonError<T>) -> Self {
        BridgeError::LockPoisoned
    }
}
