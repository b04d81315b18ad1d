//! Error types for the binding layer.
//!
//! Errors are split by phase, the same way the runtime splits registration
//! from execution:
//!
//! ```text
//! BindError (top-level wrapper)
//! ├── RegistrationError - raised while types are being defined; fatal to startup
//! └── CallError         - raised while a script calls into a binding; reported to the caller
//!     └── ConversionError (converted in via From)
//! ```

use thiserror::Error;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while registering types, members and functions.
///
/// These indicate a programming error in the embedding application and are
/// expected to abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The native type already has a descriptor in this registry.
    #[error("type '{rust_type}' is already registered as '{existing}'")]
    DuplicateType {
        rust_type: &'static str,
        existing: String,
    },

    /// Another native type already uses this script name.
    #[error("type name '{0}' is already taken")]
    DuplicateTypeName(String),

    /// An overload with the same name and arity already exists on this owner.
    #[error("'{owner}.{name}' already has an overload taking {arity} argument(s)")]
    DuplicateOverload {
        owner: String,
        name: String,
        arity: usize,
    },

    /// A derived type named a base that has not been registered.
    #[error("base type '{base}' of '{derived}' is not registered")]
    BaseNotRegistered { derived: String, base: &'static str },

    /// The type being extended has no descriptor.
    #[error("type '{0}' is not registered")]
    TypeNotFound(String),

    /// The name is empty or contains a namespace separator.
    #[error("invalid name '{0}'")]
    InvalidName(String),

    /// Registration was attempted after the registry was sealed.
    #[error("cannot register '{0}': registration is closed")]
    Sealed(String),
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// Errors converting between script values and primitive Rust values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion.
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Integer value out of range for target type.
    #[error("integer {value} out of range for {target_type}")]
    IntegerOverflow {
        value: i64,
        target_type: &'static str,
    },

    /// Float value cannot be represented in the target type.
    #[error("float {value} cannot be converted to {target_type}")]
    FloatConversion {
        value: f64,
        target_type: &'static str,
    },
}

// ============================================================================
// Call Errors
// ============================================================================

/// Errors raised while a script call is being dispatched into native code.
///
/// All of these are recoverable: the dispatcher returns them to the calling
/// script and the runtime keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// No overload of `name` takes `arity` arguments.
    #[error("no overload of '{name}' takes {arity} argument(s) (available: {available:?})")]
    NoMatchingOverload {
        name: String,
        arity: usize,
        available: Vec<usize>,
    },

    /// A value had the wrong type for the slot it was passed to.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// The handle no longer refers to a live native instance.
    #[error("stale handle: instance at slot {index} is no longer bound")]
    StaleHandle { index: u32 },

    /// The class has no member with this name.
    #[error("'{type_name}' has no member '{member}'")]
    MemberNotFound { type_name: String, member: String },

    /// The member can be read but not written.
    #[error("'{type_name}.{member}' is read-only")]
    ReadOnly { type_name: String, member: String },

    /// The member exists but is a value, not a function.
    #[error("'{0}' is not callable")]
    NotCallable(String),

    /// The type was registered without a copy function.
    #[error("type '{0}' cannot be cloned")]
    NotCopyable(String),

    /// A receiver was required but the value is not an instance.
    #[error("expected an instance, got {actual}")]
    NotAnObject { actual: &'static str },

    /// No type is registered under this name or for this native type.
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// No function is registered under this name or hash.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// Argument index out of bounds.
    #[error("argument index {index} out of bounds (count: {count})")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// The native instance is already borrowed by an outer call.
    #[error("instance of '{type_name}' is already borrowed")]
    AlreadyBorrowed { type_name: String },

    /// The pending-task queue is full.
    #[error("pending task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Error raised by the bound native code itself.
    #[error("{message}")]
    Native { message: String },
}

impl CallError {
    /// Create an error raised by native code.
    pub fn native(message: impl Into<String>) -> Self {
        CallError::Native {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        CallError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<ConversionError> for CallError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::TypeMismatch { expected, actual } => {
                CallError::type_mismatch(expected, actual)
            }
            other => CallError::native(other.to_string()),
        }
    }
}

// ============================================================================
// Unified Error
// ============================================================================

/// Any error the binding layer can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Call(#[from] CallError),
}
