//! Script-side value type passed across the binding boundary.

use std::fmt;

use crate::{ObjectHandle, TypeHash};

/// A value as the script runtime sees it.
///
/// Arguments, return values and static values all travel as `Dynamic`.
/// Native objects never appear inline; they are referenced through an
/// [`ObjectHandle`] into the script heap.
#[derive(Clone, PartialEq, Default)]
pub enum Dynamic {
    /// Null / no value
    #[default]
    Null,
    /// Integer value (every integer width is stored as i64)
    Int(i64),
    /// Floating point value (f32 and f64 are stored as f64)
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value (owned)
    String(String),
    /// Strong reference to a bound native instance
    Object(ObjectHandle),
    /// Weak reference to a bound native instance
    WeakRef(ObjectHandle),
    /// Reference to a registered free function, identified by hash
    Function(TypeHash),
}

impl Dynamic {
    /// Get a human-readable name for this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "float",
            Dynamic::Bool(_) => "bool",
            Dynamic::String(_) => "string",
            Dynamic::Object(_) => "instance",
            Dynamic::WeakRef(_) => "weakref",
            Dynamic::Function(_) => "function",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    /// The strong handle held by this value, if any.
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            Dynamic::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    /// The function hash held by this value, if any.
    pub fn as_function(&self) -> Option<TypeHash> {
        match self {
            Dynamic::Function(hash) => Some(*hash),
            _ => None,
        }
    }

    /// Read an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Dynamic::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Read a float value, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Dynamic::Float(v) => Some(*v),
            Dynamic::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Borrow a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Null => write!(f, "Null"),
            Dynamic::Int(v) => write!(f, "Int({})", v),
            Dynamic::Float(v) => write!(f, "Float({})", v),
            Dynamic::Bool(v) => write!(f, "Bool({})", v),
            Dynamic::String(s) => write!(f, "String({:?})", s),
            Dynamic::Object(h) => write!(f, "Object({})", h),
            Dynamic::WeakRef(h) => write!(f, "WeakRef({})", h),
            Dynamic::Function(h) => write!(f, "Function({})", h),
        }
    }
}

/// Formats the value the way a script `print` would.
impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Null => write!(f, "null"),
            Dynamic::Int(v) => write!(f, "{}", v),
            Dynamic::Float(v) => write!(f, "{}", v),
            Dynamic::Bool(v) => write!(f, "{}", v),
            Dynamic::String(s) => write!(f, "{}", s),
            Dynamic::Object(h) => write!(f, "(instance {})", h),
            Dynamic::WeakRef(h) => write!(f, "(weakref {})", h),
            Dynamic::Function(h) => write!(f, "(function {})", h),
        }
    }
}
