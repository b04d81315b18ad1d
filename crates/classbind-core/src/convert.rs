//! Conversion traits between script values and primitive Rust values.
//!
//! - [`FromDynamic`]: extract a Rust value from a [`Dynamic`]
//! - [`IntoDynamic`]: convert a Rust value into a [`Dynamic`]
//!
//! ## Supported Primitive Types
//!
//! - Integers: `i8`, `i16`, `i32`, `i64`, `u8`, `u16`, `u32`, `u64`, `usize`
//! - Floats: `f32`, `f64`
//! - Boolean: `bool`
//! - Text: `String`, `char`
//! - Unit: `()` (null)
//!
//! Native instances are not covered here; they need the instance tables and
//! are converted by the registry crate.

use crate::Dynamic;
use crate::error::ConversionError;

/// Extract a value from a script value.
pub trait FromDynamic: Sized {
    /// Returns a `ConversionError` if the value has an incompatible type.
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError>;
}

/// Convert a value into a script value.
pub trait IntoDynamic {
    fn into_dynamic(self) -> Dynamic;
}

fn mismatch(expected: &'static str, value: &Dynamic) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: value.type_name(),
    }
}

// ============================================================================
// Integer implementations
// ============================================================================

macro_rules! impl_dynamic_int {
    ($($ty:ty),*) => {
        $(
            impl FromDynamic for $ty {
                fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
                    match value {
                        Dynamic::Int(v) => <$ty>::try_from(*v).map_err(|_| {
                            ConversionError::IntegerOverflow {
                                value: *v,
                                target_type: stringify!($ty),
                            }
                        }),
                        _ => Err(mismatch("int", value)),
                    }
                }
            }

            // usize past i64::MAX saturates
            impl IntoDynamic for $ty {
                fn into_dynamic(self) -> Dynamic {
                    Dynamic::Int(i64::try_from(self).unwrap_or(i64::MAX))
                }
            }
        )*
    };
}

impl_dynamic_int!(i8, i16, i32, i64, u8, u16, u32, usize);

// u64 reinterprets the bits so the full range survives a round trip through i64.
// Values above i64::MAX therefore read as negative ints in scripts.
impl FromDynamic for u64 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Int(v) => Ok(*v as u64),
            _ => Err(mismatch("int", value)),
        }
    }
}

impl IntoDynamic for u64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Int(self as i64)
    }
}

// ============================================================================
// Float implementations
// ============================================================================

impl FromDynamic for f64 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Float(v) => Ok(*v),
            Dynamic::Int(v) => Ok(*v as f64),
            _ => Err(mismatch("float", value)),
        }
    }
}

impl FromDynamic for f32 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Float(v) => {
                if v.is_finite() && (*v < f32::MIN as f64 || *v > f32::MAX as f64) {
                    Err(ConversionError::FloatConversion {
                        value: *v,
                        target_type: "f32",
                    })
                } else {
                    Ok(*v as f32)
                }
            }
            Dynamic::Int(v) => Ok(*v as f32),
            _ => Err(mismatch("float", value)),
        }
    }
}

impl IntoDynamic for f64 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self)
    }
}

impl IntoDynamic for f32 {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Float(self as f64)
    }
}

// ============================================================================
// Other primitives
// ============================================================================

impl FromDynamic for bool {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Bool(v) => Ok(*v),
            _ => Err(mismatch("bool", value)),
        }
    }
}

impl IntoDynamic for bool {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Bool(self)
    }
}

impl FromDynamic for String {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            _ => Err(mismatch("string", value)),
        }
    }
}

impl IntoDynamic for String {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self)
    }
}

impl IntoDynamic for &str {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self.to_owned())
    }
}

/// A char is a one-character string on the script side.
impl FromDynamic for char {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        let mut chars = value.as_str().ok_or_else(|| mismatch("char", value))?.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(mismatch("char", value)),
        }
    }
}

impl IntoDynamic for char {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::String(self.to_string())
    }
}

impl FromDynamic for () {
    fn from_dynamic(_value: &Dynamic) -> Result<Self, ConversionError> {
        Ok(())
    }
}

impl IntoDynamic for () {
    fn into_dynamic(self) -> Dynamic {
        Dynamic::Null
    }
}

impl FromDynamic for Dynamic {
    fn from_dynamic(value: &Dynamic) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoDynamic for Dynamic {
    fn into_dynamic(self) -> Dynamic {
        self
    }
}
