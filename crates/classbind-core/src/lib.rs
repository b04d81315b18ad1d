//! Core types shared by every classbind crate.
//!
//! - [`TypeHash`]: deterministic identity for class objects and functions
//! - [`Dynamic`]: a value as the script runtime sees it
//! - [`ObjectHeap`] / [`ObjectHandle`]: the generational script heap
//! - [`RegistrationError`] / [`CallError`]: the two error phases
//! - [`FromDynamic`] / [`IntoDynamic`]: primitive conversions

mod convert;
mod error;
mod object_heap;
mod type_hash;
mod value;

pub use convert::{FromDynamic, IntoDynamic};
pub use error::{BindError, CallError, ConversionError, RegistrationError};
pub use object_heap::{ObjectHandle, ObjectHeap};
pub use type_hash::{TypeHash, hash_constants};
pub use value::Dynamic;
