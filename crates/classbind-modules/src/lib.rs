//! Binding modules built on the classbind registration surface.
//!
//! - **geometry** - `Vector2`, `Shape` and the derived `Circle`
//! - **string** - string helpers, including variadic `format` and `join`
//! - **buffer** - `ByteBuffer`, a growable byte buffer
//! - **timer** - tick-based timers driven by the pending-task pump
//!
//! # Usage
//!
//! Each module exposes a `register` function:
//!
//! ```
//! use classbind_registry::TypeRegistry;
//!
//! let mut registry = TypeRegistry::new();
//! classbind_modules::geometry::register(&mut registry).unwrap();
//! classbind_modules::string::register(&mut registry).unwrap();
//! ```

use tracing::debug;

use classbind_core::RegistrationError;
use classbind_registry::TypeRegistry;

pub mod buffer;
pub mod geometry;
pub mod string;
pub mod timer;

pub use buffer::ByteBuffer;
pub use geometry::{Circle, Shape, Vector2};

/// Register every module.
pub fn register_all(registry: &mut TypeRegistry) -> Result<(), RegistrationError> {
    geometry::register(registry)?;
    string::register(registry)?;
    buffer::register(registry)?;
    timer::register(registry)?;
    debug!(types = registry.len(), "registered default modules");
    Ok(())
}
