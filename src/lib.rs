//! Native class bindings for an embedded scripting runtime.
//!
//! `classbind` exposes Rust types to scripts as classes. A bound class gets
//! constructors, methods with arity-based overloading, properties backed by
//! fields or getter/setter pairs, static values, and single inheritance by
//! snapshot. The engine keeps a one-to-one mapping between native objects and
//! script handles and runs deferred native work through a pending-task pump.
//!
//! # Crates
//!
//! - [`classbind_core`]: values, handles, hashes and errors
//! - [`classbind_registry`]: descriptors, accessors, overloads, instances
//! - [`classbind_modules`]: ready-made bindings (geometry, strings, buffers, timers)
//!
//! # Example
//!
//! ```
//! use classbind::{Dynamic, Engine};
//!
//! let mut engine = Engine::with_default_modules().unwrap();
//!
//! let circle = engine.construct("Circle", &[Dynamic::Float(1.0)]).unwrap();
//! engine.set(&circle, "radius", Dynamic::Float(2.0)).unwrap();
//! assert_eq!(engine.get(&circle, "radius").unwrap(), Dynamic::Float(2.0));
//! assert!(engine.instance_of(&circle, "Shape").unwrap());
//! engine.release(&circle);
//! ```

mod dispatch;
mod engine;
mod properties;
mod pump;

pub use engine::Engine;
pub use properties::{EngineProperties, EngineProperty, PropertyError};

pub use classbind_core::{
    BindError, CallError, ConversionError, Dynamic, FromDynamic, IntoDynamic, ObjectHandle,
    RegistrationError, TypeHash,
};
pub use classbind_registry::{
    Borrowed, CallContext, ClassBuilder, Derives, Field, FromScript, NamespaceBuilder, NativeAddr,
    Ownership, Owned, PendingTask, Shared, TaskPoll, ToScript, TypeDescriptor, TypeRegistry,
    field,
};

pub use classbind_modules as modules;
