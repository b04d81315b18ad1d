//! Type registry and binding machinery for classbind.
//!
//! - [`TypeRegistry`]: type descriptors, namespace tables, inheritance
//! - [`ClassBuilder`] / [`NamespaceBuilder`]: the registration surface
//! - [`AccessorTable`]: Get-table and Set-table entries
//! - [`MemberTable`] / [`OverloadTable`]: arity-keyed dispatch
//! - [`InstanceManager`]: native instance to script handle tracking
//! - [`CallContext`]: what a trampoline sees during a call
//! - [`PendingQueue`]: deferred native work

mod accessor;
mod call_context;
mod class_builder;
mod descriptor;
mod instances;
mod marshal;
mod member;
mod namespace_builder;
mod native;
mod native_fn;
mod overload;
mod pending;
mod registry;

pub use accessor::{AccessorEntry, AccessorTable, Field, SetterResult, SourceShape};
pub use call_context::{CallContext, expect_object};
pub use class_builder::ClassBuilder;
pub use descriptor::{CONSTRUCTOR, ClassObject, CopyFn, Derives, TypeDescriptor, Upcast};
pub use instances::{InstanceManager, InstanceRecord, Ownership, ScriptObject};
pub use marshal::{Borrowed, FromScript, IntoInstance, Owned, Shared, ToScript};
pub use member::{Builtin, FunctionEntry, MemberFlags, MemberTable, Slot};
pub use namespace_builder::NamespaceBuilder;
pub use native::{NativeAddr, NativeCell, NativeRef, new_native};
pub use native_fn::{
    ByMut, ByRef, IntoConstructor, IntoFunction, IntoMethod, NativeCallable, NativeFn,
    function_arity, method_arity,
};
pub use overload::{OverloadEntry, OverloadTable};
pub use pending::{Completed, PendingEntry, PendingQueue, PendingTask, TaskPoll};
pub use registry::TypeRegistry;
