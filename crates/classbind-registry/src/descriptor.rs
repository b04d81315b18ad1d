//! Type descriptors: everything the runtime knows about one bound native type.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use classbind_core::{CallError, RegistrationError, TypeHash};

use crate::accessor::{AccessorEntry, AccessorTable};
use crate::member::{MemberFlags, MemberTable};
use crate::native::NativeRef;
use crate::native_fn::NativeFn;
use crate::overload::OverloadEntry;

/// Script name of the construction entry point.
pub const CONSTRUCTOR: &str = "constructor";

/// Makes a new native instance from an existing one.
pub type CopyFn = fn(&dyn Any) -> Option<NativeRef>;

pub(crate) fn copy_native<T: Clone + 'static>(value: &dyn Any) -> Option<NativeRef> {
    value
        .downcast_ref::<T>()
        .map(|v| Rc::new(RefCell::new(v.clone())) as NativeRef)
}

/// Composition stand-in for a base-class subobject.
///
/// A type registered as derived from `B` exposes its `B` part so that members
/// bound on `B` work on it.
pub trait Derives<B: 'static>: 'static {
    fn base(&self) -> &B;
    fn base_mut(&mut self) -> &mut B;
}

/// Projections from a derived value to its base part, with types erased.
#[derive(Clone, Copy)]
pub struct Upcast {
    pub(crate) as_ref: fn(&dyn Any) -> Option<&dyn Any>,
    pub(crate) as_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

impl Upcast {
    pub fn of<D: Derives<B>, B: 'static>() -> Self {
        Upcast {
            as_ref: upcast_ref::<D, B>,
            as_mut: upcast_mut::<D, B>,
        }
    }
}

fn upcast_ref<D: Derives<B>, B: 'static>(value: &dyn Any) -> Option<&dyn Any> {
    value.downcast_ref::<D>().map(|d| d.base() as &dyn Any)
}

fn upcast_mut<D: Derives<B>, B: 'static>(value: &mut dyn Any) -> Option<&mut dyn Any> {
    value
        .downcast_mut::<D>()
        .map(|d| d.base_mut() as &mut dyn Any)
}

impl fmt::Debug for Upcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upcast").finish_non_exhaustive()
    }
}

/// The script-visible class object of a type.
#[derive(Debug, Clone)]
pub struct ClassObject {
    hash: TypeHash,
    members: MemberTable,
}

impl ClassObject {
    fn new(name: &str) -> Self {
        let mut members = MemberTable::new(name);
        members.bind_forwarder(CONSTRUCTOR);
        members.bind_builtins();
        Self {
            hash: TypeHash::from_name(name),
            members,
        }
    }

    /// Identity of the class object.
    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn members(&self) -> &MemberTable {
        &self.members
    }
}

/// Metadata for one bound native type.
///
/// Created by [`TypeRegistry`](crate::TypeRegistry) and read-only once
/// registration is sealed.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    type_id: TypeId,
    rust_name: &'static str,
    base: Option<TypeId>,
    base_name: Option<String>,
    copy_fn: Option<CopyFn>,
    upcast: Option<Upcast>,
    get_table: AccessorTable,
    set_table: AccessorTable,
    class: ClassObject,
}

impl TypeDescriptor {
    pub(crate) fn new(name: &str, type_id: TypeId, rust_name: &'static str) -> Self {
        Self {
            name: name.to_string(),
            type_id,
            rust_name,
            base: None,
            base_name: None,
            copy_fn: None,
            upcast: None,
            get_table: AccessorTable::new(),
            set_table: AccessorTable::new(),
            class: ClassObject::new(name),
        }
    }

    /// Snapshot derivation.
    ///
    /// Accessor tables, member slots and overloads are copied by value and
    /// flagged as inherited. Constructors, the copy function and the class
    /// identity are the derived type's own.
    pub(crate) fn derive(
        &self,
        name: &str,
        type_id: TypeId,
        rust_name: &'static str,
        upcast: Upcast,
    ) -> Self {
        let mut class = ClassObject::new(name);
        let mut members = self.class.members.snapshot_for(name, CONSTRUCTOR);
        members.bind_forwarder(CONSTRUCTOR);
        members.bind_builtins();
        class.members = members;

        let mut get_table = self.get_table.clone();
        get_table.mark_all(MemberFlags::INHERITED);
        let mut set_table = self.set_table.clone();
        set_table.mark_all(MemberFlags::INHERITED);

        Self {
            name: name.to_string(),
            type_id,
            rust_name,
            base: Some(self.type_id),
            base_name: Some(self.name.clone()),
            copy_fn: None,
            upcast: Some(upcast),
            get_table,
            set_table,
            class,
        }
    }

    /// Script-visible name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name, for diagnostics.
    pub fn rust_name(&self) -> &'static str {
        self.rust_name
    }

    /// Identity of the class object.
    pub fn hash(&self) -> TypeHash {
        self.class.hash
    }

    /// Parent link, used for is-a queries and diagnostics only.
    pub fn base(&self) -> Option<TypeId> {
        self.base
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    pub fn copy_fn(&self) -> Option<CopyFn> {
        self.copy_fn
    }

    pub fn is_copyable(&self) -> bool {
        self.copy_fn.is_some()
    }

    pub(crate) fn upcast(&self) -> Option<Upcast> {
        self.upcast
    }

    pub fn class(&self) -> &ClassObject {
        &self.class
    }

    pub fn members(&self) -> &MemberTable {
        &self.class.members
    }

    pub(crate) fn members_mut(&mut self) -> &mut MemberTable {
        &mut self.class.members
    }

    pub fn get_table(&self) -> &AccessorTable {
        &self.get_table
    }

    pub fn set_table(&self) -> &AccessorTable {
        &self.set_table
    }

    pub fn getter(&self, name: &str) -> Option<&AccessorEntry> {
        self.get_table.get(name)
    }

    pub fn setter(&self, name: &str) -> Option<&AccessorEntry> {
        self.set_table.get(name)
    }

    pub(crate) fn set_copy_fn(&mut self, copy_fn: CopyFn) {
        self.copy_fn = Some(copy_fn);
    }

    /// Install a getter. Replaces any earlier getter of the same name.
    pub fn bind_getter(&mut self, entry: AccessorEntry) {
        self.get_table.insert(&self.name, entry);
    }

    /// Install a setter. Replaces any earlier setter of the same name.
    pub fn bind_setter(&mut self, entry: AccessorEntry) {
        self.set_table.insert(&self.name, entry);
    }

    /// Add one `(name, arity)` overload.
    pub fn bind_overload(
        &mut self,
        name: &str,
        arity: usize,
        flags: MemberFlags,
        trampoline: NativeFn,
    ) -> Result<(), RegistrationError> {
        self.class.members.bind_overload(OverloadEntry {
            name: name.to_string(),
            arity,
            flags,
            trampoline,
        })
    }

    /// Find the entry point for calling `name` with `arg_count` arguments.
    pub fn resolve(&self, name: &str, arg_count: usize) -> Result<&NativeFn, CallError> {
        self.class.members.resolve(name, arg_count)
    }
}
