//! Script-visible member slots of class objects and namespace tables.

use bitflags::bitflags;
use rustc_hash::FxHashMap;
use tracing::debug;

use classbind_core::{CallError, Dynamic, RegistrationError};

use crate::native_fn::NativeFn;
use crate::overload::{OverloadEntry, OverloadTable};

bitflags! {
    /// Properties of a bound member.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        /// Called without a receiver
        const STATIC = 1 << 0;
        /// Copied from a base type at derivation
        const INHERITED = 1 << 1;
        /// Value cannot be assigned from script
        const READ_ONLY = 1 << 2;
        /// Raw entry point, receives the call context directly
        const RAW = 1 << 3;
    }
}

/// Entries every class object carries, answered by the dispatcher itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// `weakref()`: a weak reference to the instance
    WeakRef,
    /// `_typeof()`: the class name
    TypeOf,
    /// `_cloned()`: a copy made with the type's copy function
    Cloned,
}

impl Builtin {
    pub const ALL: [(&'static str, Builtin); 3] = [
        ("weakref", Builtin::WeakRef),
        ("_typeof", Builtin::TypeOf),
        ("_cloned", Builtin::Cloned),
    ];
}

/// A single-arity native function.
#[derive(Clone, Debug)]
pub struct FunctionEntry {
    pub arity: usize,
    pub flags: MemberFlags,
    pub trampoline: NativeFn,
}

/// What a member name resolves to.
#[derive(Clone, Debug)]
pub enum Slot {
    /// Plain function with one arity
    Function(FunctionEntry),
    /// Forwarder into the overload table by argument count
    Overloaded,
    /// Raw entry point accepting any argument count
    Raw { flags: MemberFlags, trampoline: NativeFn },
    /// Read-only value
    Static(Dynamic),
    /// Dispatcher-provided entry
    Builtin(Builtin),
}

impl Slot {
    /// Whether the slot was copied from a base type.
    pub fn is_inherited(&self) -> bool {
        match self {
            Slot::Function(entry) => entry.flags.contains(MemberFlags::INHERITED),
            Slot::Raw { flags, .. } => flags.contains(MemberFlags::INHERITED),
            _ => false,
        }
    }

    fn mark(&mut self, extra: MemberFlags) {
        match self {
            Slot::Function(entry) => entry.flags |= extra,
            Slot::Raw { flags, .. } => *flags |= extra,
            _ => {}
        }
    }
}

/// Member slots plus the overloads they forward to.
#[derive(Clone, Debug, Default)]
pub struct MemberTable {
    owner: String,
    slots: FxHashMap<String, Slot>,
    overloads: OverloadTable,
}

impl MemberTable {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            slots: FxHashMap::default(),
            overloads: OverloadTable::new(),
        }
    }

    /// Name of the class or namespace owning these members.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn overloads(&self) -> &OverloadTable {
        &self.overloads
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn set_slot(&mut self, name: &str, slot: Slot) {
        if let Some(previous) = self.slots.insert(name.to_string(), slot) {
            debug!(
                owner = %self.owner,
                member = name,
                inherited = previous.is_inherited(),
                "member slot replaced"
            );
        }
    }

    /// Bind a plain function. Replaces anything previously bound under `name`.
    pub fn bind_function(&mut self, name: &str, entry: FunctionEntry) {
        self.overloads.remove_name(name);
        self.set_slot(name, Slot::Function(entry));
    }

    /// Bind one overload of `name` and point the slot at the forwarder.
    ///
    /// A plain function already bound under `name` becomes one of the overloads,
    /// keeping its flags.
    pub fn bind_overload(&mut self, entry: OverloadEntry) -> Result<(), RegistrationError> {
        if let Some(Slot::Function(existing)) = self.slots.get(&entry.name) {
            let migrated = OverloadEntry {
                name: entry.name.clone(),
                arity: existing.arity,
                flags: existing.flags,
                trampoline: existing.trampoline.clone(),
            };
            self.overloads.insert(&self.owner, migrated)?;
        }
        let name = entry.name.clone();
        self.overloads.insert(&self.owner, entry)?;
        if !matches!(self.slots.get(&name), Some(Slot::Overloaded)) {
            self.set_slot(&name, Slot::Overloaded);
        }
        Ok(())
    }

    /// Bind a raw entry point.
    pub fn bind_raw(&mut self, name: &str, flags: MemberFlags, trampoline: NativeFn) {
        self.overloads.remove_name(name);
        self.set_slot(
            name,
            Slot::Raw {
                flags: flags | MemberFlags::RAW,
                trampoline,
            },
        );
    }

    /// Bind a read-only value.
    pub fn bind_static(&mut self, name: &str, value: Dynamic) {
        self.overloads.remove_name(name);
        self.set_slot(name, Slot::Static(value));
    }

    pub(crate) fn bind_builtins(&mut self) {
        for (name, builtin) in Builtin::ALL {
            self.slots.insert(name.to_string(), Slot::Builtin(builtin));
        }
    }

    /// Install an empty forwarder, so calls report `NoMatchingOverload` until
    /// overloads are added.
    pub(crate) fn bind_forwarder(&mut self, name: &str) {
        self.slots.insert(name.to_string(), Slot::Overloaded);
    }

    /// Find the native entry point for calling `name` with `arg_count` arguments.
    pub fn resolve(&self, name: &str, arg_count: usize) -> Result<&NativeFn, CallError> {
        match self.slots.get(name) {
            Some(Slot::Function(entry)) if entry.arity == arg_count => Ok(&entry.trampoline),
            Some(Slot::Function(entry)) => Err(CallError::NoMatchingOverload {
                name: name.to_string(),
                arity: arg_count,
                available: vec![entry.arity],
            }),
            Some(Slot::Overloaded) => self
                .overloads
                .resolve(name, arg_count)
                .map(|entry| &entry.trampoline),
            Some(Slot::Raw { trampoline, .. }) => Ok(trampoline),
            Some(Slot::Static(_)) | Some(Slot::Builtin(_)) => {
                Err(CallError::NotCallable(format!("{}.{}", self.owner, name)))
            }
            None => Err(CallError::MemberNotFound {
                type_name: self.owner.clone(),
                member: name.to_string(),
            }),
        }
    }

    /// Snapshot copy for a derived owner.
    ///
    /// Every copied function and overload is flagged `INHERITED`. Overloads of
    /// `skip` (constructors) are not copied.
    pub(crate) fn snapshot_for(&self, owner: &str, skip: &str) -> Self {
        let mut copy = self.clone();
        copy.owner = owner.to_string();
        copy.overloads.remove_name(skip);
        copy.overloads.mark_all(MemberFlags::INHERITED);
        for slot in copy.slots.values_mut() {
            slot.mark(MemberFlags::INHERITED);
        }
        copy
    }
}
