//! Accessor Binder: getter and setter trampolines for properties.
//!
//! Every property access from a script goes through a Get-table or Set-table
//! entry. The entry records where the value comes from ([`SourceShape`]) and
//! holds a trampoline that reads or writes it on the resolved receiver.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use classbind_core::CallError;

use crate::call_context::CallContext;
use crate::marshal::{FromScript, ToScript};
use crate::member::MemberFlags;
use crate::native_fn::NativeFn;

/// Where an accessor reads or writes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceShape {
    /// A field of the receiver, through a [`Field`] projection
    Field,
    /// A closure or method taking the receiver
    Method,
    /// A free function pointer taking the receiver
    Function,
    /// A class-level cell, no receiver
    Static,
}

/// One Get-table or Set-table entry.
#[derive(Debug, Clone)]
pub struct AccessorEntry {
    name: String,
    shape: SourceShape,
    flags: MemberFlags,
    trampoline: NativeFn,
}

impl AccessorEntry {
    pub fn new(name: impl Into<String>, shape: SourceShape, trampoline: NativeFn) -> Self {
        let flags = if shape == SourceShape::Static {
            MemberFlags::STATIC
        } else {
            MemberFlags::empty()
        };
        Self {
            name: name.into(),
            shape,
            flags,
            trampoline,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> SourceShape {
        self.shape
    }

    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    pub fn trampoline(&self) -> &NativeFn {
        &self.trampoline
    }

    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    pub fn is_inherited(&self) -> bool {
        self.flags.contains(MemberFlags::INHERITED)
    }

    /// Getter bound without a matching setter.
    pub fn is_read_only(&self) -> bool {
        self.flags.contains(MemberFlags::READ_ONLY)
    }

    pub(crate) fn read_only(mut self) -> Self {
        self.flags |= MemberFlags::READ_ONLY;
        self
    }
}

/// Name-keyed accessor entries. The last insertion for a name wins.
#[derive(Debug, Clone, Default)]
pub struct AccessorTable {
    entries: FxHashMap<String, AccessorEntry>,
}

impl AccessorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the one it replaced.
    pub fn insert(&mut self, owner: &str, entry: AccessorEntry) -> Option<AccessorEntry> {
        let previous = self.entries.insert(entry.name.clone(), entry);
        if let Some(previous) = &previous {
            debug!(
                owner,
                member = %previous.name,
                inherited = previous.is_inherited(),
                "accessor replaced"
            );
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&AccessorEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn mark_all(&mut self, flags: MemberFlags) {
        for entry in self.entries.values_mut() {
            entry.flags |= flags;
        }
    }
}

/// A readable and writable projection of a field of `T`.
///
/// Build one with the [`field!`](crate::field) macro.
pub struct Field<T, V> {
    read: fn(&T) -> &V,
    write: fn(&mut T) -> &mut V,
}

impl<T, V> Field<T, V> {
    pub fn new(read: fn(&T) -> &V, write: fn(&mut T) -> &mut V) -> Self {
        Self { read, write }
    }

    pub fn read<'a>(&self, value: &'a T) -> &'a V {
        (self.read)(value)
    }

    pub fn write<'a>(&self, value: &'a mut T) -> &'a mut V {
        (self.write)(value)
    }
}

impl<T, V> Clone for Field<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for Field<T, V> {}

/// Build a [`Field`] projection: `field!(Vector2, x: f32)`.
#[macro_export]
macro_rules! field {
    ($owner:ty, $name:ident : $value:ty) => {{
        fn read(owner: &$owner) -> &$value {
            &owner.$name
        }
        fn write(owner: &mut $owner) -> &mut $value {
            &mut owner.$name
        }
        $crate::Field::<$owner, $value>::new(read, write)
    }};
}

// ============================================================================
// Trampolines
// ============================================================================

pub(crate) fn field_getter<T, V>(field: Field<T, V>) -> NativeFn
where
    T: 'static,
    V: Clone + ToScript + 'static,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let value = ctx.with_this(|this: &T| field.read(this).clone())?;
        ctx.set_return(value)
    })
}

pub(crate) fn field_setter<T, V>(field: Field<T, V>) -> NativeFn
where
    T: 'static,
    V: FromScript + 'static,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let value: V = ctx.arg(0)?;
        ctx.with_this_mut(|this: &mut T| *field.write(this) = value)
    })
}

pub(crate) fn method_getter<T, V, G>(getter: G) -> NativeFn
where
    T: 'static,
    V: ToScript + 'static,
    G: Fn(&T) -> V + 'static,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let value = ctx.with_this(|this: &T| getter(this))?;
        ctx.set_return(value)
    })
}

/// What a property setter returns: nothing, or whether the value was accepted.
pub trait SetterResult {
    fn into_result(self) -> Result<(), CallError>;
}

impl SetterResult for () {
    fn into_result(self) -> Result<(), CallError> {
        Ok(())
    }
}

impl SetterResult for Result<(), CallError> {
    fn into_result(self) -> Result<(), CallError> {
        self
    }
}

pub(crate) fn method_setter<T, V, S, R>(setter: S) -> NativeFn
where
    T: 'static,
    V: FromScript + 'static,
    S: Fn(&mut T, V) -> R + 'static,
    R: SetterResult,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let value: V = ctx.arg(0)?;
        ctx.with_this_mut(|this: &mut T| setter(this, value).into_result())?
    })
}

pub(crate) fn static_getter<V>(cell: Rc<RefCell<V>>) -> NativeFn
where
    V: Clone + ToScript + 'static,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let value = cell.borrow().clone();
        ctx.set_return(value)
    })
}

pub(crate) fn static_setter<V>(cell: Rc<RefCell<V>>) -> NativeFn
where
    V: FromScript + 'static,
{
    NativeFn::new(move |ctx: &mut CallContext<'_>| {
        let value: V = ctx.arg(0)?;
        *cell.borrow_mut() = value;
        Ok(())
    })
}
