//! Arity-keyed overload tables.
//!
//! Entries are grouped by script name, then keyed by arity, so resolution is
//! an exact `(name, arity)` lookup and a name can never alias another name's
//! arity. The sorted arity lists double as the diagnostics for
//! `NoMatchingOverload`.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::debug;

use classbind_core::{CallError, RegistrationError};

use crate::member::MemberFlags;
use crate::native_fn::NativeFn;

/// One native entry point for a `(name, arity)` pair.
#[derive(Clone, Debug)]
pub struct OverloadEntry {
    pub name: String,
    pub arity: usize,
    pub flags: MemberFlags,
    pub trampoline: NativeFn,
}

/// Overloads of one owner (a class object or a namespace table).
#[derive(Clone, Debug, Default)]
pub struct OverloadTable {
    entries: FxHashMap<String, BTreeMap<usize, OverloadEntry>>,
}

impl OverloadTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an overload.
    ///
    /// A `(name, arity)` pair may exist only once per owner. An entry copied
    /// from a base type can be replaced once by the owner's own declaration.
    pub fn insert(&mut self, owner: &str, entry: OverloadEntry) -> Result<(), RegistrationError> {
        if let Some(existing) = self.get(&entry.name, entry.arity) {
            if !existing.flags.contains(MemberFlags::INHERITED) {
                return Err(RegistrationError::DuplicateOverload {
                    owner: owner.to_string(),
                    name: entry.name,
                    arity: entry.arity,
                });
            }
            debug!(owner, name = %entry.name, arity = entry.arity, "overriding inherited overload");
        }

        self.entries
            .entry(entry.name.clone())
            .or_default()
            .insert(entry.arity, entry);
        Ok(())
    }

    /// Exact-arity lookup.
    pub fn resolve(&self, name: &str, arg_count: usize) -> Result<&OverloadEntry, CallError> {
        self.get(name, arg_count)
            .ok_or_else(|| CallError::NoMatchingOverload {
                name: name.to_string(),
                arity: arg_count,
                available: self.available(name),
            })
    }

    pub fn get(&self, name: &str, arity: usize) -> Option<&OverloadEntry> {
        self.entries.get(name).and_then(|by_arity| by_arity.get(&arity))
    }

    pub fn contains(&self, name: &str, arity: usize) -> bool {
        self.get(name, arity).is_some()
    }

    /// Registered arities of `name`, ascending.
    pub fn available(&self, name: &str) -> Vec<usize> {
        self.entries
            .get(name)
            .map(|by_arity| by_arity.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any overload of `name` exists.
    pub fn has_name(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|a| !a.is_empty())
    }

    /// Drop every overload of `name`.
    pub fn remove_name(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Add `flags` to every entry.
    pub(crate) fn mark_all(&mut self, flags: MemberFlags) {
        for entry in self.entries.values_mut().flat_map(BTreeMap::values_mut) {
            entry.flags |= flags;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverloadEntry> {
        self.entries.values().flat_map(BTreeMap::values)
    }
}
