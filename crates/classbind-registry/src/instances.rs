//! Instance Lifetime Manager.
//!
//! Maps native instances to the script handles that represent them, so one
//! native object always appears to scripts as one handle.
//!
//! # Ownership
//!
//! The tables never own a native object: each [`InstanceRecord`] holds a
//! `Weak`. A handle keeps its native object alive only when the binding layer
//! allocated it ([`Ownership::Script`]) or was handed a share of it
//! ([`Ownership::Shared`]). For [`Ownership::Host`] the host alone decides
//! when the object dies, and handles to it then resolve as stale.
//!
//! # Staleness
//!
//! A handle resolves only when all of the following hold:
//!
//! - its heap slot still has the handle's generation
//! - the per-type table still has a record for the object's address
//! - that record points back at this handle (not at a newer one)
//! - the native object is still alive
//!
//! Everything else is [`CallError::StaleHandle`].

use std::any::TypeId;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use classbind_core::{CallError, ObjectHandle, ObjectHeap};

use crate::descriptor::TypeDescriptor;
use crate::native::{NativeAddr, NativeCell, NativeRef};
use crate::registry::TypeRegistry;

/// Who keeps a bound native object alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Allocated by the binding layer; the handle's finalizer owns it.
    Script,
    /// The handle holds one share of a host-shared object.
    Shared,
    /// The host owns it; the handle never keeps it alive.
    Host,
}

/// Script heap payload for one handle.
#[derive(Debug)]
pub struct ScriptObject {
    type_id: TypeId,
    addr: NativeAddr,
    strong: Option<NativeRef>,
}

impl ScriptObject {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn addr(&self) -> NativeAddr {
        self.addr
    }

    /// Whether this handle keeps its native object alive.
    pub fn is_owning(&self) -> bool {
        self.strong.is_some()
    }
}

/// Non-owning link from a native address to its handle.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    native: Weak<dyn NativeCell>,
    handle: ObjectHandle,
}

impl InstanceRecord {
    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Whether the native object is still alive.
    pub fn is_alive(&self) -> bool {
        self.native.strong_count() > 0
    }
}

/// Instance tables plus the script heap the handles live in.
#[derive(Debug, Default)]
pub struct InstanceManager {
    heap: ObjectHeap<ScriptObject>,
    tables: FxHashMap<TypeId, FxHashMap<NativeAddr, InstanceRecord>>,
}

impl InstanceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: ObjectHeap::with_capacity(capacity),
            tables: FxHashMap::default(),
        }
    }

    /// Bind a native instance to a script handle.
    ///
    /// Returns the existing handle, with one more reference, when the instance
    /// is already bound. A record whose native object has died is evicted and
    /// replaced.
    pub fn bind(
        &mut self,
        descriptor: &TypeDescriptor,
        native: NativeRef,
        ownership: Ownership,
    ) -> ObjectHandle {
        let addr = NativeAddr::of(&native);
        let table = self.tables.entry(descriptor.type_id()).or_default();

        if let Some(record) = table.get(&addr) {
            let handle = record.handle;
            if record.is_alive() && self.heap.is_live(handle) {
                self.heap.add_ref(handle);
                if ownership != Ownership::Host
                    && let Some(object) = self.heap.get_mut(handle)
                    && object.strong.is_none()
                {
                    object.strong = Some(native);
                }
                trace!(type_name = descriptor.name(), %addr, %handle, "rebound existing instance");
                return handle;
            }
            warn!(type_name = descriptor.name(), %addr, stale = %handle, "evicting stale instance record");
            table.remove(&addr);
        }

        let weak = Rc::downgrade(&native);
        let handle = self.heap.allocate(ScriptObject {
            type_id: descriptor.type_id(),
            addr,
            strong: (ownership != Ownership::Host).then_some(native),
        });
        table.insert(
            addr,
            InstanceRecord {
                native: weak,
                handle,
            },
        );
        trace!(type_name = descriptor.name(), %addr, %handle, ?ownership, "bound instance");
        handle
    }

    /// Remove the record for a native instance.
    ///
    /// The handle stays allocated until its references are released, but no
    /// longer resolves.
    pub fn unbind(&mut self, type_id: TypeId, addr: NativeAddr) -> Option<InstanceRecord> {
        let record = self.tables.get_mut(&type_id)?.remove(&addr)?;
        debug!(%addr, handle = %record.handle, "unbound instance");
        Some(record)
    }

    /// Resolve a handle to the type and native instance behind it.
    pub fn resolve(&self, handle: ObjectHandle) -> Result<(TypeId, NativeRef), CallError> {
        let stale = || CallError::StaleHandle {
            index: handle.index,
        };
        let object = self.heap.get(handle).ok_or_else(stale)?;
        let record = self
            .tables
            .get(&object.type_id)
            .and_then(|table| table.get(&object.addr))
            .ok_or_else(stale)?;
        if record.handle != handle {
            return Err(stale());
        }
        let native = record.native.upgrade().ok_or_else(stale)?;
        Ok((object.type_id, native))
    }

    /// Resolve a handle to the address of its native instance.
    pub fn resolve_address(&self, handle: ObjectHandle) -> Result<NativeAddr, CallError> {
        self.resolve(handle)
            .map(|(_, native)| NativeAddr::of(&native))
    }

    /// Type of the object behind a handle, without checking the native side.
    pub fn type_of(&self, handle: ObjectHandle) -> Result<TypeId, CallError> {
        self.heap
            .get(handle)
            .map(ScriptObject::type_id)
            .ok_or(CallError::StaleHandle {
                index: handle.index,
            })
    }

    /// Live handle currently bound to a native address.
    pub fn handle_for(&self, type_id: TypeId, addr: NativeAddr) -> Option<ObjectHandle> {
        self.tables
            .get(&type_id)?
            .get(&addr)
            .filter(|record| record.is_alive() && self.heap.is_live(record.handle))
            .map(InstanceRecord::handle)
    }

    pub fn add_ref(&mut self, handle: ObjectHandle) -> Result<(), CallError> {
        if self.heap.add_ref(handle) {
            Ok(())
        } else {
            Err(CallError::StaleHandle {
                index: handle.index,
            })
        }
    }

    /// Drop one script reference. Returns true when the handle was finalized.
    pub fn release(&mut self, handle: ObjectHandle) -> bool {
        match self.heap.release(handle) {
            Some(object) => {
                self.finalize(handle, object);
                true
            }
            None => false,
        }
    }

    fn finalize(&mut self, handle: ObjectHandle, object: ScriptObject) {
        if let Some(table) = self.tables.get_mut(&object.type_id)
            && table
                .get(&object.addr)
                .is_some_and(|record| record.handle == handle)
        {
            table.remove(&object.addr);
        }
        trace!(%handle, addr = %object.addr, owning = object.is_owning(), "finalized handle");
    }

    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.heap.ref_count(handle)
    }

    pub fn is_live(&self, handle: ObjectHandle) -> bool {
        self.heap.is_live(handle)
    }

    /// Copy an instance with its type's copy function and bind the copy.
    ///
    /// The copy is a new native object with its own record and handle.
    pub fn duplicate(
        &mut self,
        registry: &TypeRegistry,
        handle: ObjectHandle,
    ) -> Result<ObjectHandle, CallError> {
        let (type_id, native) = self.resolve(handle)?;
        let descriptor = registry
            .descriptor(type_id)
            .ok_or_else(|| CallError::UnknownType(native.value_type_name().to_string()))?;
        let copy = descriptor
            .copy_fn()
            .ok_or_else(|| CallError::NotCopyable(descriptor.name().to_string()))?;

        let copied = {
            let guard = native
                .try_borrow_any()
                .map_err(|_| CallError::AlreadyBorrowed {
                    type_name: descriptor.name().to_string(),
                })?;
            copy(&*guard).ok_or_else(|| {
                CallError::type_mismatch(descriptor.name(), native.value_type_name())
            })?
        };
        Ok(self.bind(descriptor, copied, Ownership::Script))
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.heap.len()
    }

    /// Number of records for one type.
    pub fn instance_count(&self, type_id: TypeId) -> usize {
        self.tables.get(&type_id).map_or(0, |table| table.len())
    }

    /// Finalize every handle and forget every record.
    pub fn clear(&mut self) -> usize {
        let drained = self.heap.drain();
        self.tables.clear();
        drained.len()
    }
}
