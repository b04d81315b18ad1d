//! Generational arena for reference-counted script handles.

use std::fmt;

/// Handle to an object slot in the script heap.
///
/// Copyable and cheap. The generation detects use of a handle whose slot has
/// since been freed and reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Index into ObjectHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectHandle {
    /// Create a new object handle.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.index, self.generation)
    }
}

/// Heap storage with generational indices and reference counts.
///
/// When an object is freed its slot is reused and the generation is
/// incremented, so old handles stop resolving.
pub struct ObjectHeap<T> {
    slots: Vec<HeapSlot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

struct HeapSlot<T> {
    generation: u32,
    value: Option<T>,
    ref_count: u32,
}

impl<T> ObjectHeap<T> {
    /// Create a new empty object heap.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty heap with room for `capacity` objects.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Allocate a new object with a reference count of one.
    pub fn allocate(&mut self, value: T) -> ObjectHandle {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.ref_count = 1;
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(value),
                ref_count: 1,
            });
            ObjectHandle::new(index, 0)
        }
    }

    fn slot(&self, handle: ObjectHandle) -> Option<&HeapSlot<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    fn slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapSlot<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.value.is_some())
    }

    /// Get immutable reference to an object.
    ///
    /// Returns None if the handle is stale.
    pub fn get(&self, handle: ObjectHandle) -> Option<&T> {
        self.slot(handle)?.value.as_ref()
    }

    /// Get mutable reference to an object.
    ///
    /// Returns None if the handle is stale.
    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut T> {
        self.slot_mut(handle)?.value.as_mut()
    }

    /// Whether the handle still refers to a live object.
    pub fn is_live(&self, handle: ObjectHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Increment reference count.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.ref_count = slot.ref_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrement reference count, free if zero.
    ///
    /// Returns the object when this was the last reference so the caller can
    /// finalize it.
    pub fn release(&mut self, handle: ObjectHandle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count == 0 {
            self.free(handle)
        } else {
            None
        }
    }

    /// Free an object immediately regardless of its reference count.
    pub fn free(&mut self, handle: ObjectHandle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        let value = slot.value.take();
        slot.ref_count = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.live -= 1;
        value
    }

    /// Get the reference count for an object.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.slot(handle).map(|slot| slot.ref_count)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the heap holds no live objects.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Free every live object, returning them for finalization.
    pub fn drain(&mut self) -> Vec<(ObjectHandle, T)> {
        let mut drained = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                drained.push((ObjectHandle::new(index as u32, slot.generation), value));
                slot.ref_count = 0;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        self.live = 0;
        drained
    }
}

impl<T> Default for ObjectHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ObjectHeap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .field("live", &self.live)
            .finish()
    }
}
