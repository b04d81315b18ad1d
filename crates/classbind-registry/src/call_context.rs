//! Call context bridging the script runtime and native Rust functions.

use std::any::{TypeId, type_name};
use std::cell::RefCell;
use std::rc::Rc;

use classbind_core::{CallError, Dynamic, ObjectHandle};

use crate::instances::{InstanceManager, Ownership};
use crate::marshal::{FromScript, ToScript};
use crate::native::NativeRef;
use crate::pending::{PendingEntry, PendingQueue, PendingTask};
use crate::registry::TypeRegistry;

/// Context for one native call.
///
/// Gives a trampoline its arguments, its receiver, the instance tables and a
/// place to put the return value.
///
/// ## Slots
///
/// Slot 0 is the receiver (`null` for static calls and free functions);
/// arguments follow at `arg_offset`.
///
/// ```ignore
/// let x: i32 = ctx.arg(0)?;
/// let name: String = ctx.arg(1)?;
/// ctx.set_return(x * 2)?;
/// ```
pub struct CallContext<'rt> {
    registry: &'rt TypeRegistry,
    instances: &'rt mut InstanceManager,
    pending: &'rt mut PendingQueue,
    slots: &'rt [Dynamic],
    arg_offset: usize,
    return_slot: &'rt mut Dynamic,
}

impl<'rt> CallContext<'rt> {
    /// Create a new call context.
    ///
    /// # Arguments
    ///
    /// * `slots` - Receiver and argument slots
    /// * `arg_offset` - Index of the first argument in `slots`
    /// * `return_slot` - Where to store the return value
    pub fn new(
        registry: &'rt TypeRegistry,
        instances: &'rt mut InstanceManager,
        pending: &'rt mut PendingQueue,
        slots: &'rt [Dynamic],
        arg_offset: usize,
        return_slot: &'rt mut Dynamic,
    ) -> Self {
        Self {
            registry,
            instances,
            pending,
            slots,
            arg_offset,
            return_slot,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.registry
    }

    pub fn instances(&self) -> &InstanceManager {
        self.instances
    }

    /// Get the number of arguments, excluding the receiver.
    pub fn arg_count(&self) -> usize {
        self.slots.len().saturating_sub(self.arg_offset)
    }

    /// All argument slots.
    pub fn args(&self) -> &[Dynamic] {
        self.slots.get(self.arg_offset..).unwrap_or(&[])
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, CallError> {
        self.slots
            .get(self.arg_offset + index)
            .ok_or(CallError::ArgumentIndexOutOfBounds {
                index,
                count: self.arg_count(),
            })
    }

    /// Get a typed argument value.
    pub fn arg<T: FromScript>(&self, index: usize) -> Result<T, CallError> {
        let slot = self.arg_slot(index)?;
        T::from_script(slot, self)
    }

    /// The receiver slot, if this call has one.
    pub fn receiver(&self) -> Option<&Dynamic> {
        if self.arg_offset == 0 {
            None
        } else {
            self.slots.first()
        }
    }

    /// Handle of the receiver.
    pub fn this_handle(&self) -> Result<ObjectHandle, CallError> {
        expect_object(self.receiver().unwrap_or(&Dynamic::Null))
    }

    /// Set the return value from a raw slot.
    pub fn set_return_slot(&mut self, value: Dynamic) {
        *self.return_slot = value;
    }

    /// Set a typed return value.
    pub fn set_return<T: ToScript>(&mut self, value: T) -> Result<(), CallError> {
        let value = value.to_script(self)?;
        *self.return_slot = value;
        Ok(())
    }

    /// Run `f` with the receiver borrowed as `&T`.
    ///
    /// The receiver may be a `T` or any type registered as derived from `T`.
    pub fn with_this<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, CallError> {
        let receiver = self.receiver().unwrap_or(&Dynamic::Null);
        self.with_object(receiver, f)
    }

    /// Run `f` with the receiver borrowed as `&mut T`.
    pub fn with_this_mut<T: 'static, R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CallError> {
        let receiver = self.receiver().unwrap_or(&Dynamic::Null);
        self.with_object_mut(receiver, f)
    }

    /// Run `f` with an instance value borrowed as `&T`.
    pub fn with_object<T: 'static, R>(
        &self,
        value: &Dynamic,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, CallError> {
        let (type_id, native) = self.resolve(value)?;
        let guard = native
            .try_borrow_any()
            .map_err(|_| self.already_borrowed(type_id))?;
        let target = self.registry.upcast_ref::<T>(type_id, &*guard)?;
        Ok(f(target))
    }

    /// Run `f` with an instance value borrowed as `&mut T`.
    pub fn with_object_mut<T: 'static, R>(
        &self,
        value: &Dynamic,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CallError> {
        let (type_id, native) = self.resolve(value)?;
        let mut guard = native
            .try_borrow_any_mut()
            .map_err(|_| self.already_borrowed(type_id))?;
        let target = self.registry.upcast_mut::<T>(type_id, &mut *guard)?;
        Ok(f(target))
    }

    /// Resolve an instance value to its type and native cell.
    pub fn resolve(&self, value: &Dynamic) -> Result<(TypeId, NativeRef), CallError> {
        self.instances.resolve(expect_object(value)?)
    }

    /// Resolve an instance value to the shared cell of exactly `T`.
    pub fn resolve_shared<T: 'static>(&self, value: &Dynamic) -> Result<Rc<RefCell<T>>, CallError> {
        let (type_id, native) = self.resolve(value)?;
        native
            .into_any()
            .downcast::<RefCell<T>>()
            .map_err(|_| {
                CallError::type_mismatch(
                    self.registry.script_name::<T>(),
                    self.registry.type_name_of(type_id),
                )
            })
    }

    /// Bind a native cell and return the handle value.
    pub fn bind_native<T: 'static>(
        &mut self,
        native: Rc<RefCell<T>>,
        ownership: Ownership,
    ) -> Result<Dynamic, CallError> {
        let descriptor = self
            .registry
            .lookup::<T>()
            .ok_or_else(|| CallError::UnknownType(type_name::<T>().to_string()))?;
        let handle = self.instances.bind(descriptor, native, ownership);
        Ok(Dynamic::Object(handle))
    }

    /// Move a value into a new script-owned instance.
    pub fn bind_owned<T: 'static>(&mut self, value: T) -> Result<Dynamic, CallError> {
        self.bind_native(Rc::new(RefCell::new(value)), Ownership::Script)
    }

    /// Queue a pending task whose completion calls `callback`.
    ///
    /// Instances in `keep_alive` are held until the callback has run and are
    /// passed to it ahead of the outcome.
    pub fn defer(
        &mut self,
        task: impl PendingTask + 'static,
        callback: Dynamic,
        keep_alive: Vec<Dynamic>,
    ) -> Result<(), CallError> {
        if callback.as_function().is_none() {
            return Err(CallError::type_mismatch("function", callback.type_name()));
        }
        self.pending.check_capacity()?;
        let handles: Vec<ObjectHandle> =
            keep_alive.iter().filter_map(Dynamic::as_object).collect();
        if let Some(stale) = handles.iter().find(|h| !self.instances.is_live(**h)) {
            return Err(CallError::StaleHandle { index: stale.index });
        }
        for handle in &handles {
            self.instances.add_ref(*handle)?;
        }
        let result = self.pending.push(PendingEntry::new(task, callback, keep_alive));
        if result.is_err() {
            for handle in handles {
                self.instances.release(handle);
            }
        }
        result
    }

    fn already_borrowed(&self, type_id: TypeId) -> CallError {
        CallError::AlreadyBorrowed {
            type_name: self.registry.type_name_of(type_id),
        }
    }
}

/// The strong handle in a value, or `NotAnObject`.
pub fn expect_object(value: &Dynamic) -> Result<ObjectHandle, CallError> {
    value.as_object().ok_or(CallError::NotAnObject {
        actual: value.type_name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_context<R>(
        registry: &TypeRegistry,
        instances: &mut InstanceManager,
        slots: &[Dynamic],
        arg_offset: usize,
        f: impl FnOnce(&mut CallContext<'_>) -> R,
    ) -> (R, Dynamic) {
        let mut pending = PendingQueue::new(4);
        let mut ret = Dynamic::Null;
        let result = {
            let mut ctx =
                CallContext::new(registry, instances, &mut pending, slots, arg_offset, &mut ret);
            f(&mut ctx)
        };
        (result, ret)
    }

    #[test]
    fn arguments_skip_the_receiver() {
        let registry = TypeRegistry::new();
        let mut instances = InstanceManager::new();
        let slots = [Dynamic::Null, Dynamic::Int(4), Dynamic::String("s".into())];

        let ((count, first, second), _) =
            with_context(&registry, &mut instances, &slots, 1, |ctx| {
                (
                    ctx.arg_count(),
                    ctx.arg::<i32>(0).unwrap(),
                    ctx.arg::<String>(1).unwrap(),
                )
            });
        assert_eq!(count, 2);
        assert_eq!(first, 4);
        assert_eq!(second, "s");
    }

    #[test]
    fn missing_argument_is_out_of_bounds() {
        let registry = TypeRegistry::new();
        let mut instances = InstanceManager::new();
        let (err, _) = with_context(&registry, &mut instances, &[Dynamic::Null], 1, |ctx| {
            ctx.arg::<i32>(0).unwrap_err()
        });
        assert_eq!(err, CallError::ArgumentIndexOutOfBounds { index: 0, count: 0 });
    }

    #[test]
    fn set_return_converts() {
        let registry = TypeRegistry::new();
        let mut instances = InstanceManager::new();
        let (_, ret) = with_context(&registry, &mut instances, &[], 0, |ctx| {
            ctx.set_return(Some(2.5f64)).unwrap()
        });
        assert_eq!(ret, Dynamic::Float(2.5));
    }

    #[test]
    fn null_receiver_is_not_an_object() {
        let registry = TypeRegistry::new();
        let mut instances = InstanceManager::new();
        let (err, _) = with_context(&registry, &mut instances, &[Dynamic::Null], 1, |ctx| {
            ctx.with_this(|_: &u32| ()).unwrap_err()
        });
        assert_eq!(err, CallError::NotAnObject { actual: "null" });
    }

    #[test]
    fn bind_owned_requires_registered_type() {
        struct Unregistered;
        let registry = TypeRegistry::new();
        let mut instances = InstanceManager::new();
        let (err, _) = with_context(&registry, &mut instances, &[], 0, |ctx| {
            ctx.bind_owned(Unregistered).unwrap_err()
        });
        assert!(matches!(err, CallError::UnknownType(_)));
    }

    #[test]
    fn defer_requires_function_callback() {
        let registry = TypeRegistry::new();
        let mut instances = InstanceManager::new();
        let (err, _) = with_context(&registry, &mut instances, &[], 0, |ctx| {
            ctx.defer(|| crate::TaskPoll::Pending, Dynamic::Int(1), Vec::new())
                .unwrap_err()
        });
        assert_eq!(err, CallError::type_mismatch("function", "int"));
    }

    #[test]
    fn defer_with_a_stale_keep_alive_takes_no_references() {
        struct Token;
        let mut registry = TypeRegistry::new();
        registry.define_type::<Token>("Token").unwrap();
        let mut instances = InstanceManager::new();
        let descriptor = registry.lookup::<Token>().unwrap();
        let live = instances.bind(descriptor, Rc::new(RefCell::new(Token)), Ownership::Script);
        let gone = instances.bind(descriptor, Rc::new(RefCell::new(Token)), Ownership::Script);
        assert!(instances.release(gone));

        let callback = Dynamic::Function(classbind_core::TypeHash::from_function("", "done"));
        let keep_alive = vec![Dynamic::Object(live), Dynamic::Object(gone)];
        let (err, _) = with_context(&registry, &mut instances, &[], 0, |ctx| {
            ctx.defer(|| crate::TaskPoll::Pending, callback, keep_alive)
                .unwrap_err()
        });
        assert_eq!(err, CallError::StaleHandle { index: gone.index });
        assert_eq!(instances.ref_count(live), Some(1));
        assert!(instances.release(live));
        assert_eq!(instances.live_count(), 0);
    }
}
