//! The engine: one runtime instance with its registry, instances and queue.

use std::any::TypeId;
use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use classbind_core::{CallError, Dynamic, RegistrationError};
use classbind_registry::{
    ClassBuilder, Derives, InstanceManager, NamespaceBuilder, NativeAddr, NativeCell, Ownership,
    PendingQueue, TypeRegistry, expect_object,
};

use crate::properties::{EngineProperties, EngineProperty};

/// One runtime instance.
///
/// Owns the type registry, the instance tables with the script heap, and the
/// pending-task queue. An engine is single-threaded (`!Send`); separate
/// engines share nothing.
///
/// # Example
///
/// ```
/// use classbind::{Dynamic, Engine};
///
/// struct Counter {
///     value: i64,
/// }
///
/// let mut engine = Engine::new();
/// engine
///     .define_type::<Counter>("Counter")
///     .unwrap()
///     .ctor(|start: i64| Counter { value: start })
///     .unwrap()
///     .method("inc", |c: &mut Counter| {
///         c.value += 1;
///         c.value
///     });
///
/// let counter = engine.construct("Counter", &[Dynamic::Int(1)]).unwrap();
/// assert_eq!(engine.call_method(&counter, "inc", &[]).unwrap(), Dynamic::Int(2));
/// engine.release(&counter);
/// ```
#[derive(Debug)]
pub struct Engine {
    pub(crate) registry: TypeRegistry,
    pub(crate) instances: InstanceManager,
    pub(crate) pending: PendingQueue,
    pub(crate) properties: EngineProperties,
}

impl Engine {
    /// Create an engine with default properties and no bound types.
    pub fn new() -> Self {
        Self::with_properties(EngineProperties::default())
    }

    pub fn with_properties(properties: EngineProperties) -> Self {
        let heap_capacity = properties.get(EngineProperty::InitialHeapCapacity);
        let queue_capacity = properties.get(EngineProperty::MaxPendingTasks);
        Self {
            registry: TypeRegistry::new(),
            instances: InstanceManager::with_capacity(heap_capacity),
            pending: PendingQueue::new(queue_capacity),
            properties,
        }
    }

    /// Create an engine with every module of `classbind-modules` installed.
    pub fn with_default_modules() -> Result<Self, RegistrationError> {
        let mut engine = Self::new();
        engine.install(classbind_modules::register_all)?;
        Ok(engine)
    }

    /// Run a module's registration function against this engine's registry.
    pub fn install<F>(&mut self, register: F) -> Result<(), RegistrationError>
    where
        F: FnOnce(&mut TypeRegistry) -> Result<(), RegistrationError>,
    {
        register(&mut self.registry)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    pub fn define_type<T: 'static>(
        &mut self,
        name: &str,
    ) -> Result<ClassBuilder<'_, T>, RegistrationError> {
        self.registry.define_type::<T>(name)
    }

    pub fn define_derived_type<T, B>(
        &mut self,
        name: &str,
    ) -> Result<ClassBuilder<'_, T>, RegistrationError>
    where
        T: Derives<B>,
        B: 'static,
    {
        self.registry.define_derived_type::<T, B>(name)
    }

    pub fn extend_type<T: 'static>(&mut self) -> Result<ClassBuilder<'_, T>, RegistrationError> {
        self.registry.extend_type::<T>()
    }

    pub fn namespace(&mut self, name: &str) -> Result<NamespaceBuilder<'_>, RegistrationError> {
        self.registry.namespace(name)
    }

    /// Close registration now instead of at the first dispatch.
    pub fn seal(&mut self) {
        self.registry.seal();
    }

    // ==========================================================================
    // Properties
    // ==========================================================================

    pub fn property(&self, property: EngineProperty) -> usize {
        self.properties.get(property)
    }

    /// Set a property, returning the previous value.
    ///
    /// `MaxPendingTasks` resizes the queue immediately. `InitialHeapCapacity`
    /// only affects engines built from these properties.
    pub fn set_property(&mut self, property: EngineProperty, value: usize) -> usize {
        let previous = self.properties.set(property, value);
        if property == EngineProperty::MaxPendingTasks {
            self.pending.set_capacity(value);
        }
        debug!(?property, value, previous, "engine property set");
        previous
    }

    // ==========================================================================
    // Host-side binding
    // ==========================================================================

    /// Bind a host object the script co-owns. The returned handle carries one
    /// reference.
    pub fn bind_shared<T: 'static>(&mut self, native: &Rc<RefCell<T>>) -> Result<Dynamic, CallError> {
        self.bind_native(native, Ownership::Shared)
    }

    /// Bind a host object the script never keeps alive.
    pub fn bind_host<T: 'static>(&mut self, native: &Rc<RefCell<T>>) -> Result<Dynamic, CallError> {
        self.bind_native(native, Ownership::Host)
    }

    fn bind_native<T: 'static>(
        &mut self,
        native: &Rc<RefCell<T>>,
        ownership: Ownership,
    ) -> Result<Dynamic, CallError> {
        let descriptor = self
            .registry
            .lookup::<T>()
            .ok_or_else(|| CallError::UnknownType(std::any::type_name::<T>().to_string()))?;
        let handle = self.instances.bind(descriptor, Rc::clone(native) as Rc<dyn NativeCell>, ownership);
        Ok(Dynamic::Object(handle))
    }

    /// Forget the record for a host object. Handles to it become stale.
    pub fn unbind<T: 'static>(&mut self, native: &Rc<RefCell<T>>) -> bool {
        self.instances
            .unbind(TypeId::of::<T>(), NativeAddr::of(native))
            .is_some()
    }

    /// The native cell behind a handle, which must be exactly a `T`.
    pub fn resolve<T: 'static>(&self, value: &Dynamic) -> Result<Rc<RefCell<T>>, CallError> {
        let (type_id, native) = self.instances.resolve(expect_object(value)?)?;
        native.into_any().downcast::<RefCell<T>>().map_err(|_| {
            CallError::type_mismatch(
                self.registry.script_name::<T>(),
                self.registry.type_name_of(type_id),
            )
        })
    }

    /// Address of the native object behind a handle.
    pub fn resolve_address(&self, value: &Dynamic) -> Result<NativeAddr, CallError> {
        self.instances.resolve_address(expect_object(value)?)
    }

    /// Borrow the object behind a handle as `T` or as its `T` base part.
    pub fn with_instance<T: 'static, R>(
        &self,
        value: &Dynamic,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, CallError> {
        let (type_id, native) = self.instances.resolve(expect_object(value)?)?;
        let guard = native
            .try_borrow_any()
            .map_err(|_| CallError::AlreadyBorrowed {
                type_name: self.registry.type_name_of(type_id),
            })?;
        Ok(f(self.registry.upcast_ref::<T>(type_id, &*guard)?))
    }

    /// Mutable form of [`with_instance`](Self::with_instance).
    pub fn with_instance_mut<T: 'static, R>(
        &self,
        value: &Dynamic,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CallError> {
        let (type_id, native) = self.instances.resolve(expect_object(value)?)?;
        let mut guard = native
            .try_borrow_any_mut()
            .map_err(|_| CallError::AlreadyBorrowed {
                type_name: self.registry.type_name_of(type_id),
            })?;
        Ok(f(self.registry.upcast_mut::<T>(type_id, &mut *guard)?))
    }

    /// Number of live script handles.
    pub fn live_handles(&self) -> usize {
        self.instances.live_count()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Sensor {
        id: u32,
    }

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.define_type::<Sensor>("Sensor").unwrap();
        engine
    }

    #[test]
    fn bind_shared_then_resolve() {
        let mut engine = engine();
        let sensor = Rc::new(RefCell::new(Sensor { id: 3 }));
        let handle = engine.bind_shared(&sensor).unwrap();

        let resolved = engine.resolve::<Sensor>(&handle).unwrap();
        assert!(Rc::ptr_eq(&resolved, &sensor));
        assert_eq!(
            engine.resolve_address(&handle).unwrap(),
            NativeAddr::of(&sensor)
        );
    }

    #[test]
    fn unregistered_types_cannot_bind() {
        let mut engine = Engine::new();
        let sensor = Rc::new(RefCell::new(Sensor { id: 1 }));
        assert!(matches!(
            engine.bind_host(&sensor),
            Err(CallError::UnknownType(_))
        ));
    }

    #[test]
    fn resolve_as_wrong_type_is_mismatch() {
        let mut engine = engine();
        engine.define_type::<String>("Text").unwrap();
        let sensor = Rc::new(RefCell::new(Sensor { id: 1 }));
        let handle = engine.bind_host(&sensor).unwrap();
        assert_eq!(
            engine.resolve::<String>(&handle).unwrap_err(),
            CallError::type_mismatch("Text", "Sensor")
        );
    }

    #[test]
    fn with_instance_mut_writes_through() {
        let mut engine = engine();
        let sensor = Rc::new(RefCell::new(Sensor { id: 1 }));
        let handle = engine.bind_host(&sensor).unwrap();
        engine
            .with_instance_mut(&handle, |p: &mut Sensor| p.id = 9)
            .unwrap();
        assert_eq!(sensor.borrow().id, 9);
    }

    #[test]
    fn queue_capacity_follows_property() {
        let mut engine = Engine::new();
        assert_eq!(engine.set_property(EngineProperty::MaxPendingTasks, 2), 1024);
        assert_eq!(engine.pending.capacity(), 2);
    }

    #[test]
    fn heap_capacity_is_read_at_construction() {
        let mut properties = EngineProperties::new();
        properties.set(EngineProperty::InitialHeapCapacity, 8);
        let mut engine = Engine::with_properties(properties);
        assert_eq!(engine.property(EngineProperty::InitialHeapCapacity), 8);

        assert_eq!(engine.set_property(EngineProperty::InitialHeapCapacity, 256), 8);
        assert_eq!(engine.property(EngineProperty::InitialHeapCapacity), 256);
        assert_eq!(engine.pending.capacity(), 1024);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn default_modules_install_once() {
        let mut engine = Engine::with_default_modules().unwrap();
        assert!(engine.registry().by_name("Circle").is_some());
        assert!(engine.install(classbind_modules::register_all).is_err());
    }
}
