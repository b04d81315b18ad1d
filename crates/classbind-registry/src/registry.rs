//! TypeRegistry - the type descriptor store.
//!
//! This module provides [`TypeRegistry`], the storage for every bound native
//! type and every namespace table of one engine. Descriptors are keyed by
//! [`TypeId`], with secondary indexes by script name and by class hash.
//!
//! # Lifecycle
//!
//! - **Registration phase**: modules define types, members and namespace
//!   functions. Any conflict is a [`RegistrationError`].
//! - **Execution phase**: after [`seal`](TypeRegistry::seal) the registry is
//!   read-only and further registration fails with
//!   [`RegistrationError::Sealed`].
//!
//! # Inheritance
//!
//! A derived type is a snapshot of its base at derivation time (see
//! [`TypeDescriptor`]). The parent link is only walked for is-a checks,
//! diagnostics and receiver upcasting, never for member lookup.
//!
//! # Example
//!
//! ```
//! use classbind_registry::TypeRegistry;
//!
//! struct Counter {
//!     value: i64,
//! }
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .define_type::<Counter>("Counter")
//!     .unwrap()
//!     .ctor(|| Counter { value: 0 })
//!     .unwrap()
//!     .method("get", |c: &Counter| c.value);
//!
//! assert!(registry.lookup::<Counter>().is_some());
//! assert!(registry.define_type::<Counter>("Counter").is_err());
//! ```

use std::any::{Any, TypeId, type_name};

use rustc_hash::FxHashMap;
use tracing::debug;

use classbind_core::{CallError, Dynamic, RegistrationError, TypeHash};

use crate::class_builder::ClassBuilder;
use crate::descriptor::{Derives, TypeDescriptor, Upcast};
use crate::member::{MemberTable, Slot};
use crate::namespace_builder::NamespaceBuilder;

/// Registry of bound native types and namespace tables.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    /// Descriptors by native type (primary storage).
    types: FxHashMap<TypeId, TypeDescriptor>,

    /// Script name -> native type.
    names: FxHashMap<String, TypeId>,

    /// Class hash -> native type.
    hashes: FxHashMap<TypeHash, TypeId>,

    /// Namespace tables by name; `""` is the root table.
    namespaces: FxHashMap<String, MemberTable>,

    /// Function value hash -> (namespace, name).
    functions: FxHashMap<TypeHash, (String, String)>,

    sealed: bool,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Registration
    // ==========================================================================

    /// Register `T` under a script name and return its new descriptor.
    pub fn register_type<T: 'static>(
        &mut self,
        name: &str,
    ) -> Result<&mut TypeDescriptor, RegistrationError> {
        self.check_new_type::<T>(name)?;
        let descriptor = TypeDescriptor::new(name, TypeId::of::<T>(), type_name::<T>());
        Ok(self.insert(descriptor))
    }

    /// Register `T` as derived from the already registered `B`.
    ///
    /// The new descriptor starts as a snapshot of `B`'s tables.
    pub fn register_derived_type<T, B>(
        &mut self,
        name: &str,
    ) -> Result<&mut TypeDescriptor, RegistrationError>
    where
        T: Derives<B>,
        B: 'static,
    {
        self.check_new_type::<T>(name)?;
        let base = self.types.get(&TypeId::of::<B>()).ok_or_else(|| {
            RegistrationError::BaseNotRegistered {
                derived: name.to_string(),
                base: type_name::<B>(),
            }
        })?;
        let descriptor = base.derive(
            name,
            TypeId::of::<T>(),
            type_name::<T>(),
            Upcast::of::<T, B>(),
        );
        Ok(self.insert(descriptor))
    }

    /// Register `T` and start binding its members.
    pub fn define_type<T: 'static>(
        &mut self,
        name: &str,
    ) -> Result<ClassBuilder<'_, T>, RegistrationError> {
        self.register_type::<T>(name).map(ClassBuilder::new)
    }

    /// Register `T` as derived from `B` and start binding its own members.
    pub fn define_derived_type<T, B>(
        &mut self,
        name: &str,
    ) -> Result<ClassBuilder<'_, T>, RegistrationError>
    where
        T: Derives<B>,
        B: 'static,
    {
        self.register_derived_type::<T, B>(name)
            .map(ClassBuilder::new)
    }

    /// Reopen an already registered type to bind more members.
    pub fn extend_type<T: 'static>(&mut self) -> Result<ClassBuilder<'_, T>, RegistrationError> {
        if self.sealed {
            return Err(RegistrationError::Sealed(type_name::<T>().to_string()));
        }
        self.descriptor_mut(TypeId::of::<T>())
            .map(ClassBuilder::new)
            .ok_or_else(|| RegistrationError::TypeNotFound(type_name::<T>().to_string()))
    }

    /// Open a namespace table, creating it on first use. `""` is the root table.
    pub fn namespace(&mut self, name: &str) -> Result<NamespaceBuilder<'_>, RegistrationError> {
        if self.sealed {
            return Err(RegistrationError::Sealed(name.to_string()));
        }
        if name.contains('.') {
            return Err(RegistrationError::InvalidName(name.to_string()));
        }
        let table = self
            .namespaces
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(namespace = name, "created namespace table");
                MemberTable::new(name)
            });
        Ok(NamespaceBuilder::new(name, table, &mut self.functions))
    }

    fn check_new_type<T: 'static>(&self, name: &str) -> Result<(), RegistrationError> {
        if self.sealed {
            return Err(RegistrationError::Sealed(name.to_string()));
        }
        if name.is_empty() || name.contains('.') {
            return Err(RegistrationError::InvalidName(name.to_string()));
        }
        if let Some(existing) = self.types.get(&TypeId::of::<T>()) {
            return Err(RegistrationError::DuplicateType {
                rust_type: type_name::<T>(),
                existing: existing.name().to_string(),
            });
        }
        if self.names.contains_key(name) {
            return Err(RegistrationError::DuplicateTypeName(name.to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, descriptor: TypeDescriptor) -> &mut TypeDescriptor {
        let type_id = descriptor.type_id();
        debug!(
            type_name = descriptor.name(),
            rust_type = descriptor.rust_name(),
            base = descriptor.base_name(),
            "registered type"
        );
        self.names.insert(descriptor.name().to_string(), type_id);
        self.hashes.insert(descriptor.hash(), type_id);
        self.types.entry(type_id).or_insert(descriptor)
    }

    /// Close registration. Later registration calls fail with `Sealed`.
    pub fn seal(&mut self) {
        if !self.sealed {
            debug!(types = self.types.len(), "registry sealed");
            self.sealed = true;
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    /// Descriptor of `T`, if registered.
    pub fn lookup<T: 'static>(&self) -> Option<&TypeDescriptor> {
        self.types.get(&TypeId::of::<T>())
    }

    pub fn descriptor(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.types.get(&type_id)
    }

    pub(crate) fn descriptor_mut(&mut self, type_id: TypeId) -> Option<&mut TypeDescriptor> {
        self.types.get_mut(&type_id)
    }

    /// Descriptor by script name.
    pub fn by_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.names.get(name).and_then(|id| self.types.get(id))
    }

    /// Descriptor by class hash.
    pub fn by_hash(&self, hash: TypeHash) -> Option<&TypeDescriptor> {
        self.hashes.get(&hash).and_then(|id| self.types.get(id))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered script names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Script name of `T`, or its Rust name when unregistered.
    pub fn script_name<T: 'static>(&self) -> String {
        self.lookup::<T>()
            .map_or_else(|| type_name::<T>().to_string(), |d| d.name().to_string())
    }

    /// Script name of a native type, for diagnostics.
    pub fn type_name_of(&self, type_id: TypeId) -> String {
        self.types
            .get(&type_id)
            .map_or_else(|| "<unregistered>".to_string(), |d| d.name().to_string())
    }

    // ==========================================================================
    // Parent chain
    // ==========================================================================

    /// Whether `type_id` is `ancestor` or derives from it.
    pub fn is_a(&self, type_id: TypeId, ancestor: TypeId) -> bool {
        let mut current = Some(type_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.types.get(&id).and_then(TypeDescriptor::base);
        }
        false
    }

    /// Script names of every base of `type_id`, nearest first.
    pub fn ancestors(&self, type_id: TypeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut current = self.types.get(&type_id).and_then(TypeDescriptor::base);
        while let Some(descriptor) = current.and_then(|id| self.types.get(&id)) {
            names.push(descriptor.name());
            current = descriptor.base();
        }
        names
    }

    /// View a value of type `type_id` as `T`, walking up the parent chain.
    pub fn upcast_ref<'a, T: 'static>(
        &self,
        type_id: TypeId,
        value: &'a dyn Any,
    ) -> Result<&'a T, CallError> {
        let mut current = value;
        let mut key = type_id;
        loop {
            if let Some(target) = current.downcast_ref::<T>() {
                return Ok(target);
            }
            let (upcast, base) = self.parent_link(key).ok_or_else(|| self.mismatch::<T>(type_id))?;
            current = (upcast.as_ref)(current).ok_or_else(|| self.mismatch::<T>(type_id))?;
            key = base;
        }
    }

    /// Mutable form of [`upcast_ref`](Self::upcast_ref).
    pub fn upcast_mut<'a, T: 'static>(
        &self,
        type_id: TypeId,
        value: &'a mut dyn Any,
    ) -> Result<&'a mut T, CallError> {
        let mut current = value;
        let mut key = type_id;
        loop {
            if current.is::<T>() {
                return current
                    .downcast_mut::<T>()
                    .ok_or_else(|| self.mismatch::<T>(type_id));
            }
            let (upcast, base) = self.parent_link(key).ok_or_else(|| self.mismatch::<T>(type_id))?;
            current = (upcast.as_mut)(current).ok_or_else(|| self.mismatch::<T>(type_id))?;
            key = base;
        }
    }

    fn parent_link(&self, type_id: TypeId) -> Option<(Upcast, TypeId)> {
        let descriptor = self.types.get(&type_id)?;
        Some((descriptor.upcast()?, descriptor.base()?))
    }

    fn mismatch<T: 'static>(&self, actual: TypeId) -> CallError {
        CallError::type_mismatch(self.script_name::<T>(), self.type_name_of(actual))
    }

    // ==========================================================================
    // Namespaces
    // ==========================================================================

    pub fn namespace_table(&self, name: &str) -> Option<&MemberTable> {
        self.namespaces.get(name)
    }

    /// A callable value for a namespace function, usable as a callback.
    pub fn function_ref(&self, namespace: &str, name: &str) -> Option<Dynamic> {
        let slot = self.namespaces.get(namespace)?.slot(name)?;
        match slot {
            Slot::Function(_) | Slot::Overloaded | Slot::Raw { .. } => {
                Some(Dynamic::Function(TypeHash::from_function(namespace, name)))
            }
            Slot::Static(_) | Slot::Builtin(_) => None,
        }
    }

    /// The `(namespace, name)` a function value refers to.
    pub fn function_by_hash(&self, hash: TypeHash) -> Option<(&str, &str)> {
        self.functions
            .get(&hash)
            .map(|(namespace, name)| (namespace.as_str(), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{AccessorEntry, SourceShape};
    use crate::call_context::CallContext;
    use crate::descriptor::CONSTRUCTOR;
    use crate::native_fn::NativeFn;

    struct Shape {
        area: f64,
    }

    struct Circle {
        shape: Shape,
        radius: f64,
    }

    impl Derives<Shape> for Circle {
        fn base(&self) -> &Shape {
            &self.shape
        }

        fn base_mut(&mut self) -> &mut Shape {
            &mut self.shape
        }
    }

    struct Ring {
        circle: Circle,
    }

    impl Derives<Circle> for Ring {
        fn base(&self) -> &Circle {
            &self.circle
        }

        fn base_mut(&mut self) -> &mut Circle {
            &mut self.circle
        }
    }

    fn noop() -> NativeFn {
        NativeFn::new(|_ctx: &mut CallContext<'_>| Ok(()))
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Shape>("Shape").unwrap();

        let descriptor = registry.lookup::<Shape>().unwrap();
        assert_eq!(descriptor.name(), "Shape");
        assert!(descriptor.base().is_none());
        assert!(std::ptr::eq(registry.by_name("Shape").unwrap(), descriptor));
        assert!(std::ptr::eq(
            registry.by_hash(TypeHash::from_name("Shape")).unwrap(),
            descriptor
        ));
        assert!(registry.lookup::<Circle>().is_none());
    }

    #[test]
    fn duplicate_type_keeps_first_descriptor() {
        let mut registry = TypeRegistry::new();
        registry
            .register_type::<Shape>("Shape")
            .unwrap()
            .bind_getter(AccessorEntry::new("area", SourceShape::Method, noop()));

        let err = registry.register_type::<Shape>("Other").unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateType { ref existing, .. } if existing == "Shape"));
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup::<Shape>().unwrap().getter("area").is_some());
        assert!(registry.by_name("Other").is_none());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Shape>("Shape").unwrap();
        assert_eq!(
            registry.register_type::<Circle>("Shape").unwrap_err(),
            RegistrationError::DuplicateTypeName("Shape".into())
        );
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut registry = TypeRegistry::new();
        for name in ["", "geo.Shape"] {
            assert_eq!(
                registry.register_type::<Shape>(name).unwrap_err(),
                RegistrationError::InvalidName(name.into())
            );
        }
        assert!(matches!(
            registry.namespace("a.b"),
            Err(RegistrationError::InvalidName(_))
        ));
    }

    #[test]
    fn derived_requires_registered_base() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register_derived_type::<Circle, Shape>("Circle")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::BaseNotRegistered { .. }));
    }

    #[test]
    fn derived_snapshot_is_isolated_both_ways() {
        let mut registry = TypeRegistry::new();
        registry
            .register_type::<Shape>("Shape")
            .unwrap()
            .bind_getter(AccessorEntry::new("area", SourceShape::Method, noop()));
        registry
            .register_derived_type::<Circle, Shape>("Circle")
            .unwrap()
            .bind_getter(AccessorEntry::new("radius", SourceShape::Field, noop()));

        // Added to the base after derivation.
        registry
            .descriptor_mut(TypeId::of::<Shape>())
            .unwrap()
            .bind_getter(AccessorEntry::new("perimeter", SourceShape::Method, noop()));

        let shape = registry.lookup::<Shape>().unwrap();
        let circle = registry.lookup::<Circle>().unwrap();
        assert!(circle.getter("area").unwrap().is_inherited());
        assert!(circle.getter("perimeter").is_none());
        assert!(shape.getter("radius").is_none());
    }

    #[test]
    fn overloads_are_inherited_but_constructors_are_not() {
        let mut registry = TypeRegistry::new();
        {
            let shape = registry.register_type::<Shape>("Shape").unwrap();
            shape
                .bind_overload(CONSTRUCTOR, 0, Default::default(), noop())
                .unwrap();
            shape
                .bind_overload("scale", 1, Default::default(), noop())
                .unwrap();
        }
        let circle = registry
            .register_derived_type::<Circle, Shape>("Circle")
            .unwrap();
        assert!(circle.resolve("scale", 1).is_ok());
        assert!(matches!(
            circle.resolve(CONSTRUCTOR, 0),
            Err(CallError::NoMatchingOverload { .. })
        ));
        // Overriding an inherited pair is allowed once.
        circle
            .bind_overload("scale", 1, Default::default(), noop())
            .unwrap();
        assert!(matches!(
            circle.bind_overload("scale", 1, Default::default(), noop()),
            Err(RegistrationError::DuplicateOverload { .. })
        ));
    }

    #[test]
    fn is_a_and_ancestors_follow_parent_chain() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Shape>("Shape").unwrap();
        registry
            .register_derived_type::<Circle, Shape>("Circle")
            .unwrap();
        registry.register_derived_type::<Ring, Circle>("Ring").unwrap();

        let ring = TypeId::of::<Ring>();
        assert!(registry.is_a(ring, TypeId::of::<Shape>()));
        assert!(registry.is_a(ring, ring));
        assert!(!registry.is_a(TypeId::of::<Shape>(), ring));
        assert_eq!(registry.ancestors(ring), vec!["Circle", "Shape"]);
    }

    #[test]
    fn upcast_walks_two_levels() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Shape>("Shape").unwrap();
        registry
            .register_derived_type::<Circle, Shape>("Circle")
            .unwrap();
        registry.register_derived_type::<Ring, Circle>("Ring").unwrap();

        let mut ring = Ring {
            circle: Circle {
                shape: Shape { area: 3.0 },
                radius: 1.0,
            },
        };
        let ring_id = TypeId::of::<Ring>();
        let shape = registry.upcast_ref::<Shape>(ring_id, &ring).unwrap();
        assert_eq!(shape.area, 3.0);
        let circle = registry.upcast_ref::<Circle>(ring_id, &ring).unwrap();
        assert_eq!(circle.radius, 1.0);

        registry
            .upcast_mut::<Shape>(ring_id, &mut ring)
            .unwrap()
            .area = 5.0;
        assert_eq!(ring.circle.shape.area, 5.0);
    }

    #[test]
    fn upcast_to_unrelated_type_is_mismatch() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Shape>("Shape").unwrap();
        let shape = Shape { area: 1.0 };
        assert_eq!(
            registry
                .upcast_ref::<Circle>(TypeId::of::<Shape>(), &shape)
                .err(),
            Some(CallError::type_mismatch(type_name::<Circle>(), "Shape"))
        );
    }

    #[test]
    fn sealed_registry_rejects_registration() {
        let mut registry = TypeRegistry::new();
        registry.register_type::<Shape>("Shape").unwrap();
        registry.seal();
        assert!(registry.is_sealed());
        assert_eq!(
            registry.register_type::<Circle>("Circle").unwrap_err(),
            RegistrationError::Sealed("Circle".into())
        );
        assert!(registry.extend_type::<Shape>().is_err());
        assert!(registry.namespace("math").is_err());
    }

    #[test]
    fn extend_requires_registration() {
        let mut registry = TypeRegistry::new();
        assert!(matches!(
            registry.extend_type::<Shape>(),
            Err(RegistrationError::TypeNotFound(_))
        ));
    }

    #[test]
    fn function_refs_resolve_back_to_names() {
        let mut registry = TypeRegistry::new();
        registry
            .namespace("math")
            .unwrap()
            .function("double", |x: i64| x * 2)
            .value("half", 0.5);

        let value = registry.function_ref("math", "double").unwrap();
        let hash = value.as_function().unwrap();
        assert_eq!(registry.function_by_hash(hash), Some(("math", "double")));
        assert!(registry.function_ref("math", "half").is_none());
        assert!(registry.function_ref("math", "missing").is_none());
    }
}
