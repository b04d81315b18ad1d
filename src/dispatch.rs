//! Script-facing dispatch entry points.
//!
//! These are what a script runtime calls when a script constructs an object,
//! reads or writes a property, or calls a method or function. Every entry
//! point resolves the target first, then runs the bound trampoline with a
//! fresh [`CallContext`].
//!
//! # Reference contract
//!
//! Arguments are borrowed. A returned `Dynamic::Object` carries one
//! reference that the caller must give back with [`Engine::release`].

use std::any::TypeId;

use tracing::trace;

use classbind_core::{CallError, Dynamic, ObjectHandle};
use classbind_registry::{
    Builtin, CONSTRUCTOR, CallContext, NativeFn, Slot, TypeDescriptor, expect_object,
};

use crate::engine::Engine;
use crate::properties::EngineProperty;

impl Engine {
    fn begin_dispatch(&mut self) {
        if !self.registry.is_sealed() && self.properties.is_enabled(EngineProperty::SealOnFirstDispatch)
        {
            self.registry.seal();
        }
    }

    fn invoke(
        &mut self,
        trampoline: &NativeFn,
        receiver: Dynamic,
        args: &[Dynamic],
    ) -> Result<Dynamic, CallError> {
        let mut slots = Vec::with_capacity(args.len() + 1);
        slots.push(receiver);
        slots.extend_from_slice(args);

        let mut ret = Dynamic::Null;
        let mut ctx = CallContext::new(
            &self.registry,
            &mut self.instances,
            &mut self.pending,
            &slots,
            1,
            &mut ret,
        );
        trampoline.call(&mut ctx)?;
        Ok(ret)
    }

    fn object_descriptor(&self, object: &Dynamic) -> Result<(ObjectHandle, &TypeDescriptor), CallError> {
        let handle = expect_object(object)?;
        let (type_id, _) = self.instances.resolve(handle)?;
        let descriptor = self.descriptor_of(type_id)?;
        Ok((handle, descriptor))
    }

    fn descriptor_of(&self, type_id: TypeId) -> Result<&TypeDescriptor, CallError> {
        self.registry
            .descriptor(type_id)
            .ok_or_else(|| CallError::UnknownType(format!("{type_id:?}")))
    }

    fn named_descriptor(&self, type_name: &str) -> Result<&TypeDescriptor, CallError> {
        self.registry
            .by_name(type_name)
            .ok_or_else(|| CallError::UnknownType(type_name.to_string()))
    }

    // ==========================================================================
    // Construction
    // ==========================================================================

    /// Call the constructor of `type_name` that takes `args.len()` arguments.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn construct(&mut self, type_name: &str, args: &[Dynamic]) -> Result<Dynamic, CallError> {
        self.begin_dispatch();
        let trampoline = self
            .named_descriptor(type_name)?
            .resolve(CONSTRUCTOR, args.len())?
            .clone();
        trace!(type_name, argc = args.len(), "construct");
        self.invoke(&trampoline, Dynamic::Null, args)
    }

    // ==========================================================================
    // Properties
    // ==========================================================================

    /// Read a property of an instance.
    ///
    /// Static values on the class object are found first, then the Get-table.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn get(&mut self, object: &Dynamic, name: &str) -> Result<Dynamic, CallError> {
        self.begin_dispatch();
        let (_, descriptor) = self.object_descriptor(object)?;
        if let Some(Slot::Static(value)) = descriptor.members().slot(name) {
            return Ok(value.clone());
        }
        let getter = descriptor
            .getter(name)
            .ok_or_else(|| CallError::MemberNotFound {
                type_name: descriptor.name().to_string(),
                member: name.to_string(),
            })?
            .trampoline()
            .clone();
        trace!(member = name, "get");
        self.invoke(&getter, object.clone(), &[])
    }

    /// Write a property of an instance through its Set-table entry.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn set(&mut self, object: &Dynamic, name: &str, value: Dynamic) -> Result<(), CallError> {
        self.begin_dispatch();
        let (_, descriptor) = self.object_descriptor(object)?;
        let setter = setter_of(descriptor, name)?;
        trace!(member = name, "set");
        self.invoke(&setter, object.clone(), &[value]).map(drop)
    }

    /// Read a class-level value: a static value or a static property.
    pub fn get_static(&mut self, type_name: &str, name: &str) -> Result<Dynamic, CallError> {
        self.begin_dispatch();
        let descriptor = self.named_descriptor(type_name)?;
        if let Some(Slot::Static(value)) = descriptor.members().slot(name) {
            return Ok(value.clone());
        }
        let getter = descriptor
            .getter(name)
            .filter(|entry| entry.is_static())
            .ok_or_else(|| CallError::MemberNotFound {
                type_name: descriptor.name().to_string(),
                member: name.to_string(),
            })?
            .trampoline()
            .clone();
        self.invoke(&getter, Dynamic::Null, &[])
    }

    /// Write a static property.
    pub fn set_static(&mut self, type_name: &str, name: &str, value: Dynamic) -> Result<(), CallError> {
        self.begin_dispatch();
        let descriptor = self.named_descriptor(type_name)?;
        let setter = setter_of(descriptor, name)?;
        self.invoke(&setter, Dynamic::Null, &[value]).map(drop)
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Call a method on an instance, selecting the overload by argument count.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_method(
        &mut self,
        object: &Dynamic,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Dynamic, CallError> {
        self.begin_dispatch();
        let (_, descriptor) = self.object_descriptor(object)?;
        if let Some(Slot::Builtin(builtin)) = descriptor.members().slot(name) {
            let builtin = *builtin;
            if !args.is_empty() {
                return Err(CallError::NoMatchingOverload {
                    name: name.to_string(),
                    arity: args.len(),
                    available: vec![0],
                });
            }
            return self.call_builtin(object, builtin);
        }
        let trampoline = descriptor.resolve(name, args.len())?.clone();
        trace!(type_name = descriptor.name(), member = name, argc = args.len(), "call method");
        self.invoke(&trampoline, object.clone(), args)
    }

    fn call_builtin(&mut self, object: &Dynamic, builtin: Builtin) -> Result<Dynamic, CallError> {
        match builtin {
            Builtin::WeakRef => self.weak_ref(object),
            Builtin::TypeOf => self.type_of(object).map(Dynamic::String),
            Builtin::Cloned => self.clone_object(object),
        }
    }

    /// Call a static method of `type_name`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_static(
        &mut self,
        type_name: &str,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Dynamic, CallError> {
        self.begin_dispatch();
        let trampoline = self
            .named_descriptor(type_name)?
            .resolve(name, args.len())?
            .clone();
        trace!(type_name, member = name, argc = args.len(), "call static");
        self.invoke(&trampoline, Dynamic::Null, args)
    }

    /// Call a namespace function by path: `"string.upper"`, or `"name"` for
    /// the root table.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call_function(&mut self, path: &str, args: &[Dynamic]) -> Result<Dynamic, CallError> {
        let (namespace, name) = path.rsplit_once('.').unwrap_or(("", path));
        self.call_namespace_function(namespace, name, args)
    }

    fn call_namespace_function(
        &mut self,
        namespace: &str,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Dynamic, CallError> {
        self.begin_dispatch();
        let unknown = || {
            if namespace.is_empty() {
                CallError::UnknownFunction(name.to_string())
            } else {
                CallError::UnknownFunction(format!("{namespace}.{name}"))
            }
        };
        let table = self.registry.namespace_table(namespace).ok_or_else(unknown)?;
        let trampoline = match table.resolve(name, args.len()) {
            Ok(trampoline) => trampoline.clone(),
            Err(CallError::MemberNotFound { .. }) => return Err(unknown()),
            Err(err) => return Err(err),
        };
        trace!(namespace, name, argc = args.len(), "call function");
        self.invoke(&trampoline, Dynamic::Null, args)
    }

    /// Call a function value, as passed to a callback.
    pub fn call_value(&mut self, callee: &Dynamic, args: &[Dynamic]) -> Result<Dynamic, CallError> {
        let hash = callee
            .as_function()
            .ok_or_else(|| CallError::NotCallable(callee.type_name().to_string()))?;
        let (namespace, name) = self
            .registry
            .function_by_hash(hash)
            .map(|(namespace, name)| (namespace.to_string(), name.to_string()))
            .ok_or_else(|| CallError::UnknownFunction(hash.to_string()))?;
        self.call_namespace_function(&namespace, &name, args)
    }

    // ==========================================================================
    // Builtins
    // ==========================================================================

    /// Copy an instance with its type's copy function (`_cloned`).
    ///
    /// The copy is a new native object with its own handle.
    pub fn clone_object(&mut self, object: &Dynamic) -> Result<Dynamic, CallError> {
        self.begin_dispatch();
        let handle = expect_object(object)?;
        let copy = self.instances.duplicate(&self.registry, handle)?;
        trace!(original = %handle, %copy, "cloned instance");
        Ok(Dynamic::Object(copy))
    }

    /// Script name of an instance's class (`_typeof`).
    pub fn type_of(&self, object: &Dynamic) -> Result<String, CallError> {
        let (_, descriptor) = self.object_descriptor(object)?;
        Ok(descriptor.name().to_string())
    }

    /// A weak reference to a live instance (`weakref`).
    pub fn weak_ref(&self, object: &Dynamic) -> Result<Dynamic, CallError> {
        let handle = expect_object(object)?;
        self.instances.resolve(handle)?;
        Ok(Dynamic::WeakRef(handle))
    }

    /// Upgrade a weak reference. A dead target yields `null`.
    pub fn upgrade_weak(&mut self, weak: &Dynamic) -> Result<Dynamic, CallError> {
        let Dynamic::WeakRef(handle) = weak else {
            return Err(CallError::type_mismatch("weakref", weak.type_name()));
        };
        if self.instances.resolve(*handle).is_err() {
            return Ok(Dynamic::Null);
        }
        self.instances.add_ref(*handle)?;
        Ok(Dynamic::Object(*handle))
    }

    /// Take one more reference on an instance handle.
    pub fn add_ref(&mut self, value: &Dynamic) -> Result<(), CallError> {
        self.instances.add_ref(expect_object(value)?)
    }

    /// Give back one reference. Returns true when the handle was finalized.
    ///
    /// Values other than instance handles are ignored.
    pub fn release(&mut self, value: &Dynamic) -> bool {
        match value {
            Dynamic::Object(handle) => self.instances.release(*handle),
            _ => false,
        }
    }

    /// Whether an instance's class is `type_name` or derives from it.
    pub fn instance_of(&self, object: &Dynamic, type_name: &str) -> Result<bool, CallError> {
        let (type_id, _) = self.instances.resolve(expect_object(object)?)?;
        let target = self.named_descriptor(type_name)?;
        Ok(self.registry.is_a(type_id, target.type_id()))
    }
}

fn setter_of(descriptor: &TypeDescriptor, name: &str) -> Result<NativeFn, CallError> {
    if let Some(entry) = descriptor.setter(name) {
        return Ok(entry.trampoline().clone());
    }
    if descriptor.getter(name).is_some() || descriptor.members().contains(name) {
        return Err(CallError::ReadOnly {
            type_name: descriptor.name().to_string(),
            member: name.to_string(),
        });
    }
    Err(CallError::MemberNotFound {
        type_name: descriptor.name().to_string(),
        member: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use classbind_core::RegistrationError;

    #[derive(Clone)]
    struct Lamp {
        on: bool,
    }

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine
            .define_type::<Lamp>("Lamp")
            .unwrap()
            .ctor(|| Lamp { on: false })
            .unwrap()
            .property("on", |l: &Lamp| l.on, |l: &mut Lamp, on: bool| l.on = on)
            .method("toggle", |l: &mut Lamp| l.on = !l.on)
            .static_value("Watts", 60i64);
        engine
    }

    #[test]
    fn first_dispatch_seals_registration() {
        let mut engine = engine();
        let lamp = engine.construct("Lamp", &[]).unwrap();
        assert!(engine.registry().is_sealed());
        assert!(matches!(
            engine.define_type::<String>("Text"),
            Err(RegistrationError::Sealed(_))
        ));
        engine.release(&lamp);
    }

    #[test]
    fn sealing_can_be_disabled() {
        let mut engine = engine();
        engine.set_property(EngineProperty::SealOnFirstDispatch, 0);
        let lamp = engine.construct("Lamp", &[]).unwrap();
        assert!(!engine.registry().is_sealed());
        engine.release(&lamp);
    }

    #[test]
    fn get_set_and_call() {
        let mut engine = engine();
        let lamp = engine.construct("Lamp", &[]).unwrap();
        assert_eq!(engine.get(&lamp, "on").unwrap(), Dynamic::Bool(false));
        engine.call_method(&lamp, "toggle", &[]).unwrap();
        assert_eq!(engine.get(&lamp, "on").unwrap(), Dynamic::Bool(true));
        engine.set(&lamp, "on", Dynamic::Bool(false)).unwrap();
        assert_eq!(engine.get(&lamp, "on").unwrap(), Dynamic::Bool(false));
        assert_eq!(engine.get(&lamp, "Watts").unwrap(), Dynamic::Int(60));
    }

    #[test]
    fn static_values_are_read_only() {
        let mut engine = engine();
        assert_eq!(engine.get_static("Lamp", "Watts").unwrap(), Dynamic::Int(60));
        assert!(matches!(
            engine.set_static("Lamp", "Watts", Dynamic::Int(1)),
            Err(CallError::ReadOnly { .. })
        ));
        assert!(matches!(
            engine.get_static("Lamp", "on"),
            Err(CallError::MemberNotFound { .. })
        ));
    }

    #[test]
    fn setter_type_mismatch_is_recoverable() {
        let mut engine = engine();
        let lamp = engine.construct("Lamp", &[]).unwrap();
        assert_eq!(
            engine.set(&lamp, "on", Dynamic::String("yes".into())),
            Err(CallError::type_mismatch("bool", "string"))
        );
        assert_eq!(engine.get(&lamp, "on").unwrap(), Dynamic::Bool(false));
    }

    #[test]
    fn builtins_take_no_arguments() {
        let mut engine = engine();
        let lamp = engine.construct("Lamp", &[]).unwrap();
        assert_eq!(
            engine.call_method(&lamp, "_typeof", &[]).unwrap(),
            Dynamic::String("Lamp".into())
        );
        assert!(matches!(
            engine.call_method(&lamp, "_typeof", &[Dynamic::Int(1)]),
            Err(CallError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn unknown_targets() {
        let mut engine = engine();
        assert_eq!(
            engine.construct("Nope", &[]),
            Err(CallError::UnknownType("Nope".into()))
        );
        assert_eq!(
            engine.call_function("math.nope", &[]),
            Err(CallError::UnknownFunction("math.nope".into()))
        );
        assert!(matches!(
            engine.call_value(&Dynamic::Int(3), &[]),
            Err(CallError::NotCallable(_))
        ));
        assert!(matches!(
            engine.get(&Dynamic::Null, "on"),
            Err(CallError::NotAnObject { actual: "null" })
        ));
    }
}
