//! Fluent builder for binding the members of one native type.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::RangeInclusive;
use std::rc::Rc;

use classbind_core::{CallError, IntoDynamic, RegistrationError};

use crate::accessor::{self, AccessorEntry, Field, SetterResult, SourceShape};
use crate::call_context::CallContext;
use crate::descriptor::{CONSTRUCTOR, TypeDescriptor, copy_native};
use crate::marshal::{FromScript, ToScript};
use crate::member::{FunctionEntry, MemberFlags};
use crate::native_fn::{IntoConstructor, IntoFunction, IntoMethod, NativeFn};

/// Binds constructors, methods, properties and static members of `T`.
///
/// Obtained from [`TypeRegistry::define_type`](crate::TypeRegistry::define_type),
/// [`define_derived_type`](crate::TypeRegistry::define_derived_type) or
/// [`extend_type`](crate::TypeRegistry::extend_type).
///
/// Calls that can conflict with an earlier binding (constructors and
/// overloads) return `Result`; everything else replaces what was bound
/// under the same name.
///
/// # Example
///
/// ```
/// use classbind_registry::{TypeRegistry, field};
///
/// #[derive(Clone)]
/// struct Vector2 {
///     x: f64,
///     y: f64,
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry
///     .define_type::<Vector2>("Vector2")
///     .unwrap()
///     .ctor(|| Vector2 { x: 0.0, y: 0.0 })
///     .unwrap()
///     .ctor(|x: f64, y: f64| Vector2 { x, y })
///     .unwrap()
///     .var("x", field!(Vector2, x: f64))
///     .var("y", field!(Vector2, y: f64))
///     .method("length", |v: &Vector2| v.x.hypot(v.y))
///     .copyable();
/// ```
pub struct ClassBuilder<'r, T> {
    descriptor: &'r mut TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<'r, T: 'static> ClassBuilder<'r, T> {
    pub(crate) fn new(descriptor: &'r mut TypeDescriptor) -> Self {
        Self {
            descriptor,
            _marker: PhantomData,
        }
    }

    /// The descriptor being built.
    pub fn descriptor(&self) -> &TypeDescriptor {
        self.descriptor
    }

    // ==========================================================================
    // Construction and copying
    // ==========================================================================

    /// Add a constructor, keyed by its arity.
    ///
    /// `f` returns `T` or `Result<T, CallError>`.
    pub fn ctor<Args, F>(self, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoConstructor<T, Args>,
    {
        self.descriptor
            .bind_overload(CONSTRUCTOR, F::ARITY, MemberFlags::STATIC, f.into_native_fn())?;
        Ok(self)
    }

    /// Use `T::clone` as the copy function behind `_cloned`.
    pub fn copyable(self) -> Self
    where
        T: Clone,
    {
        self.descriptor.set_copy_fn(copy_native::<T>);
        self
    }

    // ==========================================================================
    // Methods
    // ==========================================================================

    /// Bind a method with a single arity.
    pub fn method<Args, F>(self, name: &str, f: F) -> Self
    where
        F: IntoMethod<T, Args>,
    {
        self.descriptor.members_mut().bind_function(
            name,
            FunctionEntry {
                arity: F::ARITY,
                flags: MemberFlags::empty(),
                trampoline: f.into_native_fn(),
            },
        );
        self
    }

    /// Add one arity of an overloaded method.
    pub fn overload<Args, F>(self, name: &str, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoMethod<T, Args>,
    {
        self.descriptor
            .bind_overload(name, F::ARITY, MemberFlags::empty(), f.into_native_fn())?;
        Ok(self)
    }

    /// Bind a function called without a receiver.
    pub fn static_method<Args, F>(self, name: &str, f: F) -> Self
    where
        F: IntoFunction<Args>,
    {
        self.descriptor.members_mut().bind_function(
            name,
            FunctionEntry {
                arity: F::ARITY,
                flags: MemberFlags::STATIC,
                trampoline: f.into_native_fn(),
            },
        );
        self
    }

    /// Add one arity of an overloaded static function.
    pub fn static_overload<Args, F>(self, name: &str, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoFunction<Args>,
    {
        self.descriptor
            .bind_overload(name, F::ARITY, MemberFlags::STATIC, f.into_native_fn())?;
        Ok(self)
    }

    /// Bind a raw entry point that reads the call context itself.
    ///
    /// Raw entry points accept any number of arguments.
    pub fn raw<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + 'static,
    {
        self.descriptor
            .members_mut()
            .bind_raw(name, MemberFlags::empty(), NativeFn::new(f));
        self
    }

    /// Bind a raw entry point accepting only argument counts in `arity`.
    pub fn raw_checked<F>(self, name: &str, arity: RangeInclusive<usize>, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + 'static,
    {
        self.descriptor.members_mut().bind_raw(
            name,
            MemberFlags::empty(),
            NativeFn::with_arity(name, arity, f),
        );
        self
    }

    /// Bind a read-only value on the class object.
    pub fn static_value(self, name: &str, value: impl IntoDynamic) -> Self {
        self.descriptor
            .members_mut()
            .bind_static(name, value.into_dynamic());
        self
    }

    // ==========================================================================
    // Properties
    // ==========================================================================

    /// Expose a field for reading and writing.
    pub fn var<V>(self, name: &str, field: Field<T, V>) -> Self
    where
        V: Clone + ToScript + FromScript + 'static,
    {
        self.descriptor.bind_getter(AccessorEntry::new(
            name,
            SourceShape::Field,
            accessor::field_getter(field),
        ));
        self.descriptor.bind_setter(AccessorEntry::new(
            name,
            SourceShape::Field,
            accessor::field_setter(field),
        ));
        self
    }

    /// Expose a field for reading only.
    pub fn const_var<V>(self, name: &str, field: Field<T, V>) -> Self
    where
        V: Clone + ToScript + 'static,
    {
        self.descriptor.bind_getter(AccessorEntry::new(
            name,
            SourceShape::Field,
            accessor::field_getter(field),
        )
        .read_only());
        self
    }

    /// Read-only property computed by a closure or method.
    pub fn property_get<V, G>(self, name: &str, getter: G) -> Self
    where
        V: ToScript + 'static,
        G: Fn(&T) -> V + 'static,
    {
        self.descriptor.bind_getter(AccessorEntry::new(
            name,
            SourceShape::Method,
            accessor::method_getter(getter),
        )
        .read_only());
        self
    }

    /// Read-write property backed by a closure or method pair.
    ///
    /// The setter may return `Result<(), CallError>` to reject a value.
    pub fn property<V, G, S, R>(self, name: &str, getter: G, setter: S) -> Self
    where
        V: ToScript + FromScript + 'static,
        G: Fn(&T) -> V + 'static,
        S: Fn(&mut T, V) -> R + 'static,
        R: SetterResult,
    {
        self.descriptor.bind_getter(AccessorEntry::new(
            name,
            SourceShape::Method,
            accessor::method_getter(getter),
        ));
        self.descriptor.bind_setter(AccessorEntry::new(
            name,
            SourceShape::Method,
            accessor::method_setter(setter),
        ));
        self
    }

    /// Read-only property backed by a free function taking the receiver.
    pub fn global_property_get<V>(self, name: &str, getter: fn(&T) -> V) -> Self
    where
        V: ToScript + 'static,
    {
        self.descriptor.bind_getter(AccessorEntry::new(
            name,
            SourceShape::Function,
            accessor::method_getter(getter),
        )
        .read_only());
        self
    }

    /// Read-write property backed by a pair of free functions.
    pub fn global_property<V>(
        self,
        name: &str,
        getter: fn(&T) -> V,
        setter: fn(&mut T, V),
    ) -> Self
    where
        V: ToScript + FromScript + 'static,
    {
        self.descriptor.bind_getter(AccessorEntry::new(
            name,
            SourceShape::Function,
            accessor::method_getter(getter),
        ));
        self.descriptor.bind_setter(AccessorEntry::new(
            name,
            SourceShape::Function,
            accessor::method_setter(setter),
        ));
        self
    }

    /// Class-level variable shared with the host through `cell`.
    pub fn static_var<V>(self, name: &str, cell: Rc<RefCell<V>>) -> Self
    where
        V: Clone + ToScript + FromScript + 'static,
    {
        self.descriptor.bind_getter(AccessorEntry::new(
            name,
            SourceShape::Static,
            accessor::static_getter(Rc::clone(&cell)),
        ));
        self.descriptor.bind_setter(AccessorEntry::new(
            name,
            SourceShape::Static,
            accessor::static_setter(cell),
        ));
        self
    }
}
