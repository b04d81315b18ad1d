//! Builder for free functions and values in a namespace table.

use std::ops::RangeInclusive;

use rustc_hash::FxHashMap;
use tracing::trace;

use classbind_core::{CallError, IntoDynamic, RegistrationError, TypeHash};

use crate::call_context::CallContext;
use crate::member::{FunctionEntry, MemberFlags, MemberTable};
use crate::native_fn::{IntoFunction, NativeFn};
use crate::overload::OverloadEntry;

/// Binds functions and values into one namespace table.
///
/// Every function bound here also gets a [`TypeHash`] identity so scripts can
/// pass it around as a `Dynamic::Function` value.
pub struct NamespaceBuilder<'r> {
    namespace: String,
    table: &'r mut MemberTable,
    functions: &'r mut FxHashMap<TypeHash, (String, String)>,
}

impl<'r> NamespaceBuilder<'r> {
    pub(crate) fn new(
        namespace: &str,
        table: &'r mut MemberTable,
        functions: &'r mut FxHashMap<TypeHash, (String, String)>,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            table,
            functions,
        }
    }

    pub fn name(&self) -> &str {
        &self.namespace
    }

    /// Bind a function with a single arity.
    pub fn function<Args, F>(mut self, name: &str, f: F) -> Self
    where
        F: IntoFunction<Args>,
    {
        self.table.bind_function(
            name,
            FunctionEntry {
                arity: F::ARITY,
                flags: MemberFlags::STATIC,
                trampoline: f.into_native_fn(),
            },
        );
        self.record(name);
        self
    }

    /// Add one arity of an overloaded function.
    pub fn overload<Args, F>(mut self, name: &str, f: F) -> Result<Self, RegistrationError>
    where
        F: IntoFunction<Args>,
    {
        self.table.bind_overload(OverloadEntry {
            name: name.to_string(),
            arity: F::ARITY,
            flags: MemberFlags::STATIC,
            trampoline: f.into_native_fn(),
        })?;
        self.record(name);
        Ok(self)
    }

    /// Bind a raw entry point accepting any number of arguments.
    pub fn raw<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + 'static,
    {
        self.table
            .bind_raw(name, MemberFlags::STATIC, NativeFn::new(f));
        self.record(name);
        self
    }

    /// Bind a raw entry point accepting only argument counts in `arity`.
    pub fn raw_checked<F>(mut self, name: &str, arity: RangeInclusive<usize>, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + 'static,
    {
        self.table.bind_raw(
            name,
            MemberFlags::STATIC,
            NativeFn::with_arity(name, arity, f),
        );
        self.record(name);
        self
    }

    /// Bind a read-only value.
    pub fn value(self, name: &str, value: impl IntoDynamic) -> Self {
        self.table.bind_static(name, value.into_dynamic());
        self
    }

    fn record(&mut self, name: &str) {
        let hash = TypeHash::from_function(&self.namespace, name);
        trace!(namespace = %self.namespace, name, %hash, "bound namespace function");
        self.functions
            .insert(hash, (self.namespace.clone(), name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use crate::member::Slot;
    use crate::registry::TypeRegistry;
    use classbind_core::{CallError, Dynamic, RegistrationError};

    #[test]
    fn functions_and_values_land_in_the_table() {
        let mut registry = TypeRegistry::new();
        registry
            .namespace("math")
            .unwrap()
            .function("abs", |x: i64| x.abs())
            .value("answer", 42i64);

        let table = registry.namespace_table("math").unwrap();
        assert!(matches!(table.slot("abs"), Some(Slot::Function(entry)) if entry.arity == 1));
        assert!(matches!(table.slot("answer"), Some(Slot::Static(Dynamic::Int(42)))));
    }

    #[test]
    fn overloads_share_a_name() {
        let mut registry = TypeRegistry::new();
        let builder = registry
            .namespace("")
            .unwrap()
            .overload("max", |a: i64| a)
            .unwrap()
            .overload("max", |a: i64, b: i64| a.max(b))
            .unwrap();
        assert!(matches!(
            builder.overload("max", |a: f64, _b: f64| a),
            Err(RegistrationError::DuplicateOverload { arity: 2, .. })
        ));

        let table = registry.namespace_table("").unwrap();
        assert_eq!(table.overloads().available("max"), vec![1, 2]);
        assert!(matches!(
            table.resolve("max", 3),
            Err(CallError::NoMatchingOverload { .. })
        ));
    }

    #[test]
    fn reopening_a_namespace_keeps_earlier_members() {
        let mut registry = TypeRegistry::new();
        registry.namespace("io").unwrap().function("flush", || ());
        registry
            .namespace("io")
            .unwrap()
            .raw("print", |_ctx| Ok(()));

        let table = registry.namespace_table("io").unwrap();
        assert!(table.contains("flush"));
        assert!(table.resolve("print", 4).is_ok());
    }
}
