//! Native function storage and the traits that turn Rust callables into it.
//!
//! Every bound member ends up as a [`NativeFn`]: a shared, type-erased
//! trampoline that reads its arguments from a [`CallContext`], calls the Rust
//! code and writes the return slot.
//!
//! The `Into*` traits are implemented by macro for callables of 0 to 6
//! arguments:
//!
//! - [`IntoFunction`]: free functions and static methods
//! - [`IntoMethod`]: methods taking `&T` or `&mut T` as the receiver
//! - [`IntoConstructor`]: functions returning a new `T`

use std::fmt;
use std::ops::RangeInclusive;
use std::rc::Rc;

use classbind_core::CallError;

use crate::call_context::CallContext;
use crate::marshal::{FromScript, IntoInstance, ToScript};

/// Type-erased native function.
///
/// Cloning shares the underlying callable.
#[derive(Clone)]
pub struct NativeFn {
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    /// Create a new NativeFn from a closure over the call context.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + 'static,
    {
        Self { inner: Rc::new(f) }
    }

    /// Call this native function with the given context.
    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), CallError> {
        self.inner.call(ctx)
    }

    /// Whether two handles share the same callable.
    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl NativeFn {
    /// Raw entry point that only runs for an argument count in `arity`.
    ///
    /// Other counts fail with `NoMatchingOverload` before `f` is called. The
    /// error lists at most the first 16 accepted counts.
    pub fn with_arity<F>(name: &str, arity: RangeInclusive<usize>, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), CallError> + 'static,
    {
        let name = name.to_string();
        Self::new(move |ctx: &mut CallContext<'_>| {
            let count = ctx.arg_count();
            if !arity.contains(&count) {
                return Err(CallError::NoMatchingOverload {
                    name: name.clone(),
                    arity: count,
                    available: arity.clone().take(16).collect(),
                });
            }
            f(ctx)
        })
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
pub trait NativeCallable {
    /// Call this function with the given context.
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), CallError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), CallError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), CallError> {
        (self)(ctx)
    }
}

/// A Rust callable usable as a free function or static method.
pub trait IntoFunction<Args> {
    /// Number of script arguments.
    const ARITY: usize;

    fn into_native_fn(self) -> NativeFn;
}

/// A Rust callable usable as a method of `T`.
///
/// `Args` starts with [`ByRef`] or [`ByMut`] to keep the two receiver forms apart.
pub trait IntoMethod<T, Args> {
    /// Number of script arguments, excluding the receiver.
    const ARITY: usize;

    fn into_native_fn(self) -> NativeFn;
}

/// A Rust callable that creates a new `T`.
pub trait IntoConstructor<T, Args> {
    /// Number of script arguments.
    const ARITY: usize;

    fn into_native_fn(self) -> NativeFn;
}

/// Marker for methods taking `&T`.
pub struct ByRef;

/// Marker for methods taking `&mut T`.
pub struct ByMut;

macro_rules! impl_into_native {
    ($arity:expr $(, $arg:ident $var:ident $idx:tt)*) => {
        impl<F, R $(, $arg)*> IntoFunction<($($arg,)*)> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: ToScript + 'static,
            $($arg: FromScript + 'static,)*
        {
            const ARITY: usize = $arity;

            fn into_native_fn(self) -> NativeFn {
                NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $var = ctx.arg::<$arg>($idx)?;)*
                    let ret = (self)($($var),*);
                    ctx.set_return(ret)
                })
            }
        }

        impl<T, F, R $(, $arg)*> IntoMethod<T, (ByRef, $($arg,)*)> for F
        where
            T: 'static,
            F: Fn(&T $(, $arg)*) -> R + 'static,
            R: ToScript + 'static,
            $($arg: FromScript + 'static,)*
        {
            const ARITY: usize = $arity;

            fn into_native_fn(self) -> NativeFn {
                NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $var = ctx.arg::<$arg>($idx)?;)*
                    let ret = ctx.with_this(|this: &T| (self)(this $(, $var)*))?;
                    ctx.set_return(ret)
                })
            }
        }

        impl<T, F, R $(, $arg)*> IntoMethod<T, (ByMut, $($arg,)*)> for F
        where
            T: 'static,
            F: Fn(&mut T $(, $arg)*) -> R + 'static,
            R: ToScript + 'static,
            $($arg: FromScript + 'static,)*
        {
            const ARITY: usize = $arity;

            fn into_native_fn(self) -> NativeFn {
                NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $var = ctx.arg::<$arg>($idx)?;)*
                    let ret = ctx.with_this_mut(|this: &mut T| (self)(this $(, $var)*))?;
                    ctx.set_return(ret)
                })
            }
        }

        impl<T, F, R $(, $arg)*> IntoConstructor<T, ($($arg,)*)> for F
        where
            T: 'static,
            F: Fn($($arg),*) -> R + 'static,
            R: IntoInstance<T> + 'static,
            $($arg: FromScript + 'static,)*
        {
            const ARITY: usize = $arity;

            fn into_native_fn(self) -> NativeFn {
                NativeFn::new(move |ctx: &mut CallContext<'_>| {
                    $(let $var = ctx.arg::<$arg>($idx)?;)*
                    let instance = (self)($($var),*).into_instance()?;
                    let value = ctx.bind_owned(instance)?;
                    ctx.set_return_slot(value);
                    Ok(())
                })
            }
        }
    };
}

impl_into_native!(0);
impl_into_native!(1, A1 a1 0);
impl_into_native!(2, A1 a1 0, A2 a2 1);
impl_into_native!(3, A1 a1 0, A2 a2 1, A3 a3 2);
impl_into_native!(4, A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3);
impl_into_native!(5, A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3, A5 a5 4);
impl_into_native!(6, A1 a1 0, A2 a2 1, A3 a3 2, A4 a4 3, A5 a5 4, A6 a6 5);

/// Arity of a callable as a free function.
pub fn function_arity<Args, F: IntoFunction<Args>>(_f: &F) -> usize {
    F::ARITY
}

/// Arity of a callable as a method of `T`.
pub fn method_arity<T, Args, F: IntoMethod<T, Args>>(_f: &F) -> usize {
    F::ARITY
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        value: i64,
    }

    #[test]
    fn function_arity_counts_script_arguments() {
        assert_eq!(function_arity(&|| 1i32), 0);
        assert_eq!(function_arity(&|a: i32, b: i32| a + b), 2);
        assert_eq!(function_arity(&|_: String, _: f64, _: bool| ()), 3);
    }

    #[test]
    fn method_arity_excludes_receiver() {
        assert_eq!(method_arity::<Counter, _, _>(&|c: &Counter| c.value), 0);
        assert_eq!(
            method_arity::<Counter, _, _>(&|c: &mut Counter, by: i64| c.value += by),
            1
        );
    }

    #[test]
    fn clones_share_the_callable() {
        let f = NativeFn::new(|_ctx: &mut CallContext<'_>| Ok(()));
        let g = f.clone();
        let h = NativeFn::new(|_ctx: &mut CallContext<'_>| Ok(()));
        assert!(f.ptr_eq(&g));
        assert!(!f.ptr_eq(&h));
    }
}
