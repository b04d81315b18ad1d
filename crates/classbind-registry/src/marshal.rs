//! Argument and return-value marshaling for bound functions.
//!
//! Primitive types delegate to [`FromDynamic`]/[`IntoDynamic`]. Native
//! instances need the call context to reach the instance tables, so they use
//! the wrapper types below:
//!
//! | wrapper | as argument | as return value |
//! |---|---|---|
//! | [`Shared<T>`] | the instance's `Rc`, exact type only | binds with the script co-owning it |
//! | [`Owned<T>`] | a clone of the instance (or of its `T` base part) | binds a new script-owned instance |
//! | [`Borrowed<T>`] | not accepted | binds without the script owning it |

use std::cell::RefCell;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use classbind_core::{CallError, Dynamic, FromDynamic, IntoDynamic};

use crate::call_context::CallContext;
use crate::instances::Ownership;

/// Extract an argument from a script value.
pub trait FromScript: Sized {
    fn from_script(value: &Dynamic, ctx: &CallContext<'_>) -> Result<Self, CallError>;
}

/// Convert a return value into a script value.
pub trait ToScript {
    fn to_script(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError>;
}

/// Result of a constructor: the instance, or the error that stopped it.
pub trait IntoInstance<T> {
    fn into_instance(self) -> Result<T, CallError>;
}

impl<T> IntoInstance<T> for T {
    fn into_instance(self) -> Result<T, CallError> {
        Ok(self)
    }
}

impl<T> IntoInstance<T> for Result<T, CallError> {
    fn into_instance(self) -> Result<T, CallError> {
        self
    }
}

// ============================================================================
// Primitives
// ============================================================================

macro_rules! impl_script_primitive {
    ($($ty:ty),*) => {
        $(
            impl FromScript for $ty {
                fn from_script(value: &Dynamic, _ctx: &CallContext<'_>) -> Result<Self, CallError> {
                    Ok(<$ty as FromDynamic>::from_dynamic(value)?)
                }
            }

            impl ToScript for $ty {
                fn to_script(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError> {
                    Ok(self.into_dynamic())
                }
            }
        )*
    };
}

impl_script_primitive!(
    i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64, bool, char, String, (), Dynamic
);

impl ToScript for &str {
    fn to_script(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError> {
        Ok(self.into_dynamic())
    }
}

/// `null` maps to `None`.
impl<V: FromScript> FromScript for Option<V> {
    fn from_script(value: &Dynamic, ctx: &CallContext<'_>) -> Result<Self, CallError> {
        match value {
            Dynamic::Null => Ok(None),
            other => V::from_script(other, ctx).map(Some),
        }
    }
}

impl<V: ToScript> ToScript for Option<V> {
    fn to_script(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError> {
        match self {
            Some(value) => value.to_script(ctx),
            None => Ok(Dynamic::Null),
        }
    }
}

/// Errors returned by bound code are reported to the script caller.
impl<V: ToScript> ToScript for Result<V, CallError> {
    fn to_script(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError> {
        self?.to_script(ctx)
    }
}

// ============================================================================
// Native instances
// ============================================================================

/// A native instance shared between the host and the script.
pub struct Shared<T>(pub Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Shared(Rc::new(RefCell::new(value)))
    }

    pub fn into_inner(self) -> Rc<RefCell<T>> {
        self.0
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(Rc::clone(&self.0))
    }
}

impl<T> Deref for Shared<T> {
    type Target = RefCell<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<Rc<RefCell<T>>> for Shared<T> {
    fn from(rc: Rc<RefCell<T>>) -> Self {
        Shared(rc)
    }
}

impl<T: 'static> FromScript for Shared<T> {
    fn from_script(value: &Dynamic, ctx: &CallContext<'_>) -> Result<Self, CallError> {
        ctx.resolve_shared::<T>(value).map(Shared)
    }
}

impl<T: 'static> ToScript for Shared<T> {
    fn to_script(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError> {
        ctx.bind_native(self.0, Ownership::Shared)
    }
}

/// A native instance passed by value.
#[derive(Debug, Clone, PartialEq)]
pub struct Owned<T>(pub T);

impl<T> Owned<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Owned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + 'static> FromScript for Owned<T> {
    fn from_script(value: &Dynamic, ctx: &CallContext<'_>) -> Result<Self, CallError> {
        ctx.with_object(value, |v: &T| Owned(v.clone()))
    }
}

impl<T: 'static> ToScript for Owned<T> {
    fn to_script(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError> {
        ctx.bind_owned(self.0)
    }
}

/// A native instance the script may use but never keeps alive.
///
/// Once the host drops the instance, script handles to it resolve as stale.
pub struct Borrowed<T>(pub Weak<RefCell<T>>);

impl<T> Borrowed<T> {
    pub fn from_rc(rc: &Rc<RefCell<T>>) -> Self {
        Borrowed(Rc::downgrade(rc))
    }
}

/// A dropped instance converts to `null`.
impl<T: 'static> ToScript for Borrowed<T> {
    fn to_script(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, CallError> {
        match self.0.upgrade() {
            Some(rc) => ctx.bind_native(rc, Ownership::Host),
            None => Ok(Dynamic::Null),
        }
    }
}

