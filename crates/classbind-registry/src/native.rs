//! Type-erased native instances.
//!
//! Native objects live in `Rc<RefCell<T>>` cells. The binding layer only ever
//! sees them as [`NativeRef`] (`Rc<dyn NativeCell>`), and identifies them by
//! [`NativeAddr`], the address of the cell.

use std::any::{Any, type_name};
use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// A native object cell with its concrete type erased.
pub trait NativeCell: 'static {
    /// Immutably borrow the contained value as `dyn Any`.
    fn try_borrow_any(&self) -> Result<Ref<'_, dyn Any>, BorrowError>;

    /// Mutably borrow the contained value as `dyn Any`.
    fn try_borrow_any_mut(&self) -> Result<RefMut<'_, dyn Any>, BorrowMutError>;

    /// Recover the concrete cell for downcasting.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// Rust type name of the contained value.
    fn value_type_name(&self) -> &'static str;
}

impl<T: Any> NativeCell for RefCell<T> {
    fn try_borrow_any(&self) -> Result<Ref<'_, dyn Any>, BorrowError> {
        self.try_borrow().map(|r| Ref::map(r, |v| v as &dyn Any))
    }

    fn try_borrow_any_mut(&self) -> Result<RefMut<'_, dyn Any>, BorrowMutError> {
        self.try_borrow_mut()
            .map(|r| RefMut::map(r, |v| v as &mut dyn Any))
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

impl fmt::Debug for dyn NativeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeCell<{}>", self.value_type_name())
    }
}

/// Shared pointer to a type-erased native instance.
pub type NativeRef = Rc<dyn NativeCell>;

/// Address of a native instance, used as its identity in the instance tables.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeAddr(pub usize);

impl NativeAddr {
    /// Address of the cell behind any `Rc`.
    pub fn of<T: ?Sized>(rc: &Rc<T>) -> Self {
        NativeAddr(Rc::as_ptr(rc).cast::<()>() as usize)
    }
}

impl fmt::Debug for NativeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeAddr({:#x})", self.0)
    }
}

impl fmt::Display for NativeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Wrap a value in a fresh native cell.
pub fn new_native<T: Any>(value: T) -> Rc<RefCell<T>> {
    Rc::new(RefCell::new(value))
}
