//! Deletion strategy contract.
//!
//! A disposer is stored by value in a pointer-adopting control block
//! and consumed exactly once, when the last owning handle releases the
//! object. Disposal runs on the teardown path and must not panic.

use core::ptr::NonNull;

/// A deletion strategy for an adopted object.
pub trait Dispose<U: ?Sized> {
    /// Consume the strategy, destroying the object behind `object`.
    ///
    /// Safety: `object` is the pointer the block was built with; it is
    /// live, and nothing will touch it after this call.
    unsafe fn dispose(self, object: NonNull<U>);
}

/// The default strategy: re-own the allocation as a `Box` and drop it.
/// Only correct for pointers obtained from `Box::into_raw` (or an
/// equivalent global-allocator allocation).
#[derive(Copy, Clone, Debug, Default)]
pub struct BoxDrop;

impl<U: ?Sized> Dispose<U> for BoxDrop {
    unsafe fn dispose(self, object: NonNull<U>) {
        drop(unsafe { Box::from_raw(object.as_ptr()) });
    }
}

/// Adapter turning a single-shot closure over the raw pointer into a
/// disposer. A direct blanket impl over `FnOnce` would conflict with
/// the concrete strategies under coherence, so the closure rides in a
/// newtype.
#[derive(Copy, Clone, Debug)]
pub struct FnDispose<F>(pub F);

impl<U: ?Sized, F> Dispose<U> for FnDispose<F>
where
    F: FnOnce(NonNull<U>),
{
    unsafe fn dispose(self, object: NonNull<U>) {
        (self.0)(object);
    }
}
