//! Pointer-compatibility relation for handle conversions.
//!
//! A handle of one type may be rebuilt as a handle of another only
//! along a declared `Upcast` relation: every type upcasts to itself,
//! and a concrete type may declare an upcast to a trait object it
//! implements via [`impl_upcast!`]. The relation is checked entirely
//! at compile time; the conversion is a pointer reinterpretation and
//! never touches the counters.

use core::ptr::NonNull;

/// Declares that a handle of `Self` may be viewed as a handle of `U`.
///
/// # Safety
///
/// `upcast_ptr` must return a pointer to the same object, differing
/// only in static type (identity or unsizing). Implementations that
/// change the referent break the ownership bookkeeping.
pub unsafe trait Upcast<U: ?Sized> {
    fn upcast_ptr(ptr: NonNull<Self>) -> NonNull<U>;
}

/// Every type is compatible with itself.
unsafe impl<T: ?Sized> Upcast<T> for T {
    #[inline]
    fn upcast_ptr(ptr: NonNull<Self>) -> NonNull<T> {
        ptr
    }
}

/// Declare a concrete-type-to-trait-object upcast relation.
///
/// Expands to an `Upcast` impl whose body is a raw-pointer unsizing
/// coercion, so the relation only compiles when the concrete type
/// actually implements the trait.
#[macro_export]
macro_rules! impl_upcast {
    ($concrete:ty => $base:ty) => {
        unsafe impl $crate::Upcast<$base> for $concrete {
            #[inline]
            fn upcast_ptr(
                ptr: ::core::ptr::NonNull<Self>,
            ) -> ::core::ptr::NonNull<$base> {
                let wide: *mut $base = ptr.as_ptr();
                // Unsizing preserves the address; null is impossible here.
                unsafe { ::core::ptr::NonNull::new_unchecked(wide) }
            }
        }
    };
}
