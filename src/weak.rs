//! The observer handle.
//!
//! A `Weak<T>` keeps the control block reachable without keeping the
//! object alive. It can never be dereferenced; the only way to the
//! object is `upgrade`, which mints a new owner while the strong count
//! is still positive and refuses afterwards. The object pointer held
//! here may point at destroyed (but not yet reclaimed) storage.

use core::fmt;
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr::NonNull;

use crate::block::Header;
use crate::shared::Shared;
use crate::tokens::{Token, WeakCount};
use crate::upcast::Upcast;

/// Non-owning observer of an ownership group.
pub struct Weak<T: ?Sized> {
    ptr: NonNull<T>,
    header: NonNull<Header>,
    token: ManuallyDrop<Token<'static, WeakCount>>,
    // !Send + !Sync: the counters are not synchronized.
    _nosend: PhantomData<*mut ()>,
}

impl<T: ?Sized> Weak<T> {
    /// True iff the object has been destroyed (no owners remain).
    pub fn expired(&self) -> bool {
        unsafe { self.header.as_ref() }.strong_is_zero()
    }

    /// Number of owning handles still alive in this group.
    pub fn strong_count(&self) -> usize {
        unsafe { self.header.as_ref() }.strong_value()
    }

    /// Attempt to materialize a new owner. Returns `None` once the
    /// group has expired; otherwise the strong count goes up by one.
    pub fn upgrade(&self) -> Option<Shared<T>> {
        let hdr = unsafe { self.header.as_ref() };
        if hdr.strong_is_zero() {
            return None;
        }
        let token = hdr.acquire_strong();
        Some(Shared::from_raw_parts(self.ptr, self.header, token))
    }

    /// True iff both handles belong to the same ownership group.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.header == other.header
    }

    /// Reinterpret the handle along a declared pointer-compatibility
    /// relation. Counts are unchanged; the source handle is consumed.
    pub fn upcast<U: ?Sized>(this: Self) -> Weak<U>
    where
        T: Upcast<U>,
    {
        let (ptr, header, token) = Weak::into_parts(this);
        Weak {
            ptr: <T as Upcast<U>>::upcast_ptr(ptr),
            header,
            token: ManuallyDrop::new(token),
            _nosend: PhantomData,
        }
    }

    pub(crate) fn from_raw_parts(
        ptr: NonNull<T>,
        header: NonNull<Header>,
        token: Token<'static, WeakCount>,
    ) -> Self {
        Weak {
            ptr,
            header,
            token: ManuallyDrop::new(token),
            _nosend: PhantomData,
        }
    }

    fn into_parts(this: Self) -> (NonNull<T>, NonNull<Header>, Token<'static, WeakCount>) {
        let mut this = ManuallyDrop::new(this);
        // Move the token out without running either destructor.
        let token = unsafe { ManuallyDrop::take(&mut this.token) };
        (this.ptr, this.header, token)
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    fn clone(&self) -> Self {
        let token = unsafe { self.header.as_ref() }.acquire_weak();
        Weak {
            ptr: self.ptr,
            header: self.header,
            token: ManuallyDrop::new(token),
            _nosend: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for Weak<T> {
    fn drop(&mut self) {
        let token = unsafe { ManuallyDrop::take(&mut self.token) };
        unsafe { Header::release_weak(self.header, token) };
    }
}

impl<T: ?Sized> From<&Shared<T>> for Weak<T> {
    fn from(shared: &Shared<T>) -> Self {
        Shared::downgrade(shared)
    }
}

impl<T: fmt::Debug + ?Sized> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut f = f.debug_tuple("Weak");
        if let Some(shared) = self.upgrade() {
            f.field(&&*shared);
        }
        f.finish()
    }
}
