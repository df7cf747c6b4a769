//! The owning handle.
//!
//! A `Shared<T>` is one of potentially many equal owners of a single
//! object. It carries the object pointer, the type-erased block
//! pointer, and a linear strong token riding in `ManuallyDrop`; drop
//! takes the token out and returns it to the block, which destroys the
//! object on the last release and reclaims the block once no observers
//! remain. There is no null state: absence is `Option<Shared<T>>`, and
//! a move leaves nothing behind to release.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::ptr::NonNull;

use crate::alloc::{AllocError, BlockAlloc, Global};
use crate::block::{self, BuildError, Header};
use crate::dispose::{BoxDrop, Dispose};
use crate::self_ref::WithSelfRef;
use crate::tokens::{StrongCount, Token};
use crate::upcast::Upcast;
use crate::weak::Weak;

/// Single-threaded shared-ownership pointer. Clone increments the
/// strong count; dropping the last owner destroys the object.
pub struct Shared<T: ?Sized> {
    ptr: NonNull<T>,
    header: NonNull<Header>,
    token: ManuallyDrop<Token<'static, StrongCount>>,
    _owns: PhantomData<T>,
    // !Send + !Sync: the counters are not synchronized.
    _nosend: PhantomData<*mut ()>,
}

impl<T> Shared<T> {
    /// Allocate a block with the object's storage fused in and move
    /// `value` into it. Aborts via the global allocation error hook if
    /// the block cannot be allocated.
    pub fn new(value: T) -> Shared<T> {
        match Self::try_new_in(value, Global) {
            Ok(this) => this,
            Err(e) => std::alloc::handle_alloc_error(e.layout()),
        }
    }

    /// Fused construction with a caller-supplied block allocator.
    pub fn try_new_in<A>(value: T, alloc: A) -> Result<Shared<T>, AllocError>
    where
        A: BlockAlloc + 'static,
    {
        match Self::try_build_in(alloc, || Ok::<T, core::convert::Infallible>(value)) {
            Ok(this) => Ok(this),
            Err(BuildError::Alloc(e)) => Err(e),
            Err(BuildError::Init(never)) => match never {},
        }
    }

    /// Fused construction from a fallible initializer, `Global` block
    /// allocator. See [`Shared::try_build_in`].
    pub fn try_build<E, F>(init: F) -> Result<Shared<T>, BuildError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        Self::try_build_in(Global, init)
    }

    /// Fused construction from a fallible initializer.
    ///
    /// The block is allocated first and the object constructed directly
    /// into it. If `init` returns an error (or unwinds), the block is
    /// deallocated, no object destructor runs, and the failure
    /// propagates; no owning handle ever exists in that case.
    pub fn try_build_in<A, E, F>(alloc: A, init: F) -> Result<Shared<T>, BuildError<E>>
    where
        A: BlockAlloc + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let (ptr, header, token) = block::make_inline(alloc, init)?;
        Ok(Shared::from_raw_parts(ptr, header, token))
    }

    /// Fused construction that also populates the object's self
    /// reference before the handle is returned, so the object can hand
    /// out handles to itself from its own methods.
    pub fn new_with_self_ref(value: T) -> Shared<T>
    where
        T: WithSelfRef,
    {
        let this = Shared::new(value);
        Shared::bind_self_ref(&this);
        this
    }
}

impl<T: ?Sized> Shared<T> {
    /// Take over a `Box`, keeping its allocation for the object and
    /// allocating a separate block beside it.
    pub fn from_box(boxed: Box<T>) -> Shared<T> {
        // Box pointers are valid and non-null by construction.
        let object = unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) };
        match block::make_ptr_block(object, BoxDrop, Global) {
            Ok((header, token)) => Shared::from_raw_parts(object, header, token),
            Err(e) => std::alloc::handle_alloc_error(e.layout()),
        }
    }

    /// Adopt a raw pointer with the default [`BoxDrop`] deleter.
    ///
    /// # Safety
    ///
    /// `object` must be uniquely owned by the caller, valid for the
    /// lifetime of the ownership group, and must have come from
    /// `Box::into_raw` (or an equivalent global-allocator allocation)
    /// so `BoxDrop` may re-own it.
    pub unsafe fn from_ptr(object: NonNull<T>) -> Shared<T> {
        Self::from_ptr_with(object, BoxDrop)
    }

    /// Adopt a raw pointer with a caller-supplied deletion strategy.
    ///
    /// # Safety
    ///
    /// `object` must be uniquely owned by the caller and valid until
    /// `deleter` consumes it; `deleter` must fully destroy it.
    pub unsafe fn from_ptr_with<D>(object: NonNull<T>, deleter: D) -> Shared<T>
    where
        D: Dispose<T> + 'static,
    {
        match block::make_ptr_block(object, deleter, Global) {
            Ok((header, token)) => Shared::from_raw_parts(object, header, token),
            Err(e) => std::alloc::handle_alloc_error(e.layout()),
        }
    }

    /// Adopt a raw pointer with caller-supplied deletion and block
    /// allocation strategies. On allocation failure the object is
    /// untouched and the caller retains ownership of it; the deleter
    /// and allocator values are dropped.
    ///
    /// # Safety
    ///
    /// As [`Shared::from_ptr_with`].
    pub unsafe fn try_from_ptr_in<D, A>(
        object: NonNull<T>,
        deleter: D,
        alloc: A,
    ) -> Result<Shared<T>, AllocError>
    where
        D: Dispose<T> + 'static,
        A: BlockAlloc + 'static,
    {
        let (header, token) = block::make_ptr_block(object, deleter, alloc)?;
        Ok(Shared::from_raw_parts(object, header, token))
    }

    /// Number of owning handles in this ownership group.
    pub fn strong_count(this: &Self) -> usize {
        unsafe { this.header.as_ref() }.strong_value()
    }

    /// Number of observer handles in this ownership group.
    pub fn weak_count(this: &Self) -> usize {
        unsafe { this.header.as_ref() }.observer_count()
    }

    /// Create an observer for the same ownership group.
    pub fn downgrade(this: &Self) -> Weak<T> {
        let token = unsafe { this.header.as_ref() }.acquire_weak();
        Weak::from_raw_parts(this.ptr, this.header, token)
    }

    /// True iff both handles belong to the same ownership group.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.header == other.header
    }

    /// Raw pointer to the object. Valid while any owner exists.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    /// Reinterpret the handle along a declared pointer-compatibility
    /// relation (identity, or concrete type to trait object). Counts
    /// are unchanged; the source handle is consumed.
    pub fn upcast<U: ?Sized>(this: Self) -> Shared<U>
    where
        T: Upcast<U>,
    {
        let (ptr, header, token) = Shared::into_parts(this);
        Shared {
            ptr: <T as Upcast<U>>::upcast_ptr(ptr),
            header,
            token: ManuallyDrop::new(token),
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    /// Populate the object's self reference from this handle. Called by
    /// [`Shared::new_with_self_ref`]; exposed so the adoption paths can
    /// bind too.
    pub fn bind_self_ref(this: &Self)
    where
        T: WithSelfRef,
    {
        (**this).self_ref().bind(Shared::downgrade(this));
    }

    pub(crate) fn from_raw_parts(
        ptr: NonNull<T>,
        header: NonNull<Header>,
        token: Token<'static, StrongCount>,
    ) -> Self {
        Shared {
            ptr,
            header,
            token: ManuallyDrop::new(token),
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    fn into_parts(this: Self) -> (NonNull<T>, NonNull<Header>, Token<'static, StrongCount>) {
        let mut this = ManuallyDrop::new(this);
        // Move the token out without running either destructor.
        let token = unsafe { ManuallyDrop::take(&mut this.token) };
        (this.ptr, this.header, token)
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        let token = unsafe { self.header.as_ref() }.acquire_strong();
        Shared {
            ptr: self.ptr,
            header: self.header,
            token: ManuallyDrop::new(token),
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        let token = unsafe { ManuallyDrop::take(&mut self.token) };
        unsafe { Header::release_strong(self.header, token) };
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // A live owner implies a live object.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: fmt::Debug + ?Sized> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display + ?Sized> fmt::Display for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}

impl<T: PartialEq + ?Sized> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: Eq + ?Sized> Eq for Shared<T> {}

impl<T: Hash + ?Sized> Hash for Shared<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (**self).hash(state)
    }
}
