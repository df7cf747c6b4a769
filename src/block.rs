//! Control blocks: the bookkeeping record behind one ownership group.
//!
//! Every group has exactly one block. A block is a `Header` (the two
//! counters plus a two-entry dispatch table) followed by layout-specific
//! fields; handles address the block through `NonNull<Header>` only, so
//! one handle type serves both layouts:
//!
//! - `PtrBlock<U, D, A>`: the object lives in its own allocation; the
//!   block stores the object pointer, a deletion strategy, and the
//!   allocation strategy that produced the block.
//! - `InlineBlock<T, A>`: the object's storage is fused into the block,
//!   saving the second allocation; destruction runs in place.
//!
//! Teardown ordering: the object is destroyed exactly once, by the
//! `release_strong` call that takes the strong count to zero; the block
//! storage is released exactly once, by whichever release operation then
//! observes both counts at zero. The strong side collectively stows one
//! weak unit from construction until the object has been destroyed, so
//! an observer dropped by the object's own teardown can never reclaim
//! the block out from under `release_strong`.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::mem::{ManuallyDrop, MaybeUninit};
use core::ptr::{addr_of_mut, NonNull};
use std::alloc::Layout;

use crate::alloc::{AllocError, BlockAlloc};
use crate::dispose::Dispose;
use crate::tokens::{Count, StrongCount, Token, WeakCount};

/// Failure from a fused construction entry point.
#[derive(Debug)]
pub enum BuildError<E> {
    /// The control block could not be allocated.
    Alloc(AllocError),
    /// The initializer reported an error; the block allocation was
    /// rolled back and no object was constructed.
    Init(E),
}

/// Per-layout behavior, stored once per concrete block type.
pub(crate) struct BlockVTable {
    /// Destroys the owned object. Called exactly once, when the strong
    /// count reaches zero.
    drop_object: unsafe fn(NonNull<Header>),
    /// Releases the block's backing storage through its stored
    /// allocator. The block must not be touched afterwards.
    dealloc_block: unsafe fn(NonNull<Header>),
}

/// The type-erased prefix of every block. Must be the first field of
/// each concrete layout (`repr(C)`) so handles can address blocks
/// through it.
pub(crate) struct Header {
    strong: StrongCount,
    weak: WeakCount,
    vtable: &'static BlockVTable,
    #[cfg(debug_assertions)]
    object_destroyed: Cell<bool>,
}

impl Header {
    fn new(vtable: &'static BlockVTable) -> Self {
        Self {
            strong: StrongCount::new(),
            weak: WeakCount::new(),
            vtable,
            #[cfg(debug_assertions)]
            object_destroyed: Cell::new(false),
        }
    }

    /// Mint one strong unit. Callers must already hold a live strong
    /// unit or have checked the strong count is positive.
    #[inline]
    pub(crate) fn acquire_strong(&self) -> Token<'static, StrongCount> {
        #[cfg(debug_assertions)]
        debug_assert!(!self.object_destroyed.get());
        self.strong.get()
    }

    /// Mint one weak unit.
    #[inline]
    pub(crate) fn acquire_weak(&self) -> Token<'static, WeakCount> {
        self.weak.get()
    }

    #[inline]
    pub(crate) fn strong_value(&self) -> usize {
        self.strong.value()
    }

    #[inline]
    pub(crate) fn strong_is_zero(&self) -> bool {
        self.strong.is_zero()
    }

    /// Number of observer handles. The group weak unit stowed by the
    /// strong side is not an observer and is excluded.
    #[inline]
    pub(crate) fn observer_count(&self) -> usize {
        let v = self.weak.value();
        if self.strong.is_zero() {
            v
        } else {
            v - 1
        }
    }

    /// Return one strong unit. Destroys the object on the 1 -> 0
    /// crossing and then releases the group weak unit, which reclaims
    /// the block if no observers remain.
    ///
    /// Safety: `this` must point to a live block and `token` must have
    /// been minted by its strong counter.
    pub(crate) unsafe fn release_strong(this: NonNull<Header>, token: Token<'static, StrongCount>) {
        let hdr = this.as_ref();
        if hdr.strong.put(token) {
            #[cfg(debug_assertions)]
            {
                assert!(!hdr.object_destroyed.get(), "object torn down twice");
                hdr.object_destroyed.set(true);
            }
            // Object first, always. Observers dropped by the object's
            // own teardown decrement past the group unit, never to zero.
            (hdr.vtable.drop_object)(this);
            let group: Token<'static, WeakCount> = Token::unstow();
            Header::release_weak(this, group);
        }
    }

    /// Return one weak unit. Reclaims the block on the final crossing.
    ///
    /// Safety: `this` must point to a live block and `token` must have
    /// been minted by its weak counter.
    pub(crate) unsafe fn release_weak(this: NonNull<Header>, token: Token<'static, WeakCount>) {
        let hdr = this.as_ref();
        if hdr.weak.put(token) {
            // The group unit outlives every strong handle, so a zero
            // weak count implies a zero strong count.
            debug_assert!(hdr.strong.is_zero());
            (hdr.vtable.dealloc_block)(this);
        }
    }
}

/// Block for an object adopted from its own allocation.
#[repr(C)]
struct PtrBlock<U: ?Sized, D, A> {
    header: Header, // must stay first
    object: NonNull<U>,
    deleter: ManuallyDrop<D>,
    alloc: ManuallyDrop<A>,
}

impl<U: ?Sized, D: Dispose<U>, A: BlockAlloc> PtrBlock<U, D, A> {
    const VTABLE: BlockVTable = BlockVTable {
        drop_object: Self::drop_object,
        dealloc_block: Self::dealloc_block,
    };

    unsafe fn drop_object(this: NonNull<Header>) {
        let bp = this.cast::<Self>().as_ptr();
        let deleter = ManuallyDrop::take(&mut (*bp).deleter);
        let object = (*bp).object;
        deleter.dispose(object);
    }

    unsafe fn dealloc_block(this: NonNull<Header>) {
        let bp = this.cast::<Self>().as_ptr();
        let alloc = ManuallyDrop::take(&mut (*bp).alloc);
        alloc.deallocate(this.cast::<u8>(), Layout::new::<Self>());
    }
}

/// Block with the object's storage fused in.
#[repr(C)]
struct InlineBlock<T, A> {
    header: Header, // must stay first
    storage: MaybeUninit<T>,
    alloc: ManuallyDrop<A>,
}

impl<T, A: BlockAlloc> InlineBlock<T, A> {
    const VTABLE: BlockVTable = BlockVTable {
        drop_object: Self::drop_object,
        dealloc_block: Self::dealloc_block,
    };

    unsafe fn drop_object(this: NonNull<Header>) {
        let bp = this.cast::<Self>().as_ptr();
        core::ptr::drop_in_place(addr_of_mut!((*bp).storage).cast::<T>());
    }

    unsafe fn dealloc_block(this: NonNull<Header>) {
        let bp = this.cast::<Self>().as_ptr();
        let alloc = ManuallyDrop::take(&mut (*bp).alloc);
        alloc.deallocate(this.cast::<u8>(), Layout::new::<Self>());
    }
}

/// Rolls an unpopulated block allocation back if construction bails.
struct FreeOnFail<'a, A: BlockAlloc> {
    ptr: NonNull<u8>,
    layout: Layout,
    alloc: &'a A,
}

impl<'a, A: BlockAlloc> Drop for FreeOnFail<'a, A> {
    fn drop(&mut self) {
        unsafe { self.alloc.deallocate(self.ptr, self.layout) };
    }
}

/// Mint the first strong unit and stow the group weak unit.
fn first_owner(header: NonNull<Header>) -> Token<'static, StrongCount> {
    let hdr = unsafe { header.as_ref() };
    let token = hdr.strong.get();
    hdr.weak.get().stow();
    token
}

/// Build a `PtrBlock` adopting `object`. On allocation failure the
/// object is untouched and the deleter and allocator are simply
/// dropped; the caller retains ownership of the object.
pub(crate) fn make_ptr_block<U, D, A>(
    object: NonNull<U>,
    deleter: D,
    alloc: A,
) -> Result<(NonNull<Header>, Token<'static, StrongCount>), AllocError>
where
    U: ?Sized,
    D: Dispose<U> + 'static,
    A: BlockAlloc + 'static,
{
    let layout = Layout::new::<PtrBlock<U, D, A>>();
    let raw = alloc.allocate(layout)?;
    let block: NonNull<PtrBlock<U, D, A>> = raw.cast();
    let bp = block.as_ptr();
    unsafe {
        addr_of_mut!((*bp).header).write(Header::new(&PtrBlock::<U, D, A>::VTABLE));
        addr_of_mut!((*bp).object).write(object);
        addr_of_mut!((*bp).deleter).write(ManuallyDrop::new(deleter));
        addr_of_mut!((*bp).alloc).write(ManuallyDrop::new(alloc));
    }
    let header: NonNull<Header> = block.cast();
    let token = first_owner(header);
    Ok((header, token))
}

/// Build an `InlineBlock`, constructing the object in place from
/// `init`. If `init` errors or unwinds, the block allocation is rolled
/// back without running any object destructor and before any owning
/// unit is minted.
pub(crate) fn make_inline<T, A, E, F>(
    alloc: A,
    init: F,
) -> Result<(NonNull<T>, NonNull<Header>, Token<'static, StrongCount>), BuildError<E>>
where
    A: BlockAlloc + 'static,
    F: FnOnce() -> Result<T, E>,
{
    let layout = Layout::new::<InlineBlock<T, A>>();
    let raw = alloc.allocate(layout).map_err(BuildError::Alloc)?;
    let guard = FreeOnFail {
        ptr: raw,
        layout,
        alloc: &alloc,
    };
    let value = init().map_err(BuildError::Init)?;
    core::mem::forget(guard);

    let block: NonNull<InlineBlock<T, A>> = raw.cast();
    let bp = block.as_ptr();
    unsafe {
        addr_of_mut!((*bp).header).write(Header::new(&InlineBlock::<T, A>::VTABLE));
        addr_of_mut!((*bp).storage).cast::<T>().write(value);
        addr_of_mut!((*bp).alloc).write(ManuallyDrop::new(alloc));
    }
    let header: NonNull<Header> = block.cast();
    let token = first_owner(header);
    let object = unsafe { NonNull::new_unchecked(addr_of_mut!((*bp).storage).cast::<T>()) };
    Ok((object, header, token))
}
