//! shared-rc: single-threaded shared/weak ownership handles with
//! custom deletion and block-allocation strategies.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the Shared/Weak pair in small, verifiable layers so
//!   each piece can be reasoned about independently.
//! - Layers:
//!   - tokens: linear release tokens plus the two counters
//!     (StrongCount for owners, WeakCount for observers). A token is a
//!     zero-sized proof of one acquired unit; its drop panics, so the
//!     only valid disposal is returning it to the counter.
//!   - alloc / dispose: the strategy seams. Blocks allocate and free
//!     their own storage through a `BlockAlloc` value stored inside
//!     the block; adopted objects are destroyed by a `Dispose` value.
//!   - block: the control-block hierarchy. A `Header` (counters +
//!     dispatch table) is the first field of both concrete layouts —
//!     object-adopting `PtrBlock` and storage-fusing `InlineBlock` —
//!     so handles address every block as `NonNull<Header>`.
//!   - shared / weak: the public handles; each carries its token in a
//!     `ManuallyDrop` slot and returns it on drop.
//!   - upcast / self_ref: the compile-time handle-compatibility
//!     relation and the self-reference capability.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` by design (no atomics).
//! - One control block per ownership group; the block is reachable
//!   while either counter is positive, the object alive only while the
//!   strong counter is.
//! - Teardown ordering: object first, exactly once, on the strong
//!   1 -> 0 crossing; block storage last, exactly once, when both
//!   counts are zero. The strong side stows one collective weak unit
//!   from construction until the object is destroyed, so observers
//!   dropped by the object's own destructor can never reclaim the
//!   block early.
//!
//! Why this split?
//! - Localize invariants: zero-crossing logic exists only in
//!   `block::Header`; counter arithmetic only in `tokens`.
//! - Minimize unsafe: raw-pointer handling is confined to `block` and
//!   the handles' small constructors; strategies and counters are safe.
//! - Clear failure boundaries: construction either returns a fully
//!   formed owning handle or rolls the block allocation back and
//!   propagates; teardown never fails (deleters and destructors must
//!   not panic there).
//!
//! Overflow semantics
//! - Counter overflow aborts the process, matching `Rc`. Counter
//!   underflow is a bookkeeping bug and asserts.
//!
//! Notes and non-goals
//! - No cycle detection: owning cycles leak; `Weak` exists precisely
//!   so callers can break cycles by hand.
//! - No atomic counting. Porting to a concurrent setting would require
//!   every counter mutation and zero-crossing check to become a single
//!   fetch-and-decrement with the test on the returned prior value.
//! - Moves never touch a counter and leave no moved-from state;
//!   absence of a handle is `Option`.
//! - Public surface is `Shared`, `Weak`, the strategy traits, the
//!   upcast relation, and the self-reference capability; the block and
//!   counter layers are implementation details.

mod alloc;
mod block;
mod dispose;
mod self_ref;
mod shared;
mod tokens;
mod upcast;
mod weak;

// Public surface
pub use alloc::{AllocError, BlockAlloc, Global};
pub use block::BuildError;
pub use dispose::{BoxDrop, Dispose, FnDispose};
pub use self_ref::{SelfRef, WithSelfRef};
pub use shared::Shared;
pub use upcast::Upcast;
pub use weak::Weak;

// Internal benchmarking hook (see Cargo feature `bench_internal`).
#[cfg(feature = "bench_internal")]
pub use tokens::{Count, StrongCount, Token, WeakCount};
