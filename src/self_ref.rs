//! Self-reference capability.
//!
//! An object that wants to hand out handles to itself from inside its
//! own methods embeds a [`SelfRef`] field and implements
//! [`WithSelfRef`]. The binding construction paths
//! ([`Shared::new_with_self_ref`], or any entry point followed by
//! [`Shared::bind_self_ref`]) populate the field with an observer of
//! the new ownership group before the owning handle reaches the
//! caller. Accessing an unbound or expired self reference is a
//! contract violation and fails fast with a panic.
//!
//! [`Shared::new_with_self_ref`]: crate::Shared::new_with_self_ref
//! [`Shared::bind_self_ref`]: crate::Shared::bind_self_ref

use core::cell::Cell;
use core::fmt;

use crate::shared::Shared;
use crate::weak::Weak;

/// Mixin field holding the object's observer of its own group.
pub struct SelfRef<T: ?Sized> {
    slot: Cell<Option<Weak<T>>>,
}

impl<T: ?Sized> SelfRef<T> {
    /// An unbound self reference; construction paths bind it later.
    pub const fn new() -> Self {
        Self {
            slot: Cell::new(None),
        }
    }

    /// True once a binding construction path has run for this object.
    pub fn is_bound(&self) -> bool {
        let slot = self.slot.take();
        let bound = slot.is_some();
        self.slot.set(slot);
        bound
    }

    /// An observer of the object's own ownership group.
    ///
    /// Panics if no owning handle has ever been bound to this object.
    pub fn weak(&self) -> Weak<T> {
        let held = self
            .slot
            .take()
            .expect("self reference accessed before any owning handle was bound");
        let out = held.clone();
        self.slot.set(Some(held));
        out
    }

    /// A new owning handle for the object's own ownership group.
    ///
    /// Panics if no owning handle has ever been bound, or if the group
    /// has already expired (the object is being torn down).
    pub fn shared(&self) -> Shared<T> {
        let held = self
            .slot
            .take()
            .expect("self reference accessed before any owning handle was bound");
        let upgraded = held.upgrade();
        self.slot.set(Some(held));
        upgraded.expect("self reference accessed while the object is being torn down")
    }

    /// Rebinding replaces any previous group; last bind wins.
    pub(crate) fn bind(&self, weak: Weak<T>) {
        self.slot.set(Some(weak));
    }
}

impl<T: ?Sized> Default for SelfRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloned object starts outside any ownership group.
impl<T: ?Sized> Clone for SelfRef<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for SelfRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfRef")
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Implemented by objects embedding a [`SelfRef`] field.
pub trait WithSelfRef {
    /// The embedded self-reference field.
    fn self_ref(&self) -> &SelfRef<Self>;

    /// A new owning handle to `self`. See [`SelfRef::shared`].
    fn shared_self(&self) -> Shared<Self> {
        self.self_ref().shared()
    }

    /// An observer of `self`'s group. See [`SelfRef::weak`].
    fn weak_self(&self) -> Weak<Self> {
        self.self_ref().weak()
    }
}
