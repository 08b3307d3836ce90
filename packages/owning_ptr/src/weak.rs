use std::fmt;
use std::mem;

use crate::{BlockRef, ControlBlock, Error, Result, SharedPtr};

/// A non-owning observer of a value owned by one or more [`SharedPtr`]s.
///
/// A weak pointer keeps the control block alive but not the value. Once the last strong
/// reference is gone, the weak pointer is expired and can no longer be promoted.
///
/// A weak pointer remembers which part of the value its source pointer was aimed at, so
/// promoting a weak pointer created from a projected [`SharedPtr`] yields a projected pointer.
///
/// # Example
///
/// ```
/// use owning_ptr::{SharedPtr, WeakPtr};
///
/// let mut shared = SharedPtr::new(5_u32);
/// let weak = WeakPtr::from(&shared);
///
/// assert!(!weak.expired());
/// assert_eq!(*weak.lock(), 5);
///
/// shared.reset();
///
/// assert!(weak.expired());
/// assert!(weak.lock().is_empty());
/// ```
///
/// # Thread safety
///
/// The reference count is not atomic, so this type is neither [`Send`] nor [`Sync`].
pub struct WeakPtr<T: ?Sized> {
    parts: Option<BlockRef<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// Creates a weak pointer that never referred to anything. It is always expired.
    #[must_use]
    pub const fn new() -> Self {
        Self { parts: None }
    }

    /// Whether the value is gone, or this pointer never referred to one.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.parts
            // SAFETY: We hold a weak reference, so the block is alive.
            .is_none_or(|parts| unsafe { parts.header() }.is_value_destroyed())
    }

    /// The number of strong references to the value. Zero if expired.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.parts
            // SAFETY: We hold a weak reference, so the block is alive.
            .map_or(0, |parts| unsafe { parts.header() }.strong_count())
    }

    /// Promotes this weak pointer to a strong one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Expired`] if the value has already been destroyed or this pointer
    /// never referred to a value.
    pub fn upgrade(&self) -> Result<SharedPtr<T>> {
        let parts = self.parts.ok_or(Error::Expired)?;

        // SAFETY: We hold a weak reference, so the block is alive.
        if !unsafe { parts.header() }.try_increment_strong() {
            return Err(Error::Expired);
        }

        Ok(SharedPtr::from_parts(parts))
    }

    /// Promotes this weak pointer to a strong one, returning an empty pointer if the value
    /// has already been destroyed.
    #[must_use]
    pub fn lock(&self) -> SharedPtr<T> {
        self.upgrade().unwrap_or_default()
    }

    /// Releases this pointer's weak reference, leaving it expired.
    pub fn reset(&mut self) {
        let Some(parts) = self.parts.take() else {
            return;
        };

        // SAFETY: We owned a weak reference and have just given it up.
        unsafe {
            ControlBlock::release_weak(parts.block);
        }
    }

    /// Exchanges the targets of two weak pointers without touching any reference counts.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(shared: &SharedPtr<T>) -> Self {
        let parts = shared.parts();

        if let Some(parts) = parts {
            // SAFETY: The shared pointer holds a strong reference, so the block is alive.
            unsafe { parts.header() }.increment_weak();
        }

        Self { parts }
    }
}

impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = Error;

    fn try_from(weak: &WeakPtr<T>) -> Result<Self> {
        weak.upgrade()
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(parts) = self.parts {
            // SAFETY: We hold a weak reference, so the block is alive.
            unsafe { parts.header() }.increment_weak();
        }

        Self { parts: self.parts }
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPtr")
            .field("expired", &self.expired())
            .finish()
    }
}
