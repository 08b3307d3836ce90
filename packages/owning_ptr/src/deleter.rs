use std::ptr::NonNull;

/// Releases an object that an owning pointer no longer needs.
///
/// This is the destruction policy of [`UniquePtr`][crate::UniquePtr] and of
/// [`SharedPtr`][crate::SharedPtr]s created from raw pointers. It is implemented by
/// [`DefaultDelete`] and by any `FnMut(NonNull<T>)` closure.
pub trait Deleter<T: ?Sized> {
    /// Destroys the object and releases the memory it occupies.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// 1. `ptr` refers to an object that this deleter knows how to release.
    /// 2. The object is not accessed through any pointer after this call.
    /// 3. The object is deleted at most once.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Deletes objects that were allocated as a [`Box`].
///
/// Slices (`[T]`) and trait objects are supported through the regular unsized [`Box`] machinery.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[expect(clippy::exhaustive_structs, reason = "intentionally an empty struct")]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        // SAFETY: The caller guarantees that the object was allocated as a Box
        // and that nobody else will access or delete it.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

impl<T: ?Sized, F> Deleter<T> for F
where
    F: FnMut(NonNull<T>),
{
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        self(ptr);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(DefaultDelete: Send, Sync, Copy, Default);

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn default_delete_drops_boxed_value() {
        let drops = Rc::new(Cell::new(0));
        let ptr = NonNull::from(Box::leak(Box::new(DropCounter(Rc::clone(&drops)))));

        unsafe {
            DefaultDelete.delete(ptr);
        }

        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn default_delete_drops_every_slice_element() {
        let drops = Rc::new(Cell::new(0));
        let boxed: Box<[DropCounter]> = (0..5).map(|_| DropCounter(Rc::clone(&drops))).collect();
        let ptr = NonNull::from(Box::leak(boxed));

        unsafe {
            DefaultDelete.delete(ptr);
        }

        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn closure_is_a_deleter() {
        let deleted = Cell::new(0);
        let mut value = 42_u32;

        let mut deleter = |ptr: NonNull<u32>| {
            deleted.set(unsafe { *ptr.as_ptr() });
        };

        unsafe {
            deleter.delete(NonNull::from(&mut value));
        }

        assert_eq!(deleted.get(), 42);
    }
}
