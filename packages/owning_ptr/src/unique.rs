use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::ptr::NonNull;

use crate::{CompressedPair, DefaultDelete, Deleter};

/// An exclusive owning pointer that releases its target through a [`Deleter`].
///
/// With the default [`DefaultDelete`] policy this behaves like a nullable [`Box`]. A custom
/// deleter allows the pointer to own objects that were allocated some other way.
///
/// A null [`UniquePtr`] owns nothing. Dereferencing a null pointer panics; use
/// [`get()`][Self::get] for a checked alternative.
///
/// # Example
///
/// ```
/// use owning_ptr::UniquePtr;
///
/// let mut ptr = UniquePtr::new(vec![1, 2]);
/// ptr.push(3);
///
/// assert_eq!(ptr.len(), 3);
///
/// ptr.reset();
/// assert!(ptr.is_null());
/// ```
///
/// # Thread safety
///
/// The pointer is [`Send`] and [`Sync`] if both the target and the deleter are.
pub struct UniquePtr<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    pair: CompressedPair<Option<NonNull<T>>, D>,

    _owns: PhantomData<T>,
}

impl<T> UniquePtr<T> {
    /// Moves `value` to the heap and returns a pointer that owns it.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> UniquePtr<T> {
    /// Takes over a boxed value.
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(value));

        // SAFETY: The pointer comes from a Box that we own, which is exactly
        // what DefaultDelete knows how to release.
        unsafe { Self::from_raw_with_deleter(ptr, DefaultDelete) }
    }

    /// Converts the pointer back into a box, or `None` if the pointer is null.
    #[must_use]
    pub fn into_box(mut self) -> Option<Box<T>> {
        let ptr = self.release()?;

        // SAFETY: With DefaultDelete, every non-null pointer we own came from a Box.
        // Ownership was released above, so nobody else will free it.
        Some(unsafe { Box::from_raw(ptr.as_ptr()) })
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> UniquePtr<T, D> {
    /// Creates a null pointer that owns nothing.
    #[must_use]
    pub fn null() -> Self {
        Self {
            pair: CompressedPair::new(None, D::default()),
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    /// Creates a pointer that owns `ptr` and releases it via `deleter`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// 1. `ptr` remains valid until `deleter` is called on it.
    /// 2. `deleter` is able to release `ptr`.
    /// 3. Ownership of the target is not held or handed to anything else.
    #[must_use]
    pub unsafe fn from_raw_with_deleter(ptr: NonNull<T>, deleter: D) -> Self {
        Self {
            pair: CompressedPair::new(Some(ptr), deleter),
            _owns: PhantomData,
        }
    }

    /// Gives up ownership of the target without releasing it, leaving the pointer null.
    ///
    /// The caller becomes responsible for releasing the returned pointer.
    #[must_use = "the released target is leaked unless the returned pointer is released"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.pair.first_mut().take()
    }

    /// Releases the target (if any) via the deleter, leaving the pointer null.
    pub fn reset(&mut self) {
        // SAFETY: Storing a null pointer has no requirements.
        unsafe {
            self.reset_raw(None);
        }
    }

    /// Takes over `ptr` and then releases the previous target (if any) via the deleter.
    ///
    /// The new pointer is stored before the previous target is released, so the pointer is
    /// already in its final state if the deleter looks at it.
    ///
    /// # Safety
    ///
    /// If `ptr` is not `None`, it must satisfy the requirements of
    /// [`from_raw_with_deleter()`][Self::from_raw_with_deleter] for the current deleter.
    pub unsafe fn reset_raw(&mut self, ptr: Option<NonNull<T>>) {
        let previous = mem::replace(self.pair.first_mut(), ptr);

        if let Some(previous) = previous {
            // SAFETY: We owned the previous target and have just given up the pointer to it.
            unsafe {
                self.pair.second_mut().delete(previous);
            }
        }
    }

    /// Exchanges the targets and deleters of two pointers.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.pair, &mut other.pair);
    }

    /// Returns a reference to the target, or `None` if the pointer is null.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: We own the target and the borrow of `self` prevents mutation.
        self.as_ptr().map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns an exclusive reference to the target, or `None` if the pointer is null.
    #[must_use]
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: We own the target exclusively and hold `self` mutably.
        self.as_ptr().map(|mut ptr| unsafe { ptr.as_mut() })
    }

    /// Returns a pointer to the target, or `None` if the pointer is null.
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        *self.pair.first()
    }

    /// Whether the pointer owns nothing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.pair.first().is_none()
    }

    /// The deleter that will release the target.
    #[must_use]
    pub fn deleter(&self) -> &D {
        self.pair.second()
    }

    /// The deleter that will release the target, mutably.
    #[must_use]
    pub fn deleter_mut(&mut self) -> &mut D {
        self.pair.second_mut()
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for UniquePtr<T, D> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for UniquePtr<T, D> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get().expect("dereferenced a null UniquePtr")
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for UniquePtr<T, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.get_mut().expect("dereferenced a null UniquePtr")
    }
}

impl<T, D: Deleter<[T]>> Index<usize> for UniquePtr<[T], D> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        let len = self.get().map_or(0, <[T]>::len);

        self.get()
            .and_then(|slice| slice.get(index))
            .unwrap_or_else(|| panic!("index {index} out of bounds for slice of length {len}"))
    }
}

impl<T, D: Deleter<[T]>> IndexMut<usize> for UniquePtr<[T], D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let len = self.get().map_or(0, <[T]>::len);

        self.get_mut()
            .and_then(|slice| slice.get_mut(index))
            .unwrap_or_else(|| panic!("index {index} out of bounds for slice of length {len}"))
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for UniquePtr<T, D> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> From<Box<T>> for UniquePtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T>> fmt::Debug for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UniquePtr").field(&self.get()).finish()
    }
}

// SAFETY: We own the target exclusively, so sending the pointer sends the target and the
// deleter along with it. Both are required to be Send.
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for UniquePtr<T, D> {}

// SAFETY: Shared access to the pointer only grants shared access to the target and the
// deleter. Both are required to be Sync.
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for UniquePtr<T, D> {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(UniquePtr<u32>: Send, Sync, Default, fmt::Debug);
    assert_impl_all!(UniquePtr<[u8]>: Send, Sync);
    assert_not_impl_any!(UniquePtr<Rc<u32>>: Send, Sync);
    assert_not_impl_any!(UniquePtr<Cell<u32>>: Sync);
    assert_not_impl_any!(UniquePtr<u32>: Clone);

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn default_deleter_takes_no_space() {
        assert_eq!(size_of::<UniquePtr<u64>>(), size_of::<usize>());
        assert_eq!(size_of::<UniquePtr<[u64]>>(), size_of::<&[u64]>());
    }

    #[test]
    fn null_owns_nothing() {
        let ptr = UniquePtr::<u32>::null();

        assert!(ptr.is_null());
        assert_eq!(ptr.get(), None);
        assert_eq!(ptr.as_ptr(), None);
        assert_eq!(ptr.into_box(), None);
    }

    #[test]
    #[should_panic]
    fn deref_of_null_panics() {
        let ptr = UniquePtr::<u32>::default();
        let _value = *ptr;
    }

    #[test]
    fn drop_releases_target() {
        let drops = Rc::new(Cell::new(0));

        let ptr = UniquePtr::new(DropCounter(Rc::clone(&drops)));
        assert_eq!(drops.get(), 0);

        drop(ptr);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn mutation_through_deref_mut() {
        let mut ptr = UniquePtr::new(String::from("text"));

        ptr.push('!');
        ptr.get_mut().unwrap().push('?');

        assert_eq!(&*ptr, "text!?");
    }

    #[test]
    fn release_gives_up_ownership() {
        let drops = Rc::new(Cell::new(0));
        let mut ptr = UniquePtr::new(DropCounter(Rc::clone(&drops)));

        let raw = ptr.release().unwrap();
        assert!(ptr.is_null());

        drop(ptr);
        assert_eq!(drops.get(), 0);

        drop(unsafe { Box::from_raw(raw.as_ptr()) });
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn into_box_round_trip() {
        let ptr = UniquePtr::from(Box::new(5_u8));

        let boxed = ptr.into_box().unwrap();

        assert_eq!(*boxed, 5);
    }

    #[test]
    fn reset_raw_stores_new_target_before_deleting_old() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_in_deleter = Rc::clone(&log);

        let deleter = move |ptr: NonNull<u32>| {
            log_in_deleter.borrow_mut().push(*unsafe { ptr.as_ref() });
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        };

        let first = NonNull::from(Box::leak(Box::new(1_u32)));
        let second = NonNull::from(Box::leak(Box::new(2_u32)));

        let mut ptr = unsafe { UniquePtr::from_raw_with_deleter(first, deleter) };

        unsafe {
            ptr.reset_raw(Some(second));
        }
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(*ptr, 2);

        ptr.reset();
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert!(ptr.is_null());

        drop(ptr);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn stateful_deleter_is_accessible() {
        struct CountingDelete {
            deleted: usize,
        }

        impl Deleter<u16> for CountingDelete {
            unsafe fn delete(&mut self, ptr: NonNull<u16>) {
                self.deleted += 1;
                drop(unsafe { Box::from_raw(ptr.as_ptr()) });
            }
        }

        let raw = NonNull::from(Box::leak(Box::new(3_u16)));
        let mut ptr =
            unsafe { UniquePtr::from_raw_with_deleter(raw, CountingDelete { deleted: 0 }) };

        ptr.reset();
        assert_eq!(ptr.deleter().deleted, 1);

        ptr.deleter_mut().deleted = 10;
        assert_eq!(ptr.deleter().deleted, 10);
    }

    #[test]
    fn swap_exchanges_targets() {
        let mut first = UniquePtr::new(1_u32);
        let mut second = UniquePtr::null();

        first.swap(&mut second);

        assert!(first.is_null());
        assert_eq!(*second, 1);
    }

    #[test]
    fn slices_are_indexable() {
        let mut ptr = UniquePtr::from_box(vec![10, 20, 30].into_boxed_slice());

        ptr[1] += 1;

        assert_eq!(ptr[0], 10);
        assert_eq!(ptr[1], 21);
        assert_eq!(ptr.len(), 3);
    }

    #[test]
    #[should_panic]
    fn slice_index_out_of_bounds_panics() {
        let ptr = UniquePtr::from_box(vec![1, 2].into_boxed_slice());
        let _value = ptr[2];
    }

    #[test]
    #[should_panic(expected = "index 0 out of bounds for slice of length 0")]
    fn null_slice_index_reports_bounds() {
        let ptr = UniquePtr::<[u32]>::null();
        let _value = ptr[0];
    }

    #[test]
    #[should_panic(expected = "index 0 out of bounds for slice of length 0")]
    fn null_slice_index_mut_reports_bounds() {
        let mut ptr = UniquePtr::<[u32]>::null();
        ptr[0] = 1;
    }

    #[test]
    fn slice_elements_dropped_once() {
        let drops = Rc::new(Cell::new(0));
        let slice: Box<[DropCounter]> = (0..4).map(|_| DropCounter(Rc::clone(&drops))).collect();

        drop(UniquePtr::from_box(slice));

        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn debug_shows_target() {
        assert_eq!(format!("{:?}", UniquePtr::new(4_u8)), "UniquePtr(Some(4))");
        assert_eq!(format!("{:?}", UniquePtr::<u8>::null()), "UniquePtr(None)");
    }
}
