use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ops::Deref;
use std::ptr::NonNull;

use crate::{BlockRef, ControlBlock, DefaultDelete, Deleter, InlineBlock, SeparateBlock, WeakPtr};

/// A shared owning pointer with an external, non-atomic reference count.
///
/// The value is destroyed when the last [`SharedPtr`] referring to it is dropped or reset.
/// [`WeakPtr`]s created via [`downgrade()`][Self::downgrade] can observe the value without
/// keeping it alive.
///
/// A [`SharedPtr`] may be empty, in which case it owns nothing. Dereferencing an empty
/// pointer panics; use [`get()`][Self::get] for a checked alternative.
///
/// # Allocation
///
/// [`new()`][Self::new] and its variants place the value inside the control block, using a
/// single allocation. Values that already live on the heap ([`from_box()`][Self::from_box],
/// [`from_raw()`][Self::from_raw]) get a separately allocated control block that also stores
/// the [`Deleter`] that will release them.
///
/// # Aliasing
///
/// A [`SharedPtr`] does not have to point at the value it keeps alive. [`project()`][Self::project]
/// and [`cast_with_fn()`][Self::cast_with_fn] create pointers to a part of the value (or to a
/// trait object view of it) that share ownership of the whole value.
///
/// # Example
///
/// ```
/// use owning_ptr::SharedPtr;
///
/// let first = SharedPtr::new(String::from("shared"));
/// let second = first.clone();
///
/// assert_eq!(first.use_count(), 2);
/// assert_eq!(*second, "shared");
/// assert_eq!(first, second);
/// ```
///
/// # Thread safety
///
/// The reference count is not atomic, so this type is neither [`Send`] nor [`Sync`].
pub struct SharedPtr<T: ?Sized> {
    parts: Option<BlockRef<T>>,

    _owns: PhantomData<T>,
}

impl<T> SharedPtr<T> {
    /// Creates a shared pointer owning `value`, co-allocated with its control block.
    #[must_use]
    pub fn new(value: T) -> Self {
        let (block, value) = InlineBlock::allocate(value);

        Self::from_parts(BlockRef { block, value })
    }

    /// Creates a shared pointer owning the value returned by `f`, co-allocated with its
    /// control block.
    #[must_use]
    pub fn new_with(f: impl FnOnce() -> T) -> Self {
        Self::new(f())
    }

    /// Creates a shared pointer whose value is initialized in place by `init`, inside the
    /// control block allocation.
    ///
    /// # Safety
    ///
    /// `init` must fully initialize the value before returning. If `init` panics, the
    /// allocation is released and the partially initialized value is not dropped.
    ///
    /// # Example
    ///
    /// ```
    /// use owning_ptr::SharedPtr;
    ///
    /// // SAFETY: The closure initializes the whole array.
    /// let ptr = unsafe {
    ///     SharedPtr::<[u8; 1024]>::new_in_place(|slot| {
    ///         slot.write([0xAB; 1024]);
    ///     })
    /// };
    ///
    /// assert_eq!(ptr[1023], 0xAB);
    /// ```
    #[must_use]
    pub unsafe fn new_in_place(init: impl FnOnce(&mut MaybeUninit<T>)) -> Self {
        // SAFETY: Forwarding guarantees from the caller.
        let (block, value) = unsafe { InlineBlock::allocate_in_place(init) };

        Self::from_parts(BlockRef { block, value })
    }
}

impl<T: ?Sized> SharedPtr<T> {
    /// Creates an empty shared pointer that owns nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            parts: None,
            _owns: PhantomData,
        }
    }

    /// Creates a shared pointer that takes over a boxed value.
    ///
    /// The box is not moved; a separate control block is allocated for it. This is how
    /// trait objects and slices become shared.
    ///
    /// # Example
    ///
    /// ```
    /// use std::fmt::Display;
    ///
    /// use owning_ptr::SharedPtr;
    ///
    /// let boxed: Box<dyn Display> = Box::new(42);
    /// let ptr = SharedPtr::from_box(boxed);
    /// assert_eq!(ptr.to_string(), "42");
    /// ```
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        let value = NonNull::from(Box::leak(value));

        // SAFETY: The pointer comes from a Box that we own, which is exactly
        // what DefaultDelete knows how to release.
        unsafe { Self::from_raw_with_deleter(value, DefaultDelete) }
    }

    /// Creates a shared pointer that takes over a value allocated as a [`Box`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// 1. `value` was obtained from [`Box::into_raw()`] or [`Box::leak()`].
    /// 2. Ownership of the value is not held or handed to anything else. In particular, the
    ///    same pointer must not be passed to two independent shared pointers.
    #[must_use]
    pub unsafe fn from_raw(value: NonNull<T>) -> Self {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { Self::from_raw_with_deleter(value, DefaultDelete) }
    }

    /// Creates a shared pointer that takes over `value` and releases it via `deleter` once
    /// the last strong reference is gone.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// 1. `value` remains valid for reads until `deleter` is called on it.
    /// 2. `deleter` is able to release `value`.
    /// 3. Ownership of the value is not held or handed to anything else.
    ///
    /// # Example
    ///
    /// ```
    /// use std::cell::Cell;
    /// use std::ptr::NonNull;
    /// use std::rc::Rc;
    ///
    /// use owning_ptr::SharedPtr;
    ///
    /// let released = Rc::new(Cell::new(false));
    /// let released_clone = Rc::clone(&released);
    ///
    /// let raw = NonNull::from(Box::leak(Box::new(5_u32)));
    ///
    /// // SAFETY: The deleter releases the box that the pointer came from.
    /// let ptr = unsafe {
    ///     SharedPtr::from_raw_with_deleter(raw, move |ptr: NonNull<u32>| {
    ///         released_clone.set(true);
    ///         drop(Box::from_raw(ptr.as_ptr()));
    ///     })
    /// };
    ///
    /// drop(ptr);
    /// assert!(released.get());
    /// ```
    #[must_use]
    pub unsafe fn from_raw_with_deleter<D>(value: NonNull<T>, deleter: D) -> Self
    where
        D: Deleter<T> + 'static,
    {
        // SAFETY: Forwarding guarantees from the caller.
        let block = unsafe { SeparateBlock::allocate(value, deleter) };

        Self::from_parts(BlockRef { block, value })
    }

    /// Creates a shared pointer that shares ownership with `owner` but points at `value`.
    ///
    /// If `owner` is empty, the result is empty as well.
    ///
    /// The returned pointer keeps the destructor of `U` pending without naming `U`, so `U`
    /// must not borrow anything:
    ///
    /// ```compile_fail,E0597
    /// use std::ptr::NonNull;
    ///
    /// use owning_ptr::SharedPtr;
    ///
    /// static FALLBACK: u8 = 0;
    ///
    /// let text = String::from("borrowed");
    /// let owner = SharedPtr::new(text.as_str());
    ///
    /// // SAFETY: `FALLBACK` outlives everything.
    /// let alias = unsafe { SharedPtr::aliasing(&owner, NonNull::from(&FALLBACK)) };
    /// ```
    ///
    /// # Safety
    ///
    /// The caller must ensure that `value` stays valid for as long as the value owned by
    /// `owner` is alive. Typically, `value` points into that value.
    #[must_use]
    pub unsafe fn aliasing<U: ?Sized + 'static>(
        owner: &SharedPtr<U>,
        value: NonNull<T>,
    ) -> Self {
        let Some(parts) = owner.parts else {
            return Self::empty();
        };

        // SAFETY: `owner` holds a strong reference.
        unsafe { parts.header() }.increment_strong();

        Self::from_parts(BlockRef {
            block: parts.block,
            value,
        })
    }

    /// Creates a shared pointer to a part of this pointer's target, sharing ownership of
    /// the whole value.
    ///
    /// If this pointer is empty, the result is empty as well.
    ///
    /// # Example
    ///
    /// ```
    /// use owning_ptr::SharedPtr;
    ///
    /// let pair = SharedPtr::new((String::from("name"), 42_u32));
    /// let number = pair.project(|pair| &pair.1);
    ///
    /// drop(pair);
    /// assert_eq!(*number, 42);
    /// assert_eq!(number.use_count(), 1);
    /// ```
    #[must_use]
    pub fn project<U: ?Sized>(&self, f: impl FnOnce(&T) -> &U) -> SharedPtr<U>
    where
        T: 'static,
    {
        self.clone().cast_with_fn(f)
    }

    /// Converts this pointer into a pointer to a different view of the same value, for
    /// example a trait object, without touching the reference count.
    ///
    /// If this pointer is empty, the result is empty as well.
    ///
    /// # Example
    ///
    /// ```
    /// use std::fmt::Debug;
    ///
    /// use owning_ptr::SharedPtr;
    ///
    /// let ptr = SharedPtr::new(vec![1, 2, 3]);
    /// let debug: SharedPtr<dyn Debug> = ptr.cast_with_fn(|v| v as &dyn Debug);
    ///
    /// assert_eq!(format!("{:?}", &*debug), "[1, 2, 3]");
    /// ```
    #[must_use]
    pub fn cast_with_fn<U: ?Sized>(mut self, f: impl FnOnce(&T) -> &U) -> SharedPtr<U>
    where
        T: 'static,
    {
        let Some(current) = self.get() else {
            return SharedPtr::empty();
        };

        let value = NonNull::from(f(current));

        let parts = self
            .parts
            .take()
            .expect("we checked above that the pointer is not empty");

        SharedPtr::from_parts(BlockRef {
            block: parts.block,
            value,
        })
    }

    /// Takes over a strong reference that the caller has already accounted for.
    pub(crate) fn from_parts(parts: BlockRef<T>) -> Self {
        Self {
            parts: Some(parts),
            _owns: PhantomData,
        }
    }

    pub(crate) fn parts(&self) -> Option<BlockRef<T>> {
        self.parts
    }

    /// Returns a reference to the target, or `None` if the pointer is empty.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: We hold a strong reference, so the target is alive. Shared pointers never
        // hand out mutable references, so shared access is always valid.
        self.parts.map(|parts| unsafe { parts.value.as_ref() })
    }

    /// Returns a pointer to the target, or `None` if the pointer is empty.
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.parts.map(|parts| parts.value)
    }

    /// Whether the pointer owns nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_none()
    }

    /// The number of strong references to the value, including this one.
    ///
    /// Zero if the pointer is empty.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.parts
            // SAFETY: We hold a strong reference, so the block is alive.
            .map_or(0, |parts| unsafe { parts.header() }.strong_count())
    }

    /// The number of weak references to the value.
    ///
    /// Zero if the pointer is empty.
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.parts
            // SAFETY: We hold a strong reference, so the block is alive.
            .map_or(0, |parts| unsafe { parts.header() }.weak_count())
    }

    /// Creates a weak pointer to the same value.
    ///
    /// The weak pointer is expired if this pointer is empty.
    #[must_use]
    pub fn downgrade(&self) -> WeakPtr<T> {
        WeakPtr::from(self)
    }

    /// Releases this pointer's ownership, leaving it empty.
    ///
    /// If this was the last strong reference, the value is destroyed.
    pub fn reset(&mut self) {
        let Some(parts) = self.parts.take() else {
            return;
        };

        // SAFETY: We owned a strong reference and have just given it up.
        unsafe {
            ControlBlock::release_strong(parts.block);
        }
    }

    /// Releases this pointer's ownership and takes over a boxed value instead.
    pub fn reset_with(&mut self, value: Box<T>) {
        *self = Self::from_box(value);
    }

    /// Exchanges the targets of two pointers without touching any reference counts.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    /// Creates another strong reference to the same value.
    ///
    /// Cloning an empty pointer yields an empty pointer.
    fn clone(&self) -> Self {
        let Some(parts) = self.parts else {
            return Self::empty();
        };

        // SAFETY: We hold a strong reference, so the block is alive.
        unsafe { parts.header() }.increment_strong();

        Self::from_parts(parts)
    }
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get().expect("dereferenced an empty SharedPtr")
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    /// Two shared pointers are equal if they share ownership of the same value, regardless
    /// of which part of it they point at. All empty pointers are equal.
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        self.parts.map(|parts| parts.block) == other.parts.map(|parts| parts.block)
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedPtr")
            .field("value", &self.get())
            .field("use_count", &self.use_count())
            .finish()
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
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(SharedPtr<u32>: Clone, Default, fmt::Debug);
    assert_not_impl_any!(SharedPtr<u32>: Send, Sync);
    assert_not_impl_any!(SharedPtr<dyn fmt::Display>: Send, Sync);

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn empty_pointer_owns_nothing() {
        let ptr = SharedPtr::<u32>::empty();

        assert!(ptr.is_empty());
        assert_eq!(ptr.use_count(), 0);
        assert_eq!(ptr.weak_count(), 0);
        assert_eq!(ptr.get(), None);
        assert_eq!(ptr.as_ptr(), None);
        assert_eq!(ptr, SharedPtr::<u32>::default());
    }

    #[test]
    #[should_panic]
    fn deref_of_empty_panics() {
        let ptr = SharedPtr::<u32>::empty();
        let _value = *ptr;
    }

    #[test]
    fn clone_shares_value() {
        let first = SharedPtr::new(10_u32);
        let second = first.clone();

        assert_eq!(first.use_count(), 2);
        assert_eq!(first, second);
        assert_eq!(first.as_ptr(), second.as_ptr());

        drop(first);
        assert_eq!(second.use_count(), 1);
        assert_eq!(*second, 10);
    }

    #[test]
    fn independent_pointers_are_not_equal() {
        let first = SharedPtr::new(1_u32);
        let second = SharedPtr::new(1_u32);

        assert_ne!(first, second);
        assert_ne!(first, SharedPtr::<u32>::empty());
    }

    #[test]
    fn value_destroyed_with_last_strong_reference() {
        let drops = Rc::new(Cell::new(0));

        let first = SharedPtr::new(DropCounter(Rc::clone(&drops)));
        let copies = (0..5).map(|_| first.clone()).collect::<Vec<_>>();

        drop(first);
        assert_eq!(drops.get(), 0);

        drop(copies);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn moved_pointer_keeps_count() {
        let first = SharedPtr::new(String::from("moved"));
        let weak = first.downgrade();

        let second = first;

        assert_eq!(second.use_count(), 1);
        assert_eq!(weak.use_count(), 1);
    }

    #[test]
    fn new_with_and_in_place() {
        let from_fn = SharedPtr::new_with(|| vec![1, 2, 3]);
        assert_eq!(from_fn.len(), 3);

        let in_place = unsafe {
            SharedPtr::<(u8, u64)>::new_in_place(|slot| {
                slot.write((1, 2));
            })
        };
        assert_eq!(*in_place, (1, 2));
    }

    #[test]
    fn in_place_panic_does_not_drop_value() {
        let result = std::panic::catch_unwind(|| unsafe {
            SharedPtr::<String>::new_in_place(|_slot| panic!("initialization failed"))
        });

        assert!(result.is_err());
    }

    #[test]
    fn from_box_supports_unsized_targets() {
        let slice: SharedPtr<[u32]> = SharedPtr::from_box(vec![1, 2, 3].into_boxed_slice());
        assert_eq!(&*slice, &[1, 2, 3]);

        let text: SharedPtr<str> = SharedPtr::from(Box::<str>::from("text"));
        assert_eq!(&*text, "text");
    }

    #[test]
    fn from_raw_releases_box() {
        let drops = Rc::new(Cell::new(0));
        let raw = NonNull::from(Box::leak(Box::new(DropCounter(Rc::clone(&drops)))));

        let ptr = unsafe { SharedPtr::from_raw(raw) };
        assert_eq!(ptr.as_ptr(), Some(raw));

        drop(ptr);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn custom_deleter_runs_on_last_release() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_in_deleter = Rc::clone(&log);

        let raw = NonNull::from(Box::leak(Box::new(7_u8)));
        let first = unsafe {
            SharedPtr::from_raw_with_deleter(raw, move |ptr: NonNull<u8>| {
                log_in_deleter.borrow_mut().push(*ptr.as_ref());
                drop(Box::from_raw(ptr.as_ptr()));
            })
        };
        let second = first.clone();

        drop(first);
        assert!(log.borrow().is_empty());

        drop(second);
        assert_eq!(*log.borrow(), vec![7]);
    }

    #[test]
    fn aliasing_keeps_owner_alive() {
        let drops = Rc::new(Cell::new(0));
        let owner = SharedPtr::new((DropCounter(Rc::clone(&drops)), 99_u64));

        let alias = unsafe { SharedPtr::aliasing(&owner, NonNull::from(&owner.1)) };

        assert_eq!(owner.use_count(), 2);
        assert_eq!(alias.use_count(), 2);
        assert!(alias == owner);

        drop(owner);
        assert_eq!(drops.get(), 0);
        assert_eq!(*alias, 99);

        drop(alias);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn aliasing_empty_owner_is_empty() {
        let owner = SharedPtr::<u32>::empty();
        let mut target = 5_u32;

        let alias = unsafe { SharedPtr::aliasing(&owner, NonNull::from(&mut target)) };

        assert!(alias.is_empty());
    }

    #[test]
    fn project_and_cast_share_ownership() {
        let pair = SharedPtr::new((String::from("key"), 3_i32));

        let key = pair.project(|pair| pair.0.as_str());
        assert_eq!(pair.use_count(), 2);

        let display: SharedPtr<dyn fmt::Display> = pair.cast_with_fn(|pair| &pair.1 as &dyn fmt::Display);
        assert_eq!(display.use_count(), 2);
        assert_eq!(display.to_string(), "3");
        assert_eq!(&*key, "key");
        assert!(key == display);
    }

    #[test]
    fn cast_of_empty_is_empty() {
        let ptr = SharedPtr::<u32>::empty();
        let cast: SharedPtr<dyn fmt::Debug> = ptr.cast_with_fn(|v| v as &dyn fmt::Debug);

        assert!(cast.is_empty());
    }

    #[test]
    fn reset_and_reset_with() {
        let drops = Rc::new(Cell::new(0));

        let mut ptr = SharedPtr::new(DropCounter(Rc::clone(&drops)));
        ptr.reset();
        assert!(ptr.is_empty());
        assert_eq!(drops.get(), 1);

        ptr.reset_with(Box::new(DropCounter(Rc::clone(&drops))));
        assert_eq!(ptr.use_count(), 1);

        ptr.reset_with(Box::new(DropCounter(Rc::clone(&drops))));
        assert_eq!(drops.get(), 2);

        drop(ptr);
        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn swap_exchanges_ownership() {
        let mut first = SharedPtr::new(1_u32);
        let mut second = SharedPtr::new(2_u32);
        let first_copy = first.clone();

        first.swap(&mut second);

        assert_eq!(*first, 2);
        assert_eq!(*second, 1);
        assert_eq!(second, first_copy);
        assert_eq!(second.use_count(), 2);
        assert_eq!(first.use_count(), 1);
    }

    #[test]
    fn debug_shows_value_and_count() {
        let ptr = SharedPtr::new(5_u8);

        assert_eq!(
            format!("{ptr:?}"),
            "SharedPtr { value: Some(5), use_count: 1 }"
        );
    }
}
