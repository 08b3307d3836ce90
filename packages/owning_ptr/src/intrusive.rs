use std::any::type_name;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use tracing::trace;

use crate::{DefaultDelete, Deleter};

/// A reference counter embedded in an object managed by [`IntrusivePtr`].
///
/// Only [`IntrusivePtr`] is meant to change the count, which is why the mutating methods are
/// `unsafe` to call:
///
/// ```compile_fail,E0133
/// use owning_ptr::{Counter, SimpleCounter};
///
/// let counter = SimpleCounter::new();
/// counter.decrement();
/// ```
///
/// # Safety
///
/// [`IntrusivePtr`] destroys the object as soon as [`decrement()`][Self::decrement] reports
/// zero remaining references. Implementations must therefore count exactly: every
/// [`increment()`][Self::increment] adds one reference and every `decrement()` removes one and
/// returns the true number of references left.
pub unsafe trait Counter {
    /// Adds one reference.
    ///
    /// # Safety
    ///
    /// The caller must own the added reference and eventually give it up through
    /// [`decrement()`][Self::decrement].
    ///
    /// # Panics
    ///
    /// Implementations may panic if the count overflows.
    unsafe fn increment(&self);

    /// Removes one reference and returns the number of references that remain.
    ///
    /// The object is destroyed when this returns zero.
    ///
    /// # Safety
    ///
    /// The caller must be giving up a reference it previously added through
    /// [`increment()`][Self::increment].
    unsafe fn decrement(&self) -> usize;

    /// The current number of references.
    #[must_use]
    fn count(&self) -> usize;
}

/// A non-atomic [`Counter`] for single-threaded use.
///
/// Cloning produces a counter with no references: a cloned object is a new object that
/// nobody refers to yet.
#[derive(Default)]
pub struct SimpleCounter {
    count: Cell<usize>,
}

impl SimpleCounter {
    /// Creates a counter with no references.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: Cell::new(0),
        }
    }
}

// SAFETY: Every increment adds exactly one and every decrement removes exactly one, reporting
// the value actually stored.
unsafe impl Counter for SimpleCounter {
    unsafe fn increment(&self) {
        self.count.set(
            self.count
                .get()
                .checked_add(1)
                .expect("intrusive reference count overflow"),
        );
    }

    unsafe fn decrement(&self) -> usize {
        let remaining = self.count.get().saturating_sub(1);
        self.count.set(remaining);
        remaining
    }

    fn count(&self) -> usize {
        self.count.get()
    }
}

impl Clone for SimpleCounter {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for SimpleCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleCounter")
            .field("count", &self.count.get())
            .finish()
    }
}

/// An object that carries its own reference counter and can be managed by [`IntrusivePtr`].
///
/// # Example
///
/// ```
/// use owning_ptr::{IntrusivePtr, RefCounted, SimpleCounter};
///
/// #[derive(Default)]
/// struct Node {
///     refs: SimpleCounter,
///     payload: u32,
/// }
///
/// // SAFETY: `refs` is the only counter of a `Node` and is not touched anywhere else.
/// unsafe impl RefCounted for Node {
///     type Counter = SimpleCounter;
///
///     fn ref_counter(&self) -> &SimpleCounter {
///         &self.refs
///     }
/// }
///
/// let node = IntrusivePtr::new(Node {
///     payload: 7,
///     ..Node::default()
/// });
/// let another = node.clone();
///
/// assert_eq!(another.payload, 7);
/// assert_eq!(node.use_count(), 2);
/// ```
///
/// Implementing the trait is `unsafe`:
///
/// ```compile_fail,E0200
/// use owning_ptr::{RefCounted, SimpleCounter};
///
/// struct Node {
///     refs: SimpleCounter,
/// }
///
/// impl RefCounted for Node {
///     type Counter = SimpleCounter;
///
///     fn ref_counter(&self) -> &SimpleCounter {
///         &self.refs
///     }
/// }
/// ```
///
/// # Safety
///
/// [`ref_counter()`][Self::ref_counter] must return the same counter for the whole life of
/// the object, and nothing but [`IntrusivePtr`] may change that counter.
pub unsafe trait RefCounted {
    /// The embedded counter type.
    type Counter: Counter;

    /// The counter embedded in this object.
    fn ref_counter(&self) -> &Self::Counter;

    /// Destroys an object whose reference count has dropped to zero.
    ///
    /// The default implementation assumes that the object was allocated as a [`Box`].
    /// Overriding implementations must also accept boxed objects, as that is how
    /// [`IntrusivePtr::new()`] and [`IntrusivePtr::from_box()`] allocate them.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` refers to a live object with no remaining
    /// references that was allocated in the way this method expects, and that the object
    /// is not accessed afterwards.
    unsafe fn destroy(ptr: NonNull<Self>) {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe {
            DefaultDelete.delete(ptr);
        }
    }
}

/// A shared owning pointer to an object that counts its own references.
///
/// Unlike [`SharedPtr`][crate::SharedPtr], there is no external control block: the count lives
/// inside the object (see [`RefCounted`]), so a raw pointer to a live object can be turned into
/// an additional owning pointer at any time.
///
/// A null [`IntrusivePtr`] owns nothing. Dereferencing a null pointer panics; use
/// [`get()`][Self::get] for a checked alternative.
///
/// # Thread safety
///
/// This type is neither [`Send`] nor [`Sync`], as counters are not required to be atomic.
pub struct IntrusivePtr<T: ?Sized + RefCounted> {
    ptr: Option<NonNull<T>>,

    _owns: PhantomData<T>,
}

impl<T: RefCounted> IntrusivePtr<T> {
    /// Moves `value` to the heap and returns the first owning pointer to it.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized + RefCounted> IntrusivePtr<T> {
    /// Creates a null pointer that owns nothing.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            ptr: None,
            _owns: PhantomData,
        }
    }

    /// Takes over a boxed object, adding one reference to it.
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(value));

        // SAFETY: The object is live and was allocated as a Box, which every
        // `RefCounted::destroy()` implementation is required to accept.
        unsafe { Self::from_raw(ptr) }
    }

    /// Creates an owning pointer to an object, adding one reference to it.
    ///
    /// The object may already be owned by other [`IntrusivePtr`]s; the new pointer then shares
    /// ownership with them.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` refers to a live object that [`RefCounted::destroy()`]
    /// is able to destroy, and that the object is not destroyed by anything other than
    /// [`IntrusivePtr`].
    #[must_use]
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        // SAFETY: The caller guarantees that the object is live.
        let target = unsafe { ptr.as_ref() };

        // SAFETY: The new pointer owns the added reference and gives it up in `reset()`.
        unsafe {
            target.ref_counter().increment();
        }

        Self {
            ptr: Some(ptr),
            _owns: PhantomData,
        }
    }

    /// Returns a reference to the target, or `None` if the pointer is null.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: We hold a reference, so the object is alive. Intrusive pointers never
        // hand out mutable references, so shared access is always valid.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }

    /// Returns a pointer to the target, or `None` if the pointer is null.
    #[must_use]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Whether the pointer owns nothing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// The number of references to the target according to its counter. Zero if null.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.get().map_or(0, |target| target.ref_counter().count())
    }

    /// Whether two pointers refer to the same object. Null pointers are equal to each other.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self.ptr, other.ptr) {
            (Some(a), Some(b)) => ptr::addr_eq(a.as_ptr(), b.as_ptr()),
            (None, None) => true,
            _ => false,
        }
    }

    /// Releases this pointer's reference, leaving it null.
    ///
    /// If this was the last reference, the object is destroyed.
    pub fn reset(&mut self) {
        let Some(ptr) = self.ptr.take() else {
            return;
        };

        // SAFETY: We held a reference until just now, so the object is still alive.
        let target = unsafe { ptr.as_ref() };

        // SAFETY: We are giving up the reference added when this pointer was created.
        let remaining = unsafe { target.ref_counter().decrement() };

        if remaining > 0 {
            return;
        }

        trace!(target_type = type_name::<T>(), "destroying intrusively counted object");

        // SAFETY: That was the last reference, and the object was handed to us in a way
        // that `destroy()` accepts (see `from_raw()`).
        unsafe {
            T::destroy(ptr);
        }
    }

    /// Releases this pointer's reference and takes over a boxed object instead.
    pub fn reset_with(&mut self, value: Box<T>) {
        *self = Self::from_box(value);
    }

    /// Exchanges the targets of two pointers without touching any reference counts.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }
}

/// Moves `value` to the heap and returns the first owning pointer to it.
#[must_use]
pub fn make_intrusive<T: RefCounted>(value: T) -> IntrusivePtr<T> {
    IntrusivePtr::new(value)
}

impl<T: ?Sized + RefCounted> Clone for IntrusivePtr<T> {
    fn clone(&self) -> Self {
        if let Some(target) = self.get() {
            // SAFETY: The clone owns the added reference and gives it up in `reset()`.
            unsafe {
                target.ref_counter().increment();
            }
        }

        Self {
            ptr: self.ptr,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized + RefCounted> Drop for IntrusivePtr<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized + RefCounted> Deref for IntrusivePtr<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.get().expect("dereferenced a null IntrusivePtr")
    }
}

impl<T: ?Sized + RefCounted> Default for IntrusivePtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized + RefCounted> From<Box<T>> for IntrusivePtr<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + RefCounted + fmt::Debug> fmt::Debug for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrusivePtr")
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
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    #[derive(Debug)]
    struct Tracked {
        refs: SimpleCounter,
        value: u32,
        drops: Rc<Cell<usize>>,
    }

    impl Tracked {
        fn new(value: u32, drops: &Rc<Cell<usize>>) -> Self {
            Self {
                refs: SimpleCounter::new(),
                value,
                drops: Rc::clone(drops),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    unsafe impl RefCounted for Tracked {
        type Counter = SimpleCounter;

        fn ref_counter(&self) -> &SimpleCounter {
            &self.refs
        }
    }

    assert_impl_all!(IntrusivePtr<Tracked>: Clone, Default, fmt::Debug);
    assert_not_impl_any!(IntrusivePtr<Tracked>: Send, Sync);
    assert_impl_all!(SimpleCounter: Clone, Default, Send);

    #[test]
    fn simple_counter_counts() {
        let counter = SimpleCounter::new();

        unsafe {
            counter.increment();
            counter.increment();
        }
        assert_eq!(counter.count(), 2);

        assert_eq!(unsafe { counter.decrement() }, 1);
        assert_eq!(unsafe { counter.decrement() }, 0);
        assert_eq!(unsafe { counter.decrement() }, 0);
    }

    #[test]
    fn cloned_counter_starts_at_zero() {
        let counter = SimpleCounter::new();
        unsafe { counter.increment() };

        assert_eq!(counter.clone().count(), 0);
    }

    #[test]
    fn null_owns_nothing() {
        let ptr = IntrusivePtr::<Tracked>::null();

        assert!(ptr.is_null());
        assert_eq!(ptr.use_count(), 0);
        assert!(ptr.get().is_none());
        assert!(ptr.ptr_eq(&IntrusivePtr::default()));
    }

    #[test]
    #[should_panic]
    fn deref_of_null_panics() {
        let ptr = IntrusivePtr::<Tracked>::null();
        let _value = ptr.value;
    }

    #[test]
    fn clones_share_one_object() {
        let drops = Rc::new(Cell::new(0));

        let first = make_intrusive(Tracked::new(5, &drops));
        let second = first.clone();

        assert_eq!(first.use_count(), 2);
        assert!(first.ptr_eq(&second));
        assert_eq!(second.value, 5);

        drop(first);
        assert_eq!(drops.get(), 0);
        assert_eq!(second.use_count(), 1);

        drop(second);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn from_raw_shares_with_existing_owner() {
        let drops = Rc::new(Cell::new(0));
        let owner = IntrusivePtr::new(Tracked::new(1, &drops));

        let raw = owner.as_ptr().unwrap();
        let adopted = unsafe { IntrusivePtr::from_raw(raw) };

        assert_eq!(owner.use_count(), 2);
        assert!(adopted.ptr_eq(&owner));

        drop(owner);
        drop(adopted);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn reset_and_reset_with() {
        let drops = Rc::new(Cell::new(0));
        let mut ptr = IntrusivePtr::new(Tracked::new(1, &drops));

        ptr.reset_with(Box::new(Tracked::new(2, &drops)));
        assert_eq!(drops.get(), 1);
        assert_eq!(ptr.value, 2);

        ptr.reset();
        assert!(ptr.is_null());
        assert_eq!(drops.get(), 2);

        ptr.reset();
        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn swap_exchanges_targets() {
        let drops = Rc::new(Cell::new(0));
        let mut first = IntrusivePtr::new(Tracked::new(1, &drops));
        let mut second = IntrusivePtr::from(Box::new(Tracked::new(2, &drops)));

        first.swap(&mut second);

        assert_eq!(first.value, 2);
        assert_eq!(second.value, 1);
        assert_eq!(first.use_count(), 1);
    }

    #[test]
    fn custom_destruction_policy() {
        thread_local! {
            static DESTROYED: Cell<usize> = const { Cell::new(0) };
        }

        struct Pooled {
            refs: SimpleCounter,
        }

        unsafe impl RefCounted for Pooled {
            type Counter = SimpleCounter;

            fn ref_counter(&self) -> &SimpleCounter {
                &self.refs
            }

            unsafe fn destroy(ptr: NonNull<Self>) {
                DESTROYED.with(|destroyed| destroyed.set(destroyed.get() + 1));
                drop(unsafe { Box::from_raw(ptr.as_ptr()) });
            }
        }

        let first = IntrusivePtr::new(Pooled {
            refs: SimpleCounter::new(),
        });
        let second = first.clone();

        drop(first);
        assert_eq!(DESTROYED.with(Cell::get), 0);

        drop(second);
        assert_eq!(DESTROYED.with(Cell::get), 1);
    }
}
