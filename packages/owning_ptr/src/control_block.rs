use std::cell::Cell;
use std::mem::{MaybeUninit, offset_of};
use std::ptr::{self, NonNull};

use tracing::trace;

use crate::Deleter;

/// Which concrete layout a [`ControlBlock`] header is embedded in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum BlockKind {
    /// The value lives in its own allocation and is released through a deleter.
    Separate,

    /// The value is stored inside the control block allocation.
    Inline,
}

/// Reference counts shared by all strong and weak pointers to one value.
///
/// This header is always the first field of a `#[repr(C)]` [`SeparateBlock`] or [`InlineBlock`],
/// so a pointer to the whole block doubles as a pointer to the header. The two function pointers
/// recover the concrete block type when the value needs to be destroyed or the block reclaimed.
///
/// # Lifecycle
///
/// 1. Created with one strong reference and no weak references.
/// 2. When the strong count reaches zero, the value is destroyed. While that happens, the strong
///    references collectively hold one extra weak reference, so the block cannot be reclaimed
///    from within the value's destructor.
/// 3. When both counts are zero, the block is reclaimed.
///
/// Operations that may reclaim the block take a `NonNull<Self>` instead of `&self`, as no
/// reference to the block may exist when it is freed.
#[repr(C)]
pub(crate) struct ControlBlock {
    strong: Cell<usize>,
    weak: Cell<usize>,
    destroyed: Cell<bool>,
    kind: BlockKind,

    destroy_value: unsafe fn(NonNull<ControlBlock>),
    reclaim: unsafe fn(NonNull<ControlBlock>),
}

impl ControlBlock {
    fn new(
        kind: BlockKind,
        destroy_value: unsafe fn(NonNull<Self>),
        reclaim: unsafe fn(NonNull<Self>),
    ) -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(0),
            destroyed: Cell::new(false),
            kind,
            destroy_value,
            reclaim,
        }
    }

    #[must_use]
    pub(crate) fn strong_count(&self) -> usize {
        self.strong.get()
    }

    #[must_use]
    pub(crate) fn weak_count(&self) -> usize {
        self.weak.get()
    }

    /// Whether the value has been destroyed (or is being destroyed right now).
    #[must_use]
    pub(crate) fn is_value_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Adds a strong reference to a value that is known to be alive.
    pub(crate) fn increment_strong(&self) {
        debug_assert!(self.strong.get() > 0);

        self.strong.set(
            self.strong
                .get()
                .checked_add(1)
                .expect("strong reference count overflow"),
        );
    }

    /// Adds a strong reference if the value is still alive. Returns whether it did.
    #[must_use]
    pub(crate) fn try_increment_strong(&self) -> bool {
        if self.strong.get() == 0 {
            return false;
        }

        self.increment_strong();
        true
    }

    pub(crate) fn increment_weak(&self) {
        self.weak.set(
            self.weak
                .get()
                .checked_add(1)
                .expect("weak reference count overflow"),
        );
    }

    /// Gives up one strong reference, destroying the value if it was the last one and
    /// reclaiming the block if no weak references remain either.
    ///
    /// # Safety
    ///
    /// The caller must own one strong reference to a live block and must not use that
    /// reference afterwards.
    pub(crate) unsafe fn release_strong(block: NonNull<Self>) {
        // SAFETY: The caller owns a strong reference, which keeps the block alive.
        let header = unsafe { block.as_ref() };

        let strong = header
            .strong
            .get()
            .checked_sub(1)
            .expect("released a strong reference that was never acquired");
        header.strong.set(strong);

        if strong > 0 {
            return;
        }

        // The strong references collectively hold one weak reference while the value is
        // being destroyed, which keeps the block alive until the destructor has returned.
        header.increment_weak();
        header.destroyed.set(true);

        trace!(kind = ?header.kind, "destroying shared value");

        let destroy_value = header.destroy_value;

        // SAFETY: The last strong reference is gone, so nobody can access the value any more.
        // The implicit weak reference above keeps the block itself alive during the call.
        unsafe {
            destroy_value(block);
        }

        // SAFETY: Releasing the implicit weak reference acquired above.
        unsafe {
            Self::release_weak(block);
        }
    }

    /// Gives up one weak reference, reclaiming the block if it was the last reference of any kind.
    ///
    /// # Safety
    ///
    /// The caller must own one weak reference to a live block and must not use that
    /// reference afterwards.
    pub(crate) unsafe fn release_weak(block: NonNull<Self>) {
        // SAFETY: The caller owns a weak reference, which keeps the block alive.
        let header = unsafe { block.as_ref() };

        let weak = header
            .weak
            .get()
            .checked_sub(1)
            .expect("released a weak reference that was never acquired");
        header.weak.set(weak);

        if weak > 0 || header.strong.get() > 0 {
            return;
        }

        trace!(kind = ?header.kind, "reclaiming control block");

        let reclaim = header.reclaim;

        // SAFETY: No references of any kind remain and the value has already been destroyed.
        unsafe {
            reclaim(block);
        }
    }
}

/// A control block for a value that was allocated separately, together with the deleter
/// that knows how to release it.
#[repr(C)]
pub(crate) struct SeparateBlock<T: ?Sized, D> {
    header: ControlBlock,
    value: NonNull<T>,
    deleter: D,
}

impl<T: ?Sized, D: Deleter<T> + 'static> SeparateBlock<T, D> {
    /// Creates a control block that takes over ownership of `value`.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `value` is valid until `deleter` is called on it, that
    /// `deleter` is able to release it and that nothing else releases it.
    pub(crate) unsafe fn allocate(value: NonNull<T>, deleter: D) -> NonNull<ControlBlock> {
        let block = Box::new(Self {
            header: ControlBlock::new(
                BlockKind::Separate,
                Self::destroy_value,
                Self::reclaim,
            ),
            value,
            deleter,
        });

        NonNull::from(Box::leak(block)).cast()
    }

    /// # Safety
    ///
    /// `block` must be the header of a live `SeparateBlock<T, D>` whose value has not yet
    /// been destroyed.
    unsafe fn destroy_value(block: NonNull<ControlBlock>) {
        let block = block.cast::<Self>().as_ptr();

        // SAFETY: The header is the first field of a `#[repr(C)]` Self, so the pointer to it is
        // also a pointer to Self, with provenance over the whole allocation.
        let value = unsafe { (*block).value };

        // SAFETY: As above. Nothing else accesses the deleter while the value is destroyed.
        let deleter = unsafe { &mut (*block).deleter };

        // SAFETY: The value was handed over to this block together with this deleter and
        // is released exactly once because `destroy_value` is called exactly once.
        unsafe {
            deleter.delete(value);
        }
    }

    /// # Safety
    ///
    /// `block` must be the header of a `SeparateBlock<T, D>` without any remaining references.
    unsafe fn reclaim(block: NonNull<ControlBlock>) {
        // SAFETY: The block was created via `Box::leak()` in `allocate()`.
        drop(unsafe { Box::from_raw(block.cast::<Self>().as_ptr()) });
    }
}

/// A control block that stores the value in the same allocation.
#[repr(C)]
pub(crate) struct InlineBlock<T> {
    header: ControlBlock,
    value: MaybeUninit<T>,
}

impl<T> InlineBlock<T> {
    /// Allocates a control block and lets `init` initialize the value in place.
    ///
    /// Returns the header and the value.
    ///
    /// # Safety
    ///
    /// `init` must fully initialize the value before returning.
    pub(crate) unsafe fn allocate_in_place(
        init: impl FnOnce(&mut MaybeUninit<T>),
    ) -> (NonNull<ControlBlock>, NonNull<T>) {
        let mut block = Box::new(Self {
            header: ControlBlock::new(BlockKind::Inline, Self::destroy_value, Self::reclaim),
            value: MaybeUninit::uninit(),
        });

        // If this panics, the box is released without touching the uninitialized value.
        init(&mut block.value);

        let block = NonNull::from(Box::leak(block));

        // SAFETY: The field offset is within the block we just allocated.
        let value = unsafe { Self::value_ptr(block) };

        (block.cast(), value)
    }

    /// Allocates a control block holding `value`.
    pub(crate) fn allocate(value: T) -> (NonNull<ControlBlock>, NonNull<T>) {
        // SAFETY: The closure initializes the value.
        unsafe {
            Self::allocate_in_place(|slot| {
                slot.write(value);
            })
        }
    }

    /// # Safety
    ///
    /// `block` must point to a live `InlineBlock<T>`.
    unsafe fn value_ptr(block: NonNull<Self>) -> NonNull<T> {
        // SAFETY: Forwarding guarantees from the caller; the offset stays within the block.
        unsafe { block.byte_add(offset_of!(Self, value)) }.cast()
    }

    /// # Safety
    ///
    /// `block` must be the header of a live `InlineBlock<T>` whose value has not yet been
    /// destroyed.
    unsafe fn destroy_value(block: NonNull<ControlBlock>) {
        // SAFETY: The header is the first field of a `#[repr(C)]` Self with provenance over
        // the whole allocation, so this is a pointer to a live Self.
        let value = unsafe { Self::value_ptr(block.cast()) };

        // SAFETY: The value is initialized and this is the only place that ever drops it.
        unsafe {
            ptr::drop_in_place(value.as_ptr());
        }
    }

    /// # Safety
    ///
    /// `block` must be the header of an `InlineBlock<T>` without any remaining references,
    /// whose value has already been destroyed.
    unsafe fn reclaim(block: NonNull<ControlBlock>) {
        // SAFETY: The block was created via `Box::leak()` in `allocate_in_place()`. The value
        // is wrapped in `MaybeUninit`, so freeing the box does not drop it a second time.
        drop(unsafe { Box::from_raw(block.cast::<Self>().as_ptr()) });
    }
}

/// The two pointers held by every non-empty strong or weak pointer.
pub(crate) struct BlockRef<T: ?Sized> {
    pub(crate) block: NonNull<ControlBlock>,
    pub(crate) value: NonNull<T>,
}

impl<T: ?Sized> BlockRef<T> {
    /// # Safety
    ///
    /// The caller must hold a reference of any kind to the block.
    #[must_use]
    pub(crate) unsafe fn header(&self) -> &ControlBlock {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { self.block.as_ref() }
    }
}

impl<T: ?Sized> Clone for BlockRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for BlockRef<T> {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::DefaultDelete;

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn inline_block_starts_with_one_strong_reference() {
        let (block, value) = InlineBlock::allocate(42_u32);

        unsafe {
            let header = block.as_ref();
            assert_eq!(header.strong_count(), 1);
            assert_eq!(header.weak_count(), 0);
            assert_eq!(header.kind, BlockKind::Inline);
            assert!(!header.is_value_destroyed());
            assert_eq!(*value.as_ref(), 42);

            ControlBlock::release_strong(block);
        }
    }

    #[test]
    fn separate_block_reports_kind() {
        let value = NonNull::from(Box::leak(Box::new(1_u8)));
        let block = unsafe { SeparateBlock::allocate(value, DefaultDelete) };

        unsafe {
            assert_eq!(block.as_ref().kind, BlockKind::Separate);
            ControlBlock::release_strong(block);
        }
    }

    #[test]
    fn last_strong_release_destroys_value() {
        let drops = Rc::new(Cell::new(0));
        let (block, _) = InlineBlock::allocate(DropCounter(Rc::clone(&drops)));

        unsafe {
            block.as_ref().increment_strong();
            ControlBlock::release_strong(block);
            assert_eq!(drops.get(), 0);

            ControlBlock::release_strong(block);
        }

        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn weak_reference_outlives_value() {
        let drops = Rc::new(Cell::new(0));
        let value = NonNull::from(Box::leak(Box::new(DropCounter(Rc::clone(&drops)))));
        let block = unsafe { SeparateBlock::allocate(value, DefaultDelete) };

        unsafe {
            block.as_ref().increment_weak();
            ControlBlock::release_strong(block);

            let header = block.as_ref();
            assert_eq!(drops.get(), 1);
            assert_eq!(header.strong_count(), 0);
            assert_eq!(header.weak_count(), 1);
            assert!(header.is_value_destroyed());
            assert!(!header.try_increment_strong());

            ControlBlock::release_weak(block);
        }
    }

    #[test]
    fn custom_deleter_is_called_once() {
        let calls = Rc::new(Cell::new(0));
        let calls_in_deleter = Rc::clone(&calls);

        let value = NonNull::from(Box::leak(Box::new(5_i64)));
        let deleter = move |ptr: NonNull<i64>| {
            calls_in_deleter.set(calls_in_deleter.get() + 1);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        };

        let block = unsafe { SeparateBlock::allocate(value, deleter) };

        unsafe {
            ControlBlock::release_strong(block);
        }

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn in_place_initialization() {
        let (block, value) = unsafe {
            InlineBlock::<[u16; 4]>::allocate_in_place(|slot| {
                slot.write([1, 2, 3, 4]);
            })
        };

        unsafe {
            assert_eq!(*value.as_ref(), [1, 2, 3, 4]);
            ControlBlock::release_strong(block);
        }
    }

    #[test]
    fn try_increment_on_live_value_succeeds() {
        let (block, _) = InlineBlock::allocate(String::from("alive"));

        unsafe {
            let header = block.as_ref();
            assert!(header.try_increment_strong());
            assert_eq!(header.strong_count(), 2);

            ControlBlock::release_strong(block);
            ControlBlock::release_strong(block);
        }
    }
}
