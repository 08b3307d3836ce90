use std::mem::MaybeUninit;
use std::ops::Range;
use std::ptr;

use crate::BLOCK_CAPACITY;

/// One node of the block ring.
///
/// The slot array is allocated lazily and released as soon as the deque no longer has any
/// elements in it. The block itself never tracks which of its slots are initialized - that is
/// derived by the owning deque from its edge cursors, which is why most accessors are `unsafe`.
///
/// Neighbor links are indexes into the owning deque's block table.
#[derive(Debug)]
pub(crate) struct Block<T> {
    /// `None` if this block is empty (never allocated or already released).
    slots: Option<Box<[MaybeUninit<T>]>>,

    left: usize,
    right: usize,
}

impl<T> Block<T> {
    /// Creates an empty block linked to the given neighbors.
    #[must_use]
    pub(crate) fn new(left: usize, right: usize) -> Self {
        Self {
            slots: None,
            left,
            right,
        }
    }

    #[must_use]
    pub(crate) fn left(&self) -> usize {
        self.left
    }

    #[must_use]
    pub(crate) fn right(&self) -> usize {
        self.right
    }

    pub(crate) fn link(&mut self, left: usize, right: usize) {
        self.left = left;
        self.right = right;
    }

    #[must_use]
    pub(crate) fn is_allocated(&self) -> bool {
        self.slots.is_some()
    }

    /// Allocates a fresh slot array for this block.
    ///
    /// # Panics
    ///
    /// Panics if the block already has a slot array. Replacing one could silently leak
    /// initialized elements.
    pub(crate) fn allocate(&mut self) {
        assert!(
            self.slots.is_none(),
            "cannot allocate slots for a block that already has them"
        );

        self.slots = Some(Box::new_uninit_slice(BLOCK_CAPACITY.get()));
    }

    /// Releases the slot array of this block, if any.
    ///
    /// Elements still stored in the slots are not dropped - the caller is responsible for
    /// having moved or dropped them already.
    pub(crate) fn release(&mut self) {
        self.slots = None;
    }

    fn slot(&self, index: usize) -> &MaybeUninit<T> {
        self.slots
            .as_ref()
            .expect("slot access is only valid on an allocated block")
            .get(index)
            .expect("slot index must be within block capacity")
    }

    fn slot_mut(&mut self, index: usize) -> &mut MaybeUninit<T> {
        self.slots
            .as_mut()
            .expect("slot access is only valid on an allocated block")
            .get_mut(index)
            .expect("slot index must be within block capacity")
    }

    /// Writes a value into a slot, without dropping any previous occupant.
    pub(crate) fn write(&mut self, index: usize, value: T) {
        self.slot_mut(index).write(value);
    }

    /// Moves the value out of a slot, leaving the slot logically uninitialized.
    ///
    /// # Safety
    ///
    /// The slot must be initialized. After this call, the caller must treat it as uninitialized.
    pub(crate) unsafe fn take(&mut self, index: usize) -> T {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { self.slot_mut(index).assume_init_read() }
    }

    /// # Safety
    ///
    /// The slot must be initialized.
    pub(crate) unsafe fn get(&self, index: usize) -> &T {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { self.slot(index).assume_init_ref() }
    }

    /// # Safety
    ///
    /// The slot must be initialized.
    pub(crate) unsafe fn get_mut(&mut self, index: usize) -> &mut T {
        // SAFETY: Forwarding guarantees from the caller.
        unsafe { self.slot_mut(index).assume_init_mut() }
    }

    /// Drops the values in a range of slots in place.
    ///
    /// # Safety
    ///
    /// Every slot in the range must be initialized. After this call, the caller must treat
    /// them as uninitialized.
    pub(crate) unsafe fn drop_slots(&mut self, range: Range<usize>) {
        for index in range {
            let slot = self.slot_mut(index);

            // SAFETY: The caller guarantees that the slot is initialized and
            // will not be used again before being rewritten.
            unsafe {
                ptr::drop_in_place(slot.as_mut_ptr());
            }
        }
    }
}

impl<T: Clone> Block<T> {
    /// Creates a copy of this block with the same links, cloning the values in `occupied`.
    ///
    /// An empty block is copied as an empty block.
    ///
    /// # Safety
    ///
    /// Every slot in `occupied` must be initialized. The range must be empty if the block is empty.
    #[must_use]
    pub(crate) unsafe fn clone_occupied(&self, occupied: Range<usize>) -> Self {
        let mut copy = Self::new(self.left, self.right);

        if !self.is_allocated() {
            debug_assert!(occupied.is_empty());
            return copy;
        }

        copy.allocate();

        for index in occupied {
            // SAFETY: Forwarding guarantees from the caller.
            let value = unsafe { self.get(index) };
            copy.write(index, value.clone());
        }

        copy
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

    use super::*;

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn new_block_is_empty_and_linked() {
        let block = Block::<u32>::new(3, 5);

        assert!(!block.is_allocated());
        assert_eq!(block.left(), 3);
        assert_eq!(block.right(), 5);
    }

    #[test]
    fn allocate_and_release() {
        let mut block = Block::<u32>::new(0, 0);

        block.allocate();
        assert!(block.is_allocated());

        block.release();
        assert!(!block.is_allocated());
    }

    #[test]
    #[should_panic]
    fn double_allocate_panics() {
        let mut block = Block::<u32>::new(0, 0);
        block.allocate();
        block.allocate();
    }

    #[test]
    fn write_get_take() {
        let mut block = Block::new(0, 0);
        block.allocate();

        block.write(0, "first".to_string());
        block.write(BLOCK_CAPACITY.get() - 1, "last".to_string());

        unsafe {
            assert_eq!(block.get(0), "first");
            block.get_mut(BLOCK_CAPACITY.get() - 1).push('!');
            assert_eq!(block.take(BLOCK_CAPACITY.get() - 1), "last!");
            assert_eq!(block.take(0), "first");
        }
    }

    #[test]
    fn drop_slots_drops_only_range() {
        let drops = Rc::new(Cell::new(0));
        let mut block = Block::new(0, 0);
        block.allocate();

        for index in 0..4 {
            block.write(index, DropCounter(Rc::clone(&drops)));
        }

        unsafe {
            block.drop_slots(1..3);
        }
        assert_eq!(drops.get(), 2);

        unsafe {
            block.drop_slots(0..1);
            block.drop_slots(3..4);
        }
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn clone_occupied_copies_links_and_values() {
        let mut block = Block::new(1, 2);
        block.allocate();
        block.write(5, 55_u64);
        block.write(6, 66_u64);

        let copy = unsafe { block.clone_occupied(5..7) };

        assert!(copy.is_allocated());
        assert_eq!(copy.left(), 1);
        assert_eq!(copy.right(), 2);
        unsafe {
            assert_eq!(*copy.get(5), 55);
            assert_eq!(*copy.get(6), 66);
        }
    }

    #[test]
    fn clone_of_empty_block_is_empty() {
        let block = Block::<u64>::new(4, 4);

        let copy = unsafe { block.clone_occupied(0..0) };

        assert!(!copy.is_allocated());
        assert_eq!(copy.left(), 4);
    }
}
