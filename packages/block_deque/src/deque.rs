use std::fmt;
use std::iter;
use std::mem;
use std::ops::{Index, IndexMut, Range};

use tracing::trace;

use crate::{BLOCK_CAPACITY, Block};

/// Index of the last slot in a block.
const LAST_SLOT: usize = BLOCK_CAPACITY.get() - 1;

/// A double-ended queue built from a doubling ring of fixed-size blocks.
///
/// Pushing and popping at either end is amortized O(1). Elements stay at the same memory
/// location for as long as they are in the deque, even when the ring grows.
///
/// Indexing is relative to the logical front: index 0 is the element that [`pop_front()`]
/// would return, index `len() - 1` the one [`pop_back()`] would return.
///
/// # Memory
///
/// No capacity is retained once the deque becomes empty: removing the last element releases
/// every block, so a subsequent push starts over from a single block.
///
/// # Example
///
/// ```
/// use block_deque::BlockDeque;
///
/// let mut deque: BlockDeque<u32> = (1..=300).collect();
///
/// assert_eq!(deque.len(), 300);
/// assert_eq!(deque[0], 1);
/// assert_eq!(deque[299], 300);
///
/// deque[0] = 100;
/// assert_eq!(deque.pop_front(), Some(100));
/// ```
///
/// [`pop_front()`]: Self::pop_front
/// [`pop_back()`]: Self::pop_back
pub struct BlockDeque<T> {
    /// The ring of blocks. Empty if and only if the deque has no elements.
    ///
    /// Neighbor links always follow table order (with wraparound at the end of the table),
    /// which is what makes index translation possible without walking the links.
    table: Vec<Block<T>>,

    /// Number of elements in the deque.
    len: usize,

    /// Index in `table` of the block holding the logical front. Moves together with the
    /// left edge and is reset to zero whenever the ring is relocated.
    begin_index: usize,

    /// Index in `table` of the leftmost occupied block.
    left_edge: usize,

    /// Index in `table` of the rightmost occupied block.
    right_edge: usize,

    /// Slot of the first element in the left edge block.
    left_offset: usize,

    /// Slot of the last element in the right edge block.
    right_offset: usize,
}

impl<T> BlockDeque<T> {
    /// Creates an empty deque. This does not allocate.
    ///
    /// # Example
    ///
    /// ```
    /// use block_deque::BlockDeque;
    ///
    /// let deque = BlockDeque::<String>::new();
    /// assert!(deque.is_empty());
    /// assert_eq!(deque.block_count(), 0);
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: Vec::new(),
            len: 0,
            begin_index: 0,
            left_edge: 0,
            right_edge: 0,
            left_offset: 0,
            right_offset: 0,
        }
    }

    /// Creates a deque holding `len` default-initialized elements.
    ///
    /// # Example
    ///
    /// ```
    /// use block_deque::BlockDeque;
    ///
    /// let deque = BlockDeque::<u8>::with_len(200);
    /// assert_eq!(deque.len(), 200);
    /// assert_eq!(deque[199], 0);
    /// ```
    #[must_use]
    pub fn with_len(len: usize) -> Self
    where
        T: Default,
    {
        iter::repeat_with(T::default).take(len).collect()
    }

    /// Returns the number of elements in the deque.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the deque contains no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of blocks in the ring, whether they hold elements or not.
    ///
    /// This is zero for an empty deque and otherwise a power of two.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.table.len()
    }

    /// Returns the number of blocks that currently own slot storage.
    #[must_use]
    pub fn allocated_block_count(&self) -> usize {
        self.table.iter().filter(|block| block.is_allocated()).count()
    }

    /// Appends an element to the back of the deque.
    ///
    /// # Example
    ///
    /// ```
    /// use block_deque::BlockDeque;
    ///
    /// let mut deque = BlockDeque::new();
    /// deque.push_back('a');
    /// deque.push_back('b');
    ///
    /// assert_eq!(deque[1], 'b');
    /// ```
    pub fn push_back(&mut self, value: T) {
        if self.table.is_empty() {
            self.init();
        } else if self.right_offset == LAST_SLOT {
            self.advance_right_edge();
        } else {
            // Cannot overflow, bounded by the block capacity.
            self.right_offset = self.right_offset.wrapping_add(1);
        }

        let (edge, offset) = (self.right_edge, self.right_offset);
        self.block_mut(edge).write(offset, value);

        // Cannot overflow because that would imply more elements than fit in virtual memory.
        self.len = self.len.wrapping_add(1);

        #[cfg(debug_assertions)]
        self.integrity_check();
    }

    /// Prepends an element to the front of the deque.
    ///
    /// # Example
    ///
    /// ```
    /// use block_deque::BlockDeque;
    ///
    /// let mut deque = BlockDeque::new();
    /// deque.push_front('b');
    /// deque.push_front('a');
    ///
    /// assert_eq!(deque[0], 'a');
    /// ```
    pub fn push_front(&mut self, value: T) {
        if self.table.is_empty() {
            self.init();
        } else if self.left_offset == 0 {
            self.retreat_left_edge();
        } else {
            // Cannot underflow, guarded by the branch above.
            self.left_offset = self.left_offset.wrapping_sub(1);
        }

        let (edge, offset) = (self.left_edge, self.left_offset);
        self.block_mut(edge).write(offset, value);

        // Cannot overflow because that would imply more elements than fit in virtual memory.
        self.len = self.len.wrapping_add(1);

        #[cfg(debug_assertions)]
        self.integrity_check();
    }

    /// Removes the last element and returns it, or `None` if the deque is empty.
    ///
    /// Removing the last remaining element releases all blocks.
    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let (edge, offset) = (self.right_edge, self.right_offset);

        // SAFETY: The deque is not empty, so the slot under the right cursor is initialized.
        // The cursor is moved off the slot below, so it is treated as uninitialized from now on.
        let value = unsafe { self.block_mut(edge).take(offset) };

        // Cannot underflow, guarded by the emptiness check above.
        self.len = self.len.wrapping_sub(1);

        if self.len == 0 {
            self.release_all();
            return Some(value);
        }

        if self.right_offset > 0 {
            self.right_offset = self.right_offset.wrapping_sub(1);
        } else {
            let block = self.block_mut(edge);
            block.release();
            let left = block.left();

            self.right_edge = left;
            self.right_offset = LAST_SLOT;
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        Some(value)
    }

    /// Removes the first element and returns it, or `None` if the deque is empty.
    ///
    /// Removing the last remaining element releases all blocks.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        let (edge, offset) = (self.left_edge, self.left_offset);

        // SAFETY: The deque is not empty, so the slot under the left cursor is initialized.
        // The cursor is moved off the slot below, so it is treated as uninitialized from now on.
        let value = unsafe { self.block_mut(edge).take(offset) };

        // Cannot underflow, guarded by the emptiness check above.
        self.len = self.len.wrapping_sub(1);

        if self.len == 0 {
            self.release_all();
            return Some(value);
        }

        if self.left_offset < LAST_SLOT {
            self.left_offset = self.left_offset.wrapping_add(1);
        } else {
            let block = self.block_mut(edge);
            block.release();
            let right = block.right();

            self.left_edge = right;

            self.begin_index = if self.begin_index == self.last_table_index() {
                0
            } else {
                self.begin_index.wrapping_add(1)
            };

            self.left_offset = 0;
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        Some(value)
    }

    /// Returns a reference to the element at `index`, or `None` if out of bounds.
    ///
    /// # Example
    ///
    /// ```
    /// use block_deque::BlockDeque;
    ///
    /// let deque = BlockDeque::from([10, 20, 30]);
    ///
    /// assert_eq!(deque.get(1), Some(&20));
    /// assert_eq!(deque.get(3), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }

        let (block, slot) = self.locate(index);

        // SAFETY: `locate()` maps every in-bounds index to an initialized slot.
        Some(unsafe { self.block(block).get(slot) })
    }

    /// Returns a mutable reference to the element at `index`, or `None` if out of bounds.
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }

        let (block, slot) = self.locate(index);

        // SAFETY: `locate()` maps every in-bounds index to an initialized slot.
        Some(unsafe { self.block_mut(block).get_mut(slot) })
    }

    /// Removes all elements and releases all blocks.
    pub fn clear(&mut self) {
        let len = self.len;
        let (mut block, mut start) = (self.left_edge, self.left_offset);
        let (right_edge, right_offset) = (self.right_edge, self.right_offset);

        // We detach the table before dropping anything, so a panicking element destructor
        // leaves behind an empty deque (and leaked elements) instead of a half-dropped one.
        let mut table = mem::take(&mut self.table);
        self.release_all();

        if len == 0 {
            return;
        }

        loop {
            let is_right_edge = block == right_edge;

            let end = if is_right_edge {
                // Cannot overflow, bounded by the block capacity.
                right_offset.wrapping_add(1)
            } else {
                BLOCK_CAPACITY.get()
            };

            let current = table
                .get_mut(block)
                .expect("occupied span must stay within the block table");

            // SAFETY: Every slot between the cursors of the occupied span is initialized.
            // The table is discarded afterwards, so the slots are never read again.
            unsafe {
                current.drop_slots(start..end);
            }

            if is_right_edge {
                break;
            }

            block = current.right();
            start = 0;
        }
    }

    /// Swaps the contents of two deques without moving any elements.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    fn init(&mut self) {
        let mut block = Block::new(0, 0);
        block.allocate();

        self.table = vec![block];
        self.begin_index = 0;
        self.left_edge = 0;
        self.right_edge = 0;
        self.left_offset = 0;
        self.right_offset = 0;
    }

    /// Drops the block table and resets all cursors. Does not drop any elements.
    fn release_all(&mut self) {
        if !self.table.is_empty() {
            trace!(block_count = self.table.len(), "releasing all blocks");
        }

        self.table = Vec::new();
        self.len = 0;
        self.begin_index = 0;
        self.left_edge = 0;
        self.right_edge = 0;
        self.left_offset = 0;
        self.right_offset = 0;
    }

    fn advance_right_edge(&mut self) {
        if self.block(self.right_edge).right() == self.left_edge {
            self.relocate();
        }

        let edge = self.block(self.right_edge).right();
        self.block_mut(edge).allocate();
        self.right_edge = edge;
        self.right_offset = 0;
    }

    fn retreat_left_edge(&mut self) {
        if self.block(self.left_edge).left() == self.right_edge {
            self.relocate();
        }

        let edge = self.block(self.left_edge).left();
        self.block_mut(edge).allocate();
        self.left_edge = edge;

        self.begin_index = if self.begin_index == 0 {
            self.last_table_index()
        } else {
            self.begin_index.wrapping_sub(1)
        };

        self.left_offset = LAST_SLOT;
    }

    /// Doubles the size of the ring.
    ///
    /// The existing blocks are moved (not copied) into the first half of the new table in
    /// logical order starting from the left edge, followed by fresh empty blocks. All blocks
    /// are then relinked in table order.
    fn relocate(&mut self) {
        let old_count = self.table.len();
        let new_count = old_count
            .checked_mul(2)
            .expect("block ring cannot grow beyond the size of virtual memory");

        trace!(old_count, new_count, "relocating block ring");

        let mut old_table = mem::take(&mut self.table)
            .into_iter()
            .map(Some)
            .collect::<Vec<_>>();

        let mut table = Vec::with_capacity(new_count);
        let mut cursor = self.left_edge;
        let mut right_edge = None;

        for position in 0..old_count {
            let block = old_table
                .get_mut(cursor)
                .and_then(Option::take)
                .expect("walking one lap of the ring visits every block exactly once");

            if cursor == self.right_edge {
                right_edge = Some(position);
            }

            cursor = block.right();
            table.push(block);
        }

        table.extend(iter::repeat_with(|| Block::new(0, 0)).take(old_count));

        let last = new_count.wrapping_sub(1);
        for (position, block) in table.iter_mut().enumerate() {
            let left = if position == 0 {
                last
            } else {
                position.wrapping_sub(1)
            };
            let right = if position == last {
                0
            } else {
                position.wrapping_add(1)
            };

            block.link(left, right);
        }

        self.table = table;
        self.begin_index = 0;
        self.left_edge = 0;
        self.right_edge = right_edge.expect("right edge must be part of the ring");
    }

    /// Translates a logical index into a (block, slot) pair.
    ///
    /// The index must be less than `len()`.
    #[expect(
        clippy::integer_division,
        clippy::arithmetic_side_effects,
        reason = "block and slot are quotient and remainder of the same division by a non-zero constant"
    )]
    fn locate(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.len);

        // Elements in the left edge block, from the left cursor to the end of the block.
        let head_len = BLOCK_CAPACITY.get().wrapping_sub(self.left_offset);

        if index < head_len {
            return (self.left_edge, self.left_offset.wrapping_add(index));
        }

        let index = index.wrapping_sub(head_len);
        let last = self.last_table_index();

        // The walk starts at the block after the begin block, in table order.
        let first = if self.begin_index == last {
            0
        } else {
            self.begin_index.wrapping_add(1)
        };

        let steps = index / BLOCK_CAPACITY.get();
        let slot = index % BLOCK_CAPACITY.get();

        let steps_before_wrap = last - first;
        let block = if steps <= steps_before_wrap {
            first + steps
        } else {
            steps - steps_before_wrap - 1
        };

        (block, slot)
    }

    fn last_table_index(&self) -> usize {
        self.table
            .len()
            .checked_sub(1)
            .expect("cursor movement requires a non-empty block table")
    }

    fn block(&self, index: usize) -> &Block<T> {
        self.table
            .get(index)
            .expect("block index must be within the block table")
    }

    fn block_mut(&mut self, index: usize) -> &mut Block<T> {
        self.table
            .get_mut(index)
            .expect("block index must be within the block table")
    }

    /// Returns the occupied slot range of every block, indexed by table position.
    ///
    /// Blocks outside the occupied span get an empty range.
    fn occupied_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = vec![0..0; self.table.len()];

        if self.len == 0 {
            return ranges;
        }

        let mut block = self.left_edge;
        let mut start = self.left_offset;

        for _ in 0..self.table.len() {
            let is_right_edge = block == self.right_edge;

            let end = if is_right_edge {
                // Cannot overflow, bounded by the block capacity.
                self.right_offset.wrapping_add(1)
            } else {
                BLOCK_CAPACITY.get()
            };

            *ranges
                .get_mut(block)
                .expect("occupied span must stay within the block table") = start..end;

            if is_right_edge {
                return ranges;
            }

            block = self.block(block).right();
            start = 0;
        }

        panic!("right edge must be reachable from the left edge within one lap of the ring");
    }

    #[cfg(debug_assertions)]
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    fn integrity_check(&self) {
        if self.table.is_empty() {
            assert_eq!(self.len, 0, "a deque without blocks must have no elements");
            return;
        }

        assert!(self.len > 0, "an empty deque must not retain any blocks");

        let count = self.table.len();
        assert!(
            count.is_power_of_two(),
            "block count {count} must be a power of two"
        );

        assert_eq!(
            self.begin_index, self.left_edge,
            "begin block must be the left edge block"
        );

        for (position, block) in self.table.iter().enumerate() {
            let expected_right = position.wrapping_add(1).wrapping_rem(count);
            let expected_left = position
                .wrapping_add(count)
                .wrapping_sub(1)
                .wrapping_rem(count);

            assert_eq!(
                block.right(),
                expected_right,
                "block {position} right link must follow table order"
            );
            assert_eq!(
                block.left(),
                expected_left,
                "block {position} left link must follow table order"
            );
        }

        let ranges = self.occupied_ranges();
        let mut occupied_slots = 0_usize;

        for (position, (block, range)) in self.table.iter().zip(&ranges).enumerate() {
            assert_eq!(
                block.is_allocated(),
                !range.is_empty(),
                "block {position} must be allocated if and only if it holds elements"
            );

            occupied_slots = occupied_slots.wrapping_add(range.len());
        }

        assert_eq!(
            occupied_slots, self.len,
            "occupied span must hold exactly `len` elements"
        );
    }
}

impl<T> Default for BlockDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BlockDeque<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: Clone> Clone for BlockDeque<T> {
    /// Creates a deep copy of the deque.
    ///
    /// The copy has the same ring layout as the original: each block is copied to the same
    /// table position with the same links, and the edges refer to the same positions.
    fn clone(&self) -> Self {
        let ranges = self.occupied_ranges();

        let table = self
            .table
            .iter()
            .zip(ranges)
            .map(|(block, range)| {
                // SAFETY: `occupied_ranges()` only reports initialized slots,
                // and reports an empty range for every empty block.
                unsafe { block.clone_occupied(range) }
            })
            .collect();

        Self {
            table,
            len: self.len,
            begin_index: self.begin_index,
            left_edge: self.left_edge,
            right_edge: self.right_edge,
            left_offset: self.left_offset,
            right_offset: self.right_offset,
        }
    }
}

impl<T> Index<usize> for BlockDeque<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        let len = self.len;

        self.get(index).unwrap_or_else(|| {
            panic!("index {index} out of bounds for BlockDeque of length {len}")
        })
    }
}

impl<T> IndexMut<usize> for BlockDeque<T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        let len = self.len;

        self.get_mut(index).unwrap_or_else(|| {
            panic!("index {index} out of bounds for BlockDeque of length {len}")
        })
    }
}

impl<T> FromIterator<T> for BlockDeque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut deque = Self::new();
        deque.extend(iter);
        deque
    }
}

impl<T> Extend<T> for BlockDeque<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T, const N: usize> From<[T; N]> for BlockDeque<T> {
    fn from(values: [T; N]) -> Self {
        values.into_iter().collect()
    }
}

impl<T: PartialEq> PartialEq for BlockDeque<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && (0..self.len).all(|index| self.get(index) == other.get(index))
    }
}

impl<T: Eq> Eq for BlockDeque<T> {}

impl<T: fmt::Debug> fmt::Debug for BlockDeque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.len).filter_map(|index| self.get(index)))
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(BlockDeque<u32>: Send, Sync, fmt::Debug, Clone, Default);
    assert_not_impl_any!(BlockDeque<Rc<u32>>: Send, Sync);

    const CAP: usize = BLOCK_CAPACITY.get();

    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn contents<T: Clone>(deque: &BlockDeque<T>) -> Vec<T> {
        (0..deque.len()).map(|index| deque[index].clone()).collect()
    }

    #[test]
    fn new_is_empty_without_blocks() {
        let deque = BlockDeque::<u32>::new();

        assert!(deque.is_empty());
        assert_eq!(deque.len(), 0);
        assert_eq!(deque.block_count(), 0);
        assert_eq!(deque.allocated_block_count(), 0);
        assert_eq!(deque.get(0), None);
    }

    #[test]
    fn first_push_allocates_single_block() {
        let mut deque = BlockDeque::new();
        deque.push_back(7_u32);

        assert_eq!(deque.len(), 1);
        assert_eq!(deque.block_count(), 1);
        assert_eq!(deque.allocated_block_count(), 1);
        assert_eq!(deque[0], 7);
    }

    #[test]
    fn push_back_then_pop_back_is_lifo() {
        let mut deque = BlockDeque::new();

        for value in 0..10_u32 {
            deque.push_back(value);
        }

        for value in (0..10_u32).rev() {
            assert_eq!(deque.pop_back(), Some(value));
        }

        assert_eq!(deque.pop_back(), None);
    }

    #[test]
    fn push_front_then_pop_front_is_lifo() {
        let mut deque = BlockDeque::new();

        for value in 0..10_u32 {
            deque.push_front(value);
        }

        for value in (0..10_u32).rev() {
            assert_eq!(deque.pop_front(), Some(value));
        }

        assert_eq!(deque.pop_front(), None);
    }

    #[test]
    fn push_back_then_pop_front_is_fifo() {
        let mut deque = BlockDeque::new();

        for value in 0..1000_u32 {
            deque.push_back(value);
        }

        for value in 0..1000_u32 {
            assert_eq!(deque.pop_front(), Some(value));
        }

        assert!(deque.is_empty());
    }

    #[test]
    fn filling_one_block_does_not_relocate() {
        let mut deque = BlockDeque::new();

        for value in 0..CAP {
            deque.push_back(value);
        }

        assert_eq!(deque.block_count(), 1);
    }

    #[test]
    fn crossing_block_boundary_doubles_ring() {
        let mut deque = BlockDeque::new();

        for value in 0..=CAP {
            deque.push_back(value);
        }

        assert_eq!(deque.block_count(), 2);
        assert_eq!(deque.allocated_block_count(), 2);
        assert_eq!(deque[CAP], CAP);
    }

    #[test]
    fn push_front_on_single_block_relocates() {
        let mut deque = BlockDeque::new();
        deque.push_front(1_u32);
        deque.push_front(0_u32);

        assert_eq!(deque.block_count(), 2);
        assert_eq!(deque.allocated_block_count(), 2);
        assert_eq!(contents(&deque), vec![0, 1]);
    }

    #[test]
    fn ring_grows_by_doubling() {
        let mut deque = BlockDeque::new();

        for value in 0..(CAP * 5) {
            deque.push_back(value);
        }

        assert_eq!(deque.block_count(), 8);
        assert_eq!(deque.allocated_block_count(), 5);
    }

    #[test]
    fn front_growth_uses_free_blocks_before_relocating() {
        let mut deque = BlockDeque::new();

        // Three blocks worth of elements leaves a ring of four with one free block.
        for value in 0..(CAP * 3) {
            deque.push_back(value);
        }
        assert_eq!(deque.block_count(), 4);

        // Filling the free block from the front must not relocate.
        for value in 0..CAP {
            deque.push_front(value);
        }
        assert_eq!(deque.block_count(), 4);

        // The ring is now full, so one more element at either end relocates.
        deque.push_front(usize::MAX);
        assert_eq!(deque.block_count(), 8);
        assert_eq!(deque[0], usize::MAX);
        assert_eq!(deque[deque.len() - 1], CAP * 3 - 1);
    }

    #[test]
    fn indexing_after_wraparound() {
        let mut deque = BlockDeque::new();

        for value in 0..(CAP * 2) {
            deque.push_back(value as i64);
        }
        for value in 1..=(CAP as i64 + 3) {
            deque.push_front(-value);
        }

        let expected = (1..=(CAP as i64 + 3))
            .rev()
            .map(|value| -value)
            .chain(0..(CAP as i64 * 2))
            .collect::<Vec<_>>();

        assert_eq!(contents(&deque), expected);
    }

    #[test]
    fn popping_last_element_releases_all_blocks() {
        let mut deque = BlockDeque::new();

        for value in 0..(CAP * 3) {
            deque.push_back(value);
        }

        while deque.pop_front().is_some() {}

        assert_eq!(deque.block_count(), 0);
        assert_eq!(deque.allocated_block_count(), 0);

        deque.push_front(42);
        assert_eq!(deque.block_count(), 1);
        assert_eq!(deque[0], 42);
    }

    #[test]
    fn vacated_edge_blocks_are_released() {
        let mut deque = BlockDeque::new();

        for value in 0..(CAP * 3) {
            deque.push_back(value);
        }
        assert_eq!(deque.allocated_block_count(), 3);

        for _ in 0..CAP {
            deque.pop_front();
        }
        assert_eq!(deque.allocated_block_count(), 2);

        for _ in 0..CAP {
            deque.pop_back();
        }
        assert_eq!(deque.allocated_block_count(), 1);
        assert_eq!(deque.block_count(), 4);
        assert_eq!(deque[0], CAP);
    }

    #[test]
    fn get_mut_and_index_mut_modify_in_place() {
        let mut deque = BlockDeque::from([1, 2, 3]);

        *deque.get_mut(0).unwrap() = 10;
        deque[2] = 30;

        assert_eq!(contents(&deque), vec![10, 2, 30]);
        assert_eq!(deque.get_mut(3), None);
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds_panics() {
        let deque = BlockDeque::from([1, 2, 3]);
        let _value = deque[3];
    }

    #[test]
    fn clear_drops_every_element_once() {
        let drops = Rc::new(Cell::new(0));
        let mut deque = BlockDeque::new();

        for _ in 0..(CAP + 5) {
            deque.push_back(DropCounter(Rc::clone(&drops)));
        }
        for _ in 0..3 {
            deque.push_front(DropCounter(Rc::clone(&drops)));
        }

        deque.clear();

        assert_eq!(drops.get(), CAP + 8);
        assert!(deque.is_empty());
        assert_eq!(deque.block_count(), 0);
    }

    #[test]
    fn drop_drops_every_element_once() {
        let drops = Rc::new(Cell::new(0));

        {
            let mut deque = BlockDeque::new();
            for _ in 0..(CAP * 2 + 1) {
                deque.push_front(DropCounter(Rc::clone(&drops)));
            }
            drop(deque.pop_back());
            assert_eq!(drops.get(), 1);
        }

        assert_eq!(drops.get(), CAP * 2 + 1);
    }

    #[test]
    fn clone_is_deep_and_independent() {
        let mut original = BlockDeque::new();
        for value in 0..(CAP * 2) {
            original.push_back(value.to_string());
        }
        original.push_front("front".to_string());

        let mut copy = original.clone();

        assert_eq!(copy, original);
        assert_eq!(copy.block_count(), original.block_count());
        assert_eq!(
            copy.allocated_block_count(),
            original.allocated_block_count()
        );

        copy[0].push('!');
        copy.push_back("extra".to_string());
        copy.pop_front();

        assert_eq!(original[0], "front");
        assert_eq!(original.len(), CAP * 2 + 1);
        assert_eq!(copy.len(), CAP * 2 + 1);
        assert_ne!(copy, original);
    }

    #[test]
    fn clone_of_empty_is_empty() {
        let original = BlockDeque::<String>::new();
        let copy = original.clone();

        assert!(copy.is_empty());
        assert_eq!(copy.block_count(), 0);
    }

    #[test]
    fn swap_exchanges_contents() {
        let mut a = BlockDeque::from([1, 2, 3]);
        let mut b = BlockDeque::from([4]);

        a.swap(&mut b);

        assert_eq!(contents(&a), vec![4]);
        assert_eq!(contents(&b), vec![1, 2, 3]);
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut source = BlockDeque::from([1, 2, 3]);

        let target = mem::take(&mut source);

        assert!(source.is_empty());
        assert_eq!(source.block_count(), 0);
        assert_eq!(contents(&target), vec![1, 2, 3]);
    }

    #[test]
    fn with_len_default_initializes() {
        let deque = BlockDeque::<u16>::with_len(CAP * 2 + 1);

        assert_eq!(deque.len(), CAP * 2 + 1);
        assert!((0..deque.len()).all(|index| deque[index] == 0));
    }

    #[test]
    fn zero_sized_elements() {
        let mut deque = BlockDeque::new();

        for _ in 0..(CAP * 3) {
            deque.push_back(());
            deque.push_front(());
        }

        assert_eq!(deque.len(), CAP * 6);
        assert_eq!(deque.get(CAP * 6 - 1), Some(&()));
    }

    #[test]
    fn debug_lists_elements_in_order() {
        let mut deque = BlockDeque::from([2, 3]);
        deque.push_front(1);

        assert_eq!(format!("{deque:?}"), "[1, 2, 3]");
    }
}
