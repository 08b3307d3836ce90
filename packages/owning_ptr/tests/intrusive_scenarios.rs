//! End-to-end ownership scenarios for `IntrusivePtr` and `UniquePtr`.

use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use owning_ptr::{Counter, IntrusivePtr, RefCounted, SimpleCounter, UniquePtr, make_intrusive};

struct Widget {
    refs: SimpleCounter,
    destructions: Rc<Cell<usize>>,
    id: u32,
}

impl Widget {
    fn new(id: u32, destructions: &Rc<Cell<usize>>) -> Self {
        Self {
            refs: SimpleCounter::new(),
            destructions: Rc::clone(destructions),
            id,
        }
    }
}

impl Drop for Widget {
    fn drop(&mut self) {
        self.destructions.set(self.destructions.get() + 1);
    }
}

// SAFETY: `refs` is the only counter of a `Widget` and only pointers change it.
unsafe impl RefCounted for Widget {
    type Counter = SimpleCounter;

    fn ref_counter(&self) -> &SimpleCounter {
        &self.refs
    }
}

#[test]
fn three_copies_yield_four_references_and_one_destruction() {
    let destructions = Rc::new(Cell::new(0));

    let original = make_intrusive(Widget::new(1, &destructions));
    let copies = [original.clone(), original.clone(), original.clone()];

    assert_eq!(original.use_count(), 4);
    assert!(copies.iter().all(|copy| copy.ptr_eq(&original)));

    drop(original);
    assert_eq!(destructions.get(), 0);

    drop(copies);
    assert_eq!(destructions.get(), 1);
}

#[test]
fn moving_does_not_change_count() {
    let destructions = Rc::new(Cell::new(0));

    let original = IntrusivePtr::new(Widget::new(2, &destructions));
    let moved = original;

    assert_eq!(moved.use_count(), 1);
    assert_eq!(moved.id, 2);
}

#[test]
fn counter_is_visible_through_the_object() {
    let destructions = Rc::new(Cell::new(0));

    let ptr = IntrusivePtr::new(Widget::new(3, &destructions));
    let copy = ptr.clone();

    assert_eq!(ptr.ref_counter().count(), 2);

    // A raw pointer to the object is enough to create another owner.
    let raw = copy.as_ptr().unwrap();
    drop(copy);

    // SAFETY: `ptr` keeps the object alive and it was allocated as a Box.
    let adopted = unsafe { IntrusivePtr::from_raw(raw) };
    assert_eq!(adopted.use_count(), 2);

    drop(ptr);
    drop(adopted);
    assert_eq!(destructions.get(), 1);
}

#[test]
fn unique_ptr_with_custom_deleter_returns_objects_to_a_free_list() {
    let free_list = Rc::new(Cell::new(Vec::<NonNull<u64>>::new()));
    let free_list_in_deleter = Rc::clone(&free_list);

    let raw = NonNull::from(Box::leak(Box::new(99_u64)));

    // SAFETY: The deleter keeps the object alive on the free list, which is drained below.
    let mut ptr = unsafe {
        UniquePtr::from_raw_with_deleter(raw, move |ptr: NonNull<u64>| {
            let mut list = free_list_in_deleter.take();
            list.push(ptr);
            free_list_in_deleter.set(list);
        })
    };

    *ptr += 1;
    drop(ptr);

    let list = free_list.take();
    assert_eq!(list, vec![raw]);

    // SAFETY: The object came from a Box and the deleter did not free it.
    let recovered = unsafe { Box::from_raw(raw.as_ptr()) };
    assert_eq!(*recovered, 100);
}
