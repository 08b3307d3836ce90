//! End-to-end ownership scenarios for `SharedPtr` and `WeakPtr`.

use std::cell::Cell;
use std::fmt::Display;
use std::rc::Rc;

use owning_ptr::{Error, SharedPtr, WeakPtr};

struct DropCounter {
    drops: Rc<Cell<usize>>,
    label: &'static str,
}

impl DropCounter {
    fn new(drops: &Rc<Cell<usize>>, label: &'static str) -> Self {
        Self {
            drops: Rc::clone(drops),
            label,
        }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

impl Display for DropCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label)
    }
}

#[test]
fn use_count_tracks_copies_and_value_is_destroyed_once() {
    let drops = Rc::new(Cell::new(0));
    let original = SharedPtr::new(DropCounter::new(&drops, "counted"));

    for k in 1..=10 {
        let copies = (0..k).map(|_| original.clone()).collect::<Vec<_>>();
        assert_eq!(original.use_count(), k + 1);
        drop(copies);
        assert_eq!(original.use_count(), 1);
    }

    let copies = (0..3).map(|_| original.clone()).collect::<Vec<_>>();
    drop(original);
    assert_eq!(drops.get(), 0);

    drop(copies);
    assert_eq!(drops.get(), 1);
}

#[test]
fn make_shared_then_reset_expires_weak() {
    let mut shared = SharedPtr::new_with(|| String::from("short-lived"));
    let weak = WeakPtr::from(&shared);

    shared.reset();

    assert!(weak.expired());
    assert!(weak.lock().is_empty());
    assert_eq!(weak.upgrade().unwrap_err(), Error::Expired);
}

#[test]
fn promotion_succeeds_only_while_strong_reference_lives() {
    let shared = SharedPtr::new(11_u64);
    let weak = shared.downgrade();

    {
        let promoted = weak.upgrade().unwrap();
        assert_eq!(shared.use_count(), 2);
        assert_eq!(*promoted, 11);
    }
    assert_eq!(shared.use_count(), 1);

    drop(shared);

    assert!(matches!(weak.upgrade(), Err(Error::Expired)));
}

#[test]
fn alias_outlives_owner_and_owner_outlives_alias() {
    let drops = Rc::new(Cell::new(0));

    // Alias dropped first.
    let owner = SharedPtr::new((DropCounter::new(&drops, "first"), 1_u32));
    let alias = owner.project(|pair| &pair.1);
    assert_eq!(alias.use_count(), owner.use_count());
    drop(alias);
    assert_eq!(drops.get(), 0);
    drop(owner);
    assert_eq!(drops.get(), 1);

    // Owner dropped first.
    let owner = SharedPtr::new((DropCounter::new(&drops, "second"), 2_u32));
    let alias = owner.project(|pair| &pair.1);
    drop(owner);
    assert_eq!(drops.get(), 1);
    assert_eq!(*alias, 2);
    drop(alias);
    assert_eq!(drops.get(), 2);
}

#[test]
fn trait_object_views_share_one_value() {
    let drops = Rc::new(Cell::new(0));

    let concrete = SharedPtr::new(DropCounter::new(&drops, "viewed"));
    let view: SharedPtr<dyn Display> = concrete.project(|value| value as &dyn Display);
    let weak_view = view.downgrade();

    assert_eq!(view.to_string(), "viewed");
    assert!(view == concrete);

    drop(concrete);
    assert_eq!(drops.get(), 0);
    assert_eq!(weak_view.lock().to_string(), "viewed");

    drop(view);
    assert_eq!(drops.get(), 1);
    assert!(weak_view.expired());
}

#[test]
fn boxed_trait_object_is_destroyed_through_its_vtable() {
    let drops = Rc::new(Cell::new(0));

    let boxed: Box<dyn Display> = Box::new(DropCounter::new(&drops, "boxed"));
    let shared = SharedPtr::from(boxed);
    let copy = shared.clone();

    assert_eq!(copy.to_string(), "boxed");

    drop(shared);
    drop(copy);
    assert_eq!(drops.get(), 1);
}

#[test]
fn weak_pointers_keep_block_but_not_value() {
    let drops = Rc::new(Cell::new(0));

    let shared = SharedPtr::new(DropCounter::new(&drops, "observed"));
    let weaks = (0..4).map(|_| shared.downgrade()).collect::<Vec<_>>();
    assert_eq!(shared.weak_count(), 4);

    drop(shared);
    assert_eq!(drops.get(), 1);
    assert!(weaks.iter().all(WeakPtr::expired));

    drop(weaks);
    assert_eq!(drops.get(), 1);
}

#[test]
fn value_owning_weak_pointer_to_itself_is_destroyed_cleanly() {
    struct Node {
        parent: Cell<WeakPtr<Node>>,
        _counter: DropCounter,
    }

    let drops = Rc::new(Cell::new(0));
    let node = SharedPtr::new(Node {
        parent: Cell::new(WeakPtr::new()),
        _counter: DropCounter::new(&drops, "node"),
    });

    node.parent.set(node.downgrade());
    assert_eq!(node.weak_count(), 1);

    drop(node);
    assert_eq!(drops.get(), 1);
}
