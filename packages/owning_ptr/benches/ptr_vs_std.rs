//! Compares the owning pointers against their closest standard library counterparts.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::rc::Rc;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use owning_ptr::{IntrusivePtr, RefCounted, SharedPtr, SimpleCounter, UniquePtr};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = u64;
const TEST_VALUE: TestItem = 1024;

struct Counted {
    refs: SimpleCounter,
    value: TestItem,
}

// SAFETY: `refs` is the only counter of a `Counted` and only pointers change it.
unsafe impl RefCounted for Counted {
    type Counter = SimpleCounter;

    fn ref_counter(&self) -> &SimpleCounter {
        &self.refs
    }
}

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("ptr_create");

    let allocs_op = allocs.operation("shared_new");
    group.bench_function("shared_new", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(SharedPtr::new(black_box(TEST_VALUE))));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("shared_from_box");
    group.bench_function("shared_from_box", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let boxed = Box::new(black_box(TEST_VALUE));
                drop(black_box(SharedPtr::from_box(boxed)));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("rc_new");
    group.bench_function("rc_new", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(Rc::new(black_box(TEST_VALUE))));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("intrusive_new");
    group.bench_function("intrusive_new", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(IntrusivePtr::new(Counted {
                    refs: SimpleCounter::new(),
                    value: black_box(TEST_VALUE),
                })));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("unique_new");
    group.bench_function("unique_new", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(UniquePtr::new(black_box(TEST_VALUE))));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("box_new");
    group.bench_function("box_new", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(Box::new(black_box(TEST_VALUE))));
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("ptr_clone");

    let shared = SharedPtr::new(TEST_VALUE);
    group.bench_function("shared_clone_drop", |b| {
        b.iter(|| drop(black_box(shared.clone())));
    });

    let rc = Rc::new(TEST_VALUE);
    group.bench_function("rc_clone_drop", |b| {
        b.iter(|| drop(black_box(Rc::clone(&rc))));
    });

    let intrusive = IntrusivePtr::new(Counted {
        refs: SimpleCounter::new(),
        value: TEST_VALUE,
    });
    group.bench_function("intrusive_clone_drop", |b| {
        b.iter(|| black_box(intrusive.clone()).value);
    });

    group.finish();

    let mut group = c.benchmark_group("ptr_upgrade");

    let weak = shared.downgrade();
    group.bench_function("shared_upgrade", |b| {
        b.iter(|| drop(black_box(weak.upgrade())));
    });

    let rc_weak = Rc::downgrade(&rc);
    group.bench_function("rc_upgrade", |b| {
        b.iter(|| drop(black_box(rc_weak.upgrade())));
    });

    let expired = SharedPtr::new(TEST_VALUE).downgrade();
    group.bench_function("shared_upgrade_expired", |b| {
        b.iter(|| drop(black_box(expired.lock())));
    });

    group.finish();

    let mut group = c.benchmark_group("ptr_fan_out");

    let allocs_op = allocs.operation("shared_fan_out");
    group.bench_function("shared_fan_out", |b| {
        b.iter_custom(|iters| {
            let sources = iter::repeat_with(|| SharedPtr::new(TEST_VALUE))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for source in &sources {
                let copies = [source.clone(), source.clone(), source.clone()];
                black_box(&copies);
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("rc_fan_out");
    group.bench_function("rc_fan_out", |b| {
        b.iter_custom(|iters| {
            let sources = iter::repeat_with(|| Rc::new(TEST_VALUE))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for source in &sources {
                let copies = [Rc::clone(source), Rc::clone(source), Rc::clone(source)];
                black_box(&copies);
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
