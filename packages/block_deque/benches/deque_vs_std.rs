//! Compares `BlockDeque` against `VecDeque` for the operations both offer.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::collections::VecDeque;
use std::hint::black_box;
use std::time::Instant;

use alloc_tracker::Allocator;
use block_deque::BlockDeque;
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = u64;
const TEST_VALUE: TestItem = 1024;

const FILL_COUNT: usize = 10_000;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("deque_fill");

    let allocs_op = allocs.operation("block_push_back");
    group.bench_function("block_push_back", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut deque = BlockDeque::new();
                for _ in 0..FILL_COUNT {
                    deque.push_back(black_box(TEST_VALUE));
                }
                drop(black_box(deque));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("std_push_back");
    group.bench_function("std_push_back", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut deque = VecDeque::new();
                for _ in 0..FILL_COUNT {
                    deque.push_back(black_box(TEST_VALUE));
                }
                drop(black_box(deque));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("block_push_both");
    group.bench_function("block_push_both", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut deque = BlockDeque::new();
                for _ in 0..FILL_COUNT / 2 {
                    deque.push_back(black_box(TEST_VALUE));
                    deque.push_front(black_box(TEST_VALUE));
                }
                drop(black_box(deque));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("std_push_both");
    group.bench_function("std_push_both", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut deque = VecDeque::new();
                for _ in 0..FILL_COUNT / 2 {
                    deque.push_back(black_box(TEST_VALUE));
                    deque.push_front(black_box(TEST_VALUE));
                }
                drop(black_box(deque));
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("deque_access");

    let block_deque = (0..FILL_COUNT as u64).collect::<BlockDeque<_>>();
    let std_deque = (0..FILL_COUNT as u64).collect::<VecDeque<_>>();

    group.bench_function("block_index_all", |b| {
        b.iter(|| {
            let mut sum = 0_u64;
            for index in 0..FILL_COUNT {
                sum = sum.wrapping_add(block_deque[black_box(index)]);
            }
            sum
        });
    });

    group.bench_function("std_index_all", |b| {
        b.iter(|| {
            let mut sum = 0_u64;
            for index in 0..FILL_COUNT {
                sum = sum.wrapping_add(std_deque[black_box(index)]);
            }
            sum
        });
    });

    group.finish();

    let mut group = c.benchmark_group("deque_churn");

    // The queue grows slowly while its front keeps crossing block boundaries,
    // then drains completely, releasing every block.
    let allocs_op = allocs.operation("block_fifo_churn");
    group.bench_function("block_fifo_churn", |b| {
        b.iter_custom(|iters| {
            let mut deque = BlockDeque::new();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                for _ in 0..FILL_COUNT {
                    deque.push_back(black_box(TEST_VALUE));
                    deque.push_back(black_box(TEST_VALUE));
                    black_box(deque.pop_front());
                }
                while deque.pop_front().is_some() {}
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("std_fifo_churn");
    group.bench_function("std_fifo_churn", |b| {
        b.iter_custom(|iters| {
            let mut deque = VecDeque::new();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                for _ in 0..FILL_COUNT {
                    deque.push_back(black_box(TEST_VALUE));
                    deque.push_back(black_box(TEST_VALUE));
                    black_box(deque.pop_front());
                }
                while deque.pop_front().is_some() {}
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
