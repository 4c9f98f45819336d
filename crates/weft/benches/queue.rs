//! Queue throughput: `ThreadSafeQueue` and `LockFreeDeque` against
//! crossbeam's `ArrayQueue`
//!
//! Run with: cargo bench -p weft --bench queue

use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossbeam_queue::ArrayQueue;
use weft::{CancellationToken, LockFreeDeque, ThreadSafeQueue};

const OPS: u64 = 10_000;

/// Run `threads` copies of `body(thread_index)` and time them together
fn run_threads<F>(threads: usize, body: F) -> Duration
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let body = Arc::new(body);
    let start = Instant::now();
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let body = Arc::clone(&body);
            thread::spawn(move || body(i))
        })
        .collect();
    for h in handles {
        h.join().expect("bench thread");
    }
    start.elapsed()
}

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("thread_safe_queue", |b| {
        b.iter_batched_ref(
            ThreadSafeQueue::<u64>::new,
            |q| {
                for i in 0..OPS {
                    q.push(i);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("lock_free_deque", |b| {
        b.iter_batched_ref(
            || LockFreeDeque::<u64>::new(OPS as usize),
            |q| {
                for i in 0..OPS {
                    let _ = q.push_back(i);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.bench_function("crossbeam_array_queue", |b| {
        b.iter_batched_ref(
            || ArrayQueue::<u64>::new(OPS as usize),
            |q| {
                for i in 0..OPS {
                    let _ = q.push(i);
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Even threads push, odd threads pop
fn bench_mpmc(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_mpmc");

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements(OPS * threads as u64));

        group.bench_with_input(
            BenchmarkId::new("thread_safe_queue", threads),
            &threads,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let q = Arc::new(ThreadSafeQueue::<u64>::new());
                    run_threads(threads, move |t| {
                        for i in 0..iters * OPS {
                            if t % 2 == 0 {
                                q.push(i);
                            } else {
                                black_box(q.pop());
                            }
                        }
                    })
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("lock_free_deque", threads),
            &threads,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let q = Arc::new(LockFreeDeque::<u64>::new(4096));
                    run_threads(threads, move |t| {
                        for i in 0..iters * OPS {
                            if t % 2 == 0 {
                                let _ = q.push_back(i);
                            } else {
                                black_box(q.pop_front());
                            }
                        }
                    })
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("crossbeam_array_queue", threads),
            &threads,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let q = Arc::new(ArrayQueue::<u64>::new(4096));
                    run_threads(threads, move |t| {
                        for i in 0..iters * OPS {
                            if t % 2 == 0 {
                                let _ = q.push(i);
                            } else {
                                black_box(q.pop());
                            }
                        }
                    })
                });
            },
        );
    }

    group.finish();
}

/// Producers push while one consumer blocks in `wait()`
fn bench_mpsc(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_safe_queue_mpsc");

    for producers in [1usize, 2, 4] {
        group.throughput(Throughput::Elements(OPS * producers as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(producers),
            &producers,
            |b, &producers| {
                b.iter_custom(|iters| {
                    let q = Arc::new(ThreadSafeQueue::<u64>::new());
                    let token = CancellationToken::new();

                    let consumer = {
                        let q = Arc::clone(&q);
                        let token = token.clone();
                        thread::spawn(move || {
                            while !token.is_cancelled() {
                                q.wait(&token);
                                black_box(q.pop());
                            }
                        })
                    };

                    let producer_q = Arc::clone(&q);
                    let elapsed = run_threads(producers, move |_| {
                        for i in 0..iters * OPS {
                            producer_q.push(i);
                        }
                    });

                    token.cancel();
                    consumer.join().expect("consumer thread");
                    elapsed
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_push, bench_mpmc, bench_mpsc);
criterion_main!(benches);
