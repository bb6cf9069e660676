//! Store Performance Benchmarks
//!
//! Measures the synchronous dispatch path:
//! - Reducer execution in isolation
//! - `Store::send` with and without listeners
//! - Contended dispatch from several threads
//!
//! Run with: `cargo bench -p bookshelf-runtime`

#![allow(missing_docs)]
#![allow(clippy::expect_used)]

use bookshelf_core::reducer::{Reducer, Transition};
use bookshelf_runtime::Store;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

#[derive(Clone, Debug)]
struct BenchState {
    counter: i64,
    data: Vec<u8>,
}

impl Default for BenchState {
    fn default() -> Self {
        Self {
            counter: 0,
            data: vec![0; 1024],
        }
    }
}

#[derive(Clone, Debug)]
enum BenchAction {
    Increment,
    SetValue(i64),
    NoOp,
    Reject,
}

#[derive(Clone, Debug)]
struct BenchEnv;

#[derive(Clone)]
struct BenchReducer;

impl Reducer for BenchReducer {
    type State = BenchState;
    type Action = BenchAction;
    type Environment = BenchEnv;
    type Error = &'static str;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> Result<Transition, &'static str> {
        match action {
            BenchAction::Increment => {
                state.counter += 1;
                Ok(Transition::Changed)
            },
            BenchAction::SetValue(v) => {
                state.counter = v;
                state.data[0] = state.data[0].wrapping_add(1);
                Ok(Transition::Changed)
            },
            BenchAction::NoOp => Ok(Transition::Unchanged),
            BenchAction::Reject => Err("rejected"),
        }
    }
}

fn benchmark_reducer_execution(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    let reducer = BenchReducer;
    let env = BenchEnv;

    group.bench_function("increment", |b| {
        let mut state = BenchState::default();
        b.iter(|| {
            let _ = reducer.reduce(&mut state, black_box(BenchAction::Increment), &env);
        });
    });

    group.bench_function("set_value", |b| {
        let mut state = BenchState::default();
        b.iter(|| {
            let _ = reducer.reduce(&mut state, black_box(BenchAction::SetValue(42)), &env);
        });
    });

    group.finish();
}

fn benchmark_store_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_send");
    group.throughput(Throughput::Elements(1));

    group.bench_function("changed_no_listeners", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, BenchEnv);
        b.iter(|| {
            let _ = store.send(black_box(BenchAction::Increment));
        });
    });

    group.bench_function("unchanged", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, BenchEnv);
        b.iter(|| {
            let _ = store.send(black_box(BenchAction::NoOp));
        });
    });

    group.bench_function("rejected", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, BenchEnv);
        b.iter(|| {
            let _ = store.send(black_box(BenchAction::Reject));
        });
    });

    group.bench_function("changed_four_listeners", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, BenchEnv);
        let subscriptions: Vec<_> = (0..4)
            .map(|_| {
                store.subscribe(|state: &BenchState| {
                    black_box(state.counter);
                })
            })
            .collect();

        b.iter(|| {
            let _ = store.send(black_box(BenchAction::Increment));
        });

        drop(subscriptions);
    });

    group.finish();
}

fn benchmark_contended_send(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.throughput(Throughput::Elements(40));

    group.bench_function("4_threads_10_sends", |b| {
        let store = Store::new(BenchState::default(), BenchReducer, BenchEnv);

        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    let store = store.clone();
                    scope.spawn(move || {
                        for _ in 0..10 {
                            let _ = store.send(BenchAction::Increment);
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_reducer_execution,
    benchmark_store_send,
    benchmark_contended_send,
);
criterion_main!(benches);
