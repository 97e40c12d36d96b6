//! Digest benchmarks: a full first digest over many watchers, and the
//! short-circuited digest after a single change.

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use vigil_core::schedule::ManualScheduler;
use vigil_core::Scope;

const WATCHERS: usize = 1_000;

fn populated_scope() -> Scope<Vec<i64>> {
    let scope = Scope::new((0..WATCHERS as i64).collect(), Rc::new(ManualScheduler::new()));
    for i in 0..WATCHERS {
        scope.watch(move |s| Ok(s.model()[i]));
    }
    scope
}

fn first_digest(c: &mut Criterion) {
    c.bench_function("first digest, 1k watchers", |b| {
        b.iter_batched(
            populated_scope,
            |scope| black_box(scope.digest()),
            BatchSize::SmallInput,
        )
    });
}

fn single_change(c: &mut Criterion) {
    let scope = populated_scope();
    let _ = scope.digest();
    let mut tick = 0i64;

    c.bench_function("digest after one change, 1k watchers", |b| {
        b.iter(|| {
            tick += 1;
            scope.model_mut()[0] = tick;
            black_box(scope.digest())
        })
    });
}

fn stable_digest(c: &mut Criterion) {
    let scope = populated_scope();
    let _ = scope.digest();

    c.bench_function("stable digest, 1k watchers", |b| {
        b.iter(|| black_box(scope.digest()))
    });
}

criterion_group!(benches, first_digest, single_change, stable_digest);
criterion_main!(benches);
