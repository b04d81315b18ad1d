//! Benchmarks for script-facing dispatch.
//!
//! Measures the cost of the binding layer itself: overload selection,
//! accessor lookup, argument marshaling and handle bookkeeping.
//!
//! ```bash
//! cargo bench --bench dispatch_benchmarks
//! ```

use classbind::{Dynamic, Engine};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

fn engine() -> Engine {
    Engine::with_default_modules().expect("default modules register")
}

fn bench_accessors(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/accessors");
    let mut engine = engine();
    let circle = engine
        .construct("Circle", &[Dynamic::Float(1.0)])
        .expect("circle");

    group.bench_function("get_inherited_getter", |b| {
        b.iter(|| black_box(engine.get(black_box(&circle), "area")))
    });

    group.bench_function("set_property", |b| {
        b.iter(|| black_box(engine.set(black_box(&circle), "radius", Dynamic::Float(2.0))))
    });

    group.bench_function("get_static_value", |b| {
        b.iter(|| black_box(engine.get_static("Vector2", "Dimensions")))
    });

    group.finish();
}

fn bench_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/calls");
    let mut engine = engine();
    let circle = engine
        .construct("Circle", &[Dynamic::Float(1.0)])
        .expect("circle");
    let vector = engine
        .construct("Vector2", &[Dynamic::Float(3.0), Dynamic::Float(4.0)])
        .expect("vector");

    group.bench_function("plain_method", |b| {
        b.iter(|| black_box(engine.call_method(black_box(&vector), "length", &[])))
    });

    group.bench_function("overload_by_arity", |b| {
        b.iter(|| {
            black_box(engine.call_method(black_box(&circle), "scale", &[Dynamic::Float(1.0)]))
        })
    });

    group.bench_function("instance_argument", |b| {
        let args = [vector.clone()];
        b.iter(|| black_box(engine.call_method(black_box(&vector), "dot", &args)))
    });

    let args = [
        Dynamic::String("{} {} {}".into()),
        Dynamic::Int(1),
        Dynamic::Float(2.5),
        Dynamic::Bool(true),
    ];
    group.throughput(Throughput::Elements(3));
    group.bench_function("raw_variadic", |b| {
        b.iter(|| black_box(engine.call_function("string.format", black_box(&args))))
    });

    group.finish();
}

fn bench_lifetime(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/lifetime");
    let mut engine = engine();

    group.bench_function("construct_release", |b| {
        b.iter(|| {
            let vector = engine
                .construct("Vector2", &[Dynamic::Float(1.0), Dynamic::Float(2.0)])
                .expect("vector");
            black_box(engine.release(&vector))
        })
    });

    let vector = engine.construct("Vector2", &[]).expect("vector");
    group.bench_function("clone_release", |b| {
        b.iter(|| {
            let copy = engine.clone_object(black_box(&vector)).expect("copy");
            black_box(engine.release(&copy))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_accessors, bench_calls, bench_lifetime);
criterion_main!(benches);
