//! Benchmarks for the interception hot paths:
//! - Encoding parsing (simple, offset-annotated, aggregate, invocable)
//! - Call-interface construction
//! - Dispatch through an unhooked slot vs. an installed trampoline

extern crate graft;

use criterion::{criterion_group, criterion_main, Criterion};
use graft::prelude::*;
use std::hint::black_box;
use std::sync::Arc;

fn sum_runtime() -> (Arc<Runtime>, TypeId, InstanceId) {
    let runtime = Arc::new(Runtime::new());
    let calculator = runtime.type_builder("Calculator").build().unwrap();
    runtime
        .define_method(
            calculator,
            "sum".into(),
            "q@:qq",
            Implementation::new(|env| {
                Ok(Value::Int(
                    env.args[0].as_int().unwrap_or(0) + env.args[1].as_int().unwrap_or(0),
                ))
            }),
        )
        .unwrap();
    let instance = runtime.alloc(calculator).unwrap();
    (runtime, calculator, instance)
}

/// Benchmark parsing a plain method signature.
/// Signature: i64 sum(receiver, key, i64, i64)
fn bench_parse_method_signature(c: &mut Criterion) {
    c.bench_function("parse_method_plain", |b| {
        b.iter(|| {
            let sig = CallSignature::parse(black_box("q@:qq")).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing a signature carrying frame offsets.
fn bench_parse_offset_annotated(c: &mut Criterion) {
    c.bench_function("parse_method_offsets", |b| {
        b.iter(|| {
            let sig = CallSignature::parse(black_box("q24@0:8q16q20")).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing a nested aggregate parameter.
fn bench_parse_aggregate(c: &mut Criterion) {
    c.bench_function("parse_method_aggregate", |b| {
        b.iter(|| {
            let sig = CallSignature::parse(black_box("v@:{Outer={Inner=ii}d}")).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark parsing an instead-closure signature with a nested callback.
fn bench_parse_invocable(c: &mut Criterion) {
    c.bench_function("parse_closure_invocable", |b| {
        b.iter(|| {
            let sig = CallSignature::parse(black_box("q@?@?<q@:qq>qq")).unwrap();
            black_box(sig)
        });
    });
}

/// Benchmark building a call-interface descriptor from scratch.
fn bench_interface_construction(c: &mut Criterion) {
    c.bench_function("interface_for_method", |b| {
        b.iter(|| {
            let interface = CallInterface::for_method(black_box("q@:{Pair=qq}d")).unwrap();
            black_box(interface)
        });
    });
}

/// Benchmark dispatching through an unhooked method-table slot.
fn bench_dispatch_unhooked(c: &mut Criterion) {
    let (runtime, _, instance) = sum_runtime();
    let args = [Value::Int(3), Value::Int(4)];

    c.bench_function("dispatch_unhooked", |b| {
        b.iter(|| {
            let result = runtime
                .send(black_box(instance), "sum".into(), black_box(&args))
                .unwrap();
            black_box(result)
        });
    });
}

/// Benchmark dispatching through an installed trampoline with one closure in
/// each pool.
fn bench_dispatch_hooked(c: &mut Criterion) {
    let (runtime, calculator, instance) = sum_runtime();
    let engine = Engine::new(Arc::clone(&runtime));
    let args = [Value::Int(3), Value::Int(4)];

    let before = HookClosure::new("v@?", |_inv| Ok(Value::Unit)).unwrap();
    let after = HookClosure::new("v@?", |_inv| Ok(Value::Unit)).unwrap();
    let forward = HookClosure::new("q@?@?<q@:qq>qq", |inv| {
        let a = inv.arg(0).cloned().unwrap_or(Value::Int(0));
        let b = inv.arg(1).cloned().unwrap_or(Value::Int(0));
        inv.original().unwrap().call(&[a, b])
    })
    .unwrap();

    engine
        .hook_type(calculator, "sum".into(), HookMode::Before, before)
        .unwrap();
    engine
        .hook_type(calculator, "sum".into(), HookMode::Instead, forward)
        .unwrap();
    engine
        .hook_type(calculator, "sum".into(), HookMode::After, after)
        .unwrap();

    c.bench_function("dispatch_hooked", |b| {
        b.iter(|| {
            let result = runtime
                .send(black_box(instance), "sum".into(), black_box(&args))
                .unwrap();
            black_box(result)
        });
    });
}

criterion_group!(
    benches,
    bench_parse_method_signature,
    bench_parse_offset_annotated,
    bench_parse_aggregate,
    bench_parse_invocable,
    bench_interface_construction,
    bench_dispatch_unhooked,
    bench_dispatch_hooked,
);
criterion_main!(benches);
