//! Benchmarks for pipe execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fpipe::continuation::{Completion, Next, Pipe};
use fpipe::functional::{FPipe, PipeArg};
use serde_json::{json, Value};

fn increment() -> PipeArg {
    PipeArg::step(|args| Ok(json!(args[0].as_i64().unwrap_or_default() + 1)))
}

fn functional_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let pipe = FPipe::new((0..100).map(|_| increment()).collect()).expect("valid pipe");

    c.bench_function("fpipe_100_sync_steps", |b| {
        b.iter(|| runtime.block_on(pipe.process(vec![black_box(json!(0))])))
    });

    let expanding = FPipe::new(vec![
        PipeArg::step(|_| Ok(json!([1, 2, 3, 4]))),
        true.into(),
        PipeArg::step(|args| Ok(json!(args.len()))),
    ])
    .expect("valid pipe");

    c.bench_function("fpipe_expand", |b| {
        b.iter(|| runtime.block_on(expanding.process(vec![])))
    });
}

fn continuation_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let mut pipe = Pipe::with_source(|_: &[Value], done: Completion| {
        done.complete(Ok(json!(0)));
        Ok(())
    });
    for _ in 0..100 {
        pipe.use_middleware(|value: Value, next: Next| {
            next.advance(Ok(json!(value.as_i64().unwrap_or_default() + 1)));
            Ok(())
        });
    }

    c.bench_function("pipe_100_middleware", |b| {
        b.iter(|| runtime.block_on(pipe.run(black_box(vec![]))))
    });
}

criterion_group!(benches, functional_benchmark, continuation_benchmark);
criterion_main!(benches);
