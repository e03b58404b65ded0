use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jsbridge::MAX_CACHEABLE_SOURCE_LEN;

const PROGRAM: &str = "function fib(n) { return n; } var total = fib(1) + fib(2) * fib(3); total";

fn bench_cached_vs_uncached(c: &mut Criterion) {
    let instance = jsbridge_testkit::instance();
    let scope = instance.create_scope().unwrap();

    let mut group = c.benchmark_group("evaluate");

    group.bench_with_input(BenchmarkId::new("cached", "small"), &PROGRAM, |b, source| {
        b.iter(|| scope.evaluate(black_box(source)).unwrap());
    });

    // Padding past the limit forces a compile on every call
    let oversized = format!("{}{}", " ".repeat(MAX_CACHEABLE_SOURCE_LEN), PROGRAM);
    group.bench_with_input(
        BenchmarkId::new("uncached", "oversized"),
        &oversized,
        |b, source| {
            b.iter(|| scope.evaluate(black_box(source)).unwrap());
        },
    );

    group.finish();
}

fn bench_host_calls(c: &mut Criterion) {
    let instance = jsbridge_testkit::instance();
    let scope = instance.create_scope().unwrap();
    scope
        .add_function("host.echo", |args| Ok(args.first().cloned()))
        .unwrap();

    c.bench_function("host_function_call", |b| {
        b.iter(|| scope.evaluate(black_box("host.echo('ping')")).unwrap());
    });
}

fn bench_compiled_script(c: &mut Criterion) {
    let instance = jsbridge_testkit::instance();
    let scope = instance.create_scope().unwrap();
    let script = instance.compile(PROGRAM).unwrap();

    c.bench_function("compiled_script_run", |b| {
        b.iter(|| script.run(black_box(&scope)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_cached_vs_uncached,
    bench_host_calls,
    bench_compiled_script
);
criterion_main!(benches);
