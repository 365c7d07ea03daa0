//! Evaluator throughput benchmarks
//!
//! Run with:
//!   cargo bench --bench eval_step

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reval::{scan, Interpreter};

fn countdown(n: usize) -> String {
    format!("n: {} while [n > 0] [n: n - 1] n", n)
}

fn bench_enfix_chain(c: &mut Criterion) {
    let source = (1..=64).map(|i| i.to_string()).collect::<Vec<_>>().join(" + ");
    let code = scan(&source).expect("chain scans");
    let mut interp = Interpreter::new().expect("library installs");

    c.bench_function("enfix_chain_64", |b| {
        b.iter(|| interp.eval_array(black_box(code.clone())).expect("chain evaluates"))
    });
}

fn bench_loops(c: &mut Criterion) {
    let mut group = c.benchmark_group("while_countdown");
    for n in [100usize, 1_000, 10_000] {
        let code = scan(&countdown(n)).expect("loop scans");
        let mut interp = Interpreter::new().expect("library installs");
        group.bench_with_input(BenchmarkId::from_parameter(n), &code, |b, code| {
            b.iter(|| interp.eval_array(black_box(code.clone())).expect("loop evaluates"))
        });
    }
    group.finish();
}

fn bench_calls(c: &mut Criterion) {
    let mut interp = Interpreter::new().expect("library installs");
    interp
        .eval_text("f: func [a /x xa] [either x [a + xa] [a]]")
        .expect("func defines");
    let plain = scan("loop 500 [f 1]").expect("scans");
    let refined = scan("loop 500 [f/x 1 2]").expect("scans");

    c.bench_function("func_call", |b| {
        b.iter(|| interp.eval_array(black_box(plain.clone())).expect("calls"))
    });
    c.bench_function("func_call_refinement", |b| {
        b.iter(|| interp.eval_array(black_box(refined.clone())).expect("calls"))
    });
}

fn bench_scan(c: &mut Criterion) {
    let source = "fact: func [n] [either n <= 1 [1] [n * fact n - 1]] ".repeat(50);
    c.bench_function("scan_functions", |b| b.iter(|| scan(black_box(&source))));
}

criterion_group!(benches, bench_enfix_chain, bench_loops, bench_calls, bench_scan);
criterion_main!(benches);
