use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};

use dev_utils::get_example_scenario;
use raptor_eval::{BoundedMcRaptor, McRaptor, NoProfiler};

fn mc_raptor_benchmark(c: &mut Criterion) {
    let (network, start, start_time, end) = get_example_scenario();
    let mut mc_raptor = McRaptor::with_profiler(&network, NoProfiler);
    c.bench_function("McRaptor", |b| b.iter(|| mc_raptor.run_query(black_box(start), black_box(start_time), black_box(end))));
}

fn bounded_mc_raptor_benchmark(c: &mut Criterion) {
    let (network, start, start_time, end) = get_example_scenario();
    let mut bounded = BoundedMcRaptor::with_profiler(&network, NoProfiler);
    for (arrival_slack, trip_slack) in [(1., 1.), (1.5, 1.5)] {
        c.bench_function(&format!("Bounded McRaptor {arrival_slack}/{trip_slack}"), |b| {
            b.iter(|| bounded.run_query(black_box(start), black_box(start_time), black_box(end), arrival_slack, trip_slack))
        });
    }
}

criterion_group!(benches, mc_raptor_benchmark, bounded_mc_raptor_benchmark);
criterion_main!(benches);
