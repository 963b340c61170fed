use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use percolate::algs::relax::relax;
use percolate::config::PercolationConfig;
use percolate::grid::{Decomposition, GlobalGrid};
use percolate::run::run_threaded;

fn bench_relax(c: &mut Criterion) {
    let mut group = c.benchmark_group("relax");
    for &l in &[64usize, 288, 576] {
        let decomp = Decomposition::new(l, 1, 1).unwrap();
        let grid = GlobalGrid::seeded(l, 0.411, 1564);
        let old = grid.extract_block(&decomp, 1).unwrap();
        let mut new = old.clone();
        group.bench_with_input(BenchmarkId::from_parameter(l), &l, |b, _| {
            b.iter(|| relax(&old, &mut new))
        });
    }
    group.finish();
}

fn bench_threaded_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("threaded-run");
    group.sample_size(10);
    for &(m, n) in &[(1, 1), (1, 3), (2, 2)] {
        let config = PercolationConfig {
            check_interval: 10,
            ..PercolationConfig::small(96, m, n)
        };
        group.bench_with_input(
            BenchmarkId::new("blocks", format!("{m}x{n}")),
            &config,
            |b, cfg| b.iter(|| run_threaded(cfg, 1564).unwrap()),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_relax, bench_threaded_run);
criterion_main!(benches);
