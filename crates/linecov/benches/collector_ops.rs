//! Collector Operations Benchmarks
//!
//! Benchmarks for the per-flush hot path: file classification, delta
//! computation and batch merging.
//!
//! Run with: `cargo bench --bench collector_ops`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use linecov::coverage::{
    combine_lines, DeltaTracker, FileClassifier, LineCoverage, MergeMode, Snapshot,
};
use linecov::TrackerConfig;

fn snapshot(files: usize, lines: usize, bump: u64) -> Snapshot {
    (0..files)
        .map(|f| {
            let data: Vec<Option<u64>> = (0..lines)
                .map(|l| (l % 4 != 0).then_some((l as u64 % 7) + bump))
                .collect();
            (format!("/app/lib/file_{f}.rb"), LineCoverage::from(data))
        })
        .collect()
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let config = TrackerConfig::builder()
        .root("/app")
        .ignore("spec/")
        .ignore("config/initializers")
        .group("Models", "/app/models")
        .build();
    let classifier = FileClassifier::new(&config).unwrap();

    let paths = [
        ("tracked", "/app/lib/billing/invoice.rb"),
        ("ignored_pattern", "/app/spec/models/user_spec.rb"),
        ("outside_root", "/usr/lib/ruby/3.3.0/set.rb"),
    ];
    for (name, path) in paths {
        group.bench_with_input(BenchmarkId::from_parameter(name), &path, |bench, path| {
            bench.iter(|| black_box(classifier.classify(black_box(path))));
        });
    }

    group.finish();
}

fn bench_compute_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_delta");

    for files in [10, 100, 1000] {
        let first = snapshot(files, 200, 0);
        let second = snapshot(files, 200, 3);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{files}_files")),
            &(first, second),
            |bench, (first, second)| {
                bench.iter(|| {
                    let mut tracker = DeltaTracker::new();
                    let _ = tracker.compute_delta(first.clone());
                    black_box(tracker.compute_delta(second.clone()));
                });
            },
        );
    }

    group.finish();
}

fn bench_combine_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine_lines");

    for lines in [100, 1000, 10_000] {
        let left = snapshot(1, lines, 1).into_values().next().unwrap();
        let right = snapshot(1, lines, 2).into_values().next().unwrap();
        for mode in [MergeMode::AddDelta, MergeMode::MaxCumulative] {
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), lines),
                &(&left, &right),
                |bench, (left, right)| {
                    bench.iter(|| black_box(combine_lines(left, right, mode)));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_classify, bench_compute_delta, bench_combine_lines);
criterion_main!(benches);
