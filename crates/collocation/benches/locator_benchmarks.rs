//! Benchmarks for nearest-cell location and full-table collocation.
//!
//! Run with: cargo bench --package collocation
//! Or: cargo bench --package collocation --bench locator_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use collocation::{locate, upwelling_index, CollocationConfig, GroupConfig, SampleCollocator, Tolerance, UpwellingParams};
use storage::FileGroup;
use test_utils::{fill_attrs, push_sample, regular_axis, sample_table, DatasetBuilder, GridTree, MockGridSource};

// =============================================================================
// LOCATOR BENCHMARKS
// =============================================================================

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");

    // 4 km, 1 km and 300 m global grids
    for (label, step) in [("4km", 1.0 / 24.0), ("1km", 1.0 / 96.0), ("300m", 1.0 / 360.0)] {
        let lat = regular_axis(90.0 - step / 2.0, -step, (180.0 / step) as usize);
        let lon = regular_axis(-180.0 + step / 2.0, step, (360.0 / step) as usize);
        let tolerance = Tolerance::degrees(step);

        group.bench_with_input(BenchmarkId::new("degrees", label), &(lat, lon), |b, (lat, lon)| {
            b.iter(|| locate(black_box(lat), black_box(lon), black_box(40.02), black_box(-7.98), tolerance))
        });
    }

    let lat = regular_axis(30.0, 0.05, 400);
    let lon = regular_axis(-30.0, 0.05, 400);
    group.bench_function("km_regional", |b| {
        b.iter(|| locate(black_box(&lat), black_box(&lon), black_box(40.02), black_box(-7.98), Tolerance::km(5.0)))
    });

    group.finish();
}

// =============================================================================
// DERIVED QUANTITY BENCHMARKS
// =============================================================================

fn bench_upwelling(c: &mut Criterion) {
    let params = UpwellingParams::default();
    c.bench_function("upwelling_index", |b| {
        b.iter(|| upwelling_index(black_box(5.0), black_box(3.0), black_box(36.0), &params))
    });
}

// =============================================================================
// TABLE COLLOCATION BENCHMARKS
// =============================================================================

fn bench_run(c: &mut Criterion) {
    let tree = GridTree::new();
    let mut source = MockGridSource::new();
    for day in 1..=28usize {
        let name = format!("CHL_201606{:02}.nc", day);
        let path = tree.add_file(2016, &name);
        let ds = DatasetBuilder::new(path, regular_axis(35.0, 0.05, 200), regular_axis(-15.0, 0.05, 200))
            .variable("CHL", fill_attrs(-999.0), move |row, col| (day + row + col) as f64 * 0.01)
            .build();
        source = source.with_dataset(&name, ds);
    }
    let source = Arc::new(source);

    let mut group = c.benchmark_group("collocate_table");
    for samples in [1_000u32, 10_000] {
        let mut template = sample_table((2016, 6, 1), &[]);
        for i in 0..samples {
            let day = 1 + i % 28;
            let lat = 35.0 + (i % 191) as f64 * 0.052;
            let lon = -15.0 + (i % 187) as f64 * 0.053;
            push_sample(&mut template, (2016, 6, day), lat, lon);
        }

        group.throughput(Throughput::Elements(samples as u64));
        for parallel in [false, true] {
            let mut config = CollocationConfig::default().with_group(GroupConfig::new(
                "plankton",
                FileGroup::new(tree.root()),
                vec!["CHL".into()],
            ));
            config.parallel = parallel;
            let collocator = SampleCollocator::new(config, source.clone()).expect("valid config");
            let id = BenchmarkId::new(if parallel { "parallel" } else { "sequential" }, samples);

            group.bench_with_input(id, &template, |b, template| {
                b.iter(|| {
                    let mut table = template.clone();
                    collocator.run(&mut table).expect("collocation run")
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_locate, bench_upwelling, bench_run);
criterion_main!(benches);
