//! Benchmarks for the preview pipeline.
//!
//! Run with: `cargo bench -p hdrview`

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hdrview::{Backend, Format, KernelDispatcher};
use hdrview_io::{MemorySource, SourceSpec, normalize, resample_source};

fn ramp(n: usize) -> Vec<f32> {
    (0..n).map(|i| (i % 1021) as f32 / 97.0).collect()
}

/// Scanline resample of an in-memory RGBA source.
fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");
    let (w, h) = (2048u32, 1024u32);
    let data = ramp((w * h * 4) as usize);
    group.throughput(Throughput::Elements((w * h) as u64));

    for target in [256u32, 1024] {
        group.bench_with_input(BenchmarkId::new("rgba_2k", target), &target, |b, &target| {
            b.iter(|| {
                let spec = SourceSpec::new(w, h, &["R", "G", "B", "A"], Format::Unknown);
                let mut source = MemorySource::new(spec, data.clone()).unwrap();
                resample_source(&mut source, black_box(target), true).unwrap()
            })
        });
    }

    group.finish();
}

/// Percentile normalization (dominated by the sort).
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for size in [10_000usize, 1_000_000] {
        let values = ramp(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, v| {
            b.iter(|| {
                let mut px = v.clone();
                normalize(black_box(&mut px))
            })
        });
    }

    group.finish();
}

/// CPU tone-mapping kernels.
fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernels_cpu");
    let dispatcher = KernelDispatcher::new(Backend::Cpu).unwrap();

    for size in [100_000usize, 4_000_000] {
        let values = ramp(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("gamma", size), &values, |b, v| {
            b.iter(|| dispatcher.apply_gamma(black_box(v), 1.0 / 2.2).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("exposure_gamma", size), &values, |b, v| {
            b.iter(|| dispatcher.apply_exposure_gamma(black_box(v), 0.5, 1.0 / 2.2).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resample, bench_normalize, bench_kernels);
criterion_main!(benches);
