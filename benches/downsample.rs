use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use waveform_extract::waveform::{
    Downsampler, ExecutionMode, ExtractionParameters, PeakKernel, normalize,
};

const FRAMES: usize = 1 << 20;
const SAMPLES_PER_PIXEL: usize = 256;

fn noise(len: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..len).map(|_| rng.random_range(-1.0_f32..1.0)).collect()
}

fn bench_peak_kernels(c: &mut Criterion) {
    let samples = noise(FRAMES);
    let mut group = c.benchmark_group("peak_kernel");
    for kernel in PeakKernel::available() {
        group.bench_with_input(
            BenchmarkId::new(format!("{kernel:?}"), FRAMES),
            &samples,
            |b, samples| b.iter(|| kernel.max_abs(black_box(samples))),
        );
    }
    group.finish();
}

fn bench_downsample_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("downsample");
    for channels in [1usize, 2] {
        let samples = noise(FRAMES * channels);
        let params = ExtractionParameters::new(SAMPLES_PER_PIXEL, channels);
        for mode in [ExecutionMode::SingleThreaded, ExecutionMode::MultiThreaded] {
            let engine = Downsampler::new().with_mode(mode);
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), format!("{channels}ch")),
                &samples,
                |b, samples| b.iter(|| engine.downsample(black_box(samples), params, None, None)),
            );
        }
    }
    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let channels = vec![noise(FRAMES / SAMPLES_PER_PIXEL); 2];
    c.bench_with_input(
        BenchmarkId::new("normalize", channels[0].len()),
        &channels,
        |b, channels| b.iter(|| normalize(black_box(channels), 1.0, 0.05)),
    );
}

criterion_group!(
    benches,
    bench_peak_kernels,
    bench_downsample_modes,
    bench_normalize
);
criterion_main!(benches);
