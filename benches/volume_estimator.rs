use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use reel_assembler::audio::{SampleBuffer, VolumeEstimator};

fn noise(count: usize) -> Vec<f32> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 40) as f32 / (1u64 << 24) as f32 * 0.6 - 0.3
        })
        .collect()
}

fn bench_measure(c: &mut Criterion) {
    let estimator = VolumeEstimator::default();
    let mut group = c.benchmark_group("measure");

    // one, ten and sixty seconds of stereo at the extraction rate
    for seconds in [1usize, 10, 60] {
        let buffer = SampleBuffer::new(noise(seconds * 22000 * 2), 22000, 2);
        group.bench_with_input(BenchmarkId::from_parameter(seconds), &buffer, |b, buffer| {
            b.iter(|| estimator.measure("bench", black_box(buffer)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_measure);
criterion_main!(benches);
