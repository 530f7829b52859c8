use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rig_core::SampleStats;
use rig_core::measurement::encode_reply;

// Synthetic probe trace: slow drift plus xorshift noise
fn synth_run(n: usize, noise_amp: f64, seed: u32) -> Vec<f64> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        f64::from(x) / (f64::from(u32::MAX) + 1.0)
    };
    (0..n)
        .map(|i| 512.0 + (i as f64 / 4000.0).sin() + (next() * 2.0 - 1.0) * noise_amp)
        .collect()
}

fn bench_reduce(c: &mut Criterion) {
    let run = synth_run(20_000, 1.5, 0xC0FFEE);
    c.bench_function("reduce 20k samples", |b| {
        b.iter(|| SampleStats::from_samples(black_box(&run)))
    });
    c.bench_function("reduce + encode reply", |b| {
        b.iter_batched(
            || run.clone(),
            |v| {
                let s = SampleStats::from_samples(&v);
                s.map(|s| encode_reply(s.mean))
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_reduce);
criterion_main!(benches);
