use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sleepcca::epoch::SampleSpan;
use sleepcca::fit_transform;
use sleepcca::time_resolved::fit_window;

/// `[4, n]` EEG and `[2, n]` EOG sharing one source.
fn groups(n: usize) -> (Array2<f64>, Array2<f64>) {
    let mut rng = StdRng::seed_from_u64(0);
    let src: Vec<f64> = (0..n).map(|t| (t as f64 * 0.05).sin()).collect();
    let eeg = Array2::from_shape_fn((4, n), |(c, t)| src[t] * (c as f64 + 1.0) + rng.gen::<f64>());
    let eog = Array2::from_shape_fn((2, n), |(c, t)| src[t] * (2.0 - c as f64) + rng.gen::<f64>());
    (eeg, eog)
}

fn bench_window_fit(c: &mut Criterion) {
    // 30 s window at 256 Hz
    let (eeg, eog) = groups(7680);
    let span = SampleSpan { start: 0, stop: 7680 };
    c.bench_function("fit_window 30 s @ 256 Hz [4+2 ch]", |b| {
        b.iter(|| black_box(fit_window(&eeg, &eog, black_box(span)).unwrap()))
    });
}

fn bench_stage_fit(c: &mut Criterion) {
    // one hour of one stage at 256 Hz
    let (eeg, eog) = groups(921_600);
    c.bench_function("fit_transform 1 h @ 256 Hz [4+2 ch]", |b| {
        b.iter(|| {
            let pair = fit_transform(eeg.t(), eog.t(), 2).unwrap();
            black_box(pair.singular_values[0])
        })
    });
}

criterion_group!(benches, bench_window_fit, bench_stage_fit);
criterion_main!(benches);
