//! Benchmarks for the synchrony analysis engines

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use dyadsync_analysis::{CoherenceAnalyzer, CoherenceConfig, CrqaAnalyzer, CrqaConfig, PlvAnalyzer};

/// Generate synthetic biosignal data (sinusoid with pseudo-noise)
fn generate_signal(n: usize, freq_hz: f64, sample_rate: f64, salt: f64) -> Vec<f64> {
    use std::f64::consts::PI;

    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let signal = (2.0 * PI * freq_hz * t).sin();
            let noise = ((i as f64 * 0.123 + salt) * 1000.0).sin() * 0.2;
            signal + noise
        })
        .collect()
}

fn bench_plv(c: &mut Criterion) {
    let mut group = c.benchmark_group("plv");
    let analyzer = PlvAnalyzer::with_band(250.0, (8.0, 12.0));

    for size in [1000, 2500, 5000] {
        let a = generate_signal(size, 10.0, 250.0, 1.0);
        let b = generate_signal(size, 10.0, 250.0, 2.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let plv = analyzer.compute(black_box(&a), black_box(&b)).unwrap();
                black_box(plv)
            });
        });
    }

    group.finish();
}

fn bench_surrogate_significance(c: &mut Criterion) {
    let mut group = c.benchmark_group("plv_surrogates");
    group.sample_size(10);

    let analyzer = PlvAnalyzer::with_band(250.0, (8.0, 12.0));
    let a = generate_signal(1000, 10.0, 250.0, 1.0);
    let b = generate_signal(1000, 10.0, 250.0, 2.0);

    for surrogates in [50, 200] {
        group.bench_with_input(
            BenchmarkId::from_parameter(surrogates),
            &surrogates,
            |bencher, &surrogates| {
                bencher.iter(|| {
                    let result = analyzer
                        .test_significance_seeded(black_box(&a), black_box(&b), surrogates, 42)
                        .unwrap();
                    black_box(result)
                });
            },
        );
    }

    group.finish();
}

fn bench_crqa(c: &mut Criterion) {
    let mut group = c.benchmark_group("crqa");
    group.sample_size(10);

    let analyzer = CrqaAnalyzer::new(CrqaConfig::default());

    for size in [250, 500, 1000] {
        let a = generate_signal(size, 10.0, 250.0, 1.0);
        let b = generate_signal(size, 10.0, 250.0, 2.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let measures = analyzer.compute(black_box(&a), black_box(&b)).unwrap();
                black_box(measures)
            });
        });
    }

    group.finish();
}

fn bench_wavelet_coherence(c: &mut Criterion) {
    let mut group = c.benchmark_group("wavelet_coherence");
    group.sample_size(10);

    let analyzer = CoherenceAnalyzer::new(CoherenceConfig::with_rate(10.0));

    for size in [600, 1200, 3000] {
        let a = generate_signal(size, 0.1, 10.0, 1.0);
        let b = generate_signal(size, 0.1, 10.0, 2.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let coherence = analyzer.wavelet(black_box(&a), black_box(&b)).unwrap();
                black_box(coherence)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_plv,
    bench_surrogate_significance,
    bench_crqa,
    bench_wavelet_coherence,
);

criterion_main!(benches);
