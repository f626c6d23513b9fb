//! Criterion benchmarks for the forecasting hot paths.
//!
//! Benchmarks:
//! 1. Hourly resampling of minute-level history
//! 2. Damped Holt fit + predict
//! 3. Auto-ARIMA fit + predict (when compiled in)

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use coinlab_core::forecast::backend::ForecastBackend;
use coinlab_core::forecast::holt::DampedHolt;
use coinlab_core::forecast::resample::resample_hourly;
use coinlab_core::{PricePoint, Series};

// ── Helpers ──────────────────────────────────────────────────────────

/// `n` points spaced `step_minutes` apart: trend plus a daily cycle.
fn make_series(n: usize, step_minutes: i64) -> Series {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let points = (0..n)
        .map(|i| {
            let hours = (i as i64 * step_minutes) as f64 / 60.0;
            let price = 30_000.0 + hours * 5.0 + 250.0 * (hours * std::f64::consts::TAU / 24.0).sin();
            PricePoint::new(start + Duration::minutes(i as i64 * step_minutes), price)
        })
        .collect();
    Series::new("bitcoin", points)
}

// ── 1. Resampling ────────────────────────────────────────────────────

fn bench_resample(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample");
    for days in [1usize, 7, 30] {
        let series = make_series(days * 1440, 1);
        group.bench_with_input(BenchmarkId::new("minutely", days), &series, |b, s| {
            b.iter(|| resample_hourly(black_box(s)))
        });
    }
    group.finish();
}

// ── 2./3. Back-ends ──────────────────────────────────────────────────

fn bench_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend");
    #[allow(unused_mut)]
    let mut backends: Vec<Box<dyn ForecastBackend>> = vec![Box::new(DampedHolt::default())];
    #[cfg(feature = "seasonal-arima")]
    backends.push(Box::new(coinlab_core::forecast::arima::AutoArima::default()));

    for hours in [48usize, 168, 720] {
        let series = make_series(hours, 60);
        for backend in &backends {
            group.bench_with_input(BenchmarkId::new(backend.name(), hours), &series, |b, s| {
                b.iter(|| backend.fit_and_predict(black_box(s), 24))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_resample, bench_backends);
criterion_main!(benches);
