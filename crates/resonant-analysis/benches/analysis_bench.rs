//! Criterion benchmarks for resonant-analysis components
//!
//! Run with: cargo bench -p resonant-analysis

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resonant_analysis::compare::{mse, rmse, snr_db, spectral_correlation, spectral_difference};
use resonant_analysis::fft::{Fft, Window};
use resonant_analysis::ir::SineSweep;
use resonant_analysis::spectrum::{find_peaks, magnitude_spectrum, spectral_centroid};
use resonant_analysis::transfer_fn::TransferFunction;
use std::f32::consts::PI;

const SAMPLE_RATE: f32 = 48000.0;

fn generate_sine(size: usize, frequency: f32) -> Vec<f32> {
    (0..size)
        .map(|i| (2.0 * PI * frequency * i as f32 / SAMPLE_RATE).sin())
        .collect()
}

fn generate_complex_signal(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE;
            let f1 = (2.0 * PI * 440.0 * t).sin();
            let f2 = 0.5 * (2.0 * PI * 880.0 * t).sin();
            let f3 = 0.25 * (2.0 * PI * 1320.0 * t).sin();
            let f4 = 0.125 * (2.0 * PI * 1760.0 * t).sin();
            (f1 + f2 + f3 + f4) * 0.5
        })
        .collect()
}

fn generate_noise(size: usize) -> Vec<f32> {
    let mut state = 0x12345678u32;
    (0..size)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state as i32 as f32) / (i32::MAX as f32)
        })
        .collect()
}

fn bench_fft_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("FFT_Forward");
    let sizes = [256, 512, 1024, 2048, 4096, 8192];

    for &size in &sizes {
        let fft = Fft::new(size);
        let input = generate_sine(size, 440.0);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(fft.forward(black_box(&input))))
        });
    }

    group.finish();
}

fn bench_fft_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("FFT_Roundtrip");
    let sizes = [256, 512, 1024, 2048, 4096];

    for &size in &sizes {
        let fft = Fft::new(size);
        let input = generate_complex_signal(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let spectrum = fft.forward(black_box(&input));
                black_box(fft.inverse(&spectrum))
            })
        });
    }

    group.finish();
}

fn bench_window_functions(c: &mut Criterion) {
    let mut group = c.benchmark_group("Window");
    let windows = [
        ("Rectangular", Window::Rectangular),
        ("Hann", Window::Hann),
        ("Hamming", Window::Hamming),
        ("Blackman", Window::Blackman),
        ("BlackmanHarris", Window::BlackmanHarris),
    ];
    let size = 2048;

    for (name, window) in &windows {
        let buffer = generate_sine(size, 440.0);

        group.bench_function(*name, |b| {
            b.iter(|| {
                let mut buf = buffer.clone();
                window.apply(black_box(&mut buf));
                black_box(&buf);
            })
        });
    }

    group.finish();
}

fn bench_magnitude_spectrum(c: &mut Criterion) {
    let mut group = c.benchmark_group("MagnitudeSpectrum");
    let sizes = [1024, 2048, 4096];

    for &size in &sizes {
        let signal = generate_complex_signal(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(magnitude_spectrum(black_box(&signal), size, Window::Hann)))
        });
    }

    group.finish();
}

fn bench_spectral_centroid_and_peaks(c: &mut Criterion) {
    let mut group = c.benchmark_group("SpectralCentroidAndPeaks");
    let sizes = [1024, 2048, 4096];

    for &size in &sizes {
        let signal = generate_complex_signal(size);
        let spectrum = magnitude_spectrum(&signal, size, Window::Hann);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let centroid = spectral_centroid(black_box(&spectrum), SAMPLE_RATE);
                let peaks = find_peaks(black_box(&spectrum), SAMPLE_RATE, -40.0, 50.0);
                black_box((centroid, peaks))
            })
        });
    }

    group.finish();
}

fn bench_mse_rmse_snr(c: &mut Criterion) {
    let mut group = c.benchmark_group("Compare_TimeDomain");
    let sizes = [1024, 4096, 16384];

    for &size in &sizes {
        let signal_a = generate_sine(size, 440.0);
        let signal_b = generate_noise(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let m = mse(black_box(&signal_a), black_box(&signal_b));
                let r = rmse(black_box(&signal_a), black_box(&signal_b));
                let s = snr_db(black_box(&signal_a), black_box(&signal_b));
                black_box((m, r, s))
            })
        });
    }

    group.finish();
}

fn bench_spectral_correlation_and_difference(c: &mut Criterion) {
    let mut group = c.benchmark_group("Compare_Spectral");
    let fft_sizes = [1024, 2048, 4096];

    for &fft_size in &fft_sizes {
        let signal_a = generate_complex_signal(fft_size);
        let signal_b = generate_noise(fft_size);

        group.bench_with_input(BenchmarkId::from_parameter(fft_size), &fft_size, |b, _| {
            b.iter(|| {
                let corr = spectral_correlation(black_box(&signal_a), black_box(&signal_b), fft_size);
                let diff = spectral_difference(black_box(&signal_a), black_box(&signal_b), fft_size);
                black_box((corr, diff))
            })
        });
    }

    group.finish();
}

fn bench_sweep_driven_transfer_function(c: &mut Criterion) {
    let mut group = c.benchmark_group("SweepTransferFunction");
    let fft_sizes = [1024, 2048];

    for &fft_size in &fft_sizes {
        let sweep = SineSweep::new(SAMPLE_RATE, 100.0, 16000.0, 1.0);
        let stimulus = sweep.generate();
        let response = stimulus.clone();

        group.bench_with_input(BenchmarkId::from_parameter(fft_size), &fft_size, |b, _| {
            b.iter(|| {
                black_box(TransferFunction::measure(
                    black_box(&stimulus),
                    black_box(&response),
                    SAMPLE_RATE,
                    fft_size,
                    0.5,
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fft_forward,
    bench_fft_roundtrip,
    bench_window_functions,
    bench_magnitude_spectrum,
    bench_spectral_centroid_and_peaks,
    bench_mse_rmse_snr,
    bench_spectral_correlation_and_difference,
    bench_sweep_driven_transfer_function,
);

criterion_main!(benches);
