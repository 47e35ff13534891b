//! Integration tests for resonant-analysis, exercising FFT, spectrum, sweep-driven
//! transfer function measurement, and spectral comparison together against
//! synthetic signals.

use resonant_analysis::spectrum::{find_peaks, magnitude_spectrum, spectral_centroid};
use resonant_analysis::{spectral_correlation, Fft, SineSweep, TransferFunction, Window};
use std::f32::consts::PI;

#[test]
fn test_sine_tone_dominant_peak_matches_frequency() {
    let sample_rate = 44100.0;
    let freq = 2000.0;
    let fft_size = 4096;

    let signal: Vec<f32> = (0..fft_size)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
        .collect();
    let spectrum = magnitude_spectrum(&signal, fft_size, Window::Hann);

    let peaks = find_peaks(&spectrum, sample_rate, -40.0, 100.0);
    assert!(!peaks.is_empty());
    let (peak_freq, _) = peaks[0];
    assert!((peak_freq - freq).abs() < 50.0, "peak at {peak_freq}, expected near {freq}");

    let centroid = spectral_centroid(&spectrum, sample_rate);
    assert!((centroid - freq).abs() < 50.0);
}

#[test]
fn test_identical_signals_have_perfect_spectral_correlation() {
    let signal: Vec<f32> = (0..2048).map(|i| (2.0 * PI * 440.0 * i as f32 / 44100.0).sin()).collect();
    let correlation = spectral_correlation(&signal, &signal, 2048);
    assert!((correlation - 1.0).abs() < 1e-3);
}

#[test]
fn test_sweep_driven_transfer_function_is_flat_for_identity_system() {
    let sweep = SineSweep::new(44100.0, 100.0, 10000.0, 1.0);
    let input = sweep.generate();
    let output = input.clone();

    let tf = TransferFunction::measure(&input, &output, 44100.0, 2048, 0.5);
    assert!(!tf.frequencies.is_empty());

    let avg_mag: f32 = tf.magnitude_db.iter().sum::<f32>() / tf.magnitude_db.len() as f32;
    assert!(avg_mag.abs() < 6.0, "identity system should have ~0dB response, got {avg_mag}");
}

#[test]
fn test_fft_roundtrip_preserves_signal_via_public_api() {
    let sample_rate = 48000.0;
    let fft_size = 1024;
    let signal: Vec<f32> = (0..fft_size)
        .map(|i| 0.8 * (2.0 * PI * 1000.0 * i as f32 / sample_rate).sin())
        .collect();

    let fft = Fft::new(fft_size);
    let spectrum = fft.forward(&signal);
    let reconstructed = fft.inverse(&spectrum);

    for (a, b) in signal.iter().zip(reconstructed.iter()) {
        assert!((a - b).abs() < 0.02);
    }
}
