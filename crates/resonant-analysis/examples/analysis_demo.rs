//! Analysis demo: FFT spectrum, sweep-driven transfer function, and spectral
//! comparison.
//!
//! Run with: cargo run -p resonant-analysis --example analysis_demo

use resonant_analysis::spectrum::{find_peaks, magnitude_spectrum, spectral_centroid};
use resonant_analysis::{spectral_correlation, Fft, SineSweep, TransferFunction, Window};
use std::f32::consts::PI;

fn main() {
    let sample_rate = 48000.0;

    println!("=== FFT Spectrum of a 1 kHz Sine Wave ===\n");

    let freq = 1000.0;
    let fft_size = 4096;
    let signal: Vec<f32> = (0..fft_size)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
        .collect();

    let fft = Fft::new(fft_size);
    let mut windowed = signal.clone();
    Window::Hann.apply(&mut windowed);
    let spectrum = fft.forward(&windowed);

    let magnitudes: Vec<f32> = spectrum.iter().map(|c| c.norm()).collect();
    let peak_bin = magnitudes
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
        .map(|(i, _)| i)
        .unwrap();
    let peak_freq = peak_bin as f32 * sample_rate / fft_size as f32;

    println!("Input: {freq} Hz sine wave, {fft_size} samples, Hann window");
    println!("Peak bin: {peak_bin} (frequency: {peak_freq:.1} Hz, magnitude {:.2})", magnitudes[peak_bin]);

    println!("\n=== Magnitude Spectrum + Peak Picking ===\n");

    let mag = magnitude_spectrum(&signal, fft_size, Window::Hann);
    let centroid = spectral_centroid(&mag, sample_rate);
    println!("Spectral centroid: {centroid:.1} Hz (expected ~{freq} Hz for a pure tone)");

    let peaks = find_peaks(&mag, sample_rate, -40.0, 100.0);
    println!("Peaks above -40 dB, >=100 Hz apart:");
    for (peak_hz, peak_db) in &peaks {
        println!("  {peak_hz:>8.1} Hz  {peak_db:>6.1} dB");
    }

    println!("\n=== Sweep-Driven Transfer Function of an Identity System ===\n");

    let sweep = SineSweep::new(sample_rate, 100.0, 16000.0, 1.0);
    let stimulus = sweep.generate();
    let response = stimulus.clone(); // identity system: output == input

    let tf = TransferFunction::measure(&stimulus, &response, sample_rate, 2048, 0.5);
    let avg_mag: f32 = tf.magnitude_db.iter().sum::<f32>() / tf.magnitude_db.len() as f32;
    println!("Average magnitude across {} bins: {avg_mag:.2} dB (expect ~0 dB)", tf.magnitude_db.len());

    if let Some(cutoff) = tf.cutoff_frequency(avg_mag) {
        println!("-3dB point relative to average: {cutoff:.1} Hz");
    }

    println!("\n=== Spectral Correlation Between Two Tones ===\n");

    let tone_a: Vec<f32> = (0..2048).map(|i| (2.0 * PI * 440.0 * i as f32 / sample_rate).sin()).collect();
    let tone_b: Vec<f32> = (0..2048).map(|i| (2.0 * PI * 445.0 * i as f32 / sample_rate).sin()).collect();

    println!("440 Hz vs 440 Hz: correlation = {:.4}", spectral_correlation(&tone_a, &tone_a, 2048));
    println!("440 Hz vs 445 Hz: correlation = {:.4}", spectral_correlation(&tone_a, &tone_b, 2048));

    println!("\nAnalysis demo complete.");
}
