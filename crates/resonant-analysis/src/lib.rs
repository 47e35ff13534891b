//! Spectral analysis tooling used to assert on `resonant-core` output in
//! end-to-end tests: magnitude spectra, impulse response capture, transfer
//! function measurement, and spectral A/B comparison.
//!
//! - [`fft`] - FFT wrapper with windowing functions
//! - [`spectrum`] - Spectral analysis utilities
//! - [`ir`] - Impulse response capture via sine sweep
//! - [`transfer_fn`] - Transfer function measurement
//! - [`compare`] - A/B comparison tools
//!
//! ## Example
//!
//! ```rust,ignore
//! use resonant_analysis::{spectrum, fft::Window};
//!
//! // Find the dominant frequency bin of a rendered block.
//! let spectrum = spectrum::magnitude_spectrum(&rendered, 1024, Window::Hann);
//! ```

pub mod fft;
pub mod spectrum;
pub mod ir;
pub mod transfer_fn;
pub mod compare;

// Re-export main types
pub use fft::{Fft, Window};
pub use spectrum::{magnitude_spectrum, phase_spectrum, spectral_centroid};
pub use ir::SineSweep;
pub use transfer_fn::TransferFunction;
pub use compare::{spectral_correlation, spectral_difference};
