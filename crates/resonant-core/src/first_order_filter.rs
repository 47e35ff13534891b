//! Single zero/pole first-order filter.
//!
//! Unlike [`OnePole`](crate::OnePole), which is hard-wired to a lowpass
//! response, this primitive exposes the zero and pole positions directly so
//! that the same structure can be driven as a lowpass, highpass, or allpass
//! by picking canonical positions for a target corner frequency, or swept
//! at a-rate by a reading node.
//!
//! Difference equation (direct form):
//!
//! ```text
//! y[n] = gain * (x[n] - zero * x[n-1]) + pole * y[n-1]
//! ```

use core::f32::consts::PI;
use libm::{expf, tanf};

/// A first-order filter parameterised by a single real zero and pole.
#[derive(Debug, Clone)]
pub struct FirstOrderFilter {
    zero: f32,
    pole: f32,
    gain: f32,
    x1: f32,
    y1: f32,
    sample_rate: f32,
}

impl FirstOrderFilter {
    /// Creates a passthrough filter (zero at 0, pole at 0, unity gain).
    pub fn new(sample_rate: f32) -> Self {
        Self {
            zero: 0.0,
            pole: 0.0,
            gain: 1.0,
            x1: 0.0,
            y1: 0.0,
            sample_rate,
        }
    }

    /// Current zero position.
    pub fn zero_position(&self) -> f32 {
        self.zero
    }

    /// Current pole position.
    pub fn pole_position(&self) -> f32 {
        self.pole
    }

    /// Sets the zero position. When `renormalize` is true, immediately
    /// recomputes the gain; a-rate callers that set both zero and pole
    /// per sample pass `false` here and call [`normalize`](Self::normalize)
    /// once afterward.
    pub fn set_zero_position(&mut self, zero: f32, renormalize: bool) {
        self.zero = zero;
        if renormalize {
            self.normalize();
        }
    }

    /// Sets the pole position. See [`set_zero_position`](Self::set_zero_position).
    pub fn set_pole_position(&mut self, pole: f32, renormalize: bool) {
        self.pole = pole;
        if renormalize {
            self.normalize();
        }
    }

    /// Recomputes `gain` so the filter has unity magnitude response at DC,
    /// unless the zero sits exactly at DC (numerator vanishes there), in
    /// which case it normalizes at Nyquist instead — the only frequency a
    /// highpass-shaped zero/pole pair can sensibly pin to 1.0.
    pub fn normalize(&mut self) {
        let dc_num = 1.0 - self.zero;
        if dc_num.abs() > 1e-6 {
            let dc_den = 1.0 - self.pole;
            self.gain = dc_den / dc_num;
        } else {
            let nyquist_num = 1.0 + self.zero;
            let nyquist_den = 1.0 + self.pole;
            self.gain = if nyquist_num.abs() > 1e-6 {
                nyquist_den / nyquist_num
            } else {
                1.0
            };
        }
    }

    /// Processes a single sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let output = self.gain * (input - self.zero * self.x1) + self.pole * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }

    /// Clears the filter's history, leaving zero/pole/gain unchanged.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }

    /// Configures a one-pole lowpass at `freq_hz` (no zero, classic 6dB/oct).
    pub fn configure_lowpass(&mut self, freq_hz: f32) {
        self.pole = expf(-2.0 * PI * freq_hz / self.sample_rate);
        self.zero = 0.0;
        self.normalize();
    }

    /// Configures a DC-blocking highpass at `freq_hz` (zero pinned to DC).
    pub fn configure_highpass(&mut self, freq_hz: f32) {
        self.pole = expf(-2.0 * PI * freq_hz / self.sample_rate);
        self.zero = 1.0;
        self.normalize();
    }

    /// Configures a first-order allpass with corner frequency `freq_hz`,
    /// using the standard bilinear-transform coefficient `a`. Zero and pole
    /// are reciprocal-reflected (`zero = 1/pole`) to keep unity magnitude
    /// at every frequency.
    pub fn configure_allpass(&mut self, freq_hz: f32) {
        let tan_val = tanf(PI * freq_hz / self.sample_rate);
        let a = (tan_val - 1.0) / (tan_val + 1.0);
        self.pole = a;
        self.zero = if a.abs() > 1e-9 { 1.0 / a } else { 0.0 };
        self.gain = 1.0;
    }
}
