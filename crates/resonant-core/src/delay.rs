//! Delay line implementations
//!
//! Circular buffer-based delay lines with various interpolation methods.
//! Essential for delay effects, reverbs, chorus, flangers, and more.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

use alloc::vec;
use alloc::vec::Vec;

/// Interpolation method for fractional delay
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// No interpolation (truncate to nearest sample)
    None,
    /// Linear interpolation between two samples
    #[default]
    Linear,
    /// Cubic interpolation (4-point, smoother)
    Cubic,
}

/// Interpolated delay line using a circular buffer (heap-allocated).
///
/// Supports fractional delay times through linear interpolation,
/// allowing smooth modulation of delay time without artifacts.
///
/// # Memory
///
/// The buffer is heap-allocated during construction but never reallocates.
/// No allocations occur during audio processing.
///
/// # Example
///
/// ```rust
/// use resonant_core::InterpolatedDelay;
///
/// // 50ms max delay at 44.1kHz
/// let max_delay_samples = (0.05 * 44100.0) as usize;
/// let mut delay = InterpolatedDelay::new(max_delay_samples);
///
/// // Read with 10.5 sample delay (fractional)
/// let output = delay.read(10.5);
/// delay.write(1.0);
/// ```
#[derive(Debug, Clone)]
pub struct InterpolatedDelay {
    /// Circular buffer storage
    buffer: Vec<f32>,
    /// Write position in buffer
    write_pos: usize,
}

impl InterpolatedDelay {
    /// Creates a new delay line with the given maximum delay in samples.
    ///
    /// # Arguments
    ///
    /// * `max_delay_samples` - Maximum delay capacity in samples
    ///
    /// # Panics
    ///
    /// Panics if `max_delay_samples` is 0.
    pub fn new(max_delay_samples: usize) -> Self {
        assert!(max_delay_samples > 0, "Delay size must be > 0");

        Self {
            buffer: vec![0.0; max_delay_samples],
            write_pos: 0,
        }
    }

    /// Creates a delay line from sample rate and max delay time in seconds.
    pub fn from_time(sample_rate: f32, max_seconds: f32) -> Self {
        let max_samples = (sample_rate * max_seconds) as usize + 1;
        Self::new(max_samples)
    }

    /// Reads a delayed sample with linear interpolation.
    ///
    /// # Arguments
    ///
    /// * `delay_samples` - Delay time in samples (can be fractional)
    ///
    /// Returns the interpolated sample from the delay line.
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        debug_assert!(delay_samples >= 0.0);

        let buffer_len = self.buffer.len();
        let delay_clamped = delay_samples.min((buffer_len - 1) as f32);

        // Calculate read position (going backwards from last written sample)
        let delay_int = delay_clamped as usize;
        let delay_frac = delay_clamped - delay_int as f32;

        // Calculate position of last written sample
        let last_written = if self.write_pos == 0 {
            buffer_len - 1
        } else {
            self.write_pos - 1
        };

        // Read position (going back from last written)
        let read_pos = if last_written >= delay_int {
            last_written - delay_int
        } else {
            buffer_len + last_written - delay_int
        };

        // Next sample position for interpolation (one sample further back)
        let next_pos = if read_pos == 0 {
            buffer_len - 1
        } else {
            read_pos - 1
        };

        // Linear interpolation: y = y0 + (y1 - y0) * frac
        let sample0 = self.buffer[read_pos];
        let sample1 = self.buffer[next_pos];

        sample0 + (sample1 - sample0) * delay_frac
    }

    /// Writes a sample to the delay line and advances the write position.
    ///
    /// # Arguments
    ///
    /// * `sample` - The sample to write
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    /// Combined read and write operation.
    #[inline]
    pub fn read_write(&mut self, sample: f32, delay_samples: f32) -> f32 {
        let output = self.read(delay_samples);
        self.write(sample);
        output
    }

    /// Clears the delay line (sets all samples to 0).
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Returns the maximum delay capacity in samples.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

/// Fixed-size delay line for embedded systems (no heap allocation).
///
/// Uses const generics for compile-time size specification.
///
/// # Example
///
/// ```rust
/// use resonant_core::FixedDelayLine;
///
/// // Create a delay line with max 4096 samples
/// let mut delay: FixedDelayLine<4096> = FixedDelayLine::new();
///
/// // Write and read with 100 sample delay
/// delay.write(1.0);
/// let output = delay.read(100.0);
/// ```
pub struct FixedDelayLine<const N: usize> {
    buffer: [f32; N],
    write_pos: usize,
    interpolation: Interpolation,
}

impl<const N: usize> FixedDelayLine<N> {
    /// Create a new fixed-size delay line
    pub fn new() -> Self {
        Self {
            buffer: [0.0; N],
            write_pos: 0,
            interpolation: Interpolation::Linear,
        }
    }

    /// Set interpolation method
    pub fn set_interpolation(&mut self, interp: Interpolation) {
        self.interpolation = interp;
    }

    /// Get the maximum delay in samples
    pub const fn max_delay(&self) -> usize {
        N - 1
    }

    /// Write a sample to the delay line
    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % N;
    }

    /// Read from the delay line with fractional delay
    #[inline]
    pub fn read(&self, delay_samples: f32) -> f32 {
        let delay_int = (delay_samples as usize).min(N - 1);
        let frac = delay_samples - delay_int as f32;

        let read_pos = (self.write_pos + N - delay_int - 1) % N;

        match self.interpolation {
            Interpolation::None => self.buffer[read_pos],

            Interpolation::Linear => {
                let next_pos = (read_pos + N - 1) % N;
                let a = self.buffer[read_pos];
                let b = self.buffer[next_pos];
                a + (b - a) * frac
            }

            Interpolation::Cubic => {
                // 4-point cubic interpolation
                let p0 = (read_pos + 1) % N;
                let p1 = read_pos;
                let p2 = (read_pos + N - 1) % N;
                let p3 = (read_pos + N - 2) % N;

                let y0 = self.buffer[p0];
                let y1 = self.buffer[p1];
                let y2 = self.buffer[p2];
                let y3 = self.buffer[p3];

                let t = frac;
                let t2 = t * t;
                let t3 = t2 * t;

                let a0 = y3 - y2 - y0 + y1;
                let a1 = y0 - y1 - a0;
                let a2 = y2 - y0;
                let a3 = y1;

                a0 * t3 + a1 * t2 + a2 * t + a3
            }
        }
    }

    /// Combined read and write operation
    #[inline]
    pub fn read_write(&mut self, sample: f32, delay_samples: f32) -> f32 {
        let output = self.read(delay_samples);
        self.write(sample);
        output
    }

    /// Clear the delay line
    pub fn clear(&mut self) {
        self.buffer = [0.0; N];
        self.write_pos = 0;
    }
}

impl<const N: usize> Default for FixedDelayLine<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// A delay line whose delay time can change smoothly without clicks.
///
/// Changing the target delay begins a linear crossfade from the old read
/// position to the new one over `interpolation_time` seconds; both
/// positions are read (each with linear interpolation in time) and mixed
/// by a linear envelope for the duration of the fade.
#[derive(Debug, Clone)]
pub struct CrossfadingDelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
    from_delay: f32,
    to_delay: f32,
    fade_pos: f32,
    fade_len: f32,
}

impl CrossfadingDelayLine {
    /// Creates a crossfading delay line with the given max delay in seconds.
    pub fn new(sample_rate: f32, max_delay_seconds: f32) -> Self {
        let capacity = (sample_rate * max_delay_seconds).ceil() as usize + 1;
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
            sample_rate,
            from_delay: 0.0,
            to_delay: 0.0,
            fade_pos: 1.0,
            fade_len: 0.0,
        }
    }

    /// Sets the target delay time (seconds) and the crossfade duration
    /// (seconds) over which to reach it. A zero `interpolation_time`
    /// jumps immediately, as required for the delay-identity scenario.
    pub fn set_delay(&mut self, delay_seconds: f32, interpolation_time: f32) {
        let max_delay = (self.buffer.len() - 1) as f32 / self.sample_rate;
        let target = delay_seconds.clamp(0.0, max_delay);
        if interpolation_time <= 0.0 {
            self.from_delay = target;
            self.to_delay = target;
            self.fade_pos = 1.0;
            self.fade_len = 0.0;
            return;
        }
        self.from_delay = self.current_delay();
        self.to_delay = target;
        self.fade_pos = 0.0;
        self.fade_len = (interpolation_time * self.sample_rate).max(1.0);
    }

    /// Current effective delay, blended across an in-progress crossfade.
    pub fn current_delay(&self) -> f32 {
        if self.fade_pos >= 1.0 {
            self.to_delay
        } else {
            self.from_delay + (self.to_delay - self.from_delay) * self.fade_pos
        }
    }

    fn read_at(&self, delay_samples: f32) -> f32 {
        let buffer_len = self.buffer.len();
        let delay_clamped = delay_samples.min((buffer_len - 1) as f32).max(0.0);
        let delay_int = delay_clamped as usize;
        let delay_frac = delay_clamped - delay_int as f32;

        let last_written = if self.write_pos == 0 {
            buffer_len - 1
        } else {
            self.write_pos - 1
        };
        let read_pos = if last_written >= delay_int {
            last_written - delay_int
        } else {
            buffer_len + last_written - delay_int
        };
        let next_pos = if read_pos == 0 {
            buffer_len - 1
        } else {
            read_pos - 1
        };

        let sample0 = self.buffer[read_pos];
        let sample1 = self.buffer[next_pos];
        sample0 + (sample1 - sample0) * delay_frac
    }

    /// Writes a sample and returns the delayed, crossfaded output.
    ///
    /// Write happens before read, so a delay of `d` samples yields the
    /// sample written `d` calls ago on this same call (not `d + 1`).
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        if self.fade_pos >= 1.0 {
            self.read_at(self.to_delay * self.sample_rate)
        } else {
            let a = self.read_at(self.from_delay * self.sample_rate);
            let b = self.read_at(self.to_delay * self.sample_rate);
            let mix = a + (b - a) * self.fade_pos;
            self.fade_pos = (self.fade_pos + 1.0 / self.fade_len).min(1.0);
            mix
        }
    }

    /// Clears the delay buffer and resets the fade state.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.fade_pos = 1.0;
    }
}
