//! Constant-power amplitude panner over an arbitrary speaker layout.
//!
//! A layout is a set of `(angle, channel)` entries placed on a unit circle.
//! Panning a mono signal to a target azimuth finds the two speakers
//! adjacent to that azimuth and splits energy between them using the
//! standard `sin`/`cos` constant-power law, so `gain_a^2 + gain_b^2 == 1`
//! for any azimuth.

use core::f32::consts::PI;
use libm::{cosf, sinf};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// One speaker position: an angle in degrees and the output channel it maps to.
#[derive(Debug, Clone, Copy)]
pub struct AmplitudePannerEntry {
    /// Angle in degrees, measured the same way as [`AmplitudePanner::set_azimuth`].
    pub angle: f32,
    /// Output channel index this speaker writes to.
    pub channel: usize,
}

/// A standard speaker layout recognised by [`AmplitudePanner::set_standard_map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerLayout {
    /// Two speakers at -30 and 30 degrees.
    Stereo,
    /// Five speakers (no LFE) at -30, 30, 0, 110, -110 degrees.
    Surround51,
    /// Seven speakers (no LFE) at -30, 30, 0, 110, -110, 90, -90 degrees.
    Surround71,
}

impl SpeakerLayout {
    /// Number of output channels this layout addresses.
    pub fn channel_count(self) -> usize {
        match self {
            SpeakerLayout::Stereo => 2,
            SpeakerLayout::Surround51 => 5,
            SpeakerLayout::Surround71 => 7,
        }
    }

    fn entries(self) -> &'static [(f32, usize)] {
        match self {
            SpeakerLayout::Stereo => &[(-30.0, 0), (30.0, 1)],
            SpeakerLayout::Surround51 => &[(-30.0, 0), (30.0, 1), (0.0, 2), (110.0, 3), (-110.0, 4)],
            SpeakerLayout::Surround71 => &[
                (-30.0, 0),
                (30.0, 1),
                (0.0, 2),
                (110.0, 3),
                (-110.0, 4),
                (90.0, 5),
                (-90.0, 6),
            ],
        }
    }
}

/// An n-channel constant-power panner.
///
/// Azimuth is in degrees; 0 is straight ahead, positive angles rotate
/// clockwise (matching the `az_right = -az_left` mirrored-HRTF-dataset
/// convention used by [`crate::hrtf`]). Elevation is carried but unused by
/// amplitude panning itself — kept so a node can forward both properties
/// identically to the HRTF branch of a multipanner.
#[derive(Debug, Clone, Default)]
pub struct AmplitudePanner {
    entries: Vec<AmplitudePannerEntry>,
    azimuth: f32,
    elevation: f32,
}

impl AmplitudePanner {
    /// Creates an empty panner with no speakers configured.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            azimuth: 0.0,
            elevation: 0.0,
        }
    }

    /// Removes all speaker entries.
    pub fn clear_map(&mut self) {
        self.entries.clear();
    }

    /// Adds a speaker at `angle` degrees writing to output `channel`.
    pub fn add_entry(&mut self, angle: f32, channel: usize) {
        self.entries.push(AmplitudePannerEntry { angle, channel });
    }

    /// Replaces the current map with one of the standard layouts.
    pub fn set_standard_map(&mut self, layout: SpeakerLayout) {
        self.clear_map();
        for &(angle, channel) in layout.entries() {
            self.add_entry(angle, channel);
        }
    }

    /// Current azimuth in degrees.
    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    /// Sets the target azimuth in degrees.
    pub fn set_azimuth(&mut self, azimuth: f32) {
        self.azimuth = azimuth;
    }

    /// Current elevation in degrees.
    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    /// Sets the target elevation in degrees (unused by the gain law itself).
    pub fn set_elevation(&mut self, elevation: f32) {
        self.elevation = elevation;
    }

    /// Number of output channels addressed by the current map
    /// (one past the highest configured channel index).
    pub fn output_count(&self) -> usize {
        self.entries.iter().map(|e| e.channel + 1).max().unwrap_or(0)
    }

    /// Computes per-channel gains for the current azimuth into `out`.
    ///
    /// `out` must be at least [`output_count`](Self::output_count) long;
    /// entries beyond the two bracketing speakers are left untouched (the
    /// caller is expected to have zeroed `out` first).
    pub fn gains(&self, out: &mut [f32]) {
        let n = self.entries.len();
        if n == 0 {
            return;
        }
        if n == 1 {
            out[self.entries[0].channel] = 1.0;
            return;
        }

        let mut sorted: Vec<AmplitudePannerEntry> = self.entries.clone();
        sorted.sort_by(|a, b| a.angle.partial_cmp(&b.angle).unwrap());

        for k in 0..n {
            let a = sorted[k];
            let b = sorted[(k + 1) % n];
            let arc_start = a.angle;
            let arc_end = if k == n - 1 { b.angle + 360.0 } else { b.angle };

            let mut az = self.azimuth;
            while az < arc_start {
                az += 360.0;
            }
            while az >= arc_start + 360.0 {
                az -= 360.0;
            }

            if az >= arc_start && az < arc_end {
                let span = arc_end - arc_start;
                let frac = if span.abs() < 1e-9 { 0.0 } else { (az - arc_start) / span };
                let theta = frac * (PI / 2.0);
                out[a.channel] += cosf(theta);
                out[b.channel] += sinf(theta);
                return;
            }
        }
    }

    /// Pans a single input sample into the per-channel output slice.
    ///
    /// `outputs` must be at least [`output_count`](Self::output_count) long
    /// and is accumulated into (not overwritten), matching a multipanner's
    /// mix-into-bus usage.
    pub fn pan(&self, input: f32, outputs: &mut [f32]) {
        let n = self.output_count();
        if n == 0 {
            return;
        }
        let mut gains = Vec::with_capacity(n);
        gains.resize(n, 0.0);
        self.gains(&mut gains);
        for (out, gain) in outputs.iter_mut().zip(gains.iter()) {
            *out += input * gain;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_hard_left() {
        let mut panner = AmplitudePanner::new();
        panner.set_standard_map(SpeakerLayout::Stereo);
        panner.set_azimuth(-30.0);
        let mut gains = [0.0; 2];
        panner.gains(&mut gains);
        assert!((gains[0] - 1.0).abs() < 1e-6);
        assert!(gains[1].abs() < 1e-6);
    }

    #[test]
    fn test_stereo_hard_right() {
        let mut panner = AmplitudePanner::new();
        panner.set_standard_map(SpeakerLayout::Stereo);
        panner.set_azimuth(30.0);
        let mut gains = [0.0; 2];
        panner.gains(&mut gains);
        assert!(gains[0].abs() < 1e-6);
        assert!((gains[1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_center() {
        let mut panner = AmplitudePanner::new();
        panner.set_standard_map(SpeakerLayout::Stereo);
        panner.set_azimuth(0.0);
        let mut gains = [0.0; 2];
        panner.gains(&mut gains);
        let expected = core::f32::consts::FRAC_1_SQRT_2;
        assert!((gains[0] - expected).abs() < 1e-5);
        assert!((gains[1] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_energy_conserved_across_full_sweep() {
        let mut panner = AmplitudePanner::new();
        panner.set_standard_map(SpeakerLayout::Surround51);
        let mut az = -180.0;
        while az < 180.0 {
            panner.set_azimuth(az);
            let mut gains = [0.0; 5];
            panner.gains(&mut gains);
            let energy: f32 = gains.iter().map(|g| g * g).sum();
            assert!((energy - 1.0).abs() < 1e-5, "azimuth {az}: energy {energy}");
            az += 1.0;
        }
    }
}
