//! Three-band EQ: a per-channel low shelf (as a flat gain), mid-band peak,
//! and high shelf in series.
//!
//! Grounded on `original_source/three_band_eq.cpp`'s `ThreeBandEqNode`,
//! which ties a plain linear `lowband_gain` multiply to a cascade of two
//! double-precision IIR filters (`shelf.tick` then `peak.tick`) per
//! channel — the comment there ("We can't use floats. There's some
//! instability...") is why this node uses [`resonant_core::BiquadDouble`]
//! rather than the single-precision [`resonant_core::Biquad`].

use resonant_core::biquad::{high_shelf_coefficients_f64, peaking_eq_coefficients_f64, BiquadDouble};
use resonant_core::node::{Node, ProcessContext};
use resonant_core::property::{BlockValues, Property, PropertyMap, PropertyValue};
use resonant_core::server::FIRST_USER_PROPERTY_SLOT;

pub const SLOT_LOWBAND_GAIN: u32 = FIRST_USER_PROPERTY_SLOT;
pub const SLOT_MIDBAND_FREQUENCY: u32 = SLOT_LOWBAND_GAIN + 1;
pub const SLOT_MIDBAND_DBGAIN: u32 = SLOT_LOWBAND_GAIN + 2;
pub const SLOT_MIDBAND_Q: u32 = SLOT_LOWBAND_GAIN + 3;
pub const SLOT_HIGHBAND_FREQUENCY: u32 = SLOT_LOWBAND_GAIN + 4;
pub const SLOT_HIGHBAND_DBGAIN: u32 = SLOT_LOWBAND_GAIN + 5;

struct ChannelState {
    shelf: BiquadDouble,
    peak: BiquadDouble,
}

impl ChannelState {
    fn new() -> Self {
        Self { shelf: BiquadDouble::new(), peak: BiquadDouble::new() }
    }
}

/// A per-channel low-gain / mid-peak / high-shelf EQ.
pub struct ThreeBandEqNode {
    channels: Vec<ChannelState>,
    last_midband_frequency: f64,
    last_midband_dbgain: f64,
    last_midband_q: f64,
    last_highband_frequency: f64,
    last_highband_dbgain: f64,
}

impl ThreeBandEqNode {
    /// Creates a flat EQ for `channels` channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels: (0..channels.max(1)).map(|_| ChannelState::new()).collect(),
            last_midband_frequency: f64::NAN,
            last_midband_dbgain: f64::NAN,
            last_midband_q: f64::NAN,
            last_highband_frequency: f64::NAN,
            last_highband_dbgain: f64::NAN,
        }
    }

    /// Reads a control value for this block. The coefficient-driving
    /// controls here only need the value current as of the block boundary
    /// (coefficients are recomputed once per block, not once per sample),
    /// so an in-progress ramp is sampled at the end of the block.
    fn read_f64(properties: &PropertyMap, slot: u32, now: f64, block_size: usize, sample_rate: f64, default: f64) -> f64 {
        let Some(property) = properties.get(slot) else { return default };
        let a_rate = property.is_automating(now, block_size, sample_rate);
        match property.read_block(now, block_size, sample_rate, a_rate) {
            BlockValues::KRate(v) => v,
            BlockValues::ARate(values) => values.last().copied().unwrap_or(default),
        }
    }
}

impl Node for ThreeBandEqNode {
    fn output_count(&self) -> usize {
        self.channels.len()
    }

    fn input_count(&self) -> usize {
        self.channels.len()
    }

    fn install_properties(&self, properties: &mut PropertyMap) {
        properties.insert(SLOT_LOWBAND_GAIN, Property::with_range(PropertyValue::Double(1.0), 0.0, 16.0));
        properties.insert(SLOT_MIDBAND_FREQUENCY, Property::with_range(PropertyValue::Double(1000.0), 10.0, 22050.0));
        properties.insert(SLOT_MIDBAND_DBGAIN, Property::with_range(PropertyValue::Double(0.0), -24.0, 24.0));
        properties.insert(SLOT_MIDBAND_Q, Property::with_range(PropertyValue::Double(0.707), 0.1, 24.0));
        properties.insert(SLOT_HIGHBAND_FREQUENCY, Property::with_range(PropertyValue::Double(8000.0), 10.0, 22050.0));
        properties.insert(SLOT_HIGHBAND_DBGAIN, Property::with_range(PropertyValue::Double(0.0), -24.0, 24.0));
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], properties: &mut PropertyMap, ctx: &ProcessContext) {
        let now = ctx.tick as f64 * ctx.block_size as f64 / f64::from(ctx.sample_rate);
        let sample_rate = f64::from(ctx.sample_rate);

        let lowband_gain = Self::read_f64(properties, SLOT_LOWBAND_GAIN, now, ctx.block_size, sample_rate, 1.0);
        let midband_frequency = Self::read_f64(properties, SLOT_MIDBAND_FREQUENCY, now, ctx.block_size, sample_rate, 1000.0);
        let midband_dbgain = Self::read_f64(properties, SLOT_MIDBAND_DBGAIN, now, ctx.block_size, sample_rate, 0.0);
        let midband_q = Self::read_f64(properties, SLOT_MIDBAND_Q, now, ctx.block_size, sample_rate, 0.707);
        let highband_frequency = Self::read_f64(properties, SLOT_HIGHBAND_FREQUENCY, now, ctx.block_size, sample_rate, 8000.0);
        let highband_dbgain = Self::read_f64(properties, SLOT_HIGHBAND_DBGAIN, now, ctx.block_size, sample_rate, 0.0);

        let changed = (midband_frequency - self.last_midband_frequency).abs() > 1e-9
            || (midband_dbgain - self.last_midband_dbgain).abs() > 1e-9
            || (midband_q - self.last_midband_q).abs() > 1e-9
            || (highband_frequency - self.last_highband_frequency).abs() > 1e-9
            || (highband_dbgain - self.last_highband_dbgain).abs() > 1e-9;

        if changed {
            let peak_c = peaking_eq_coefficients_f64(midband_frequency, midband_q, midband_dbgain, sample_rate);
            let shelf_c = high_shelf_coefficients_f64(highband_frequency, 1.0, highband_dbgain, sample_rate);
            for ch in &mut self.channels {
                ch.peak.set_coefficients(peak_c.0, peak_c.1, peak_c.2, peak_c.3, peak_c.4, peak_c.5);
                ch.shelf.set_coefficients(shelf_c.0, shelf_c.1, shelf_c.2, shelf_c.3, shelf_c.4, shelf_c.5);
            }
            self.last_midband_frequency = midband_frequency;
            self.last_midband_dbgain = midband_dbgain;
            self.last_midband_q = midband_q;
            self.last_highband_frequency = highband_frequency;
            self.last_highband_dbgain = highband_dbgain;
        }

        for (c, ch) in self.channels.iter_mut().enumerate() {
            let input = inputs.get(c).copied().unwrap_or(&[]);
            for s in 0..ctx.block_size {
                let x = f64::from(input.get(s).copied().unwrap_or(0.0)) * lowband_gain;
                outputs[c][s] = ch.peak.process(ch.shelf.process(x)) as f32;
            }
        }
    }

    fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.shelf.clear();
            ch.peak.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(block_size: usize) -> ProcessContext {
        ProcessContext { tick: 1, sample_rate: 44100.0, block_size }
    }

    #[test]
    fn test_flat_eq_passes_through_unchanged() {
        let mut node = ThreeBandEqNode::new(1);
        let mut properties = PropertyMap::new();
        node.install_properties(&mut properties);

        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.13).sin()).collect();
        let inputs: [&[f32]; 1] = [&input];
        let mut outputs = vec![vec![0.0; 64]];
        node.process(&inputs, &mut outputs, &mut properties, &ctx(64));

        for (x, y) in input.iter().zip(outputs[0].iter()) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }
    }

    #[test]
    fn test_midband_boost_increases_energy_near_center() {
        let mut node = ThreeBandEqNode::new(1);
        let mut properties = PropertyMap::new();
        node.install_properties(&mut properties);
        properties.get_mut(SLOT_MIDBAND_DBGAIN).unwrap().set(PropertyValue::Double(12.0)).unwrap();

        let block_size = 512;
        let input: Vec<f32> = (0..block_size)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 44100.0).sin())
            .collect();
        let inputs: [&[f32]; 1] = [&input];
        let mut outputs = vec![vec![0.0; block_size]];
        node.process(&inputs, &mut outputs, &mut properties, &ctx(block_size));

        let in_energy: f32 = input.iter().map(|x| x * x).sum();
        let out_energy: f32 = outputs[0].iter().map(|x| x * x).sum();
        assert!(out_energy > in_energy);
    }
}
