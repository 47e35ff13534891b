//! Crossfading delay node: a graph-level wrapper around
//! [`resonant_core::CrossfadingDelayLine`], one line per channel.
//!
//! Grounded on `original_source/crossfading_delay.cpp`'s delay-time
//! property pair (`delay`, `interpolation_time`); `set_delay` is only
//! called when either changes, so a steady delay time never restarts a
//! crossfade it already finished.

use resonant_core::delay::CrossfadingDelayLine;
use resonant_core::node::{Node, ProcessContext};
use resonant_core::property::{BlockValues, Property, PropertyMap, PropertyValue};
use resonant_core::server::FIRST_USER_PROPERTY_SLOT;

pub const SLOT_DELAY: u32 = FIRST_USER_PROPERTY_SLOT;
pub const SLOT_INTERPOLATION_TIME: u32 = SLOT_DELAY + 1;

/// A multi-channel delay with click-free delay-time changes.
pub struct CrossfadingDelayNode {
    lines: Vec<CrossfadingDelayLine>,
    sample_rate: f32,
    max_delay_seconds: f32,
    last_delay: f32,
    last_interpolation_time: f32,
}

impl CrossfadingDelayNode {
    /// Creates a delay for `channels` channels, each able to hold up to
    /// `max_delay_seconds` of delay at `sample_rate`.
    pub fn new(channels: usize, sample_rate: f32, max_delay_seconds: f32) -> Self {
        Self {
            lines: (0..channels.max(1)).map(|_| CrossfadingDelayLine::new(sample_rate, max_delay_seconds)).collect(),
            sample_rate,
            max_delay_seconds,
            last_delay: f32::NAN,
            last_interpolation_time: f32::NAN,
        }
    }

    /// Reads a control value for this block. `set_delay` only fires once
    /// per block on a change, so an in-progress ramp is sampled at the end
    /// of the block rather than interpolated within it.
    fn read_f32(properties: &PropertyMap, slot: u32, now: f64, block_size: usize, sample_rate: f64, default: f32) -> f32 {
        let Some(property) = properties.get(slot) else { return default };
        let a_rate = property.is_automating(now, block_size, sample_rate);
        match property.read_block(now, block_size, sample_rate, a_rate) {
            BlockValues::KRate(v) => v as f32,
            BlockValues::ARate(values) => values.last().copied().unwrap_or(default as f64) as f32,
        }
    }
}

impl Node for CrossfadingDelayNode {
    fn output_count(&self) -> usize {
        self.lines.len()
    }

    fn input_count(&self) -> usize {
        self.lines.len()
    }

    fn install_properties(&self, properties: &mut PropertyMap) {
        properties.insert(SLOT_DELAY, Property::with_range(PropertyValue::Float(0.0), 0.0, f64::from(self.max_delay_seconds)));
        properties.insert(SLOT_INTERPOLATION_TIME, Property::with_range(PropertyValue::Float(0.0), 0.0, 10.0));
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], properties: &mut PropertyMap, ctx: &ProcessContext) {
        let now = ctx.tick as f64 * ctx.block_size as f64 / f64::from(ctx.sample_rate);
        let sample_rate = f64::from(ctx.sample_rate);

        let delay = Self::read_f32(properties, SLOT_DELAY, now, ctx.block_size, sample_rate, self.last_delay.max(0.0));
        let interpolation_time = Self::read_f32(properties, SLOT_INTERPOLATION_TIME, now, ctx.block_size, sample_rate, 0.0);

        if (delay - self.last_delay).abs() > 1e-9 || (interpolation_time - self.last_interpolation_time).abs() > 1e-9 {
            for line in &mut self.lines {
                line.set_delay(delay, interpolation_time);
            }
            self.last_delay = delay;
            self.last_interpolation_time = interpolation_time;
        }

        for (c, line) in self.lines.iter_mut().enumerate() {
            let input = inputs.get(c).copied().unwrap_or(&[]);
            for s in 0..ctx.block_size {
                let x = input.get(s).copied().unwrap_or(0.0);
                outputs[c][s] = line.process(x);
            }
        }
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        let _ = self.sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(block_size: usize) -> ProcessContext {
        ProcessContext { tick: 1, sample_rate: 44100.0, block_size }
    }

    #[test]
    fn test_impulse_reappears_at_delay_samples() {
        let mut node = CrossfadingDelayNode::new(1, 44100.0, 1.0);
        let mut properties = PropertyMap::new();
        node.install_properties(&mut properties);
        properties.get_mut(SLOT_DELAY).unwrap().set(PropertyValue::Float(0.01)).unwrap();
        properties.get_mut(SLOT_INTERPOLATION_TIME).unwrap().set(PropertyValue::Float(0.0)).unwrap();

        let block_size = 1024;
        let mut input = vec![0.0f32; block_size];
        input[0] = 1.0;
        let inputs: [&[f32]; 1] = [&input];
        let mut outputs = vec![vec![0.0; block_size]];
        node.process(&inputs, &mut outputs, &mut properties, &ctx(block_size));

        let first_nonzero = outputs[0].iter().position(|&s| s.abs() > 1e-6).unwrap();
        assert_eq!(first_nonzero, 441);
        assert!((outputs[0][441] - 1.0).abs() < 1e-6);
    }
}
