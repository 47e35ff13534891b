//! A minimal sine signal-source node, wrapping
//! [`resonant_core::Oscillator`].
//!
//! Not part of the original distilled spec; supplemented so the graph has
//! at least one node that produces signal rather than only transforming
//! it, exposing the phase accumulator as a standalone generator.

use resonant_core::node::{Node, ProcessContext};
use resonant_core::oscillator::Oscillator;
use resonant_core::property::{BlockValues, Property, PropertyMap, PropertyValue};
use resonant_core::server::FIRST_USER_PROPERTY_SLOT;

pub const SLOT_FREQUENCY: u32 = FIRST_USER_PROPERTY_SLOT;

/// A single-output sine generator, frequency controlled by a property.
pub struct SineOscillatorNode {
    oscillator: Oscillator,
    last_frequency: f32,
}

impl SineOscillatorNode {
    /// Creates an oscillator at `frequency_hz`, ticking at `sample_rate`.
    pub fn new(sample_rate: f32, frequency_hz: f32) -> Self {
        Self { oscillator: Oscillator::new(sample_rate, frequency_hz), last_frequency: frequency_hz }
    }
}

impl Node for SineOscillatorNode {
    fn output_count(&self) -> usize {
        1
    }

    fn input_count(&self) -> usize {
        0
    }

    fn install_properties(&self, properties: &mut PropertyMap) {
        properties.insert(SLOT_FREQUENCY, Property::with_range(PropertyValue::Float(self.last_frequency), 0.0, 22050.0));
    }

    fn process(&mut self, _inputs: &[&[f32]], outputs: &mut [Vec<f32>], properties: &mut PropertyMap, ctx: &ProcessContext) {
        let now = ctx.tick as f64 * ctx.block_size as f64 / f64::from(ctx.sample_rate);
        let sample_rate = f64::from(ctx.sample_rate);
        let property = properties.get(SLOT_FREQUENCY);
        let a_rate = property.map(|p| p.is_automating(now, ctx.block_size, sample_rate)).unwrap_or(false);
        let block = property.map(|p| p.read_block(now, ctx.block_size, sample_rate, a_rate));

        match block {
            // A sweeping frequency (vibrato, glide) retunes the phase
            // accumulator every sample instead of once for the whole block.
            Some(BlockValues::ARate(values)) => {
                for (out, &v) in outputs[0][..ctx.block_size].iter_mut().zip(values.iter()) {
                    self.oscillator.set_frequency(v as f32);
                    *out = self.oscillator.process();
                }
                self.last_frequency = values.last().copied().unwrap_or(self.last_frequency as f64) as f32;
            }
            Some(BlockValues::KRate(v)) => {
                let frequency = v as f32;
                if (frequency - self.last_frequency).abs() > 1e-6 {
                    self.oscillator.set_frequency(frequency);
                    self.last_frequency = frequency;
                }
                self.oscillator.process_block(&mut outputs[0][..ctx.block_size]);
            }
            None => self.oscillator.process_block(&mut outputs[0][..ctx.block_size]),
        }
    }

    fn reset(&mut self) {
        self.oscillator.reset_phase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_produces_nonzero_signal() {
        let mut node = SineOscillatorNode::new(44100.0, 1000.0);
        let mut properties = PropertyMap::new();
        node.install_properties(&mut properties);
        let mut outputs = vec![vec![0.0; 256]];
        let ctx = ProcessContext { tick: 1, sample_rate: 44100.0, block_size: 256 };
        node.process(&[], &mut outputs, &mut properties, &ctx);
        assert!(outputs[0].iter().any(|&s| s.abs() > 0.1));
    }

    #[test]
    fn test_frequency_ramp_retunes_within_one_block() {
        use resonant_core::automation::LinearRamp;

        let mut node = SineOscillatorNode::new(44100.0, 100.0);
        let mut properties = PropertyMap::new();
        node.install_properties(&mut properties);
        properties.get_mut(SLOT_FREQUENCY).unwrap().schedule(Box::new(LinearRamp::new(1.0, 400.0)), 0.0, 0.0);

        let mut outputs = vec![vec![0.0; 512]];
        let ctx = ProcessContext { tick: 1, sample_rate: 44100.0, block_size: 512 };
        node.process(&[], &mut outputs, &mut properties, &ctx);

        assert!(outputs[0].iter().all(|s| s.is_finite() && (-1.0..=1.0).contains(s)));
        assert!(node.last_frequency > 100.0, "frequency should have advanced toward the ramp target: {}", node.last_frequency);
    }
}
