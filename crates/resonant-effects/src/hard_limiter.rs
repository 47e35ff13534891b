//! Hard limiter: a per-channel brickwall clip to `[-1.0, 1.0]`.
//!
//! Grounded on `original_source/hard_limiter.cpp`'s `LavHardLimiterNode`,
//! which does exactly this and nothing more — no lookahead, no smoothed
//! release. A gentler, lookahead limiter belongs to a different node type;
//! this one is the simplest possible guarantee that output never exceeds
//! full scale, which is what end-to-end scenario 1 exercises.

use resonant_core::node::{Node, ProcessContext};
use resonant_core::property::PropertyMap;

/// Clips every output sample to `[-1.0, 1.0]`, channel by channel.
pub struct HardLimiterNode {
    channels: usize,
}

impl HardLimiterNode {
    /// Creates a limiter with one input slot and `channels` outputs, one
    /// input/output pair per channel the same way the original node ties
    /// its input and output connection counts together.
    pub fn new(channels: usize) -> Self {
        Self { channels: channels.max(1) }
    }
}

impl Node for HardLimiterNode {
    fn output_count(&self) -> usize {
        self.channels
    }

    fn input_count(&self) -> usize {
        self.channels
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _properties: &mut PropertyMap, ctx: &ProcessContext) {
        for c in 0..self.channels {
            let input = inputs.get(c).copied().unwrap_or(&[]);
            for s in 0..ctx.block_size {
                let x = input.get(s).copied().unwrap_or(0.0);
                outputs[c][s] = x.clamp(-1.0, 1.0);
            }
        }
    }
}
