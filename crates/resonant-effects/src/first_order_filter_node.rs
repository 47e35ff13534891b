//! First-order filter node: a graph-level wrapper around
//! [`resonant_core::FirstOrderFilter`], one filter per channel, switchable
//! between lowpass, highpass and allpass.
//!
//! Grounded on `original_source/first_order_filter.cpp`'s
//! `configure{Lowpass,Highpass,Allpass}` entry points.

use resonant_core::first_order_filter::FirstOrderFilter;
use resonant_core::node::{Node, ProcessContext};
use resonant_core::property::{BlockValues, Property, PropertyMap, PropertyValue};
use resonant_core::server::FIRST_USER_PROPERTY_SLOT;

pub const SLOT_MODE: u32 = FIRST_USER_PROPERTY_SLOT;
pub const SLOT_FREQUENCY: u32 = SLOT_MODE + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterMode {
    Lowpass,
    Highpass,
    Allpass,
}

impl FilterMode {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "lowpass" => Some(Self::Lowpass),
            "highpass" => Some(Self::Highpass),
            "allpass" => Some(Self::Allpass),
            _ => None,
        }
    }
}

/// A per-channel zero/pole one-pole filter, reconfigurable at runtime.
pub struct FirstOrderFilterNode {
    filters: Vec<FirstOrderFilter>,
    sample_rate: f32,
    last_mode: Option<FilterMode>,
    last_frequency: f32,
}

impl FirstOrderFilterNode {
    /// Creates a lowpass-by-default filter for `channels` channels.
    pub fn new(channels: usize, sample_rate: f32) -> Self {
        Self {
            filters: (0..channels.max(1)).map(|_| FirstOrderFilter::new(sample_rate)).collect(),
            sample_rate,
            last_mode: None,
            last_frequency: f32::NAN,
        }
    }

    /// Reads a control value for this block. Filter coefficients are only
    /// recomputed once per block on a change, so an in-progress ramp is
    /// sampled at the end of the block rather than interpolated within it.
    fn read_f32(properties: &PropertyMap, slot: u32, now: f64, block_size: usize, sample_rate: f64, default: f32) -> f32 {
        let Some(property) = properties.get(slot) else { return default };
        let a_rate = property.is_automating(now, block_size, sample_rate);
        match property.read_block(now, block_size, sample_rate, a_rate) {
            BlockValues::KRate(v) => v as f32,
            BlockValues::ARate(values) => values.last().copied().unwrap_or(default as f64) as f32,
        }
    }
}

impl Node for FirstOrderFilterNode {
    fn output_count(&self) -> usize {
        self.filters.len()
    }

    fn input_count(&self) -> usize {
        self.filters.len()
    }

    fn install_properties(&self, properties: &mut PropertyMap) {
        properties.insert(SLOT_MODE, Property::new(PropertyValue::String("lowpass".into())));
        properties.insert(SLOT_FREQUENCY, Property::with_range(PropertyValue::Float(1000.0), 10.0, f64::from(self.sample_rate) * 0.49));
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], properties: &mut PropertyMap, ctx: &ProcessContext) {
        let now = ctx.tick as f64 * ctx.block_size as f64 / f64::from(ctx.sample_rate);
        let sample_rate = f64::from(ctx.sample_rate);

        let mode = match properties.get(SLOT_MODE).map(resonant_core::property::Property::get) {
            Some(PropertyValue::String(s)) => FilterMode::parse(s).unwrap_or(FilterMode::Lowpass),
            _ => FilterMode::Lowpass,
        };
        let frequency = Self::read_f32(properties, SLOT_FREQUENCY, now, ctx.block_size, sample_rate, 1000.0);

        if self.last_mode != Some(mode) || (frequency - self.last_frequency).abs() > 1e-6 {
            for filter in &mut self.filters {
                match mode {
                    FilterMode::Lowpass => filter.configure_lowpass(frequency),
                    FilterMode::Highpass => filter.configure_highpass(frequency),
                    FilterMode::Allpass => filter.configure_allpass(frequency),
                }
            }
            self.last_mode = Some(mode);
            self.last_frequency = frequency;
        }

        for (c, filter) in self.filters.iter_mut().enumerate() {
            let input = inputs.get(c).copied().unwrap_or(&[]);
            for s in 0..ctx.block_size {
                let x = input.get(s).copied().unwrap_or(0.0);
                outputs[c][s] = filter.process(x);
            }
        }
    }

    fn reset(&mut self) {
        for filter in &mut self.filters {
            filter.reset();
        }
    }
}
