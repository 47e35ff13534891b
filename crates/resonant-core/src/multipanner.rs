//! Multipanner: a strategy-switched spatialization node.
//!
//! Collapses the subgraph described in SPEC_FULL.md §4.6 (input mixer →
//! {hrtf panner, amplitude panner}) into a single [`crate::node::Node`]
//! implementation rather than wiring real child node ids into the graph —
//! there is no intermediate bus to observe from outside, so nothing is lost
//! by keeping both branches as fields of one struct. `is_subgraph()`
//! returns true for the same reason the real subgraph would: this node's
//! output is already the final spatialized signal, so the server's
//! `mul`/`add` post-processing step is skipped.

use std::sync::Arc;

use crate::hrtf::HrtfData;
use crate::node::{Node, ProcessContext};
use crate::panner::{AmplitudePanner, SpeakerLayout};
use crate::property::{BlockValues, Property, PropertyMap, PropertyValue};

/// Every layout this node can pan to, including the HRTF branch. Output
/// buffers are always sized to [`MAX_CHANNELS`] so switching strategy at
/// runtime never requires reallocating the node's output buffers.
pub const MAX_CHANNELS: usize = 7;

pub const SLOT_STRATEGY: u32 = crate::server::FIRST_USER_PROPERTY_SLOT;
pub const SLOT_AZIMUTH: u32 = SLOT_STRATEGY + 1;
pub const SLOT_ELEVATION: u32 = SLOT_STRATEGY + 2;
pub const SLOT_SHOULD_CROSSFADE: u32 = SLOT_STRATEGY + 3;

/// The branch a multipanner's output currently proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanningStrategy {
    Stereo,
    Surround51,
    Surround71,
    Hrtf,
}

impl PanningStrategy {
    /// Parses a strategy name as used by the `strategy` property.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "stereo" => Some(Self::Stereo),
            "5.1" | "surround51" => Some(Self::Surround51),
            "7.1" | "surround71" => Some(Self::Surround71),
            "hrtf" => Some(Self::Hrtf),
            _ => None,
        }
    }

    fn layout(self) -> Option<SpeakerLayout> {
        match self {
            PanningStrategy::Stereo => Some(SpeakerLayout::Stereo),
            PanningStrategy::Surround51 => Some(SpeakerLayout::Surround51),
            PanningStrategy::Surround71 => Some(SpeakerLayout::Surround71),
            PanningStrategy::Hrtf => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            PanningStrategy::Stereo => "stereo",
            PanningStrategy::Surround51 => "5.1",
            PanningStrategy::Surround71 => "7.1",
            PanningStrategy::Hrtf => "hrtf",
        }
    }
}

/// Per-ear FIR convolution state with a crossfade between the previous and
/// current coefficient sets, so a moving source never clicks when its
/// HRIR changes underneath it.
struct HrtfChannel {
    history: Vec<f32>,
    write_pos: usize,
    coeffs: Vec<f32>,
    prev_coeffs: Vec<f32>,
    fade_pos: f32,
    fade_len: f32,
}

impl HrtfChannel {
    fn new(hrir_length: usize) -> Self {
        Self {
            history: vec![0.0; hrir_length.max(1)],
            write_pos: 0,
            coeffs: vec![0.0; hrir_length],
            prev_coeffs: vec![0.0; hrir_length],
            fade_pos: 1.0,
            fade_len: 64.0,
        }
    }

    fn retune(&mut self, new_coeffs: &[f32], crossfade: bool) {
        if crossfade {
            self.prev_coeffs.copy_from_slice(&self.coeffs);
            self.fade_pos = 0.0;
        } else {
            self.fade_pos = 1.0;
        }
        self.coeffs.copy_from_slice(new_coeffs);
    }

    fn process(&mut self, input: f32) -> f32 {
        let n = self.history.len();
        self.history[self.write_pos] = input;

        let dot = |coeffs: &[f32], write_pos: usize, history: &[f32]| -> f32 {
            let mut sum = 0.0;
            for (tap, &c) in coeffs.iter().enumerate() {
                let idx = (write_pos + n - tap) % n;
                sum += c * history[idx];
            }
            sum
        };

        let out = if self.fade_pos >= 1.0 {
            dot(&self.coeffs, self.write_pos, &self.history)
        } else {
            let a = dot(&self.prev_coeffs, self.write_pos, &self.history);
            let b = dot(&self.coeffs, self.write_pos, &self.history);
            let mix = a + (b - a) * self.fade_pos;
            self.fade_pos = (self.fade_pos + 1.0 / self.fade_len).min(1.0);
            mix
        };

        self.write_pos = (self.write_pos + 1) % n;
        out
    }
}

/// A strategy-switched spatializer: amplitude panning across stereo/5.1/7.1
/// layouts, or HRTF convolution, selected by the `strategy` property.
pub struct MultipannerNode {
    amplitude: AmplitudePanner,
    hrtf_data: Option<Arc<HrtfData>>,
    left: Option<HrtfChannel>,
    right: Option<HrtfChannel>,
    last_strategy: Option<PanningStrategy>,
    last_azimuth: f32,
    last_elevation: f32,
}

impl MultipannerNode {
    /// Creates a multipanner. `hrtf_data` may be `None` if only amplitude
    /// strategies will be used; selecting `"hrtf"` without a dataset leaves
    /// the output silent rather than panicking.
    pub fn new(hrtf_data: Option<Arc<HrtfData>>) -> Self {
        let mut amplitude = AmplitudePanner::new();
        amplitude.set_standard_map(SpeakerLayout::Stereo);
        Self {
            amplitude,
            hrtf_data,
            left: None,
            right: None,
            last_strategy: None,
            last_azimuth: f32::NAN,
            last_elevation: f32::NAN,
        }
    }

    /// Reads a control value for this block. Azimuth/elevation only need
    /// the value current as of the block boundary (the panner recomputes
    /// gains once per block, not once per sample), so a ramp in progress is
    /// sampled at the end of the block rather than interpolated within it.
    fn read_f32(properties: &PropertyMap, slot: u32, now: f64, block_size: usize, sample_rate: f64, default: f32) -> f32 {
        let Some(property) = properties.get(slot) else { return default };
        let a_rate = property.is_automating(now, block_size, sample_rate);
        match property.read_block(now, block_size, sample_rate, a_rate) {
            BlockValues::KRate(v) => v as f32,
            BlockValues::ARate(values) => values.last().copied().unwrap_or(default as f64) as f32,
        }
    }

    fn current_strategy(properties: &PropertyMap) -> PanningStrategy {
        match properties.get(SLOT_STRATEGY).map(Property::get) {
            Some(PropertyValue::String(s)) => PanningStrategy::parse(s).unwrap_or(PanningStrategy::Stereo),
            _ => PanningStrategy::Stereo,
        }
    }

    fn should_crossfade(properties: &PropertyMap) -> bool {
        matches!(properties.get(SLOT_SHOULD_CROSSFADE).map(Property::get), Some(PropertyValue::Int(1)))
    }
}

impl Node for MultipannerNode {
    fn output_count(&self) -> usize {
        MAX_CHANNELS
    }

    fn input_count(&self) -> usize {
        1
    }

    fn install_properties(&self, properties: &mut PropertyMap) {
        properties.insert(SLOT_STRATEGY, Property::new(PropertyValue::String("stereo".into())));
        properties.insert(SLOT_AZIMUTH, Property::new(PropertyValue::Float(0.0)));
        properties.insert(SLOT_ELEVATION, Property::new(PropertyValue::Float(0.0)));
        properties.insert(SLOT_SHOULD_CROSSFADE, Property::new(PropertyValue::Int(1)));
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], properties: &mut PropertyMap, ctx: &ProcessContext) {
        let now = ctx.tick as f64 * ctx.block_size as f64 / f64::from(ctx.sample_rate);
        let sample_rate = f64::from(ctx.sample_rate);

        let strategy = Self::current_strategy(properties);
        let azimuth = Self::read_f32(properties, SLOT_AZIMUTH, now, ctx.block_size, sample_rate, self.last_azimuth);
        let elevation = Self::read_f32(properties, SLOT_ELEVATION, now, ctx.block_size, sample_rate, self.last_elevation);
        let crossfade = Self::should_crossfade(properties);
        let moved = (azimuth - self.last_azimuth).abs() > 1e-6 || (elevation - self.last_elevation).abs() > 1e-6;
        let strategy_changed = self.last_strategy != Some(strategy);

        for out in outputs.iter_mut() {
            out[..ctx.block_size].fill(0.0);
        }

        match strategy.layout() {
            Some(layout) => {
                if strategy_changed {
                    self.amplitude.set_standard_map(layout);
                }
                self.amplitude.set_azimuth(azimuth);
                self.amplitude.set_elevation(elevation);
                for s in 0..ctx.block_size {
                    let input = inputs.first().map(|buf| buf[s]).unwrap_or(0.0);
                    let mut gains = [0.0f32; MAX_CHANNELS];
                    self.amplitude.gains(&mut gains[..layout.channel_count()]);
                    for (c, g) in gains.iter().enumerate().take(layout.channel_count()) {
                        outputs[c][s] += input * g;
                    }
                }
            }
            None => {
                if let Some(hrtf) = &self.hrtf_data {
                    if self.left.is_none() || strategy_changed {
                        self.left = Some(HrtfChannel::new(hrtf.hrir_length()));
                        self.right = Some(HrtfChannel::new(hrtf.hrir_length()));
                    }
                    if strategy_changed || moved {
                        let mut left_coeffs = vec![0.0; hrtf.hrir_length()];
                        let mut right_coeffs = vec![0.0; hrtf.hrir_length()];
                        hrtf.compute_coefficients_stereo(elevation, azimuth, &mut left_coeffs, &mut right_coeffs, false);
                        if let Some(ch) = &mut self.left {
                            ch.retune(&left_coeffs, crossfade && !strategy_changed);
                        }
                        if let Some(ch) = &mut self.right {
                            ch.retune(&right_coeffs, crossfade && !strategy_changed);
                        }
                    }
                    for s in 0..ctx.block_size {
                        let input = inputs.first().map(|buf| buf[s]).unwrap_or(0.0);
                        if let Some(ch) = &mut self.left {
                            outputs[0][s] = ch.process(input);
                        }
                        if let Some(ch) = &mut self.right {
                            outputs[1][s] = ch.process(input);
                        }
                    }
                }
            }
        }

        self.last_strategy = Some(strategy);
        self.last_azimuth = azimuth;
        self.last_elevation = elevation;
    }

    fn reset(&mut self) {
        self.left = None;
        self.right = None;
        self.last_strategy = None;
    }

    fn is_subgraph(&self) -> bool {
        true
    }
}
