//! Typed property storage with an embedded automation timeline.

use crate::automation::{Automator, Timeline};
use crate::error::{EngineError, EngineResult};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::string::String;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// The value a [`Property`] can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// An integer-valued property (enums, channel counts, etc).
    Int(i64),
    /// A single-precision float property.
    Float(f32),
    /// A double-precision float property (used where accumulated precision matters).
    Double(f64),
    /// A 3-vector property (positions, directions).
    Float3([f32; 3]),
    /// A 6-vector property (e.g. orientation as two 3-vectors).
    Float6([f32; 6]),
    /// A string-valued property (strategy names, file paths).
    String(String),
    /// A reference to an external buffer resource, by opaque id.
    BufferRef(u64),
}

impl PropertyValue {
    /// The type name, for `TypeMismatch` error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Double(_) => "double",
            PropertyValue::Float3(_) => "float3",
            PropertyValue::Float6(_) => "float6",
            PropertyValue::String(_) => "string",
            PropertyValue::BufferRef(_) => "buffer_ref",
        }
    }

    /// This value as `f64`, for properties driven by automation. Returns
    /// `None` for non-numeric variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(f64::from(*f)),
            PropertyValue::Double(d) => Some(*d),
            _ => None,
        }
    }
}

/// One value produced by [`Property::read_block`]: either a single k-rate
/// sample for the whole block, or a full a-rate vector.
#[derive(Debug, Clone)]
pub enum BlockValues {
    /// One value, held constant across the block.
    KRate(f64),
    /// One value per sample in the block.
    ARate(Vec<f64>),
}

/// A typed, range-checked, automatable parameter cell.
pub struct Property {
    value: PropertyValue,
    default: PropertyValue,
    range: Option<(f64, f64)>,
    timeline: Timeline,
    version: u64,
    change_callback: Option<Box<dyn FnMut(&PropertyValue) + Send>>,
}

impl Property {
    /// Creates a property with the given default value and no range limit.
    pub fn new(default: PropertyValue) -> Self {
        Self {
            value: default.clone(),
            default,
            range: None,
            timeline: Timeline::new(),
            version: 0,
            change_callback: None,
        }
    }

    /// Creates a numeric property with an inclusive valid range.
    pub fn with_range(default: PropertyValue, min: f64, max: f64) -> Self {
        let mut p = Self::new(default);
        p.range = Some((min, max));
        p
    }

    /// Installs a callback invoked whenever [`set`](Self::set) changes the value.
    pub fn set_change_callback(&mut self, callback: impl FnMut(&PropertyValue) + Send + 'static) {
        self.change_callback = Some(Box::new(callback));
    }

    /// The property's current value (ignoring any in-progress automation;
    /// use [`read_block`](Self::read_block) for the time-aware value).
    pub fn get(&self) -> &PropertyValue {
        &self.value
    }

    /// Writes a new current value, enforcing the configured range.
    pub fn set(&mut self, value: PropertyValue) -> EngineResult<()> {
        if let (Some((min, max)), Some(v)) = (self.range, value.as_f64()) {
            if v < min || v > max {
                return Err(EngineError::Range {
                    what: "property".into(),
                    value: v,
                    min,
                    max,
                });
            }
        }
        self.value = value;
        self.version += 1;
        if let Some(cb) = &mut self.change_callback {
            cb(&self.value);
        }
        Ok(())
    }

    /// Schedules `automator` starting at `start_time`, given the current
    /// server time `now`. Out-of-range automator overshoot is clipped at
    /// read time (§4.1); automators themselves never fail.
    pub fn schedule(&mut self, automator: Box<dyn Automator>, start_time: f64, now: f64) {
        let base = self.value.as_f64().unwrap_or(0.0);
        self.timeline.schedule(automator, start_time, now, base);
        self.version += 1;
    }

    /// Drops every automator scheduled at or after `t`.
    pub fn cancel_after(&mut self, t: f64) {
        self.timeline.cancel_after(t);
        self.version += 1;
    }

    /// Materialises this property's value over one block starting at
    /// `now`, clipping to the configured range. `a_rate` is chosen by the
    /// reading node, not the property itself.
    pub fn read_block(&self, now: f64, block_size: usize, sample_rate: f64, a_rate: bool) -> BlockValues {
        let base = self.value.as_f64().unwrap_or(0.0);
        if self.timeline.is_empty() || !a_rate {
            BlockValues::KRate(self.clip(self.timeline.value_at(now, base)))
        } else {
            let mut samples = Vec::with_capacity(block_size);
            for i in 0..block_size {
                let t = now + i as f64 / sample_rate;
                samples.push(self.clip(self.timeline.value_at(t, base)));
            }
            BlockValues::ARate(samples)
        }
    }

    /// True if a still-ramping automator covers any part of the block
    /// `[now, now + block_size / sample_rate)`. Callers use this to decide
    /// whether `read_block`'s `a_rate` argument should be `true` — a flat
    /// `Set`, or no automation at all, never needs per-sample evaluation.
    pub fn is_automating(&self, now: f64, block_size: usize, sample_rate: f64) -> bool {
        self.timeline.is_varying_over(now, block_size as f64 / sample_rate)
    }

    fn clip(&self, v: f64) -> f64 {
        match self.range {
            Some((min, max)) => v.clamp(min, max),
            None => v,
        }
    }

    /// Compares `last_seen` against this property's version counter.
    /// Returns the current version so the caller can update its own
    /// `last_seen` cursor.
    pub fn was_modified(&self, last_seen: u64) -> (bool, u64) {
        (self.version != last_seen, self.version)
    }

    /// Resets the value to its default, clearing any scheduled automation.
    pub fn reset_to_default(&mut self) {
        self.value = self.default.clone();
        self.timeline.clear();
        self.version += 1;
    }
}

/// A node's properties, keyed by small integer slot.
#[derive(Default)]
pub struct PropertyMap {
    slots: Vec<Option<Property>>,
}

impl PropertyMap {
    /// Creates an empty property map.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Registers `property` at `slot`, growing the map if needed.
    pub fn insert(&mut self, slot: u32, property: Property) {
        let idx = slot as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(property);
    }

    /// Looks up the property at `slot`.
    pub fn get(&self, slot: u32) -> Option<&Property> {
        self.slots.get(slot as usize).and_then(|s| s.as_ref())
    }

    /// Mutably looks up the property at `slot`.
    pub fn get_mut(&mut self, slot: u32) -> Option<&mut Property> {
        self.slots.get_mut(slot as usize).and_then(|s| s.as_mut())
    }
}
