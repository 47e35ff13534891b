//! Automator trait and concrete automation variants, plus the per-property
//! timeline that sequences them.
//!
//! Time is measured in seconds from `Server` start. Every automator is
//! bound to a `[start_time, end_time)` half-open interval; the timeline
//! guarantees these never overlap (scheduling a new automator truncates
//! whatever was previously scheduled at or after its start time, matching
//! "last write wins" scheduling semantics).

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::boxed::Box;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use libm::{exp, log};

/// A pure function of time bound to a property.
///
/// `start` is called once when the timeline enters this automator's
/// interval, with the value the property held at that instant and the
/// instant itself; implementations must be restartable, since the same
/// automator object can be `start`ed again (e.g. after `cancel` + re-add
/// in the automator-restartability property test) and must behave
/// identically given the same baseline.
pub trait Automator: Send {
    /// Binds the automator to its starting value/time.
    fn start(&mut self, initial_value: f64, initial_time: f64);

    /// The value at time `t`, which must lie in `[start_time, end_time]`.
    fn value_at(&self, t: f64) -> f64;

    /// The value this automator settles to once `t >= end_time`.
    fn final_value(&self) -> f64;

    /// The time this automator's interval ends.
    fn end_time(&self) -> f64;

    /// Whether this automator's value changes over its interval, as opposed
    /// to holding one constant value (`Set`). A node reading a property only
    /// needs a-rate (per-sample) materialization while a varying automator
    /// is active; a flat one is indistinguishable from a k-rate read.
    fn is_varying(&self) -> bool {
        true
    }
}

/// Immediately jumps to `target` at `time` (a zero-duration automator).
#[derive(Debug, Clone)]
pub struct Set {
    time: f64,
    target: f64,
}

impl Set {
    /// Creates a `Set` automator that jumps to `target` at `time`.
    pub fn new(time: f64, target: f64) -> Self {
        Self { time, target }
    }
}

impl Automator for Set {
    fn start(&mut self, _initial_value: f64, _initial_time: f64) {}
    fn value_at(&self, _t: f64) -> f64 {
        self.target
    }
    fn final_value(&self) -> f64 {
        self.target
    }
    fn end_time(&self) -> f64 {
        self.time
    }
    fn is_varying(&self) -> bool {
        false
    }
}

/// Linearly ramps from the value held at entry to `target` by `end_time`.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    end_time: f64,
    target: f64,
    start_value: f64,
    start_time: f64,
}

impl LinearRamp {
    /// Creates a linear ramp reaching `target` at `end_time`.
    pub fn new(end_time: f64, target: f64) -> Self {
        Self {
            end_time,
            target,
            start_value: 0.0,
            start_time: 0.0,
        }
    }
}

impl Automator for LinearRamp {
    fn start(&mut self, initial_value: f64, initial_time: f64) {
        self.start_value = initial_value;
        self.start_time = initial_time;
    }

    fn value_at(&self, t: f64) -> f64 {
        let span = self.end_time - self.start_time;
        if span <= 0.0 {
            return self.target;
        }
        let frac = ((t - self.start_time) / span).clamp(0.0, 1.0);
        self.start_value + (self.target - self.start_value) * frac
    }

    fn final_value(&self) -> f64 {
        self.target
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }
}

/// Exponentially ramps from the value held at entry to `target`.
///
/// Values of exactly 0 are nudged to a small epsilon (matching the Web
/// Audio API's `exponentialRampToValueAtTime` convention) since an
/// exponential curve cannot pass through zero.
#[derive(Debug, Clone)]
pub struct ExponentialRamp {
    end_time: f64,
    target: f64,
    start_value: f64,
    start_time: f64,
}

const EXP_RAMP_EPSILON: f64 = 1e-6;

impl ExponentialRamp {
    /// Creates an exponential ramp reaching `target` at `end_time`.
    pub fn new(end_time: f64, target: f64) -> Self {
        Self {
            end_time,
            target: if target.abs() < EXP_RAMP_EPSILON { EXP_RAMP_EPSILON } else { target },
            start_value: EXP_RAMP_EPSILON,
            start_time: 0.0,
        }
    }
}

impl Automator for ExponentialRamp {
    fn start(&mut self, initial_value: f64, initial_time: f64) {
        self.start_value = if initial_value.abs() < EXP_RAMP_EPSILON { EXP_RAMP_EPSILON } else { initial_value };
        self.start_time = initial_time;
    }

    fn value_at(&self, t: f64) -> f64 {
        let span = self.end_time - self.start_time;
        if span <= 0.0 {
            return self.target;
        }
        let frac = ((t - self.start_time) / span).clamp(0.0, 1.0);
        let ratio = self.target / self.start_value;
        self.start_value * exp(log(ratio) * frac)
    }

    fn final_value(&self) -> f64 {
        self.target
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }
}

/// A piecewise-linear breakpoint envelope over `[start, end_time]`.
///
/// `points` are `(fraction_of_duration, value)` pairs, `fraction` in
/// `[0, 1]`, sorted ascending; the first point need not be at 0 (the
/// segment before it holds the value the property had at entry).
#[derive(Debug, Clone)]
pub struct Envelope {
    end_time: f64,
    points: Vec<(f64, f64)>,
    start_value: f64,
    start_time: f64,
}

impl Envelope {
    /// Creates an envelope ending at `end_time` with the given breakpoints.
    pub fn new(end_time: f64, points: Vec<(f64, f64)>) -> Self {
        Self {
            end_time,
            points,
            start_value: 0.0,
            start_time: 0.0,
        }
    }
}

impl Automator for Envelope {
    fn start(&mut self, initial_value: f64, initial_time: f64) {
        self.start_value = initial_value;
        self.start_time = initial_time;
    }

    fn value_at(&self, t: f64) -> f64 {
        let span = self.end_time - self.start_time;
        if span <= 0.0 || self.points.is_empty() {
            return self.final_value();
        }
        let frac = ((t - self.start_time) / span).clamp(0.0, 1.0);

        let mut prev = (0.0, self.start_value);
        for &(point_frac, value) in &self.points {
            if frac <= point_frac {
                let seg = point_frac - prev.0;
                let local = if seg <= 0.0 { 1.0 } else { (frac - prev.0) / seg };
                return prev.1 + (value - prev.1) * local;
            }
            prev = (point_frac, value);
        }
        prev.1
    }

    fn final_value(&self) -> f64 {
        self.points.last().map_or(self.start_value, |&(_, v)| v)
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }
}

struct ScheduledAutomator {
    start_time: f64,
    automator: Box<dyn Automator>,
}

/// An ordered, non-overlapping sequence of automators for one property.
#[derive(Default)]
pub struct Timeline {
    entries: Vec<ScheduledAutomator>,
}

impl Timeline {
    /// Creates an empty timeline.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Schedules `automator` to begin at `start_time`, started with the
    /// value the timeline would report at that instant. Any previously
    /// scheduled automator whose interval would overlap `start_time` is
    /// truncated (its own `end_time` effectively becomes `start_time`).
    /// Automators whose `end_time` is already in the past relative to
    /// `now` are silently dropped.
    pub fn schedule(&mut self, mut automator: Box<dyn Automator>, start_time: f64, now: f64, base_value: f64) {
        if automator.end_time() < now {
            return;
        }
        let entry_value = self.value_at(start_time, base_value);
        automator.start(entry_value, start_time);

        self.entries.retain(|e| e.start_time < start_time);
        self.entries.push(ScheduledAutomator { start_time, automator });
        self.entries.sort_by(|a, b| a.start_time.partial_cmp(&b.start_time).unwrap());
    }

    /// Drops all scheduled automators with `start_time >= t`.
    pub fn cancel_after(&mut self, t: f64) {
        self.entries.retain(|e| e.start_time < t);
    }

    /// Drops every scheduled automator.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// The value at time `t`, given the property's base value (held before
    /// the first automator starts, and between automators once a hole
    /// exists — which cannot currently happen since automators chain from
    /// each other's entry value, but the base value is the correct answer
    /// before the very first one).
    pub fn value_at(&self, t: f64, base_value: f64) -> f64 {
        let mut active = None;
        for entry in &self.entries {
            if entry.start_time > t {
                break;
            }
            active = Some(entry);
        }
        match active {
            None => base_value,
            Some(entry) => {
                if t >= entry.automator.end_time() {
                    entry.automator.final_value()
                } else {
                    entry.automator.value_at(t)
                }
            }
        }
    }

    /// True if any automator is scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if a still-varying automator overlaps `[t, t + duration)` —
    /// i.e. a reader spanning that interval should materialize a-rate
    /// rather than take one k-rate sample. An automator already past its
    /// `end_time` by `t` has settled to a constant and does not count, even
    /// if it is a ramp type.
    pub fn is_varying_over(&self, t: f64, duration: f64) -> bool {
        let block_end = t + duration;
        self.entries
            .iter()
            .filter(|e| e.start_time < block_end && e.automator.end_time() > t)
            .any(|e| e.automator.is_varying())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_ramp_midpoint() {
        let mut timeline = Timeline::new();
        timeline.schedule(Box::new(LinearRamp::new(1.0, 1.0)), 0.0, 0.0, 0.0);
        let v = timeline.value_at(0.5, 0.0);
        assert!((v - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_set_then_ramp_chains_baseline() {
        let mut timeline = Timeline::new();
        timeline.schedule(Box::new(Set::new(0.0, 2.0)), 0.0, 0.0, 0.0);
        timeline.schedule(Box::new(LinearRamp::new(1.0, 0.0)), 0.0, 0.0, 0.0);
        assert!((timeline.value_at(0.0, 0.0) - 2.0).abs() < 1e-9);
        assert!((timeline.value_at(1.0, 0.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_restartable_ramp_produces_same_sequence() {
        let mut ramp_a = LinearRamp::new(1.0, 1.0);
        ramp_a.start(0.0, 0.0);
        let seq_a: Vec<f64> = (0..10).map(|i| ramp_a.value_at(i as f64 * 0.1)).collect();

        let mut ramp_b = LinearRamp::new(1.0, 1.0);
        ramp_b.start(0.0, 0.0);
        let seq_b: Vec<f64> = (0..10).map(|i| ramp_b.value_at(i as f64 * 0.1)).collect();

        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_past_end_time_silently_dropped() {
        let mut timeline = Timeline::new();
        timeline.schedule(Box::new(Set::new(-1.0, 5.0)), -1.0, 0.0, 0.0);
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_cancel_after_truncates() {
        let mut timeline = Timeline::new();
        timeline.schedule(Box::new(Set::new(1.0, 1.0)), 1.0, 0.0, 0.0);
        timeline.schedule(Box::new(Set::new(2.0, 2.0)), 2.0, 0.0, 0.0);
        timeline.cancel_after(2.0);
        assert!((timeline.value_at(10.0, 0.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_exponential_ramp_never_zero() {
        let mut ramp = ExponentialRamp::new(1.0, 0.0);
        ramp.start(1.0, 0.0);
        let v = ramp.value_at(1.0);
        assert!(v > 0.0);
    }

    #[test]
    fn test_is_varying_over_distinguishes_set_from_ramp() {
        let mut timeline = Timeline::new();
        timeline.schedule(Box::new(Set::new(0.0, 1.0)), 0.0, 0.0, 0.0);
        assert!(!timeline.is_varying_over(0.0, 1.0));

        timeline.schedule(Box::new(LinearRamp::new(1.0, 2.0)), 0.0, 0.0, 0.0);
        assert!(timeline.is_varying_over(0.0, 0.5));
        // Settled before the block starts: no longer counts as varying.
        assert!(!timeline.is_varying_over(2.0, 0.5));
    }

    #[test]
    fn test_envelope_breakpoints() {
        let mut env = Envelope::new(1.0, vec![(0.5, 1.0), (1.0, 0.0)]);
        env.start(0.0, 0.0);
        assert!((env.value_at(0.25) - 0.5).abs() < 1e-9);
        assert!((env.value_at(0.75) - 0.5).abs() < 1e-9);
    }
}
