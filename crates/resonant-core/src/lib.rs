//! resonant-core — graph execution engine, property/automation subsystem,
//! and 3D panning/environment core for the `resonant` realtime audio
//! synthesis engine.
//!
//! # Core abstractions
//!
//! ## Graph & server
//!
//! - [`server::Server`] — owns the node slab, computes the execution plan,
//!   drives ticks.
//! - [`node::Node`] — per-type processing trait; [`node::NodeId`] is a
//!   slab-index-plus-generation handle.
//! - [`graph::Plan`] / [`graph::build_plan`] — topological planning with
//!   cycle detection.
//! - [`registry::NodeRegistry`] — type-tag → constructor closure map for
//!   name-driven node construction.
//!
//! ## Properties & automation
//!
//! - [`property::Property`] / [`property::PropertyMap`] — typed,
//!   range-checked, automatable parameter cells.
//! - [`automation::Automator`] / [`automation::Timeline`] — piecewise
//!   automation schedules (`Set`, `LinearRamp`, `ExponentialRamp`,
//!   `Envelope`).
//!
//! ## DSP primitives
//!
//! - [`Biquad`] / [`BiquadDouble`] — second-order IIR filters (single and
//!   double precision).
//! - [`FirstOrderFilter`] — zero/pole one-pole filter with canonical
//!   lowpass/highpass/allpass configuration.
//! - [`InterpolatedDelay`], [`FixedDelayLine`], [`CrossfadingDelayLine`] —
//!   delay lines.
//! - [`OnePole`] — 6dB/oct one-pole smoothing filter.
//! - [`Oscillator`] — phase-accumulator audio-rate oscillator.
//! - [`Resampler`] — stateful multi-channel linear resampler.
//!
//! ## Spatial audio
//!
//! - [`panner::AmplitudePanner`] — constant-power amplitude panning over
//!   an arbitrary speaker layout.
//! - [`hrtf::HrtfData`] — HRTF dataset loading and bilinear coefficient
//!   synthesis.
//! - [`multipanner::MultipannerNode`] — strategy-switched spatializer.
//! - [`environment::Environment`] — world-to-listener transform, per-tick
//!   source update, one-shot playback lifecycle.
//! - [`environment_node::EnvironmentHandle`] — the `Node` wrapper that makes
//!   an environment a tick-protocol participant, mixing its sources'
//!   multipanners into one output bus.
//!
//! ## Mixing & errors
//!
//! - [`mixmatrix::MixMatrix`] / [`mixmatrix::MixMatrixRegistry`] — channel
//!   count conversion matrices.
//! - [`error::EngineError`] / [`error::EngineResult`] — the engine's closed
//!   error taxonomy.
//!
//! # no_std support
//!
//! The DSP-primitive modules (`math`, `fast_math`, `biquad`, `one_pole`,
//! `param`, `delay`, `first_order_filter`, `panner`, `resampler`,
//! `oscillator`) remain `no_std`-clean. The graph-level modules (`server`,
//! `graph`, `hrtf`, `environment`, `registry`) require threads, mutexes and
//! a growable slab and are std-only regardless of the `std` feature flag.
//! `environment_node` composes `environment` and `server`, so it inherits
//! the same std-only requirement.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod automation;
pub mod biquad;
pub mod delay;
pub mod environment;
pub mod environment_node;
pub mod error;
pub mod fast_math;
pub mod first_order_filter;
pub mod graph;
pub mod hrtf;
pub mod math;
pub mod mixmatrix;
pub mod multipanner;
pub mod node;
pub mod one_pole;
pub mod oscillator;
pub mod panner;
pub mod param;
pub mod property;
pub mod registry;
pub mod resampler;
pub mod server;

// Re-export main types at crate root.
pub use automation::{Automator, Envelope, ExponentialRamp, LinearRamp, Set, Timeline};
pub use biquad::{
    Biquad, BiquadDouble, bandpass_coefficients, high_shelf_coefficients_f64,
    highpass_coefficients, low_shelf_coefficients_f64, lowpass_coefficients, notch_coefficients,
    peaking_eq_coefficients, peaking_eq_coefficients_f64,
};
pub use delay::{CrossfadingDelayLine, FixedDelayLine, InterpolatedDelay, Interpolation};
pub use environment::{DistanceModel, Environment, Source, SourceId, Vec3};
pub use environment_node::{create_environment, register_environment_node_type, EnvironmentHandle};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use fast_math::{fast_db_to_linear, fast_exp2, fast_linear_to_db, fast_log2, fast_sin_turns, fast_tan};
pub use first_order_filter::FirstOrderFilter;
pub use graph::{Plan, build_plan};
pub use hrtf::{HrtfCache, HrtfData};
pub use math::{
    asymmetric_clip, db_to_linear, fast_tanh, flush_denormal, foldback, hard_clip, linear_to_db,
    mono_sum, soft_clip, wet_dry_mix, wet_dry_mix_stereo,
};
pub use mixmatrix::{MixMatrix, MixMatrixRegistry};
pub use multipanner::{MultipannerNode, PanningStrategy};
pub use node::{InputSlot, Node, NodeId, NodeState, ProcessContext};
pub use one_pole::OnePole;
pub use oscillator::Oscillator;
pub use panner::{AmplitudePanner, AmplitudePannerEntry, SpeakerLayout};
pub use param::{LinearSmoothedParam, SmoothedParam};
pub use property::{BlockValues, Property, PropertyMap, PropertyValue};
pub use registry::{NodeArgs, NodeRegistry};
pub use resampler::{Resampler, resample_mono_buffer};
pub use server::{NodeHandle, Server, ServerParams, WeakNodeHandle};
