//! resonant-effects — built-in [`resonant_core::Node`] implementations:
//! a hard limiter, a three-band EQ, a crossfading delay, a reconfigurable
//! first-order filter, and a sine signal source.
//!
//! Each of these registers itself as a graph node type via
//! [`resonant_core::Server::register_node_type`] rather than being handed
//! a fixed tag by `resonant-core` itself, so this crate stays a pure
//! consumer of the graph engine with no special standing over a
//! downstream crate's own node types.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod crossfading_delay;
pub mod first_order_filter_node;
pub mod hard_limiter;
pub mod sine_oscillator;
pub mod three_band_eq;

pub use crossfading_delay::CrossfadingDelayNode;
pub use first_order_filter_node::FirstOrderFilterNode;
pub use hard_limiter::HardLimiterNode;
pub use sine_oscillator::SineOscillatorNode;
pub use three_band_eq::ThreeBandEqNode;

use resonant_core::error::EngineResult;
use resonant_core::registry::NodeArgs;
use resonant_core::server::{NodeHandle, Server};

/// Registers every node type this crate provides onto `server`, so they
/// become constructible by tag via [`Server::create_node`].
pub fn register_builtin_node_types(server: &Server) {
    server.register_node_type("hard_limiter", "per-channel brickwall clip to [-1, 1]", |server, args| {
        let channels = args.channels.max(1);
        server.register_node("hard_limiter", Box::new(HardLimiterNode::new(channels)), channels, channels)
    });
    server.register_node_type("three_band_eq", "low-gain / mid-peak / high-shelf EQ", |server, args| {
        let channels = args.channels.max(1);
        server.register_node("three_band_eq", Box::new(ThreeBandEqNode::new(channels)), channels, channels)
    });
    server.register_node_type("crossfading_delay", "click-free variable delay line", |server, args| {
        let channels = args.channels.max(1);
        let sample_rate = server.sample_rate();
        server.register_node(
            "crossfading_delay",
            Box::new(CrossfadingDelayNode::new(channels, sample_rate, 2.0)),
            channels,
            channels,
        )
    });
    server.register_node_type("first_order_filter", "reconfigurable lowpass/highpass/allpass", |server, args| {
        let channels = args.channels.max(1);
        let sample_rate = server.sample_rate();
        server.register_node("first_order_filter", Box::new(FirstOrderFilterNode::new(channels, sample_rate)), channels, channels)
    });
    server.register_node_type("sine_oscillator", "phase-accumulator sine signal source", |server, _args| {
        let sample_rate = server.sample_rate();
        server.register_node("sine_oscillator", Box::new(SineOscillatorNode::new(sample_rate, 440.0)), 0, 1)
    });
}

/// Convenience wrapper matching the shape of a hand-built registry
/// lookup, for callers that already hold a `NodeArgs`.
pub fn create_node(server: &mut Server, type_tag: &str, args: &NodeArgs) -> EngineResult<NodeHandle> {
    server.create_node(type_tag, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::server::ServerParams;

    #[test]
    fn test_register_builtin_node_types_makes_all_tags_discoverable() {
        let mut server = Server::new(ServerParams::default()).unwrap();
        register_builtin_node_types(&server);
        for tag in ["hard_limiter", "three_band_eq", "crossfading_delay", "first_order_filter", "sine_oscillator"] {
            assert!(server.has_node_type(tag), "missing {tag}");
            let handle = server.create_node(tag, &NodeArgs::with_channels(1)).unwrap();
            drop(handle);
        }
    }
}
