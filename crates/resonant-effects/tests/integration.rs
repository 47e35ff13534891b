//! End-to-end scenarios driving the built-in node types through a real
//! `Server`, the way a host application would chain them.

use resonant_core::registry::NodeArgs;
use resonant_core::server::{Server, ServerParams};
use resonant_effects::{crossfading_delay, register_builtin_node_types, sine_oscillator, three_band_eq};

#[test]
fn test_oscillator_into_eq_into_limiter_stays_bounded() {
    let mut server = Server::new(ServerParams { sample_rate: 44100.0, block_size: 256, mixahead: 1 }).unwrap();
    register_builtin_node_types(&server);

    let osc = server.create_node("sine_oscillator", &NodeArgs::with_channels(1)).unwrap();
    server.set_property(osc.id(), sine_oscillator::SLOT_FREQUENCY, resonant_core::property::PropertyValue::Float(1000.0)).unwrap();

    let eq = server.create_node("three_band_eq", &NodeArgs::with_channels(1)).unwrap();
    server.set_property(eq.id(), three_band_eq::SLOT_MIDBAND_DBGAIN, resonant_core::property::PropertyValue::Double(18.0)).unwrap();

    let limiter = server.create_node("hard_limiter", &NodeArgs::with_channels(1)).unwrap();

    server.connect(eq.id(), 0, osc.id(), 0).unwrap();
    server.connect(limiter.id(), 0, eq.id(), 0).unwrap();
    server.set_output_node(&limiter).unwrap();

    let mut out = [0.0f32; 256];
    for _ in 0..20 {
        server.get_block(&mut out, 1, false).unwrap();
        assert!(out.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }
}

#[test]
fn test_oscillator_into_delay_reappears_after_delay_time() {
    let mut server = Server::new(ServerParams { sample_rate: 44100.0, block_size: 512, mixahead: 1 }).unwrap();
    register_builtin_node_types(&server);

    let osc = server.create_node("sine_oscillator", &NodeArgs::with_channels(1)).unwrap();
    let delay = server.create_node("crossfading_delay", &NodeArgs::with_channels(1)).unwrap();
    server.set_property(delay.id(), crossfading_delay::SLOT_DELAY, resonant_core::property::PropertyValue::Float(0.005)).unwrap();

    server.connect(delay.id(), 0, osc.id(), 0).unwrap();
    server.set_output_node(&delay).unwrap();

    let mut out = [0.0f32; 512];
    server.get_block(&mut out, 1, false).unwrap();
    // Delay line starts silent; the first ~220 samples (5ms @ 44100Hz) stay at zero.
    assert!(out[..200].iter().all(|&s| s.abs() < 1e-6));
    assert!(out[250..].iter().any(|&s| s.abs() > 1e-6));
}
