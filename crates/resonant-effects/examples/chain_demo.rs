//! Chains a sine source through an EQ, a delay, and a limiter on a real
//! `Server`, printing a few output samples.
//!
//! Run with: cargo run -p resonant-effects --example chain_demo

use resonant_core::property::PropertyValue;
use resonant_core::registry::NodeArgs;
use resonant_core::server::{Server, ServerParams};
use resonant_effects::{crossfading_delay, register_builtin_node_types, sine_oscillator, three_band_eq};

fn main() {
    let mut server = Server::new(ServerParams { sample_rate: 44100.0, block_size: 128, mixahead: 2 }).expect("server should start");
    register_builtin_node_types(&server);

    let osc = server.create_node("sine_oscillator", &NodeArgs::with_channels(1)).unwrap();
    server.set_property(osc.id(), sine_oscillator::SLOT_FREQUENCY, PropertyValue::Float(440.0)).unwrap();

    let eq = server.create_node("three_band_eq", &NodeArgs::with_channels(1)).unwrap();
    server.set_property(eq.id(), three_band_eq::SLOT_MIDBAND_DBGAIN, PropertyValue::Double(6.0)).unwrap();

    let delay = server.create_node("crossfading_delay", &NodeArgs::with_channels(1)).unwrap();
    server.set_property(delay.id(), crossfading_delay::SLOT_DELAY, PropertyValue::Float(0.01)).unwrap();

    let limiter = server.create_node("hard_limiter", &NodeArgs::with_channels(1)).unwrap();

    server.connect(eq.id(), 0, osc.id(), 0).unwrap();
    server.connect(delay.id(), 0, eq.id(), 0).unwrap();
    server.connect(limiter.id(), 0, delay.id(), 0).unwrap();
    server.set_output_node(&limiter).unwrap();

    let mut out = [0.0f32; 128];
    for block in 0..5 {
        server.get_block(&mut out, 1, false).expect("block should render");
        println!("block {block}: first 4 samples {:?}", &out[..4]);
    }
}
