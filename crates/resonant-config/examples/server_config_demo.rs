//! Loads a `ServerConfig` from TOML and stands up a `Server` from it.
//!
//! Run with: cargo run -p resonant-config --example server_config_demo

use resonant_config::ServerConfig;
use resonant_core::Server;

fn main() {
    let toml_text = r#"
        sample_rate = 48000.0
        block_size = 128
        mixahead = 2
        default_strategy = "stereo"
        log_filter = "resonant_core=info,warn"
    "#;

    let config = ServerConfig::load_from_str(toml_text).expect("config should validate");
    println!("loaded config: {config:?}");

    let mut server = Server::new(config.to_server_params()).expect("server should start");
    println!("server running at {} Hz, block size {}", server.sample_rate(), server.block_size());

    let handle = server
        .create_node("multipanner", &resonant_core::registry::NodeArgs::with_channels(2))
        .expect("multipanner is a builtin node type");
    println!("created default-strategy multipanner node {:?}", handle.id());
}
