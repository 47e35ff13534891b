//! Graph adapter that makes an [`Environment`] a tick-protocol participant:
//! its `will_process_parents` hook refreshes source positions before the
//! plan recurses into their multipanners, and its `process` mixes those
//! multipanners' outputs into one bus.

use std::sync::{Arc, Mutex};

use crate::environment::{Environment, Source, Vec3, CHANNELS_PER_SOURCE, MAX_SOURCES};
use crate::error::EngineResult;
use crate::hrtf::HrtfData;
use crate::multipanner::MAX_CHANNELS as PANNER_CHANNELS;
use crate::node::{Node, NodeId, ProcessContext};
use crate::property::{PropertyMap, PropertyValue};
use crate::server::{NodeHandle, Server};

struct EnvironmentNode {
    environment: Arc<Mutex<Environment>>,
}

impl Node for EnvironmentNode {
    fn output_count(&self) -> usize {
        PANNER_CHANNELS
    }

    fn input_count(&self) -> usize {
        MAX_SOURCES * CHANNELS_PER_SOURCE
    }

    fn will_process_parents(
        &mut self,
        _properties: &mut PropertyMap,
        ctx: &ProcessContext,
        set_sibling_property: &mut dyn FnMut(NodeId, u32, PropertyValue) -> EngineResult<()>,
    ) {
        let mut environment = self.environment.lock().unwrap();
        let _ = environment.update_with(ctx.block_size, set_sibling_property);
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _properties: &mut PropertyMap, ctx: &ProcessContext) {
        for out in outputs.iter_mut() {
            out[..ctx.block_size].fill(0.0);
        }
        let environment = self.environment.lock().unwrap();
        for slot in environment.live_input_slots() {
            for channel in 0..PANNER_CHANNELS {
                let Some(input) = inputs.get(slot as usize + channel) else { continue };
                for s in 0..ctx.block_size {
                    outputs[channel][s] += input[s];
                }
            }
        }
    }

    fn is_subgraph(&self) -> bool {
        true
    }
}

/// A handle to a registered environment node: add sources, trigger one-shot
/// playback, and move the listener, with the underlying node refreshing and
/// mixing automatically every tick. Plain [`NodeHandle`] operations
/// (connect its output elsewhere, pause it, drop it) still go through
/// [`EnvironmentHandle::node`].
#[derive(Clone)]
pub struct EnvironmentHandle {
    node: NodeHandle,
    environment: Arc<Mutex<Environment>>,
}

impl EnvironmentHandle {
    /// The underlying graph node, for connecting/pausing/dropping it.
    pub fn node(&self) -> &NodeHandle {
        &self.node
    }

    /// Sets the listener's world-space position.
    pub fn set_listener_position(&self, position: Vec3) {
        self.environment.lock().unwrap().set_listener_position(position);
    }

    /// Sets the distance attenuation model.
    pub fn set_distance_model(&self, model: crate::environment::DistanceModel) {
        self.environment.lock().unwrap().set_distance_model(model);
    }

    /// Adds a source backed by `multipanner`, mixed into this
    /// environment's own output bus.
    pub fn add_source(&self, server: &Server, multipanner: NodeId, position: Vec3) -> EngineResult<Source> {
        self.environment.lock().unwrap().add_source_into_bus(server, self.node.id(), multipanner, position)
    }

    /// Plays a one-shot buffer at `position` through `multipanner`, torn
    /// down automatically once its sample count has fully elapsed.
    pub fn play_async(&self, server: &Server, samples: Arc<[f32]>, position: Vec3, multipanner: NodeId) -> EngineResult<Source> {
        self.environment.lock().unwrap().play_async(server, self.node.id(), samples, position, multipanner)
    }

    /// Number of sources with at least one live strong reference.
    pub fn live_source_count(&self) -> usize {
        self.environment.lock().unwrap().live_source_count()
    }
}

fn build(server: &mut Server, hrtf: Option<Arc<HrtfData>>) -> EngineResult<(NodeHandle, Arc<Mutex<Environment>>)> {
    let environment = Arc::new(Mutex::new(Environment::new(hrtf)));
    let node = server.register_node(
        "environment",
        Box::new(EnvironmentNode { environment: environment.clone() }),
        MAX_SOURCES * CHANNELS_PER_SOURCE,
        PANNER_CHANNELS,
    )?;
    Ok((node, environment))
}

/// Registers the `"environment"` node type so one can be constructed
/// generically through [`Server::create_node`] (config-driven graphs).
/// Callers that need to add sources or trigger playback should instead use
/// [`create_environment`], which hands back a typed [`EnvironmentHandle`].
pub fn register_environment_node_type(server: &Server) {
    server.register_node_type("environment", "spatial mixer for positioned sources", |server, _args| {
        build(server, None).map(|(node, _)| node)
    });
}

/// Constructs and registers a new environment, returning a handle able to
/// add sources and trigger playback in addition to the plain `NodeHandle`
/// operations.
pub fn create_environment(server: &mut Server, hrtf: Option<Arc<HrtfData>>) -> EngineResult<EnvironmentHandle> {
    let (node, environment) = build(server, hrtf)?;
    Ok(EnvironmentHandle { node, environment })
}
