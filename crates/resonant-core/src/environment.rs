//! Environments and sources: world-to-listener transform, per-tick source
//! update, and one-shot playback lifecycle.
//!
//! Grounded on `original_source/3d/environment.hpp`'s `EnvironmentNode`:
//! the environment holds *weak* references to its sources so a client can
//! drop a source freely, while each source holds a *strong* reference back
//! to the environment so the environment always outlives anything that
//! still points at it. `std::owner_less`-ordered weak-pointer sets have no
//! direct Rust equivalent, so sources are instead keyed by a monotonically
//! increasing [`SourceId`] handed out by the environment (§3 Open Question).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::error::{EngineError, EngineResult};
use crate::hrtf::HrtfData;
use crate::multipanner::{SLOT_AZIMUTH, SLOT_ELEVATION, MAX_CHANNELS as PANNER_CHANNELS};
use crate::node::NodeId;
use crate::property::PropertyValue;
use crate::server::Server;

/// Max simultaneous sources one environment mixes into its output bus.
pub const MAX_SOURCES: usize = 16;
/// Input slots an environment reserves per source: one per multipanner
/// output channel, so a source's whole spatialized signal (not just its
/// left channel) reaches the environment's bus.
pub const CHANNELS_PER_SOURCE: usize = PANNER_CHANNELS;

/// A listener or source position in world space.
#[derive(Debug, Clone, Copy, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Distance attenuation model applied to a source's gain: `1 / (1 +
/// rolloff * max(distance - min_distance, 0))`, so sources inside
/// `min_distance` are unattenuated.
#[derive(Debug, Clone, Copy)]
pub struct DistanceModel {
    pub rolloff: f32,
    pub min_distance: f32,
}

impl Default for DistanceModel {
    fn default() -> Self {
        Self { rolloff: 1.0, min_distance: 1.0 }
    }
}

impl DistanceModel {
    fn gain(&self, distance: f32) -> f32 {
        let effective = (distance - self.min_distance).max(0.0);
        1.0 / (1.0 + self.rolloff * effective)
    }
}

/// Stable identity for a source inside one environment, handed out by
/// [`Environment::add_source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

struct SourceInner {
    position: Mutex<Vec3>,
    multipanner: NodeId,
    /// Base input slot on the owning environment's node this source's
    /// multipanner channels are connected to, if it was added through
    /// [`Environment::add_source_into_bus`] rather than [`Environment::add_source`].
    input_slot: Option<u32>,
}

/// A strong handle to a spatially positioned mono audio producer. The
/// environment holds only a weak reference to the data this points at, so
/// dropping every `Source` handle frees the source even while the
/// environment is still running.
#[derive(Clone)]
pub struct Source {
    inner: Arc<SourceInner>,
}

impl Source {
    /// Updates this source's world-space position.
    pub fn set_position(&self, position: Vec3) {
        *self.inner.position.lock().unwrap() = position;
    }

    /// The node id of this source's multipanner, for connecting it into a
    /// graph as an input.
    pub fn multipanner_id(&self) -> NodeId {
        self.inner.multipanner
    }
}

/// Orchestrates listener position/orientation and a set of moving sources,
/// writing fresh azimuth/elevation/distance-gain into each source's
/// multipanner once per tick.
pub struct Environment {
    listener_position: Vec3,
    distance_model: DistanceModel,
    hrtf: Option<Arc<HrtfData>>,
    sources: HashMap<SourceId, Weak<SourceInner>>,
    next_id: u64,
    next_input_slot: u32,
    oneshots: HashMap<SourceId, OneshotState>,
}

/// Keeps a `play_async` source's extra strong reference alive until its
/// buffer has fully played out, tracked in samples rather than wall-clock
/// time so cleanup lands on the tick the buffer actually ends on.
struct OneshotState {
    keepalive: Source,
    remaining_samples: i64,
}

impl Environment {
    /// Creates an environment at the world origin with no sources.
    pub fn new(hrtf: Option<Arc<HrtfData>>) -> Self {
        Self {
            listener_position: Vec3::default(),
            distance_model: DistanceModel::default(),
            hrtf,
            sources: HashMap::new(),
            next_id: 0,
            next_input_slot: 0,
            oneshots: HashMap::new(),
        }
    }

    /// Sets the listener's world-space position.
    pub fn set_listener_position(&mut self, position: Vec3) {
        self.listener_position = position;
    }

    /// Sets the distance attenuation model.
    pub fn set_distance_model(&mut self, model: DistanceModel) {
        self.distance_model = model;
    }

    /// Registers a new source backed by `multipanner`'s node id, at
    /// `position`. The returned [`Source`] is the caller's strong
    /// reference; the environment keeps only a weak one. Not wired into
    /// this environment's own output bus — the caller is responsible for
    /// routing `multipanner`'s output wherever it needs to go. Use
    /// [`Environment::add_source_into_bus`] to have the environment mix it
    /// in itself.
    pub fn add_source(&mut self, multipanner: NodeId, position: Vec3) -> Source {
        let (_, source) = self.add_source_with_slot(multipanner, position, None);
        source
    }

    /// Like [`Environment::add_source`], but also connects `multipanner`'s
    /// channels into `env_node`'s input bus at a freshly reserved slot
    /// range, so the environment's own mixed output includes this source.
    pub fn add_source_into_bus(&mut self, server: &Server, env_node: NodeId, multipanner: NodeId, position: Vec3) -> EngineResult<Source> {
        let slot = self.connect_into_bus(server, env_node, multipanner)?;
        let (_, source) = self.add_source_with_slot(multipanner, position, Some(slot));
        Ok(source)
    }

    fn connect_into_bus(&mut self, server: &Server, env_node: NodeId, multipanner: NodeId) -> EngineResult<u32> {
        let slot = self.reserve_input_slot()?;
        for channel in 0..CHANNELS_PER_SOURCE as u32 {
            server.connect(env_node, slot + channel, multipanner, channel)?;
        }
        Ok(slot)
    }

    fn reserve_input_slot(&mut self) -> EngineResult<u32> {
        let max_slot = (MAX_SOURCES * CHANNELS_PER_SOURCE) as u32;
        if self.next_input_slot >= max_slot {
            return Err(EngineError::Range {
                what: "environment source count".into(),
                value: (self.next_input_slot / CHANNELS_PER_SOURCE as u32) as f64,
                min: 0.0,
                max: MAX_SOURCES as f64,
            });
        }
        let slot = self.next_input_slot;
        self.next_input_slot += CHANNELS_PER_SOURCE as u32;
        Ok(slot)
    }

    fn add_source_with_slot(&mut self, multipanner: NodeId, position: Vec3, input_slot: Option<u32>) -> (SourceId, Source) {
        let id = SourceId(self.next_id);
        self.next_id += 1;
        let inner = Arc::new(SourceInner { position: Mutex::new(position), multipanner, input_slot });
        self.sources.insert(id, Arc::downgrade(&inner));
        (id, Source { inner })
    }

    /// Number of sources with at least one live strong reference.
    pub fn live_source_count(&self) -> usize {
        self.sources.values().filter(|w| w.strong_count() > 0).count()
    }

    /// Input slot ranges currently feeding this environment's output bus,
    /// one base index per live, bus-connected source.
    pub(crate) fn live_input_slots(&self) -> Vec<u32> {
        self.sources.values().filter_map(Weak::upgrade).filter_map(|inner| inner.input_slot).collect()
    }

    /// Runs one tick of environment bookkeeping (§4.7, steps 1-3):
    /// prunes dead weak references and samples-exhausted one-shot sources,
    /// then for each live source computes its listener-relative spherical
    /// position and distance gain, writing azimuth/elevation/gain through
    /// `write`.
    ///
    /// `block_size` advances every one-shot source's remaining-sample
    /// countdown, so `play_async` sources are torn down by sample position
    /// rather than a wall-clock timer.
    fn update_with(&mut self, block_size: usize, write: &mut dyn FnMut(NodeId, u32, PropertyValue) -> EngineResult<()>) -> EngineResult<()> {
        self.oneshots.retain(|_, state| {
            state.remaining_samples -= block_size as i64;
            state.remaining_samples > 0
        });
        self.sources.retain(|_, weak| weak.strong_count() > 0);

        for weak in self.sources.values() {
            let Some(inner) = weak.upgrade() else { continue };
            let position = *inner.position.lock().unwrap();
            let relative = position.sub(self.listener_position);
            let distance = relative.length();
            let (azimuth, elevation) = spherical(relative);
            let gain = self.distance_model.gain(distance);

            write(inner.multipanner, SLOT_AZIMUTH, PropertyValue::Float(azimuth))?;
            write(inner.multipanner, SLOT_ELEVATION, PropertyValue::Float(elevation))?;
            write(inner.multipanner, crate::server::PROPERTY_SLOT_MUL, PropertyValue::Float(gain))?;
        }
        Ok(())
    }

    /// Host-driven convenience wrapper around [`Environment::update_with`],
    /// going through `server`'s own locking API. Only safe to call from
    /// outside an in-progress tick (e.g. standalone tests) — an
    /// [`crate::environment_node::EnvironmentNode`] instead calls
    /// `update_with` directly from `will_process_parents`, which runs while
    /// the server's lock is already held.
    pub fn update(&mut self, server: &Server) -> EngineResult<()> {
        let block_size = server.block_size();
        self.update_with(block_size, &mut |id, slot, value| server.set_property(id, slot, value))
    }

    /// Plays `samples` (a one-shot mono buffer, already at the server's
    /// sample rate) at `position`, attaching a transient source wired into
    /// `env_node`'s output bus and arranging for its destruction once the
    /// buffer reaches its end. Cleanup is tracked by sample count rather
    /// than a timer, so it lands within one tick of the buffer's last
    /// sample regardless of how long that takes in wall-clock time.
    pub fn play_async(
        &mut self,
        server: &Server,
        env_node: NodeId,
        samples: Arc<[f32]>,
        position: Vec3,
        multipanner: NodeId,
    ) -> EngineResult<Source> {
        let slot = self.connect_into_bus(server, env_node, multipanner)?;
        let (id, source) = self.add_source_with_slot(multipanner, position, Some(slot));
        self.oneshots.insert(id, OneshotState { keepalive: source.clone(), remaining_samples: samples.len() as i64 });
        Ok(source)
    }
}

/// Converts a listener-relative offset to `(azimuth, elevation)` in
/// degrees: azimuth measured from +Y, clockwise; elevation from the
/// horizon (the XY plane).
fn spherical(relative: Vec3) -> (f32, f32) {
    let distance = relative.length();
    if distance < 1e-6 {
        return (0.0, 0.0);
    }
    let azimuth = relative.x.atan2(relative.y).to_degrees();
    let elevation = (relative.z / distance).asin().to_degrees();
    (azimuth, elevation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipanner::MultipannerNode;
    use crate::server::ServerParams;

    fn make_server_with_multipanner() -> (Server, crate::server::NodeHandle) {
        let server = Server::new(ServerParams { sample_rate: 44100.0, block_size: 64, mixahead: 1 }).unwrap();
        let handle = server.register_node("multipanner", Box::new(MultipannerNode::new(None)), 1, crate::multipanner::MAX_CHANNELS).unwrap();
        (server, handle)
    }

    #[test]
    fn test_source_directly_ahead_has_zero_azimuth() {
        let (server, handle) = make_server_with_multipanner();
        let mut env = Environment::new(None);
        let source = env.add_source(handle.id(), Vec3::new(0.0, 5.0, 0.0));
        env.update(&server).unwrap();

        let azimuth = server.get_property(handle.id(), SLOT_AZIMUTH).unwrap();
        match azimuth {
            PropertyValue::Float(v) => assert!(v.abs() < 1e-3),
            other => panic!("unexpected {other:?}"),
        }
        drop(source);
    }

    #[test]
    fn test_source_to_the_right_has_positive_azimuth() {
        let (server, handle) = make_server_with_multipanner();
        let mut env = Environment::new(None);
        let _source = env.add_source(handle.id(), Vec3::new(5.0, 5.0, 0.0));
        env.update(&server).unwrap();

        match server.get_property(handle.id(), SLOT_AZIMUTH).unwrap() {
            PropertyValue::Float(v) => assert!(v > 0.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dropping_source_handle_sweeps_within_one_tick() {
        let (server, handle) = make_server_with_multipanner();
        let mut env = Environment::new(None);
        let source = env.add_source(handle.id(), Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(env.live_source_count(), 1);
        drop(source);
        env.update(&server).unwrap();
        assert_eq!(env.live_source_count(), 0);
    }

    #[test]
    fn test_distance_model_attenuates_far_sources() {
        let (server, handle) = make_server_with_multipanner();
        let mut env = Environment::new(None);
        env.set_distance_model(DistanceModel { rolloff: 1.0, min_distance: 1.0 });
        let _source = env.add_source(handle.id(), Vec3::new(0.0, 10.0, 0.0));
        env.update(&server).unwrap();

        match server.get_property(handle.id(), crate::server::PROPERTY_SLOT_MUL).unwrap() {
            PropertyValue::Float(v) => assert!(v < 1.0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
