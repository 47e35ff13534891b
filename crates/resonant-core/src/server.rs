//! The graph-owning `Server`: node registration, the tick protocol, and the
//! background worker that frees nodes off the audio thread.

use std::mem;
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::thread;

use tracing::{debug, info, instrument};

use crate::automation::Automator;
use crate::error::{EngineError, EngineResult};
use crate::graph::{build_plan, Plan};
use crate::mixmatrix::MixMatrixRegistry;
use crate::node::{simd_pad, InputSlot, Node, NodeId, NodeState, NullNode, ProcessContext};
use crate::property::{BlockValues, Property, PropertyMap, PropertyValue};
use crate::registry::{NodeArgs, NodeRegistry};

/// Construction parameters for a [`Server`]. The TOML-loadable,
/// validated superset of this lives in `resonant-config::ServerConfig`;
/// this is the minimal set the engine itself needs.
#[derive(Debug, Clone, Copy)]
pub struct ServerParams {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Block size in samples.
    pub block_size: usize,
    /// Number of blocks to render ahead of the device pointer.
    pub mixahead: usize,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self { sample_rate: 44100.0, block_size: 256, mixahead: 2 }
    }
}

/// Slot every node's multiplicative post-gain property lives at.
pub const PROPERTY_SLOT_MUL: u32 = 0;
/// Slot every node's additive post-offset property lives at.
pub const PROPERTY_SLOT_ADD: u32 = 1;
/// Node-type-specific properties are registered starting at this slot, so
/// every node's `mul`/`add` always live at the same two well-known slots.
pub const FIRST_USER_PROPERTY_SLOT: u32 = 2;

/// Materializes a property across a block as a per-sample vector, asking
/// for a-rate evaluation only while a still-ramping automator is active —
/// a flat value (or no automation at all) broadcasts from one k-rate
/// sample instead of paying for a per-sample allocation.
fn read_block_f32(property: Option<&Property>, now: f64, block_size: usize, sample_rate: f64, default: f32) -> Vec<f32> {
    match property {
        None => vec![default; block_size],
        Some(p) => {
            let a_rate = p.is_automating(now, block_size, sample_rate);
            match p.read_block(now, block_size, sample_rate, a_rate) {
                BlockValues::KRate(v) => vec![v as f32; block_size],
                BlockValues::ARate(values) => values.iter().map(|&v| v as f32).collect(),
            }
        }
    }
}

struct NodeEntry {
    type_tag: String,
    generation: u32,
    inputs: Vec<InputSlot>,
    outputs: Vec<Vec<f32>>,
    properties: PropertyMap,
    state: NodeState,
    suspended: bool,
    last_processed_tick: u64,
    node_impl: Box<dyn Node>,
}

impl NodeEntry {
    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn is_subgraph(&self) -> bool {
        self.node_impl.is_subgraph()
    }
}

enum BgTask {
    Run(Box<dyn FnOnce() + Send>),
    Terminate,
}

struct ServerInner {
    slab: Vec<Option<NodeEntry>>,
    free_list: Vec<u32>,
    generations: Vec<u32>,
    tick: u64,
    output_node: Option<NodeId>,
    plan_dirty: bool,
    plan: Plan,
    mix_matrices: MixMatrixRegistry,
}

struct ServerShared {
    inner: Mutex<ServerInner>,
    // Separate from `inner`: a factory's closure calls back into
    // `register_node`, which locks `inner` again. Sharing one mutex
    // between the graph and the registry would deadlock on that call.
    registry: Mutex<NodeRegistry>,
    bg_sender: mpsc::Sender<BgTask>,
    sample_rate: f32,
    block_size: usize,
    #[allow(dead_code)]
    mixahead: usize,
}

struct NodeToken {
    id: NodeId,
    shared: Arc<ServerShared>,
}

impl Drop for NodeToken {
    fn drop(&mut self) {
        let id = self.id;
        let shared = self.shared.clone();
        let _ = self.shared.bg_sender.send(BgTask::Run(Box::new(move || {
            if let Ok(mut inner) = shared.inner.lock() {
                inner.destroy_node(id);
            }
        })));
    }
}

/// A strong, reference-counted reference to a node. The node is destroyed
/// (its slab slot freed) on a background worker thread once the last
/// `NodeHandle` drops, so audio-thread operations never free memory.
#[derive(Clone)]
pub struct NodeHandle {
    token: Arc<NodeToken>,
}

impl NodeHandle {
    /// This handle's stable node identity.
    pub fn id(&self) -> NodeId {
        self.token.id
    }

    /// Produces a weak reference that does not keep the node alive.
    pub fn downgrade(&self) -> WeakNodeHandle {
        WeakNodeHandle { token: Arc::downgrade(&self.token) }
    }
}

/// A non-owning reference to a node, upgradeable back to a [`NodeHandle`]
/// while the node is still alive.
#[derive(Clone)]
pub struct WeakNodeHandle {
    token: Weak<NodeToken>,
}

impl WeakNodeHandle {
    /// Attempts to upgrade to a strong handle.
    pub fn upgrade(&self) -> Option<NodeHandle> {
        self.token.upgrade().map(|token| NodeHandle { token })
    }
}

impl ServerInner {
    /// Reserves a slab slot, returning its index and the generation the
    /// occupant must be stamped with. Reused slots get the next generation
    /// for that index, so a stale `NodeId` from the prior occupant is
    /// rejected rather than silently aliasing the new one.
    fn reserve_slot(&mut self) -> (u32, u32) {
        if let Some(idx) = self.free_list.pop() {
            (idx, self.generations[idx as usize])
        } else {
            let idx = self.slab.len() as u32;
            self.slab.push(None);
            self.generations.push(0);
            (idx, 0)
        }
    }

    fn destroy_node(&mut self, id: NodeId) {
        let idx = id.index() as usize;
        if let Some(Some(entry)) = self.slab.get(idx) {
            if entry.generation != id.generation() {
                return;
            }
        } else {
            return;
        }
        self.slab[idx] = None;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_list.push(id.index());
        if self.output_node == Some(id) {
            self.output_node = None;
        }
        self.plan_dirty = true;
    }

    fn get_entry(&self, id: NodeId) -> EngineResult<&NodeEntry> {
        match self.slab.get(id.index() as usize).and_then(|e| e.as_ref()) {
            Some(entry) if entry.generation == id.generation() => Ok(entry),
            _ => Err(EngineError::InvalidHandle(id)),
        }
    }

    fn get_entry_mut(&mut self, id: NodeId) -> EngineResult<&mut NodeEntry> {
        match self.slab.get_mut(id.index() as usize).and_then(|e| e.as_mut()) {
            Some(entry) if entry.generation == id.generation() => Ok(entry),
            _ => Err(EngineError::InvalidHandle(id)),
        }
    }

    fn parents_of(&self, id: NodeId) -> Vec<NodeId> {
        match self.get_entry(id) {
            Ok(entry) => entry
                .inputs
                .iter()
                .filter_map(|slot| slot.connection())
                .map(|(parent, _)| parent)
                .filter(|p| self.slab.get(p.index() as usize).and_then(|e| e.as_ref()).is_some())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn is_paused(&self, id: NodeId) -> bool {
        matches!(self.get_entry(id).map(|e| e.state), Ok(NodeState::Paused))
    }

    fn always_playing_nodes(&self) -> Vec<NodeId> {
        self.slab
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                slot.as_ref().and_then(|e| {
                    matches!(e.state, NodeState::AlwaysPlaying).then(|| NodeId::new(idx as u32, e.generation))
                })
            })
            .collect()
    }
}

/// Owns the node graph, computes the execution plan, and drives ticks.
pub struct Server {
    shared: Arc<ServerShared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Server {
    /// Creates a new server with the given parameters, spawning its
    /// background worker thread.
    pub fn new(params: ServerParams) -> EngineResult<Self> {
        if params.sample_rate <= 0.0 {
            return Err(EngineError::Range { what: "sample_rate".into(), value: f64::from(params.sample_rate), min: 0.0, max: f64::MAX });
        }
        if params.block_size == 0 {
            return Err(EngineError::Range { what: "block_size".into(), value: 0.0, min: 1.0, max: f64::MAX });
        }

        let (tx, rx) = mpsc::channel::<BgTask>();
        let shared = Arc::new(ServerShared {
            inner: Mutex::new(ServerInner {
                slab: Vec::new(),
                free_list: Vec::new(),
                generations: Vec::new(),
                tick: 0,
                output_node: None,
                plan_dirty: true,
                plan: Plan::default(),
                mix_matrices: MixMatrixRegistry::with_defaults(),
            }),
            registry: Mutex::new(NodeRegistry::new()),
            bg_sender: tx,
            sample_rate: params.sample_rate,
            block_size: params.block_size,
            mixahead: params.mixahead,
        });

        let worker = thread::spawn(move || {
            for task in rx {
                match task {
                    BgTask::Run(f) => f(),
                    BgTask::Terminate => break,
                }
            }
        });

        info!(sample_rate = params.sample_rate, block_size = params.block_size, "server started");
        let server = Self { shared, worker: Some(worker) };
        server.register_builtin_node_types();
        Ok(server)
    }

    /// Registers the graph node types `resonant-core` itself provides.
    /// Nodes owned by downstream crates (effects, oscillators) register
    /// themselves via [`Server::register_node_type`] instead.
    fn register_builtin_node_types(&self) {
        self.register_node_type("multipanner", "amplitude/HRTF 3D spatializer", |server, _args| {
            server.register_node("multipanner", Box::new(crate::multipanner::MultipannerNode::new(None)), 1, crate::multipanner::MAX_CHANNELS)
        });
        crate::environment_node::register_environment_node_type(self);
    }

    /// Registers a node factory under `type_tag`, so it can later be built
    /// by name via [`Server::create_node`] (config-driven graphs, tests).
    pub fn register_node_type(
        &self,
        type_tag: impl Into<String>,
        description: impl Into<String>,
        factory: impl Fn(&mut Server, &NodeArgs) -> EngineResult<NodeHandle> + Send + Sync + 'static,
    ) {
        self.shared.registry.lock().unwrap().register(type_tag, description, factory);
    }

    /// Constructs a node by type tag, using whatever factory was registered
    /// under it (built-in or user-supplied).
    pub fn create_node(&mut self, type_tag: &str, args: &NodeArgs) -> EngineResult<NodeHandle> {
        let shared = self.shared.clone();
        let registry = shared.registry.lock().unwrap();
        registry.create(type_tag, self, args)
    }

    /// True if `type_tag` has a registered factory.
    pub fn has_node_type(&self, type_tag: &str) -> bool {
        self.shared.registry.lock().unwrap().contains(type_tag)
    }

    /// Server sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.shared.sample_rate
    }

    /// Server block size in samples.
    pub fn block_size(&self) -> usize {
        self.shared.block_size
    }

    /// Registers `node_impl` as a new node with `input_count` input slots
    /// and `output_count` output buffers, tagged `type_tag` for the
    /// registry/diagnostics.
    #[instrument(skip(self, node_impl))]
    pub fn register_node(
        &self,
        type_tag: &str,
        node_impl: Box<dyn Node>,
        input_count: usize,
        output_count: usize,
    ) -> EngineResult<NodeHandle> {
        let padded = simd_pad(self.shared.block_size);
        let mut properties = PropertyMap::new();
        properties.insert(PROPERTY_SLOT_MUL, Property::new(PropertyValue::Float(1.0)));
        properties.insert(PROPERTY_SLOT_ADD, Property::new(PropertyValue::Float(0.0)));
        node_impl.install_properties(&mut properties);

        let mut inner = self.shared.inner.lock().unwrap();
        let (idx, generation) = inner.reserve_slot();
        let entry = NodeEntry {
            type_tag: type_tag.to_string(),
            generation,
            inputs: vec![InputSlot::empty(); input_count],
            outputs: (0..output_count).map(|_| vec![0.0; padded]).collect(),
            properties,
            state: NodeState::Playing,
            suspended: false,
            last_processed_tick: u64::MAX,
            node_impl,
        };
        inner.slab[idx as usize] = Some(entry);
        let id = NodeId::new(idx, generation);
        inner.plan_dirty = true;
        debug!(node = ?id, type_tag, "node registered");
        drop(inner);

        Ok(NodeHandle { token: Arc::new(NodeToken { id, shared: self.shared.clone() }) })
    }

    /// Convenience factory for the node registry's unit tests: a one-in,
    /// one-out node that copies its input straight to its output.
    pub fn create_passthrough_node(&mut self, channels: usize) -> EngineResult<NodeHandle> {
        struct Passthrough;
        impl Node for Passthrough {
            fn output_count(&self) -> usize {
                1
            }
            fn input_count(&self) -> usize {
                1
            }
            fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], _properties: &mut PropertyMap, ctx: &ProcessContext) {
                outputs[0][..ctx.block_size].copy_from_slice(&inputs[0][..ctx.block_size]);
            }
        }
        let _ = channels;
        self.register_node("passthrough", Box::new(Passthrough), 1, 1)
    }

    /// Sets the node whose output drives `get_block`.
    pub fn set_output_node(&self, handle: &NodeHandle) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.get_entry(handle.id())?;
        inner.output_node = Some(handle.id());
        inner.plan_dirty = true;
        Ok(())
    }

    /// Connects `node`'s input slot `slot_index` to `parent`'s output `parent_output`.
    pub fn connect(&self, node: NodeId, slot_index: u32, parent: NodeId, parent_output: u32) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.get_entry(parent)?;
        let entry = inner.get_entry_mut(node)?;
        let slot = entry
            .inputs
            .get_mut(slot_index as usize)
            .ok_or(EngineError::InvalidProperty { node, slot: slot_index })?;
        slot.connect(parent, parent_output);
        inner.plan_dirty = true;
        Ok(())
    }

    /// Disconnects `node`'s input slot `slot_index`.
    pub fn disconnect(&self, node: NodeId, slot_index: u32) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        let entry = inner.get_entry_mut(node)?;
        let slot = entry
            .inputs
            .get_mut(slot_index as usize)
            .ok_or(EngineError::InvalidProperty { node, slot: slot_index })?;
        slot.disconnect();
        inner.plan_dirty = true;
        Ok(())
    }

    /// Sets `node`'s processing state.
    pub fn set_state(&self, node: NodeId, state: NodeState) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        let entry = inner.get_entry_mut(node)?;
        entry.state = state;
        inner.plan_dirty = true;
        Ok(())
    }

    /// Sets `node`'s property at `slot` to `value`, enforcing any
    /// configured range.
    pub fn set_property(&self, node: NodeId, slot: u32, value: PropertyValue) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        let entry = inner.get_entry_mut(node)?;
        let property = entry.properties.get_mut(slot).ok_or(EngineError::InvalidProperty { node, slot })?;
        property.set(value)
    }

    /// Reads `node`'s property at `slot`, cloning its current value.
    pub fn get_property(&self, node: NodeId, slot: u32) -> EngineResult<PropertyValue> {
        let inner = self.shared.inner.lock().unwrap();
        let entry = inner.get_entry(node)?;
        entry
            .properties
            .get(slot)
            .map(|p| p.get().clone())
            .ok_or(EngineError::InvalidProperty { node, slot })
    }

    /// Schedules `automator` on `node`'s property at `slot`, to begin at
    /// `start_time` seconds from server start. `now` is derived from the
    /// server's own tick counter, the same way a node's `process` derives
    /// it for `Property::read_block`.
    pub fn schedule_automation(
        &self,
        node: NodeId,
        slot: u32,
        automator: Box<dyn Automator>,
        start_time: f64,
    ) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        let now = inner.tick as f64 * self.shared.block_size as f64 / f64::from(self.shared.sample_rate);
        let entry = inner.get_entry_mut(node)?;
        let property = entry.properties.get_mut(slot).ok_or(EngineError::InvalidProperty { node, slot })?;
        property.schedule(automator, start_time, now);
        Ok(())
    }

    /// Resets `node` (filter/delay histories, automation cursors); leaves
    /// connections and current property values intact.
    pub fn reset_node(&self, node: NodeId) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        let entry = inner.get_entry_mut(node)?;
        entry.node_impl.reset();
        Ok(())
    }

    /// Registers a custom mixing matrix for `(in_channels, out_channels)`.
    pub fn register_mix_matrix(&self, in_channels: usize, out_channels: usize, matrix: crate::mixmatrix::MixMatrix) {
        let mut inner = self.shared.inner.lock().unwrap();
        inner.mix_matrices.register(in_channels, out_channels, matrix);
    }

    /// Runs a closure on the background worker thread (non-realtime
    /// housekeeping; node destruction uses this same mechanism).
    pub fn enqueue_background(&self, task: impl FnOnce() + Send + 'static) {
        let _ = self.shared.bg_sender.send(BgTask::Run(Box::new(task)));
    }

    /// Renders one block into `out_buf`, which must hold `channels *
    /// block_size` samples. If `channels` differs from the output node's
    /// channel count and `apply_mix_matrix` is true, the registered (or
    /// identity-fallback) mixing matrix is applied per frame.
    #[instrument(skip(self, out_buf))]
    pub fn get_block(&self, out_buf: &mut [f32], channels: usize, apply_mix_matrix: bool) -> EngineResult<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        let block_size = self.shared.block_size;
        let sample_rate = self.shared.sample_rate;

        if inner.plan_dirty {
            let output = inner.output_node;
            let always_playing = inner.always_playing_nodes();
            let plan = build_plan(output, &always_playing, |id| inner.parents_of(id), |id| inner.is_paused(id))?;
            inner.plan = plan;
            inner.plan_dirty = false;
        }

        let order = inner.plan.order().to_vec();
        self.run_tick(&mut inner, &order, block_size, sample_rate)?;

        let output_channels = match inner.output_node {
            Some(id) => inner.get_entry(id).map(NodeEntry::output_count).unwrap_or(0),
            None => 0,
        };

        out_buf[..channels * block_size].fill(0.0);

        if let Some(output_id) = inner.output_node {
            let entry = inner.get_entry(output_id)?;
            if apply_mix_matrix && output_channels != channels && output_channels > 0 {
                let matrix = inner.mix_matrices.lookup(output_channels, channels);
                let mut in_frame = vec![0.0; output_channels];
                let mut out_frame = vec![0.0; channels];
                for s in 0..block_size {
                    for (c, buf) in entry.outputs.iter().enumerate() {
                        in_frame[c] = buf[s];
                    }
                    matrix.apply_frame(&in_frame, &mut out_frame);
                    for c in 0..channels {
                        out_buf[s * channels + c] = out_frame[c];
                    }
                }
            } else {
                let copy_channels = channels.min(output_channels);
                for c in 0..copy_channels {
                    for s in 0..block_size {
                        out_buf[s * channels + c] = entry.outputs[c][s];
                    }
                }
            }
        }

        Ok(())
    }

    fn run_tick(&self, inner: &mut ServerInner, order: &[NodeId], block_size: usize, sample_rate: f32) -> EngineResult<()> {
        inner.tick += 1;
        let tick = inner.tick;
        let ctx = ProcessContext { tick, sample_rate, block_size };

        for &id in order {
            Self::visit_and_process(inner, id, &ctx);
        }
        Ok(())
    }

    /// Processes `id` if it has not already run this tick, recursing into
    /// its live parents first (the plan already guarantees parents precede
    /// children, so this is a safety net, not the primary driver —
    /// `will_process_parents` still needs the per-node recursive call
    /// shape described by the tick protocol).
    fn visit_and_process(inner: &mut ServerInner, id: NodeId, ctx: &ProcessContext) {
        let idx = id.index() as usize;
        let Some(Some(entry)) = inner.slab.get(idx) else { return };
        if entry.generation != id.generation() || entry.last_processed_tick == ctx.tick {
            return;
        }

        // Detach this node's Box<dyn Node> so we can call into it (and
        // recurse into parents) without holding two live mutable borrows
        // into the slab simultaneously. NullNode is zero-sized, so this
        // causes no heap allocation.
        let mut node_impl = {
            let entry = inner.slab[idx].as_mut().unwrap();
            mem::replace(&mut entry.node_impl, Box::new(NullNode))
        };

        {
            // Detach this node's own property map too (it derives
            // `Default`), so `inner` is free of any live borrow into this
            // slot and the hook can reach sibling nodes through it.
            let mut properties = {
                let entry = inner.slab[idx].as_mut().unwrap();
                mem::take(&mut entry.properties)
            };
            let mut set_sibling_property = |sibling: NodeId, slot: u32, value: PropertyValue| -> EngineResult<()> {
                let entry = inner.get_entry_mut(sibling)?;
                let property = entry.properties.get_mut(slot).ok_or(EngineError::InvalidProperty { node: sibling, slot })?;
                property.set(value)
            };
            node_impl.will_process_parents(&mut properties, ctx, &mut set_sibling_property);
            let entry = inner.slab[idx].as_mut().unwrap();
            entry.properties = properties;
        }

        let connections: Vec<Option<(NodeId, u32)>> = {
            let entry = inner.slab[idx].as_ref().unwrap();
            entry.inputs.iter().map(InputSlot::connection).collect()
        };

        for conn in connections.iter().flatten() {
            Self::visit_and_process(inner, conn.0, ctx);
        }

        let (state, suspended, is_subgraph) = {
            let entry = inner.slab[idx].as_ref().unwrap();
            (entry.state, entry.suspended, entry.is_subgraph())
        };

        let padded = simd_pad(ctx.block_size);
        let mut scratch: Vec<Vec<f32>> = connections
            .iter()
            .map(|conn| {
                let mut buf = vec![0.0f32; padded];
                if let Some((parent, parent_out)) = conn {
                    if let Some(Some(parent_entry)) = inner.slab.get(parent.index() as usize) {
                        if parent_entry.generation == parent.generation() {
                            if let Some(parent_buf) = parent_entry.outputs.get(*parent_out as usize) {
                                let n = ctx.block_size.min(parent_buf.len()).min(buf.len());
                                buf[..n].copy_from_slice(&parent_buf[..n]);
                            }
                        }
                    }
                }
                buf
            })
            .collect();

        {
            let entry = inner.slab[idx].as_mut().unwrap();
            if matches!(state, NodeState::Paused) || suspended {
                for out in &mut entry.outputs {
                    out[..ctx.block_size].fill(0.0);
                }
            } else {
                let input_refs: Vec<&[f32]> = scratch.iter().map(Vec::as_slice).collect();
                node_impl.process(&input_refs, &mut entry.outputs, &mut entry.properties, ctx);

                if !is_subgraph {
                    let now = ctx.tick as f64 * ctx.block_size as f64 / f64::from(ctx.sample_rate);
                    let sample_rate = f64::from(ctx.sample_rate);
                    let mul = read_block_f32(entry.properties.get(PROPERTY_SLOT_MUL), now, ctx.block_size, sample_rate, 1.0);
                    let add = read_block_f32(entry.properties.get(PROPERTY_SLOT_ADD), now, ctx.block_size, sample_rate, 0.0);
                    let is_identity = mul.iter().all(|&m| m == 1.0) && add.iter().all(|&a| a == 0.0);
                    if !is_identity {
                        for out in &mut entry.outputs {
                            for i in 0..ctx.block_size {
                                out[i] = out[i] * mul[i] + add[i];
                            }
                        }
                    }
                }
            }
            entry.last_processed_tick = ctx.tick;
            entry.node_impl = node_impl;
        }

        scratch.clear();
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shared.bg_sender.send(BgTask::Terminate);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
