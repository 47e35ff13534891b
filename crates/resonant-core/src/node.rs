//! Node identity, state, and the per-type processing trait.
//!
//! The bookkeeping a node needs to participate in the tick protocol (input
//! slots, output buffers, property map, `last_processed_tick`) lives on
//! [`crate::server::NodeEntry`], owned by the [`crate::server::Server`]'s
//! slab. What varies per node *type* is just [`Node::process`] and the
//! optional hooks below — this keeps the trait object-safe and the slab
//! homogeneous, splitting bookkeeping from behavior the same way a
//! `NodeKind`/`Effect` pairing would.

use crate::error::EngineResult;
use crate::property::{PropertyMap, PropertyValue};

/// Rounds `n` up to a multiple of 8 samples. Output buffers are sized to
/// this so autovectorized DSP loops never need a scalar remainder pass,
/// without requiring an `unsafe` aligned allocation.
pub const SIMD_LANES: usize = 8;

/// Rounds a buffer length up to the nearest SIMD-friendly multiple.
pub fn simd_pad(len: usize) -> usize {
    len.div_ceil(SIMD_LANES) * SIMD_LANES
}

/// Stable identity for a node inside one [`crate::server::Server`].
///
/// Pairs a slab index with a generation counter: when a slot is recycled
/// after destruction, a stale `NodeId` referring to the old generation is
/// rejected rather than silently aliasing the new occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Constructs a `NodeId` from a raw slab index and generation.
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slab index this id refers to.
    pub fn index(self) -> u32 {
        self.index
    }

    /// The generation recorded at creation time.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// The processing state of a node, checked each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Processed normally when reachable from the output node.
    Playing,
    /// Not processed; outputs are held at zero without calling `process()`.
    Paused,
    /// Processed every block even when unreachable from the output node
    /// (side-effect nodes: recorders, network senders).
    AlwaysPlaying,
}

/// One input slot: an optional connection to `(parent, parent_output_index)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputSlot {
    connection: Option<(NodeId, u32)>,
}

impl InputSlot {
    /// An unconnected input slot.
    pub const fn empty() -> Self {
        Self { connection: None }
    }

    /// The slot's current connection, if any.
    pub fn connection(&self) -> Option<(NodeId, u32)> {
        self.connection
    }

    /// Connects this slot to `(parent, parent_output)`.
    pub fn connect(&mut self, parent: NodeId, parent_output: u32) {
        self.connection = Some((parent, parent_output));
    }

    /// Disconnects this slot.
    pub fn disconnect(&mut self) {
        self.connection = None;
    }
}

/// Per-block context handed to [`Node::process`]: the current tick and the
/// server's sample rate, for nodes whose DSP primitives need it (e.g. a
/// node constructing a filter at first touch).
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Server-wide monotonic tick counter, incremented once per `get_block`.
    pub tick: u64,
    /// Server sample rate in Hz.
    pub sample_rate: f32,
    /// Number of samples in this block.
    pub block_size: usize,
}

/// Per-type node behavior. Object-safe so the server's slab can hold
/// `Box<dyn Node>` uniformly regardless of concrete node type.
pub trait Node: Send {
    /// Number of output buffers this node exposes.
    fn output_count(&self) -> usize;

    /// Number of input slots this node exposes.
    fn input_count(&self) -> usize;

    /// Registers this node's own properties (beyond the server's universal
    /// `mul`/`add` slots) into its freshly created property map. Called
    /// once, at registration time, before the node ever processes a block.
    fn install_properties(&self, _properties: &mut PropertyMap) {}

    /// Called before this node's parents are visited during the tick
    /// (step 2 of the tick protocol). Environments use this to refresh
    /// source positions so the multipanners they feed read fresh azimuth
    /// and elevation this same tick, even though a multipanner is itself
    /// a parent of the environment's output bus.
    ///
    /// `set_sibling_property` writes directly into another node's property
    /// map on the server's already-locked slab, bypassing `Server`'s own
    /// locking API — calling back into `Server::set_property` from here
    /// would deadlock on the mutex `get_block` is still holding.
    fn will_process_parents(
        &mut self,
        _properties: &mut PropertyMap,
        _ctx: &ProcessContext,
        _set_sibling_property: &mut dyn FnMut(NodeId, u32, PropertyValue) -> EngineResult<()>,
    ) {
    }

    /// Renders one block. `inputs[i]` is this node's i-th input slot's
    /// preallocated scratch buffer (already copied from the parent's
    /// relevant output slice, zeroed if the slot is disconnected).
    /// `outputs[i]` is this node's i-th output buffer, to be written in
    /// full.
    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [Vec<f32>], properties: &mut PropertyMap, ctx: &ProcessContext);

    /// Clears filter histories, delay-line contents, and automation
    /// cursors. Connections and property current-values are untouched.
    fn reset(&mut self) {}

    /// Subgraph nodes (multipanner, environment) skip the server's
    /// post-processing `mul`/`add` step — they inherit it from their
    /// internal output node, which already applied it.
    fn is_subgraph(&self) -> bool {
        false
    }
}

/// Zero-sized placeholder used to temporarily detach a node's `Box<dyn Node>`
/// from the slab while it is being processed, without heap allocation.
///
/// `mem::replace(&mut slot, Box::new(NullNode))` lets the server hold the
/// real node by value across a call into other nodes (parent recursion)
/// without two simultaneous mutable borrows into the slab — and because
/// `NullNode` is zero-sized, boxing it causes no heap traffic.
pub struct NullNode;

impl Node for NullNode {
    fn output_count(&self) -> usize {
        0
    }

    fn input_count(&self) -> usize {
        0
    }

    fn process(&mut self, _inputs: &[&[f32]], _outputs: &mut [Vec<f32>], _properties: &mut PropertyMap, _ctx: &ProcessContext) {}
}
