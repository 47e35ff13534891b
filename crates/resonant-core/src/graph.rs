//! Topological planning: turns the output node (plus any always-playing
//! nodes) into a post-order list where every parent appears before every
//! child.
//!
//! Generalizes a compiled schedule over a fixed stereo topology to an
//! arbitrary node count and channel count, recomputed from scratch
//! whenever the graph's structure changes rather than incrementally
//! patched — planning only walks reachable nodes, not the whole slab,
//! and only runs once per structural change, never per sample.

use crate::error::{EngineError, EngineResult};
use crate::node::NodeId;

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
use std::collections::HashSet;

/// A topologically sorted list of nodes to process for one tick.
///
/// Held only for the duration of one block; the server does not retain a
/// `Plan` between calls so that a pending node destruction is not further
/// delayed by an indefinitely-held reference.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    order: Vec<NodeId>,
}

impl Plan {
    /// The planned visit order, parents before children.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

/// Builds a plan rooted at `output` plus every node in `always_playing`,
/// skipping any node for which `is_paused` returns true. `parents_of`
/// returns the live parent node ids feeding a node's active input slots.
///
/// Fails with [`EngineError::GraphCycle`] if the reachable subgraph
/// contains a cycle.
pub fn build_plan(
    output: Option<NodeId>,
    always_playing: &[NodeId],
    parents_of: impl Fn(NodeId) -> Vec<NodeId>,
    is_paused: impl Fn(NodeId) -> bool,
) -> EngineResult<Plan> {
    let mut order = Vec::new();
    let mut states: HashSet<NodeId> = HashSet::new();
    let mut in_progress: HashSet<NodeId> = HashSet::new();

    let mut roots: Vec<NodeId> = Vec::new();
    if let Some(o) = output {
        roots.push(o);
    }
    roots.extend_from_slice(always_playing);

    for root in roots {
        visit(root, &parents_of, &is_paused, &mut states, &mut in_progress, &mut order)?;
    }

    Ok(Plan { order })
}

fn visit(
    node: NodeId,
    parents_of: &impl Fn(NodeId) -> Vec<NodeId>,
    is_paused: &impl Fn(NodeId) -> bool,
    done: &mut HashSet<NodeId>,
    in_progress: &mut HashSet<NodeId>,
    order: &mut Vec<NodeId>,
) -> EngineResult<()> {
    if done.contains(&node) {
        return Ok(());
    }
    if in_progress.contains(&node) {
        return Err(EngineError::GraphCycle);
    }
    in_progress.insert(node);

    if !is_paused(node) {
        for parent in parents_of(node) {
            visit(parent, parents_of, is_paused, done, in_progress, order)?;
        }
    }

    in_progress.remove(&node);
    done.insert(node);
    order.push(node);
    Ok(())
}
