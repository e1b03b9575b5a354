//! The function DAG: a dense-indexed, read-only description of a pipeline's
//! functions, their region-required/region-computed relationships, and the
//! producer/consumer edges between them (spec §4.3).
//!
//! Construction (from a [`build::PipelineDescription`]) happens once per
//! pipeline and is never mutated afterward; the search explores schedules by
//! building [`crate::loop_nest::LoopNestArena`] snapshots that reference this
//! DAG by index, never by cloning it.

pub mod build;
pub mod node;

pub use build::{build_dag, CallSpec, ComputeOpCounts, FuncDef, MachineParams, PipelineDescription, RegionComputedSpec};
pub use node::{
    Edge, EdgeId, Loop, Node, NodeId, NodeSet, PipelineFeatures, ProducerDimBounds,
    RegionComputedInfo, Stage, StageId,
};

use crate::error::{AutoschedulerError, AutoschedulerResult};
use crate::symbolic::Bindings;

/// The pipeline's function graph: nodes stored in reverse realization order
/// (an output's `NodeId` is always lower than any of its producers'), plus
/// the edges between them and a flat stage index.
#[derive(Debug, Clone)]
pub struct FunctionDag {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// `stage_id_to_node[StageId(i).0] == NodeId` owning that stage.
    pub stage_id_to_node: Vec<NodeId>,
    pub machine_params: MachineParams,
}

impl FunctionDag {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn stage(&self, id: StageId) -> &Stage {
        let node = self.stage_id_to_node[id.0];
        &self.nodes[node.0].stages[0]
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn num_stages(&self) -> usize {
        self.stage_id_to_node.len()
    }

    /// Outputs are always the lowest-id nodes with `is_output`. Consumers
    /// appear before producers, so this is just a linear scan from the front.
    pub fn outputs(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_output)
    }

    /// Propagate `required` (indexed by `NodeId`, one [`crate::span::Span`]
    /// per dimension) upstream through every edge exactly once, in increasing
    /// `NodeId` order (consumer before producer) — spec §4.3's
    /// `required_to_computed`. Returns the per-node region-computed spans
    /// that result from feeding each node's accumulated region-required
    /// through its `region_computed` description.
    pub fn required_to_computed(
        &self,
        mut required: Vec<Vec<crate::span::Span>>,
    ) -> AutoschedulerResult<Vec<Vec<crate::span::Span>>> {
        if required.len() != self.nodes.len() {
            return Err(AutoschedulerError::internal(format!(
                "required_to_computed expected {} node entries, got {}",
                self.nodes.len(),
                required.len()
            )));
        }
        let mut computed = vec![Vec::new(); self.nodes.len()];

        for idx in 0..self.nodes.len() {
            let node = &self.nodes[idx];
            let mut env: Bindings = Bindings::new();
            for (dim, span) in required[idx].iter().enumerate() {
                env.insert(format!("req{dim}"), *span);
            }
            let mut node_computed = Vec::with_capacity(node.dims);
            for info in &node.region_computed {
                node_computed.push(info.interval.substitute(&env));
            }
            computed[idx] = node_computed.clone();

            // Expand every outgoing edge's footprint into its producer's
            // region-required, keyed by this node's own loop variables
            // (here approximated by the node's region-computed, since the
            // minimal front end has no separate loop-variable binding).
            for &edge_id in &node.outgoing_edges {
                let edge = &self.edges[edge_id.0];
                let mut loop_env: Bindings = Bindings::new();
                for (dim, span) in node_computed.iter().enumerate() {
                    loop_env.insert(format!("x{dim}"), *span);
                }
                let producer_idx = edge.producer.0;
                if required[producer_idx].is_empty() {
                    required[producer_idx] =
                        vec![crate::span::Span::empty(); self.nodes[producer_idx].dims];
                }
                edge.expand_footprint(&loop_env, &mut required[producer_idx]);
            }
        }

        Ok(computed)
    }
}
