//! [`State`]: an immutable handle over a root [`LoopNest`] snapshot, a parent
//! link, and the cost-model's verdict on that snapshot (spec §3, "State /
//! LoopNest").

use crate::dag::FunctionDag;
use crate::loop_nest::{LoopNest, LoopNestId, LoopNestNode, Placement};
use std::rc::Rc;

/// An immutable search node: `Rc`-shared so sibling/child states can all
/// reference the same parent without cloning its cost vector.
#[derive(Debug, Clone)]
pub struct State {
    pub root: LoopNest,
    pub parent: Option<Rc<State>>,
    pub cost: f64,
    pub cost_per_stage: Vec<f64>,
    pub num_decisions_made: u32,
    pub penalized: bool,
}

impl State {
    /// The initial state: an empty root LoopNest and zero decisions (spec
    /// §4.4: "One State with an empty root LoopNest and
    /// `num_decisions_made = 0`").
    pub fn initial(dag: &FunctionDag) -> Self {
        State {
            root: LoopNest::empty(dag.nodes.len()),
            parent: None,
            cost: f64::INFINITY,
            cost_per_stage: vec![f64::INFINITY; dag.num_stages()],
            num_decisions_made: 0,
            penalized: false,
        }
    }

    /// Terminal iff every node has made both its decisions (spec §3: "two
    /// decisions per node: where to compute it and how to tile it").
    pub fn is_terminal(&self, num_nodes: usize) -> bool {
        self.num_decisions_made as usize == 2 * num_nodes
    }

    /// Build one child state that commits `decide` against `target` in the
    /// parent's LoopNest, bumping the decision counter by exactly one (spec
    /// §4.4, `enqueue_new_children`'s invariant).
    pub fn child_with_decision(
        self: &Rc<Self>,
        target: LoopNestId,
        decide: impl FnOnce(&mut LoopNestNode),
    ) -> State {
        self.child_with_decision_nested_in(target, None, decide)
    }

    /// Same as [`child_with_decision`](Self::child_with_decision), but when
    /// `nested_in` is given, also records `target` as a child of
    /// `nested_in`'s `LoopNestNode` — used when `decide` places `target` at
    /// a compute-at loop level of another node.
    pub fn child_with_decision_nested_in(
        self: &Rc<Self>,
        target: LoopNestId,
        nested_in: Option<LoopNestId>,
        decide: impl FnOnce(&mut LoopNestNode),
    ) -> State {
        State {
            root: self.root.derive_child_nested_in(target, nested_in, decide),
            parent: Some(Rc::clone(self)),
            cost: f64::INFINITY,
            cost_per_stage: self.cost_per_stage.clone(),
            num_decisions_made: self.num_decisions_made + 1,
            penalized: false,
        }
    }

    /// Generate every legal one-decision child of `self` (spec §4.4,
    /// `State::generate_children`), calling `enqueue` once per child. Decides
    /// nodes in ascending `NodeId` order: compute-site first, then tiling, so
    /// a node contributes exactly two decisions before the next node's first
    /// decision is offered (spec §4.4a: order is unconstrained beyond the
    /// total count, so this port fixes ascending-id for determinism).
    pub fn generate_children(
        self: &Rc<Self>,
        dag: &FunctionDag,
        no_subtiling: bool,
        frozen: &FrozenNodes,
        mut enqueue: impl FnMut(State),
    ) {
        let Some((target, decided_placement)) = self.next_undecided(dag) else {
            return;
        };

        if !decided_placement {
            // Compute-site decision: inline, compute-root, or compute-at one
            // ancestor consumer stage. Frozen nodes skip straight to their
            // pinned placement.
            if let Some(forced) = frozen.forced_placement(dag.nodes[target.0].id) {
                let child = self.child_with_decision(target, move |node| {
                    node.placement = Some(forced);
                });
                enqueue(child);
                return;
            }

            let node = &dag.nodes[target.0];
            let mut placements: Vec<(Placement, Option<LoopNestId>)> =
                vec![(Placement::Inlined, None), (Placement::ComputeRoot, None)];
            for &edge_id in &node.outgoing_edges {
                let edge = &dag.edges[edge_id.0];
                let consumer_stage = dag.stage(edge.consumer_stage);
                let owner = LoopNestId(dag.stage_id_to_node[edge.consumer_stage.0].0);
                for level in 0..consumer_stage.loop_nest.len() {
                    placements.push((
                        Placement::ComputeAt { stage: edge.consumer_stage, loop_level: level },
                        Some(owner),
                    ));
                }
            }
            for (placement, nested_in) in placements {
                let child = self.child_with_decision_nested_in(target, nested_in, move |n| {
                    n.placement = Some(placement);
                });
                enqueue(child);
            }
        } else {
            // Tiling decision: only compute-root / compute-at nodes tile;
            // inlined nodes have no loop nest of their own to tile, so they
            // get a single trivial "decision" with an empty tile vector.
            let placement = self.root.arena().get(target).placement;
            if matches!(placement, Some(Placement::Inlined)) {
                let child = self.child_with_decision(target, |n| {
                    n.tile_sizes = Vec::new();
                    n.tiling_decided = true;
                });
                enqueue(child);
                return;
            }

            let stage = &dag.nodes[target.0].stages[0];
            let dims = stage.pure_dims();
            for candidate in crate::loop_nest::tile_candidates(no_subtiling) {
                let tiles = vec![*candidate; dims];
                let child = self.child_with_decision(target, move |n| {
                    n.tile_sizes = tiles.clone();
                    n.tiling_decided = true;
                });
                enqueue(child);
            }
        }
    }

    /// The next node (by ascending id) missing a placement, or missing tiling
    /// given it already has one. Returns `(target, awaiting_tiling)`.
    fn next_undecided(&self, dag: &FunctionDag) -> Option<(LoopNestId, bool)> {
        for idx in 0..dag.nodes.len() {
            let id = LoopNestId(idx);
            let node = self.root.arena().get(id);
            if node.placement.is_none() {
                return Some((id, false));
            }
            if !node.tiling_decided {
                return Some((id, true));
            }
        }
        None
    }
}

/// Which nodes are frozen to a pinned placement after the
/// `freeze_inline_compute_root` pre-pass (spec §4.4): each frozen node is
/// either inlined or pinned at compute-root.
#[derive(Debug, Clone, Default)]
pub struct FrozenNodes {
    pub inlined_nodes: Vec<crate::dag::NodeId>,
    pub compute_root_nodes: Vec<crate::dag::NodeId>,
}

impl FrozenNodes {
    pub fn forced_placement(&self, node: crate::dag::NodeId) -> Option<Placement> {
        if self.inlined_nodes.contains(&node) {
            Some(Placement::Inlined)
        } else if self.compute_root_nodes.contains(&node) {
            Some(Placement::ComputeRoot)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{build_dag, CallSpec, ComputeOpCounts, FuncDef, MachineParams, PipelineDescription, RegionComputedSpec};

    fn single_node_dag() -> FunctionDag {
        let mut out = FuncDef {
            name: "out".to_string(),
            dims: 1,
            bytes_per_point: 4,
            is_input: true,
            is_output: true,
            is_wrapper: false,
            is_pointwise: true,
            is_boundary_condition: false,
            vector_width: 4,
            region_computed: vec![RegionComputedSpec::EqualsRequired],
            calls: Vec::<CallSpec>::new(),
            estimated_region_required: Some(vec![(0, 15)]),
            constant_domain: None,
            compute_ops: ComputeOpCounts::default(),
        };
        out.is_input = false;
        let desc = PipelineDescription { funcs: vec![out], outputs: vec!["out".to_string()] };
        build_dag(&desc, &MachineParams::default()).unwrap()
    }

    #[test]
    fn initial_state_has_zero_decisions() {
        let dag = single_node_dag();
        let state = State::initial(&dag);
        assert_eq!(state.num_decisions_made, 0);
        assert!(!state.is_terminal(dag.nodes.len()));
    }

    #[test]
    fn every_child_has_exactly_one_more_decision_than_parent() {
        let dag = single_node_dag();
        let state = Rc::new(State::initial(&dag));
        let mut children = Vec::new();
        state.generate_children(&dag, false, &FrozenNodes::default(), |c| children.push(c));
        assert!(!children.is_empty());
        for child in &children {
            assert_eq!(child.num_decisions_made, state.num_decisions_made + 1);
        }
    }

    #[test]
    fn single_node_pipeline_reaches_terminal_after_two_decisions() {
        let dag = single_node_dag();
        let mut state = Rc::new(State::initial(&dag));
        for _ in 0..2 {
            let mut children = Vec::new();
            state.generate_children(&dag, false, &FrozenNodes::default(), |c| children.push(c));
            state = Rc::new(children.into_iter().next().unwrap());
        }
        assert!(state.is_terminal(dag.nodes.len()));
    }
}
