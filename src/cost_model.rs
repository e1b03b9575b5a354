//! The external cost-model interface (spec §4.5) and a reference
//! implementation (`HeuristicCostModel`, spec §4.5a) used by tests, benches,
//! and the demo binary.

use crate::dag::{FunctionDag, MachineParams, PipelineFeatures};
use crate::error::AutoschedulerResult;
use crate::loop_nest::Placement;
use crate::state::State;
use std::rc::Rc;

/// A black-box cost estimator the search engine drives synchronously (spec
/// §4.5). Implementors may use internal concurrency (the one place the
/// design allows it, §5) but must present these four calls as a blocking
/// sequence: `reset` once per pipeline, `set_pipeline_features` once per
/// pass, then any number of `enqueue_state`/`evaluate_costs` rounds.
pub trait CostModel {
    fn reset(&mut self);
    fn set_pipeline_features(&mut self, features: &[PipelineFeatures], parallelism: u32);
    fn enqueue_state(&mut self, state: Rc<State>);
    /// Populate `cost`/`cost_per_stage` on every enqueued state and return
    /// them in enqueue order, clearing the queue.
    fn evaluate_costs(&mut self) -> AutoschedulerResult<Vec<Rc<State>>>;
}

/// A deterministic heuristic cost model: not tuned, just enough signal for
/// the search to prefer smaller working sets and more parallelism. For each
/// decided node it sums an estimated per-production working-set footprint
/// (derived from the node's region-computed extents and `bytes_per_point`)
/// weighted by a constant per-point compute cost, then divides by an
/// approximate parallelism estimate. The DAG is frozen after construction
/// (spec §4.3 invariants), so it is safe to hand this model a long-lived
/// `Rc` to it up front rather than threading it through every call.
pub struct HeuristicCostModel {
    dag: Rc<FunctionDag>,
    parallelism: u32,
    pending: Vec<Rc<State>>,
}

impl HeuristicCostModel {
    pub fn new(dag: Rc<FunctionDag>) -> Self {
        let parallelism = dag.machine_params.parallelism;
        HeuristicCostModel { dag, parallelism, pending: Vec::new() }
    }

    /// A constant per-point compute weight derived from a stage's opcode
    /// counts, standing in for a real architecture's cycle model.
    fn compute_weight(features: &PipelineFeatures) -> f64 {
        1.0 + features.num_adds + features.num_muls + 2.0 * features.num_divs + features.num_other_ops
    }

    fn node_footprint_points(dag: &FunctionDag, node_idx: usize) -> f64 {
        let node = &dag.nodes[node_idx];
        node.region_computed
            .iter()
            .map(|info| {
                let span = crate::symbolic::eval(&info.interval.max_expr, &Default::default());
                (span.max() - span.min() + 1).max(1) as f64
            })
            .product()
    }

    fn evaluate_one(&self, state: &State) -> f64 {
        let dag = &*self.dag;
        let mut total = 0.0;
        for idx in 0..dag.nodes.len() {
            let loop_node = state.root.arena().get(crate::loop_nest::LoopNestId(idx));
            let stage = &dag.nodes[idx].stages[0];
            let points = Self::node_footprint_points(dag, idx);
            if matches!(loop_node.placement, Some(Placement::Inlined)) {
                // Inlined nodes recompute at every consumer point; approximate
                // by charging their compute weight with no footprint
                // amortization discount.
                total += Self::compute_weight(&stage.features) * points;
            } else {
                let bytes = f64::from(dag.nodes[idx].bytes_per_point) * points;
                total += Self::compute_weight(&stage.features) * points + bytes / 64.0;
            }
        }
        total / f64::from(self.parallelism.max(1))
    }
}

impl CostModel for HeuristicCostModel {
    fn reset(&mut self) {
        self.pending.clear();
    }

    fn set_pipeline_features(&mut self, _features: &[PipelineFeatures], parallelism: u32) {
        self.parallelism = parallelism.max(1);
    }

    fn enqueue_state(&mut self, state: Rc<State>) {
        self.pending.push(state);
    }

    #[tracing::instrument(skip(self))]
    fn evaluate_costs(&mut self) -> AutoschedulerResult<Vec<Rc<State>>> {
        let states = std::mem::take(&mut self.pending);
        // The cost model is the only component permitted internal
        // concurrency (spec §5).
        use rayon::prelude::*;
        let costs: Vec<f64> = states.par_iter().map(|s| self.evaluate_one(s)).collect();
        let mut out = Vec::with_capacity(states.len());
        for (state, cost) in states.into_iter().zip(costs) {
            let mut state = (*state).clone();
            state.cost = cost;
            if let Some(per_stage) = state.cost_per_stage.first_mut() {
                *per_stage = cost;
            }
            out.push(Rc::new(state));
        }
        Ok(out)
    }
}
