//! The coarse-to-fine beam-search engine (spec §4.4): pass loop, child
//! expansion, structural-hash penalization, dropout, and the optional
//! freeze-inline-compute-root pre-pass.

pub mod dropout;
pub mod hashing;
pub mod interactive;
pub mod queue;
pub mod tuning;

use crate::config::SearchParams;
use crate::cost_model::CostModel;
use crate::dag::{FunctionDag, NodeId};
use crate::error::{AutoschedulerError, AutoschedulerResult};
use crate::loop_nest::Placement;
use crate::state::{FrozenNodes, State};
use crate::statistics::Statistics;
use hashing::{structural_hash, HashCounts, PermittedHashes};
use interactive::{SelectionPolicy, StateSummary, StdinPolicy};
use queue::StateQueue;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;
use tuning::{BLESS_COST_TOLERANCE, DEFAULT_NUM_PASSES, UNPERMITTED_HASH_PENALTY};

/// Runs the full coarse-to-fine search and returns the single best terminal
/// [`State`] (spec §6, "Outputs: a single best State... and a Statistics
/// record"). Interactive mode (spec §4.4, "Interactive mode") prompts on
/// standard input via [`StdinPolicy`]; use [`search_with_policy`] to supply a
/// scripted policy instead.
#[tracing::instrument(skip(dag, cost_model, statistics))]
pub fn search(
    dag: &FunctionDag,
    params: &SearchParams,
    cost_model: &mut dyn CostModel,
    statistics: &mut Statistics,
) -> AutoschedulerResult<Rc<State>> {
    let mut stdin_policy = StdinPolicy;
    search_with_policy(dag, params, cost_model, statistics, &mut stdin_policy)
}

/// Same as [`search`], but routes interactive-mode child selection through
/// `policy` instead of always prompting on standard input. `policy` is
/// unused when `params.interactive` is `false`.
#[tracing::instrument(skip(dag, cost_model, statistics, policy))]
pub fn search_with_policy(
    dag: &FunctionDag,
    params: &SearchParams,
    cost_model: &mut dyn CostModel,
    statistics: &mut Statistics,
    policy: &mut dyn SelectionPolicy,
) -> AutoschedulerResult<Rc<State>> {
    let mut rng = StdRng::seed_from_u64(params.random_seed);
    let mut permitted = PermittedHashes::new();
    let mut frozen = FrozenNodes::default();

    cost_model.reset();
    let features: Vec<_> = dag.nodes.iter().map(|n| n.stages[0].features.clone()).collect();
    cost_model.set_pipeline_features(&features, dag.machine_params.parallelism);

    if params.freeze_inline_compute_root {
        let pre_pass_winner = run_pass(dag, params, -1, &frozen, cost_model, &mut permitted, &mut rng, statistics, policy)?;
        frozen = freeze_lowest_cost_stages(dag, &pre_pass_winner);
    }

    let num_passes = if params.beam_size == 1 || params.interactive {
        1
    } else if params.num_passes > 0 {
        params.num_passes
    } else {
        DEFAULT_NUM_PASSES
    };

    let mut winner = None;
    for pass_idx in 0..num_passes as i32 {
        let pass_winner = run_pass(dag, params, pass_idx, &frozen, cost_model, &mut permitted, &mut rng, statistics, policy)?;
        statistics.record_pass(pass_idx, pass_winner.cost);
        winner = Some(pass_winner);
    }

    winner.ok_or_else(|| AutoschedulerError::internal("search produced no winner despite >=1 pass"))
}

/// Run one coarse-to-fine pass to completion, returning its winning
/// terminal state (spec §4.4, "Pass loop" / "Termination"). In interactive
/// mode, each expansion round collapses the pending queue down to the single
/// state `policy` selects instead of keeping the full beam.
#[allow(clippy::too_many_arguments)]
fn run_pass(
    dag: &FunctionDag,
    params: &SearchParams,
    pass_idx: i32,
    frozen: &FrozenNodes,
    cost_model: &mut dyn CostModel,
    permitted: &mut PermittedHashes,
    rng: &mut StdRng,
    statistics: &mut Statistics,
    policy: &mut dyn SelectionPolicy,
) -> AutoschedulerResult<Rc<State>> {
    let num_nodes = dag.nodes.len();
    let mut pending = StateQueue::new();
    let mut q = StateQueue::new();
    pending.emplace(Rc::new(State::initial(dag)));

    let penalize = params.beam_size > 1 && params.num_passes > 1 && pass_idx >= 0;

    loop {
        if pending.is_empty() {
            crate::fatal!(
                "total mortality: beam search exhausted all pending states before finding a terminal state"
            );
        }

        let mut hashes = HashCounts::new();
        let mut expanded = 0u32;
        let mut survivors_for_blessing: Vec<Rc<State>> = Vec::new();

        while expanded < params.beam_size && !pending.is_empty() {
            let Some(mut s) = pending.pop() else { break };

            if s.is_terminal(num_nodes) {
                if pass_idx + 1 < params.num_passes as i32 {
                    bless_near_winner(&s, &pending, params, permitted, pass_idx);
                }
                return Ok(s);
            }

            if penalize && !s.penalized {
                let h1 = structural_hash(&s, pass_idx + 1);
                let h0 = structural_hash(&s, pass_idx - 1);
                let mut penalty = hashes.bump(h1);
                if pass_idx > 0 && !permitted.contains(pass_idx - 1, h0) {
                    penalty += UNPERMITTED_HASH_PENALTY;
                }
                if penalty > 1 {
                    let mut bumped = (*s).clone();
                    bumped.penalized = true;
                    bumped.cost *= f64::from(penalty);
                    for c in &mut bumped.cost_per_stage {
                        *c *= f64::from(penalty);
                    }
                    let bumped = Rc::new(bumped);
                    let worse_than_top = pending.top().is_some_and(|top| bumped.cost > top.cost);
                    if worse_than_top {
                        pending.emplace(bumped);
                        continue;
                    }
                    s = bumped;
                }
            }

            if dropout::should_drop(rng, params.random_dropout_percent, num_nodes, pending.size() + 1) {
                statistics.record_dropout();
                continue;
            }

            survivors_for_blessing.push(Rc::clone(&s));
            s.generate_children(dag, params.no_subtiling, frozen, |child| {
                q.emplace(Rc::new(child));
            });
            statistics.record_expansion();
            expanded += 1;
        }

        for state in q.drain_all() {
            cost_model.enqueue_state(state);
        }
        let mut scored = cost_model.evaluate_costs()?;
        statistics.record_evaluation_batch(scored.len());

        if params.interactive && !scored.is_empty() {
            let summaries: Vec<StateSummary> = scored
                .iter()
                .enumerate()
                .map(|(index, s)| StateSummary { index, cost: s.cost, num_decisions_made: s.num_decisions_made })
                .collect();
            let chosen = policy.select(&summaries).min(scored.len() - 1);
            scored = vec![scored.swap_remove(chosen)];
        }

        for s in scored {
            q.emplace(s);
        }
        q.resort();

        pending.swap(&mut q);
        q.clear();
    }
}

/// Bless the ancestor chain of every survivor within [`BLESS_COST_TOLERANCE`]
/// of `winner`'s cost (up to `beam_size` of them) into `permitted` at
/// `pass_idx` (spec §4.4, "Termination").
fn bless_near_winner(
    winner: &State,
    pending: &StateQueue,
    params: &SearchParams,
    permitted: &mut PermittedHashes,
    pass_idx: i32,
) {
    let cutoff = winner.cost * (1.0 + BLESS_COST_TOLERANCE);
    let mut blessed = 0u32;
    let mut bless_chain = |state: &State| {
        let mut cursor = Some(state);
        while let Some(s) = cursor {
            permitted.bless(pass_idx, structural_hash(s, pass_idx));
            cursor = s.parent.as_deref();
        }
    };
    bless_chain(winner);
    blessed += 1;
    for candidate in pending.iter_states() {
        if blessed >= params.beam_size {
            break;
        }
        if candidate.cost <= cutoff {
            bless_chain(&candidate);
            blessed += 1;
        }
    }
}

/// Sort nodes by their winning pass's summed per-stage cost ascending and
/// freeze the cheapest `num_nodes - floor(log2(num_nodes))` of them (spec
/// §4.4, "Coarse-to-fine driver"): frozen nodes keep whatever placement the
/// pre-pass winner gave them (inlined stays inlined, anything else is pinned
/// at compute-root).
fn freeze_lowest_cost_stages(dag: &FunctionDag, winner: &State) -> FrozenNodes {
    let num_nodes = dag.nodes.len();
    if num_nodes == 0 {
        return FrozenNodes::default();
    }
    let mut by_cost: Vec<(NodeId, f64)> = (0..num_nodes)
        .map(|idx| {
            let cost = winner.cost_per_stage.get(idx).copied().unwrap_or(0.0);
            (NodeId(idx), cost)
        })
        .collect();
    by_cost.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let freeze_count = num_nodes.saturating_sub((num_nodes as f64).log2().floor() as usize);
    let mut frozen = FrozenNodes::default();
    for (node_id, _) in by_cost.into_iter().take(freeze_count) {
        let loop_node = winner.root.arena().get(crate::loop_nest::LoopNestId(node_id.0));
        match loop_node.placement {
            Some(Placement::Inlined) => frozen.inlined_nodes.push(node_id),
            _ => frozen.compute_root_nodes.push(node_id),
        }
    }
    frozen
}

impl StateQueue {
    /// Iterate over every state currently resident without removing them —
    /// used only by blessing, which needs to inspect survivors without
    /// draining the queue mid-pass.
    pub fn iter_states(&self) -> impl Iterator<Item = Rc<State>> + '_ {
        self.snapshot().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchParams;
    use crate::cost_model::HeuristicCostModel;
    use crate::dag::{build_dag, CallSpec, ComputeOpCounts, FuncDef, MachineParams, PipelineDescription, RegionComputedSpec};

    fn single_node_dag() -> FunctionDag {
        let out = FuncDef {
            name: "out".to_string(),
            dims: 1,
            bytes_per_point: 4,
            is_input: false,
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
        let desc = PipelineDescription { funcs: vec![out], outputs: vec!["out".to_string()] };
        build_dag(&desc, &MachineParams::default()).unwrap()
    }

    #[test]
    fn single_node_beam_one_reaches_a_terminal_state() {
        let dag = single_node_dag();
        let params = SearchParams { beam_size: 1, ..SearchParams::default() };
        let mut model = HeuristicCostModel::new(Rc::new(dag.clone()));
        let mut stats = Statistics::new();
        let winner = search(&dag, &params, &mut model, &mut stats).unwrap();
        assert!(winner.is_terminal(dag.nodes.len()));
    }

    #[test]
    fn determinism_same_seed_same_winner_shape() {
        let dag = single_node_dag();
        let params = SearchParams { beam_size: 2, num_passes: 2, ..SearchParams::default() };
        let mut model_a = HeuristicCostModel::new(Rc::new(dag.clone()));
        let mut stats_a = Statistics::new();
        let winner_a = search(&dag, &params, &mut model_a, &mut stats_a).unwrap();

        let mut model_b = HeuristicCostModel::new(Rc::new(dag.clone()));
        let mut stats_b = Statistics::new();
        let winner_b = search(&dag, &params, &mut model_b, &mut stats_b).unwrap();

        assert_eq!(winner_a.cost, winner_b.cost);
        assert_eq!(winner_a.num_decisions_made, winner_b.num_decisions_made);
    }
}
