//! Construction of a [`FunctionDag`] from a [`PipelineDescription`] (spec
//! §4.3, steps 1-7). `PipelineDescription` stands in for the real compiler's
//! function/expression graph, which is out of this crate's scope.

use super::node::{
    Edge, EdgeId, Loop, Node, NodeId, NodeSet, PipelineFeatures, ProducerDimBounds,
    RegionComputedInfo, Stage, StageId,
};
use super::FunctionDag;
use crate::bounds::Layout;
use crate::error::{AutoschedulerError, AutoschedulerResult};
use crate::span::Span;
use crate::symbolic::{affine_decompose, Expr, Interval};
use std::collections::{HashMap, HashSet};

/// How a function's region-computed relates to its region-required for one
/// dimension (spec §4.3 step 3).
#[derive(Debug, Clone)]
pub enum RegionComputedSpec {
    /// `region_computed == region_required`.
    EqualsRequired,
    /// `region_computed == region_required union [c_min, c_max]` (the usual
    /// shape for a boundary-condition/clamp wrapper).
    UnionWithConstants { c_min: i64, c_max: i64 },
    /// An arbitrary interval, generally referencing `Expr::Var("req{dim}")`
    /// for this node's own region-required on that dimension.
    Custom(Interval),
}

/// One call site: `consumer` reads from `producer` at the per-producer-dimension
/// bounds given by `per_producer_dim`, each expressed in terms of the
/// consumer's own pure loop variables (`"x0"`, `"x1"`, ...).
#[derive(Debug, Clone)]
pub struct CallSpec {
    pub producer: String,
    pub per_producer_dim: Vec<Interval>,
    pub calls: u64,
}

/// Compute-op counters supplied directly by the front end for a stage,
/// standing in for walking the stage's compute expressions (spec §4.3 step
/// 7: "Details are delegated to the front end; the DAG only stores the
/// result").
#[derive(Debug, Clone, Default)]
pub struct ComputeOpCounts {
    pub adds: f64,
    pub muls: f64,
    pub divs: f64,
    pub other: f64,
    pub type_mask: [f64; 7],
}

/// The definition of one pipeline function.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub dims: usize,
    pub bytes_per_point: u32,
    pub is_input: bool,
    pub is_output: bool,
    pub is_wrapper: bool,
    pub is_pointwise: bool,
    pub is_boundary_condition: bool,
    pub vector_width: u32,
    pub region_computed: Vec<RegionComputedSpec>,
    pub calls: Vec<CallSpec>,
    pub estimated_region_required: Option<Vec<(i64, i64)>>,
    /// Fixed-size domain (e.g. an input image's known extent), if any;
    /// drives `Loop::bounds_are_constant`.
    pub constant_domain: Option<Vec<(i64, i64)>>,
    pub compute_ops: ComputeOpCounts,
}

impl FuncDef {
    fn req_var(dim: usize) -> String {
        format!("req{dim}")
    }
}

/// The top-level pipeline description: every function plus the outputs.
#[derive(Debug, Clone, Default)]
pub struct PipelineDescription {
    pub funcs: Vec<FuncDef>,
    pub outputs: Vec<String>,
}

/// Per-pipeline compute-resource hints, consumed by DAG construction and the
/// cost model alike.
#[derive(Debug, Clone, Copy)]
pub struct MachineParams {
    pub parallelism: u32,
}

impl Default for MachineParams {
    fn default() -> Self {
        MachineParams { parallelism: 8 }
    }
}

/// Build a [`FunctionDag`] from `desc` (spec §4.3 steps 1-7).
#[tracing::instrument(skip(desc, machine_params))]
pub fn build_dag(desc: &PipelineDescription, machine_params: &MachineParams) -> AutoschedulerResult<FunctionDag> {
    // Step 1: topological ordering (reverse realization order: consumers first).
    let order = topo_order(desc)?;
    let mut name_to_id: HashMap<String, NodeId> = HashMap::new();
    for (idx, name) in order.iter().enumerate() {
        name_to_id.insert(name.clone(), NodeId(idx));
    }
    let num_nodes = order.len();

    let mut nodes: Vec<Node> = Vec::with_capacity(num_nodes);
    let mut edges: Vec<Edge> = Vec::new();
    let mut stage_id_to_node: Vec<NodeId> = Vec::new();

    for (idx, name) in order.iter().enumerate() {
        let func = find_func(desc, name)?;
        let node_id = NodeId(idx);

        // Step 2: per-node symbolic region-required (for outputs: an estimate).
        let estimated_region_required = func.estimated_region_required.as_ref().map(|bounds| {
            bounds
                .iter()
                .map(|&(lo, hi)| Span::new(lo, hi, true))
                .collect()
        });

        // Step 3: per-node region-computed with fast-path detection.
        if func.region_computed.len() != func.dims {
            return Err(AutoschedulerError::internal(format!(
                "{}: region_computed has {} entries, expected {} (node dims)",
                name,
                func.region_computed.len(),
                func.dims
            )));
        }
        let mut region_computed = Vec::with_capacity(func.dims);
        for (dim, spec) in func.region_computed.iter().enumerate() {
            region_computed.push(region_computed_info(dim, spec));
        }
        let region_computed_all_common_cases = region_computed
            .iter()
            .all(|info| info.equals_required || info.equals_union_of_required_with_constants);

        // Layout: one stage (stage 0, pure) with `dims` loop dimensions.
        let layout = Layout::new(func.dims, &[func.dims]);

        // Step 4: per-stage loop metadata. Only a pure stage (index 0) in
        // this port's simplified function model.
        let stage_id = StageId(stage_id_to_node.len());
        stage_id_to_node.push(node_id);
        let loop_nest = build_loop_nest(func, &region_computed);
        let loop_nest_all_common_cases = loop_nest.iter().all(|l| l.equals_region_computed || l.bounds_are_constant);

        let mut features = PipelineFeatures {
            type_mask: func.compute_ops.type_mask,
            num_loads: func.calls.iter().map(|c| c.calls as f64).sum(),
            num_stores: 1.0,
            num_adds: func.compute_ops.adds,
            num_muls: func.compute_ops.muls,
            num_divs: func.compute_ops.divs,
            num_other_ops: func.compute_ops.other,
            points_computed_per_production: 1.0,
            vector_width: f64::from(func.vector_width.max(1)),
        };
        if features.type_mask.iter().all(|&m| m == 0.0) {
            // Default to "float" when the front end didn't specify a type.
            features.type_mask[5] = 1.0;
        }

        let stage = Stage {
            node: node_id,
            stage_index: 0,
            id: stage_id,
            max_id: 0, // patched once the total stage count is known
            name: name.clone(),
            sanitized_name: sanitize(name),
            loop_nest,
            loop_nest_all_common_cases,
            vector_width: func.vector_width.max(1),
            features,
            store_jacobian: None,
            incoming_edges: Vec::new(),
            dependencies: NodeSet::with_capacity(num_nodes),
        };

        nodes.push(Node {
            id: node_id,
            name: name.clone(),
            dims: func.dims,
            bytes_per_point: func.bytes_per_point,
            is_input: func.is_input,
            is_output: func.is_output,
            is_wrapper: func.is_wrapper,
            is_pointwise: func.is_pointwise,
            is_boundary_condition: func.is_boundary_condition,
            region_computed,
            region_computed_all_common_cases,
            layout,
            stages: vec![stage],
            outgoing_edges: Vec::new(),
            estimated_region_required,
        });
    }

    let max_stage_id = stage_id_to_node.len();
    for node in &mut nodes {
        for stage in &mut node.stages {
            stage.max_id = max_stage_id;
        }
    }

    // Step 5: edges.
    for idx in 0..num_nodes {
        let name = order[idx].clone();
        let func = find_func(desc, &name)?;
        let consumer_node = NodeId(idx);
        let consumer_stage = nodes[idx].stages[0].id;
        let consumer_vars: Vec<String> = (0..func.dims).map(|d| format!("x{d}")).collect();

        for call in &func.calls {
            let producer_id = *name_to_id.get(&call.producer).ok_or_else(|| {
                AutoschedulerError::internal(format!("{name}: unknown producer '{}'", call.producer))
            })?;
            if producer_id.0 <= consumer_node.0 {
                return Err(AutoschedulerError::internal(format!(
                    "DAG invariant violated: consumer '{name}' (id {}) must have a lower id than producer '{}' (id {})",
                    consumer_node.0, call.producer, producer_id.0
                )));
            }

            let mut bounds = Vec::with_capacity(call.per_producer_dim.len());
            for interval in &call.per_producer_dim {
                bounds.push(decompose_bounds(interval, &consumer_vars));
            }
            let all_bounds_affine = bounds.iter().all(|b| b.affine);

            let producer_dims = nodes[producer_id.0].dims;
            let jacobian = build_jacobian(producer_dims, &bounds, &consumer_vars)?;

            let edge_id = EdgeId(edges.len());
            let mut edge = Edge {
                id: edge_id,
                producer: producer_id,
                consumer_node,
                consumer_stage,
                bounds,
                calls: call.calls,
                all_bounds_affine,
                jacobians: Vec::new(),
            };
            edge.add_load_jacobian(jacobian);

            nodes[producer_id.0].outgoing_edges.push(edge_id);
            nodes[consumer_node.0].stages[0].incoming_edges.push(edge_id);
            edges.push(edge);
        }
    }

    // Step 6: dependency bitvectors. Nodes are stored consumer-first, so we
    // walk them in reverse storage order (producers first) — one pass
    // suffices because every producer's dependencies are finalized before
    // any of its consumers needs them.
    for idx in (0..num_nodes).rev() {
        let incoming: Vec<EdgeId> = nodes[idx].stages[0].incoming_edges.clone();
        let mut deps = NodeSet::with_capacity(num_nodes);
        for edge_id in &incoming {
            let producer_id = edges[edge_id.0].producer;
            deps.insert(producer_id);
            let producer_deps = nodes[producer_id.0].stages[0].dependencies.clone();
            deps.union_with(&producer_deps);
        }
        nodes[idx].stages[0].dependencies = deps;
    }

    Ok(FunctionDag {
        nodes,
        edges,
        stage_id_to_node,
        machine_params: *machine_params,
    })
}

fn region_computed_info(dim: usize, spec: &RegionComputedSpec) -> RegionComputedInfo {
    let req = Expr::var(FuncDef::req_var(dim));
    match spec {
        RegionComputedSpec::EqualsRequired => RegionComputedInfo {
            interval: Interval::new(req.clone(), req),
            equals_required: true,
            equals_union_of_required_with_constants: false,
            constant_min: 0,
            constant_max: 0,
        },
        RegionComputedSpec::UnionWithConstants { c_min, c_max } => RegionComputedInfo {
            interval: Interval::new(
                req.clone().min(Expr::constant(*c_min)),
                req.max(Expr::constant(*c_max)),
            ),
            equals_required: false,
            equals_union_of_required_with_constants: true,
            constant_min: *c_min,
            constant_max: *c_max,
        },
        RegionComputedSpec::Custom(interval) => RegionComputedInfo {
            interval: interval.clone(),
            equals_required: false,
            equals_union_of_required_with_constants: false,
            constant_min: 0,
            constant_max: 0,
        },
    }
}

fn build_loop_nest(func: &FuncDef, region_computed: &[RegionComputedInfo]) -> Vec<Loop> {
    // Innermost-first: dimension 0 is innermost by convention.
    (0..func.dims)
        .map(|dim| {
            let info = &region_computed[dim];
            let (bounds_are_constant, constant_min, constant_max) = match &func.constant_domain {
                Some(domain) => {
                    let (lo, hi) = domain[dim];
                    (true, Some(lo), Some(hi))
                }
                None => (false, None, None),
            };
            Loop {
                var: format!("x{dim}"),
                pure: true,
                rvar: false,
                min_expr: info.interval.min_expr.clone(),
                max_expr: info.interval.max_expr.clone(),
                pure_dim: Some(dim),
                equals_region_computed: true,
                bounds_are_constant,
                constant_min,
                constant_max,
            }
        })
        .collect()
}

fn decompose_bounds(interval: &Interval, consumer_vars: &[String]) -> ProducerDimBounds {
    let mut found: Option<(usize, i64, i64)> = None;
    let mut any_non_affine = false;
    for (idx, v) in consumer_vars.iter().enumerate() {
        match affine_decompose(&interval.max_expr, v) {
            Some((coeff, constant)) => {
                if coeff != 0 && found.is_none() {
                    found = Some((idx, coeff, constant));
                }
            }
            None => any_non_affine = true,
        }
    }
    let uses_max = interval.min_expr.contains_max() || interval.max_expr.contains_max();
    if any_non_affine {
        ProducerDimBounds {
            interval: interval.clone(),
            coeff: None,
            constant: None,
            consumer_dim: None,
            affine: false,
            uses_max,
        }
    } else if let Some((idx, coeff, constant)) = found {
        ProducerDimBounds {
            interval: interval.clone(),
            coeff: Some(coeff),
            constant: Some(constant),
            consumer_dim: Some(idx),
            affine: true,
            uses_max,
        }
    } else {
        let env = crate::symbolic::Bindings::new();
        let constant = crate::symbolic::eval(&interval.max_expr, &env).max();
        ProducerDimBounds {
            interval: interval.clone(),
            coeff: Some(0),
            constant: Some(constant),
            consumer_dim: None,
            affine: true,
            uses_max,
        }
    }
}

fn build_jacobian(
    producer_dims: usize,
    bounds: &[ProducerDimBounds],
    consumer_vars: &[String],
) -> AutoschedulerResult<crate::jacobian::LoadJacobian> {
    if producer_dims == 0 || consumer_vars.is_empty() {
        return Ok(crate::jacobian::LoadJacobian::scalar());
    }
    let mut jac = crate::jacobian::LoadJacobian::new(producer_dims, consumer_vars.len());
    for (row, bound) in bounds.iter().enumerate() {
        if !bound.affine {
            for col in 0..consumer_vars.len() {
                jac.set(row, col, crate::rational::OptionalRational::UNDEFINED);
            }
            continue;
        }
        for col in 0..consumer_vars.len() {
            let value = if bound.consumer_dim == Some(col) {
                crate::rational::OptionalRational::from_int(bound.coeff.unwrap_or(0))
            } else {
                crate::rational::OptionalRational::ZERO
            };
            jac.set(row, col, value);
        }
    }
    Ok(jac)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn find_func<'a>(desc: &'a PipelineDescription, name: &str) -> AutoschedulerResult<&'a FuncDef> {
    desc.funcs
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| AutoschedulerError::internal(format!("no such function: {name}")))
}

/// Reverse-realization-order topological sort: a post-order DFS over
/// consumer -> producer edges starting at the outputs, reversed so that
/// consumers precede the producers they call.
fn topo_order(desc: &PipelineDescription) -> AutoschedulerResult<Vec<String>> {
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    let mut post_order = Vec::new();

    fn visit(
        name: &str,
        desc: &PipelineDescription,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        post_order: &mut Vec<String>,
    ) -> AutoschedulerResult<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(AutoschedulerError::internal(format!(
                "pipeline graph is cyclic at '{name}'"
            )));
        }
        let func = find_func(desc, name)?;
        for call in &func.calls {
            visit(&call.producer, desc, visited, visiting, post_order)?;
        }
        visiting.remove(name);
        visited.insert(name.to_string());
        post_order.push(name.to_string());
        Ok(())
    }

    for output in &desc.outputs {
        visit(output, desc, &mut visited, &mut visiting, &mut post_order)?;
    }
    post_order.reverse();
    Ok(post_order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointwise_func(name: &str, calls: Vec<CallSpec>) -> FuncDef {
        let is_input = calls.is_empty();
        let constant_domain = is_input.then(|| vec![(0, 1023), (0, 1023)]);
        FuncDef {
            name: name.to_string(),
            dims: 2,
            bytes_per_point: 4,
            is_input,
            is_output: false,
            is_wrapper: false,
            is_pointwise: true,
            is_boundary_condition: false,
            vector_width: 8,
            region_computed: vec![RegionComputedSpec::EqualsRequired; 2],
            calls,
            estimated_region_required: None,
            constant_domain,
            compute_ops: ComputeOpCounts::default(),
        }
    }

    fn identity_call(producer: &str) -> CallSpec {
        CallSpec {
            producer: producer.to_string(),
            per_producer_dim: vec![
                Interval::new(Expr::var("x0"), Expr::var("x0")),
                Interval::new(Expr::var("x1"), Expr::var("x1")),
            ],
            calls: 1,
        }
    }

    #[test]
    fn two_node_pipeline_has_dense_reverse_realization_ids() {
        let mut out = pointwise_func("out", vec![identity_call("in")]);
        out.is_output = true;
        out.estimated_region_required = Some(vec![(0, 99), (0, 99)]);
        let input = pointwise_func("in", vec![]);

        let desc = PipelineDescription {
            funcs: vec![out, input],
            outputs: vec!["out".to_string()],
        };
        let dag = build_dag(&desc, &MachineParams::default()).unwrap();

        assert_eq!(dag.nodes.len(), 2);
        let out_node = dag.node_by_name("out").unwrap();
        let in_node = dag.node_by_name("in").unwrap();
        assert!(out_node.id.0 < in_node.id.0, "consumer must have a lower id than producer");
    }

    #[test]
    fn dependency_bitvector_is_transitively_closed() {
        let mut sharpen = pointwise_func("sharpen", vec![identity_call("blur")]);
        sharpen.is_output = true;
        sharpen.estimated_region_required = Some(vec![(0, 99), (0, 99)]);
        let blur = pointwise_func("blur", vec![identity_call("input")]);
        let input = pointwise_func("input", vec![]);

        let desc = PipelineDescription {
            funcs: vec![sharpen, blur, input],
            outputs: vec!["sharpen".to_string()],
        };
        let dag = build_dag(&desc, &MachineParams::default()).unwrap();

        let sharpen_node = dag.node_by_name("sharpen").unwrap();
        let blur_id = dag.node_by_name("blur").unwrap().id;
        let input_id = dag.node_by_name("input").unwrap().id;

        let deps = &sharpen_node.stages[0].dependencies;
        assert!(deps.contains(blur_id));
        assert!(deps.contains(input_id), "dependencies must be transitively closed through blur");
    }

    #[test]
    fn rejects_producer_called_out_of_order() {
        // A producer that (incorrectly) has a lower id than its consumer.
        let consumer = pointwise_func("consumer", vec![identity_call("producer")]);
        let producer = pointwise_func("producer", vec![identity_call("consumer")]);
        let desc = PipelineDescription {
            funcs: vec![consumer, producer],
            outputs: vec!["consumer".to_string()],
        };
        // This is a cyclic graph (consumer calls producer calls consumer),
        // which must be rejected as an internal invariant violation.
        assert!(build_dag(&desc, &MachineParams::default()).is_err());
    }
}
