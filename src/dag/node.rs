//! Node/Stage/Edge types that make up a [`crate::dag::FunctionDag`].

use crate::bounds::Layout;
use crate::jacobian::LoadJacobian;
use crate::symbolic::Interval;
use std::rc::Rc;

/// Dense, 0-based id of a [`Node`] within its [`crate::dag::FunctionDag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Dense, 0-based id of a [`Stage`], unique across the whole DAG (not just
/// within its node) — what the spec calls the "consecutive `(id, max_id)`
/// pair for perfect hashing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// A compact set of `NodeId`s, used for the per-stage `dependencies`
/// bitvector (spec: "indexed by Node id such that `dependencies[n.id]` iff
/// this stage is transitively downstream of `n`").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet(Vec<bool>);

impl NodeSet {
    pub fn with_capacity(num_nodes: usize) -> Self {
        NodeSet(vec![false; num_nodes])
    }

    pub fn insert(&mut self, id: NodeId) {
        self.0[id.0] = true;
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0[id.0]
    }

    pub fn union_with(&mut self, other: &NodeSet) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a = *a || *b;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().enumerate().filter_map(|(i, &b)| b.then_some(NodeId(i)))
    }
}

/// Per-dimension description of how a node's region-computed relates to its
/// region-required (spec §4.3 step 3).
#[derive(Debug, Clone)]
pub struct RegionComputedInfo {
    pub interval: Interval,
    /// Fast path: `region_computed[dim] == region_required[dim]`.
    pub equals_required: bool,
    /// Fast path: `region_computed[dim] == region_required[dim] union
    /// [constant_min, constant_max]` (e.g. boundary-condition extension).
    pub equals_union_of_required_with_constants: bool,
    pub constant_min: i64,
    pub constant_max: i64,
}

/// One loop level of a stage's default loop nest, innermost-first.
#[derive(Debug, Clone)]
pub struct Loop {
    pub var: String,
    pub pure: bool,
    pub rvar: bool,
    pub min_expr: crate::symbolic::Expr,
    pub max_expr: crate::symbolic::Expr,
    pub pure_dim: Option<usize>,
    /// Fast path: this loop's bound is syntactically identical to the
    /// node's region-computed interval for the same dimension.
    pub equals_region_computed: bool,
    pub bounds_are_constant: bool,
    pub constant_min: Option<i64>,
    pub constant_max: Option<i64>,
}

/// Opcode / access-pattern counters the cost model consumes. The first
/// [`PipelineFeatures::NUM_TYPE_MASK_FIELDS`] entries of
/// [`PipelineFeatures::as_feature_vector`] are "type-mask" fields the engine
/// skips when filling the cost model's feature tensor (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct PipelineFeatures {
    /// Presence mask of the scalar types touched by this stage (bool, i8,
    /// i16, i32, i64, f32, f64) — exactly 7 fields, skipped by the engine.
    pub type_mask: [f64; 7],
    pub num_loads: f64,
    pub num_stores: f64,
    pub num_adds: f64,
    pub num_muls: f64,
    pub num_divs: f64,
    pub num_other_ops: f64,
    pub points_computed_per_production: f64,
    pub vector_width: f64,
}

impl PipelineFeatures {
    pub const NUM_TYPE_MASK_FIELDS: usize = 7;

    /// Flatten into the tensor row the cost model expects: type-mask fields
    /// first, then the rest.
    pub fn as_feature_vector(&self) -> Vec<f64> {
        let mut v = self.type_mask.to_vec();
        v.extend_from_slice(&[
            self.num_loads,
            self.num_stores,
            self.num_adds,
            self.num_muls,
            self.num_divs,
            self.num_other_ops,
            self.points_computed_per_production,
            self.vector_width,
        ]);
        v
    }

    /// The feature fields after the type mask — what `set_pipeline_features`
    /// actually writes into the cost model's tensor.
    pub fn non_type_mask_fields(&self) -> Vec<f64> {
        self.as_feature_vector()[Self::NUM_TYPE_MASK_FIELDS..].to_vec()
    }
}

/// Directed producer -> consumer-stage edge.
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub producer: NodeId,
    pub consumer_node: NodeId,
    pub consumer_stage: StageId,
    pub bounds: Vec<ProducerDimBounds>,
    pub calls: u64,
    pub all_bounds_affine: bool,
    pub jacobians: Vec<LoadJacobian>,
}

impl Edge {
    /// Add a Jacobian, deduplicating via [`LoadJacobian::merge`] against
    /// every existing entry before appending a new one.
    pub fn add_load_jacobian(&mut self, jacobian: LoadJacobian) {
        for existing in &mut self.jacobians {
            if existing.merge(&jacobian) {
                return;
            }
        }
        self.jacobians.push(jacobian);
    }

    /// For each producer dimension, evaluate its `(min_expr, max_expr)` pair
    /// against `consumer_loop` and union the result into `producer_required`
    /// (spec §4.3, `Edge::expand_footprint`). Monotone: widening
    /// `consumer_loop` only ever widens the result, since `Interval::substitute`
    /// is built from monotone interval-arithmetic operators.
    pub fn expand_footprint(
        &self,
        consumer_loop: &crate::symbolic::Bindings,
        producer_required: &mut [crate::span::Span],
    ) {
        for (dim, bound) in self.bounds.iter().enumerate() {
            let footprint = bound.interval.substitute(consumer_loop);
            producer_required[dim] = producer_required[dim].union_with(&footprint);
        }
    }
}

/// Per-producer-dimension bound expression plus its precomputed affine
/// decomposition metadata.
#[derive(Debug, Clone)]
pub struct ProducerDimBounds {
    pub interval: Interval,
    pub coeff: Option<i64>,
    pub constant: Option<i64>,
    pub consumer_dim: Option<usize>,
    pub affine: bool,
    pub uses_max: bool,
}

/// One definition of a function: the pure stage (`stage_index == 0`) or an
/// update stage. Stages share a [`Node`] but own their own loop nest.
#[derive(Debug, Clone)]
pub struct Stage {
    pub node: NodeId,
    pub stage_index: usize,
    pub id: StageId,
    pub max_id: usize,
    pub name: String,
    pub sanitized_name: String,
    pub loop_nest: Vec<Loop>,
    pub loop_nest_all_common_cases: bool,
    pub vector_width: u32,
    pub features: PipelineFeatures,
    pub store_jacobian: Option<LoadJacobian>,
    pub incoming_edges: Vec<EdgeId>,
    pub dependencies: NodeSet,
}

impl Stage {
    pub fn pure_dims(&self) -> usize {
        self.loop_nest.iter().filter(|l| l.pure).count()
    }
}

/// A pipeline function: its dimensionality, flags, region-computed
/// description, bounds `Layout`, stages, and outgoing edges.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub dims: usize,
    pub bytes_per_point: u32,
    pub is_input: bool,
    pub is_output: bool,
    pub is_wrapper: bool,
    pub is_pointwise: bool,
    pub is_boundary_condition: bool,
    pub region_computed: Vec<RegionComputedInfo>,
    pub region_computed_all_common_cases: bool,
    pub layout: Rc<Layout>,
    pub stages: Vec<Stage>,
    pub outgoing_edges: Vec<EdgeId>,
    pub estimated_region_required: Option<Vec<crate::span::Span>>,
}

impl Node {
    pub fn stage(&self, idx: usize) -> &Stage {
        &self.stages[idx]
    }
}
