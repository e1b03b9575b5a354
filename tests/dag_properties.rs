//! Black-box properties of `FunctionDag` construction (spec §8, "DAG").

use pipeline_autoscheduler::dag::{
    build_dag, CallSpec, ComputeOpCounts, FuncDef, MachineParams, PipelineDescription,
    RegionComputedSpec,
};
use pipeline_autoscheduler::span::Span;
use pipeline_autoscheduler::symbolic::{Expr, Interval};
use std::collections::HashSet;

fn pointwise_func(name: &str, dims: usize, calls: Vec<CallSpec>) -> FuncDef {
    let is_input = calls.is_empty();
    let is_pointwise = calls.len() <= 1;
    let constant_domain = is_input.then(|| vec![(0, 255); dims]);
    FuncDef {
        name: name.to_string(),
        dims,
        bytes_per_point: 4,
        is_input,
        is_output: false,
        is_wrapper: false,
        is_pointwise,
        is_boundary_condition: false,
        vector_width: 4,
        region_computed: vec![RegionComputedSpec::EqualsRequired; dims],
        calls,
        estimated_region_required: None,
        constant_domain,
        compute_ops: ComputeOpCounts::default(),
    }
}

fn identity_call(producer: &str, dims: usize) -> CallSpec {
    CallSpec {
        producer: producer.to_string(),
        per_producer_dim: (0..dims)
            .map(|d| {
                let v = Expr::var(format!("x{d}"));
                Interval::new(v.clone(), v)
            })
            .collect(),
        calls: 1,
    }
}

fn stencil_call(producer: &str, dims: usize) -> CallSpec {
    CallSpec {
        producer: producer.to_string(),
        per_producer_dim: (0..dims)
            .map(|d| {
                let v = Expr::var(format!("x{d}"));
                Interval::new(v.clone().sub(Expr::constant(1)), v.add(Expr::constant(1)))
            })
            .collect(),
        calls: 3,
    }
}

fn diamond() -> PipelineDescription {
    let mut output = pointwise_func(
        "output",
        1,
        vec![identity_call("blur_y", 1), identity_call("sharpen", 1)],
    );
    output.is_output = true;
    output.estimated_region_required = Some(vec![(0, 99)]);
    let blur_y = pointwise_func("blur_y", 1, vec![stencil_call("blur_x", 1)]);
    let blur_x = pointwise_func("blur_x", 1, vec![stencil_call("input", 1)]);
    let sharpen = pointwise_func("sharpen", 1, vec![identity_call("input", 1)]);
    let input = pointwise_func("input", 1, vec![]);
    PipelineDescription {
        funcs: vec![output, blur_y, blur_x, sharpen, input],
        outputs: vec!["output".to_string()],
    }
}

#[test]
fn node_ids_are_dense_and_injective() {
    let dag = build_dag(&diamond(), &MachineParams::default()).unwrap();
    let ids: HashSet<usize> = dag.nodes.iter().map(|n| n.id.0).collect();
    assert_eq!(ids.len(), dag.nodes.len());
    assert_eq!(ids, (0..dag.nodes.len()).collect::<HashSet<_>>());
}

#[test]
fn consumers_precede_every_one_of_their_producers() {
    let dag = build_dag(&diamond(), &MachineParams::default()).unwrap();
    for edge in &dag.edges {
        assert!(
            edge.consumer_node.0 < edge.producer.0,
            "consumer {:?} must have a lower id than producer {:?}",
            edge.consumer_node,
            edge.producer
        );
    }
}

#[test]
fn dependencies_are_transitively_closed_across_the_diamond() {
    let dag = build_dag(&diamond(), &MachineParams::default()).unwrap();
    let output = dag.node_by_name("output").unwrap();
    let input_id = dag.node_by_name("input").unwrap().id;
    let deps = &output.stages[0].dependencies;
    // output depends on blur_y and sharpen directly, and transitively on
    // blur_x and input through blur_y.
    assert!(deps.contains(dag.node_by_name("blur_y").unwrap().id));
    assert!(deps.contains(dag.node_by_name("blur_x").unwrap().id));
    assert!(deps.contains(dag.node_by_name("sharpen").unwrap().id));
    assert!(deps.contains(input_id));
}

#[test]
fn expand_footprint_widens_monotonically_with_a_wider_consumer_loop() {
    let dag = build_dag(&diamond(), &MachineParams::default()).unwrap();
    let blur_x = dag.node_by_name("blur_x").unwrap();
    let edge = dag.edges.iter().find(|e| e.producer == blur_x.id).unwrap();

    let mut narrow_env = pipeline_autoscheduler::symbolic::Bindings::new();
    narrow_env.insert("x0".to_string(), Span::new(10, 10, true));
    let mut narrow_required = vec![Span::empty()];
    edge.expand_footprint(&narrow_env, &mut narrow_required);

    let mut wide_env = pipeline_autoscheduler::symbolic::Bindings::new();
    wide_env.insert("x0".to_string(), Span::new(0, 50, true));
    let mut wide_required = vec![Span::empty()];
    edge.expand_footprint(&wide_env, &mut wide_required);

    assert!(wide_required[0].contains(&narrow_required[0]));
}

#[test]
fn region_computed_all_common_cases_true_when_every_dim_equals_required() {
    let dag = build_dag(&diamond(), &MachineParams::default()).unwrap();
    for node in &dag.nodes {
        assert!(node.region_computed_all_common_cases, "{} should be a fast-path node", node.name);
    }
}

#[test]
fn cyclic_pipeline_is_rejected() {
    let a = pointwise_func("a", 1, vec![identity_call("b", 1)]);
    let b = pointwise_func("b", 1, vec![identity_call("a", 1)]);
    let desc = PipelineDescription { funcs: vec![a, b], outputs: vec!["a".to_string()] };
    assert!(build_dag(&desc, &MachineParams::default()).is_err());
}
