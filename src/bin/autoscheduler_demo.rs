//! # Autoscheduler demo
//!
//! Builds a small synthetic diamond pipeline —
//! `input -> blur_x -> blur_y -> output` with a second `input -> sharpen ->
//! output` branch — and runs the beam search over it, printing the winning
//! schedule.
//!
//! ```bash
//! cargo run --bin autoscheduler-demo
//! ```

use pipeline_autoscheduler::config::{Config, SearchParams};
use pipeline_autoscheduler::cost_model::HeuristicCostModel;
use pipeline_autoscheduler::dag::{build_dag, CallSpec, ComputeOpCounts, FuncDef, MachineParams, PipelineDescription, RegionComputedSpec};
use pipeline_autoscheduler::statistics::Statistics;
use pipeline_autoscheduler::symbolic::{Expr, Interval};
use std::rc::Rc;

fn stencil_call(producer: &str, stencil_dim: usize, radius: i64, dims: usize) -> CallSpec {
    let per_producer_dim = (0..dims)
        .map(|d| {
            let v = Expr::var(format!("x{d}"));
            if d == stencil_dim {
                Interval::new(v.clone().sub(Expr::constant(radius)), v.add(Expr::constant(radius)))
            } else {
                Interval::new(v.clone(), v)
            }
        })
        .collect();
    CallSpec { producer: producer.to_string(), per_producer_dim, calls: (2 * radius + 1) as u64 }
}

fn identity_call(producer: &str, dims: usize) -> CallSpec {
    let per_producer_dim = (0..dims)
        .map(|d| {
            let v = Expr::var(format!("x{d}"));
            Interval::new(v.clone(), v)
        })
        .collect();
    CallSpec { producer: producer.to_string(), per_producer_dim, calls: 1 }
}

fn pointwise_func(name: &str, dims: usize, calls: Vec<CallSpec>) -> FuncDef {
    FuncDef {
        name: name.to_string(),
        dims,
        bytes_per_point: 4,
        is_input: calls.is_empty(),
        is_output: false,
        is_wrapper: false,
        is_pointwise: calls.len() <= 1,
        is_boundary_condition: false,
        vector_width: 8,
        region_computed: vec![RegionComputedSpec::EqualsRequired; dims],
        calls,
        estimated_region_required: None,
        constant_domain: None,
        compute_ops: ComputeOpCounts { adds: 4.0, muls: 1.0, divs: 0.0, other: 0.0, type_mask: [0.0; 7] },
    }
}

fn build_diamond_pipeline() -> PipelineDescription {
    const DIMS: usize = 2;
    const WIDTH: i64 = 1920;
    const HEIGHT: i64 = 1080;

    let mut input = pointwise_func("input", DIMS, vec![]);
    input.constant_domain = Some(vec![(0, WIDTH - 1), (0, HEIGHT - 1)]);

    let blur_x = pointwise_func("blur_x", DIMS, vec![stencil_call("input", 0, 1, DIMS)]);
    let blur_y = pointwise_func("blur_y", DIMS, vec![stencil_call("blur_x", 1, 1, DIMS)]);
    let sharpen = pointwise_func("sharpen", DIMS, vec![identity_call("input", DIMS)]);

    let mut output = pointwise_func(
        "output",
        DIMS,
        vec![identity_call("blur_y", DIMS), identity_call("sharpen", DIMS)],
    );
    output.is_output = true;
    output.estimated_region_required = Some(vec![(0, WIDTH - 1), (0, HEIGHT - 1)]);

    PipelineDescription {
        funcs: vec![output, blur_y, blur_x, sharpen, input],
        outputs: vec!["output".to_string()],
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    let desc = build_diamond_pipeline();
    let dag = build_dag(&desc, &MachineParams::default())?;

    let params = SearchParams { beam_size: 8, num_passes: 3, ..config.search };
    let mut cost_model = HeuristicCostModel::new(Rc::new(dag.clone()));
    let mut statistics = Statistics::new();

    let winner = pipeline_autoscheduler::search(&dag, &params, &mut cost_model, &mut statistics)?;

    println!("winning schedule cost: {:.3}", winner.cost);
    println!("decisions made: {}", winner.num_decisions_made);
    println!("passes run: {}", statistics.passes.len());
    for pass in &statistics.passes {
        println!("  pass {}: winner cost {:.3}", pass.pass_idx, pass.winner_cost);
    }
    println!("states evaluated: {}", statistics.states_evaluated);
    println!("states dropped by dropout: {}", statistics.states_dropped_by_dropout);

    Ok(())
}
