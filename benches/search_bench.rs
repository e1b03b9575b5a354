use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pipeline_autoscheduler::cost_model::HeuristicCostModel;
use pipeline_autoscheduler::dag::{
    build_dag, CallSpec, ComputeOpCounts, FuncDef, MachineParams, PipelineDescription,
    RegionComputedSpec,
};
use pipeline_autoscheduler::symbolic::{Expr, Interval};
use pipeline_autoscheduler::{search, FunctionDag, SearchParams, Statistics};
use std::rc::Rc;

fn pointwise_func(name: &str, calls: Vec<CallSpec>) -> FuncDef {
    let is_input = calls.is_empty();
    let constant_domain = is_input.then(|| vec![(0, 1023)]);
    FuncDef {
        name: name.to_string(),
        dims: 1,
        bytes_per_point: 4,
        is_input,
        is_output: false,
        is_wrapper: false,
        is_pointwise: calls.len() <= 1,
        is_boundary_condition: false,
        vector_width: 8,
        region_computed: vec![RegionComputedSpec::EqualsRequired],
        calls,
        estimated_region_required: None,
        constant_domain,
        compute_ops: ComputeOpCounts::default(),
    }
}

fn identity_call(producer: &str) -> CallSpec {
    CallSpec {
        producer: producer.to_string(),
        per_producer_dim: vec![Interval::new(Expr::var("x0"), Expr::var("x0"))],
        calls: 1,
    }
}

fn chain_dag(depth: usize) -> FunctionDag {
    let mut funcs = vec![pointwise_func("input", vec![])];
    let mut prev = "input".to_string();
    for i in 0..depth {
        let name = format!("stage{i}");
        funcs.push(pointwise_func(&name, vec![identity_call(&prev)]));
        prev = name;
    }
    let out_idx = funcs.len() - 1;
    funcs[out_idx].is_output = true;
    funcs[out_idx].estimated_region_required = Some(vec![(0, 1023)]);
    let desc = PipelineDescription { funcs, outputs: vec![prev] };
    build_dag(&desc, &MachineParams::default()).unwrap()
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("beam_search");
    for depth in [4usize, 8] {
        let dag = chain_dag(depth);
        let params = SearchParams { beam_size: 8, num_passes: 2, ..SearchParams::default() };
        group.bench_with_input(BenchmarkId::from_parameter(depth), &dag, |b, dag| {
            b.iter(|| {
                let mut model = HeuristicCostModel::new(Rc::new(dag.clone()));
                let mut stats = Statistics::new();
                search(dag, &params, &mut model, &mut stats).unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
