//! Random dropout: amortizes a per-pipeline acceptance probability evenly
//! across every decision so that a state surviving all `2*|nodes|` decisions
//! has, in expectation, a `threshold / 100` chance of making it to the end
//! (spec §4.4, "Random dropout").

use rand::Rng;

/// Per-decision acceptance threshold derived from the overall
/// `random_dropout_percent`, amortized over `2 * num_nodes` decisions:
/// `t = (threshold/100)^(1 / (2*num_nodes)) * 100`.
pub fn per_decision_threshold(random_dropout_percent: u32, num_nodes: usize) -> f64 {
    if num_nodes == 0 {
        return 100.0;
    }
    let threshold = f64::from(random_dropout_percent) / 100.0;
    threshold.powf(1.0 / (2.0 * num_nodes as f64)) * 100.0
}

/// Whether to drop a candidate state, given `pending_len` states currently
/// available (dropout never fires with only one state left, spec scenario
/// 5: "the search still terminates because we never drop when only one
/// state remains").
pub fn should_drop(rng: &mut impl Rng, random_dropout_percent: u32, num_nodes: usize, pending_len: usize) -> bool {
    if pending_len <= 1 || random_dropout_percent >= 100 {
        return false;
    }
    let t = per_decision_threshold(random_dropout_percent, num_nodes);
    let r: f64 = rng.gen_range(0.0..100.0);
    r >= t
}
