//! Search-run statistics: state counts, dropout/memoization counters, and
//! per-phase accumulated timings (spec §6: "Outputs: ...a Statistics record
//! (state counts, featurizations, memoization hits/misses, per-phase
//! accumulated times)").

use std::time::{Duration, Instant};

/// One pass's recorded winner cost, for tracking cost non-increase across
/// passes (spec §8, end-to-end scenario 2).
#[derive(Debug, Clone, Copy)]
pub struct PassRecord {
    pub pass_idx: i32,
    pub winner_cost: f64,
}

/// Accumulated counters and timings for a single search run.
#[derive(Debug)]
pub struct Statistics {
    pub states_expanded: u64,
    pub states_dropped_by_dropout: u64,
    pub cost_model_batches: u64,
    pub states_evaluated: u64,
    pub featurizations_cached_hits: u64,
    pub featurizations_cached_misses: u64,
    pub passes: Vec<PassRecord>,
    phase_timers: Vec<(&'static str, Duration)>,
    started_at: Instant,
}

impl Statistics {
    pub fn new() -> Self {
        Statistics {
            states_expanded: 0,
            states_dropped_by_dropout: 0,
            cost_model_batches: 0,
            states_evaluated: 0,
            featurizations_cached_hits: 0,
            featurizations_cached_misses: 0,
            passes: Vec::new(),
            phase_timers: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn record_dropout(&mut self) {
        self.states_dropped_by_dropout += 1;
    }

    pub fn record_expansion(&mut self) {
        self.states_expanded += 1;
    }

    pub fn record_evaluation_batch(&mut self, batch_len: usize) {
        self.cost_model_batches += 1;
        self.states_evaluated += batch_len as u64;
    }

    pub fn record_pass(&mut self, pass_idx: i32, winner_cost: f64) {
        self.passes.push(PassRecord { pass_idx, winner_cost });
    }

    pub fn record_memoization(&mut self, hit: bool) {
        if hit {
            self.featurizations_cached_hits += 1;
        } else {
            self.featurizations_cached_misses += 1;
        }
    }

    /// Record `duration` against `phase`, accumulating across repeated
    /// calls with the same phase name.
    pub fn record_phase(&mut self, phase: &'static str, duration: Duration) {
        if let Some(existing) = self.phase_timers.iter_mut().find(|(name, _)| *name == phase) {
            existing.1 += duration;
        } else {
            self.phase_timers.push((phase, duration));
        }
    }

    pub fn phase_duration(&self, phase: &str) -> Duration {
        self.phase_timers
            .iter()
            .find(|(name, _)| *name == phase)
            .map_or(Duration::ZERO, |(_, d)| *d)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether each recorded pass's winner cost is non-increasing, in pass
    /// order (spec §8, end-to-end scenario 2).
    pub fn costs_non_increasing_across_passes(&self) -> bool {
        self.passes.windows(2).all(|w| w[1].winner_cost <= w[0].winner_cost)
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Times a closure and records its duration against `phase` on `stats`.
pub fn timed<T>(stats: &mut Statistics, phase: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    stats.record_phase(phase, start.elapsed());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_durations_accumulate_across_calls() {
        let mut stats = Statistics::new();
        stats.record_phase("dag_build", Duration::from_millis(5));
        stats.record_phase("dag_build", Duration::from_millis(3));
        assert_eq!(stats.phase_duration("dag_build"), Duration::from_millis(8));
    }

    #[test]
    fn unrecorded_phase_reports_zero() {
        let stats = Statistics::new();
        assert_eq!(stats.phase_duration("nonexistent"), Duration::ZERO);
    }

    #[test]
    fn detects_cost_increase_across_passes() {
        let mut stats = Statistics::new();
        stats.record_pass(0, 10.0);
        stats.record_pass(1, 12.0);
        assert!(!stats.costs_non_increasing_across_passes());
    }

    #[test]
    fn accepts_non_increasing_pass_costs() {
        let mut stats = Statistics::new();
        stats.record_pass(0, 10.0);
        stats.record_pass(1, 8.0);
        stats.record_pass(2, 8.0);
        assert!(stats.costs_non_increasing_across_passes());
    }
}
