//! "Choose-your-own-schedule" interactive mode: a pluggable policy so the
//! search driver never special-cases stdin (spec §4.4, "Interactive mode";
//! §9 design note).

use std::io::{self, BufRead, Write};

/// A one-line summary of a pending state shown to the user (or a scripted
/// test) before a selection is made.
#[derive(Debug, Clone)]
pub struct StateSummary {
    pub index: usize,
    pub cost: f64,
    pub num_decisions_made: u32,
}

/// Chooses one of `candidates` by index. Implementations must re-prompt (or
/// otherwise never return an out-of-range index) rather than erroring, per
/// spec §7: "User input in interactive mode is re-prompted until it names a
/// valid index."
pub trait SelectionPolicy {
    fn select(&mut self, candidates: &[StateSummary]) -> usize;
}

/// Prompts on standard input, re-reading until a valid index is given.
pub struct StdinPolicy;

impl SelectionPolicy for StdinPolicy {
    fn select(&mut self, candidates: &[StateSummary]) -> usize {
        let stdin = io::stdin();
        loop {
            for c in candidates {
                println!("[{}] cost={:.3} decisions={}", c.index, c.cost, c.num_decisions_made);
            }
            print!("select a state> ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                continue;
            }
            if let Ok(idx) = line.trim().parse::<usize>() {
                if idx < candidates.len() {
                    return idx;
                }
            }
            println!("invalid selection, try again");
        }
    }
}

/// Replays a fixed sequence of indices, clamped to the candidate count at
/// each call (used by tests and end-to-end scenario 3).
pub struct ScriptedPolicy {
    selections: std::vec::IntoIter<usize>,
}

impl ScriptedPolicy {
    pub fn new(selections: Vec<usize>) -> Self {
        ScriptedPolicy { selections: selections.into_iter() }
    }
}

impl SelectionPolicy for ScriptedPolicy {
    fn select(&mut self, candidates: &[StateSummary]) -> usize {
        let idx = self.selections.next().unwrap_or(0);
        idx.min(candidates.len().saturating_sub(1))
    }
}
