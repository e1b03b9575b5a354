//! Structural hashing and the cross-pass "blessed hash" bookkeeping (spec
//! §4.4, "Structural-hash penalization" / "Termination").

use crate::loop_nest::{LoopNestId, Placement};
use crate::state::State;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A hash of a state's tree shape at a granularity keyed by `pass_idx`
/// (coarser at lower pass indices; exact meaning of "granularity" is left to
/// the front end — here it is simply mixed into the hash so `h1 != h0` for
/// `pass_idx != pass_idx - 1`, per spec `h1 = hash(pass_idx + 1)`).
pub fn structural_hash(state: &State, granularity: i32) -> u64 {
    let mut hasher = DefaultHasher::new();
    granularity.hash(&mut hasher);
    let arena = state.root.arena();
    for idx in 0..arena.len() {
        let node = arena.get(LoopNestId(idx));
        match node.placement {
            None => 0u8.hash(&mut hasher),
            Some(Placement::Inlined) => 1u8.hash(&mut hasher),
            Some(Placement::ComputeRoot) => 2u8.hash(&mut hasher),
            Some(Placement::ComputeAt { stage, loop_level }) => {
                3u8.hash(&mut hasher);
                stage.0.hash(&mut hasher);
                loop_level.hash(&mut hasher);
            }
        }
        if granularity >= 0 {
            // At finer granularities (pass_idx >= 0), tile sizes also
            // distinguish otherwise-identical shapes.
            node.tile_sizes.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Per-step occurrence counts of structural hashes, reset at the start of
/// each pass (spec: "`hashes` is a per-step map from structural hash to
/// occurrence count").
#[derive(Debug, Default)]
pub struct HashCounts(HashMap<u64, u32>);

impl HashCounts {
    pub fn new() -> Self {
        HashCounts(HashMap::new())
    }

    /// Increment and return the new count for `hash`.
    pub fn bump(&mut self, hash: u64) -> u32 {
        let entry = self.0.entry(hash).or_insert(0);
        *entry += 1;
        *entry
    }
}

/// Hashes blessed from a prior pass that exempt a state from the "not in
/// permitted_hashes" penalty bonus, keyed by the pass index that blessed
/// them.
#[derive(Debug, Default)]
pub struct PermittedHashes(HashMap<i32, std::collections::HashSet<u64>>);

impl PermittedHashes {
    pub fn new() -> Self {
        PermittedHashes(HashMap::new())
    }

    pub fn contains(&self, pass_idx: i32, hash: u64) -> bool {
        self.0.get(&pass_idx).is_some_and(|set| set.contains(&hash))
    }

    pub fn bless(&mut self, pass_idx: i32, hash: u64) {
        self.0.entry(pass_idx).or_default().insert(hash);
    }
}
