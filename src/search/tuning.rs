//! Named tuning constants the spec leaves as inline literals in its source
//! (§9, open question 3): pulled out here so a future port can retune
//! without touching the penalization/blessing algorithm itself.

/// A state within this fraction of the winner's cost gets its hashes
/// blessed into `permitted_hashes` for the next pass (spec §4.4,
/// "Termination": "within 20% of the winner").
pub const BLESS_COST_TOLERANCE: f64 = 0.20;

/// Added to a state's structural-hash penalty when its one-pass-back hash is
/// not in `permitted_hashes` (spec §4.4, "Structural-hash penalization").
pub const UNPERMITTED_HASH_PENALTY: u32 = 10;

/// Default coarse-to-fine pass count when `beam_size > 1` and interactive
/// mode is off (spec §6, `num_passes`).
pub const DEFAULT_NUM_PASSES: u32 = 5;
