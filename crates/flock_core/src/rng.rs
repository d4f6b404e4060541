//! Deterministic random stream derivation.
//!
//! Every random draw in the crate comes from a [`ChaCha8Rng`] keyed by the
//! episode seed, a logical stage label, and a stage-local index. Streams with
//! different labels or indices are independent, and the same triple always
//! reproduces the same sequence, so whole episodes replay bit for bit. Stage
//! labels are owned as `STAGE` constants by the modules that consume them.

use rand_chacha::ChaCha8Rng;
use rand_seeder::Seeder;

/// Construct the stream for the given `(seed, stage, index)` triple.
pub fn stage_rng(seed: u64, stage: &str, index: u64) -> ChaCha8Rng {
    Seeder::from(format!("{seed}:{stage}:{index}")).make_rng()
}
