//! Deterministic per-round seed derivation.
//!
//! The session seed is the only randomness that ever crosses the wire.
//! Every round after that, both peers derive the round's seed locally from
//! the session seed and their own round counter; identical inputs yield
//! identical values on any peer.

use rand::{rngs::SmallRng, Rng};

/// Session seeds are drawn uniformly from `[0, SESSION_SEED_RANGE)`.
pub const SESSION_SEED_RANGE: u64 = 1_000_000;

/// Spacing between consecutive round seeds.
pub const ROUND_SEED_STRIDE: u64 = 100;

/// Draw a fresh session seed. Host-side only; the guest never generates one.
pub fn generate_session_seed(rng: &mut SmallRng) -> u64 {
    rng.random_range(0..SESSION_SEED_RANGE)
}

/// Seed used to resolve one round's battle.
///
/// Pure in both arguments, no hidden state.
pub fn round_seed(session_seed: u64, round: u32) -> u64 {
    session_seed + u64::from(round) * ROUND_SEED_STRIDE
}
