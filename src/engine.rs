//! Seam between the sync layer and the deterministic simulation.

use crate::domain::Snapshot;

/// Interface the sync layer consumes from the game simulation.
///
/// Implementations must be deterministic: two engines initialized with the
/// same seed and fed the same opponent snapshots and round seeds stay
/// identical forever. The sync layer supplies seeds and snapshots and
/// relies on that property instead of ever exchanging board state.
pub trait GameEngine {
    /// True once the simulation subsystem has finished loading. The
    /// game-start triggers stay dormant until this flips.
    fn is_ready(&self) -> bool;

    /// Round the local simulation is currently in, or `None` before the
    /// engine has been seeded.
    fn current_round(&self) -> Option<u32>;

    /// Serialize the local board for transmission to the peer.
    fn board_snapshot(&self) -> Snapshot;

    /// Seed a fresh game session. Called exactly once per session.
    fn init_with_seed(&mut self, seed: u64);

    /// Resolve the current round against the opponent's board, then
    /// advance to the next round.
    fn resolve_battle(&mut self, remote: Snapshot, round_seed: u64);
}
