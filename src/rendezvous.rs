//! Turn-completion rendezvous for the round in flight.

use crate::{domain::Snapshot, engine::GameEngine, seed};

/// Tracks which sides have finished the current round and holds the
/// opponent's snapshot until resolution.
///
/// Resolution fires only when both readiness flags are set and a remote
/// snapshot is present; the instant it fires, all three fields reset, so
/// readiness recorded afterwards belongs to the next round.
#[derive(Debug, Default)]
pub struct TurnRendezvous {
    local_ready: bool,
    remote_ready: bool,
    remote_snapshot: Option<Snapshot>,
}

impl TurnRendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the local end-of-turn. Returns `false` if this round's local
    /// readiness was already recorded (duplicate end-turn events are
    /// dropped, not re-announced).
    pub fn mark_local_ready(&mut self) -> bool {
        if self.local_ready {
            return false;
        }
        self.local_ready = true;
        true
    }

    /// Record the peer's end-of-turn and store its snapshot. A duplicate
    /// announcement overwrites the stored snapshot.
    pub fn mark_remote_ready(&mut self, board: Snapshot) {
        self.remote_ready = true;
        self.remote_snapshot = Some(board);
    }

    pub fn local_ready(&self) -> bool {
        self.local_ready
    }

    pub fn remote_ready(&self) -> bool {
        self.remote_ready
    }

    /// Resolve the round if every precondition holds: both sides ready, a
    /// snapshot stored, a session seed present, and the engine far enough
    /// along to know its round. Returns the consumed round seed when the
    /// battle fired.
    ///
    /// State is cleared before control passes to the engine, so nothing
    /// recorded during resolution can leak into the finished round.
    pub fn try_resolve<E: GameEngine>(
        &mut self,
        session_seed: Option<u64>,
        engine: &mut E,
    ) -> Option<u64> {
        if !(self.local_ready && self.remote_ready && self.remote_snapshot.is_some()) {
            return None;
        }
        let session_seed = session_seed?;
        let round = engine.current_round()?;

        let board = self.remote_snapshot.take()?;
        self.local_ready = false;
        self.remote_ready = false;

        let round_seed = seed::round_seed(session_seed, round);
        engine.resolve_battle(board, round_seed);
        Some(round_seed)
    }

    /// Clear all per-round state. Used on session teardown.
    pub fn reset(&mut self) {
        self.local_ready = false;
        self.remote_ready = false;
        self.remote_snapshot = None;
    }
}
