#![cfg(feature = "std")]

//! Minimal deterministic auto-battler behind the [`GameEngine`] seam.
//!
//! Used by the demo binary and the integration tests. Two instances
//! initialized with the same seed produce identical squads, and a battle
//! resolved with the same round seed against the same opponent snapshot
//! plays out identically on both peers.

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{domain::Snapshot, engine::GameEngine};

/// Name, attack, health.
const ROSTER: &[(&str, i32, i32)] = &[
    ("Squire", 2, 3),
    ("Archer", 3, 1),
    ("Knight", 4, 4),
    ("Mage", 5, 2),
    ("Golem", 1, 8),
    ("Rogue", 3, 2),
];

const SQUAD_SIZE: usize = 5;

/// Safety cap on clash iterations; a squad with attack >= 1 on both
/// fronts always terminates far below this.
const MAX_CLASHES: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Unit {
    pub name: String,
    pub attack: i32,
    pub health: i32,
}

impl Unit {
    fn is_alive(&self) -> bool {
        self.health > 0
    }
}

/// Outcome of one round's battle from the local perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleResult {
    Victory,
    Defeat,
    Draw,
}

/// Deterministic squad engine.
///
/// Starts in a "loading" state so callers can model the real race between
/// a seed announcement arriving and the simulation finishing its load;
/// [`finish_loading`](SquadEngine::finish_loading) flips readiness.
pub struct SquadEngine {
    ready: bool,
    round: Option<u32>,
    squad: Vec<Unit>,
    results: Vec<BattleResult>,
    seeds_used: Vec<u64>,
}

impl SquadEngine {
    /// An engine that has not finished loading yet.
    pub fn new() -> Self {
        Self {
            ready: false,
            round: None,
            squad: Vec::new(),
            results: Vec::new(),
            seeds_used: Vec::new(),
        }
    }

    /// An engine that is ready immediately.
    pub fn ready_now() -> Self {
        let mut engine = Self::new();
        engine.ready = true;
        engine
    }

    /// Mark the simulation subsystem as loaded.
    pub fn finish_loading(&mut self) {
        self.ready = true;
    }

    /// Buff one unit between rounds; this is the demo's stand-in for a
    /// shop phase, letting the two peers' boards diverge locally.
    pub fn train(&mut self, unit: usize) {
        if let Some(u) = self.squad.get_mut(unit % SQUAD_SIZE) {
            u.attack += 1;
            u.health += 1;
        }
    }

    pub fn squad(&self) -> &[Unit] {
        &self.squad
    }

    pub fn results(&self) -> &[BattleResult] {
        &self.results
    }

    /// Round seeds consumed so far, in resolution order. Two peers in
    /// lockstep consume identical sequences.
    pub fn seeds_used(&self) -> &[u64] {
        &self.seeds_used
    }

    fn roll_squad(seed: u64) -> Vec<Unit> {
        let mut rng = SmallRng::seed_from_u64(seed);
        (0..SQUAD_SIZE)
            .map(|_| {
                let (name, attack, health) = ROSTER[rng.random_range(0..ROSTER.len())];
                let level = rng.random_range(1..=3);
                Unit {
                    name: name.to_string(),
                    attack: attack * level,
                    health: health * level,
                }
            })
            .collect()
    }

    /// Front units trade blows until one squad is wiped out.
    ///
    /// The two sides are put into a canonical order before any RNG draw,
    /// so both peers replay the identical battle from the identical seed
    /// and reach complementary results regardless of which side is
    /// "ours" locally.
    fn clash(ours: Vec<Unit>, theirs: Vec<Unit>, round_seed: u64) -> BattleResult {
        let swapped = Self::squad_key(&ours) > Self::squad_key(&theirs);
        let (mut first, mut second) = if swapped {
            (theirs, ours)
        } else {
            (ours, theirs)
        };

        let mut rng = SmallRng::seed_from_u64(round_seed);
        let mut clashes = 0;
        while !first.is_empty() && !second.is_empty() && clashes < MAX_CLASHES {
            clashes += 1;
            let first_crit: bool = rng.random_bool(0.1);
            let second_crit: bool = rng.random_bool(0.1);
            let first_hit = first[0].attack.max(1) * if first_crit { 2 } else { 1 };
            let second_hit = second[0].attack.max(1) * if second_crit { 2 } else { 1 };
            second[0].health -= first_hit;
            first[0].health -= second_hit;
            first.retain(Unit::is_alive);
            second.retain(Unit::is_alive);
        }
        let ours_standing = if swapped {
            !second.is_empty()
        } else {
            !first.is_empty()
        };
        let theirs_standing = if swapped {
            !first.is_empty()
        } else {
            !second.is_empty()
        };
        match (ours_standing, theirs_standing) {
            (true, false) => BattleResult::Victory,
            (false, true) => BattleResult::Defeat,
            _ => BattleResult::Draw,
        }
    }

    fn squad_key(squad: &[Unit]) -> Vec<u8> {
        bincode::serialize(squad).unwrap_or_default()
    }
}

impl Default for SquadEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine for SquadEngine {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn current_round(&self) -> Option<u32> {
        self.round
    }

    fn board_snapshot(&self) -> Snapshot {
        match bincode::serialize(&self.squad) {
            Ok(bytes) => Snapshot(bytes),
            Err(e) => {
                log::error!("snapshot serialization failed: {e}");
                Snapshot(Vec::new())
            }
        }
    }

    fn init_with_seed(&mut self, seed: u64) {
        self.squad = Self::roll_squad(seed);
        self.round = Some(1);
    }

    fn resolve_battle(&mut self, remote: Snapshot, round_seed: u64) {
        let theirs: Vec<Unit> = match bincode::deserialize(&remote.0) {
            Ok(units) => units,
            Err(e) => {
                log::warn!("undecodable opponent snapshot, treating as empty squad: {e}");
                Vec::new()
            }
        };
        let result = Self::clash(self.squad.clone(), theirs, round_seed);
        self.seeds_used.push(round_seed);
        self.results.push(result);
        self.round = self.round.map(|r| r + 1);
    }
}
