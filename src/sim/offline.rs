//! What players do while they are away: lie in ambush or scavenge.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::combat::{CombatOutcome, CombatRules, CombatSession, Fighter, roll_percent, roll_succeeds};
use super::context::TickContext;
use super::lock;
use super::signal::WorldEvent;
use super::system::{TickError, WorldSystem};
use crate::config::WorldConfig;
use crate::model::{GameTime, ItemId, OfflineMode, OfflineModeRecord, Player, PlayerClass, PlayerId, RegionKind};
use crate::store::{Collaborators, StoreError};

pub const MIN_SCAVENGE_CHANCE: i32 = 5;
pub const MAX_SCAVENGE_CHANCE: i32 = 80;
/// Upper bound of the random jitter added to an ambusher's intelligence.
pub const AMBUSH_JITTER: i32 = 20;
pub const RARE_FIND_CHANCE: f64 = 0.10;
const RARE_FINDS: [&str; 3] = ["medkit", "repair_kit", "ammo"];

#[derive(Debug, thiserror::Error)]
pub enum OfflineError {
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("dead players cannot go offline")]
    PlayerDead,

    #[error("region {0} not found")]
    RegionNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `clamp(30 + int/10 + class bonus - danger/2, 5, 80)` percent.
pub fn scavenge_chance(intelligence: i32, class: PlayerClass, danger: u32) -> u32 {
    let danger = i32::try_from(danger / 2).unwrap_or(i32::MAX);
    let raw = 30i32
        .saturating_add(intelligence / 10)
        .saturating_add(class.scavenge_bonus())
        .saturating_sub(danger);
    raw.clamp(MIN_SCAVENGE_CHANCE, MAX_SCAVENGE_CHANCE) as u32
}

fn base_haul(kind: RegionKind) -> &'static [(&'static str, u32, u32)] {
    match kind {
        RegionKind::Forest => &[("wood", 1, 3), ("herbs", 1, 2)],
        RegionKind::Urban => &[("metal", 1, 2), ("cloth", 1, 2), ("circuit", 0, 1)],
        RegionKind::Military => &[("ammo", 1, 3), ("metal", 2, 4), ("circuit", 1, 2)],
        RegionKind::Coast => &[("fish", 1, 2), ("salt", 1, 2), ("fuel", 0, 1)],
    }
}

/// Region-typed haul scaled by `1 + intelligence/100`. Items that round
/// down to nothing are left out.
pub fn scavenge_loot(kind: RegionKind, intelligence: i32, rng: &mut dyn RngCore) -> BTreeMap<ItemId, u32> {
    let multiplier = 1.0 + f64::from(intelligence.max(0)) / 100.0;
    let mut loot = BTreeMap::new();
    for &(item, lo, hi) in base_haul(kind) {
        let qty = (f64::from(rng.random_range(lo..=hi)) * multiplier).floor() as u32;
        if qty > 0 {
            *loot.entry(item.to_string()).or_insert(0) += qty;
        }
    }
    if rng.random_bool(RARE_FIND_CHANCE) {
        let rare = RARE_FINDS[rng.random_range(0..RARE_FINDS.len())];
        *loot.entry(rare.to_string()).or_insert(0) += 1;
    }
    loot
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbushReport {
    pub ambusher: PlayerId,
    pub target: PlayerId,
    pub region: String,
    pub outcome: CombatOutcome,
    pub rounds: u32,
    pub ambusher_hp: i32,
    pub target_hp: i32,
}

#[derive(Debug, Default)]
struct OfflineState {
    modes: BTreeMap<PlayerId, OfflineMode>,
    /// Region name to waiting ambushers.
    ambushers: BTreeMap<String, BTreeSet<PlayerId>>,
}

impl OfflineState {
    fn unregister(&mut self, player: PlayerId) -> OfflineMode {
        let previous = self.modes.remove(&player).unwrap_or_default();
        if let OfflineMode::Ambush { region } = &previous {
            if let Some(waiting) = self.ambushers.get_mut(region) {
                waiting.remove(&player);
                if waiting.is_empty() {
                    self.ambushers.remove(region);
                }
            }
        }
        previous
    }
}

pub struct OfflineActivityProcessor {
    collab: Collaborators,
    rules: CombatRules,
    scavenge_cooldown: Duration,
    state: Mutex<OfflineState>,
}

impl OfflineActivityProcessor {
    pub fn new(collab: Collaborators, config: &WorldConfig) -> Self {
        Self {
            collab,
            rules: CombatRules::from(&config.combat),
            scavenge_cooldown: config.scavenge_cooldown,
            state: Mutex::new(OfflineState::default()),
        }
    }

    /// Replace whatever mode the player had. Returns the previous mode.
    pub fn set_mode(&self, player_id: PlayerId, mode: OfflineMode) -> Result<OfflineMode, OfflineError> {
        let player = self
            .collab
            .players
            .get_player(player_id)?
            .ok_or(OfflineError::PlayerNotFound(player_id))?;
        if !player.is_alive() && mode != OfflineMode::None {
            return Err(OfflineError::PlayerDead);
        }
        if let OfflineMode::Ambush { region } = &mode {
            if self.collab.regions.get_region(region)?.is_none() {
                return Err(OfflineError::RegionNotFound(region.clone()));
            }
        }

        let mut state = lock(&self.state);
        let previous = state.unregister(player_id);
        match &mode {
            OfflineMode::None => {}
            OfflineMode::Ambush { region } => {
                state.ambushers.entry(region.clone()).or_default().insert(player_id);
                state.modes.insert(player_id, mode.clone());
            }
            OfflineMode::Scavenge { .. } => {
                state.modes.insert(player_id, mode.clone());
            }
        }
        tracing::info!(player_id, ?mode, "offline mode set");
        Ok(previous)
    }

    /// Lie in wait in `region`.
    pub fn start_ambush(&self, player_id: PlayerId, region: &str) -> Result<OfflineMode, OfflineError> {
        self.set_mode(player_id, OfflineMode::Ambush { region: region.to_string() })
    }

    /// Start scavenging; the first roll comes one cooldown from now.
    pub fn start_scavenging(&self, player_id: PlayerId) -> Result<OfflineMode, OfflineError> {
        let now = self.collab.clock.now();
        self.set_mode(player_id, OfflineMode::Scavenge { last_resolved: now })
    }

    pub fn mode(&self, player_id: PlayerId) -> OfflineMode {
        lock(&self.state).modes.get(&player_id).cloned().unwrap_or_default()
    }

    pub fn records(&self) -> Vec<OfflineModeRecord> {
        lock(&self.state)
            .modes
            .iter()
            .map(|(&player_id, mode)| OfflineModeRecord { player_id, mode: mode.clone() })
            .collect()
    }

    pub fn ambushers_in(&self, region: &str) -> Vec<PlayerId> {
        lock(&self.state)
            .ambushers
            .get(region)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Called when `mover` walks into `region`. The waiting ambusher with the
    /// best `intelligence + U[0,20]` springs; their registration is used up
    /// whatever the result.
    pub fn on_player_entered(
        &self,
        mover_id: PlayerId,
        region: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Option<AmbushReport>, OfflineError> {
        let candidates: Vec<PlayerId> = self
            .ambushers_in(region)
            .into_iter()
            .filter(|&id| id != mover_id)
            .collect();
        if candidates.is_empty() {
            return Ok(None);
        }
        let mut mover = self
            .collab
            .players
            .get_player(mover_id)?
            .ok_or(OfflineError::PlayerNotFound(mover_id))?;
        if !mover.is_alive() {
            return Ok(None);
        }

        let mut best: Option<(i32, Player)> = None;
        for id in candidates {
            let Some(candidate) = self.collab.players.get_player(id)? else {
                tracing::warn!(player_id = id, "ambusher record missing, skipped");
                continue;
            };
            if !candidate.is_alive() {
                continue;
            }
            let score = candidate.intelligence.saturating_add(rng.random_range(0..=AMBUSH_JITTER));
            if best.as_ref().is_none_or(|(top, _)| score > *top) {
                best = Some((score, candidate));
            }
        }
        let Some((_, mut ambusher)) = best else {
            return Ok(None);
        };

        {
            let mut state = lock(&self.state);
            let still_waiting = matches!(
                state.modes.get(&ambusher.id),
                Some(OfflineMode::Ambush { region: r }) if r == region
            );
            if !still_waiting {
                tracing::debug!(ambusher = ambusher.id, "ambusher already sprung elsewhere");
                return Ok(None);
            }
            state.unregister(ambusher.id);
        }

        let mut session = CombatSession::new(Fighter::player(&ambusher), Fighter::player(&mover));
        if self.rules.ambush_first_strike {
            session.first_strike(&self.rules, rng);
        }
        let outcome = session.fight_to_end(&self.rules, self.rules.max_ambush_rounds, rng);

        ambusher.apply_hp_delta(session.attacker.hp.max(0) - ambusher.hp);
        mover.apply_hp_delta(session.target.hp.max(0) - mover.hp);
        self.collab.players.update_player(&ambusher)?;
        self.collab.players.update_player(&mover)?;

        let report = AmbushReport {
            ambusher: ambusher.id,
            target: mover.id,
            region: region.to_string(),
            outcome,
            rounds: session.round,
            ambusher_hp: ambusher.hp,
            target_hp: mover.hp,
        };
        tracing::info!(
            ambusher = report.ambusher,
            target = report.target,
            region,
            ?outcome,
            rounds = report.rounds,
            "ambush sprung"
        );
        self.collab.tell(
            mover.id,
            &format!("{} ambushed you in {region}! You have {} HP left.", ambusher.name, mover.hp),
        );
        self.collab.tell(
            ambusher.id,
            &format!("Your ambush on {} in {region} ended: {outcome:?}. You have {} HP left.", mover.name, ambusher.hp),
        );
        Ok(Some(report))
    }

    fn due_scavengers(&self, now: GameTime) -> Vec<PlayerId> {
        lock(&self.state)
            .modes
            .iter()
            .filter_map(|(&id, mode)| match mode {
                OfflineMode::Scavenge { last_resolved } if now.since(*last_resolved) >= self.scavenge_cooldown => {
                    Some(id)
                }
                _ => None,
            })
            .collect()
    }

    fn scavenge_one(&self, player_id: PlayerId, ctx: &mut TickContext) -> Result<(), StoreError> {
        let Some(player) = self.collab.players.get_player(player_id)? else {
            tracing::warn!(player_id, "scavenger record missing, skipped");
            return Ok(());
        };
        if !player.is_alive() {
            return Ok(());
        }
        let Some(region) = self.collab.regions.get_region(&player.region)? else {
            tracing::warn!(player_id, region = %player.region, "scavenge region missing, skipped");
            return Ok(());
        };

        let chance = scavenge_chance(player.intelligence, player.class, region.danger);
        let success = roll_succeeds(roll_percent(ctx.rng), chance);
        let loot = if success {
            scavenge_loot(region.kind, player.intelligence, ctx.rng)
        } else {
            BTreeMap::new()
        };
        // All or nothing: a half-written haul is taken back so the retry on
        // the next tick cannot grant the same items twice.
        let mut granted: Vec<(&str, u32)> = Vec::with_capacity(loot.len());
        for (item, qty) in &loot {
            if let Err(e) = self.collab.inventory.add_item(player_id, item, *qty) {
                for (item, qty) in granted {
                    if let Err(undo) = self.collab.inventory.remove_item(player_id, item, qty) {
                        tracing::warn!(player_id, item, qty, error = %undo, "could not take back partial haul");
                    }
                }
                return Err(e);
            }
            granted.push((item.as_str(), *qty));
        }

        {
            let mut state = lock(&self.state);
            if let Some(OfflineMode::Scavenge { last_resolved }) = state.modes.get_mut(&player_id) {
                *last_resolved = ctx.now;
            }
        }

        tracing::debug!(player_id, region = %region.name, chance, success, "scavenge rolled");
        if success {
            let found: Vec<String> = loot.iter().map(|(item, qty)| format!("{item} x{qty}")).collect();
            self.collab
                .tell(player_id, &format!("While away you scavenged {}: {}.", region.name, found.join(", ")));
        }
        ctx.emit(WorldEvent::ScavengeResolved {
            player_id,
            region: region.name,
            success,
            loot,
        });
        Ok(())
    }
}

impl WorldSystem for OfflineActivityProcessor {
    fn name(&self) -> &str {
        "offline_scavenge"
    }

    fn tick(&self, ctx: &mut TickContext) -> Result<(), TickError> {
        let mut failed = 0;
        for player_id in self.due_scavengers(ctx.now) {
            if let Err(e) = self.scavenge_one(player_id, ctx) {
                failed += 1;
                tracing::warn!(player_id, error = %e, "scavenge failed");
            }
        }
        if failed > 0 {
            return Err(TickError::Failed {
                pass: "offline_scavenge",
                reason: format!("{failed} scavengers hit store errors"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn scavenge_chance_bounds() {
        assert_eq!(scavenge_chance(0, PlayerClass::Soldier, 0), 30);
        assert_eq!(scavenge_chance(50, PlayerClass::Scavenger, 40), 25);
        assert_eq!(scavenge_chance(0, PlayerClass::Soldier, 100), 5);
        assert_eq!(scavenge_chance(1_000, PlayerClass::Scavenger, 0), 80);
        assert_eq!(scavenge_chance(0, PlayerClass::Mechanic, 0), 35);
    }

    #[test]
    fn scavenge_loot_matches_region() {
        let mut rng = SmallRng::seed_from_u64(12);
        for _ in 0..200 {
            let loot = scavenge_loot(RegionKind::Forest, 0, &mut rng);
            let wood = loot.get("wood").copied().unwrap_or(0);
            assert!((1..=3).contains(&wood));
            assert!(loot.keys().all(|k| ["wood", "herbs", "medkit", "repair_kit", "ammo"].contains(&k.as_str())));
        }
    }

    #[test]
    fn intelligence_multiplies_haul() {
        let mut rng = SmallRng::seed_from_u64(12);
        for _ in 0..200 {
            let loot = scavenge_loot(RegionKind::Military, 100, &mut rng);
            // metal 2..=4, doubled
            let metal = loot["metal"];
            assert!((4..=8).contains(&metal) && metal % 2 == 0, "metal {metal}");
        }
    }
}
