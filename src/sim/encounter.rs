//! Building-floor encounters and their decision windows.
//!
//! An encounter is claimed exactly once: by the player through
//! [`EncounterEngine::resolve`] or by the timer sweep through
//! [`EncounterEngine::expire`]. The claim is a remove from the active map
//! under the engine lock; whoever loses finds nothing to remove.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::combat::{CombatRules, CombatSession, Fighter, stealth_check};
use super::lock;
use super::population::{generate_zombies, zombie_drops};
use super::timers::TimerQueue;
use crate::config::WorldConfig;
use crate::id::IdGenerator;
use crate::model::{
    ActionKind, DayCycle, Encounter, EncounterAction, EncounterId, EncounterStatus, GameTime,
    ItemId, Player, PlayerId, RegionKind, ResolutionPath, TimerKind,
};
use crate::store::{Collaborators, StoreError};

/// Base loot draws for a quiet sneak past the floor.
pub const SNEAK_LOOT_DRAWS: u32 = 2;
/// Base loot draws for a cleared floor.
pub const CLEAR_LOOT_DRAWS: u32 = 5;
/// One extra draw per this much floor difficulty.
pub const DIFFICULTY_PER_DRAW: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum EncounterError {
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("dead players cannot explore")]
    PlayerDead,

    #[error("building {0} not found")]
    BuildingNotFound(String),

    #[error("building {building} has no floor {floor}")]
    FloorNotFound { building: String, floor: u32 },

    #[error("region {0} not found")]
    RegionNotFound(String),

    #[error("floor {floor} is already cleared")]
    AlreadyCleared { floor: u32 },

    #[error("already in an encounter")]
    AlreadyEncountering,

    #[error("on cooldown for another {}s", .remaining.as_secs())]
    OnCooldown { remaining: Duration },

    #[error("no active encounter")]
    NoActiveEncounter,

    #[error("the decision window has closed")]
    EncounterExpired,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EncounterError {
    /// User errors are safe to show the player verbatim.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, EncounterError::Store(_))
    }
}

/// Result of stepping onto a floor.
#[derive(Debug, Clone, PartialEq)]
pub enum FloorEntry {
    /// No zombies configured; nothing to decide.
    Safe { building_id: String, floor: u32 },
    Encounter(Encounter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncounterOutcome {
    pub encounter_id: EncounterId,
    pub player_id: PlayerId,
    pub building_id: String,
    pub floor: u32,
    /// What was asked for, or `Sneak` on timeout.
    pub requested: EncounterAction,
    /// What actually happened; a failed sneak becomes an attack.
    pub resolved_as: EncounterAction,
    pub path: ResolutionPath,
    pub zombies_killed: u32,
    pub damage_taken: u32,
    pub floor_cleared: bool,
    pub player_died: bool,
    pub loot: BTreeMap<ItemId, u32>,
}

impl EncounterOutcome {
    fn new(encounter: &Encounter, requested: EncounterAction, path: ResolutionPath) -> Self {
        Self {
            encounter_id: encounter.id,
            player_id: encounter.player_id,
            building_id: encounter.building_id.clone(),
            floor: encounter.floor,
            requested,
            resolved_as: requested,
            path,
            zombies_killed: 0,
            damage_taken: 0,
            floor_cleared: false,
            player_died: false,
            loot: BTreeMap::new(),
        }
    }

    fn summary(&self) -> String {
        if self.player_died {
            return format!("You were overwhelmed on floor {} and died.", self.floor);
        }
        let loot = if self.loot.is_empty() {
            "nothing".to_string()
        } else {
            self.loot.iter().map(|(item, qty)| format!("{item} x{qty}")).collect::<Vec<_>>().join(", ")
        };
        match self.resolved_as {
            EncounterAction::Sneak => format!("You slipped past the zombies on floor {}. Found: {loot}.", self.floor),
            EncounterAction::Attack => format!(
                "Floor {} cleared. Killed {}, took {} damage. Found: {loot}.",
                self.floor, self.zombies_killed, self.damage_taken
            ),
        }
    }
}

/// `draws` uniform picks from a floor's loot table, scaled by a class yield
/// bonus. Every item that was drawn at all yields at least one.
pub fn draw_loot(
    table: &[(ItemId, u32)],
    draws: u32,
    yield_bonus: f64,
    rng: &mut dyn RngCore,
) -> BTreeMap<ItemId, u32> {
    let mut loot = BTreeMap::new();
    if table.is_empty() {
        return loot;
    }
    for _ in 0..draws {
        let (item, qty) = &table[rng.random_range(0..table.len())];
        *loot.entry(item.clone()).or_insert(0) += *qty;
    }
    for qty in loot.values_mut() {
        *qty = ((f64::from(*qty) * (1.0 + yield_bonus)).floor() as u32).max(1);
    }
    loot
}

pub fn loot_draws(difficulty: u32, full: bool) -> u32 {
    let base = if full { CLEAR_LOOT_DRAWS } else { SNEAK_LOOT_DRAWS };
    base + difficulty / DIFFICULTY_PER_DRAW
}

pub struct EncounterEngine {
    collab: Collaborators,
    timers: Arc<TimerQueue>,
    rules: CombatRules,
    decision_window: Duration,
    entry_cooldown: Duration,
    cycle: DayCycle,
    ids: IdGenerator,
    /// Active encounters by player. Removal is the claim.
    active: Mutex<HashMap<PlayerId, Encounter>>,
}

impl EncounterEngine {
    pub fn new(collab: Collaborators, timers: Arc<TimerQueue>, config: &WorldConfig, cycle: DayCycle) -> Self {
        Self {
            collab,
            timers,
            rules: CombatRules::from(&config.combat),
            decision_window: config.decision_window,
            entry_cooldown: config.cooldowns.get(ActionKind::Loot),
            cycle,
            ids: IdGenerator::new(),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn active_encounter(&self, player_id: PlayerId) -> Option<Encounter> {
        lock(&self.active).get(&player_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    /// Abandon every open encounter without settling it. Used on shutdown,
    /// after the timer queue has been cleared, so no player is left holding
    /// an encounter that nothing can resolve.
    pub fn drop_pending(&self) -> usize {
        let dropped: Vec<Encounter> = lock(&self.active).drain().map(|(_, e)| e).collect();
        for encounter in &dropped {
            if let Some(timer_id) = encounter.timer_id {
                self.timers.cancel(timer_id);
            }
            tracing::info!(
                encounter_id = encounter.id,
                player_id = encounter.player_id,
                "pending encounter dropped"
            );
        }
        dropped.len()
    }

    pub fn enter_floor(
        &self,
        player_id: PlayerId,
        building_id: &str,
        floor: u32,
        rng: &mut dyn RngCore,
    ) -> Result<FloorEntry, EncounterError> {
        let now = self.collab.clock.now();
        let mut player = self.load_player(player_id)?;
        if !player.is_alive() {
            return Err(EncounterError::PlayerDead);
        }
        let building = self
            .collab
            .buildings
            .get_building(building_id)?
            .ok_or_else(|| EncounterError::BuildingNotFound(building_id.to_string()))?;
        let layout = building.floor(floor).cloned().ok_or_else(|| EncounterError::FloorNotFound {
            building: building_id.to_string(),
            floor,
        })?;
        if building.is_cleared_by(floor, player_id) {
            return Err(EncounterError::AlreadyCleared { floor });
        }
        let region_kind = if layout.zombies > 0 {
            Some(self.region_kind(&building.region)?)
        } else {
            None
        };

        let mut active = lock(&self.active);
        if active.contains_key(&player_id) {
            return Err(EncounterError::AlreadyEncountering);
        }
        if let Some(remaining) = player.cooldown_remaining(ActionKind::Loot, self.entry_cooldown, now) {
            return Err(EncounterError::OnCooldown { remaining });
        }
        player.record_action(ActionKind::Loot, now);
        self.collab.players.update_player(&player)?;

        let Some(region_kind) = region_kind else {
            drop(active);
            tracing::debug!(player_id, building = building_id, floor, "safe floor");
            self.collab.tell(player_id, &format!("Floor {floor} is quiet. Nothing here."));
            return Ok(FloorEntry::Safe {
                building_id: building_id.to_string(),
                floor,
            });
        };

        let zombies = generate_zombies(region_kind, layout.difficulty, layout.zombies, rng);
        let id = self.ids.next_id();
        let expires_at = now.saturating_add(self.decision_window);
        let timer_id = self
            .timers
            .schedule(player_id, TimerKind::EncounterTimeout { encounter_id: id }, expires_at);
        let encounter = Encounter {
            id,
            player_id,
            building_id: building_id.to_string(),
            floor,
            difficulty: layout.difficulty,
            zombies,
            status: EncounterStatus::Active,
            created_at: now,
            expires_at,
            timer_id: Some(timer_id),
        };
        active.insert(player_id, encounter.clone());
        drop(active);

        tracing::info!(
            encounter_id = id,
            player_id,
            building = building_id,
            floor,
            zombies = encounter.zombies.len(),
            "encounter started"
        );
        self.collab.tell(
            player_id,
            &format!(
                "{} zombies on floor {floor}. Sneak or attack within {}s.",
                encounter.zombies.len(),
                self.decision_window.as_secs()
            ),
        );
        Ok(FloorEntry::Encounter(encounter))
    }

    /// Player decision. Fails with `EncounterExpired` once the window has
    /// closed; the timer sweep owns that encounter from then on.
    pub fn resolve(
        &self,
        player_id: PlayerId,
        action: EncounterAction,
        rng: &mut dyn RngCore,
    ) -> Result<EncounterOutcome, EncounterError> {
        let now = self.collab.clock.now();
        let encounter = {
            let mut active = lock(&self.active);
            let current = active.get(&player_id).ok_or(EncounterError::NoActiveEncounter)?;
            if current.is_expired(now) {
                return Err(EncounterError::EncounterExpired);
            }
            let Some(mut claimed) = active.remove(&player_id) else {
                return Err(EncounterError::NoActiveEncounter);
            };
            claimed.status = EncounterStatus::Resolved;
            claimed
        };
        if let Some(timer_id) = encounter.timer_id {
            self.timers.cancel(timer_id);
        }
        self.settle(encounter, action, ResolutionPath::Player, now, rng)
    }

    /// Timer path: force a sneak. `Ok(None)` when the player got there first.
    pub fn expire(
        &self,
        player_id: PlayerId,
        encounter_id: EncounterId,
        rng: &mut dyn RngCore,
    ) -> Result<Option<EncounterOutcome>, EncounterError> {
        let now = self.collab.clock.now();
        let encounter = {
            let mut active = lock(&self.active);
            match active.get(&player_id) {
                Some(e) if e.id == encounter_id => {}
                _ => {
                    tracing::debug!(player_id, encounter_id, "timeout lost the race");
                    return Ok(None);
                }
            }
            let Some(mut claimed) = active.remove(&player_id) else {
                return Ok(None);
            };
            claimed.status = EncounterStatus::Resolved;
            claimed
        };
        tracing::info!(encounter_id, player_id, "decision window closed, forcing sneak");
        self.settle(encounter, EncounterAction::Sneak, ResolutionPath::Timeout, now, rng)
            .map(Some)
    }

    fn settle(
        &self,
        encounter: Encounter,
        requested: EncounterAction,
        path: ResolutionPath,
        now: GameTime,
        rng: &mut dyn RngCore,
    ) -> Result<EncounterOutcome, EncounterError> {
        let mut outcome = EncounterOutcome::new(&encounter, requested, path);
        let mut player = self.load_player(encounter.player_id)?;
        let loot_table = self.loot_table(&encounter)?;
        let yield_bonus = player.class.loot_yield();

        let mut alerted = false;
        if requested == EncounterAction::Sneak {
            let night = self.cycle.is_night(now);
            let stealth = player.stealth();
            let eluded = encounter
                .zombies
                .iter()
                .all(|z| stealth_check(stealth, z.alertness, night, rng));
            if eluded {
                let draws = loot_draws(encounter.difficulty, false);
                outcome.loot = draw_loot(&loot_table, draws, yield_bonus, rng);
                self.grant(player.id, &outcome.loot)?;
                self.finish(&outcome);
                return Ok(outcome);
            }
            alerted = true;
            outcome.resolved_as = EncounterAction::Attack;
        }

        let mut drops = BTreeMap::new();
        let mut hp = player.hp;
        for zombie in &encounter.zombies {
            if hp <= 0 {
                break;
            }
            let mut me = Fighter::player(&player);
            me.hp = hp;
            let mut them = Fighter::zombie(zombie);
            them.alerted = alerted;
            let mut session = CombatSession::new(me, them);
            session.attack_round(&self.rules, rng);
            hp = session.attacker.hp;
            if session.target.is_down() {
                outcome.zombies_killed += 1;
                for (item, qty) in zombie_drops(zombie.kind, rng) {
                    *drops.entry(item).or_insert(0) += qty;
                }
            }
        }

        let taken = (player.hp - hp.max(0)).max(0);
        outcome.damage_taken = taken as u32;
        player.apply_hp_delta(-taken);
        outcome.player_died = !player.is_alive();
        self.collab.players.update_player(&player)?;
        self.cull_region(&encounter.building_id, outcome.zombies_killed)?;

        if !outcome.player_died {
            self.collab
                .buildings
                .mark_floor_cleared(&encounter.building_id, encounter.floor, player.id)?;
            outcome.floor_cleared = true;
            let draws = loot_draws(encounter.difficulty, true);
            let mut loot = draw_loot(&loot_table, draws, yield_bonus, rng);
            for (item, qty) in drops {
                *loot.entry(item).or_insert(0) += qty;
            }
            outcome.loot = loot;
            self.grant(player.id, &outcome.loot)?;
        }

        self.finish(&outcome);
        Ok(outcome)
    }

    fn finish(&self, outcome: &EncounterOutcome) {
        tracing::info!(
            encounter_id = outcome.encounter_id,
            player_id = outcome.player_id,
            resolved_as = %outcome.resolved_as,
            path = ?outcome.path,
            killed = outcome.zombies_killed,
            damage = outcome.damage_taken,
            died = outcome.player_died,
            "encounter resolved"
        );
        self.collab.tell(outcome.player_id, &outcome.summary());
    }

    fn load_player(&self, player_id: PlayerId) -> Result<Player, EncounterError> {
        self.collab
            .players
            .get_player(player_id)?
            .ok_or(EncounterError::PlayerNotFound(player_id))
    }

    fn region_kind(&self, region: &str) -> Result<RegionKind, EncounterError> {
        self.collab
            .regions
            .get_region(region)?
            .map(|r| r.kind)
            .ok_or_else(|| EncounterError::RegionNotFound(region.to_string()))
    }

    fn loot_table(&self, encounter: &Encounter) -> Result<Vec<(ItemId, u32)>, EncounterError> {
        let table = self
            .collab
            .buildings
            .get_building(&encounter.building_id)?
            .and_then(|b| b.floor(encounter.floor).map(|f| f.loot.clone()));
        if table.is_none() {
            tracing::warn!(building = %encounter.building_id, floor = encounter.floor, "floor vanished, no loot");
        }
        Ok(table.unwrap_or_default())
    }

    fn grant(&self, player_id: PlayerId, loot: &BTreeMap<ItemId, u32>) -> Result<(), StoreError> {
        for (item, qty) in loot {
            self.collab.inventory.add_item(player_id, item, *qty)?;
        }
        Ok(())
    }

    /// Dead zombies come off the building region's aggregate count.
    fn cull_region(&self, building_id: &str, killed: u32) -> Result<(), StoreError> {
        if killed == 0 {
            return Ok(());
        }
        let Some(building) = self.collab.buildings.get_building(building_id)? else {
            return Ok(());
        };
        let Some(mut region) = self.collab.regions.get_region(&building.region)? else {
            tracing::warn!(region = %building.region, "region missing, zombie count not updated");
            return Ok(());
        };
        region.adjust_zombies(-i64::from(killed));
        self.collab.regions.update_region(&region)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn draw_counts_scale_with_difficulty() {
        assert_eq!(loot_draws(30, false), 3);
        assert_eq!(loot_draws(30, true), 6);
        assert_eq!(loot_draws(75, true), 8);
        assert_eq!(loot_draws(0, false), 2);
    }

    #[test]
    fn loot_comes_from_the_table() {
        let table = vec![("bandage".to_string(), 2), ("cloth".to_string(), 3)];
        let mut rng = SmallRng::seed_from_u64(6);
        let loot = draw_loot(&table, 5, 0.0, &mut rng);
        assert!(loot.keys().all(|k| k == "bandage" || k == "cloth"));
        let total: u32 = loot.values().sum();
        assert!((10..=15).contains(&total));
    }

    #[test]
    fn yield_bonus_never_rounds_to_zero() {
        let table = vec![("alcohol".to_string(), 1)];
        let mut rng = SmallRng::seed_from_u64(6);
        let loot = draw_loot(&table, 1, 0.10, &mut rng);
        assert_eq!(loot["alcohol"], 1);
        let loot = draw_loot(&table, 10, 0.10, &mut rng);
        assert_eq!(loot["alcohol"], 11);
    }

    #[test]
    fn empty_table_yields_nothing() {
        let mut rng = SmallRng::seed_from_u64(6);
        assert!(draw_loot(&[], 5, 0.0, &mut rng).is_empty());
    }
}
