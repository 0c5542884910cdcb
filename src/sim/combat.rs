//! Damage and outcome rolls shared by floor encounters, ambushes and duels.
//!
//! Nothing here touches a store: callers read HP out of a finished
//! [`CombatSession`] and write it back themselves.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::config::CombatSettings;
use crate::model::{Player, PlayerClass, PlayerId, Zombie, ZombieKind};

pub const SNEAK_BASE_CHANCE: f64 = 30.0;
pub const SNEAK_ALERTNESS_WEIGHT: f64 = 0.6;
pub const SNEAK_NIGHT_PENALTY: f64 = 10.0;
pub const MIN_SNEAK_CHANCE: u32 = 1;
pub const MAX_SNEAK_CHANCE: u32 = 95;

pub const CRITICAL_MULTIPLIER: f64 = 1.5;
pub const DAMAGE_JITTER_LOW: i64 = -5;
pub const DAMAGE_JITTER_HIGH: i64 = 10;

pub const MAX_FLEE_CHANCE: i32 = 80;
pub const FLEE_STAMINA_OFFSET: i32 = 20;

/// Uniform percentile roll in `1..=100`.
pub fn roll_percent(rng: &mut dyn RngCore) -> u32 {
    rng.random_range(1..=100)
}

/// A percentile roll succeeds when it is at or under the chance.
pub fn roll_succeeds(roll: u32, chance: u32) -> bool {
    roll <= chance
}

/// Percent chance to slip past one zombie, always within `1..=95`.
pub fn sneak_chance(stealth: i32, alertness: u32, night: bool) -> u32 {
    let night_penalty = if night { SNEAK_NIGHT_PENALTY } else { 0.0 };
    let raw = SNEAK_BASE_CHANCE + f64::from(stealth)
        - SNEAK_ALERTNESS_WEIGHT * f64::from(alertness)
        - night_penalty;
    raw.round()
        .clamp(f64::from(MIN_SNEAK_CHANCE), f64::from(MAX_SNEAK_CHANCE)) as u32
}

pub fn stealth_check(stealth: i32, alertness: u32, night: bool, rng: &mut dyn RngCore) -> bool {
    roll_succeeds(roll_percent(rng), sneak_chance(stealth, alertness, night))
}

/// `min(80, stamina + 20)`, plus the class flee bonus.
pub fn flee_chance(stamina: i32, class: PlayerClass) -> u32 {
    let base = (stamina.saturating_add(FLEE_STAMINA_OFFSET)).clamp(0, MAX_FLEE_CHANCE) as u32;
    base + class.flee_bonus()
}

pub fn resolve_flee(chance: u32, rng: &mut dyn RngCore) -> bool {
    roll_succeeds(roll_percent(rng), chance)
}

/// Combat constants after configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatRules {
    /// Percent.
    pub critical_chance: u32,
    pub alerted_multiplier: f64,
    pub ambush_first_strike: bool,
    pub max_ambush_rounds: u32,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self::from(&CombatSettings::default())
    }
}

impl From<&CombatSettings> for CombatRules {
    fn from(s: &CombatSettings) -> Self {
        Self {
            critical_chance: s.critical_hit_chance,
            alerted_multiplier: 1.0 + f64::from(s.alerted_bonus) / 100.0,
            ambush_first_strike: s.ambush_first_strike,
            max_ambush_rounds: s.max_ambush_rounds,
        }
    }
}

impl CombatRules {
    pub fn roll_critical(&self, rng: &mut dyn RngCore) -> bool {
        roll_succeeds(roll_percent(rng), self.critical_chance)
    }

    /// `(weapon + U[-5,10]) * (1 + class_bonus)`, then the critical and
    /// alerted multipliers. Never less than 1.
    pub fn resolve_attack(
        &self,
        weapon_damage: u32,
        class_bonus: f64,
        critical: bool,
        alerted: bool,
        rng: &mut dyn RngCore,
    ) -> u32 {
        let jitter = rng.random_range(DAMAGE_JITTER_LOW..=DAMAGE_JITTER_HIGH);
        let mut damage = (i64::from(weapon_damage) + jitter) as f64 * (1.0 + class_bonus);
        if critical {
            damage *= CRITICAL_MULTIPLIER;
        }
        if alerted {
            damage *= self.alerted_multiplier;
        }
        damage.max(1.0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatKind {
    Pvp,
    Pvz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Combatant {
    Player(PlayerId),
    Zombie(ZombieKind),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fighter {
    pub who: Combatant,
    pub hp: i32,
    pub weapon_damage: u32,
    pub damage_bonus: f64,
    pub alerted: bool,
}

impl Fighter {
    pub fn player(p: &Player) -> Self {
        Self {
            who: Combatant::Player(p.id),
            hp: p.hp,
            weapon_damage: p.weapon_damage,
            damage_bonus: p.class.damage_bonus(),
            alerted: false,
        }
    }

    pub fn zombie(z: &Zombie) -> Self {
        Self {
            who: Combatant::Zombie(z.kind),
            hp: i32::try_from(z.hp).unwrap_or(i32::MAX),
            weapon_damage: z.damage,
            damage_bonus: 0.0,
            alerted: false,
        }
    }

    pub fn is_down(&self) -> bool {
        self.hp <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Attacker,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    AttackerWon,
    TargetWon,
    /// The attacker fled. Nobody wins; the target is credited as a survivor.
    Escaped,
    /// Round cap reached with both sides standing.
    Stalemate,
}

impl CombatOutcome {
    pub fn winner(self) -> Option<Side> {
        match self {
            CombatOutcome::AttackerWon => Some(Side::Attacker),
            CombatOutcome::TargetWon => Some(Side::Target),
            CombatOutcome::Escaped | CombatOutcome::Stalemate => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Ended(CombatOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CombatAction {
    Strike { by: Side, damage: u32, critical: bool, unopposed: bool },
    Flee { chance: u32, success: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub round: u32,
    pub action: CombatAction,
}

/// One fight between two sides, played round by round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub kind: CombatKind,
    pub attacker: Fighter,
    pub target: Fighter,
    pub round: u32,
    pub log: Vec<CombatLogEntry>,
    pub status: SessionStatus,
}

impl CombatSession {
    pub fn new(attacker: Fighter, target: Fighter) -> Self {
        let kind = match target.who {
            Combatant::Zombie(_) => CombatKind::Pvz,
            Combatant::Player(_) => CombatKind::Pvp,
        };
        let mut session = Self {
            kind,
            attacker,
            target,
            round: 0,
            log: Vec::new(),
            status: SessionStatus::Active,
        };
        session.settle();
        session
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn outcome(&self) -> Option<CombatOutcome> {
        match self.status {
            SessionStatus::Active => None,
            SessionStatus::Ended(outcome) => Some(outcome),
        }
    }

    /// Damage dealt by each side so far.
    pub fn damage_dealt(&self, side: Side) -> u32 {
        self.log
            .iter()
            .filter_map(|e| match e.action {
                CombatAction::Strike { by, damage, .. } if by == side => Some(damage),
                _ => None,
            })
            .sum()
    }

    /// Ambush opener: the attacker hits and the target cannot answer.
    pub fn first_strike(&mut self, rules: &CombatRules, rng: &mut dyn RngCore) {
        if !self.is_active() {
            return;
        }
        self.round += 1;
        self.strike(Side::Attacker, rules, rng, true);
        self.settle();
    }

    /// Attacker strikes, then the target answers if still standing.
    pub fn attack_round(&mut self, rules: &CombatRules, rng: &mut dyn RngCore) {
        if !self.is_active() {
            return;
        }
        self.round += 1;
        self.strike(Side::Attacker, rules, rng, false);
        if !self.target.is_down() {
            self.strike(Side::Target, rules, rng, false);
        }
        self.settle();
    }

    /// The attacker tries to break off. Returns whether it worked.
    pub fn flee(&mut self, chance: u32, rng: &mut dyn RngCore) -> bool {
        if !self.is_active() {
            return false;
        }
        let success = resolve_flee(chance, rng);
        self.log.push(CombatLogEntry {
            round: self.round,
            action: CombatAction::Flee { chance, success },
        });
        if success {
            self.status = SessionStatus::Ended(CombatOutcome::Escaped);
        }
        success
    }

    /// Play attack rounds until one side drops or `max_rounds` total rounds
    /// have been played.
    pub fn fight_to_end(&mut self, rules: &CombatRules, max_rounds: u32, rng: &mut dyn RngCore) -> CombatOutcome {
        while self.is_active() && self.round < max_rounds {
            self.attack_round(rules, rng);
        }
        match self.status {
            SessionStatus::Ended(outcome) => outcome,
            SessionStatus::Active => {
                self.status = SessionStatus::Ended(CombatOutcome::Stalemate);
                CombatOutcome::Stalemate
            }
        }
    }

    fn strike(&mut self, by: Side, rules: &CombatRules, rng: &mut dyn RngCore, unopposed: bool) {
        let (hitter, victim) = match by {
            Side::Attacker => (&self.attacker, &mut self.target),
            Side::Target => (&self.target, &mut self.attacker),
        };
        let critical = rules.roll_critical(rng);
        let damage = rules.resolve_attack(hitter.weapon_damage, hitter.damage_bonus, critical, hitter.alerted, rng);
        victim.hp = victim.hp.saturating_sub(i32::try_from(damage).unwrap_or(i32::MAX));
        self.log.push(CombatLogEntry {
            round: self.round,
            action: CombatAction::Strike { by, damage, critical, unopposed },
        });
    }

    fn settle(&mut self) {
        if !self.is_active() {
            return;
        }
        if self.attacker.is_down() {
            self.status = SessionStatus::Ended(CombatOutcome::TargetWon);
        } else if self.target.is_down() {
            self.status = SessionStatus::Ended(CombatOutcome::AttackerWon);
        }
    }
}
