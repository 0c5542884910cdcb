use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::time::GameTime;

pub type PlayerId = u64;
pub type ItemId = String;

pub const DEFAULT_HP: i32 = 100;
pub const DEFAULT_STAMINA: i32 = 100;
pub const MELEE_DAMAGE: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerClass {
    Scavenger,
    Mechanic,
    Soldier,
}

impl PlayerClass {
    /// Flat stealth added to every sneak attempt.
    pub fn stealth_bonus(self) -> i32 {
        match self {
            PlayerClass::Scavenger => 10,
            _ => 0,
        }
    }

    /// Fractional weapon damage bonus.
    pub fn damage_bonus(self) -> f64 {
        match self {
            PlayerClass::Soldier => 0.10,
            _ => 0.0,
        }
    }

    /// Fractional loot quantity bonus.
    pub fn loot_yield(self) -> f64 {
        match self {
            PlayerClass::Scavenger => 0.10,
            _ => 0.0,
        }
    }

    /// Percentage points added to offline scavenge rolls.
    pub fn scavenge_bonus(self) -> i32 {
        match self {
            PlayerClass::Scavenger => 10,
            PlayerClass::Mechanic => 5,
            PlayerClass::Soldier => 0,
        }
    }

    /// Percentage points added to flee rolls.
    pub fn flee_bonus(self) -> u32 {
        match self {
            PlayerClass::Scavenger => 10,
            _ => 0,
        }
    }
}

impl fmt::Display for PlayerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlayerClass::Scavenger => "Scavenger",
            PlayerClass::Mechanic => "Mechanic",
            PlayerClass::Soldier => "Soldier",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Alive,
    Dead,
}

/// Player commands that are rate limited by a cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Loot,
    Attack,
    Craft,
    Build,
    Mine,
    Chop,
    Seek,
    Radio,
    Intel,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Move,
        ActionKind::Loot,
        ActionKind::Attack,
        ActionKind::Craft,
        ActionKind::Build,
        ActionKind::Mine,
        ActionKind::Chop,
        ActionKind::Seek,
        ActionKind::Radio,
        ActionKind::Intel,
    ];
}

/// The slice of a persisted player record the core reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub class: PlayerClass,
    pub hp: i32,
    pub stamina: i32,
    pub intelligence: i32,
    /// Damage of the equipped weapon; bare hands fall back to [`MELEE_DAMAGE`].
    pub weapon_damage: u32,
    pub region: String,
    pub status: PlayerStatus,
    /// Last use of each cooldown-gated action.
    #[serde(default)]
    pub last_action: BTreeMap<ActionKind, GameTime>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, class: PlayerClass, region: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            class,
            hp: DEFAULT_HP,
            stamina: DEFAULT_STAMINA,
            intelligence: 0,
            weapon_damage: MELEE_DAMAGE,
            region: region.into(),
            status: PlayerStatus::Alive,
            last_action: BTreeMap::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }

    /// Effective stealth used in sneak checks.
    pub fn stealth(&self) -> i32 {
        self.class.stealth_bonus() + self.stamina / 10
    }

    /// Apply a signed HP delta, marking the player dead at zero.
    pub fn apply_hp_delta(&mut self, delta: i32) {
        self.hp = (self.hp + delta).max(0);
        if self.hp == 0 {
            self.status = PlayerStatus::Dead;
        }
    }

    /// Time left before `action` may be used again, or `None` if it is ready.
    pub fn cooldown_remaining(&self, action: ActionKind, cooldown: Duration, now: GameTime) -> Option<Duration> {
        let last = self.last_action.get(&action)?;
        let ready_at = last.saturating_add(cooldown);
        (now < ready_at).then(|| now.until(ready_at))
    }

    pub fn record_action(&mut self, action: ActionKind, now: GameTime) {
        self.last_action.insert(action, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hp_floors_at_zero_and_kills() {
        let mut p = Player::new(1, "Alice", PlayerClass::Soldier, "Forest");
        p.apply_hp_delta(-30);
        assert_eq!(p.hp, 70);
        assert!(p.is_alive());
        p.apply_hp_delta(-500);
        assert_eq!(p.hp, 0);
        assert_eq!(p.status, PlayerStatus::Dead);
    }

    #[test]
    fn stealth_includes_class_and_stamina() {
        let mut p = Player::new(1, "Alice", PlayerClass::Scavenger, "Forest");
        p.stamina = 50;
        assert_eq!(p.stealth(), 15);
        let soldier = Player::new(2, "Bob", PlayerClass::Soldier, "Forest");
        assert_eq!(soldier.stealth(), 10);
    }

    #[test]
    fn cooldown_window() {
        let mut p = Player::new(1, "Alice", PlayerClass::Mechanic, "Urban");
        let cd = Duration::from_secs(30);
        assert_eq!(p.cooldown_remaining(ActionKind::Loot, cd, GameTime::from_secs(0)), None);

        p.record_action(ActionKind::Loot, GameTime::from_secs(100));
        assert_eq!(
            p.cooldown_remaining(ActionKind::Loot, cd, GameTime::from_secs(110)),
            Some(Duration::from_secs(20))
        );
        assert_eq!(p.cooldown_remaining(ActionKind::Loot, cd, GameTime::from_secs(130)), None);
        // Other actions are unaffected
        assert_eq!(p.cooldown_remaining(ActionKind::Move, cd, GameTime::from_secs(110)), None);
    }
}
