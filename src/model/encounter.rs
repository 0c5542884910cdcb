use std::fmt;

use serde::{Deserialize, Serialize};

use super::player::PlayerId;
use super::time::GameTime;
use super::timer::TimerId;
use super::zombie::Zombie;

pub type EncounterId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterAction {
    Sneak,
    Attack,
}

impl fmt::Display for EncounterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncounterAction::Sneak => f.write_str("sneak"),
            EncounterAction::Attack => f.write_str("attack"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    Active,
    Resolved,
}

/// Which path resolved an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    Player,
    Timeout,
}

/// A building-floor confrontation awaiting the player's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub player_id: PlayerId,
    pub building_id: String,
    pub floor: u32,
    pub difficulty: u32,
    pub zombies: Vec<Zombie>,
    pub status: EncounterStatus,
    pub created_at: GameTime,
    pub expires_at: GameTime,
    pub timer_id: Option<TimerId>,
}

impl Encounter {
    pub fn is_active(&self) -> bool {
        self.status == EncounterStatus::Active
    }

    pub fn is_expired(&self, now: GameTime) -> bool {
        now > self.expires_at
    }
}
