use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZombieKind {
    Walker,
    Runner,
    Brute,
    Mutant,
}

/// Base stats before difficulty scaling and jitter.
#[derive(Debug, Clone, Copy)]
pub struct ZombieTemplate {
    pub kind: ZombieKind,
    pub base_hp: u32,
    pub damage: u32,
    pub speed: f64,
    pub spawn_weight: f64,
}

pub const ZOMBIE_TEMPLATES: [ZombieTemplate; 4] = [
    ZombieTemplate { kind: ZombieKind::Walker, base_hp: 50, damage: 20, speed: 1.0, spawn_weight: 70.0 },
    ZombieTemplate { kind: ZombieKind::Runner, base_hp: 30, damage: 15, speed: 2.0, spawn_weight: 20.0 },
    ZombieTemplate { kind: ZombieKind::Brute, base_hp: 100, damage: 35, speed: 0.5, spawn_weight: 8.0 },
    ZombieTemplate { kind: ZombieKind::Mutant, base_hp: 80, damage: 40, speed: 1.5, spawn_weight: 2.0 },
];

impl ZombieKind {
    pub fn template(self) -> &'static ZombieTemplate {
        match self {
            ZombieKind::Walker => &ZOMBIE_TEMPLATES[0],
            ZombieKind::Runner => &ZOMBIE_TEMPLATES[1],
            ZombieKind::Brute => &ZOMBIE_TEMPLATES[2],
            ZombieKind::Mutant => &ZOMBIE_TEMPLATES[3],
        }
    }
}

impl fmt::Display for ZombieKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ZombieKind::Walker => "walker",
            ZombieKind::Runner => "runner",
            ZombieKind::Brute => "brute",
            ZombieKind::Mutant => "mutant",
        };
        f.write_str(s)
    }
}

/// An ephemeral hostile, alive only for one encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zombie {
    pub kind: ZombieKind,
    pub hp: u32,
    pub max_hp: u32,
    pub damage: u32,
    pub speed: f64,
    /// 10–90; higher is harder to sneak past.
    pub alertness: u32,
    /// 1–100.
    pub aggressiveness: u32,
}

impl Zombie {
    pub fn is_dead(&self) -> bool {
        self.hp == 0
    }

    /// Returns true if the hit killed it.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        self.hp = self.hp.saturating_sub(amount);
        self.is_dead()
    }
}
