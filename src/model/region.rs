use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::player::{ItemId, PlayerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Forest,
    Urban,
    Military,
    Coast,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegionKind::Forest => "forest",
            RegionKind::Urban => "urban",
            RegionKind::Military => "military",
            RegionKind::Coast => "coast",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub kind: RegionKind,
    /// 0–100.
    pub danger: u32,
    /// Aggregate ambient zombie count.
    pub zombies: u32,
    /// Player-generated noise; attracts spawns and decays every tick.
    #[serde(default)]
    pub noise: u32,
    #[serde(default)]
    pub connected: Vec<String>,
}

impl Region {
    pub fn new(name: impl Into<String>, kind: RegionKind, danger: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            danger,
            zombies: 0,
            noise: 0,
            connected: Vec::new(),
        }
    }

    pub fn with_connections(mut self, connected: &[&str]) -> Self {
        self.connected = connected.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Apply a signed change to the zombie count without going negative.
    pub fn adjust_zombies(&mut self, delta: i64) {
        let next = (i64::from(self.zombies) + delta).clamp(0, i64::from(u32::MAX));
        self.zombies = next as u32;
    }
}

/// One floor of a building as configured by the content tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorSpec {
    pub floor: u32,
    pub difficulty: u32,
    /// Zombies generated on entry; zero means the floor is safe.
    pub zombies: u32,
    /// Items a single loot draw can produce, with their base quantity.
    #[serde(default)]
    pub loot: Vec<(ItemId, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: String,
    pub name: String,
    pub region: String,
    pub floors: Vec<FloorSpec>,
    /// Floor number -> players who cleared it.
    #[serde(default)]
    pub cleared_by: BTreeMap<u32, Vec<PlayerId>>,
}

impl Building {
    pub fn floor(&self, floor: u32) -> Option<&FloorSpec> {
        self.floors.iter().find(|f| f.floor == floor)
    }

    pub fn is_cleared_by(&self, floor: u32, player: PlayerId) -> bool {
        self.cleared_by.get(&floor).is_some_and(|ps| ps.contains(&player))
    }

    pub fn mark_cleared(&mut self, floor: u32, player: PlayerId) {
        let players = self.cleared_by.entry(floor).or_default();
        if !players.contains(&player) {
            players.push(player);
        }
    }
}
