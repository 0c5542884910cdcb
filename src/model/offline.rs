use serde::{Deserialize, Serialize};

use super::player::PlayerId;
use super::time::GameTime;

/// What a player does while not issuing commands. Modes are exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OfflineMode {
    #[default]
    None,
    /// Lie in wait for anyone entering `region`.
    Ambush { region: String },
    /// Passively gather; `last_resolved` gates the cooldown.
    Scavenge { last_resolved: GameTime },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflineModeRecord {
    pub player_id: PlayerId,
    pub mode: OfflineMode,
}
