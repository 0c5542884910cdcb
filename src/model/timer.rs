use serde::{Deserialize, Serialize};

use super::encounter::EncounterId;
use super::player::PlayerId;
use super::project::ProjectId;
use super::time::GameTime;

pub type TimerId = u64;

/// What a pending timer does when it fires. The payload travels with the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerKind {
    /// Decision window closed without player input.
    EncounterTimeout { encounter_id: EncounterId },
    /// Construction project reached its completion time.
    ConstructionComplete { project_id: ProjectId },
}

impl TimerKind {
    pub fn label(&self) -> &'static str {
        match self {
            TimerKind::EncounterTimeout { .. } => "encounter_timeout",
            TimerKind::ConstructionComplete { .. } => "construction_complete",
        }
    }
}

/// A deferred callback, consumed exactly once by cancellation or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTimer {
    pub id: TimerId,
    pub owner: PlayerId,
    pub kind: TimerKind,
    pub expires_at: GameTime,
}
