use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{
    DayPhase, EncounterId, ItemId, PlayerId, ProjectId, StructureKind, TimerId,
};

/// Something a per-tick pass did to the world, collected into the tick report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    /// The cached day phase moved to a new quarter.
    PhaseChanged {
        from: DayPhase,
        to: DayPhase,
        day: u64,
    },

    /// Ambient zombies appeared in a region.
    ZombiesSpawned {
        region: String,
        count: u32,
        total: u32,
    },

    /// An offline scavenger's cooldown elapsed and was rolled.
    ScavengeResolved {
        player_id: PlayerId,
        region: String,
        success: bool,
        loot: BTreeMap<ItemId, u32>,
    },

    /// A project matured and was handed off.
    ConstructionCompleted {
        project_id: ProjectId,
        owner: PlayerId,
        kind: StructureKind,
    },

    /// A decision window closed with no input and was forced to sneak.
    EncounterTimedOut {
        encounter_id: EncounterId,
        player_id: PlayerId,
        player_died: bool,
    },

    /// A timer fired but its target had already been settled elsewhere.
    TimerSuperseded { timer_id: TimerId },
}

impl WorldEvent {
    pub fn label(&self) -> &'static str {
        match self {
            WorldEvent::PhaseChanged { .. } => "phase_changed",
            WorldEvent::ZombiesSpawned { .. } => "zombies_spawned",
            WorldEvent::ScavengeResolved { .. } => "scavenge_resolved",
            WorldEvent::ConstructionCompleted { .. } => "construction_completed",
            WorldEvent::EncounterTimedOut { .. } => "encounter_timed_out",
            WorldEvent::TimerSuperseded { .. } => "timer_superseded",
        }
    }
}
