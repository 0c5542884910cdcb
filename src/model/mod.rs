pub mod encounter;
pub mod offline;
pub mod player;
pub mod project;
pub mod region;
pub mod time;
pub mod timer;
pub mod zombie;

pub use encounter::{Encounter, EncounterAction, EncounterId, EncounterStatus, ResolutionPath};
pub use offline::{OfflineMode, OfflineModeRecord};
pub use player::{ActionKind, ItemId, Player, PlayerClass, PlayerId, PlayerStatus};
pub use project::{
    Blueprint, ConstructionProject, ProjectId, ProjectStatus, SiteRequirement, StructureKind,
};
pub use region::{Building, FloorSpec, Region, RegionKind};
pub use time::{DayCycle, DayPhase, GameTime};
pub use timer::{PendingTimer, TimerId, TimerKind};
pub use zombie::{Zombie, ZombieKind};
