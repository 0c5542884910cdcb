pub mod config;
pub mod id;
pub mod model;
pub mod sim;
pub mod store;
pub mod testutil;
pub mod world;

pub use config::{ConfigError, WorldConfig, WorldSettings};
pub use id::IdGenerator;
pub use model::{
    Building, ConstructionProject, DayPhase, Encounter, EncounterAction, GameTime, OfflineMode,
    Player, PlayerClass, PlayerId, Region, RegionKind, StructureKind, Zombie, ZombieKind,
};
pub use world::World;
