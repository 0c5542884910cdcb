//! Narrow interfaces to the persistence and messaging collaborators.
//!
//! The core only ever calls these synchronously and never retries; retry
//! policy belongs to the implementation.

mod memory;

use std::sync::Arc;

pub use memory::MemoryStore;

use crate::model::{Building, ConstructionProject, Player, PlayerId, Region};
use crate::sim::Clock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write rejected: {0}")]
    Rejected(String),
}

pub trait PlayerStore: Send + Sync {
    fn get_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError>;
    /// Linearizable per player id.
    fn update_player(&self, player: &Player) -> Result<(), StoreError>;
}

pub trait InventoryStore: Send + Sync {
    fn add_item(&self, player: PlayerId, item: &str, qty: u32) -> Result<(), StoreError>;
    /// Returns `false` and leaves the inventory untouched if the player holds
    /// fewer than `qty`.
    fn remove_item(&self, player: PlayerId, item: &str, qty: u32) -> Result<bool, StoreError>;
    fn has_item(&self, player: PlayerId, item: &str, qty: u32) -> Result<bool, StoreError>;
}

pub trait RegionStore: Send + Sync {
    fn get_region(&self, name: &str) -> Result<Option<Region>, StoreError>;
    fn update_region(&self, region: &Region) -> Result<(), StoreError>;
    fn region_names(&self) -> Result<Vec<String>, StoreError>;
}

pub trait BuildingStore: Send + Sync {
    fn get_building(&self, id: &str) -> Result<Option<Building>, StoreError>;
    fn mark_floor_cleared(&self, id: &str, floor: u32, player: PlayerId) -> Result<(), StoreError>;
}

/// Side channel back to the chat front end.
pub trait Notifier: Send + Sync {
    fn notify(&self, player: PlayerId, text: &str) -> Result<(), StoreError>;
}

/// Receives finished construction projects and turns them into vehicles or
/// world structures.
pub trait CompletionSink: Send + Sync {
    fn on_completed(&self, project: &ConstructionProject) -> Result<(), StoreError>;
}

/// Everything the simulation components borrow from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub players: Arc<dyn PlayerStore>,
    pub inventory: Arc<dyn InventoryStore>,
    pub regions: Arc<dyn RegionStore>,
    pub buildings: Arc<dyn BuildingStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Wire every store interface to one in-memory backend.
    pub fn in_memory(store: Arc<MemoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            players: store.clone(),
            inventory: store.clone(),
            regions: store.clone(),
            buildings: store.clone(),
            notifier: store,
            clock,
        }
    }

    /// Best-effort notification; a failed delivery is logged, never propagated.
    pub(crate) fn tell(&self, player: PlayerId, text: &str) {
        if let Err(e) = self.notifier.notify(player, text) {
            tracing::warn!(player, error = %e, "notification dropped");
        }
    }
}
