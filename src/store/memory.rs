use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{
    BuildingStore, CompletionSink, InventoryStore, Notifier, PlayerStore, RegionStore, StoreError,
};
use crate::model::{Building, ConstructionProject, ItemId, Player, PlayerId, Region};
use crate::sim::lock;

#[derive(Debug, Default)]
struct MemoryState {
    players: HashMap<PlayerId, Player>,
    inventories: HashMap<PlayerId, BTreeMap<ItemId, u32>>,
    regions: BTreeMap<String, Region>,
    buildings: HashMap<String, Building>,
    notifications: Vec<(PlayerId, String)>,
    completed: Vec<ConstructionProject>,
    unavailable: bool,
    /// Inventory writes still allowed before `add_item` starts failing.
    add_budget: Option<u32>,
}

impl MemoryState {
    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("memory store switched off".into()))
        } else {
            Ok(())
        }
    }
}

/// In-memory backend for every collaborator interface.
///
/// Used by tests and the headless demo. [`MemoryStore::set_unavailable`]
/// makes every call fail, and [`MemoryStore::fail_adds_after`] breaks only
/// inventory writes part-way, for exercising the transient-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_player(&self, player: Player) {
        lock(&self.state).players.insert(player.id, player);
    }

    pub fn insert_region(&self, region: Region) {
        lock(&self.state).regions.insert(region.name.clone(), region);
    }

    pub fn insert_building(&self, building: Building) {
        lock(&self.state).buildings.insert(building.id.clone(), building);
    }

    pub fn player(&self, id: PlayerId) -> Option<Player> {
        lock(&self.state).players.get(&id).cloned()
    }

    pub fn region(&self, name: &str) -> Option<Region> {
        lock(&self.state).regions.get(name).cloned()
    }

    pub fn building(&self, id: &str) -> Option<Building> {
        lock(&self.state).buildings.get(id).cloned()
    }

    pub fn inventory(&self, player: PlayerId) -> BTreeMap<ItemId, u32> {
        lock(&self.state).inventories.get(&player).cloned().unwrap_or_default()
    }

    pub fn notifications_for(&self, player: PlayerId) -> Vec<String> {
        lock(&self.state)
            .notifications
            .iter()
            .filter(|(p, _)| *p == player)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn completed(&self) -> Vec<ConstructionProject> {
        lock(&self.state).completed.clone()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Let `n` more `add_item` calls through, then reject the rest until
    /// reset with `None`.
    pub fn fail_adds_after(&self, n: Option<u32>) {
        lock(&self.state).add_budget = n;
    }
}

impl PlayerStore for MemoryStore {
    fn get_player(&self, id: PlayerId) -> Result<Option<Player>, StoreError> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.players.get(&id).cloned())
    }

    fn update_player(&self, player: &Player) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.check()?;
        state.players.insert(player.id, player.clone());
        Ok(())
    }
}

impl InventoryStore for MemoryStore {
    fn add_item(&self, player: PlayerId, item: &str, qty: u32) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.check()?;
        match state.add_budget {
            Some(0) => return Err(StoreError::Rejected(format!("inventory write for {item} refused"))),
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        if qty > 0 {
            let slot = state.inventories.entry(player).or_default().entry(item.to_string()).or_insert(0);
            *slot = slot.saturating_add(qty);
        }
        Ok(())
    }

    fn remove_item(&self, player: PlayerId, item: &str, qty: u32) -> Result<bool, StoreError> {
        let mut state = lock(&self.state);
        state.check()?;
        let Some(items) = state.inventories.get_mut(&player) else {
            return Ok(qty == 0);
        };
        let held = items.get(item).copied().unwrap_or(0);
        if held < qty {
            return Ok(false);
        }
        if held == qty {
            items.remove(item);
        } else {
            items.insert(item.to_string(), held - qty);
        }
        Ok(true)
    }

    fn has_item(&self, player: PlayerId, item: &str, qty: u32) -> Result<bool, StoreError> {
        let state = lock(&self.state);
        state.check()?;
        let held = state
            .inventories
            .get(&player)
            .and_then(|items| items.get(item))
            .copied()
            .unwrap_or(0);
        Ok(held >= qty)
    }
}

impl RegionStore for MemoryStore {
    fn get_region(&self, name: &str) -> Result<Option<Region>, StoreError> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.regions.get(name).cloned())
    }

    fn update_region(&self, region: &Region) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.check()?;
        state.regions.insert(region.name.clone(), region.clone());
        Ok(())
    }

    fn region_names(&self) -> Result<Vec<String>, StoreError> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.regions.keys().cloned().collect())
    }
}

impl BuildingStore for MemoryStore {
    fn get_building(&self, id: &str) -> Result<Option<Building>, StoreError> {
        let state = lock(&self.state);
        state.check()?;
        Ok(state.buildings.get(id).cloned())
    }

    fn mark_floor_cleared(&self, id: &str, floor: u32, player: PlayerId) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.check()?;
        let building = state
            .buildings
            .get_mut(id)
            .ok_or_else(|| StoreError::Rejected(format!("unknown building {id}")))?;
        building.mark_cleared(floor, player);
        Ok(())
    }
}

impl Notifier for MemoryStore {
    fn notify(&self, player: PlayerId, text: &str) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.check()?;
        state.notifications.push((player, text.to_string()));
        Ok(())
    }
}

impl CompletionSink for MemoryStore {
    fn on_completed(&self, project: &ConstructionProject) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        state.check()?;
        state.completed.push(project.clone());
        Ok(())
    }
}
