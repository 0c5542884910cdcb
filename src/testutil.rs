use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::config::WorldConfig;
use crate::model::{Building, FloorSpec, GameTime, Player, PlayerClass, PlayerId, Region, RegionKind};
use crate::sim::{ManualClock, TickReport, WorldEvent};
use crate::store::{Collaborators, MemoryStore};
use crate::world::World;

pub const TEST_SEED: u64 = 42;

/// Where every test world's clock starts. Also the day-cycle epoch, so a
/// fresh world begins at night.
pub fn start_time() -> GameTime {
    GameTime::from_secs(1_700_000_000)
}

pub fn seeded_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

// ---------------------------------------------------------------------------
// Standard content
// ---------------------------------------------------------------------------

pub fn standard_regions() -> Vec<Region> {
    vec![
        Region::new("Forest", RegionKind::Forest, 20).with_connections(&["Urban", "Coast"]),
        Region::new("Urban", RegionKind::Urban, 40).with_connections(&["Forest", "Downtown"]),
        Region::new("Downtown", RegionKind::Urban, 60).with_connections(&["Urban", "Military"]),
        Region::new("Military", RegionKind::Military, 80).with_connections(&["Downtown", "Coast"]),
        Region::new("Coast", RegionKind::Coast, 30).with_connections(&["Forest", "Military"]),
    ]
}

fn table(entries: &[(&str, u32)]) -> Vec<(String, u32)> {
    entries.iter().map(|(item, qty)| (item.to_string(), *qty)).collect()
}

fn floor(floor: u32, difficulty: u32, zombies: u32, loot: &[(&str, u32)]) -> FloorSpec {
    FloorSpec {
        floor,
        difficulty,
        zombies,
        loot: table(loot),
    }
}

fn building(region: &str, name: &str, floors: Vec<FloorSpec>) -> Building {
    Building {
        id: format!("{region}:{name}"),
        name: name.to_string(),
        region: region.to_string(),
        floors,
        cleared_by: BTreeMap::new(),
    }
}

pub fn standard_buildings() -> Vec<Building> {
    let hospital_1 = [("bandage", 2), ("cloth", 3), ("alcohol", 1)];
    let hospital_2 = [("medkit", 1), ("bandage", 3), ("alcohol", 2)];
    let office_1 = [("paper", 5), ("pen", 2), ("circuit", 1)];
    let mall_1 = [("cloth", 4), ("food", 3), ("battery", 2)];
    let base_1 = [("ammo", 10), ("metal", 5), ("circuit", 3)];
    vec![
        building(
            "Downtown",
            "Hospital",
            vec![
                floor(1, 30, 2, &hospital_1),
                floor(2, 45, 3, &hospital_2),
                floor(3, 60, 4, &hospital_2),
                floor(4, 75, 5, &hospital_2),
            ],
        ),
        building(
            "Downtown",
            "Office",
            vec![floor(1, 25, 1, &office_1), floor(2, 35, 2, &office_1), floor(3, 50, 3, &office_1)],
        ),
        building(
            "Downtown",
            "Mall",
            vec![floor(1, 40, 3, &mall_1), floor(2, 55, 4, &mall_1), floor(3, 70, 5, &mall_1)],
        ),
        building(
            "Military",
            "Base",
            vec![floor(1, 60, 4, &base_1), floor(2, 80, 6, &base_1), floor(3, 100, 8, &base_1)],
        ),
        // Cleared-out storehouse: every floor is safe.
        building("Urban", "Warehouse", vec![floor(1, 10, 0, &mall_1)]),
    ]
}

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

/// A world over one in-memory store and a manual clock.
pub struct TestWorld {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub world: World,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        for region in standard_regions() {
            store.insert_region(region);
        }
        for b in standard_buildings() {
            store.insert_building(b);
        }
        let clock = Arc::new(ManualClock::new(start_time()));
        let collab = Collaborators::in_memory(Arc::clone(&store), clock.clone());
        let seed = config.seed.unwrap_or(TEST_SEED);
        let world = World::new(config, collab, store.clone(), Box::new(seeded_rng(seed)));
        Self { store, clock, world }
    }

    pub fn add_player(&self, id: PlayerId, class: PlayerClass, region: &str) -> Player {
        let player = Player::new(id, format!("player{id}"), class, region);
        self.store.insert_player(player.clone());
        player
    }

    /// Insert an already-configured player record.
    pub fn put_player(&self, player: Player) {
        self.store.insert_player(player);
    }

    pub fn player(&self, id: PlayerId) -> Player {
        self.store
            .player(id)
            .unwrap_or_else(|| panic!("player {id} missing from test store"))
    }

    pub fn give(&self, player: PlayerId, item: &str, qty: u32) {
        use crate::store::InventoryStore;
        self.store
            .add_item(player, item, qty)
            .unwrap_or_else(|e| panic!("seeding inventory failed: {e}"));
    }

    pub fn now(&self) -> GameTime {
        use crate::sim::Clock;
        self.clock.now()
    }

    pub fn advance(&self, d: Duration) {
        self.clock.advance(d);
    }

    /// Run one scheduler pass at the current manual time.
    pub fn tick(&self) -> TickReport {
        self.world.scheduler.run_tick(self.now())
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

pub fn count_events(events: &[WorldEvent], predicate: impl Fn(&WorldEvent) -> bool) -> usize {
    events.iter().filter(|e| predicate(e)).count()
}

pub fn has_event(events: &[WorldEvent], predicate: impl Fn(&WorldEvent) -> bool) -> bool {
    events.iter().any(predicate)
}

/// Assert two floats are within tolerance.
pub fn assert_approx(actual: f64, expected: f64, tolerance: f64, msg: &str) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "{msg}: expected {expected} +/- {tolerance}, got {actual}"
    );
}
