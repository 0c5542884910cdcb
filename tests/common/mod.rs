#![allow(dead_code)]

use std::sync::Arc;

use outbreak_sim::config::WorldConfig;
use outbreak_sim::model::{Player, PlayerClass, PlayerId};
use outbreak_sim::sim::MonotonicClock;
use outbreak_sim::store::{Collaborators, MemoryStore};
use outbreak_sim::testutil::{self, TestWorld};
use outbreak_sim::World;
use rand::RngCore;

/// A player who wins any fight against floor zombies in one swing.
pub fn veteran(world: &TestWorld, id: PlayerId, region: &str) -> Player {
    let mut player = Player::new(id, format!("veteran{id}"), PlayerClass::Soldier, region);
    player.hp = 10_000;
    player.weapon_damage = 10_000;
    world.put_player(player.clone());
    player
}

/// A player with the given intelligence and otherwise default stats.
pub fn thinker(world: &TestWorld, id: PlayerId, class: PlayerClass, region: &str, intelligence: i32) -> Player {
    let mut player = Player::new(id, format!("thinker{id}"), class, region);
    player.intelligence = intelligence;
    world.put_player(player.clone());
    player
}

/// World on tokio's clock, for driving the real tick loop under paused time.
pub fn realtime_world(config: WorldConfig) -> (Arc<MemoryStore>, World) {
    let store = Arc::new(MemoryStore::new());
    for region in testutil::standard_regions() {
        store.insert_region(region);
    }
    for building in testutil::standard_buildings() {
        store.insert_building(building);
    }
    let clock = Arc::new(MonotonicClock::starting_at(testutil::start_time()));
    let collab = Collaborators::in_memory(Arc::clone(&store), clock);
    let world = World::new(
        config,
        collab,
        store.clone(),
        Box::new(testutil::seeded_rng(testutil::TEST_SEED)),
    );
    (store, world)
}

/// Rolls the lowest value every time: every percentile check passes and
/// every table draw picks the first entry.
pub struct LowRolls;

impl RngCore for LowRolls {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        dst.fill(0);
    }
}
