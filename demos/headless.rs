//! Run the simulation core with no chat front end attached.
//!
//! `RUST_LOG=outbreak_sim=debug cargo run --example headless`

use std::time::Duration;

use outbreak_sim::config::{WorldConfig, WorldSettings};
use outbreak_sim::model::{EncounterAction, PlayerClass, StructureKind};
use outbreak_sim::sim::FloorEntry;
use outbreak_sim::testutil::{TestWorld, seeded_rng};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Hundredfold time: a world day lasts 18s and builds finish within the hour.
    let settings = WorldSettings {
        time_multiplier: 0.01,
        scavenge_cooldown_secs: 600,
        seed: Some(2024),
        ..WorldSettings::default()
    };
    let config = match WorldConfig::from_settings(settings) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bad settings: {e}");
            return;
        }
    };
    let world = TestWorld::with_config(config);
    let mut rng = seeded_rng(2024);

    let mut soldier = world.add_player(1, PlayerClass::Soldier, "Downtown");
    soldier.weapon_damage = 40;
    world.put_player(soldier);
    let mut engineer = world.add_player(2, PlayerClass::Mechanic, "Forest");
    engineer.intelligence = 60;
    world.put_player(engineer);
    world.add_player(3, PlayerClass::Scavenger, "Coast");

    for (item, qty) in [("metal", 20), ("circuit", 5), ("wood", 10)] {
        world.give(2, item, qty);
    }

    match world.world.encounters.enter_floor(1, "Downtown:Hospital", 1, &mut rng) {
        Ok(FloorEntry::Encounter(e)) => {
            println!("player 1 meets {} zombies on floor {}", e.zombies.len(), e.floor);
            match world.world.encounters.resolve(1, EncounterAction::Sneak, &mut rng) {
                Ok(outcome) => println!("{}", serde_json::to_string_pretty(&outcome).unwrap_or_default()),
                Err(e) => println!("resolve failed: {e}"),
            }
        }
        Ok(FloorEntry::Safe { .. }) => println!("floor was quiet"),
        Err(e) => println!("could not enter: {e}"),
    }

    match world.world.construction.begin(2, StructureKind::RadioTower, "Forest:Camp:Area1") {
        Ok(id) => println!("radio tower project {id} started"),
        Err(e) => println!("construction refused: {e}"),
    }
    if let Err(e) = world.world.offline.start_scavenging(3) {
        println!("scavenging refused: {e}");
    }
    if let Err(e) = world.world.offline.start_ambush(1, "Coast") {
        println!("ambush refused: {e}");
    }

    for _ in 0..48 {
        world.advance(Duration::from_secs(60));
        let report = world.tick();
        for event in &report.events {
            println!("tick {:>3} [{}] {}", report.tick, report.phase, event.label());
        }
    }

    let mut rng = seeded_rng(7);
    if let Ok(Some(report)) = world.world.offline.on_player_entered(3, "Coast", &mut rng) {
        println!("ambush: {report:?}");
    }

    println!("player 2 inventory: {:?}", world.store.inventory(2));
    println!("player 3 inventory: {:?}", world.store.inventory(3));
    println!("completed projects: {}", world.store.completed().len());

    // The real loop, briefly.
    if let Err(e) = world.world.scheduler.start() {
        println!("scheduler refused to start: {e}");
        return;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
    let dropped = world.world.scheduler.stop().await;
    println!("stopped after {} ticks, {dropped} timers dropped", world.world.scheduler.tick_count());
}
