mod common;

use std::collections::BTreeMap;
use std::time::Duration;

use outbreak_sim::model::{
    EncounterAction, PlayerClass, PlayerStatus, ResolutionPath, TimerKind,
};
use outbreak_sim::sim::{EncounterError, FloorEntry, WorldEvent};
use outbreak_sim::store::BuildingStore;
use outbreak_sim::testutil::{TestWorld, count_events, seeded_rng};

const HOSPITAL: &str = "Downtown:Hospital";
const WAREHOUSE: &str = "Urban:Warehouse";

fn open_encounter(world: &TestWorld, player: u64) -> outbreak_sim::model::Encounter {
    let mut rng = seeded_rng(player);
    match world.world.encounters.enter_floor(player, HOSPITAL, 1, &mut rng) {
        Ok(FloorEntry::Encounter(e)) => e,
        other => panic!("expected an encounter, got {other:?}"),
    }
}

#[test]
fn safe_floor_opens_no_window() {
    let world = TestWorld::new();
    world.add_player(1, PlayerClass::Scavenger, "Urban");
    let mut rng = seeded_rng(1);

    let entry = world.world.encounters.enter_floor(1, WAREHOUSE, 1, &mut rng).unwrap();
    assert_eq!(
        entry,
        FloorEntry::Safe {
            building_id: WAREHOUSE.to_string(),
            floor: 1
        }
    );
    assert_eq!(world.world.encounters.active_count(), 0);
    assert!(world.world.timers.is_empty());
}

#[test]
fn zombie_floor_opens_window_with_timer() {
    let world = TestWorld::new();
    world.add_player(1, PlayerClass::Soldier, "Downtown");

    let encounter = open_encounter(&world, 1);
    assert_eq!(encounter.zombies.len(), 2);
    assert_eq!(encounter.difficulty, 30);
    assert_eq!(encounter.expires_at, world.now().saturating_add(Duration::from_secs(7)));

    let pending = world.world.scheduler.pending_timers();
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].kind,
        TimerKind::EncounterTimeout {
            encounter_id: encounter.id
        }
    );
    assert_eq!(pending[0].expires_at, encounter.expires_at);
    assert_eq!(encounter.timer_id, Some(pending[0].id));
}

#[test]
fn one_encounter_per_player() {
    let world = TestWorld::new();
    world.add_player(1, PlayerClass::Soldier, "Downtown");
    open_encounter(&world, 1);

    let mut rng = seeded_rng(9);
    let err = world.world.encounters.enter_floor(1, HOSPITAL, 2, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::AlreadyEncountering));
    assert!(err.is_user_error());
}

#[test]
fn floor_entry_respects_loot_cooldown() {
    let world = TestWorld::new();
    world.add_player(1, PlayerClass::Scavenger, "Urban");
    let mut rng = seeded_rng(3);
    world.world.encounters.enter_floor(1, WAREHOUSE, 1, &mut rng).unwrap();

    world.advance(Duration::from_secs(10));
    let err = world.world.encounters.enter_floor(1, HOSPITAL, 1, &mut rng).unwrap_err();
    match err {
        EncounterError::OnCooldown { remaining } => assert_eq!(remaining, Duration::from_secs(20)),
        other => panic!("expected cooldown, got {other:?}"),
    }

    world.advance(Duration::from_secs(20));
    assert!(world.world.encounters.enter_floor(1, HOSPITAL, 1, &mut rng).is_ok());
}

#[test]
fn cleared_floor_is_closed_to_that_player_only() {
    let world = TestWorld::new();
    world.add_player(1, PlayerClass::Soldier, "Downtown");
    world.add_player(2, PlayerClass::Soldier, "Downtown");
    world.store.mark_floor_cleared(HOSPITAL, 1, 1).unwrap();

    let mut rng = seeded_rng(4);
    let err = world.world.encounters.enter_floor(1, HOSPITAL, 1, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::AlreadyCleared { floor: 1 }));
    assert!(world.world.encounters.enter_floor(2, HOSPITAL, 1, &mut rng).is_ok());
}

#[test]
fn unknown_building_and_floor() {
    let world = TestWorld::new();
    world.add_player(1, PlayerClass::Soldier, "Downtown");
    let mut rng = seeded_rng(5);

    let err = world.world.encounters.enter_floor(1, "Downtown:Library", 1, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::BuildingNotFound(_)));
    let err = world.world.encounters.enter_floor(1, HOSPITAL, 9, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::FloorNotFound { floor: 9, .. }));
    let err = world.world.encounters.enter_floor(7, HOSPITAL, 1, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::PlayerNotFound(7)));
}

#[test]
fn dead_players_cannot_explore() {
    let world = TestWorld::new();
    let mut corpse = world.add_player(1, PlayerClass::Soldier, "Downtown");
    corpse.status = PlayerStatus::Dead;
    corpse.hp = 0;
    world.put_player(corpse);

    let mut rng = seeded_rng(6);
    let err = world.world.encounters.enter_floor(1, HOSPITAL, 1, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::PlayerDead));
}

#[test]
fn attack_clears_floor_and_cancels_timer() {
    let world = TestWorld::new();
    common::veteran(&world, 1, "Downtown");
    let mut downtown = world.store.region("Downtown").unwrap();
    downtown.zombies = 10;
    world.store.insert_region(downtown);
    open_encounter(&world, 1);

    let mut rng = seeded_rng(11);
    let outcome = world.world.encounters.resolve(1, EncounterAction::Attack, &mut rng).unwrap();
    assert_eq!(outcome.path, ResolutionPath::Player);
    assert_eq!(outcome.resolved_as, EncounterAction::Attack);
    assert_eq!(outcome.zombies_killed, 2);
    assert!(outcome.floor_cleared);
    assert!(!outcome.player_died);
    assert!(!outcome.loot.is_empty());

    assert!(world.world.timers.is_empty(), "resolving must cancel the timeout");
    assert!(world.store.building(HOSPITAL).unwrap().is_cleared_by(1, 1));
    let inventory = world.store.inventory(1);
    for (item, qty) in &outcome.loot {
        assert_eq!(inventory.get(item), Some(qty));
    }
    assert_eq!(world.store.region("Downtown").unwrap().zombies, 8);

    // The window would have closed by now; nothing fires.
    world.advance(Duration::from_secs(30));
    let report = world.tick();
    assert_eq!(
        count_events(&report.events, |e| matches!(e, WorldEvent::EncounterTimedOut { .. })),
        0
    );
    assert!(matches!(
        world.world.encounters.resolve(1, EncounterAction::Sneak, &mut rng),
        Err(EncounterError::NoActiveEncounter)
    ));
}

#[test]
fn player_decision_after_window_is_rejected() {
    let world = TestWorld::new();
    common::veteran(&world, 1, "Downtown");
    open_encounter(&world, 1);

    world.advance(Duration::from_secs(8));
    let mut rng = seeded_rng(12);
    let err = world.world.encounters.resolve(1, EncounterAction::Attack, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::EncounterExpired));

    let report = world.tick();
    let timed_out = count_events(&report.events, |e| {
        matches!(e, WorldEvent::EncounterTimedOut { player_id: 1, player_died: false, .. })
    });
    assert_eq!(timed_out, 1);
    assert_eq!(world.world.encounters.active_count(), 0);

    let report = world.tick();
    assert_eq!(
        count_events(&report.events, |e| matches!(e, WorldEvent::EncounterTimedOut { .. })),
        0
    );
}

#[test]
fn stale_timeout_is_a_no_op() {
    let world = TestWorld::new();
    common::veteran(&world, 1, "Downtown");
    let encounter = open_encounter(&world, 1);
    let mut rng = seeded_rng(13);
    world.world.encounters.resolve(1, EncounterAction::Attack, &mut rng).unwrap();

    let late = world.world.encounters.expire(1, encounter.id, &mut rng).unwrap();
    assert!(late.is_none());
}

#[test]
fn player_and_timer_race_settles_once() {
    let world = TestWorld::new();
    for id in 1..=40 {
        common::veteran(&world, id, "Downtown");
    }
    let encounters: Vec<_> = (1..=40).map(|id| open_encounter(&world, id)).collect();

    // Exactly at the deadline both paths are allowed to try.
    world.advance(Duration::from_secs(7));
    for encounter in encounters {
        let engine = &world.world.encounters;
        let (by_player, by_timer) = std::thread::scope(|s| {
            let player = s.spawn(|| {
                let mut rng = seeded_rng(encounter.id);
                engine.resolve(encounter.player_id, EncounterAction::Sneak, &mut rng)
            });
            let timer = s.spawn(|| {
                let mut rng = seeded_rng(encounter.id + 1_000);
                engine.expire(encounter.player_id, encounter.id, &mut rng)
            });
            (player.join().unwrap(), timer.join().unwrap())
        });

        let player_won = by_player.is_ok();
        let timer_won = matches!(by_timer, Ok(Some(_)));
        assert!(
            player_won ^ timer_won,
            "encounter {} settled {} times",
            encounter.id,
            u8::from(player_won) + u8::from(timer_won)
        );
        if !player_won {
            assert!(matches!(by_player, Err(EncounterError::NoActiveEncounter)));
        }
    }
    assert_eq!(world.world.encounters.active_count(), 0);
}

#[test]
fn store_failure_never_strands_an_encounter() {
    let world = TestWorld::new();
    common::veteran(&world, 1, "Downtown");
    open_encounter(&world, 1);

    world.store.set_unavailable(true);
    let mut rng = seeded_rng(14);
    let err = world.world.encounters.resolve(1, EncounterAction::Attack, &mut rng).unwrap_err();
    assert!(matches!(err, EncounterError::Store(_)));
    assert!(!err.is_user_error());
    world.store.set_unavailable(false);

    assert!(world.world.encounters.active_encounter(1).is_none());
    assert!(world.world.timers.is_empty());
}

#[test]
fn weak_player_can_die_on_a_hard_floor() {
    let world = TestWorld::new();
    let mut player = world.add_player(1, PlayerClass::Scavenger, "Military");
    player.hp = 1;
    world.put_player(player);

    let mut rng = seeded_rng(15);
    let entry = world.world.encounters.enter_floor(1, "Military:Base", 3, &mut rng).unwrap();
    assert!(matches!(entry, FloorEntry::Encounter(_)));
    let outcome = world.world.encounters.resolve(1, EncounterAction::Attack, &mut rng).unwrap();

    assert!(outcome.player_died);
    assert!(!outcome.floor_cleared);
    assert!(outcome.loot.is_empty());
    assert!(world.store.inventory(1).is_empty());
    assert_eq!(world.player(1).status, PlayerStatus::Dead);
    assert!(!world.store.building("Military:Base").unwrap().is_cleared_by(3, 1));
}

/// `(item, qty)` the first draw from a floor's table yields.
fn first_loot_entry(world: &TestWorld, building: &str, floor: u32) -> (String, u32) {
    let building = world.store.building(building).unwrap();
    building.floor(floor).unwrap().loot[0].clone()
}

#[test]
fn clean_sneak_takes_a_little_and_leaves_the_floor() {
    let world = TestWorld::new();
    let mut player = world.add_player(1, PlayerClass::Soldier, "Downtown");
    player.stamina = 10_000;
    world.put_player(player);
    let zombies_before = world.store.region("Downtown").unwrap().zombies;
    open_encounter(&world, 1);

    let outcome = world
        .world
        .encounters
        .resolve(1, EncounterAction::Sneak, &mut common::LowRolls)
        .unwrap();
    assert_eq!(outcome.requested, EncounterAction::Sneak);
    assert_eq!(outcome.resolved_as, EncounterAction::Sneak);
    assert_eq!(outcome.path, ResolutionPath::Player);
    assert!(!outcome.floor_cleared);
    assert_eq!((outcome.zombies_killed, outcome.damage_taken), (0, 0));

    // Difficulty 30 buys 2 + 30/20 = 3 draws, all landing on the first entry.
    let (item, qty) = first_loot_entry(&world, HOSPITAL, 1);
    assert_eq!(outcome.loot, BTreeMap::from([(item, 3 * qty)]));
    assert_eq!(world.store.inventory(1), outcome.loot);

    assert!(!world.store.building(HOSPITAL).unwrap().is_cleared_by(1, 1));
    assert_eq!(world.store.region("Downtown").unwrap().zombies, zombies_before);
    assert!(world.world.timers.is_empty());
    assert!(world.world.encounters.active_encounter(1).is_none());

    world.advance(Duration::from_secs(8));
    let report = world.tick();
    assert_eq!(
        count_events(&report.events, |e| matches!(e, WorldEvent::EncounterTimedOut { .. })),
        0
    );
}

#[test]
fn timeout_is_settled_as_a_sneak() {
    let world = TestWorld::new();
    let mut player = world.add_player(1, PlayerClass::Soldier, "Downtown");
    player.stamina = 10_000;
    world.put_player(player);
    let encounter = open_encounter(&world, 1);

    world.advance(Duration::from_secs(8));
    let outcome = world
        .world
        .encounters
        .expire(1, encounter.id, &mut common::LowRolls)
        .unwrap()
        .expect("the window closed with no decision");
    assert_eq!(outcome.encounter_id, encounter.id);
    assert_eq!(outcome.requested, EncounterAction::Sneak);
    assert_eq!(outcome.resolved_as, EncounterAction::Sneak);
    assert_eq!(outcome.path, ResolutionPath::Timeout);
    assert!(!outcome.floor_cleared);
    assert!(!world.store.building(HOSPITAL).unwrap().is_cleared_by(1, 1));
    assert_eq!(outcome.loot.values().sum::<u32>(), 3 * first_loot_entry(&world, HOSPITAL, 1).1);

    // The queued timer finds nothing left to settle.
    let report = world.tick();
    assert_eq!(
        count_events(&report.events, |e| matches!(e, WorldEvent::TimerSuperseded { .. })),
        1
    );
}
