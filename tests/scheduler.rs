mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use outbreak_sim::config::WorldConfig;
use outbreak_sim::model::{DayCycle, DayPhase, EncounterAction, Player, PlayerClass, TimerKind};
use outbreak_sim::sim::{
    Clock, ConstructionTracker, EncounterEngine, EncounterError, FloorEntry, ManualClock, Scheduler,
    SchedulerError, SchedulerParts, TickContext, TickError, TimerQueue, WorldEvent, WorldSystem,
};
use outbreak_sim::store::{Collaborators, MemoryStore};
use outbreak_sim::testutil::{TestWorld, count_events, seeded_rng, start_time};

struct Counting {
    name: &'static str,
    calls: AtomicU32,
    panics: bool,
}

impl Counting {
    fn new(name: &'static str, panics: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: AtomicU32::new(0),
            panics,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WorldSystem for Counting {
    fn name(&self) -> &str {
        self.name
    }

    fn tick(&self, _ctx: &mut TickContext) -> Result<(), TickError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("{} blew up", self.name);
        }
        Ok(())
    }
}

/// A scheduler over the given passes and a manual clock.
fn scheduler_with(passes: Vec<Arc<dyn WorldSystem>>) -> (Arc<ManualClock>, Scheduler) {
    let config = WorldConfig::default();
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let collab = Collaborators::in_memory(Arc::clone(&store), clock.clone());
    let timers = Arc::new(TimerQueue::new());
    let cycle = DayCycle::new(start_time(), config.day_length);
    let encounters = Arc::new(EncounterEngine::new(collab.clone(), Arc::clone(&timers), &config, cycle));
    let construction = Arc::new(ConstructionTracker::new(collab.clone(), store, Arc::clone(&timers), &config));
    let scheduler = Scheduler::new(SchedulerParts {
        config,
        clock: clock.clone(),
        epoch: start_time(),
        timers,
        encounters,
        construction,
        passes,
        rng: Box::new(seeded_rng(31)),
    });
    (clock, scheduler)
}

#[test]
fn ticks_are_numbered_from_one() {
    let world = TestWorld::new();
    let first = world.tick();
    assert_eq!(first.tick, 1);
    assert_eq!(first.phase, DayPhase::Night);
    assert_eq!(first.now, world.now());

    world.advance(Duration::from_secs(30));
    assert_eq!(world.tick().tick, 2);
    assert_eq!(world.world.scheduler.tick_count(), 2);
}

#[test]
fn phase_advances_each_quarter_day() {
    let world = TestWorld::new();
    let quarter = world.world.config.day_length / 4;
    world.tick();

    let mut seen = Vec::new();
    for _ in 0..4 {
        world.advance(quarter);
        let report = world.tick();
        for event in &report.events {
            if let WorldEvent::PhaseChanged { from, to, .. } = event {
                seen.push((*from, *to));
            }
        }
        assert_eq!(report.phase, world.world.scheduler.phase());
    }
    assert_eq!(
        seen,
        vec![
            (DayPhase::Night, DayPhase::Morning),
            (DayPhase::Morning, DayPhase::Day),
            (DayPhase::Day, DayPhase::Evening),
            (DayPhase::Evening, DayPhase::Night),
        ]
    );
}

#[test]
fn passes_run_in_order_and_failures_are_isolated() {
    let first = Counting::new("first", false);
    let boom = Counting::new("boom", true);
    let last = Counting::new("last", false);
    let (clock, scheduler) = scheduler_with(vec![
        first.clone() as Arc<dyn WorldSystem>,
        boom.clone() as Arc<dyn WorldSystem>,
        last.clone() as Arc<dyn WorldSystem>,
    ]);

    let report = scheduler.run_tick(clock.now());
    assert_eq!(report.failed_passes, vec!["boom".to_string()]);
    assert!(!report.is_clean());
    assert_eq!((first.calls(), boom.calls(), last.calls()), (1, 1, 1));

    clock.advance(Duration::from_secs(30));
    let report = scheduler.run_tick(clock.now());
    assert_eq!(report.tick, 2);
    assert_eq!(last.calls(), 2);
}

#[test]
fn timer_for_missing_project_fails_once() {
    let world = TestWorld::new();
    world
        .world
        .scheduler
        .schedule_timer(1, TimerKind::ConstructionComplete { project_id: 77 }, Duration::from_secs(5));

    world.advance(Duration::from_secs(5));
    let report = world.tick();
    assert_eq!(report.failed_passes, vec!["timer_sweep".to_string()]);

    world.advance(Duration::from_secs(30));
    assert!(world.tick().is_clean(), "a fired timer is never retried");
}

#[test]
fn cancelled_timer_never_fires() {
    let world = TestWorld::new();
    let scheduler = &world.world.scheduler;
    let id = scheduler.schedule_timer(1, TimerKind::EncounterTimeout { encounter_id: 5 }, Duration::from_secs(5));
    assert!(scheduler.cancel_timer(id));
    assert!(!scheduler.cancel_timer(id));

    world.advance(Duration::from_secs(10));
    let report = world.tick();
    assert_eq!(
        count_events(&report.events, |e| matches!(e, WorldEvent::TimerSuperseded { .. })),
        0
    );
}

#[test]
fn orphan_timeout_is_superseded() {
    let world = TestWorld::new();
    let timer_id = world
        .world
        .scheduler
        .schedule_timer(1, TimerKind::EncounterTimeout { encounter_id: 5 }, Duration::from_secs(5));

    world.advance(Duration::from_secs(5));
    let report = world.tick();
    assert!(report.is_clean());
    assert!(report.events.contains(&WorldEvent::TimerSuperseded { timer_id }));
}

#[test]
fn start_needs_a_runtime() {
    let world = TestWorld::new();
    assert!(matches!(world.world.scheduler.start(), Err(SchedulerError::NoRuntime(_))));
    assert!(!world.world.scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn loop_ticks_on_its_period() {
    let (_store, world) = common::realtime_world(WorldConfig::default());
    world.scheduler.start().unwrap();
    assert!(matches!(world.scheduler.start(), Err(SchedulerError::AlreadyRunning)));
    assert!(world.scheduler.is_running());

    tokio::time::sleep(Duration::from_secs(95)).await;
    let ticks = world.scheduler.tick_count();
    assert!((3..=4).contains(&ticks), "expected a tick every 30s, got {ticks}");

    world.scheduler.stop().await;
    assert!(!world.scheduler.is_running());
    let after_stop = world.scheduler.tick_count();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(world.scheduler.tick_count(), after_stop);
}

#[tokio::test(start_paused = true)]
async fn stop_drops_pending_timers_unfired() {
    let (_store, world) = common::realtime_world(WorldConfig::default());
    world.scheduler.start().unwrap();
    world
        .scheduler
        .schedule_timer(1, TimerKind::EncounterTimeout { encounter_id: 1 }, Duration::from_secs(3_600));
    world
        .scheduler
        .schedule_timer(2, TimerKind::ConstructionComplete { project_id: 1 }, Duration::from_secs(7_200));
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(world.scheduler.stop().await, 2);
    assert!(world.scheduler.pending_timers().is_empty());

    // Restarting is allowed once stopped.
    world.scheduler.start().unwrap();
    world.scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn panicking_pass_does_not_kill_the_loop() {
    let boom = Counting::new("boom", true);
    let (clock, scheduler) = scheduler_with(vec![boom.clone() as Arc<dyn WorldSystem>]);
    scheduler.start().unwrap();

    for _ in 0..4 {
        clock.advance(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(10)).await;
    }
    assert!(scheduler.is_running());
    assert!(boom.calls() >= 3, "loop stopped ticking after a panic: {} calls", boom.calls());
    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_abandons_open_encounters() {
    let (store, world) = common::realtime_world(WorldConfig::default());
    store.insert_player(Player::new(1, "Alice", PlayerClass::Soldier, "Downtown"));
    let mut rng = seeded_rng(8);
    let entry = world.encounters.enter_floor(1, "Downtown:Hospital", 1, &mut rng).unwrap();
    assert!(matches!(entry, FloorEntry::Encounter(_)));

    world.scheduler.start().unwrap();
    assert_eq!(world.scheduler.stop().await, 1);
    assert_eq!(world.encounters.active_count(), 0);
    assert!(matches!(
        world.encounters.resolve(1, EncounterAction::Sneak, &mut rng),
        Err(EncounterError::NoActiveEncounter)
    ));

    // Free to explore again once the loot cooldown is over.
    tokio::time::sleep(Duration::from_secs(31)).await;
    let entry = world.encounters.enter_floor(1, "Downtown:Hospital", 2, &mut rng).unwrap();
    assert!(matches!(entry, FloorEntry::Encounter(_)));
}
