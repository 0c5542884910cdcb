use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::RngCore;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::clock::{Clock, WorldClock};
use super::construction::ConstructionTracker;
use super::context::TickContext;
use super::encounter::EncounterEngine;
use super::lock;
use super::signal::WorldEvent;
use super::system::{TickError, WorldSystem};
use super::timers::TimerQueue;
use crate::config::WorldConfig;
use crate::model::{DayPhase, GameTime, PendingTimer, PlayerId, TimerId, TimerKind};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("no tokio runtime to run on: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub now: GameTime,
    pub phase: DayPhase,
    pub events: Vec<WorldEvent>,
    /// Passes that errored or panicked. The rest of the tick still ran.
    pub failed_passes: Vec<String>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failed_passes.is_empty()
    }
}

/// Components the scheduler drives.
pub struct SchedulerParts {
    pub config: WorldConfig,
    pub clock: Arc<dyn Clock>,
    pub epoch: GameTime,
    pub timers: Arc<TimerQueue>,
    pub encounters: Arc<EncounterEngine>,
    pub construction: Arc<ConstructionTracker>,
    /// Run in order before the timer sweep.
    pub passes: Vec<Arc<dyn WorldSystem>>,
    pub rng: Box<dyn RngCore + Send>,
}

struct Core {
    config: WorldConfig,
    clock: Arc<dyn Clock>,
    timers: Arc<TimerQueue>,
    encounters: Arc<EncounterEngine>,
    construction: Arc<ConstructionTracker>,
    passes: Vec<Arc<dyn WorldSystem>>,
    world_clock: Mutex<WorldClock>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    /// Phase changes seen between ticks, delivered with the next report.
    pending_events: Mutex<Vec<WorldEvent>>,
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the tick loop, the day/night clock and the pending-timer queue.
pub struct Scheduler {
    core: Arc<Core>,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(parts: SchedulerParts) -> Self {
        let world_clock = WorldClock::new(parts.epoch, &parts.config);
        Self {
            core: Arc::new(Core {
                config: parts.config,
                clock: parts.clock,
                timers: parts.timers,
                encounters: parts.encounters,
                construction: parts.construction,
                passes: parts.passes,
                world_clock: Mutex::new(world_clock),
                rng: Mutex::new(parts.rng),
                pending_events: Mutex::new(Vec::new()),
            }),
            running: Mutex::new(None),
        }
    }

    /// Spawn the tick loop on the current tokio runtime and return at once.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let handle = tokio::runtime::Handle::try_current()?;
        let mut running = lock(&self.running);
        if running.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }
        let (shutdown, rx) = watch::channel(false);
        let task = handle.spawn(run_loop(Arc::clone(&self.core), rx));
        *running = Some(Running { shutdown, task });
        tracing::info!(
            tick_period = ?self.core.config.tick_period,
            day_length = ?self.core.config.day_length,
            "scheduler started"
        );
        Ok(())
    }

    /// Stop the loop, wait for it to exit, then drop every pending timer
    /// without firing it along with the encounters those timers guarded.
    /// Returns how many timers were dropped.
    pub async fn stop(&self) -> usize {
        let running = lock(&self.running).take();
        if let Some(Running { shutdown, task }) = running {
            let _ = shutdown.send(true);
            if let Err(e) = task.await {
                tracing::error!(error = %e, "tick loop task ended abnormally");
            }
        }
        let dropped = self.core.timers.clear();
        let abandoned = self.core.encounters.drop_pending();
        tracing::info!(dropped, abandoned, "scheduler stopped");
        dropped
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).as_ref().is_some_and(|r| !r.task.is_finished())
    }

    pub fn schedule_timer(&self, owner: PlayerId, kind: TimerKind, delay: Duration) -> TimerId {
        let expires_at = self.core.clock.now().saturating_add(delay);
        self.core.timers.schedule(owner, kind, expires_at)
    }

    /// `false` if the timer already fired or never existed.
    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.core.timers.cancel(id)
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.core.timers.pending()
    }

    pub fn phase(&self) -> DayPhase {
        lock(&self.core.world_clock).phase()
    }

    pub fn tick_count(&self) -> u64 {
        lock(&self.core.world_clock).tick_count
    }

    /// Run one full pass at `now`, regardless of the tick period.
    pub fn run_tick(&self, now: GameTime) -> TickReport {
        self.core.run_tick(now)
    }
}

impl Core {
    fn refresh_phase(&self, now: GameTime) {
        let mut world_clock = lock(&self.world_clock);
        if let Some((from, to)) = world_clock.refresh_phase(now) {
            let day = world_clock.cycle.day_number(now);
            tracing::info!(%from, %to, day, "day phase changed");
            lock(&self.pending_events).push(WorldEvent::PhaseChanged { from, to, day });
        }
    }

    fn run_tick(&self, now: GameTime) -> TickReport {
        self.refresh_phase(now);
        let (tick, phase) = {
            let mut world_clock = lock(&self.world_clock);
            (world_clock.record_tick(now), world_clock.phase())
        };
        let mut events = std::mem::take(&mut *lock(&self.pending_events));
        let mut failed_passes = Vec::new();

        let mut rng_guard = lock(&self.rng);
        let rng: &mut dyn RngCore = &mut **rng_guard;

        for pass in &self.passes {
            let mut ctx = TickContext {
                now,
                phase,
                rng: &mut *rng,
                events: &mut events,
            };
            if !guarded(pass.name(), || pass.tick(&mut ctx)) {
                failed_passes.push(pass.name().to_string());
            }
        }

        let mut ctx = TickContext {
            now,
            phase,
            rng: &mut *rng,
            events: &mut events,
        };
        if !guarded("timer_sweep", || self.sweep_timers(&mut ctx)) {
            failed_passes.push("timer_sweep".to_string());
        }

        tracing::debug!(tick, %now, %phase, events = events.len(), "tick complete");
        TickReport {
            tick,
            now,
            phase,
            events,
            failed_passes,
        }
    }

    /// Route every expired timer to its owner component.
    fn sweep_timers(&self, ctx: &mut TickContext) -> Result<(), TickError> {
        let mut failed = 0;
        for timer in self.timers.take_expired(ctx.now) {
            match timer.kind {
                TimerKind::EncounterTimeout { encounter_id } => {
                    match self.encounters.expire(timer.owner, encounter_id, ctx.rng) {
                        Ok(Some(outcome)) => ctx.emit(WorldEvent::EncounterTimedOut {
                            encounter_id,
                            player_id: timer.owner,
                            player_died: outcome.player_died,
                        }),
                        Ok(None) => ctx.emit(WorldEvent::TimerSuperseded { timer_id: timer.id }),
                        Err(e) => {
                            failed += 1;
                            tracing::warn!(timer_id = timer.id, encounter_id, error = %e, "encounter timeout failed");
                        }
                    }
                }
                TimerKind::ConstructionComplete { project_id } => {
                    match self.construction.complete_and_report(project_id, ctx) {
                        Ok(true) => {}
                        Ok(false) => ctx.emit(WorldEvent::TimerSuperseded { timer_id: timer.id }),
                        Err(e) => {
                            failed += 1;
                            tracing::warn!(timer_id = timer.id, project_id, error = %e, "construction timer failed");
                        }
                    }
                }
            }
        }
        if failed > 0 {
            return Err(TickError::Failed {
                pass: "timer_sweep",
                reason: format!("{failed} timers failed"),
            });
        }
        Ok(())
    }
}

/// Run a pass, logging any error or panic. Returns whether it succeeded.
fn guarded(name: &str, pass: impl FnOnce() -> Result<(), TickError>) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(pass)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::error!(pass = name, error = %e, "tick pass failed");
            false
        }
        Err(payload) => {
            tracing::error!(pass = name, panic = panic_message(payload.as_ref()), "tick pass panicked");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

async fn run_loop(core: Arc<Core>, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("tick loop running");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = core.clock.now();
        core.refresh_phase(now);
        let due = lock(&core.world_clock).is_tick_due(now);

        let mut delay = core.config.poll_interval;
        if due {
            let report = core.run_tick(now);
            if report.is_clean() {
                tracing::debug!(tick = report.tick, events = report.events.len(), "tick ok");
            } else {
                tracing::warn!(
                    tick = report.tick,
                    failed = ?report.failed_passes,
                    backoff = ?core.config.error_backoff,
                    "tick had failures, backing off"
                );
                delay = core.config.error_backoff;
            }
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    tracing::info!("tick loop exited");
}
