use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

use crate::config::{ConfigError, WorldConfig, WorldSettings};
use crate::model::DayCycle;
use crate::sim::{
    ConstructionTracker, EncounterEngine, OfflineActivityProcessor, Scheduler, SchedulerParts,
    SpawnSystem, TimerQueue, WorldSystem,
};
use crate::store::{Collaborators, CompletionSink};

/// The assembled simulation core.
///
/// Built once at process start and handed to the front-end dispatcher.
/// Components depend strictly downward; the timer queue is the only piece
/// shared between the encounter engine, the tracker and the scheduler.
pub struct World {
    pub config: WorldConfig,
    pub timers: Arc<TimerQueue>,
    pub encounters: Arc<EncounterEngine>,
    pub offline: Arc<OfflineActivityProcessor>,
    pub construction: Arc<ConstructionTracker>,
    pub scheduler: Scheduler,
}

impl World {
    pub fn new(
        config: WorldConfig,
        collab: Collaborators,
        sink: Arc<dyn CompletionSink>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let epoch = collab.clock.now();
        let cycle = DayCycle::new(epoch, config.day_length);
        let timers = Arc::new(TimerQueue::new());

        let encounters = Arc::new(EncounterEngine::new(collab.clone(), Arc::clone(&timers), &config, cycle));
        let offline = Arc::new(OfflineActivityProcessor::new(collab.clone(), &config));
        let construction = Arc::new(ConstructionTracker::new(collab.clone(), sink, Arc::clone(&timers), &config));
        let spawn = Arc::new(SpawnSystem::new(Arc::clone(&collab.regions), config.zombies.clone()));

        // Spawn roll, offline resolution, construction sweep; the timer
        // sweep runs last inside the scheduler.
        let mut passes: Vec<Arc<dyn WorldSystem>> = Vec::with_capacity(3);
        passes.push(spawn);
        passes.push(offline.clone());
        passes.push(construction.clone());

        let scheduler = Scheduler::new(SchedulerParts {
            config: config.clone(),
            clock: Arc::clone(&collab.clock),
            epoch,
            timers: Arc::clone(&timers),
            encounters: Arc::clone(&encounters),
            construction: Arc::clone(&construction),
            passes,
            rng,
        });

        tracing::info!(%epoch, seed = ?config.seed, "world assembled");
        Self {
            config,
            timers,
            encounters,
            offline,
            construction,
            scheduler,
        }
    }

    /// Validate settings and assemble. An invalid configuration never yields
    /// a scheduler.
    pub fn from_settings(
        settings: WorldSettings,
        collab: Collaborators,
        sink: Arc<dyn CompletionSink>,
    ) -> Result<Self, ConfigError> {
        let config = WorldConfig::from_settings(settings)?;
        let rng: Box<dyn RngCore + Send> = match config.seed {
            Some(seed) => Box::new(SmallRng::seed_from_u64(seed)),
            None => Box::new(SmallRng::from_os_rng()),
        };
        Ok(Self::new(config, collab, sink, rng))
    }
}
