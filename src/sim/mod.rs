mod clock;
pub mod combat;
mod construction;
mod context;
pub mod encounter;
pub mod offline;
pub mod population;
mod scheduler;
mod signal;
mod system;
mod timers;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock, WorldClock};
pub use combat::{CombatOutcome, CombatRules, CombatSession, Fighter};
pub use construction::{ConstructionError, ConstructionTracker, ConsumedResources};
pub use context::TickContext;
pub use encounter::{EncounterEngine, EncounterError, EncounterOutcome, FloorEntry};
pub use offline::{AmbushReport, OfflineActivityProcessor, OfflineError};
pub use population::SpawnSystem;
pub use scheduler::{Scheduler, SchedulerError, SchedulerParts, TickReport};
pub use signal::WorldEvent;
pub use system::{TickError, WorldSystem};
pub use timers::TimerQueue;

/// Lock a mutex, recovering the data if a panicking pass poisoned it.
///
/// Every guarded structure is left consistent between statements, so the
/// data behind a poisoned lock is still valid.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
