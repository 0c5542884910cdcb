use rand::RngCore;

use super::signal::WorldEvent;
use crate::model::{DayPhase, GameTime};

/// Context passed to each system on every tick.
///
/// Bundled so we can add fields later without changing the `WorldSystem`
/// trait signature.
pub struct TickContext<'a> {
    pub now: GameTime,
    pub phase: DayPhase,
    pub rng: &'a mut dyn RngCore,
    /// Systems push events here during `tick`.
    pub events: &'a mut Vec<WorldEvent>,
}

impl TickContext<'_> {
    pub fn is_night(&self) -> bool {
        self.phase.is_night()
    }

    pub fn emit(&mut self, event: WorldEvent) {
        self.events.push(event);
    }
}
