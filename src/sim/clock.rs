use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::WorldConfig;
use crate::model::time::duration_millis;
use crate::model::{DayCycle, DayPhase, GameTime};

/// Source of "now" for every component.
pub trait Clock: Send + Sync {
    fn now(&self) -> GameTime;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> GameTime {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        GameTime::from_millis(duration_millis(since_epoch))
    }
}

/// Tokio's monotonic clock offset from a fixed start.
///
/// Follows paused test time, so a loop driven by `tokio::time::sleep` sees
/// the clock advance in step with its own sleeps.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
    base: GameTime,
}

impl MonotonicClock {
    pub fn starting_at(base: GameTime) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            base,
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> GameTime {
        self.base.saturating_add(self.origin.elapsed())
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start: GameTime) -> Self {
        Self {
            millis: AtomicU64::new(start.as_millis()),
        }
    }

    pub fn set(&self, t: GameTime) {
        self.millis.store(t.as_millis(), Ordering::SeqCst);
    }

    pub fn advance(&self, d: Duration) {
        self.millis.fetch_add(duration_millis(d), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> GameTime {
        GameTime::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Tick bookkeeping owned by the scheduler.
///
/// `phase` is a cached read of [`DayCycle::phase_at`], refreshed at most once
/// per quarter day.
#[derive(Debug, Clone)]
pub struct WorldClock {
    pub tick_count: u64,
    pub last_tick: Option<GameTime>,
    pub tick_period: Duration,
    pub cycle: DayCycle,
    phase: DayPhase,
    last_phase_refresh: GameTime,
}

impl WorldClock {
    pub fn new(epoch: GameTime, config: &WorldConfig) -> Self {
        let cycle = DayCycle::new(epoch, config.day_length);
        Self {
            tick_count: 0,
            last_tick: None,
            tick_period: config.tick_period,
            cycle,
            phase: cycle.phase_at(epoch),
            last_phase_refresh: epoch,
        }
    }

    pub fn phase(&self) -> DayPhase {
        self.phase
    }

    /// The first tick is due immediately.
    pub fn is_tick_due(&self, now: GameTime) -> bool {
        match self.last_tick {
            None => true,
            Some(last) => now.since(last) >= self.tick_period,
        }
    }

    /// Count a tick at `now` and return its number, starting at 1.
    pub fn record_tick(&mut self, now: GameTime) -> u64 {
        self.tick_count += 1;
        self.last_tick = Some(now);
        self.tick_count
    }

    /// Recompute the cached phase if a quarter day has passed since the last
    /// refresh. Returns `(old, new)` when the phase actually changed.
    pub fn refresh_phase(&mut self, now: GameTime) -> Option<(DayPhase, DayPhase)> {
        if now.since(self.last_phase_refresh) < self.cycle.refresh_period() {
            return None;
        }
        self.last_phase_refresh = now;
        let next = self.cycle.phase_at(now);
        let old = std::mem::replace(&mut self.phase, next);
        (old != next).then_some((old, next))
    }

    /// Time until the next tick is due.
    pub fn until_next_tick(&self, now: GameTime) -> Duration {
        match self.last_tick {
            None => Duration::ZERO,
            Some(last) => now.until(last.saturating_add(self.tick_period)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> WorldClock {
        WorldClock::new(GameTime::ZERO, &WorldConfig::default())
    }

    #[test]
    fn first_tick_is_immediate() {
        let mut c = clock();
        assert!(c.is_tick_due(GameTime::ZERO));
        assert_eq!(c.record_tick(GameTime::ZERO), 1);
        assert!(!c.is_tick_due(GameTime::from_secs(29)));
        assert!(c.is_tick_due(GameTime::from_secs(30)));
        assert_eq!(c.until_next_tick(GameTime::from_secs(10)), Duration::from_secs(20));
    }

    #[test]
    fn phase_refresh_is_coarse() {
        let mut c = clock();
        assert_eq!(c.phase(), DayPhase::Night);
        // Quarter day is 450s with the default day length
        assert_eq!(c.refresh_phase(GameTime::from_secs(449)), None);
        assert_eq!(
            c.refresh_phase(GameTime::from_secs(450)),
            Some((DayPhase::Night, DayPhase::Morning))
        );
        assert_eq!(c.refresh_phase(GameTime::from_secs(500)), None);
        assert_eq!(c.phase(), DayPhase::Morning);
    }

    #[test]
    fn system_clock_reads_unix_millis() {
        let wall = |t: SystemTime| duration_millis(t.duration_since(UNIX_EPOCH).unwrap());
        let before = wall(SystemTime::now());
        let now = SystemClock.now().as_millis();
        let after = wall(SystemTime::now());
        assert!(before <= now && now <= after, "{before} <= {now} <= {after}");
        assert!(SystemClock.now() >= GameTime::from_millis(now));
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let c = ManualClock::new(GameTime::from_secs(5));
        c.advance(Duration::from_millis(1_500));
        assert_eq!(c.now(), GameTime::from_millis(6_500));
        c.set(GameTime::ZERO);
        assert_eq!(c.now(), GameTime::ZERO);
    }
}
