use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MILLIS_PER_SECOND: u64 = 1_000;
pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const SECONDS_PER_DAY: u64 = 86_400;

/// A point in world time as whole milliseconds since the Unix epoch.
///
/// A plain `u64` wrapper. Natural ordering equals chronological ordering, and
/// all arithmetic saturates so a clock skew can never wrap around.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameTime(u64);

impl GameTime {
    pub const ZERO: GameTime = GameTime(0);

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(MILLIS_PER_SECOND))
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Whole seconds, truncated.
    pub fn as_secs(self) -> u64 {
        self.0 / MILLIS_PER_SECOND
    }

    pub fn saturating_add(self, d: Duration) -> Self {
        Self(self.0.saturating_add(duration_millis(d)))
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn since(self, earlier: GameTime) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Time left until `later`, zero if `later` has already passed.
    pub fn until(self, later: GameTime) -> Duration {
        later.since(self)
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.as_secs(), self.0 % MILLIS_PER_SECOND)
    }
}

/// `Duration` as whole milliseconds, saturating at `u64::MAX`.
pub fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// The four quarters of a world day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPhase {
    Night,
    Morning,
    Day,
    Evening,
}

impl DayPhase {
    /// Zombies are harder to sneak past and spawn more often in the dark half.
    pub fn is_night(self) -> bool {
        matches!(self, DayPhase::Night | DayPhase::Evening)
    }

    fn from_quarter(quarter: u64) -> Self {
        match quarter {
            0 => DayPhase::Night,
            1 => DayPhase::Morning,
            2 => DayPhase::Day,
            _ => DayPhase::Evening,
        }
    }
}

impl fmt::Display for DayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DayPhase::Night => "night",
            DayPhase::Morning => "morning",
            DayPhase::Day => "day",
            DayPhase::Evening => "evening",
        };
        f.write_str(s)
    }
}

/// Day/night cycle anchored at a world epoch.
///
/// The phase is a pure function of elapsed time modulo the day length, so
/// any component can ask for it without sharing mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCycle {
    pub epoch: GameTime,
    pub day_length: Duration,
}

impl DayCycle {
    pub fn new(epoch: GameTime, day_length: Duration) -> Self {
        Self { epoch, day_length }
    }

    pub fn phase_at(&self, now: GameTime) -> DayPhase {
        let len = duration_millis(self.day_length).max(1);
        let into_day = duration_millis(now.since(self.epoch)) % len;
        DayPhase::from_quarter(into_day.saturating_mul(4) / len)
    }

    pub fn is_night(&self, now: GameTime) -> bool {
        self.phase_at(now).is_night()
    }

    /// Whole days elapsed since the epoch.
    pub fn day_number(&self, now: GameTime) -> u64 {
        duration_millis(now.since(self.epoch)) / duration_millis(self.day_length).max(1)
    }

    /// How often the cached phase needs refreshing.
    pub fn refresh_period(&self) -> Duration {
        self.day_length / 4
    }
}
