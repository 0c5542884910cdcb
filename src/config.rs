//! World configuration.
//!
//! [`WorldSettings`] is the raw, serde-loadable form with every constant
//! overridable. [`WorldConfig::from_settings`] validates it and applies the
//! time multiplier once, so components only ever see real durations.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::ActionKind;
use crate::model::time::SECONDS_PER_DAY;

pub const MIN_DECISION_WINDOW_SECS: u64 = 5;
pub const MAX_DECISION_WINDOW_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("decision window must be {MIN_DECISION_WINDOW_SECS}-{MAX_DECISION_WINDOW_SECS}s, got {0}s")]
    DecisionWindowOutOfRange(u64),

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSettings {
    pub critical_hit_chance: u32,
    /// Percent damage bonus for alerted attackers.
    pub alerted_bonus: u32,
    pub ambush_first_strike: bool,
    /// Round cap for ambush duels.
    pub max_ambush_rounds: u32,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            critical_hit_chance: 5,
            alerted_bonus: 15,
            ambush_first_strike: true,
            max_ambush_rounds: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZombieSettings {
    pub base_spawn_rate: f64,
    pub night_bonus: f64,
    pub noise_threshold: u32,
}

impl Default for ZombieSettings {
    fn default() -> Self {
        Self {
            base_spawn_rate: 0.1,
            night_bonus: 0.15,
            noise_threshold: 50,
        }
    }
}

/// Raw settings, all durations in seconds and unscaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Multiplies long real-time durations (day length, build times).
    /// 0.1 runs ten times faster.
    pub time_multiplier: f64,
    pub tick_period_secs: u64,
    pub day_length_secs: u64,
    pub decision_window_secs: u64,
    pub poll_interval_ms: u64,
    pub error_backoff_secs: u64,
    pub scavenge_cooldown_secs: u64,
    pub cooldowns: BTreeMap<ActionKind, u64>,
    pub combat: CombatSettings,
    pub zombies: ZombieSettings,
    /// Fraction of construction resources returned on cancel.
    pub cancel_refund: f64,
    pub seed: Option<u64>,
}

pub fn default_cooldowns() -> BTreeMap<ActionKind, u64> {
    BTreeMap::from([
        (ActionKind::Move, 60),
        (ActionKind::Loot, 30),
        (ActionKind::Attack, 45),
        (ActionKind::Craft, 120),
        (ActionKind::Build, 300),
        (ActionKind::Mine, 180),
        (ActionKind::Chop, 120),
        (ActionKind::Seek, 30),
        (ActionKind::Radio, 10),
        (ActionKind::Intel, 300),
    ])
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            time_multiplier: 1.0,
            tick_period_secs: 30,
            day_length_secs: 1_800,
            decision_window_secs: 7,
            poll_interval_ms: 1_000,
            error_backoff_secs: 5,
            scavenge_cooldown_secs: 3_600,
            cooldowns: default_cooldowns(),
            combat: CombatSettings::default(),
            zombies: ZombieSettings::default(),
            cancel_refund: 0.5,
            seed: None,
        }
    }
}

impl WorldSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// Per-action cooldowns.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownTable(BTreeMap<ActionKind, Duration>);

impl CooldownTable {
    /// Actions missing from the table have no cooldown.
    pub fn get(&self, action: ActionKind) -> Duration {
        self.0.get(&action).copied().unwrap_or(Duration::ZERO)
    }
}

/// Validated configuration with the time multiplier already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub time_multiplier: f64,
    pub tick_period: Duration,
    pub day_length: Duration,
    pub decision_window: Duration,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub scavenge_cooldown: Duration,
    pub cooldowns: CooldownTable,
    pub combat: CombatSettings,
    pub zombies: ZombieSettings,
    pub cancel_refund: f64,
    pub seed: Option<u64>,
}

impl WorldConfig {
    pub fn from_settings(s: WorldSettings) -> Result<Self, ConfigError> {
        if !(MIN_DECISION_WINDOW_SECS..=MAX_DECISION_WINDOW_SECS).contains(&s.decision_window_secs) {
            return Err(ConfigError::DecisionWindowOutOfRange(s.decision_window_secs));
        }
        if !(s.time_multiplier.is_finite() && s.time_multiplier > 0.0) {
            return Err(ConfigError::NonPositive { field: "time_multiplier" });
        }
        for (field, value) in [
            ("tick_period_secs", s.tick_period_secs),
            ("day_length_secs", s.day_length_secs),
            ("poll_interval_ms", s.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositive { field });
            }
        }
        check_range("cancel_refund", s.cancel_refund, 0.0, 1.0)?;
        check_range("zombies.base_spawn_rate", s.zombies.base_spawn_rate, 0.0, 1.0)?;
        check_range("zombies.night_bonus", s.zombies.night_bonus, 0.0, 1.0)?;
        check_range(
            "combat.critical_hit_chance",
            f64::from(s.combat.critical_hit_chance),
            0.0,
            100.0,
        )?;
        if s.zombies.noise_threshold == 0 {
            return Err(ConfigError::NonPositive { field: "zombies.noise_threshold" });
        }

        let mut cooldowns = BTreeMap::new();
        for action in ActionKind::ALL {
            let secs = s.cooldowns.get(&action).copied().unwrap_or(0);
            cooldowns.insert(action, Duration::from_secs(secs));
        }

        let mult = s.time_multiplier;
        Ok(Self {
            time_multiplier: mult,
            tick_period: Duration::from_secs(s.tick_period_secs),
            day_length: scale(Duration::from_secs(s.day_length_secs), mult),
            decision_window: Duration::from_secs(s.decision_window_secs),
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            error_backoff: Duration::from_secs(s.error_backoff_secs),
            scavenge_cooldown: Duration::from_secs(s.scavenge_cooldown_secs),
            cooldowns: CooldownTable(cooldowns),
            combat: s.combat,
            zombies: s.zombies,
            cancel_refund: s.cancel_refund,
            seed: s.seed,
        })
    }

    /// Real duration of a build measured in world days.
    pub fn scaled_days(&self, days: u32) -> Duration {
        scale(Duration::from_secs(u64::from(days) * SECONDS_PER_DAY), self.time_multiplier)
    }

    /// Real duration of a build measured in hours.
    pub fn scaled_hours(&self, hours: f64) -> Duration {
        scale(Duration::from_secs_f64(hours.max(0.0) * 3_600.0), self.time_multiplier)
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        // The defaults are statically in range.
        match Self::from_settings(WorldSettings::default()) {
            Ok(config) => config,
            Err(e) => unreachable!("default settings rejected: {e}"),
        }
    }
}

fn scale(d: Duration, multiplier: f64) -> Duration {
    Duration::from_secs_f64(d.as_secs_f64() * multiplier)
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = WorldConfig::default();
        assert_eq!(c.tick_period, Duration::from_secs(30));
        assert_eq!(c.day_length, Duration::from_secs(1_800));
        assert_eq!(c.decision_window, Duration::from_secs(7));
        assert_eq!(c.cooldowns.get(ActionKind::Loot), Duration::from_secs(30));
        assert_eq!(c.scavenge_cooldown, Duration::from_secs(3_600));
    }

    #[test]
    fn decision_window_range_is_fatal() {
        for bad in [0, 4, 11, 60] {
            let s = WorldSettings { decision_window_secs: bad, ..Default::default() };
            assert!(matches!(
                WorldConfig::from_settings(s),
                Err(ConfigError::DecisionWindowOutOfRange(v)) if v == bad
            ));
        }
        for good in [5, 7, 10] {
            let s = WorldSettings { decision_window_secs: good, ..Default::default() };
            assert!(WorldConfig::from_settings(s).is_ok());
        }
    }

    #[test]
    fn multiplier_scales_long_durations_only() {
        let s = WorldSettings { time_multiplier: 0.1, ..Default::default() };
        let c = WorldConfig::from_settings(s).unwrap();
        assert_eq!(c.day_length, Duration::from_secs(180));
        assert_eq!(c.tick_period, Duration::from_secs(30));
        assert_eq!(c.scaled_days(7), Duration::from_secs_f64(7.0 * 86_400.0 * 0.1));
        assert_eq!(c.scaled_hours(2.0), Duration::from_secs(720));
    }

    #[test]
    fn rejects_bad_multiplier_and_refund() {
        let s = WorldSettings { time_multiplier: 0.0, ..Default::default() };
        assert!(matches!(WorldConfig::from_settings(s), Err(ConfigError::NonPositive { .. })));
        let s = WorldSettings { cancel_refund: 1.5, ..Default::default() };
        assert!(matches!(WorldConfig::from_settings(s), Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s = WorldSettings::from_json_str(
            r#"{ "decision_window_secs": 9, "cooldowns": { "loot": 5 }, "zombies": { "night_bonus": 0.3 } }"#,
        )
        .unwrap();
        assert_eq!(s.decision_window_secs, 9);
        assert_eq!(s.tick_period_secs, 30);
        assert_eq!(s.zombies.night_bonus, 0.3);
        assert_eq!(s.zombies.base_spawn_rate, 0.1);
        let c = WorldConfig::from_settings(s).unwrap();
        assert_eq!(c.cooldowns.get(ActionKind::Loot), Duration::from_secs(5));
        assert_eq!(c.cooldowns.get(ActionKind::Move), Duration::ZERO);
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.json");
        std::fs::write(&path, r#"{ "tick_period_secs": 10, "seed": 42 }"#).unwrap();
        let s = WorldSettings::from_json_file(&path).unwrap();
        assert_eq!(s.tick_period_secs, 10);
        assert_eq!(s.seed, Some(42));

        let missing = WorldSettings::from_json_file(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
