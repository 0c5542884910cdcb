//! Zombie population model: spawn odds, cluster sizes and stat rolls.

use std::sync::Arc;

use rand::{Rng, RngCore};

use super::context::TickContext;
use super::signal::WorldEvent;
use super::system::{TickError, WorldSystem};
use crate::config::ZombieSettings;
use crate::model::zombie::ZOMBIE_TEMPLATES;
use crate::model::{ItemId, RegionKind, Zombie, ZombieKind};
use crate::store::RegionStore;

/// Spawn probability contributed by each point of region danger.
pub const DANGER_WEIGHT: f64 = 0.01;
/// Spawn probability contributed by noise at or above the threshold.
pub const NOISE_WEIGHT: f64 = 0.2;

/// Relative weight of each cluster size 0..=4 for a given probability.
const CLUSTER_WEIGHTS: [f64; 4] = [0.7, 0.2, 0.08, 0.02];

/// `base + danger*0.01 + min(noise/threshold, 1)*0.2 + night bonus`,
/// clamped to `[0, 1]`.
pub fn spawn_probability(settings: &ZombieSettings, danger: u32, noise: u32, night: bool) -> f64 {
    let threshold = f64::from(settings.noise_threshold.max(1));
    let noise_term = (f64::from(noise) / threshold).min(1.0) * NOISE_WEIGHT;
    let night_term = if night { settings.night_bonus } else { 0.0 };
    (settings.base_spawn_rate + f64::from(danger) * DANGER_WEIGHT + noise_term + night_term).clamp(0.0, 1.0)
}

/// Pick from `(item, weight)` pairs in proportion to weight.
///
/// `None` only when no entry has positive weight.
pub fn weighted_pick<T: Copy>(entries: &[(T, f64)], rng: &mut dyn RngCore) -> Option<T> {
    let total: f64 = entries.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    let mut roll = rng.random::<f64>() * total;
    for &(item, weight) in entries {
        let weight = weight.max(0.0);
        if roll < weight {
            return Some(item);
        }
        roll -= weight;
    }
    // Float drift: fall back to the last positive entry.
    entries.iter().rev().find(|(_, w)| *w > 0.0).map(|(item, _)| *item)
}

/// Cluster size weights `(1-p, .7p, .2p, .08p, .02p)` for sizes 0..=4.
pub fn cluster_weights(probability: f64) -> [(u32, f64); 5] {
    let p = probability.clamp(0.0, 1.0);
    [
        (0, 1.0 - p),
        (1, CLUSTER_WEIGHTS[0] * p),
        (2, CLUSTER_WEIGHTS[1] * p),
        (3, CLUSTER_WEIGHTS[2] * p),
        (4, CLUSTER_WEIGHTS[3] * p),
    ]
}

/// How many zombies appear, biased toward small clusters.
pub fn roll_spawn_count(probability: f64, rng: &mut dyn RngCore) -> u32 {
    weighted_pick(&cluster_weights(probability), rng).unwrap_or(0)
}

/// Spawn weight of each kind after the region's bias.
pub fn kind_weights(region: RegionKind) -> [(ZombieKind, f64); 4] {
    ZOMBIE_TEMPLATES.map(|t| {
        let bias = match (region, t.kind) {
            (RegionKind::Military, ZombieKind::Mutant) => 3.0,
            (RegionKind::Military, ZombieKind::Brute) => 2.0,
            (RegionKind::Forest, ZombieKind::Runner) => 1.5,
            (RegionKind::Coast, ZombieKind::Walker) => 1.2,
            _ => 1.0,
        };
        (t.kind, t.spawn_weight * bias)
    })
}

/// Roll one zombie for a region at the given floor difficulty.
pub fn generate_zombie(region: RegionKind, difficulty: u32, rng: &mut dyn RngCore) -> Zombie {
    let kind = weighted_pick(&kind_weights(region), rng).unwrap_or(ZombieKind::Walker);
    let template = kind.template();
    let scale = 1.0 + f64::from(difficulty) / 100.0;

    let hp = (f64::from(template.base_hp) * scale * rng.random_range(0.8..=1.2)).max(1.0) as u32;
    let damage = (f64::from(template.damage) * scale * rng.random_range(0.9..=1.1)).max(1.0) as u32;
    let speed = template.speed * rng.random_range(0.9..=1.1);

    Zombie {
        kind,
        hp,
        max_hp: hp,
        damage,
        speed,
        alertness: rng.random_range(10..=90),
        aggressiveness: rng.random_range(1..=100),
    }
}

pub fn generate_zombies(region: RegionKind, difficulty: u32, count: u32, rng: &mut dyn RngCore) -> Vec<Zombie> {
    (0..count).map(|_| generate_zombie(region, difficulty, rng)).collect()
}

/// Salvage from a killed zombie.
pub fn zombie_drops(kind: ZombieKind, rng: &mut dyn RngCore) -> Vec<(ItemId, u32)> {
    let mut drops = Vec::new();
    match kind {
        ZombieKind::Walker => {
            if rng.random_bool(0.30) {
                drops.push(("cloth".to_string(), rng.random_range(1..=2)));
            }
        }
        ZombieKind::Runner => {
            if rng.random_bool(0.24) {
                drops.push(("metal".to_string(), rng.random_range(1..=2)));
            }
        }
        ZombieKind::Brute => {
            if rng.random_bool(0.45) {
                drops.push(("metal".to_string(), rng.random_range(2..=4)));
                drops.push(("ammo".to_string(), rng.random_range(1..=3)));
            }
        }
        ZombieKind::Mutant => {
            if rng.random_bool(0.60) {
                drops.push(("circuit".to_string(), rng.random_range(1..=2)));
                drops.push(("ammo".to_string(), rng.random_range(2..=5)));
            }
        }
    }
    drops
}

/// Ambient spawning: bumps each region's aggregate count. Zombies are only
/// materialized when someone walks into an encounter.
pub struct SpawnSystem {
    regions: Arc<dyn RegionStore>,
    settings: ZombieSettings,
}

impl SpawnSystem {
    pub fn new(regions: Arc<dyn RegionStore>, settings: ZombieSettings) -> Self {
        Self { regions, settings }
    }
}

impl WorldSystem for SpawnSystem {
    fn name(&self) -> &str {
        "zombie_spawn"
    }

    fn tick(&self, ctx: &mut TickContext) -> Result<(), TickError> {
        let night = ctx.is_night();
        for name in self.regions.region_names()? {
            let Some(mut region) = self.regions.get_region(&name)? else {
                tracing::warn!(region = %name, "region vanished during spawn pass");
                continue;
            };

            let p = spawn_probability(&self.settings, region.danger, region.noise, night);
            let count = roll_spawn_count(p, ctx.rng);
            let quieted = region.noise / 2;
            if count == 0 && quieted == region.noise {
                continue;
            }

            region.adjust_zombies(i64::from(count));
            region.noise = quieted;
            self.regions.update_region(&region)?;

            if count > 0 {
                tracing::debug!(region = %name, count, total = region.zombies, p, "zombies spawned");
                ctx.emit(WorldEvent::ZombiesSpawned {
                    region: name,
                    count,
                    total: region.zombies,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn settings() -> ZombieSettings {
        ZombieSettings::default()
    }

    #[test]
    fn daytime_probability_for_a_quiet_region() {
        let p = spawn_probability(&settings(), 60, 0, false);
        assert!((p - 0.7).abs() < 1e-9);
        let p = spawn_probability(&settings(), 6, 0, false);
        assert!((p - 0.16).abs() < 1e-9);
    }

    #[test]
    fn monotone_in_danger_noise_and_night() {
        let s = settings();
        for danger in 0..=100 {
            for noise in [0, 10, 25, 49, 50, 51, 100, 10_000] {
                let day = spawn_probability(&s, danger, noise, false);
                let night = spawn_probability(&s, danger, noise, true);
                assert!(night >= day);
                assert!((0.0..=1.0).contains(&day));
                if danger < 100 {
                    assert!(spawn_probability(&s, danger + 1, noise, false) >= day);
                }
                assert!(spawn_probability(&s, danger, noise + 1, false) >= day);
            }
        }
    }

    #[test]
    fn noise_term_saturates_at_threshold() {
        let s = settings();
        let at = spawn_probability(&s, 0, 50, false);
        let over = spawn_probability(&s, 0, 5_000, false);
        assert_eq!(at, over);
        assert!((at - 0.3).abs() < 1e-9);
    }

    #[test]
    fn spawn_counts_follow_weights() {
        let p = 0.166;
        let mut rng = SmallRng::seed_from_u64(2024);
        let n = 200_000;
        let mut hist = [0u32; 5];
        for _ in 0..n {
            hist[roll_spawn_count(p, &mut rng) as usize] += 1;
        }
        for (count, weight) in cluster_weights(p) {
            let observed = f64::from(hist[count as usize]) / f64::from(n);
            assert!((observed - weight).abs() < 0.01, "size {count}: {observed} vs {weight}");
        }

        // Same seed, same sequence
        let a: Vec<_> = {
            let mut rng = SmallRng::seed_from_u64(99);
            (0..50).map(|_| roll_spawn_count(p, &mut rng)).collect()
        };
        let b: Vec<_> = {
            let mut rng = SmallRng::seed_from_u64(99);
            (0..50).map(|_| roll_spawn_count(p, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn zero_probability_never_spawns() {
        let mut rng = SmallRng::seed_from_u64(1);
        assert!((0..1_000).all(|_| roll_spawn_count(0.0, &mut rng) == 0));
    }

    #[test]
    fn military_biases_toward_heavies() {
        let w = kind_weights(RegionKind::Military);
        assert_eq!(w[3], (ZombieKind::Mutant, 6.0));
        assert_eq!(w[2], (ZombieKind::Brute, 16.0));
        assert_eq!(kind_weights(RegionKind::Urban)[0], (ZombieKind::Walker, 70.0));
    }

    #[test]
    fn generated_stats_stay_in_range() {
        let mut rng = SmallRng::seed_from_u64(17);
        for _ in 0..500 {
            let z = generate_zombie(RegionKind::Military, 50, &mut rng);
            let t = z.kind.template();
            let lo = (f64::from(t.base_hp) * 1.5 * 0.8) as u32;
            let hi = (f64::from(t.base_hp) * 1.5 * 1.2) as u32;
            assert!((lo..=hi).contains(&z.hp), "{:?} hp {}", z.kind, z.hp);
            assert_eq!(z.hp, z.max_hp);
            assert!((10..=90).contains(&z.alertness));
            assert!((1..=100).contains(&z.aggressiveness));
        }
    }

    #[test]
    fn walkers_only_drop_cloth() {
        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..200 {
            for (item, qty) in zombie_drops(ZombieKind::Walker, &mut rng) {
                assert_eq!(item, "cloth");
                assert!((1..=2).contains(&qty));
            }
        }
    }
}
