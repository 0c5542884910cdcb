use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::player::{ItemId, PlayerId};
use super::time::GameTime;

pub type ProjectId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Tank,
    Helicopter,
    Warship,
    RadioTower,
    AdvancedWorkshop,
}

/// Where a structure may be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteRequirement {
    Any,
    MilitaryBase,
    CoastBase,
}

impl SiteRequirement {
    /// `location` is a `Region:Sub:Area` path; only the region part matters.
    pub fn allows(self, location: &str) -> bool {
        let region = location.split(':').next().unwrap_or(location).to_lowercase();
        match self {
            SiteRequirement::Any => true,
            SiteRequirement::MilitaryBase => matches!(region.as_str(), "military" | "bunker"),
            SiteRequirement::CoastBase => matches!(region.as_str(), "coast" | "harbor"),
        }
    }
}

impl fmt::Display for SiteRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteRequirement::Any => f.write_str("any"),
            SiteRequirement::MilitaryBase => f.write_str("military base"),
            SiteRequirement::CoastBase => f.write_str("coast base"),
        }
    }
}

/// Static build requirements for a structure kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    pub kind: StructureKind,
    pub name: &'static str,
    pub build_days: u32,
    pub cost: &'static [(&'static str, u32)],
    pub intelligence_required: i32,
    pub site: SiteRequirement,
}

impl Blueprint {
    pub fn cost_map(&self) -> BTreeMap<ItemId, u32> {
        self.cost.iter().map(|(item, qty)| (item.to_string(), *qty)).collect()
    }
}

impl StructureKind {
    pub const ALL: [StructureKind; 5] = [
        StructureKind::Tank,
        StructureKind::Helicopter,
        StructureKind::Warship,
        StructureKind::RadioTower,
        StructureKind::AdvancedWorkshop,
    ];

    /// Vehicles are handed to the vehicle registry on completion; everything
    /// else becomes a world structure.
    pub fn is_vehicle(self) -> bool {
        matches!(self, StructureKind::Tank | StructureKind::Helicopter | StructureKind::Warship)
    }

    pub fn blueprint(self) -> Blueprint {
        match self {
            StructureKind::Tank => Blueprint {
                kind: self,
                name: "Tank",
                build_days: 7,
                cost: &[("steel", 50), ("engine_parts", 10), ("circuit", 5)],
                intelligence_required: 90,
                site: SiteRequirement::MilitaryBase,
            },
            StructureKind::Helicopter => Blueprint {
                kind: self,
                name: "Helicopter",
                build_days: 10,
                cost: &[("steel", 30), ("engine_parts", 8), ("circuit", 3), ("fuel", 20)],
                intelligence_required: 85,
                site: SiteRequirement::MilitaryBase,
            },
            StructureKind::Warship => Blueprint {
                kind: self,
                name: "Warship",
                build_days: 21,
                cost: &[("steel", 100), ("engine_parts", 20), ("circuit", 10), ("fuel", 50)],
                intelligence_required: 95,
                site: SiteRequirement::CoastBase,
            },
            StructureKind::RadioTower => Blueprint {
                kind: self,
                name: "Radio Tower",
                build_days: 3,
                cost: &[("metal", 20), ("circuit", 5), ("wood", 10)],
                intelligence_required: 40,
                site: SiteRequirement::Any,
            },
            StructureKind::AdvancedWorkshop => Blueprint {
                kind: self,
                name: "Advanced Workshop",
                build_days: 5,
                cost: &[("metal", 30), ("circuit", 8), ("wood", 15)],
                intelligence_required: 60,
                site: SiteRequirement::Any,
            },
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.blueprint().name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionProject {
    pub id: ProjectId,
    pub owner: PlayerId,
    pub kind: StructureKind,
    pub location: String,
    pub started_at: GameTime,
    pub duration: Duration,
    /// Resources already taken from the owner's inventory.
    pub resources: BTreeMap<ItemId, u32>,
    pub status: ProjectStatus,
}

impl ConstructionProject {
    pub fn completes_at(&self) -> GameTime {
        self.started_at.saturating_add(self.duration)
    }

    pub fn is_due(&self, now: GameTime) -> bool {
        self.status == ProjectStatus::InProgress && now >= self.completes_at()
    }

    /// Fraction complete in `[0, 1]`, derived from the clock rather than stored.
    pub fn progress(&self, now: GameTime) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.since(self.started_at).as_secs_f64();
        (elapsed / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn time_remaining(&self, now: GameTime) -> Duration {
        now.until(self.completes_at())
    }
}
