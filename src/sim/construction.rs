//! Long-running construction projects.
//!
//! Progress is never stored; it is derived from the clock on every read.
//! Completion is a status transition under the tracker lock, so the tick
//! sweep and a `construction_complete` timer cannot both hand the same
//! project to the [`CompletionSink`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::context::TickContext;
use super::lock;
use super::signal::WorldEvent;
use super::system::{TickError, WorldSystem};
use super::timers::TimerQueue;
use crate::config::WorldConfig;
use crate::id::IdGenerator;
use crate::model::{
    ConstructionProject, GameTime, ItemId, PlayerId, ProjectId, ProjectStatus, SiteRequirement, StructureKind,
    TimerId, TimerKind,
};
use crate::store::{Collaborators, CompletionSink, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    #[error("not enough {item}: need {needed}")]
    InsufficientResources { item: ItemId, needed: u32 },

    #[error("requires {required} intelligence, you have {actual}")]
    InsufficientIntelligence { required: i32, actual: i32 },

    #[error("must be built at a {0}")]
    InvalidSite(SiteRequirement),

    #[error("build time must be positive")]
    InvalidDuration,

    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("project {0} belongs to someone else")]
    NotOwner(ProjectId),

    #[error("project {0} is no longer in progress")]
    NotInProgress(ProjectId),

    #[error("project {id} needs another {}s", .remaining.as_secs())]
    NotFinished { id: ProjectId, remaining: Duration },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Proof that resources were taken out of an owner's inventory.
///
/// Only [`ConstructionTracker::consume_resources`] can make one, and
/// [`ConstructionTracker::start`] consumes it, so the same stock cannot fund
/// two projects.
#[derive(Debug, PartialEq, Eq)]
pub struct ConsumedResources {
    owner: PlayerId,
    items: BTreeMap<ItemId, u32>,
}

impl ConsumedResources {
    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn items(&self) -> &BTreeMap<ItemId, u32> {
        &self.items
    }
}

#[derive(Debug, Default)]
struct ProjectBook {
    projects: BTreeMap<ProjectId, ConstructionProject>,
    timers: BTreeMap<ProjectId, TimerId>,
}

pub struct ConstructionTracker {
    collab: Collaborators,
    sink: Arc<dyn CompletionSink>,
    timers: Arc<TimerQueue>,
    config: WorldConfig,
    ids: IdGenerator,
    book: Mutex<ProjectBook>,
}

impl ConstructionTracker {
    pub fn new(
        collab: Collaborators,
        sink: Arc<dyn CompletionSink>,
        timers: Arc<TimerQueue>,
        config: &WorldConfig,
    ) -> Self {
        Self {
            collab,
            sink,
            timers,
            config: config.clone(),
            ids: IdGenerator::new(),
            book: Mutex::new(ProjectBook::default()),
        }
    }

    /// Take `cost` out of `owner`'s inventory, all or nothing.
    pub fn consume_resources(
        &self,
        owner: PlayerId,
        cost: &BTreeMap<ItemId, u32>,
    ) -> Result<ConsumedResources, ConstructionError> {
        let inventory = &self.collab.inventory;
        for (item, &needed) in cost {
            if !inventory.has_item(owner, item, needed)? {
                return Err(ConstructionError::InsufficientResources { item: item.clone(), needed });
            }
        }

        let mut taken: Vec<(&ItemId, u32)> = Vec::new();
        for (item, &qty) in cost {
            let removed = match inventory.remove_item(owner, item, qty) {
                Ok(removed) => removed,
                Err(e) => {
                    self.restore(owner, &taken);
                    return Err(e.into());
                }
            };
            if !removed {
                self.restore(owner, &taken);
                return Err(ConstructionError::InsufficientResources { item: item.clone(), needed: qty });
            }
            taken.push((item, qty));
        }
        Ok(ConsumedResources {
            owner,
            items: cost.iter().filter(|(_, q)| **q > 0).map(|(i, q)| (i.clone(), *q)).collect(),
        })
    }

    fn restore(&self, owner: PlayerId, taken: &[(&ItemId, u32)]) {
        for (item, qty) in taken {
            if let Err(e) = self.collab.inventory.add_item(owner, item, *qty) {
                tracing::error!(owner, %item, qty, error = %e, "failed to roll back consumed resources");
            }
        }
    }

    pub fn start(
        &self,
        owner: PlayerId,
        kind: StructureKind,
        location: &str,
        resources: ConsumedResources,
        duration_hours: f64,
    ) -> Result<ProjectId, ConstructionError> {
        if resources.owner != owner || resources.items.is_empty() {
            return Err(ConstructionError::InsufficientResources {
                item: resources.items.keys().next().cloned().unwrap_or_default(),
                needed: 0,
            });
        }
        if !(duration_hours.is_finite() && duration_hours > 0.0) {
            // The proof is spent either way; hand the stock back.
            let taken: Vec<(&ItemId, u32)> = resources.items.iter().map(|(i, q)| (i, *q)).collect();
            self.restore(owner, &taken);
            return Err(ConstructionError::InvalidDuration);
        }

        let now = self.collab.clock.now();
        let id = self.ids.next_id();
        let project = ConstructionProject {
            id,
            owner,
            kind,
            location: location.to_string(),
            started_at: now,
            duration: self.config.scaled_hours(duration_hours),
            resources: resources.items,
            status: ProjectStatus::InProgress,
        };
        let timer_id = self.timers.schedule(
            owner,
            TimerKind::ConstructionComplete { project_id: id },
            project.completes_at(),
        );

        {
            let mut book = lock(&self.book);
            book.timers.insert(id, timer_id);
            book.projects.insert(id, project.clone());
        }
        tracing::info!(project_id = id, owner, %kind, location, completes_at = %project.completes_at(), "construction started");
        self.collab.tell(
            owner,
            &format!("Construction of {kind} started at {location}."),
        );
        Ok(id)
    }

    /// Check the blueprint, pay its cost and start with its default build time.
    pub fn begin(&self, owner: PlayerId, kind: StructureKind, location: &str) -> Result<ProjectId, ConstructionError> {
        let blueprint = kind.blueprint();
        let player = self
            .collab
            .players
            .get_player(owner)?
            .ok_or(ConstructionError::PlayerNotFound(owner))?;
        if player.intelligence < blueprint.intelligence_required {
            return Err(ConstructionError::InsufficientIntelligence {
                required: blueprint.intelligence_required,
                actual: player.intelligence,
            });
        }
        if !blueprint.site.allows(location) {
            return Err(ConstructionError::InvalidSite(blueprint.site));
        }
        let resources = self.consume_resources(owner, &blueprint.cost_map())?;
        let hours = f64::from(blueprint.build_days) * 24.0;
        self.start(owner, kind, location, resources, hours)
    }

    pub fn project(&self, id: ProjectId) -> Option<ConstructionProject> {
        lock(&self.book).projects.get(&id).cloned()
    }

    pub fn projects_for(&self, owner: PlayerId) -> Vec<ConstructionProject> {
        lock(&self.book)
            .projects
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect()
    }

    pub fn progress(&self, id: ProjectId) -> Result<f64, ConstructionError> {
        let now = self.collab.clock.now();
        self.project(id)
            .map(|p| p.progress(now))
            .ok_or(ConstructionError::ProjectNotFound(id))
    }

    /// Hand a matured project to the sink. `Ok(false)` if it was already
    /// completed or cancelled. A failing sink puts the project back in
    /// progress so a later sweep retries.
    pub fn complete(&self, id: ProjectId) -> Result<bool, ConstructionError> {
        self.complete_at(id, self.collab.clock.now())
    }

    fn complete_at(&self, id: ProjectId, now: GameTime) -> Result<bool, ConstructionError> {
        let project = {
            let mut book = lock(&self.book);
            let project = book.projects.get_mut(&id).ok_or(ConstructionError::ProjectNotFound(id))?;
            if project.status != ProjectStatus::InProgress {
                return Ok(false);
            }
            if !project.is_due(now) {
                return Err(ConstructionError::NotFinished {
                    id,
                    remaining: project.time_remaining(now),
                });
            }
            project.status = ProjectStatus::Completed;
            project.clone()
        };

        if let Err(e) = self.sink.on_completed(&project) {
            let mut book = lock(&self.book);
            if let Some(p) = book.projects.get_mut(&id) {
                if p.status == ProjectStatus::Completed {
                    p.status = ProjectStatus::InProgress;
                }
            }
            tracing::warn!(project_id = id, error = %e, "completion handoff failed, will retry");
            return Err(e.into());
        }

        if let Some(timer_id) = lock(&self.book).timers.remove(&id) {
            self.timers.cancel(timer_id);
        }
        let what = if project.kind.is_vehicle() { "vehicle" } else { "structure" };
        tracing::info!(project_id = id, owner = project.owner, kind = %project.kind, what, "construction completed");
        self.collab.tell(
            project.owner,
            &format!("Your {} at {} is finished.", project.kind, project.location),
        );
        Ok(true)
    }

    /// Stop a project and refund the configured fraction (rounded down) of
    /// each resource. A failed refund leaves the project in progress with
    /// nothing handed back, so the cancel can be retried.
    pub fn cancel(&self, owner: PlayerId, id: ProjectId) -> Result<BTreeMap<ItemId, u32>, ConstructionError> {
        let project = {
            let mut book = lock(&self.book);
            let project = book.projects.get_mut(&id).ok_or(ConstructionError::ProjectNotFound(id))?;
            if project.owner != owner {
                return Err(ConstructionError::NotOwner(id));
            }
            if project.status != ProjectStatus::InProgress {
                return Err(ConstructionError::NotInProgress(id));
            }
            // Claimed against the completion sweep while the refund is written.
            project.status = ProjectStatus::Cancelled;
            project.clone()
        };

        let refund: BTreeMap<ItemId, u32> = project
            .resources
            .iter()
            .map(|(item, qty)| (item.clone(), (f64::from(*qty) * self.config.cancel_refund).floor() as u32))
            .filter(|(_, qty)| *qty > 0)
            .collect();
        let mut granted: Vec<(&ItemId, u32)> = Vec::with_capacity(refund.len());
        for (item, qty) in &refund {
            if let Err(e) = self.collab.inventory.add_item(owner, item, *qty) {
                tracing::error!(project_id = id, owner, %item, qty, error = %e, "refund failed, cancel rolled back");
                self.take_back(owner, &granted);
                let mut book = lock(&self.book);
                if let Some(p) = book.projects.get_mut(&id) {
                    if p.status == ProjectStatus::Cancelled {
                        p.status = ProjectStatus::InProgress;
                    }
                }
                return Err(e.into());
            }
            granted.push((item, *qty));
        }

        if let Some(timer_id) = lock(&self.book).timers.remove(&id) {
            self.timers.cancel(timer_id);
        }
        tracing::info!(project_id = id, owner, ?refund, "construction cancelled");
        self.collab.tell(owner, &format!("Construction of {} cancelled.", project.kind));
        Ok(refund)
    }

    /// Undo a partial refund. Best effort: the store already failed once.
    fn take_back(&self, owner: PlayerId, granted: &[(&ItemId, u32)]) {
        for (item, qty) in granted {
            match self.collab.inventory.remove_item(owner, item, *qty) {
                Ok(true) => {}
                Ok(false) => tracing::warn!(owner, %item, qty, "partial refund already spent"),
                Err(e) => tracing::warn!(owner, %item, qty, error = %e, "could not take back partial refund"),
            }
        }
    }

    fn due_projects(&self, ctx: &TickContext) -> Vec<ProjectId> {
        lock(&self.book)
            .projects
            .values()
            .filter(|p| p.is_due(ctx.now))
            .map(|p| p.id)
            .collect()
    }

    pub(crate) fn complete_and_report(&self, id: ProjectId, ctx: &mut TickContext) -> Result<bool, ConstructionError> {
        let completed = self.complete_at(id, ctx.now)?;
        if completed {
            if let Some(p) = self.project(id) {
                ctx.emit(WorldEvent::ConstructionCompleted {
                    project_id: id,
                    owner: p.owner,
                    kind: p.kind,
                });
            }
        }
        Ok(completed)
    }
}

impl WorldSystem for ConstructionTracker {
    fn name(&self) -> &str {
        "construction"
    }

    fn tick(&self, ctx: &mut TickContext) -> Result<(), TickError> {
        let mut failed = 0;
        for id in self.due_projects(ctx) {
            if let Err(e) = self.complete_and_report(id, ctx) {
                failed += 1;
                tracing::warn!(project_id = id, error = %e, "construction sweep failed");
            }
        }
        if failed > 0 {
            return Err(TickError::Failed {
                pass: "construction",
                reason: format!("{failed} completions failed"),
            });
        }
        Ok(())
    }
}
