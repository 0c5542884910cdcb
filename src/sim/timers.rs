use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Mutex;

use super::lock;
use crate::id::IdGenerator;
use crate::model::{GameTime, PendingTimer, PlayerId, TimerId, TimerKind};

#[derive(Debug, Default)]
struct TimerState {
    live: BTreeMap<TimerId, PendingTimer>,
    /// Expiry order. Cancelled entries stay here until they surface and are
    /// skipped because `live` no longer has them.
    order: BinaryHeap<Reverse<(GameTime, TimerId)>>,
}

/// Deferred callbacks keyed by absolute expiry.
///
/// Every timer leaves the queue exactly once: through [`TimerQueue::cancel`],
/// [`TimerQueue::take_expired`] or [`TimerQueue::clear`]. Removal happens
/// under the queue lock, so a cancel racing a sweep has exactly one winner.
#[derive(Debug, Default)]
pub struct TimerQueue {
    ids: IdGenerator,
    state: Mutex<TimerState>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&self, owner: PlayerId, kind: TimerKind, expires_at: GameTime) -> TimerId {
        let id = self.ids.next_id();
        let mut state = lock(&self.state);
        state.order.push(Reverse((expires_at, id)));
        state.live.insert(id, PendingTimer { id, owner, kind, expires_at });
        tracing::debug!(timer_id = id, owner, %expires_at, "timer scheduled");
        id
    }

    /// `false` if the timer already fired, was cancelled or never existed.
    pub fn cancel(&self, id: TimerId) -> bool {
        lock(&self.state).live.remove(&id).is_some()
    }

    /// Remove and return every timer with `expires_at <= now`, earliest first.
    pub fn take_expired(&self, now: GameTime) -> Vec<PendingTimer> {
        let mut state = lock(&self.state);
        let mut fired = Vec::new();
        while let Some(&Reverse((at, id))) = state.order.peek() {
            if at > now {
                break;
            }
            state.order.pop();
            if let Some(timer) = state.live.remove(&id) {
                fired.push(timer);
            }
        }
        fired
    }

    /// Drop every outstanding timer without firing it. Returns how many.
    pub fn clear(&self) -> usize {
        let mut state = lock(&self.state);
        state.order.clear();
        let dropped = state.live.len();
        state.live.clear();
        dropped
    }

    /// Snapshot of outstanding timers, earliest first.
    pub fn pending(&self) -> Vec<PendingTimer> {
        let state = lock(&self.state);
        let mut timers: Vec<_> = state.live.values().cloned().collect();
        timers.sort_by_key(|t| (t.expires_at, t.id));
        timers
    }

    pub fn get(&self, id: TimerId) -> Option<PendingTimer> {
        lock(&self.state).live.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
