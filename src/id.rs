use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic ID generator shared by the engine that owns it.
///
/// Takes `&self` so it can live next to other shared state; IDs are unique
/// per generator, not globally.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::starting_from(1)
    }

    pub fn starting_from(start: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
