use super::context::TickContext;
use crate::store::StoreError;

/// Why a per-tick pass gave up. The scheduler logs it and backs off.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{pass} failed: {reason}")]
    Failed { pass: &'static str, reason: String },
}

/// A pass the scheduler runs on every tick.
///
/// Object-safe so passes can be stored as `Arc<dyn WorldSystem>`. Takes
/// `&self` because the same components also serve front-end calls between
/// ticks and guard their own state.
pub trait WorldSystem: Send + Sync {
    fn name(&self) -> &str;
    fn tick(&self, ctx: &mut TickContext) -> Result<(), TickError>;
}
