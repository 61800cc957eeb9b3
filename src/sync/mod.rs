//! Cache synchronization service.
//!
//! This module drives reconciliation on a schedule and applies the resulting
//! corrections to the cache. The `SyncOrchestrator` runs one cycle at a time
//! through a fixed sequence of phases; the `SyncService` wraps it in a long
//! running task fed by a periodic timer and an on-demand trigger channel.
//! Pairs that stay unresolved across consecutive cycles are escalated by the
//! `PairHealthTracker` instead of being silently retried forever.

/// Consecutive-failure escalation
pub mod health;
/// The cycle state machine and diff application
pub mod orchestrator;
/// Long-running periodic service and its handle
pub mod service;

pub use health::PairHealthTracker;
pub use orchestrator::{CyclePhase, SyncOrchestrator};
pub use service::{SyncHandle, SyncService};

use crate::cache::CacheError;
use crate::reconcile::ReconcileError;

/// Errors that abort a whole sync cycle.
///
/// Individual diff applications never abort a cycle; a failed write is
/// counted in the report and the pair resurfaces next cycle.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error(transparent)]
	Reconcile(#[from] ReconcileError),

	#[error("cache error: {0}")]
	Cache(#[from] CacheError),
}
