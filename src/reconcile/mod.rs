//! Reconciliation engine.
//!
//! Compares a ledger snapshot against a cache snapshot for one scope and
//! classifies the differences. The two snapshots are produced by I/O at the
//! edges (`snapshot`, `engine`); the comparison itself (`diff`) is pure and
//! unit-testable without a network or a database. The ledger value always
//! wins: reconciliation is a one-directional overwrite, never a merge.
//!
//! Because the snapshots are read at slightly different instants, a pass is
//! only eventually consistent; it is therefore built to be idempotent, so a
//! second pass with no intervening chain activity yields zero diffs.

/// Pure diff classification
pub mod diff;
/// Snapshot capture and pass composition
pub mod engine;
/// The externally visible report
pub mod report;
/// Snapshot value types
pub mod snapshot;

pub use diff::{diff_snapshots, DiffKind, FieldDelta, ReconciliationDiff};
pub use engine::{CancelToken, EngineConfig, ReconciliationEngine};
pub use report::ReconciliationReport;
pub use snapshot::{CacheSnapshot, LedgerSnapshot};

use crate::cache::CacheError;
use crate::ledger::Address;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unit of reconciliation: one wallet, or one property's owner set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
	/// All 22 properties of one wallet's player account.
	Wallet(Address),
	/// Every cached owner of one property, via ownership point lookups.
	Property(u8),
}

impl fmt::Display for Scope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Scope::Wallet(wallet) => write!(f, "wallet {wallet}"),
			Scope::Property(id) => write!(f, "property {id}"),
		}
	}
}

/// Errors that abort a whole reconciliation pass.
///
/// Per-pair ledger failures never abort a pass; they become unresolved
/// entries in the snapshot instead.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
	#[error("cache error: {0}")]
	Cache(#[from] CacheError),

	#[error("reconciliation pass cancelled")]
	Cancelled,
}
