//! The externally visible report.
//!
//! The reconciliation report is the single surface of truth for operators:
//! what was checked, what differed, what could not be resolved, and (once the
//! orchestrator has applied corrections) what was actually repaired.

use crate::cache::PairKey;
use crate::reconcile::diff::{DiffKind, ReconciliationDiff};
use crate::reconcile::snapshot::LedgerSnapshot;
use crate::reconcile::Scope;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one reconciliation pass over one scope.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
	pub scope: Scope,
	pub started_at: DateTime<Utc>,
	pub finished_at: DateTime<Utc>,
	/// Every pair examined, including unresolved ones.
	pub pairs_checked: usize,
	pub missing_in_cache: usize,
	pub stale_in_cache: usize,
	pub mismatched: usize,
	pub unresolved: usize,
	/// Diffs successfully written back to the cache.
	pub applied: usize,
	/// Diffs whose cache write failed; they resurface next cycle.
	pub failed: usize,
	/// Pairs stuck unresolved across enough consecutive cycles to escalate.
	pub flagged: Vec<PairKey>,
	pub diffs: Vec<ReconciliationDiff>,
}

impl ReconciliationReport {
	/// Assemble a report from a pass's snapshots and diff list.
	///
	/// `applied` and `failed` start at zero; the orchestrator fills them in
	/// after the applying stage.
	pub fn from_pass(
		scope: &Scope,
		started_at: DateTime<Utc>,
		ledger: &LedgerSnapshot,
		diffs: Vec<ReconciliationDiff>,
	) -> Self {
		let count = |kind: DiffKind| diffs.iter().filter(|d| d.kind == kind).count();

		Self {
			scope: *scope,
			started_at,
			finished_at: Utc::now(),
			pairs_checked: ledger.pairs_checked(),
			missing_in_cache: count(DiffKind::MissingInCache),
			stale_in_cache: count(DiffKind::StaleInCache),
			mismatched: count(DiffKind::FieldMismatch),
			unresolved: ledger.unresolved.len(),
			applied: 0,
			failed: 0,
			flagged: Vec::new(),
			diffs,
		}
	}

	/// Whether ledger and cache agreed on every resolvable pair.
	pub fn is_clean(&self) -> bool {
		self.diffs.is_empty() && self.unresolved == 0
	}

	/// Get a human-readable summary of the pass.
	pub fn summary(&self) -> String {
		format!(
			"{}: {} pairs checked, {} missing, {} stale, {} mismatched, {} unresolved, {}/{} applied{}",
			self.scope,
			self.pairs_checked,
			self.missing_in_cache,
			self.stale_in_cache,
			self.mismatched,
			self.unresolved,
			self.applied,
			self.diffs.len(),
			if self.flagged.is_empty() {
				String::new()
			} else {
				format!(" ({} pairs flagged for inspection)", self.flagged.len())
			}
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::PairKey;
	use crate::ledger::Address;

	#[test]
	fn counts_diff_kinds() {
		let wallet = Address::new([1u8; 32]);
		let mut ledger = LedgerSnapshot::default();
		ledger.absent.insert(PairKey::new(wallet, 1));
		ledger
			.unresolved
			.insert(PairKey::new(wallet, 2), "timeout".into());

		let diffs = vec![ReconciliationDiff {
			pair: PairKey::new(wallet, 1),
			kind: DiffKind::StaleInCache,
			ledger: None,
			cache: None,
			fields: Vec::new(),
		}];

		let report =
			ReconciliationReport::from_pass(&Scope::Wallet(wallet), Utc::now(), &ledger, diffs);
		assert_eq!(report.pairs_checked, 2);
		assert_eq!(report.stale_in_cache, 1);
		assert_eq!(report.unresolved, 1);
		assert!(!report.is_clean());
		assert!(report.summary().contains("1 stale"));
	}
}
