//! Snapshot value types.
//!
//! A snapshot is the complete view of one scope as of a single pass, with
//! every pair accounted for exactly once: resolved to a view, authoritatively
//! absent, or unresolved with a reason.

use crate::cache::{CacheEntry, CacheStore, PairKey};
use crate::decoder::OwnershipView;
use crate::reconcile::Scope;

use std::collections::{BTreeMap, BTreeSet};

/// Ledger-side view of one scope.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
	/// Pairs resolved to a decoded view.
	pub views: BTreeMap<PairKey, OwnershipView>,
	/// Pairs the ledger authoritatively reports as not existing.
	pub absent: BTreeSet<PairKey>,
	/// Pairs that could not be resolved this pass, with the reason.
	pub unresolved: BTreeMap<PairKey, String>,
}

impl LedgerSnapshot {
	/// Every pair this snapshot accounts for.
	pub fn pairs_checked(&self) -> usize {
		self.views.len() + self.absent.len() + self.unresolved.len()
	}
}

/// Cache-side view of the same scope, from one store query.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
	pub entries: BTreeMap<PairKey, CacheEntry>,
}

impl CacheSnapshot {
	pub async fn capture(
		store: &dyn CacheStore,
		scope: &Scope,
	) -> Result<Self, crate::cache::CacheError> {
		let entries = match scope {
			Scope::Wallet(wallet) => store.entries_for_wallet(wallet).await?,
			Scope::Property(property_id) => store.entries_for_property(*property_id).await?,
		};

		Ok(Self {
			entries: entries.into_iter().map(|e| (e.pair(), e)).collect(),
		})
	}
}
