//! Pure diff classification.
//!
//! Takes the two snapshots and emits one diff per discrepant pair. No I/O,
//! no clock, no ordering dependence beyond the snapshot contents.

use crate::cache::{CacheEntry, PairKey};
use crate::decoder::OwnershipView;
use crate::reconcile::snapshot::{CacheSnapshot, LedgerSnapshot};

use serde::Serialize;
use std::collections::BTreeSet;

/// Classification of one detected discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiffKind {
	/// Present on the ledger, absent in the cache.
	MissingInCache,
	/// Present in the cache, authoritatively absent on the ledger.
	StaleInCache,
	/// Present on both sides with at least one field differing.
	FieldMismatch,
}

/// One differing field, carrying both sides for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDelta {
	pub field: &'static str,
	pub ledger: i64,
	pub cache: i64,
}

/// One discrepancy between ledger and cache for one pair.
///
/// Produced and consumed within a single pass; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationDiff {
	pub pair: PairKey,
	pub kind: DiffKind,
	pub ledger: Option<OwnershipView>,
	pub cache: Option<CacheEntry>,
	pub fields: Vec<FieldDelta>,
}

/// Compare the two snapshots field-by-field.
///
/// Unresolved pairs are excluded from classification entirely: nothing can
/// be said about them this pass. A zeroed player-array slot counts as absent
/// on the ledger side, so never-purchased properties produce no diff unless
/// the cache wrongly has an entry for them.
pub fn diff_snapshots(ledger: &LedgerSnapshot, cache: &CacheSnapshot) -> Vec<ReconciliationDiff> {
	let pairs: BTreeSet<PairKey> = ledger
		.views
		.keys()
		.chain(ledger.absent.iter())
		.chain(cache.entries.keys())
		.copied()
		.collect();

	let mut diffs = Vec::new();
	for pair in pairs {
		if ledger.unresolved.contains_key(&pair) {
			continue;
		}

		let ledger_view = ledger.views.get(&pair).filter(|v| v.is_populated());
		let cache_entry = cache.entries.get(&pair);

		match (ledger_view, cache_entry) {
			(Some(view), None) => diffs.push(ReconciliationDiff {
				pair,
				kind: DiffKind::MissingInCache,
				ledger: Some(*view),
				cache: None,
				fields: Vec::new(),
			}),
			(None, Some(entry)) => diffs.push(ReconciliationDiff {
				pair,
				kind: DiffKind::StaleInCache,
				ledger: None,
				cache: Some(entry.clone()),
				fields: Vec::new(),
			}),
			(Some(view), Some(entry)) => {
				let fields = field_deltas(view, &entry.view());
				if !fields.is_empty() {
					diffs.push(ReconciliationDiff {
						pair,
						kind: DiffKind::FieldMismatch,
						ledger: Some(*view),
						cache: Some(entry.clone()),
						fields,
					});
				}
			}
			(None, None) => {}
		}
	}

	diffs
}

fn field_deltas(ledger: &OwnershipView, cache: &OwnershipView) -> Vec<FieldDelta> {
	let compared: [(&'static str, i64, i64); 5] = [
		(
			"slots_owned",
			i64::from(ledger.slots_owned),
			i64::from(cache.slots_owned),
		),
		(
			"slots_shielded",
			i64::from(ledger.slots_shielded),
			i64::from(cache.slots_shielded),
		),
		(
			"purchase_timestamp",
			ledger.purchase_timestamp,
			cache.purchase_timestamp,
		),
		("shield_expiry", ledger.shield_expiry, cache.shield_expiry),
		(
			"steal_protection_expiry",
			ledger.steal_protection_expiry,
			cache.steal_protection_expiry,
		),
	];

	compared
		.into_iter()
		.filter(|(_, l, c)| l != c)
		.map(|(field, ledger, cache)| FieldDelta {
			field,
			ledger,
			cache,
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ledger::Address;

	fn wallet() -> Address {
		Address::new([7u8; 32])
	}

	fn view(property_id: u8, slots_owned: u16, slots_shielded: u16) -> OwnershipView {
		OwnershipView {
			wallet: wallet(),
			property_id,
			slots_owned,
			slots_shielded,
			purchase_timestamp: 1_716_900_000,
			shield_expiry: 0,
			steal_protection_expiry: 0,
		}
	}

	fn entry(property_id: u8, slots_owned: u16, slots_shielded: u16) -> CacheEntry {
		CacheEntry::from_view(&view(property_id, slots_owned, slots_shielded), 100)
	}

	fn pair(property_id: u8) -> PairKey {
		PairKey::new(wallet(), property_id)
	}

	#[test]
	fn field_mismatch_carries_both_values() {
		let mut ledger = LedgerSnapshot::default();
		ledger.views.insert(pair(5), view(5, 3, 1));
		let mut cache = CacheSnapshot::default();
		cache.entries.insert(pair(5), entry(5, 2, 1));

		let diffs = diff_snapshots(&ledger, &cache);
		assert_eq!(diffs.len(), 1);
		assert_eq!(diffs[0].kind, DiffKind::FieldMismatch);
		assert_eq!(
			diffs[0].fields,
			vec![FieldDelta {
				field: "slots_owned",
				ledger: 3,
				cache: 2,
			}]
		);
	}

	#[test]
	fn not_found_with_cached_entry_is_stale() {
		let mut ledger = LedgerSnapshot::default();
		ledger.absent.insert(pair(7));
		let mut cache = CacheSnapshot::default();
		cache.entries.insert(pair(7), entry(7, 2, 0));

		let diffs = diff_snapshots(&ledger, &cache);
		assert_eq!(diffs.len(), 1);
		assert_eq!(diffs[0].kind, DiffKind::StaleInCache);
	}

	#[test]
	fn ledger_only_pair_is_missing_in_cache() {
		let mut ledger = LedgerSnapshot::default();
		ledger.views.insert(pair(3), view(3, 1, 0));

		let diffs = diff_snapshots(&ledger, &CacheSnapshot::default());
		assert_eq!(diffs.len(), 1);
		assert_eq!(diffs[0].kind, DiffKind::MissingInCache);
	}

	#[test]
	fn zeroed_array_slot_without_cache_entry_is_not_a_diff() {
		let mut zeroed = view(0, 0, 0);
		zeroed.purchase_timestamp = 0;
		let mut ledger = LedgerSnapshot::default();
		ledger.views.insert(pair(0), zeroed);

		assert!(diff_snapshots(&ledger, &CacheSnapshot::default()).is_empty());
	}

	#[test]
	fn zeroed_array_slot_with_cache_entry_is_stale() {
		let mut zeroed = view(9, 0, 0);
		zeroed.purchase_timestamp = 0;
		let mut ledger = LedgerSnapshot::default();
		ledger.views.insert(pair(9), zeroed);
		let mut cache = CacheSnapshot::default();
		cache.entries.insert(pair(9), entry(9, 4, 0));

		let diffs = diff_snapshots(&ledger, &cache);
		assert_eq!(diffs.len(), 1);
		assert_eq!(diffs[0].kind, DiffKind::StaleInCache);
	}

	#[test]
	fn unresolved_pairs_are_excluded_without_hiding_others() {
		let mut ledger = LedgerSnapshot::default();
		ledger.views.insert(pair(1), view(1, 2, 0));
		ledger
			.unresolved
			.insert(pair(2), "rpc timeout".to_string());
		ledger.views.insert(pair(3), view(3, 5, 0));
		let mut cache = CacheSnapshot::default();
		cache.entries.insert(pair(2), entry(2, 9, 9));

		let diffs = diff_snapshots(&ledger, &cache);
		let kinds: Vec<PairKey> = diffs.iter().map(|d| d.pair).collect();
		assert_eq!(kinds, vec![pair(1), pair(3)]);
	}

	#[test]
	fn matching_sides_produce_no_diffs() {
		let mut ledger = LedgerSnapshot::default();
		ledger.views.insert(pair(5), view(5, 3, 1));
		let mut cache = CacheSnapshot::default();
		cache.entries.insert(pair(5), entry(5, 3, 1));

		assert!(diff_snapshots(&ledger, &cache).is_empty());
	}
}
