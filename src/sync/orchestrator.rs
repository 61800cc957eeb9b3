//! Cycle orchestration and diff application.
//!
//! One cycle moves through a fixed sequence of phases: fetch both sides,
//! diff them, apply the corrections, report. The ledger value always wins
//! when a correction is applied; cache state never flows back. Per-wallet
//! failures inside a full cycle are isolated so one bad wallet cannot stall
//! everyone else's reconciliation.

use crate::cache::{CacheEntry, CacheError, CacheStore, PairKey};
use crate::reconcile::{
	diff_snapshots, CancelToken, DiffKind, ReconcileError, ReconciliationDiff,
	ReconciliationEngine, ReconciliationReport, Scope,
};
use crate::sync::health::PairHealthTracker;
use crate::sync::SyncError;

use chrono::Utc;
use futures::stream;
use futures_util::StreamExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Where the orchestrator currently is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
	Idle,
	Fetching,
	Diffing,
	Applying,
	Reporting,
}

/// Runs reconciliation cycles and writes the corrections back to the cache.
pub struct SyncOrchestrator {
	engine: ReconciliationEngine,
	cache: Arc<dyn CacheStore>,
	health: PairHealthTracker,
	apply_fan_out: usize,
	phase: CyclePhase,
}

impl SyncOrchestrator {
	pub fn new(
		engine: ReconciliationEngine,
		cache: Arc<dyn CacheStore>,
		apply_fan_out: usize,
		failure_threshold: u32,
	) -> Self {
		Self {
			engine,
			cache,
			health: PairHealthTracker::new(failure_threshold),
			apply_fan_out: apply_fan_out.max(1),
			phase: CyclePhase::Idle,
		}
	}

	pub fn phase(&self) -> CyclePhase {
		self.phase
	}

	/// Operator hook: clear a flagged pair so the next cycle fetches it
	/// again.
	pub fn clear_flag(&mut self, pair: &PairKey) {
		self.health.record_resolved(pair);
	}

	fn set_phase(&mut self, phase: CyclePhase) {
		debug!(phase = ?phase, "cycle phase");
		self.phase = phase;
	}

	/// Run one cycle over one scope.
	///
	/// Returns the finished report with `applied`/`failed` filled in. A
	/// cancelled cycle leaves the cache exactly as far as it got; every
	/// write is individually consistent.
	pub async fn run_cycle(
		&mut self,
		scope: &Scope,
		cancel: &CancelToken,
	) -> Result<ReconciliationReport, SyncError> {
		let started_at = Utc::now();

		self.set_phase(CyclePhase::Fetching);
		// Flagged pairs are deferred in property scope instead of being
		// retried forever; a wallet scope is one account read for all pairs
		// and cannot skip per pair.
		let skip: BTreeSet<PairKey> = match scope {
			Scope::Property(_) => self.health.flagged().into_iter().collect(),
			Scope::Wallet(_) => BTreeSet::new(),
		};
		let ledger = match self
			.engine
			.capture_ledger_skipping(scope, cancel, &skip)
			.await
		{
			Ok(snapshot) => snapshot,
			Err(err) => {
				self.set_phase(CyclePhase::Idle);
				return Err(err.into());
			}
		};
		let cache_snapshot = match self.engine.capture_cache(scope).await {
			Ok(snapshot) => snapshot,
			Err(err) => {
				self.set_phase(CyclePhase::Idle);
				return Err(err.into());
			}
		};

		self.set_phase(CyclePhase::Diffing);
		let diffs = diff_snapshots(&ledger, &cache_snapshot);
		let mut report = ReconciliationReport::from_pass(scope, started_at, &ledger, diffs);

		if cancel.is_cancelled() {
			self.set_phase(CyclePhase::Idle);
			return Err(ReconcileError::Cancelled.into());
		}

		self.set_phase(CyclePhase::Applying);
		// One stamp per cycle, so retried cycles stay idempotent under the
		// versioned upsert.
		let stamp = Utc::now().timestamp();
		// Owned diffs: the apply futures must not borrow the report, or the
		// whole cycle future stops being spawnable.
		let outcomes: Vec<_> = stream::iter(report.diffs.clone().into_iter().map(|diff| {
			let cache = Arc::clone(&self.cache);
			async move { (diff.pair, apply_diff(cache.as_ref(), &diff, stamp).await) }
		}))
		.buffer_unordered(self.apply_fan_out)
		.collect()
		.await;

		for (pair, outcome) in outcomes {
			match outcome {
				Ok(()) => report.applied += 1,
				Err(CacheError::WriteConflict { .. }) => {
					// A fresher writer got there first; the pair re-verifies
					// next cycle against whatever it wrote.
					debug!(%pair, "correction lost the upsert race");
					report.failed += 1;
				}
				Err(err) => {
					error!(%pair, error = %err, "failed to apply correction");
					report.failed += 1;
				}
			}
		}

		self.set_phase(CyclePhase::Reporting);
		for pair in ledger.unresolved.keys() {
			self.health.record_unresolved(*pair);
		}
		for pair in ledger.views.keys().chain(ledger.absent.iter()) {
			self.health.record_resolved(pair);
		}
		report.flagged = ledger
			.unresolved
			.keys()
			.filter(|pair| self.health.is_flagged(pair))
			.copied()
			.collect();

		info!("cycle finished: {}", report.summary());
		self.set_phase(CyclePhase::Idle);
		Ok(report)
	}

	/// Run one wallet-scope cycle for every wallet the cache knows about.
	///
	/// A failed wallet is logged and skipped; cancellation stops the walk
	/// and returns the reports finished so far.
	pub async fn run_full_cycle(
		&mut self,
		cancel: &CancelToken,
	) -> Result<Vec<ReconciliationReport>, SyncError> {
		let wallets = self.cache.wallets().await.map_err(SyncError::Cache)?;
		info!(wallets = wallets.len(), "starting full sync cycle");

		let mut reports = Vec::with_capacity(wallets.len());
		for wallet in wallets {
			if cancel.is_cancelled() {
				info!("full cycle cancelled");
				break;
			}
			match self.run_cycle(&Scope::Wallet(wallet), cancel).await {
				Ok(report) => reports.push(report),
				Err(SyncError::Reconcile(ReconcileError::Cancelled)) => {
					info!("full cycle cancelled");
					break;
				}
				Err(err) => {
					error!(%wallet, error = %err, "wallet cycle failed, continuing with the rest");
				}
			}
		}

		Ok(reports)
	}
}

async fn apply_diff(
	cache: &dyn CacheStore,
	diff: &ReconciliationDiff,
	stamp: i64,
) -> Result<(), CacheError> {
	match diff.kind {
		DiffKind::MissingInCache | DiffKind::FieldMismatch => {
			debug_assert!(diff.ledger.is_some());
			match &diff.ledger {
				Some(view) => {
					let entry = CacheEntry::from_view(view, stamp);
					match cache.upsert(entry.clone()).await {
						// One retry with the same stamp, never a fresher one:
						// re-stamping would let this cycle's snapshot clobber
						// whatever newer data the winning writer carried.
						Err(CacheError::WriteConflict { .. }) => cache.upsert(entry).await,
						other => other,
					}
				}
				None => Ok(()),
			}
		}
		DiffKind::StaleInCache => match cache.delete(&diff.pair, stamp).await {
			Err(CacheError::WriteConflict { .. }) => cache.delete(&diff.pair, stamp).await,
			other => other,
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::{MemoryCacheStore, PairKey};
	use crate::decoder::ownership::test_fixtures::{encode_ownership, sample_ownership};
	use crate::decoder::player::test_fixtures::{encode_player, sample_player};
	use crate::decoder::MAX_PROPERTIES;
	use crate::ledger::{
		ownership_address, player_address, AccountData, Address, LedgerError, LedgerReader,
	};
	use crate::reconcile::EngineConfig;
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Mutex;
	use std::time::Duration;

	struct FakeLedger {
		accounts: Mutex<HashMap<Address, Vec<u8>>>,
		always_fail: AtomicBool,
	}

	impl FakeLedger {
		fn with_accounts(accounts: impl IntoIterator<Item = (Address, Vec<u8>)>) -> Arc<Self> {
			Arc::new(Self {
				accounts: Mutex::new(accounts.into_iter().collect()),
				always_fail: AtomicBool::new(false),
			})
		}

		fn unreachable_endpoint() -> Arc<Self> {
			Arc::new(Self {
				accounts: Mutex::new(HashMap::new()),
				always_fail: AtomicBool::new(true),
			})
		}

		fn heal(&self, accounts: impl IntoIterator<Item = (Address, Vec<u8>)>) {
			self.accounts.lock().unwrap().extend(accounts);
			self.always_fail.store(false, Ordering::SeqCst);
		}
	}

	#[async_trait::async_trait]
	impl LedgerReader for FakeLedger {
		async fn fetch_account(&self, address: &Address) -> Result<AccountData, LedgerError> {
			if self.always_fail.load(Ordering::SeqCst) {
				return Err(LedgerError::Transient("connection refused".into()));
			}
			Ok(match self.accounts.lock().unwrap().get(address) {
				Some(data) => AccountData::Found(data.clone()),
				None => AccountData::NotFound,
			})
		}
	}

	fn program() -> Address {
		Address::new([3u8; 32])
	}

	fn wallet() -> Address {
		Address::new([7u8; 32])
	}

	fn test_engine_config() -> EngineConfig {
		EngineConfig {
			fetch_fan_out: 4,
			retry_initial_interval: Duration::from_millis(1),
			retry_max_elapsed: Duration::from_millis(5),
		}
	}

	fn orchestrator(ledger: Arc<FakeLedger>, cache: Arc<MemoryCacheStore>) -> SyncOrchestrator {
		let store: Arc<dyn CacheStore> = cache.clone();
		let engine = ReconciliationEngine::new(ledger, store, program(), test_engine_config());
		SyncOrchestrator::new(engine, cache, 4, 2)
	}

	fn populated_ledger() -> Arc<FakeLedger> {
		let record = sample_player(wallet());
		FakeLedger::with_accounts([(player_address(&program(), &wallet()), encode_player(&record))])
	}

	#[tokio::test]
	async fn missing_entry_is_backfilled_from_the_ledger() {
		let cache = Arc::new(MemoryCacheStore::new());
		let mut orchestrator = orchestrator(populated_ledger(), Arc::clone(&cache));

		let report = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &CancelToken::new())
			.await
			.unwrap();

		assert_eq!(report.missing_in_cache, 1);
		assert_eq!(report.applied, 1);
		assert_eq!(report.failed, 0);

		let entry = cache
			.get(&PairKey::new(wallet(), 5))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(entry.slots_owned, 3);
	}

	#[tokio::test]
	async fn cycles_run_on_spawned_tasks() {
		let cache = Arc::new(MemoryCacheStore::new());
		let mut orchestrator = orchestrator(populated_ledger(), Arc::clone(&cache));

		// The cycle future crosses a task boundary here, as it does under
		// the long-running service.
		let task = tokio::spawn(async move {
			orchestrator
				.run_cycle(&Scope::Wallet(wallet()), &CancelToken::new())
				.await
		});

		let report = task.await.unwrap().unwrap();
		assert_eq!(report.applied, 1);
		assert!(cache
			.get(&PairKey::new(wallet(), 5))
			.await
			.unwrap()
			.is_some());
	}

	#[tokio::test]
	async fn cache_never_wins_a_mismatch() {
		let cache = Arc::new(MemoryCacheStore::new());
		let record = sample_player(wallet());
		let mut cached = record.ownership_view(5).unwrap();
		cached.slots_owned = 9;
		cache
			.upsert(CacheEntry::from_view(&cached, 100))
			.await
			.unwrap();

		let mut orchestrator = orchestrator(populated_ledger(), Arc::clone(&cache));
		let report = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &CancelToken::new())
			.await
			.unwrap();

		assert_eq!(report.mismatched, 1);
		assert_eq!(report.applied, 1);
		let entry = cache
			.get(&PairKey::new(wallet(), 5))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(entry.slots_owned, 3);
	}

	#[tokio::test]
	async fn stale_entry_is_deleted_when_the_account_is_gone() {
		let cache = Arc::new(MemoryCacheStore::new());
		let record = sample_player(wallet());
		cache
			.upsert(CacheEntry::from_view(&record.ownership_view(5).unwrap(), 100))
			.await
			.unwrap();

		// Ledger has no player account for this wallet at all.
		let ledger = FakeLedger::with_accounts([]);
		let mut orchestrator = orchestrator(ledger, Arc::clone(&cache));
		let report = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &CancelToken::new())
			.await
			.unwrap();

		assert_eq!(report.stale_in_cache, 1);
		assert_eq!(report.applied, 1);
		assert_eq!(cache.get(&PairKey::new(wallet(), 5)).await.unwrap(), None);
	}

	#[tokio::test]
	async fn a_second_cycle_finds_nothing_to_do() {
		let cache = Arc::new(MemoryCacheStore::new());
		let mut orchestrator = orchestrator(populated_ledger(), Arc::clone(&cache));
		let cancel = CancelToken::new();

		let first = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &cancel)
			.await
			.unwrap();
		assert_eq!(first.applied, 1);

		let second = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &cancel)
			.await
			.unwrap();
		assert!(second.is_clean());
		assert_eq!(second.applied, 0);
	}

	#[tokio::test]
	async fn a_fresher_cache_write_is_not_clobbered() {
		let cache = Arc::new(MemoryCacheStore::new());
		let record = sample_player(wallet());
		let mut cached = record.ownership_view(5).unwrap();
		cached.slots_owned = 9;
		// Stamped far in the future, as if another writer just synced it.
		cache
			.upsert(CacheEntry::from_view(&cached, i64::MAX))
			.await
			.unwrap();

		let mut orchestrator = orchestrator(populated_ledger(), Arc::clone(&cache));
		let report = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &CancelToken::new())
			.await
			.unwrap();

		assert_eq!(report.failed, 1);
		assert_eq!(report.applied, 0);
		let entry = cache
			.get(&PairKey::new(wallet(), 5))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(entry.slots_owned, 9);
	}

	#[tokio::test]
	async fn a_fresher_cache_write_survives_a_stale_delete() {
		let cache = Arc::new(MemoryCacheStore::new());
		let record = sample_player(wallet());
		// Stamped far in the future, as if another writer just synced it.
		cache
			.upsert(CacheEntry::from_view(
				&record.ownership_view(5).unwrap(),
				i64::MAX,
			))
			.await
			.unwrap();

		// Ledger says the player account is gone: the diff is a stale delete.
		let ledger = FakeLedger::with_accounts([]);
		let mut orchestrator = orchestrator(ledger, Arc::clone(&cache));
		let report = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &CancelToken::new())
			.await
			.unwrap();

		assert_eq!(report.stale_in_cache, 1);
		assert_eq!(report.failed, 1);
		assert_eq!(report.applied, 0);
		assert!(cache
			.get(&PairKey::new(wallet(), 5))
			.await
			.unwrap()
			.is_some());
	}

	#[tokio::test]
	async fn persistent_failures_get_flagged_after_the_threshold() {
		let cache = Arc::new(MemoryCacheStore::new());
		let mut orchestrator = orchestrator(FakeLedger::unreachable_endpoint(), cache);
		let cancel = CancelToken::new();

		let first = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &cancel)
			.await
			.unwrap();
		assert_eq!(first.unresolved, MAX_PROPERTIES);
		assert!(first.flagged.is_empty());

		let second = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &cancel)
			.await
			.unwrap();
		assert_eq!(second.flagged.len(), MAX_PROPERTIES);
	}

	#[tokio::test]
	async fn flagged_pairs_are_deferred_until_cleared() {
		let cache = Arc::new(MemoryCacheStore::new());
		let mut cached = sample_ownership(wallet(), 5).view();
		cached.slots_owned = 9;
		cache
			.upsert(CacheEntry::from_view(&cached, 100))
			.await
			.unwrap();

		let ledger = FakeLedger::unreachable_endpoint();
		let mut orchestrator = orchestrator(Arc::clone(&ledger), Arc::clone(&cache));
		let cancel = CancelToken::new();
		let scope = Scope::Property(5);
		let pair = PairKey::new(wallet(), 5);

		// Two failing cycles cross the threshold of 2.
		orchestrator.run_cycle(&scope, &cancel).await.unwrap();
		let second = orchestrator.run_cycle(&scope, &cancel).await.unwrap();
		assert_eq!(second.flagged, vec![pair]);

		// The endpoint recovers, but the flagged pair is not fetched again
		// until an operator clears it; the drifted entry stays put.
		ledger.heal([(
			ownership_address(&program(), &wallet(), 5),
			encode_ownership(&sample_ownership(wallet(), 5)),
		)]);
		let third = orchestrator.run_cycle(&scope, &cancel).await.unwrap();
		assert_eq!(third.unresolved, 1);
		assert_eq!(third.applied, 0);
		assert_eq!(
			cache.get(&pair).await.unwrap().unwrap().slots_owned,
			9,
			"deferred pair must not be touched"
		);

		orchestrator.clear_flag(&pair);
		let fourth = orchestrator.run_cycle(&scope, &cancel).await.unwrap();
		assert_eq!(fourth.mismatched, 1);
		assert_eq!(fourth.applied, 1);
		assert_eq!(cache.get(&pair).await.unwrap().unwrap().slots_owned, 3);
	}

	#[tokio::test]
	async fn full_cycle_walks_every_cached_wallet() {
		let wallet_a = Address::new([1u8; 32]);
		let wallet_b = Address::new([2u8; 32]);

		let cache = Arc::new(MemoryCacheStore::new());
		for w in [wallet_a, wallet_b] {
			let record = sample_player(w);
			cache
				.upsert(CacheEntry::from_view(&record.ownership_view(5).unwrap(), 100))
				.await
				.unwrap();
		}

		// Only wallet A still exists on the ledger.
		let record = sample_player(wallet_a);
		let ledger = FakeLedger::with_accounts([(
			player_address(&program(), &wallet_a),
			encode_player(&record),
		)]);

		let mut orchestrator = orchestrator(ledger, Arc::clone(&cache));
		let reports = orchestrator
			.run_full_cycle(&CancelToken::new())
			.await
			.unwrap();

		assert_eq!(reports.len(), 2);
		assert!(cache
			.get(&PairKey::new(wallet_a, 5))
			.await
			.unwrap()
			.is_some());
		assert_eq!(cache.get(&PairKey::new(wallet_b, 5)).await.unwrap(), None);
	}

	#[tokio::test]
	async fn cancellation_stops_the_cycle() {
		let mut orchestrator =
			orchestrator(populated_ledger(), Arc::new(MemoryCacheStore::new()));
		let cancel = CancelToken::new();
		cancel.cancel();

		let err = orchestrator
			.run_cycle(&Scope::Wallet(wallet()), &cancel)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			SyncError::Reconcile(ReconcileError::Cancelled)
		));
		assert_eq!(orchestrator.phase(), CyclePhase::Idle);
	}
}
