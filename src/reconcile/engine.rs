//! Snapshot capture and pass composition.
//!
//! The engine owns the I/O side of a pass: fetching and decoding ledger
//! accounts into a `LedgerSnapshot`, querying the cache into a
//! `CacheSnapshot`, and composing the two with the pure diff into a report.
//! Per-pair fetch or decode failures never abort a pass; they land in the
//! snapshot's unresolved map and the rest of the scope is still reconciled.

use crate::cache::{CacheStore, PairKey};
use crate::decoder::{OwnershipRecord, PlayerRecord, MAX_PROPERTIES};
use crate::ledger::{
	ownership_address, player_address, AccountData, Address, LedgerError, LedgerReader,
};
use crate::reconcile::diff::diff_snapshots;
use crate::reconcile::report::ReconciliationReport;
use crate::reconcile::snapshot::{CacheSnapshot, LedgerSnapshot};
use crate::reconcile::{ReconcileError, Scope};

use backoff::ExponentialBackoffBuilder;
use chrono::Utc;
use futures::stream;
use futures_util::StreamExt;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cooperative cancellation flag shared between the service and a running
/// pass. Checked between pairs, never mid-fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}
}

/// Tuning knobs for ledger capture.
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Upper bound on concurrent ledger fetches within one pass.
	pub fetch_fan_out: usize,
	/// First retry delay for transient ledger failures.
	pub retry_initial_interval: Duration,
	/// Total retry budget per fetch before the pair goes unresolved.
	pub retry_max_elapsed: Duration,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			fetch_fan_out: 8,
			retry_initial_interval: Duration::from_millis(500),
			retry_max_elapsed: Duration::from_secs(10),
		}
	}
}

/// Captures snapshots and runs reconciliation passes over one program's
/// accounts.
pub struct ReconciliationEngine {
	ledger: Arc<dyn LedgerReader>,
	cache: Arc<dyn CacheStore>,
	program_id: Address,
	config: EngineConfig,
}

impl ReconciliationEngine {
	pub fn new(
		ledger: Arc<dyn LedgerReader>,
		cache: Arc<dyn CacheStore>,
		program_id: Address,
		config: EngineConfig,
	) -> Self {
		Self {
			ledger,
			cache,
			program_id,
			config,
		}
	}

	/// Run one full pass over a scope: capture both sides, diff, report.
	///
	/// The returned report has `applied`/`failed` at zero; applying the diffs
	/// is the orchestrator's job.
	pub async fn reconcile(
		&self,
		scope: &Scope,
		cancel: &CancelToken,
	) -> Result<ReconciliationReport, ReconcileError> {
		let started_at = Utc::now();

		let ledger = self.capture_ledger(scope, cancel).await?;
		if cancel.is_cancelled() {
			return Err(ReconcileError::Cancelled);
		}
		let cache = self.capture_cache(scope).await?;

		let diffs = diff_snapshots(&ledger, &cache);
		debug!(
			scope = %scope,
			pairs = ledger.pairs_checked(),
			diffs = diffs.len(),
			"reconciliation pass compared"
		);

		Ok(ReconciliationReport::from_pass(
			scope, started_at, &ledger, diffs,
		))
	}

	/// Capture the ledger side of a scope.
	///
	/// A wallet scope reads the single player account and projects all of its
	/// per-property array slots. A property scope walks every wallet the
	/// cache knows about and point-reads the standalone ownership account for
	/// each, since the ledger has no owners-of-property index.
	pub async fn capture_ledger(
		&self,
		scope: &Scope,
		cancel: &CancelToken,
	) -> Result<LedgerSnapshot, ReconcileError> {
		self.capture_ledger_skipping(scope, cancel, &BTreeSet::new())
			.await
	}

	/// Like [`capture_ledger`](Self::capture_ledger), but pairs in `skip`
	/// are not fetched at all; they land in the snapshot's unresolved map.
	///
	/// Skipping only applies to property scope, where fetches are per pair.
	/// A wallet scope is one account read covering all 22 pairs, so there is
	/// nothing to save by skipping.
	pub async fn capture_ledger_skipping(
		&self,
		scope: &Scope,
		cancel: &CancelToken,
		skip: &BTreeSet<PairKey>,
	) -> Result<LedgerSnapshot, ReconcileError> {
		if cancel.is_cancelled() {
			return Err(ReconcileError::Cancelled);
		}

		match scope {
			Scope::Wallet(wallet) => Ok(self.capture_wallet(wallet).await),
			Scope::Property(property_id) => {
				self.capture_property(*property_id, cancel, skip).await
			}
		}
	}

	/// Capture the cache side of a scope.
	pub async fn capture_cache(&self, scope: &Scope) -> Result<CacheSnapshot, ReconcileError> {
		Ok(CacheSnapshot::capture(self.cache.as_ref(), scope).await?)
	}

	async fn capture_wallet(&self, wallet: &Address) -> LedgerSnapshot {
		let mut snapshot = LedgerSnapshot::default();
		let address = player_address(&self.program_id, wallet);

		match self.fetch_with_retry(&address).await {
			Ok(AccountData::Found(data)) => match PlayerRecord::decode(&data) {
				Ok(record) => {
					for property_id in 0..MAX_PROPERTIES as u8 {
						if let Some(view) = record.ownership_view(property_id) {
							snapshot
								.views
								.insert(PairKey::new(*wallet, property_id), view);
						}
					}
				}
				Err(err) => {
					warn!(%address, %wallet, error = %err, "undecodable player account");
					for property_id in 0..MAX_PROPERTIES as u8 {
						snapshot
							.unresolved
							.insert(PairKey::new(*wallet, property_id), err.to_string());
					}
				}
			},
			// No player account at all: every pair is authoritatively gone.
			Ok(AccountData::NotFound) => {
				for property_id in 0..MAX_PROPERTIES as u8 {
					snapshot.absent.insert(PairKey::new(*wallet, property_id));
				}
			}
			Err(err) => {
				warn!(%address, %wallet, error = %err, "player account fetch failed");
				for property_id in 0..MAX_PROPERTIES as u8 {
					snapshot
						.unresolved
						.insert(PairKey::new(*wallet, property_id), err.to_string());
				}
			}
		}

		snapshot
	}

	async fn capture_property(
		&self,
		property_id: u8,
		cancel: &CancelToken,
		skip: &BTreeSet<PairKey>,
	) -> Result<LedgerSnapshot, ReconcileError> {
		let wallets = self.cache.wallets().await?;

		let mut snapshot = LedgerSnapshot::default();
		let mut candidates = Vec::with_capacity(wallets.len());
		for wallet in wallets {
			let pair = PairKey::new(wallet, property_id);
			if skip.contains(&pair) {
				debug!(%pair, "pair deferred pending manual inspection");
				snapshot
					.unresolved
					.insert(pair, "deferred pending manual inspection".to_string());
			} else {
				candidates.push(wallet);
			}
		}

		let fetches = stream::iter(candidates.into_iter().map(|wallet| {
			let address = ownership_address(&self.program_id, &wallet, property_id);
			async move {
				let result = self.fetch_with_retry(&address).await;
				(wallet, address, result)
			}
		}))
		.buffer_unordered(self.config.fetch_fan_out.max(1));
		tokio::pin!(fetches);

		while let Some((wallet, address, result)) = fetches.next().await {
			if cancel.is_cancelled() {
				return Err(ReconcileError::Cancelled);
			}

			let pair = PairKey::new(wallet, property_id);
			match result {
				Ok(AccountData::Found(data)) => match OwnershipRecord::decode(&data) {
					Ok(record) => {
						snapshot.views.insert(pair, record.view());
					}
					Err(err) => {
						warn!(%address, %pair, error = %err, "undecodable ownership account");
						snapshot.unresolved.insert(pair, err.to_string());
					}
				},
				Ok(AccountData::NotFound) => {
					snapshot.absent.insert(pair);
				}
				Err(err) => {
					warn!(%address, %pair, error = %err, "ownership account fetch failed");
					snapshot.unresolved.insert(pair, err.to_string());
				}
			}
		}

		Ok(snapshot)
	}

	/// Fetch one account, retrying transient failures with exponential
	/// backoff until the per-fetch budget runs out.
	async fn fetch_with_retry(&self, address: &Address) -> Result<AccountData, LedgerError> {
		let policy = ExponentialBackoffBuilder::new()
			.with_initial_interval(self.config.retry_initial_interval)
			.with_max_elapsed_time(Some(self.config.retry_max_elapsed))
			.build();

		backoff::future::retry(policy, || async {
			self.ledger.fetch_account(address).await.map_err(|err| {
				if err.is_transient() {
					debug!(%address, error = %err, "retrying ledger fetch");
					backoff::Error::transient(err)
				} else {
					backoff::Error::permanent(err)
				}
			})
		})
		.await
	}
}
