//! In-memory implementation of the cache store.
//!
//! Used by tests and as a standalone mirror when no relational backend is
//! wired in. The map lock is held only for the duration of one operation;
//! cross-pass ordering comes from the versioned upsert, not the lock.

use super::{CacheEntry, CacheError, CacheStore, PairKey};
use crate::ledger::Address;

use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryCacheStore {
	entries: RwLock<HashMap<PairKey, CacheEntry>>,
}

impl MemoryCacheStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of cached entries, for diagnostics.
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}
}

#[async_trait::async_trait]
impl CacheStore for MemoryCacheStore {
	async fn get(&self, pair: &PairKey) -> Result<Option<CacheEntry>, CacheError> {
		Ok(self.entries.read().await.get(pair).cloned())
	}

	async fn entries_for_wallet(&self, wallet: &Address) -> Result<Vec<CacheEntry>, CacheError> {
		let mut entries: Vec<CacheEntry> = self
			.entries
			.read()
			.await
			.values()
			.filter(|e| e.wallet == *wallet)
			.cloned()
			.collect();
		entries.sort_by_key(|e| e.property_id);
		Ok(entries)
	}

	async fn entries_for_property(&self, property_id: u8) -> Result<Vec<CacheEntry>, CacheError> {
		let mut entries: Vec<CacheEntry> = self
			.entries
			.read()
			.await
			.values()
			.filter(|e| e.property_id == property_id)
			.cloned()
			.collect();
		entries.sort_by_key(|e| e.wallet);
		Ok(entries)
	}

	async fn wallets(&self) -> Result<Vec<Address>, CacheError> {
		let mut wallets: Vec<Address> = self
			.entries
			.read()
			.await
			.values()
			.map(|e| e.wallet)
			.collect();
		wallets.sort();
		wallets.dedup();
		Ok(wallets)
	}

	async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheError> {
		let mut entries = self.entries.write().await;
		let pair = entry.pair();
		if let Some(existing) = entries.get(&pair) {
			// Equal stamps are allowed so re-running a pass stays idempotent.
			if existing.last_synced_at > entry.last_synced_at {
				return Err(CacheError::WriteConflict { pair });
			}
		}
		entries.insert(pair, entry);
		Ok(())
	}

	async fn delete(&self, pair: &PairKey, stamp: i64) -> Result<(), CacheError> {
		let mut entries = self.entries.write().await;
		if let Some(existing) = entries.get(pair) {
			if existing.last_synced_at > stamp {
				return Err(CacheError::WriteConflict { pair: *pair });
			}
			entries.remove(pair);
		}
		Ok(())
	}
}
