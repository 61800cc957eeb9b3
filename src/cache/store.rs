//! The keyed-store interface and entry types.

use crate::decoder::OwnershipView;
use crate::ledger::Address;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The (wallet, property) key a cache entry lives under.
///
/// This is also the serialization token for writes: two passes racing on the
/// same pair are ordered by the versioned upsert, while writes to different
/// pairs are free to interleave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
	pub wallet: Address,
	pub property_id: u8,
}

impl PairKey {
	pub fn new(wallet: Address, property_id: u8) -> Self {
		Self {
			wallet,
			property_id,
		}
	}
}

impl fmt::Display for PairKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.wallet, self.property_id)
	}
}

/// One cached mirror of a ledger-side ownership view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
	pub wallet: Address,
	pub property_id: u8,
	pub slots_owned: u16,
	pub slots_shielded: u16,
	pub purchase_timestamp: i64,
	pub shield_expiry: i64,
	pub steal_protection_expiry: i64,
	/// Unix seconds of the pass that wrote this entry; the upsert version.
	pub last_synced_at: i64,
}

impl CacheEntry {
	/// Build an entry from a ledger view, stamped with the sync time.
	pub fn from_view(view: &OwnershipView, last_synced_at: i64) -> Self {
		Self {
			wallet: view.wallet,
			property_id: view.property_id,
			slots_owned: view.slots_owned,
			slots_shielded: view.slots_shielded,
			purchase_timestamp: view.purchase_timestamp,
			shield_expiry: view.shield_expiry,
			steal_protection_expiry: view.steal_protection_expiry,
			last_synced_at,
		}
	}

	pub fn pair(&self) -> PairKey {
		PairKey::new(self.wallet, self.property_id)
	}

	/// The comparable projection of this entry, without the sync stamp.
	pub fn view(&self) -> OwnershipView {
		OwnershipView {
			wallet: self.wallet,
			property_id: self.property_id,
			slots_owned: self.slots_owned,
			slots_shielded: self.slots_shielded,
			purchase_timestamp: self.purchase_timestamp,
			shield_expiry: self.shield_expiry,
			steal_protection_expiry: self.steal_protection_expiry,
		}
	}
}

/// Error types for cache store operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
	/// Lost the versioned-upsert race to a writer with a fresher stamp.
	#[error("write conflict for {pair}: a fresher entry exists")]
	WriteConflict { pair: PairKey },

	#[error("cache backend failure: {0}")]
	Backend(String),
}

/// Keyed record store mirroring ledger ownership state.
///
/// Queryable wallet-major (all properties of one wallet) and property-major
/// (all cached owners of one property, the inverted index the ledger cannot
/// provide).
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
	async fn get(&self, pair: &PairKey) -> Result<Option<CacheEntry>, CacheError>;

	async fn entries_for_wallet(&self, wallet: &Address) -> Result<Vec<CacheEntry>, CacheError>;

	async fn entries_for_property(&self, property_id: u8) -> Result<Vec<CacheEntry>, CacheError>;

	/// All wallets the cache currently knows about.
	async fn wallets(&self) -> Result<Vec<Address>, CacheError>;

	/// Insert or overwrite, unless a fresher `last_synced_at` already exists.
	async fn upsert(&self, entry: CacheEntry) -> Result<(), CacheError>;

	/// Remove the entry, unless a fresher `last_synced_at` already exists.
	///
	/// Deletes carry the same version stamp as upserts; a pass working from
	/// an older ledger snapshot must not erase an entry a fresher writer
	/// just synced.
	async fn delete(&self, pair: &PairKey, stamp: i64) -> Result<(), CacheError>;
}
