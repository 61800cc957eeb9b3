//! Off-chain cache of ownership state.
//!
//! The cache is a best-effort, eventually-consistent mirror of the ledger,
//! kept for low-latency queries. It is the only mutable shared resource in
//! the service; the ledger is always the source of truth and every cache
//! write flows from a reconciliation pass. Upserts are versioned on
//! `last_synced_at` so a stale pass can never overwrite a fresher one.

/// In-memory implementation of the cache store
mod memory;
/// The keyed-store interface and entry types
mod store;

pub use memory::MemoryCacheStore;
pub use store::{CacheEntry, CacheError, CacheStore, PairKey};
