//! The consumed ledger-read interface.

use super::Address;

/// Result of a point lookup against the ledger.
///
/// `NotFound` is authoritative: the scope does not exist on chain and a
/// previously cached copy of it is stale. Transport failures surface as
/// `LedgerError::Transient` instead, and say nothing about existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountData {
	Found(Vec<u8>),
	NotFound,
}

/// Error types for ledger read operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
	#[error("transient ledger failure: {0}")]
	Transient(String),

	#[error("malformed RPC response: {0}")]
	InvalidResponse(String),
}

impl LedgerError {
	/// Whether retrying the same call can reasonably succeed.
	pub fn is_transient(&self) -> bool {
		matches!(self, LedgerError::Transient(_))
	}
}

impl From<reqwest::Error> for LedgerError {
	fn from(err: reqwest::Error) -> Self {
		LedgerError::Transient(err.to_string())
	}
}

impl From<serde_json::Error> for LedgerError {
	fn from(err: serde_json::Error) -> Self {
		LedgerError::InvalidResponse(err.to_string())
	}
}

/// Read-only access to raw account state on the ledger.
#[async_trait::async_trait]
pub trait LedgerReader: Send + Sync {
	/// Fetch the raw bytes of one account by address.
	async fn fetch_account(&self, address: &Address) -> Result<AccountData, LedgerError>;
}
