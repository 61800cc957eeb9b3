//! Binary layout decoders for on-chain game accounts.
//!
//! This module turns raw account buffers fetched from the ledger into
//! strongly-typed records. Decoding is pure: no I/O, no shared state, and the
//! same bytes always produce the same record. Every other part of the sync
//! pipeline depends on these decoders being correct, so the layouts are
//! declared as schema tables (see `schema`) and cross-checked against the
//! known account sizes at compile time.
//!
//! Two account types are supported:
//! - `player`: the per-wallet `PlayerAccount` with its fixed per-property and
//!   per-set arrays.
//! - `ownership`: the standalone per-(wallet, property) `PropertyOwnership`
//!   account used for point lookups.

mod cursor;
/// Standalone per-(wallet, property) ownership account
pub mod ownership;
/// Per-wallet player account and its ownership projection
pub mod player;
/// Declarative account layout tables
pub mod schema;

pub use ownership::OwnershipRecord;
pub use player::{OwnershipView, PlayerRecord, MAX_PROPERTIES, MAX_SETS};

use sha2::{Digest, Sha256};

/// Length of the leading account-type tag.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Errors produced while decoding an account buffer.
///
/// Both variants mean the buffer is unusable for this account type. They are
/// fatal for the single decode and never retried; callers log the offending
/// address and treat the pair as unresolved for the cycle.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
	#[error("account buffer too short: need {needed} bytes, got {got}")]
	BufferTooShort { needed: usize, got: usize },

	#[error("unexpected account discriminator 0x{0}")]
	BadDiscriminator(String),
}

/// Compute the 8-byte discriminator for a named account type.
///
/// The on-chain program tags every account with the first eight bytes of
/// `sha256("account:<Name>")`. The tag is validated but not otherwise
/// interpreted.
pub fn account_discriminator(account_name: &str) -> [u8; 8] {
	let digest = Sha256::digest(format!("account:{account_name}").as_bytes());
	let mut tag = [0u8; DISCRIMINATOR_LEN];
	tag.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
	tag
}

/// Validate the buffer length and discriminator, returning the payload slice.
pub(crate) fn check_account<'a>(
	data: &'a [u8],
	account_name: &str,
	min_size: usize,
) -> Result<&'a [u8], DecodeError> {
	if data.len() < min_size {
		return Err(DecodeError::BufferTooShort {
			needed: min_size,
			got: data.len(),
		});
	}

	let expected = account_discriminator(account_name);
	if data[..DISCRIMINATOR_LEN] != expected {
		return Err(DecodeError::BadDiscriminator(hex::encode(
			&data[..DISCRIMINATOR_LEN],
		)));
	}

	Ok(&data[DISCRIMINATOR_LEN..])
}
