//! Standalone per-(wallet, property) ownership account.
//!
//! Property-major reconciliation uses point lookups against these accounts,
//! since the ledger has no "list all owners" query. The account carries 32
//! reserved trailing bytes on chain; they are not part of the schema and are
//! ignored.

use super::cursor::Cursor;
use super::schema::{payload_size, FieldSpec};
use super::{check_account, DecodeError, DISCRIMINATOR_LEN};
use crate::decoder::player::OwnershipView;
use crate::ledger::Address;

/// Discriminator name for the ownership account type.
pub const OWNERSHIP_ACCOUNT_NAME: &str = "PropertyOwnership";

/// `PropertyOwnership` layout, in on-chain field order.
pub const OWNERSHIP_SCHEMA: [FieldSpec; 9] = [
	FieldSpec::scalar("player", 32),
	FieldSpec::scalar("property_id", 1),
	FieldSpec::scalar("slots_owned", 2),
	FieldSpec::scalar("slots_shielded", 2),
	FieldSpec::scalar("purchase_timestamp", 8),
	FieldSpec::scalar("shield_expiry", 8),
	FieldSpec::scalar("shield_cooldown_duration", 8),
	FieldSpec::scalar("steal_protection_expiry", 8),
	FieldSpec::scalar("bump", 1),
];

pub const OWNERSHIP_PAYLOAD_SIZE: usize = payload_size(&OWNERSHIP_SCHEMA);
pub const OWNERSHIP_ACCOUNT_SIZE: usize = DISCRIMINATOR_LEN + OWNERSHIP_PAYLOAD_SIZE;

const _: () = assert!(OWNERSHIP_ACCOUNT_SIZE == 78);

/// Decoded snapshot of one `PropertyOwnership` account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRecord {
	pub player: Address,
	pub property_id: u8,
	pub slots_owned: u16,
	pub slots_shielded: u16,
	pub purchase_timestamp: i64,
	pub shield_expiry: i64,
	pub shield_cooldown_duration: i64,
	pub steal_protection_expiry: i64,
	pub bump: u8,
}

impl OwnershipRecord {
	/// Decode a raw account buffer into an `OwnershipRecord`.
	pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
		let payload = check_account(data, OWNERSHIP_ACCOUNT_NAME, OWNERSHIP_ACCOUNT_SIZE)?;
		let mut cur = Cursor::new(payload);

		let record = Self {
			player: Address::new(cur.read_array()?),
			property_id: cur.read_u8()?,
			slots_owned: cur.read_u16()?,
			slots_shielded: cur.read_u16()?,
			purchase_timestamp: cur.read_i64()?,
			shield_expiry: cur.read_i64()?,
			shield_cooldown_duration: cur.read_i64()?,
			steal_protection_expiry: cur.read_i64()?,
			bump: cur.read_u8()?,
		};

		debug_assert_eq!(cur.position(), OWNERSHIP_PAYLOAD_SIZE);
		Ok(record)
	}

	/// Project to the comparison view shared with the player-account arrays.
	pub fn view(&self) -> OwnershipView {
		OwnershipView {
			wallet: self.player,
			property_id: self.property_id,
			slots_owned: self.slots_owned,
			slots_shielded: self.slots_shielded,
			purchase_timestamp: self.purchase_timestamp,
			shield_expiry: self.shield_expiry,
			steal_protection_expiry: self.steal_protection_expiry,
		}
	}
}

#[cfg(test)]
pub(crate) mod test_fixtures {
	use super::*;
	use crate::decoder::account_discriminator;

	pub(crate) fn encode_ownership(record: &OwnershipRecord) -> Vec<u8> {
		let mut buf = Vec::with_capacity(OWNERSHIP_ACCOUNT_SIZE + 32);
		buf.extend_from_slice(&account_discriminator(OWNERSHIP_ACCOUNT_NAME));
		buf.extend_from_slice(record.player.as_bytes());
		buf.push(record.property_id);
		buf.extend_from_slice(&record.slots_owned.to_le_bytes());
		buf.extend_from_slice(&record.slots_shielded.to_le_bytes());
		buf.extend_from_slice(&record.purchase_timestamp.to_le_bytes());
		buf.extend_from_slice(&record.shield_expiry.to_le_bytes());
		buf.extend_from_slice(&record.shield_cooldown_duration.to_le_bytes());
		buf.extend_from_slice(&record.steal_protection_expiry.to_le_bytes());
		buf.push(record.bump);
		// reserved trailing bytes present on chain
		buf.extend_from_slice(&[0u8; 32]);
		buf
	}

	pub(crate) fn sample_ownership(player: Address, property_id: u8) -> OwnershipRecord {
		OwnershipRecord {
			player,
			property_id,
			slots_owned: 3,
			slots_shielded: 1,
			purchase_timestamp: 1_716_900_000,
			shield_expiry: 1_717_100_000,
			shield_cooldown_duration: 86_400,
			steal_protection_expiry: 1_717_050_000,
			bump: 253,
		}
	}
}
