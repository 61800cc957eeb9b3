//! Per-wallet player account and its ownership projection.
//!
//! The `PlayerAccount` is the v9 unified record: one account per wallet
//! holding the scalar counters plus fixed per-property (22) and per-set (8)
//! arrays. The arrays are part of the account layout and are never resized;
//! their lengths are compile-time constants and are never inferred from the
//! buffer. All 64-bit fields decode into explicit 64-bit integer types, since
//! income and cumulative-reward values exceed 2^53 in normal gameplay.
//! Timestamps are signed: a zero or negative value is a meaningful "not set"
//! sentinel, not an error.

use super::cursor::Cursor;
use super::schema::{payload_size, FieldSpec};
use super::{check_account, DecodeError, DISCRIMINATOR_LEN};
use crate::ledger::Address;

use serde::{Deserialize, Serialize};

/// Number of properties on the board.
pub const MAX_PROPERTIES: usize = 22;
/// Number of property sets.
pub const MAX_SETS: usize = 8;

/// Discriminator name for the player account type.
pub const PLAYER_ACCOUNT_NAME: &str = "PlayerAccount";

/// Canonical v9 `PlayerAccount` layout, in on-chain field order.
pub const PLAYER_SCHEMA: [FieldSpec; 23] = [
	FieldSpec::scalar("owner", 32),
	FieldSpec::scalar("total_base_daily_income", 8),
	FieldSpec::scalar("last_accumulation_timestamp", 8),
	FieldSpec::scalar("total_rewards_claimed", 8),
	FieldSpec::scalar("pending_rewards", 8),
	FieldSpec::scalar("total_steals_attempted", 4),
	FieldSpec::scalar("total_steals_successful", 4),
	FieldSpec::scalar("total_slots_owned", 2),
	FieldSpec::scalar("complete_sets_owned", 1),
	FieldSpec::scalar("properties_owned_count", 1),
	FieldSpec::scalar("bump", 1),
	FieldSpec::array("padding", 1, 3),
	FieldSpec::array("property_purchase_timestamp", 8, MAX_PROPERTIES),
	FieldSpec::array("property_shield_expiry", 8, MAX_PROPERTIES),
	FieldSpec::array("property_shield_cooldown", 8, MAX_PROPERTIES),
	FieldSpec::array("property_steal_protection_expiry", 8, MAX_PROPERTIES),
	FieldSpec::array("set_cooldown_timestamp", 8, MAX_SETS),
	FieldSpec::array("set_cooldown_duration", 8, MAX_SETS),
	FieldSpec::array("steal_cooldown_timestamp", 8, MAX_PROPERTIES),
	FieldSpec::array("property_slots", 2, MAX_PROPERTIES),
	FieldSpec::array("property_shielded", 2, MAX_PROPERTIES),
	FieldSpec::array("set_last_purchased_property", 1, MAX_SETS),
	FieldSpec::array("set_properties_mask", 1, MAX_SETS),
];

/// Payload size of the player account, excluding the discriminator.
pub const PLAYER_PAYLOAD_SIZE: usize = payload_size(&PLAYER_SCHEMA);
/// Full size of the player account buffer.
pub const PLAYER_ACCOUNT_SIZE: usize = DISCRIMINATOR_LEN + PLAYER_PAYLOAD_SIZE;

// The layout table must reproduce the known v9 account size exactly.
const _: () = assert!(PLAYER_ACCOUNT_SIZE == 1200);

/// Decoded snapshot of one wallet's `PlayerAccount`.
///
/// Created on-chain when a wallet first interacts with the game; the decoder
/// only ever reads a snapshot and never mutates chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
	pub owner: Address,
	pub total_base_daily_income: u64,
	pub last_accumulation_timestamp: i64,
	pub total_rewards_claimed: u64,
	pub pending_rewards: u64,
	pub total_steals_attempted: u32,
	pub total_steals_successful: u32,
	pub total_slots_owned: u16,
	pub complete_sets_owned: u8,
	pub properties_owned_count: u8,
	pub bump: u8,
	pub property_purchase_timestamp: [i64; MAX_PROPERTIES],
	pub property_shield_expiry: [i64; MAX_PROPERTIES],
	pub property_shield_cooldown: [i64; MAX_PROPERTIES],
	pub property_steal_protection_expiry: [i64; MAX_PROPERTIES],
	pub set_cooldown_timestamp: [i64; MAX_SETS],
	pub set_cooldown_duration: [i64; MAX_SETS],
	pub steal_cooldown_timestamp: [i64; MAX_PROPERTIES],
	pub property_slots: [u16; MAX_PROPERTIES],
	pub property_shielded: [u16; MAX_PROPERTIES],
	pub set_last_purchased_property: [u8; MAX_SETS],
	pub set_properties_mask: [u8; MAX_SETS],
}

impl PlayerRecord {
	/// Decode a raw account buffer into a `PlayerRecord`.
	///
	/// Fails when the buffer is shorter than [`PLAYER_ACCOUNT_SIZE`] or the
	/// leading tag is not the player discriminator. Trailing bytes beyond the
	/// schema length are ignored.
	pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
		let payload = check_account(data, PLAYER_ACCOUNT_NAME, PLAYER_ACCOUNT_SIZE)?;
		let mut cur = Cursor::new(payload);

		let record = Self {
			owner: Address::new(cur.read_array()?),
			total_base_daily_income: cur.read_u64()?,
			last_accumulation_timestamp: cur.read_i64()?,
			total_rewards_claimed: cur.read_u64()?,
			pending_rewards: cur.read_u64()?,
			total_steals_attempted: cur.read_u32()?,
			total_steals_successful: cur.read_u32()?,
			total_slots_owned: cur.read_u16()?,
			complete_sets_owned: cur.read_u8()?,
			properties_owned_count: cur.read_u8()?,
			bump: {
				let bump = cur.read_u8()?;
				cur.skip(3)?;
				bump
			},
			property_purchase_timestamp: read_i64s(&mut cur)?,
			property_shield_expiry: read_i64s(&mut cur)?,
			property_shield_cooldown: read_i64s(&mut cur)?,
			property_steal_protection_expiry: read_i64s(&mut cur)?,
			set_cooldown_timestamp: read_i64s(&mut cur)?,
			set_cooldown_duration: read_i64s(&mut cur)?,
			steal_cooldown_timestamp: read_i64s(&mut cur)?,
			property_slots: read_u16s(&mut cur)?,
			property_shielded: read_u16s(&mut cur)?,
			set_last_purchased_property: cur.read_array()?,
			set_properties_mask: cur.read_array()?,
		};

		debug_assert_eq!(cur.position(), PLAYER_PAYLOAD_SIZE);
		Ok(record)
	}

	/// Project the per-property slice of this record for one property.
	///
	/// Returns `None` for a property index outside the board.
	pub fn ownership_view(&self, property_id: u8) -> Option<OwnershipView> {
		let idx = usize::from(property_id);
		if idx >= MAX_PROPERTIES {
			return None;
		}
		Some(OwnershipView {
			wallet: self.owner,
			property_id,
			slots_owned: self.property_slots[idx],
			slots_shielded: self.property_shielded[idx],
			purchase_timestamp: self.property_purchase_timestamp[idx],
			shield_expiry: self.property_shield_expiry[idx],
			steal_protection_expiry: self.property_steal_protection_expiry[idx],
		})
	}
}

/// Per-(wallet, property) projection of on-chain ownership state.
///
/// This is the unit the reconciliation engine compares field-by-field against
/// the cache. The same information exists both as an array slice of the
/// player account and as a standalone ownership account; both project here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipView {
	pub wallet: Address,
	pub property_id: u8,
	pub slots_owned: u16,
	pub slots_shielded: u16,
	pub purchase_timestamp: i64,
	pub shield_expiry: i64,
	pub steal_protection_expiry: i64,
}

impl OwnershipView {
	/// Whether the ledger actually records any ownership state here.
	///
	/// A never-purchased property keeps zeroed array slots in the player
	/// account; such a view is treated as absent on the ledger side.
	pub fn is_populated(&self) -> bool {
		self.slots_owned != 0
			|| self.slots_shielded != 0
			|| self.purchase_timestamp != 0
			|| self.shield_expiry != 0
			|| self.steal_protection_expiry != 0
	}
}

fn read_i64s<const N: usize>(cur: &mut Cursor<'_>) -> Result<[i64; N], DecodeError> {
	let mut out = [0i64; N];
	for slot in &mut out {
		*slot = cur.read_i64()?;
	}
	Ok(out)
}

fn read_u16s<const N: usize>(cur: &mut Cursor<'_>) -> Result<[u16; N], DecodeError> {
	let mut out = [0u16; N];
	for slot in &mut out {
		*slot = cur.read_u16()?;
	}
	Ok(out)
}
