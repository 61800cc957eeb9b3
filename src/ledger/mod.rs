//! Ledger reader integration.
//!
//! The ledger is the authoritative on-chain program state, read-only from
//! this service's perspective. This module provides the `LedgerReader` seam
//! the reconciliation engine consumes, the JSON-RPC implementation of it, and
//! the deterministic program-derived addressing used to enumerate a scope.

/// Account addresses and program-derived address computation
mod address;
/// The consumed ledger-read interface
mod reader;
/// JSON-RPC implementation of the ledger reader
mod rpc;

pub use address::{ownership_address, player_address, Address, AddressParseError};
pub use reader::{AccountData, LedgerError, LedgerReader};
pub use rpc::RpcLedgerReader;
