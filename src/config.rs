//! Environment-driven service configuration.
//!
//! Everything the service needs comes from the environment: the RPC endpoint
//! and program id are required, the rest has defaults tuned for the standard
//! five-minute reconciliation cadence.

use crate::ledger::Address;
use crate::reconcile::EngineConfig;

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("missing required environment variable {0}")]
	Missing(&'static str),

	#[error("invalid value for {name}: {message}")]
	Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
	/// JSON-RPC endpoint of the ledger node.
	pub rpc_url: String,
	/// Address of the on-chain game program.
	pub program_id: Address,
	/// Time between full sync cycles.
	pub sync_interval: Duration,
	/// Concurrent ledger fetches within a pass.
	pub fetch_fan_out: usize,
	/// Concurrent cache writes while applying corrections.
	pub apply_fan_out: usize,
	/// First retry delay for transient ledger failures.
	pub retry_initial_interval: Duration,
	/// Total retry budget per fetch.
	pub retry_max_elapsed: Duration,
	/// Consecutive unresolved cycles before a pair is flagged.
	pub max_consecutive_failures: u32,
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		Ok(Self {
			rpc_url: required("RPC_URL")?,
			program_id: required("PROGRAM_ID")?
				.parse()
				.map_err(|err: crate::ledger::AddressParseError| ConfigError::Invalid {
					name: "PROGRAM_ID",
					message: err.to_string(),
				})?,
			sync_interval: Duration::from_secs(optional("SYNC_INTERVAL_SECS", 300)?),
			fetch_fan_out: optional("FETCH_FAN_OUT", 8)?,
			apply_fan_out: optional("APPLY_FAN_OUT", 8)?,
			retry_initial_interval: Duration::from_millis(optional("RETRY_INITIAL_MS", 500)?),
			retry_max_elapsed: Duration::from_secs(optional("RETRY_MAX_ELAPSED_SECS", 10)?),
			max_consecutive_failures: optional("MAX_CONSECUTIVE_FAILURES", 5)?,
		})
	}

	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			fetch_fan_out: self.fetch_fan_out,
			retry_initial_interval: self.retry_initial_interval,
			retry_max_elapsed: self.retry_max_elapsed,
		}
	}
}

fn required(name: &'static str) -> Result<String, ConfigError> {
	env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: fmt::Display,
{
	parse_optional(name, env::var(name).ok(), default)
}

fn parse_optional<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: fmt::Display,
{
	match raw {
		Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
			name,
			message: err.to_string(),
		}),
		None => Ok(default),
	}
}
