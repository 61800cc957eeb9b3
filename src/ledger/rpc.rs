//! JSON-RPC implementation of the ledger reader.
//!
//! Issues `getAccountInfo` calls over HTTP with base64-encoded payloads at
//! confirmed commitment. HTTP and transport failures map to transient
//! errors; a null `value` in a successful response is an authoritative
//! `NotFound`.

use super::{AccountData, Address, LedgerError, LedgerReader};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Ledger reader backed by a JSON-RPC node endpoint.
#[derive(Clone)]
pub struct RpcLedgerReader {
	http_client: Client,
	rpc_url: String,
	commitment: &'static str,
}

impl RpcLedgerReader {
	pub fn new(rpc_url: String) -> Self {
		let http_client = Client::builder()
			.timeout(Duration::from_secs(30))
			.build()
			.expect("Failed to create HTTP client");

		Self {
			http_client,
			rpc_url,
			commitment: "confirmed",
		}
	}
}

#[async_trait::async_trait]
impl LedgerReader for RpcLedgerReader {
	async fn fetch_account(&self, address: &Address) -> Result<AccountData, LedgerError> {
		let request_body = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": "getAccountInfo",
			"params": [
				address.to_string(),
				{ "encoding": "base64", "commitment": self.commitment }
			]
		});

		debug!("Fetching account {}", address);

		let response = self
			.http_client
			.post(&self.rpc_url)
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(LedgerError::Transient(format!(
				"HTTP error: {}",
				response.status()
			)));
		}

		let response_json: serde_json::Value = response.json().await?;

		if let Some(error) = response_json.get("error") {
			// Node-side errors (behind, overloaded) are worth retrying.
			return Err(LedgerError::Transient(format!("RPC error: {error}")));
		}

		let value = response_json
			.get("result")
			.and_then(|r| r.get("value"))
			.ok_or_else(|| {
				LedgerError::InvalidResponse("response missing result.value".to_string())
			})?;

		if value.is_null() {
			return Ok(AccountData::NotFound);
		}

		let encoded = value
			.get("data")
			.and_then(|d| d.get(0))
			.and_then(|d| d.as_str())
			.ok_or_else(|| {
				LedgerError::InvalidResponse("account data is not base64".to_string())
			})?;

		let bytes = BASE64_STANDARD
			.decode(encoded)
			.map_err(|e| LedgerError::InvalidResponse(format!("invalid base64 payload: {e}")))?;

		Ok(AccountData::Found(bytes))
	}
}
