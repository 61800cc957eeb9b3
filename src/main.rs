mod cache;
mod config;
mod decoder;
mod ledger;
mod reconcile;
mod sync;

use crate::cache::{CacheStore, MemoryCacheStore};
use crate::config::Config;
use crate::ledger::RpcLedgerReader;
use crate::reconcile::ReconciliationEngine;
use crate::sync::{SyncOrchestrator, SyncService};

use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting defipoly state sync service");

	let config = match Config::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			return;
		}
	};

	let ledger = Arc::new(RpcLedgerReader::new(config.rpc_url.clone()));
	let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());

	let engine = ReconciliationEngine::new(
		ledger,
		Arc::clone(&cache),
		config.program_id,
		config.engine_config(),
	);
	let orchestrator = SyncOrchestrator::new(
		engine,
		cache,
		config.apply_fan_out,
		config.max_consecutive_failures,
	);
	let (service, handle) = SyncService::new(orchestrator, config.sync_interval);

	let service_task = tokio::spawn(service.run());

	match tokio::signal::ctrl_c().await {
		Ok(()) => info!("Received shutdown signal"),
		Err(e) => error!("Failed to listen for shutdown signal: {}", e),
	}

	handle.shutdown();
	if let Err(e) = service_task.await {
		error!("Sync service task panicked: {}", e);
	}
}
