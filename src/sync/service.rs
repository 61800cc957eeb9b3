//! The long-running sync service.
//!
//! Wraps the orchestrator in a task driven by three inputs: a periodic timer
//! for full cycles, an on-demand trigger channel for single scopes (a game
//! event just changed a wallet, re-verify it now), and a shutdown signal.
//! Cycle failures are logged and the loop keeps going; only shutdown stops
//! the service.

use crate::reconcile::{CancelToken, Scope};
use crate::sync::orchestrator::SyncOrchestrator;

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

const TRIGGER_QUEUE_DEPTH: usize = 64;

/// Handle for controlling a running [`SyncService`] from other tasks.
#[derive(Clone)]
pub struct SyncHandle {
	trigger_tx: mpsc::Sender<Scope>,
	shutdown_tx: watch::Sender<bool>,
	cancel: CancelToken,
}

impl SyncHandle {
	/// Queue an on-demand cycle for one scope.
	///
	/// Returns `false` if the queue is full or the service has stopped; the
	/// scope is still covered by the next periodic cycle either way.
	pub fn trigger(&self, scope: Scope) -> bool {
		match self.trigger_tx.try_send(scope) {
			Ok(()) => true,
			Err(err) => {
				warn!(error = %err, "dropping on-demand sync trigger");
				false
			}
		}
	}

	/// Stop the service, cancelling any in-flight cycle at the next pair
	/// boundary.
	pub fn shutdown(&self) {
		self.cancel.cancel();
		let _ = self.shutdown_tx.send(true);
	}
}

/// Periodic cache synchronization task.
pub struct SyncService {
	orchestrator: SyncOrchestrator,
	interval: Duration,
	trigger_rx: mpsc::Receiver<Scope>,
	shutdown_rx: watch::Receiver<bool>,
	cancel: CancelToken,
}

impl SyncService {
	pub fn new(orchestrator: SyncOrchestrator, interval: Duration) -> (Self, SyncHandle) {
		let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE_DEPTH);
		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let cancel = CancelToken::new();

		let handle = SyncHandle {
			trigger_tx,
			shutdown_tx,
			cancel: cancel.clone(),
		};

		(
			Self {
				orchestrator,
				interval,
				trigger_rx,
				shutdown_rx,
				cancel,
			},
			handle,
		)
	}

	/// Run until shutdown. The first full cycle starts immediately.
	pub async fn run(mut self) {
		info!(
			interval_secs = self.interval.as_secs(),
			"sync service started"
		);

		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {
					if let Err(err) = self.orchestrator.run_full_cycle(&self.cancel).await {
						error!(error = %err, "periodic sync cycle failed");
					}
				}
				Some(scope) = self.trigger_rx.recv() => {
					info!(scope = %scope, "running on-demand sync cycle");
					if let Err(err) = self.orchestrator.run_cycle(&scope, &self.cancel).await {
						error!(scope = %scope, error = %err, "on-demand sync cycle failed");
					}
				}
				result = self.shutdown_rx.changed() => {
					if result.is_err() || *self.shutdown_rx.borrow() {
						break;
					}
				}
			}
		}

		info!("sync service stopped");
	}
}
