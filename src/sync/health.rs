//! Consecutive-failure tracking for reconciled pairs.
//!
//! A pair that fails to resolve once is usually just an RPC hiccup and the
//! next cycle picks it up. A pair that stays unresolved for several cycles in
//! a row points at something persistent, an undecodable account or a dead
//! endpoint, and gets flagged in the cycle report for an operator to look at.

use crate::cache::PairKey;

use std::collections::HashMap;
use tracing::warn;

/// Tracks how many consecutive cycles each pair has gone unresolved.
#[derive(Debug)]
pub struct PairHealthTracker {
	/// Consecutive unresolved cycles before a pair is flagged.
	threshold: u32,
	consecutive_unresolved: HashMap<PairKey, u32>,
}

impl PairHealthTracker {
	pub fn new(threshold: u32) -> Self {
		Self {
			threshold: threshold.max(1),
			consecutive_unresolved: HashMap::new(),
		}
	}

	/// Record that a pair went unresolved this cycle; returns its streak.
	pub fn record_unresolved(&mut self, pair: PairKey) -> u32 {
		let streak = self.consecutive_unresolved.entry(pair).or_insert(0);
		*streak += 1;
		if *streak == self.threshold {
			warn!(%pair, cycles = *streak, "pair unresolved for consecutive cycles");
		}
		*streak
	}

	/// Record that a pair resolved this cycle, clearing any streak.
	pub fn record_resolved(&mut self, pair: &PairKey) {
		self.consecutive_unresolved.remove(pair);
	}

	pub fn is_flagged(&self, pair: &PairKey) -> bool {
		self.consecutive_unresolved
			.get(pair)
			.is_some_and(|streak| *streak >= self.threshold)
	}

	/// All currently flagged pairs, in key order.
	pub fn flagged(&self) -> Vec<PairKey> {
		let mut pairs: Vec<PairKey> = self
			.consecutive_unresolved
			.iter()
			.filter(|(_, streak)| **streak >= self.threshold)
			.map(|(pair, _)| *pair)
			.collect();
		pairs.sort();
		pairs
	}
}
