//! Watcher configuration.

use serde::Deserialize;
use std::time::Duration;
use watcher_types::StateLayer;

/// Default expiration-queue tick in milliseconds.
pub const DEFAULT_EXPIRATION_CHECKING_INTERVAL_MS: u64 = 50;
/// Default periodic full re-sweep period in milliseconds (one hour).
pub const DEFAULT_CLEANUP_JOB_INTERVAL_MS: u64 = 3_600_000;

/// Configuration for [`crate::OrderStateWatcher`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
	/// Upstream log-polling cadence. `None` keeps the transport default.
	pub event_polling_interval_ms: Option<u64>,
	/// Block tag passed to every chain read.
	pub state_layer: StateLayer,
	/// Expiration-queue tick.
	pub expiration_checking_interval_ms: u64,
	/// Safety margin subtracted from each order's expiration, so orders
	/// are reported expired slightly ahead of the deadline.
	pub expiration_margin_ms: u64,
	/// Periodic full re-sweep period.
	pub cleanup_job_interval_ms: u64,
}

impl Default for WatcherConfig {
	fn default() -> Self {
		Self {
			event_polling_interval_ms: None,
			state_layer: StateLayer::Latest,
			expiration_checking_interval_ms: DEFAULT_EXPIRATION_CHECKING_INTERVAL_MS,
			expiration_margin_ms: 0,
			cleanup_job_interval_ms: DEFAULT_CLEANUP_JOB_INTERVAL_MS,
		}
	}
}

impl WatcherConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_state_layer(mut self, layer: StateLayer) -> Self {
		self.state_layer = layer;
		self
	}

	pub fn with_event_polling_interval_ms(mut self, ms: u64) -> Self {
		self.event_polling_interval_ms = Some(ms);
		self
	}

	pub fn with_expiration_checking_interval_ms(mut self, ms: u64) -> Self {
		self.expiration_checking_interval_ms = ms;
		self
	}

	pub fn with_expiration_margin_ms(mut self, ms: u64) -> Self {
		self.expiration_margin_ms = ms;
		self
	}

	pub fn with_cleanup_job_interval_ms(mut self, ms: u64) -> Self {
		self.cleanup_job_interval_ms = ms;
		self
	}

	pub fn event_polling_interval(&self) -> Option<Duration> {
		self.event_polling_interval_ms.map(Duration::from_millis)
	}

	pub fn expiration_checking_interval(&self) -> Duration {
		Duration::from_millis(self.expiration_checking_interval_ms.max(1))
	}

	pub fn cleanup_job_interval(&self) -> Duration {
		Duration::from_millis(self.cleanup_job_interval_ms.max(1))
	}
}
