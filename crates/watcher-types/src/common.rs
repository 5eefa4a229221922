//! Common types used throughout the watcher system.

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export the ethereum primitives the rest of the workspace builds on.
pub use alloy_primitives::{Address, B256, U256};

/// Canonical 32-byte identifier of an order.
pub type OrderHash = B256;

/// Unix timestamp in milliseconds.
pub type TimestampMs = u64;

/// Block tag at which every chain read is performed.
///
/// Fixed at construction of the cache and passed through on every
/// underlying read; the watcher has no other reorg handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateLayer {
	#[default]
	Latest,
	Safe,
	Finalized,
	Pending,
}

impl fmt::Display for StateLayer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Latest => write!(f, "latest"),
			Self::Safe => write!(f, "safe"),
			Self::Finalized => write!(f, "finalized"),
			Self::Pending => write!(f, "pending"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_state_layer_default_and_display() {
		assert_eq!(StateLayer::default(), StateLayer::Latest);
		assert_eq!(StateLayer::Finalized.to_string(), "finalized");
	}
}
