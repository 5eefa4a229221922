//! Maps decoded events to cache invalidations and affected orders.
//!
//! One total match over the event taxonomy: each event kind invalidates
//! exactly the cache entries it makes stale and selects the candidate
//! orders whose derived state may have changed. The candidates are then
//! handed to the emitter for re-evaluation.

use crate::cache::LazyStateCache;
use crate::index::DependencyIndex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use watcher_types::{ContractEvent, OrderHash, SignedOrder};

pub struct EventDispatcher {
	cache: Arc<LazyStateCache>,
}

impl EventDispatcher {
	pub fn new(cache: Arc<LazyStateCache>) -> Self {
		Self { cache }
	}

	/// Applies `event`'s cache invalidations and returns the orders to
	/// re-evaluate. Invalidation always completes before the caller can
	/// start evaluating.
	pub fn dispatch(
		&self,
		event: &ContractEvent,
		index: &DependencyIndex,
		watched: &HashMap<OrderHash, SignedOrder>,
	) -> Vec<OrderHash> {
		match event {
			ContractEvent::Approval { token, owner, .. } => {
				self.cache.delete_allowance(*token, *owner);
				index.lookup(*owner, *token)
			}
			ContractEvent::Transfer {
				token, from, to, ..
			} => {
				self.cache.delete_balance(*token, *from);
				self.cache.delete_balance(*token, *to);
				// Only the sender side fans out; the receiver side is
				// picked up by the periodic cleanup sweep.
				index.lookup(*from, *token)
			}
			ContractEvent::Deposit { token, owner, .. }
			| ContractEvent::Withdrawal { token, owner, .. } => {
				self.cache.delete_balance(*token, *owner);
				index.lookup(*owner, *token)
			}
			ContractEvent::Fill { order_hash, .. } => {
				self.cache.delete_filled(*order_hash);
				if watched.contains_key(order_hash) {
					vec![*order_hash]
				} else {
					Vec::new()
				}
			}
			ContractEvent::Cancel { order_hash, .. } => {
				self.cache.delete_cancelled(*order_hash);
				if watched.contains_key(order_hash) {
					vec![*order_hash]
				} else {
					Vec::new()
				}
			}
			ContractEvent::ExchangeError {
				exchange,
				error_id,
				order_hash,
			} => {
				debug!(
					"Ignoring exchange error {} for order {} on {}",
					error_id, order_hash, exchange
				);
				Vec::new()
			}
			ContractEvent::Unknown { address, topic0 } => {
				debug!("Ignoring unrecognized log from {} ({:?})", address, topic0);
				Vec::new()
			}
		}
	}
}
