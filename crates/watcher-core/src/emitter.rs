//! Change-suppressed delivery of order states to the subscriber.
//!
//! For each candidate order the emitter re-evaluates the current state
//! through the cache, compares it structurally against the last state
//! it delivered, and invokes the subscriber only on an actual change.

use crate::evaluator::OrderStateEvaluator;
use crate::watcher::WatchedState;
use std::sync::{Arc, Mutex};
use tracing::debug;
use watcher_types::{ChainError, OrderHash, OrderState, Result};

/// Subscriber callback. Every invocation carries exactly one of a fresh
/// order state or a fatal error; after an error the watcher is already
/// detached.
pub type OrderStateCallback =
	Arc<dyn Fn(std::result::Result<OrderState, ChainError>) + Send + Sync>;

/// Slot holding the current subscriber, if any.
pub(crate) type SubscriberSlot = Mutex<Option<OrderStateCallback>>;

pub(crate) fn current_subscriber(slot: &SubscriberSlot) -> Option<OrderStateCallback> {
	slot.lock().unwrap().clone()
}

pub(crate) struct StateDiffEmitter {
	evaluator: OrderStateEvaluator,
	state: Arc<Mutex<WatchedState>>,
	subscriber: Arc<SubscriberSlot>,
}

impl StateDiffEmitter {
	pub(crate) fn new(
		evaluator: OrderStateEvaluator,
		state: Arc<Mutex<WatchedState>>,
		subscriber: Arc<SubscriberSlot>,
	) -> Self {
		Self {
			evaluator,
			state,
			subscriber,
		}
	}

	/// Re-evaluates each candidate in input order. Orders that left the
	/// watched set since dispatch are skipped silently; the whole batch
	/// is dropped once the subscriber detaches. Chain errors abort the
	/// batch and propagate to the caller.
	pub(crate) async fn emit(&self, candidates: Vec<OrderHash>) -> Result<()> {
		for order_hash in candidates {
			if current_subscriber(&self.subscriber).is_none() {
				debug!("Subscriber detached, dropping remaining candidates");
				return Ok(());
			}

			let order = self.state.lock().unwrap().orders.get(&order_hash).cloned();
			let Some(order) = order else {
				continue;
			};

			let new_state = self.evaluator.evaluate(&order, order_hash).await?;

			let changed = {
				let mut state = self.state.lock().unwrap();
				if !state.orders.contains_key(&order_hash) {
					// Removed while we were reading the chain.
					false
				} else if state.memo.get(&order_hash) == Some(&new_state) {
					false
				} else {
					state.memo.insert(order_hash, new_state.clone());
					true
				}
			};
			if !changed {
				continue;
			}

			let Some(callback) = current_subscriber(&self.subscriber) else {
				return Ok(());
			};
			debug!("Order {} changed state, notifying subscriber", order_hash);
			callback(Ok(new_state));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::LazyStateCache;
	use crate::watcher::WatchedState;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;
	use watcher_types::{
		Address, ChainReader, ECSignature, EventStream, SignedOrder, StateLayer, B256, U256,
	};

	struct FundedReader;

	#[async_trait]
	impl ChainReader for FundedReader {
		async fn token_balance(
			&self,
			_token: Address,
			_owner: Address,
			_layer: StateLayer,
		) -> Result<U256> {
			Ok(U256::from(1_000u64))
		}

		async fn proxy_allowance(
			&self,
			_token: Address,
			_owner: Address,
			_layer: StateLayer,
		) -> Result<U256> {
			Ok(U256::from(1_000u64))
		}

		async fn filled_taker_amount(
			&self,
			_order_hash: OrderHash,
			_layer: StateLayer,
		) -> Result<U256> {
			Ok(U256::ZERO)
		}

		async fn cancelled_taker_amount(
			&self,
			_order_hash: OrderHash,
			_layer: StateLayer,
		) -> Result<U256> {
			Ok(U256::ZERO)
		}

		fn fee_token_address(&self) -> Address {
			Address::repeat_byte(0xfe)
		}

		async fn subscribe_logs(&self, _poll_interval: Option<Duration>) -> Result<EventStream> {
			Ok(Box::pin(futures::stream::pending()))
		}
	}

	fn order() -> SignedOrder {
		SignedOrder {
			exchange_contract_address: Address::repeat_byte(0xee),
			maker: Address::repeat_byte(1),
			taker: Address::ZERO,
			maker_token_address: Address::repeat_byte(2),
			taker_token_address: Address::repeat_byte(3),
			fee_recipient: Address::ZERO,
			maker_token_amount: U256::from(100u64),
			taker_token_amount: U256::from(200u64),
			maker_fee: U256::ZERO,
			taker_fee: U256::ZERO,
			expiration_unix_timestamp_sec: U256::from(1_900_000_000u64),
			salt: U256::ZERO,
			signature: ECSignature {
				v: 27,
				r: B256::ZERO,
				s: B256::ZERO,
			},
		}
	}

	fn fixture(
		counter: Arc<AtomicUsize>,
	) -> (Arc<Mutex<WatchedState>>, Arc<SubscriberSlot>, StateDiffEmitter) {
		let cache = Arc::new(LazyStateCache::new(Arc::new(FundedReader), StateLayer::Latest));
		let evaluator =
			OrderStateEvaluator::new(cache, Address::repeat_byte(0xfe));
		let state = Arc::new(Mutex::new(WatchedState::new(0)));
		let callback: OrderStateCallback = Arc::new(move |_result| {
			counter.fetch_add(1, Ordering::SeqCst);
		});
		let subscriber: Arc<SubscriberSlot> = Arc::new(Mutex::new(Some(callback)));
		let emitter = StateDiffEmitter::new(evaluator, state.clone(), subscriber.clone());
		(state, subscriber, emitter)
	}

	#[tokio::test]
	async fn test_unchanged_state_is_suppressed() {
		let deliveries = Arc::new(AtomicUsize::new(0));
		let (state, _, emitter) = fixture(deliveries.clone());

		let order = order();
		let hash = order.hash();
		state.lock().unwrap().orders.insert(hash, order);

		emitter.emit(vec![hash]).await.unwrap();
		emitter.emit(vec![hash]).await.unwrap();
		assert_eq!(deliveries.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_unwatched_candidates_are_skipped() {
		let deliveries = Arc::new(AtomicUsize::new(0));
		let (_, _, emitter) = fixture(deliveries.clone());

		emitter.emit(vec![B256::repeat_byte(1)]).await.unwrap();
		assert_eq!(deliveries.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_detached_subscriber_stops_the_batch() {
		let deliveries = Arc::new(AtomicUsize::new(0));
		let (state, subscriber, emitter) = fixture(deliveries.clone());

		let order = order();
		let hash = order.hash();
		state.lock().unwrap().orders.insert(hash, order);
		subscriber.lock().unwrap().take();

		emitter.emit(vec![hash]).await.unwrap();
		assert_eq!(deliveries.load(Ordering::SeqCst), 0);
	}
}
