//! The watcher facade: order add/remove, single-subscriber lifecycle,
//! and the consumer task that serializes all event processing.
//!
//! While a subscriber is attached, one tokio task owns the log stream,
//! the expiration tick, and the periodic cleanup tick through a single
//! `select!` loop, so event dispatch, expiry firing, and cleanup sweeps
//! never interleave. Public operations on the watched set serialize
//! against the consumer through a mutex that is never held across an
//! await point, which keeps `unsubscribe` callable from inside a
//! subscriber callback.

use crate::cache::LazyStateCache;
use crate::config::WatcherConfig;
use crate::dispatcher::EventDispatcher;
use crate::emitter::{current_subscriber, OrderStateCallback, StateDiffEmitter, SubscriberSlot};
use crate::error::{SubscriptionError, ValidationError};
use crate::evaluator::OrderStateEvaluator;
use crate::expiration::ExpirationQueue;
use crate::index::DependencyIndex;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use watcher_types::{
	Address, ChainError, ChainReader, ContractEvent, ExchangeContractErr, OrderHash, OrderState,
	RawLog, Result, SignedOrder,
};

/// The watched-order data model. Every public operation mutates it
/// atomically under one lock acquisition.
pub(crate) struct WatchedState {
	/// Watched orders by hash.
	pub orders: HashMap<OrderHash, SignedOrder>,
	/// (maker, token) dependency index, kept in lockstep with `orders`.
	pub index: DependencyIndex,
	/// Last state delivered per order, for change suppression.
	pub memo: HashMap<OrderHash, OrderState>,
	/// Expiration deadlines for every watched order.
	pub expirations: ExpirationQueue,
}

impl WatchedState {
	pub(crate) fn new(expiration_margin_ms: u64) -> Self {
		Self {
			orders: HashMap::new(),
			index: DependencyIndex::new(),
			memo: HashMap::new(),
			expirations: ExpirationQueue::new(expiration_margin_ms),
		}
	}

	/// Removes an order from every container. Returns the order if it
	/// was watched.
	pub(crate) fn remove(&mut self, order_hash: OrderHash, fee_token: Address) -> Option<SignedOrder> {
		let order = self.orders.remove(&order_hash)?;
		self.memo.remove(&order_hash);
		self.index
			.remove(order.maker, order.maker_token_address, order_hash);
		if order.maker_token_address != fee_token {
			self.index.remove(order.maker, fee_token, order_hash);
		}
		self.expirations.remove(order_hash);
		Some(order)
	}
}

/// Watches signed orders for validity changes driven by chain events,
/// expiry, and a slow periodic re-sweep.
///
/// At most one subscriber at a time. The watched set survives
/// unsubscribe so a later subscribe resumes it; the state cache does
/// not.
pub struct OrderStateWatcher {
	reader: Arc<dyn ChainReader>,
	config: WatcherConfig,
	fee_token: Address,
	cache: Arc<LazyStateCache>,
	state: Arc<Mutex<WatchedState>>,
	subscriber: Arc<SubscriberSlot>,
	consumer: Mutex<Option<JoinHandle<()>>>,
}

impl OrderStateWatcher {
	pub fn new(reader: Arc<dyn ChainReader>, config: WatcherConfig) -> Self {
		let fee_token = reader.fee_token_address();
		let cache = Arc::new(LazyStateCache::new(reader.clone(), config.state_layer));
		let state = Arc::new(Mutex::new(WatchedState::new(config.expiration_margin_ms)));

		Self {
			reader,
			config,
			fee_token,
			cache,
			state,
			subscriber: Arc::new(Mutex::new(None)),
			consumer: Mutex::new(None),
		}
	}

	/// Starts watching an order. The order hash is recomputed and the
	/// signature verified against the maker before any state changes.
	/// Re-adding a watched order refreshes its index entries and
	/// expiration deadline.
	pub fn add_order(&self, order: SignedOrder) -> std::result::Result<OrderHash, ValidationError> {
		if order.maker_token_amount.is_zero() {
			return Err(ValidationError::ZeroMakerTokenAmount);
		}
		if order.taker_token_amount.is_zero() {
			return Err(ValidationError::ZeroTakerTokenAmount);
		}
		let order_hash = order.hash();
		let recovered = order.signature.recover(order_hash)?;
		if recovered != order.maker {
			return Err(ValidationError::SignatureMismatch {
				recovered,
				maker: order.maker,
			});
		}

		let mut state = self.state.lock().unwrap();
		state.expirations.enqueue(order_hash, order.expiration_ms());
		state
			.index
			.insert(order.maker, order.maker_token_address, order_hash);
		if order.maker_token_address != self.fee_token {
			state.index.insert(order.maker, self.fee_token, order_hash);
		}
		state.orders.insert(order_hash, order);
		drop(state);

		debug!("Watching order {}", order_hash);
		Ok(order_hash)
	}

	/// Stops watching an order. A no-op if the hash is not watched.
	pub fn remove_order(&self, order_hash: OrderHash) {
		let removed = self
			.state
			.lock()
			.unwrap()
			.remove(order_hash, self.fee_token);
		if removed.is_some() {
			debug!("Stopped watching order {}", order_hash);
		}
	}

	/// Attaches the subscriber and starts the consumer task.
	pub fn subscribe<F>(&self, callback: F) -> std::result::Result<(), SubscriptionError>
	where
		F: Fn(std::result::Result<OrderState, ChainError>) + Send + Sync + 'static,
	{
		{
			let mut slot = self.subscriber.lock().unwrap();
			if slot.is_some() {
				return Err(SubscriptionError::AlreadyPresent);
			}
			*slot = Some(Arc::new(callback) as OrderStateCallback);
		}

		let evaluator = OrderStateEvaluator::new(self.cache.clone(), self.fee_token);
		let consumer = Consumer {
			reader: self.reader.clone(),
			config: self.config.clone(),
			fee_token: self.fee_token,
			cache: self.cache.clone(),
			state: self.state.clone(),
			subscriber: self.subscriber.clone(),
			dispatcher: EventDispatcher::new(self.cache.clone()),
			emitter: StateDiffEmitter::new(evaluator, self.state.clone(), self.subscriber.clone()),
		};
		let handle = tokio::spawn(consumer.run());
		*self.consumer.lock().unwrap() = Some(handle);

		info!("Subscriber attached, watcher running");
		Ok(())
	}

	/// Detaches the subscriber, stops the consumer task, and discards
	/// the state cache. The watched set is retained for a later
	/// subscribe. Safe to call from inside a subscriber callback.
	pub fn unsubscribe(&self) -> std::result::Result<(), SubscriptionError> {
		if self.subscriber.lock().unwrap().take().is_none() {
			return Err(SubscriptionError::NotFound);
		}
		if let Some(handle) = self.consumer.lock().unwrap().take() {
			handle.abort();
		}
		self.cache.delete_all();

		info!("Subscriber detached, watcher idle");
		Ok(())
	}
}

/// The single task owning all event processing while subscribed.
struct Consumer {
	reader: Arc<dyn ChainReader>,
	config: WatcherConfig,
	fee_token: Address,
	cache: Arc<LazyStateCache>,
	state: Arc<Mutex<WatchedState>>,
	subscriber: Arc<SubscriberSlot>,
	dispatcher: EventDispatcher,
	emitter: StateDiffEmitter,
}

impl Consumer {
	async fn run(self) {
		let mut logs = match self
			.reader
			.subscribe_logs(self.config.event_polling_interval())
			.await
		{
			Ok(stream) => stream,
			Err(e) => return self.teardown(e),
		};

		let mut expiration_ticker = interval(self.config.expiration_checking_interval());
		expiration_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		// The first cleanup runs one full period in, not at subscribe
		// time; a tick that lands while a sweep is still running is
		// dropped.
		let cleanup_period = self.config.cleanup_job_interval();
		let mut cleanup_ticker = interval_at(Instant::now() + cleanup_period, cleanup_period);
		cleanup_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				next = logs.next() => match next {
					Some(Ok(log)) => {
						if let Err(e) = self.handle_log(log).await {
							return self.teardown(e);
						}
					}
					Some(Err(e)) => return self.teardown(e),
					None => return self.teardown(ChainError::StreamClosed),
				},
				_ = expiration_ticker.tick() => self.fire_expirations(),
				_ = cleanup_ticker.tick() => {
					if let Err(e) = self.cleanup_sweep().await {
						return self.teardown(e);
					}
				}
			}
		}
	}

	/// Decodes one log, applies its invalidations, and drains the
	/// resulting emissions before the next input is looked at.
	async fn handle_log(&self, log: RawLog) -> Result<()> {
		let event = ContractEvent::decode(&log);
		let candidates = {
			let state = self.state.lock().unwrap();
			self.dispatcher.dispatch(&event, &state.index, &state.orders)
		};
		if candidates.is_empty() {
			return Ok(());
		}
		debug!(
			"Event in block {} affects {} watched orders",
			log.block_number,
			candidates.len()
		);
		self.emitter.emit(candidates).await
	}

	/// Pops every due expiration, removing each order and delivering a
	/// synthetic expired state. Bypasses the change-suppression memo.
	fn fire_expirations(&self) {
		let now_ms = now_ms();
		loop {
			let Some(callback) = current_subscriber(&self.subscriber) else {
				return;
			};
			let expired = {
				let mut state = self.state.lock().unwrap();
				let Some(order_hash) = state.expirations.pop_expired(now_ms) else {
					return;
				};
				state.remove(order_hash, self.fee_token).map(|_| order_hash)
			};
			if let Some(order_hash) = expired {
				info!("Order {} expired, notifying subscriber", order_hash);
				callback(Ok(OrderState::Invalid {
					order_hash,
					reason: ExchangeContractErr::OrderFillExpired,
				}));
			}
		}
	}

	/// Invalidates every cache entry each watched order depends on and
	/// re-emits through the change-suppressing emitter. Recovers from
	/// any event the transport missed, on a slow cadence.
	async fn cleanup_sweep(&self) -> Result<()> {
		let snapshot: Vec<(OrderHash, SignedOrder)> = {
			let state = self.state.lock().unwrap();
			state
				.orders
				.iter()
				.map(|(order_hash, order)| (*order_hash, order.clone()))
				.collect()
		};
		if snapshot.is_empty() {
			return Ok(());
		}
		debug!("Cleanup sweep over {} watched orders", snapshot.len());

		for (order_hash, order) in &snapshot {
			self.cache.delete_filled(*order_hash);
			self.cache.delete_cancelled(*order_hash);
			self.cache
				.delete_balance(order.maker_token_address, order.maker);
			self.cache
				.delete_allowance(order.maker_token_address, order.maker);
			self.cache
				.delete_balance(order.taker_token_address, order.taker);
			self.cache
				.delete_allowance(order.taker_token_address, order.taker);
			if !order.maker_fee.is_zero() {
				self.cache.delete_balance(self.fee_token, order.maker);
				self.cache.delete_allowance(self.fee_token, order.maker);
			}
			if !order.taker_fee.is_zero() {
				self.cache.delete_balance(self.fee_token, order.taker);
				self.cache.delete_allowance(self.fee_token, order.taker);
			}
		}

		let candidates = snapshot
			.into_iter()
			.map(|(order_hash, _)| order_hash)
			.collect();
		self.emitter.emit(candidates).await
	}

	/// Fatal-error path: detach first, then report exactly once.
	fn teardown(&self, error: ChainError) {
		warn!("Subscription failed, detaching: {}", error);
		let callback = self.subscriber.lock().unwrap().take();
		self.cache.delete_all();
		if let Some(callback) = callback {
			callback(Err(error));
		}
	}
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis() as u64
}
