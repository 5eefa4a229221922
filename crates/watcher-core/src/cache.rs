//! Lazily populated cache of exchange-relevant chain state.
//!
//! Four stores keyed by (token, owner) or order hash. Reads go through
//! to the chain reader on miss and memoize the result; invalidation is
//! entry-level deletion, so the next read re-fetches. The cache never
//! retries; chain errors propagate to the caller unchanged.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;
use watcher_types::{Address, ChainReader, OrderHash, Result, StateLayer, U256};

pub struct LazyStateCache {
	reader: Arc<dyn ChainReader>,
	layer: StateLayer,
	balances: DashMap<(Address, Address), U256>,
	allowances: DashMap<(Address, Address), U256>,
	filled: DashMap<OrderHash, U256>,
	cancelled: DashMap<OrderHash, U256>,
}

impl LazyStateCache {
	pub fn new(reader: Arc<dyn ChainReader>, layer: StateLayer) -> Self {
		Self {
			reader,
			layer,
			balances: DashMap::new(),
			allowances: DashMap::new(),
			filled: DashMap::new(),
			cancelled: DashMap::new(),
		}
	}

	/// ERC-20 balance of `owner` in `token`, cached.
	pub async fn balance(&self, token: Address, owner: Address) -> Result<U256> {
		if let Some(cached) = self.balances.get(&(token, owner)) {
			return Ok(*cached);
		}
		let value = self.reader.token_balance(token, owner, self.layer).await?;
		self.balances.insert((token, owner), value);
		Ok(value)
	}

	/// Transfer-proxy allowance of `owner` in `token`, cached.
	pub async fn allowance(&self, token: Address, owner: Address) -> Result<U256> {
		if let Some(cached) = self.allowances.get(&(token, owner)) {
			return Ok(*cached);
		}
		let value = self.reader.proxy_allowance(token, owner, self.layer).await?;
		self.allowances.insert((token, owner), value);
		Ok(value)
	}

	/// Cumulative filled taker amount for `order_hash`, cached.
	pub async fn filled_amount(&self, order_hash: OrderHash) -> Result<U256> {
		if let Some(cached) = self.filled.get(&order_hash) {
			return Ok(*cached);
		}
		let value = self
			.reader
			.filled_taker_amount(order_hash, self.layer)
			.await?;
		self.filled.insert(order_hash, value);
		Ok(value)
	}

	/// Cumulative cancelled taker amount for `order_hash`, cached.
	pub async fn cancelled_amount(&self, order_hash: OrderHash) -> Result<U256> {
		if let Some(cached) = self.cancelled.get(&order_hash) {
			return Ok(*cached);
		}
		let value = self
			.reader
			.cancelled_taker_amount(order_hash, self.layer)
			.await?;
		self.cancelled.insert(order_hash, value);
		Ok(value)
	}

	pub fn delete_balance(&self, token: Address, owner: Address) {
		trace!("Invalidating balance of {} in {}", owner, token);
		self.balances.remove(&(token, owner));
	}

	pub fn delete_allowance(&self, token: Address, owner: Address) {
		trace!("Invalidating allowance of {} in {}", owner, token);
		self.allowances.remove(&(token, owner));
	}

	pub fn delete_filled(&self, order_hash: OrderHash) {
		self.filled.remove(&order_hash);
	}

	pub fn delete_cancelled(&self, order_hash: OrderHash) {
		self.cancelled.remove(&order_hash);
	}

	/// Discards every entry in all four stores.
	pub fn delete_all(&self) {
		self.balances.clear();
		self.allowances.clear();
		self.filled.clear();
		self.cancelled.clear();
	}

	/// True when all four stores are empty.
	pub fn is_empty(&self) -> bool {
		self.balances.is_empty()
			&& self.allowances.is_empty()
			&& self.filled.is_empty()
			&& self.cancelled.is_empty()
	}
}
