//! Dependency index: which watched orders depend on a (maker, token)
//! pair.
//!
//! Two-level map from maker address to token address to order hashes.
//! Kept in lockstep with the watched-order set by the facade; empty
//! inner sets and maps are pruned on removal so lookups stay honest.

use std::collections::{HashMap, HashSet};
use watcher_types::{Address, OrderHash};

#[derive(Debug, Default)]
pub struct DependencyIndex {
	by_maker: HashMap<Address, HashMap<Address, HashSet<OrderHash>>>,
}

impl DependencyIndex {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, maker: Address, token: Address, order_hash: OrderHash) {
		self.by_maker
			.entry(maker)
			.or_default()
			.entry(token)
			.or_default()
			.insert(order_hash);
	}

	pub fn remove(&mut self, maker: Address, token: Address, order_hash: OrderHash) {
		let Some(tokens) = self.by_maker.get_mut(&maker) else {
			return;
		};
		if let Some(orders) = tokens.get_mut(&token) {
			orders.remove(&order_hash);
			if orders.is_empty() {
				tokens.remove(&token);
			}
		}
		if tokens.is_empty() {
			self.by_maker.remove(&maker);
		}
	}

	/// Snapshot of the orders depending on `(maker, token)`.
	pub fn lookup(&self, maker: Address, token: Address) -> Vec<OrderHash> {
		self.by_maker
			.get(&maker)
			.and_then(|tokens| tokens.get(&token))
			.map(|orders| orders.iter().copied().collect())
			.unwrap_or_default()
	}

	pub fn contains(&self, maker: Address, token: Address, order_hash: OrderHash) -> bool {
		self.by_maker
			.get(&maker)
			.and_then(|tokens| tokens.get(&token))
			.is_some_and(|orders| orders.contains(&order_hash))
	}

	pub fn is_empty(&self) -> bool {
		self.by_maker.is_empty()
	}

	/// Every hash present anywhere in the index, deduplicated.
	pub fn all_order_hashes(&self) -> HashSet<OrderHash> {
		self.by_maker
			.values()
			.flat_map(|tokens| tokens.values())
			.flatten()
			.copied()
			.collect()
	}
}
