//! Time-ordered queue of order expirations.
//!
//! Min-heap keyed by expiration timestamp with O(log n) keyed removal,
//! plus a safety margin so orders can be reported expired slightly
//! ahead of their actual deadline. The queue is passive; the watcher's
//! consumer task polls it on its expiration tick.

use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use tracing::debug;
use watcher_types::{OrderHash, TimestampMs};

pub struct ExpirationQueue {
	/// Min-heap: lower expiration pops first.
	queue: PriorityQueue<OrderHash, Reverse<TimestampMs>>,
	safety_margin_ms: u64,
}

impl ExpirationQueue {
	pub fn new(safety_margin_ms: u64) -> Self {
		Self {
			queue: PriorityQueue::new(),
			safety_margin_ms,
		}
	}

	/// Enrolls an order. Re-adding an existing hash replaces its prior
	/// expiration timestamp.
	pub fn enqueue(&mut self, order_hash: OrderHash, expiration_ms: TimestampMs) {
		self.queue.push(order_hash, Reverse(expiration_ms));
	}

	/// Removes an order. Returns whether it was enrolled.
	pub fn remove(&mut self, order_hash: OrderHash) -> bool {
		self.queue.remove(&order_hash).is_some()
	}

	/// Pops the next order whose expiration (less the safety margin)
	/// has been reached at `now_ms`, in chronological order. `None`
	/// when nothing further is due.
	pub fn pop_expired(&mut self, now_ms: TimestampMs) -> Option<OrderHash> {
		let Some((_, Reverse(expiration_ms))) = self.queue.peek() else {
			return None;
		};
		if expiration_ms.saturating_sub(self.safety_margin_ms) > now_ms {
			return None;
		}
		let (order_hash, Reverse(expiration_ms)) = self.queue.pop()?;
		debug!(
			"Order {} expired (deadline {} ms, now {} ms)",
			order_hash, expiration_ms, now_ms
		);
		Some(order_hash)
	}

	pub fn contains(&self, order_hash: OrderHash) -> bool {
		self.queue.get(&order_hash).is_some()
	}

	/// The enrolled expiration for an order, if any.
	pub fn expiration_of(&self, order_hash: OrderHash) -> Option<TimestampMs> {
		self.queue
			.get(&order_hash)
			.map(|(_, Reverse(expiration_ms))| *expiration_ms)
	}

	pub fn len(&self) -> usize {
		self.queue.len()
	}

	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}
}
