//! Chain read and event transport contracts.

use crate::common::{Address, OrderHash, StateLayer, U256};
use crate::errors::Result;
use crate::events::RawLog;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

/// Stream of raw log records (or transport failures) from the chain.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RawLog>> + Send>>;

/// Read-only access to the exchange-relevant chain state, plus the log
/// transport. Every read is performed at the given [`StateLayer`].
///
/// Implementations must not retry internally on behalf of the caller;
/// errors propagate unchanged so the watcher can apply its own policy.
#[async_trait]
pub trait ChainReader: Send + Sync {
	/// ERC-20 balance of `owner` in `token`.
	async fn token_balance(&self, token: Address, owner: Address, layer: StateLayer)
		-> Result<U256>;

	/// ERC-20 allowance granted by `owner` in `token` to the exchange's
	/// transfer proxy.
	async fn proxy_allowance(
		&self,
		token: Address,
		owner: Address,
		layer: StateLayer,
	) -> Result<U256>;

	/// Cumulative taker token amount filled for `order_hash`.
	async fn filled_taker_amount(&self, order_hash: OrderHash, layer: StateLayer) -> Result<U256>;

	/// Cumulative taker token amount cancelled for `order_hash`.
	async fn cancelled_taker_amount(
		&self,
		order_hash: OrderHash,
		layer: StateLayer,
	) -> Result<U256>;

	/// The exchange's fee token address.
	fn fee_token_address(&self) -> Address;

	/// Opens the log stream. Called once per subscription; the stream is
	/// dropped on unsubscribe. `poll_interval` overrides the transport's
	/// own polling cadence when given; `None` keeps the transport default.
	async fn subscribe_logs(&self, poll_interval: Option<Duration>) -> Result<EventStream>;
}
