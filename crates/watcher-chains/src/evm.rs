//! Alloy-based EVM chain reader.
//!
//! Provides read access to exchange-relevant contract state over JSON-RPC
//! and an interval-driven `eth_getLogs` poller exposed as the watcher's
//! event stream. Contract calls are hand-encoded against the minimal ABI
//! surface the watcher needs; return data is decoded in place.

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockId, BlockNumberOrTag, Filter, Log, TransactionInput, TransactionRequest};
use alloy_primitives::Bytes;
use async_stream::stream;
use async_trait::async_trait;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use watcher_types::events::WATCHED_TOPICS;
use watcher_types::{
	Address, ChainError, ChainReader, EventStream, OrderHash, RawLog, Result, StateLayer, B256,
	U256,
};

/// Selector for `balanceOf(address)`.
const BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// Selector for `allowance(address,address)`.
const ALLOWANCE: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
/// Selector for `filled(bytes32)`.
const FILLED: [u8; 4] = [0x28, 0x8c, 0xdc, 0x91];
/// Selector for `cancelled(bytes32)`.
const CANCELLED: [u8; 4] = [0x2a, 0xc1, 0x26, 0x22];
/// Selector for `ZRX_TOKEN_CONTRACT()`.
const ZRX_TOKEN_CONTRACT: [u8; 4] = [0x3b, 0x30, 0xba, 0x59];
/// Selector for `TOKEN_TRANSFER_PROXY_CONTRACT()`.
const TOKEN_TRANSFER_PROXY_CONTRACT: [u8; 4] = [0xad, 0xd1, 0xcb, 0xc5];

/// Configuration for the EVM chain reader.
#[derive(Debug, Clone)]
pub struct EvmChainReaderConfig {
	/// Log polling cadence in milliseconds.
	pub poll_interval_ms: u64,
	/// Maximum block span per `eth_getLogs` request.
	pub log_page_size: u64,
}

impl Default for EvmChainReaderConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: 200,
			log_page_size: 1000,
		}
	}
}

impl EvmChainReaderConfig {
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

/// [`ChainReader`] implementation over an alloy HTTP provider.
///
/// The exchange's fee token and transfer proxy addresses are resolved
/// once at connection time; every state read afterwards is a single
/// `eth_call` at the requested block tag. Log streaming is forward-only
/// from the connection block.
pub struct EvmChainReader {
	provider: DynProvider,
	chain_id: u64,
	exchange: Address,
	proxy: Address,
	fee_token: Address,
	config: EvmChainReaderConfig,
}

impl EvmChainReader {
	/// Connects to `endpoint`, verifies it serves `chain_id`, and
	/// resolves the exchange's fee token and transfer proxy addresses.
	///
	/// # Errors
	///
	/// Returns an error if the endpoint is not a valid URL, the node
	/// reports a different chain id, or either resolution call fails.
	pub async fn connect(
		endpoint: &str,
		chain_id: u64,
		exchange: Address,
		config: EvmChainReaderConfig,
	) -> Result<Self> {
		let url = endpoint
			.parse()
			.map_err(|e| ChainError::Rpc(format!("invalid endpoint {}: {}", endpoint, e)))?;
		let provider = ProviderBuilder::new().connect_http(url).erased();

		let actual_chain_id = provider
			.get_chain_id()
			.await
			.map_err(|e| ChainError::Rpc(format!("failed to get chain id: {}", e)))?;
		if actual_chain_id != chain_id {
			return Err(ChainError::Rpc(format!(
				"chain id mismatch: expected {}, got {}",
				chain_id, actual_chain_id
			)));
		}

		let mut reader = Self {
			provider,
			chain_id,
			exchange,
			proxy: Address::ZERO,
			fee_token: Address::ZERO,
			config,
		};

		let fee_token = reader
			.call_address(exchange, ZRX_TOKEN_CONTRACT, StateLayer::Latest)
			.await?;
		let proxy = reader
			.call_address(exchange, TOKEN_TRANSFER_PROXY_CONTRACT, StateLayer::Latest)
			.await?;
		reader.fee_token = fee_token;
		reader.proxy = proxy;

		info!(
			"Connected to exchange {} (fee token {}, transfer proxy {})",
			exchange, fee_token, proxy
		);
		Ok(reader)
	}

	/// The exchange's token transfer proxy, the spender all allowance
	/// reads are performed against.
	pub fn transfer_proxy_address(&self) -> Address {
		self.proxy
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	async fn eth_call(&self, to: Address, data: Vec<u8>, layer: StateLayer) -> Result<Vec<u8>> {
		let tx = TransactionRequest::default()
			.to(to)
			.input(TransactionInput::new(Bytes::from(data)));
		let returned = self
			.provider
			.call(tx)
			.block(block_id(layer))
			.await
			.map_err(|e| ChainError::Rpc(format!("eth_call to {} failed: {}", to, e)))?;
		Ok(returned.to_vec())
	}

	async fn call_uint(&self, to: Address, data: Vec<u8>, layer: StateLayer) -> Result<U256> {
		let returned = self.eth_call(to, data, layer).await?;
		if returned.len() < 32 {
			return Err(ChainError::Decode(format!(
				"expected a 32-byte word from {}, got {} bytes",
				to,
				returned.len()
			)));
		}
		Ok(U256::from_be_slice(&returned[..32]))
	}

	async fn call_address(
		&self,
		to: Address,
		selector: [u8; 4],
		layer: StateLayer,
	) -> Result<Address> {
		let returned = self.eth_call(to, encode_call(selector, &[]), layer).await?;
		if returned.len() < 32 {
			return Err(ChainError::Decode(format!(
				"expected an address word from {}, got {} bytes",
				to,
				returned.len()
			)));
		}
		Ok(Address::from_slice(&returned[12..32]))
	}
}

#[async_trait]
impl ChainReader for EvmChainReader {
	async fn token_balance(
		&self,
		token: Address,
		owner: Address,
		layer: StateLayer,
	) -> Result<U256> {
		debug!("Reading balance of {} in {} at {}", owner, token, layer);
		let data = encode_call(BALANCE_OF, &[address_word(owner)]);
		self.call_uint(token, data, layer).await
	}

	async fn proxy_allowance(
		&self,
		token: Address,
		owner: Address,
		layer: StateLayer,
	) -> Result<U256> {
		debug!("Reading proxy allowance of {} in {} at {}", owner, token, layer);
		let data = encode_call(ALLOWANCE, &[address_word(owner), address_word(self.proxy)]);
		self.call_uint(token, data, layer).await
	}

	async fn filled_taker_amount(&self, order_hash: OrderHash, layer: StateLayer) -> Result<U256> {
		let data = encode_call(FILLED, &[order_hash.0]);
		self.call_uint(self.exchange, data, layer).await
	}

	async fn cancelled_taker_amount(
		&self,
		order_hash: OrderHash,
		layer: StateLayer,
	) -> Result<U256> {
		let data = encode_call(CANCELLED, &[order_hash.0]);
		self.call_uint(self.exchange, data, layer).await
	}

	fn fee_token_address(&self) -> Address {
		self.fee_token
	}

	async fn subscribe_logs(&self, poll_interval: Option<Duration>) -> Result<EventStream> {
		let provider = self.provider.clone();
		let poll = poll_interval.unwrap_or_else(|| self.config.poll_interval());
		let page = self.config.log_page_size.max(1);

		// Forward-only: start after the block we are at right now.
		let mut from_block = provider
			.get_block_number()
			.await
			.map_err(|e| ChainError::Rpc(format!("failed to get block number: {}", e)))?
			+ 1;

		info!("Streaming exchange logs forward from block {}", from_block);

		let stream = stream! {
			let mut ticker = interval(poll);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

			loop {
				ticker.tick().await;

				let current = match provider.get_block_number().await {
					Ok(n) => n,
					Err(e) => {
						warn!("Failed to get block number, will retry: {}", e);
						continue;
					}
				};

				while from_block <= current {
					let to_block = (from_block + page - 1).min(current);
					let filter = Filter::new()
						.event_signature(WATCHED_TOPICS.to_vec())
						.from_block(from_block)
						.to_block(to_block);

					match provider.get_logs(&filter).await {
						Ok(logs) => {
							debug!(
								"Fetched {} logs in blocks {}..={}",
								logs.len(),
								from_block,
								to_block
							);
							for log in logs {
								yield Ok(to_raw_log(log));
							}
						}
						Err(e) => {
							yield Err(ChainError::Rpc(format!(
								"eth_getLogs for blocks {}..={} failed: {}",
								from_block, to_block, e
							)));
						}
					}

					from_block = to_block + 1;
				}
			}
		};

		Ok(Box::pin(stream))
	}
}

fn block_id(layer: StateLayer) -> BlockId {
	let tag = match layer {
		StateLayer::Latest => BlockNumberOrTag::Latest,
		StateLayer::Safe => BlockNumberOrTag::Safe,
		StateLayer::Finalized => BlockNumberOrTag::Finalized,
		StateLayer::Pending => BlockNumberOrTag::Pending,
	};
	BlockId::Number(tag)
}

fn to_raw_log(log: Log) -> RawLog {
	RawLog {
		address: log.address(),
		topics: log.topics().to_vec(),
		data: log.data().data.to_vec(),
		block_number: log.block_number.unwrap_or_default(),
		transaction_hash: log.transaction_hash.unwrap_or(B256::ZERO),
		log_index: log.log_index.unwrap_or_default(),
	}
}

/// Encodes a call as `selector ++ words`.
fn encode_call(selector: [u8; 4], words: &[[u8; 32]]) -> Vec<u8> {
	let mut data = Vec::with_capacity(4 + words.len() * 32);
	data.extend_from_slice(&selector);
	for word in words {
		data.extend_from_slice(word);
	}
	data
}

/// Left-pads an address to a 32-byte argument word.
fn address_word(address: Address) -> [u8; 32] {
	let mut word = [0u8; 32];
	word[12..].copy_from_slice(address.as_slice());
	word
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	#[test]
	fn test_encode_balance_of() {
		let owner = address!("00000000000000000000000000000000000000aa");
		let data = encode_call(BALANCE_OF, &[address_word(owner)]);

		assert_eq!(data.len(), 36);
		assert_eq!(&data[..4], &BALANCE_OF);
		assert_eq!(&data[4..16], &[0u8; 12]);
		assert_eq!(&data[16..36], owner.as_slice());
	}

	#[test]
	fn test_encode_allowance_takes_two_words() {
		let owner = address!("00000000000000000000000000000000000000aa");
		let proxy = address!("00000000000000000000000000000000000000bb");
		let data = encode_call(ALLOWANCE, &[address_word(owner), address_word(proxy)]);

		assert_eq!(data.len(), 68);
		assert_eq!(&data[16..36], owner.as_slice());
		assert_eq!(&data[48..68], proxy.as_slice());
	}

	#[test]
	fn test_block_id_mapping() {
		assert_eq!(
			block_id(StateLayer::Finalized),
			BlockId::Number(BlockNumberOrTag::Finalized)
		);
		assert_eq!(
			block_id(StateLayer::Latest),
			BlockId::Number(BlockNumberOrTag::Latest)
		);
	}
}
