//! Contract event definitions, topic hashes, and log decoding.
//!
//! Minimal ABI coverage for the events the watcher reacts to, using
//! precomputed keccak256 topic0 hashes to classify raw log records.

use crate::common::{Address, OrderHash, B256, U256};
use alloy_primitives::b256;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_TOPIC: B256 =
	b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// keccak256("Approval(address,address,uint256)")
pub const APPROVAL_TOPIC: B256 =
	b256!("8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925");

/// keccak256("Deposit(address,uint256)")
pub const DEPOSIT_TOPIC: B256 =
	b256!("e1fffcc4923d04b559f4d29a8bfc6cda04eb5b0d3c460751c2402c5c5cc9109c");

/// keccak256("Withdrawal(address,uint256)")
pub const WITHDRAWAL_TOPIC: B256 =
	b256!("7fcf532c15f0a6db0bd6d0e038bea71d30d808c7d98cb3bf7268a95bf5081b65");

/// keccak256("LogFill(address,address,address,address,address,uint256,uint256,uint256,uint256,bytes32,bytes32)")
pub const LOG_FILL_TOPIC: B256 =
	b256!("0d0b9391970d9a25552f37d436d2aae2925e2bfe1b2a923754bada030c498cb3");

/// keccak256("LogCancel(address,address,address,address,uint256,uint256,bytes32,bytes32)")
pub const LOG_CANCEL_TOPIC: B256 =
	b256!("67d66f160bc93d925d05dae1794c90d2d6d6688b29b84ff069398a9b04587131");

/// keccak256("LogError(uint8,bytes32)")
pub const LOG_ERROR_TOPIC: B256 =
	b256!("36d86c59e00bd73dc19ba3adfe068e4b64ac7e92be35546adeddf1b956a87e90");

/// All topic0 values the transport needs to subscribe to.
pub const WATCHED_TOPICS: [B256; 7] = [
	TRANSFER_TOPIC,
	APPROVAL_TOPIC,
	DEPOSIT_TOPIC,
	WITHDRAWAL_TOPIC,
	LOG_FILL_TOPIC,
	LOG_CANCEL_TOPIC,
	LOG_ERROR_TOPIC,
];

/// A raw, undecoded log record delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Vec<u8>,
	pub block_number: u64,
	pub transaction_hash: B256,
	pub log_index: u64,
}

/// A decoded contract event, one variant per log kind the watcher
/// reacts to. `address` fields carry the emitting contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
	/// ERC-20 `Approval(owner, spender, value)` on `token`.
	Approval {
		token: Address,
		owner: Address,
		spender: Address,
		value: U256,
	},
	/// ERC-20 `Transfer(from, to, value)` on `token`.
	Transfer {
		token: Address,
		from: Address,
		to: Address,
		value: U256,
	},
	/// Wrapped-ether `Deposit(owner, value)` on `token`.
	Deposit {
		token: Address,
		owner: Address,
		value: U256,
	},
	/// Wrapped-ether `Withdrawal(owner, value)` on `token`.
	Withdrawal {
		token: Address,
		owner: Address,
		value: U256,
	},
	/// Exchange `LogFill` for `order_hash`.
	Fill {
		exchange: Address,
		order_hash: OrderHash,
		filled_taker_token_amount: U256,
	},
	/// Exchange `LogCancel` for `order_hash`.
	Cancel {
		exchange: Address,
		order_hash: OrderHash,
		cancelled_taker_token_amount: U256,
	},
	/// Exchange `LogError`. Carried for logging only.
	ExchangeError {
		exchange: Address,
		error_id: u8,
		order_hash: OrderHash,
	},
	/// Anything unrecognized or structurally malformed.
	Unknown {
		address: Address,
		topic0: Option<B256>,
	},
}

impl ContractEvent {
	/// Decodes a raw log into an event. Unrecognized topics and
	/// malformed records decode to [`ContractEvent::Unknown`].
	pub fn decode(log: &RawLog) -> Self {
		let unknown = || Self::Unknown {
			address: log.address,
			topic0: log.topics.first().copied(),
		};
		let Some(topic0) = log.topics.first() else {
			return unknown();
		};

		match *topic0 {
			t if t == TRANSFER_TOPIC => {
				// Transfer(address indexed from, address indexed to, uint256 value)
				match (topic_address(log, 1), topic_address(log, 2), data_word(log, 0)) {
					(Some(from), Some(to), Some(value)) => Self::Transfer {
						token: log.address,
						from,
						to,
						value: U256::from_be_bytes(value),
					},
					_ => unknown(),
				}
			}
			t if t == APPROVAL_TOPIC => {
				// Approval(address indexed owner, address indexed spender, uint256 value)
				match (topic_address(log, 1), topic_address(log, 2), data_word(log, 0)) {
					(Some(owner), Some(spender), Some(value)) => Self::Approval {
						token: log.address,
						owner,
						spender,
						value: U256::from_be_bytes(value),
					},
					_ => unknown(),
				}
			}
			t if t == DEPOSIT_TOPIC => {
				// Deposit(address indexed dst, uint256 wad)
				match (topic_address(log, 1), data_word(log, 0)) {
					(Some(owner), Some(value)) => Self::Deposit {
						token: log.address,
						owner,
						value: U256::from_be_bytes(value),
					},
					_ => unknown(),
				}
			}
			t if t == WITHDRAWAL_TOPIC => {
				// Withdrawal(address indexed src, uint256 wad)
				match (topic_address(log, 1), data_word(log, 0)) {
					(Some(owner), Some(value)) => Self::Withdrawal {
						token: log.address,
						owner,
						value: U256::from_be_bytes(value),
					},
					_ => unknown(),
				}
			}
			t if t == LOG_FILL_TOPIC => {
				// Indexed: maker, feeRecipient, orderHash. Non-indexed
				// data words: taker, makerToken, takerToken,
				// filledMakerTokenAmount, filledTakerTokenAmount,
				// paidMakerFee, paidTakerFee, tokens.
				match (log.topics.get(3), data_word(log, 4)) {
					(Some(order_hash), Some(filled)) => Self::Fill {
						exchange: log.address,
						order_hash: *order_hash,
						filled_taker_token_amount: U256::from_be_bytes(filled),
					},
					_ => unknown(),
				}
			}
			t if t == LOG_CANCEL_TOPIC => {
				// Indexed: maker, feeRecipient, orderHash. Non-indexed
				// data words: makerToken, takerToken,
				// cancelledMakerTokenAmount, cancelledTakerTokenAmount,
				// tokens.
				match (log.topics.get(3), data_word(log, 3)) {
					(Some(order_hash), Some(cancelled)) => Self::Cancel {
						exchange: log.address,
						order_hash: *order_hash,
						cancelled_taker_token_amount: U256::from_be_bytes(cancelled),
					},
					_ => unknown(),
				}
			}
			t if t == LOG_ERROR_TOPIC => {
				// LogError(uint8 indexed errorId, bytes32 indexed orderHash)
				match (log.topics.get(1), log.topics.get(2)) {
					(Some(error_id), Some(order_hash)) => Self::ExchangeError {
						exchange: log.address,
						error_id: error_id.0[31],
						order_hash: *order_hash,
					},
					_ => unknown(),
				}
			}
			_ => unknown(),
		}
	}
}

/// Reads an indexed address out of topic `i` (last 20 bytes of the word).
fn topic_address(log: &RawLog, i: usize) -> Option<Address> {
	log.topics.get(i).map(|t| Address::from_slice(&t.0[12..]))
}

/// Reads the `i`-th 32-byte word of the data segment.
fn data_word(log: &RawLog, i: usize) -> Option<[u8; 32]> {
	log.data
		.get(i * 32..(i + 1) * 32)
		.and_then(|s| s.try_into().ok())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;

	fn topic_for(addr: Address) -> B256 {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		B256::from(word)
	}

	fn raw(address: Address, topics: Vec<B256>, data: Vec<u8>) -> RawLog {
		RawLog {
			address,
			topics,
			data,
			block_number: 1,
			transaction_hash: B256::ZERO,
			log_index: 0,
		}
	}

	#[test]
	fn test_decode_transfer() {
		let token = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
		let from = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
		let to = address!("cccccccccccccccccccccccccccccccccccccccc");
		let value = U256::from(500u64);

		let log = raw(
			token,
			vec![TRANSFER_TOPIC, topic_for(from), topic_for(to)],
			value.to_be_bytes::<32>().to_vec(),
		);

		assert_eq!(
			ContractEvent::decode(&log),
			ContractEvent::Transfer {
				token,
				from,
				to,
				value
			}
		);
	}

	#[test]
	fn test_decode_approval() {
		let token = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
		let owner = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
		let spender = address!("dddddddddddddddddddddddddddddddddddddddd");

		let log = raw(
			token,
			vec![APPROVAL_TOPIC, topic_for(owner), topic_for(spender)],
			U256::ZERO.to_be_bytes::<32>().to_vec(),
		);

		assert_eq!(
			ContractEvent::decode(&log),
			ContractEvent::Approval {
				token,
				owner,
				spender,
				value: U256::ZERO
			}
		);
	}

	#[test]
	fn test_decode_fill_reads_order_hash_from_its_indexed_topic() {
		let exchange = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
		let maker = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
		let fee_recipient = address!("cccccccccccccccccccccccccccccccccccccccc");
		let order_hash = B256::repeat_byte(9);
		let filled = U256::from(10u64);

		// Eight non-indexed words: taker, makerToken, takerToken,
		// filledMakerTokenAmount, filledTakerTokenAmount,
		// paidMakerFee, paidTakerFee, tokens.
		let mut data = vec![0u8; 8 * 32];
		data[3 * 32..4 * 32].copy_from_slice(&U256::from(5u64).to_be_bytes::<32>());
		data[4 * 32..5 * 32].copy_from_slice(&filled.to_be_bytes::<32>());
		data[7 * 32..8 * 32].copy_from_slice(B256::repeat_byte(0xab).as_slice());

		let log = raw(
			exchange,
			vec![
				LOG_FILL_TOPIC,
				topic_for(maker),
				topic_for(fee_recipient),
				order_hash,
			],
			data,
		);
		assert_eq!(
			ContractEvent::decode(&log),
			ContractEvent::Fill {
				exchange,
				order_hash,
				filled_taker_token_amount: filled
			}
		);
	}

	#[test]
	fn test_decode_fill_without_indexed_topics_is_unknown() {
		let exchange = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
		let log = raw(exchange, vec![LOG_FILL_TOPIC], vec![0u8; 8 * 32]);
		assert!(matches!(
			ContractEvent::decode(&log),
			ContractEvent::Unknown { .. }
		));
	}

	#[test]
	fn test_decode_cancel() {
		let exchange = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");
		let maker = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
		let fee_recipient = address!("cccccccccccccccccccccccccccccccccccccccc");
		let order_hash = B256::repeat_byte(3);
		let cancelled = U256::from(7u64);

		// Five non-indexed words: makerToken, takerToken,
		// cancelledMakerTokenAmount, cancelledTakerTokenAmount, tokens.
		let mut data = vec![0u8; 5 * 32];
		data[2 * 32..3 * 32].copy_from_slice(&U256::from(4u64).to_be_bytes::<32>());
		data[3 * 32..4 * 32].copy_from_slice(&cancelled.to_be_bytes::<32>());
		data[4 * 32..5 * 32].copy_from_slice(B256::repeat_byte(0xab).as_slice());

		let log = raw(
			exchange,
			vec![
				LOG_CANCEL_TOPIC,
				topic_for(maker),
				topic_for(fee_recipient),
				order_hash,
			],
			data,
		);
		assert_eq!(
			ContractEvent::decode(&log),
			ContractEvent::Cancel {
				exchange,
				order_hash,
				cancelled_taker_token_amount: cancelled
			}
		);
	}

	#[test]
	fn test_decode_unknown_and_malformed() {
		let addr = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

		// Unrecognized topic0.
		let log = raw(addr, vec![B256::repeat_byte(0xfe)], vec![]);
		assert!(matches!(
			ContractEvent::decode(&log),
			ContractEvent::Unknown { .. }
		));

		// No topics at all.
		let log = raw(addr, vec![], vec![]);
		assert!(matches!(
			ContractEvent::decode(&log),
			ContractEvent::Unknown { .. }
		));

		// Transfer missing its data word.
		let log = raw(
			addr,
			vec![TRANSFER_TOPIC, topic_for(addr), topic_for(addr)],
			vec![0u8; 5],
		);
		assert!(matches!(
			ContractEvent::decode(&log),
			ContractEvent::Unknown { .. }
		));
	}
}
