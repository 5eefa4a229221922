//! Signed order data model, canonical hashing, and signature recovery.

use crate::common::{Address, OrderHash, B256, U256};
use alloy_primitives::{eip191_hash_message, keccak256, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An ECDSA signature in the `{v, r, s}` form produced by `eth_sign`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ECSignature {
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

/// Failures while recovering the signer of an [`ECSignature`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
	#[error("unsupported recovery byte {0}, expected 27 or 28")]
	UnsupportedRecoveryId(u8),

	#[error("signature does not recover to any address")]
	Unrecoverable,
}

impl ECSignature {
	/// Recovers the address that signed `digest` through the EIP-191
	/// personal-message scheme (the digest is prefixed and re-hashed
	/// before recovery, matching `eth_sign`).
	pub fn recover(&self, digest: B256) -> Result<Address, SignatureError> {
		let parity = match self.v {
			27 => false,
			28 => true,
			v => return Err(SignatureError::UnsupportedRecoveryId(v)),
		};
		let signature = Signature::new(
			U256::from_be_bytes(self.r.0),
			U256::from_be_bytes(self.s.0),
			parity,
		);
		let message_hash = eip191_hash_message(digest);
		signature
			.recover_address_from_prehash(&message_hash)
			.map_err(|_| SignatureError::Unrecoverable)
	}
}

/// An off-chain signed offer to trade a maker token amount for a taker
/// token amount by an expiration deadline.
///
/// Fees, when non-zero, are paid in the exchange's fee token, which is
/// why watched orders also depend on the fee token's balance and
/// allowance of their maker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedOrder {
	pub exchange_contract_address: Address,
	pub maker: Address,
	pub taker: Address,
	pub maker_token_address: Address,
	pub taker_token_address: Address,
	pub fee_recipient: Address,
	pub maker_token_amount: U256,
	pub taker_token_amount: U256,
	pub maker_fee: U256,
	pub taker_fee: U256,
	pub expiration_unix_timestamp_sec: U256,
	pub salt: U256,
	pub signature: ECSignature,
}

impl SignedOrder {
	/// Computes the canonical order hash: keccak256 over the tightly
	/// packed order fields (addresses as 20 bytes, amounts as 32-byte
	/// big-endian words).
	pub fn hash(&self) -> OrderHash {
		let mut packed = Vec::with_capacity(6 * 20 + 6 * 32);
		packed.extend_from_slice(self.exchange_contract_address.as_slice());
		packed.extend_from_slice(self.maker.as_slice());
		packed.extend_from_slice(self.taker.as_slice());
		packed.extend_from_slice(self.maker_token_address.as_slice());
		packed.extend_from_slice(self.taker_token_address.as_slice());
		packed.extend_from_slice(self.fee_recipient.as_slice());
		packed.extend_from_slice(&self.maker_token_amount.to_be_bytes::<32>());
		packed.extend_from_slice(&self.taker_token_amount.to_be_bytes::<32>());
		packed.extend_from_slice(&self.maker_fee.to_be_bytes::<32>());
		packed.extend_from_slice(&self.taker_fee.to_be_bytes::<32>());
		packed.extend_from_slice(&self.expiration_unix_timestamp_sec.to_be_bytes::<32>());
		packed.extend_from_slice(&self.salt.to_be_bytes::<32>());
		keccak256(&packed)
	}

	/// The expiration deadline in milliseconds, saturating on overflow.
	pub fn expiration_ms(&self) -> u64 {
		let secs: u64 = self
			.expiration_unix_timestamp_sec
			.try_into()
			.unwrap_or(u64::MAX);
		secs.saturating_mul(1000)
	}
}

/// Reasons an order is unfillable, as classified by the evaluator or the
/// expiration path. These are data, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeContractErr {
	OrderFillExpired,
	OrderCancelled,
	OrderRemainingFillAmountZero,
	InsufficientMakerBalance,
	InsufficientMakerAllowance,
	InsufficientMakerFeeBalance,
	InsufficientMakerFeeAllowance,
}

impl fmt::Display for ExchangeContractErr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::OrderFillExpired => "order fill expired",
			Self::OrderCancelled => "order cancelled",
			Self::OrderRemainingFillAmountZero => "order remaining fill amount zero",
			Self::InsufficientMakerBalance => "insufficient maker balance",
			Self::InsufficientMakerAllowance => "insufficient maker allowance",
			Self::InsufficientMakerFeeBalance => "insufficient maker fee balance",
			Self::InsufficientMakerFeeAllowance => "insufficient maker fee allowance",
		};
		write!(f, "{}", name)
	}
}

/// The on-chain reads an order's validity was derived from, plus the
/// remaining fillable amounts those reads imply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRelevantState {
	pub order_hash: OrderHash,
	pub maker_balance: U256,
	pub maker_proxy_allowance: U256,
	pub maker_fee_balance: U256,
	pub maker_fee_proxy_allowance: U256,
	pub filled_taker_token_amount: U256,
	pub cancelled_taker_token_amount: U256,
	pub remaining_fillable_maker_token_amount: U256,
	pub remaining_fillable_taker_token_amount: U256,
}

/// The derived validity of a watched order. Compared structurally by the
/// emitter to suppress callbacks when nothing actually changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
	Valid(OrderRelevantState),
	Invalid {
		order_hash: OrderHash,
		reason: ExchangeContractErr,
	},
}

impl OrderState {
	pub fn order_hash(&self) -> OrderHash {
		match self {
			Self::Valid(state) => state.order_hash,
			Self::Invalid { order_hash, .. } => *order_hash,
		}
	}

	pub fn is_valid(&self) -> bool {
		matches!(self, Self::Valid(_))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;

	fn sample_order() -> SignedOrder {
		SignedOrder {
			exchange_contract_address: address!("1111111111111111111111111111111111111111"),
			maker: address!("2222222222222222222222222222222222222222"),
			taker: Address::ZERO,
			maker_token_address: address!("3333333333333333333333333333333333333333"),
			taker_token_address: address!("4444444444444444444444444444444444444444"),
			fee_recipient: address!("5555555555555555555555555555555555555555"),
			maker_token_amount: U256::from(1_000u64),
			taker_token_amount: U256::from(2_000u64),
			maker_fee: U256::ZERO,
			taker_fee: U256::ZERO,
			expiration_unix_timestamp_sec: U256::from(1_900_000_000u64),
			salt: U256::from(42u64),
			signature: ECSignature {
				v: 27,
				r: B256::ZERO,
				s: B256::ZERO,
			},
		}
	}

	#[test]
	fn test_hash_is_deterministic_and_field_sensitive() {
		let order = sample_order();
		assert_eq!(order.hash(), order.hash());

		let mut other = order.clone();
		other.salt = U256::from(43u64);
		assert_ne!(order.hash(), other.hash());

		// The signature is not part of the hash preimage.
		let mut resigned = order.clone();
		resigned.signature.v = 28;
		assert_eq!(order.hash(), resigned.hash());
	}

	#[test]
	fn test_expiration_ms() {
		let mut order = sample_order();
		order.expiration_unix_timestamp_sec = U256::from(1_700_000_000u64);
		assert_eq!(order.expiration_ms(), 1_700_000_000_000);

		order.expiration_unix_timestamp_sec = U256::MAX;
		assert_eq!(order.expiration_ms(), u64::MAX);
	}

	#[test]
	fn test_signature_round_trip() {
		let signer = PrivateKeySigner::random();
		let mut order = sample_order();
		order.maker = signer.address();

		let digest = order.hash();
		let signature = signer.sign_message_sync(digest.as_slice()).unwrap();
		order.signature = ECSignature {
			v: 27 + signature.v() as u8,
			r: B256::from(signature.r().to_be_bytes::<32>()),
			s: B256::from(signature.s().to_be_bytes::<32>()),
		};

		let recovered = order.signature.recover(digest).unwrap();
		assert_eq!(recovered, order.maker);
	}

	#[test]
	fn test_signature_bad_recovery_byte() {
		let signature = ECSignature {
			v: 3,
			r: B256::ZERO,
			s: B256::ZERO,
		};
		assert_eq!(
			signature.recover(B256::ZERO),
			Err(SignatureError::UnsupportedRecoveryId(3))
		);
	}

	#[test]
	fn test_order_state_accessors() {
		let hash = B256::repeat_byte(7);
		let state = OrderState::Invalid {
			order_hash: hash,
			reason: ExchangeContractErr::OrderCancelled,
		};
		assert_eq!(state.order_hash(), hash);
		assert!(!state.is_valid());
	}
}
