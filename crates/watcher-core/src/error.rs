//! Error types for the watcher core.

use thiserror::Error;
use watcher_types::order::SignatureError;
use watcher_types::Address;

/// Synchronous rejections from `add_order`. These never reach the
/// subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	#[error("maker token amount must be non-zero")]
	ZeroMakerTokenAmount,

	#[error("taker token amount must be non-zero")]
	ZeroTakerTokenAmount,

	#[error(transparent)]
	Signature(#[from] SignatureError),

	#[error("signature recovers to {recovered}, order maker is {maker}")]
	SignatureMismatch { recovered: Address, maker: Address },
}

/// Subscription state machine violations, thrown synchronously from
/// `subscribe` / `unsubscribe`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionError {
	#[error("a subscriber is already attached")]
	AlreadyPresent,

	#[error("no subscriber is attached")]
	NotFound,
}
