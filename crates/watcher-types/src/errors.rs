//! Error types shared across the watcher system.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

/// Errors surfaced by chain reads and the upstream log transport.
///
/// Domain-level order invalidity is never an error; it travels as the
/// `Invalid` variant of `OrderState`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
	#[error("rpc request failed: {0}")]
	Rpc(String),

	#[error("contract returned malformed data: {0}")]
	Decode(String),

	#[error("event stream failed: {0}")]
	Stream(String),

	#[error("event stream closed")]
	StreamClosed,
}
