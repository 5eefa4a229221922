//! Shared types for the order watcher system.

pub mod chains;
pub mod common;
pub mod errors;
pub mod events;
pub mod order;

pub use chains::{ChainReader, EventStream};
pub use common::{Address, OrderHash, StateLayer, TimestampMs, B256, U256};
pub use errors::{ChainError, Result};
pub use events::{ContractEvent, RawLog};
pub use order::{ECSignature, ExchangeContractErr, OrderRelevantState, OrderState, SignedOrder};
