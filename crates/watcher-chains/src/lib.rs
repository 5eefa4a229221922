//! Chain reader implementations.
//!
//! Currently a single EVM implementation over an alloy HTTP provider.

mod evm;

pub use evm::{EvmChainReader, EvmChainReaderConfig};
