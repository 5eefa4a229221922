//! Reactive engine that watches a set of signed off-chain orders backed
//! by on-chain state and notifies a subscriber whenever an order's
//! validity or fillability may have changed.
//!
//! Flow: decoded chain events enter the dispatcher, which invalidates
//! the lazy state cache and looks up dependent orders in the index; the
//! emitter then re-evaluates those orders against the cache and invokes
//! the subscriber only when the derived state actually changed. Expiry
//! is tracked separately in a time-ordered queue, and a slow periodic
//! sweep re-reads everything to recover from missed events.

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod evaluator;
pub mod expiration;
pub mod index;
pub mod watcher;

pub use cache::LazyStateCache;
pub use config::WatcherConfig;
pub use emitter::OrderStateCallback;
pub use error::{SubscriptionError, ValidationError};
pub use watcher::OrderStateWatcher;
