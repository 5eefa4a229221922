//! Derives an order's current validity from cache-backed chain reads.
//!
//! Pure with respect to the cache snapshot it observes: the same cache
//! contents always produce the same `OrderState`. Wall-clock expiry is
//! deliberately not checked here; the expiration queue owns it.

use crate::cache::LazyStateCache;
use std::sync::Arc;
use watcher_types::{
	Address, ExchangeContractErr, OrderHash, OrderRelevantState, OrderState, Result, SignedOrder,
	U256,
};

pub struct OrderStateEvaluator {
	cache: Arc<LazyStateCache>,
	fee_token: Address,
}

impl OrderStateEvaluator {
	pub fn new(cache: Arc<LazyStateCache>, fee_token: Address) -> Self {
		Self { cache, fee_token }
	}

	/// Evaluates `order` against the current cache contents, reading
	/// through to the chain for whatever is missing.
	pub async fn evaluate(&self, order: &SignedOrder, order_hash: OrderHash) -> Result<OrderState> {
		let maker_balance = self
			.cache
			.balance(order.maker_token_address, order.maker)
			.await?;
		let maker_proxy_allowance = self
			.cache
			.allowance(order.maker_token_address, order.maker)
			.await?;
		let maker_fee_balance = self.cache.balance(self.fee_token, order.maker).await?;
		let maker_fee_proxy_allowance =
			self.cache.allowance(self.fee_token, order.maker).await?;
		let filled_taker_token_amount = self.cache.filled_amount(order_hash).await?;
		let cancelled_taker_token_amount = self.cache.cancelled_amount(order_hash).await?;

		let invalid = |reason| OrderState::Invalid { order_hash, reason };

		let unavailable = filled_taker_token_amount.saturating_add(cancelled_taker_token_amount);
		if unavailable >= order.taker_token_amount {
			if !cancelled_taker_token_amount.is_zero() {
				return Ok(invalid(ExchangeContractErr::OrderCancelled));
			}
			return Ok(invalid(ExchangeContractErr::OrderRemainingFillAmountZero));
		}
		if maker_balance.is_zero() {
			return Ok(invalid(ExchangeContractErr::InsufficientMakerBalance));
		}
		if maker_proxy_allowance.is_zero() {
			return Ok(invalid(ExchangeContractErr::InsufficientMakerAllowance));
		}
		if !order.maker_fee.is_zero() {
			if maker_fee_balance.is_zero() {
				return Ok(invalid(ExchangeContractErr::InsufficientMakerFeeBalance));
			}
			if maker_fee_proxy_allowance.is_zero() {
				return Ok(invalid(ExchangeContractErr::InsufficientMakerFeeAllowance));
			}
		}

		let remaining_taker = order.taker_token_amount - unavailable;
		let remaining_maker = scale(
			remaining_taker,
			order.maker_token_amount,
			order.taker_token_amount,
		);

		let transferrable_maker = maker_balance.min(maker_proxy_allowance);
		let transferrable_fee = maker_fee_balance.min(maker_fee_proxy_allowance);
		// Fee owed if the whole remainder were filled, pro-rata.
		let required_fee = scale(order.maker_fee, remaining_taker, order.taker_token_amount);

		let remaining_fillable_maker = if order.maker_token_address == self.fee_token
			&& !order.maker_fee.is_zero()
		{
			// One pool covers both the trade amount and the fee: the
			// fillable amount x satisfies
			// x + x * required_fee / remaining_maker <= transferrable.
			let pooled = scale(
				transferrable_maker,
				remaining_maker,
				remaining_maker.saturating_add(required_fee),
			);
			pooled.min(remaining_maker)
		} else {
			let mut fillable = transferrable_maker.min(remaining_maker);
			if !required_fee.is_zero() && transferrable_fee < required_fee {
				// Fee shortfall caps the fill pro-rata.
				fillable = fillable.min(scale(remaining_maker, transferrable_fee, required_fee));
			}
			fillable
		};
		let remaining_fillable_taker = scale(
			remaining_fillable_maker,
			order.taker_token_amount,
			order.maker_token_amount,
		);

		Ok(OrderState::Valid(OrderRelevantState {
			order_hash,
			maker_balance,
			maker_proxy_allowance,
			maker_fee_balance,
			maker_fee_proxy_allowance,
			filled_taker_token_amount,
			cancelled_taker_token_amount,
			remaining_fillable_maker_token_amount: remaining_fillable_maker,
			remaining_fillable_taker_token_amount: remaining_fillable_taker,
		}))
	}
}

/// `amount * numerator / denominator` with integer truncation. Zero
/// denominators yield zero; a (practically unreachable) product
/// overflow saturates rather than panicking.
fn scale(amount: U256, numerator: U256, denominator: U256) -> U256 {
	if denominator.is_zero() {
		return U256::ZERO;
	}
	amount
		.checked_mul(numerator)
		.map(|product| product / denominator)
		.unwrap_or(U256::MAX)
}
