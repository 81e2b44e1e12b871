//! Escrow Ledger.
//!
//! Tracks the value the board holds on behalf of posted queries. The reward
//! of each query lives in its stored request; the ledger keeps the running
//! total so it can be audited against the store at any time.
//!
//! Fee estimation is delegated to an injected [`PricingPolicy`].

use serde::{Deserialize, Serialize};
use wrb_types::{Amount, QueryId, QueryStatus, Request};

use crate::store::QueryStore;
use crate::{BoardError, Result};

/// Minimum-fee policy of a deployment.
pub trait PricingPolicy {
    /// Minimum reward for a query whose result is at most `result_size` bytes.
    fn base_fee(&self, gas_price: u128, result_size: u16) -> Amount;

    /// Extra fee covering a callback capped at `callback_gas_limit`.
    fn callback_fee(&self, gas_price: u128, callback_gas_limit: u64) -> Amount;

    /// Minimum reward for a query delivered through a callback.
    fn base_fee_with_callback(
        &self,
        gas_price: u128,
        result_size: u16,
        callback_gas_limit: u64,
    ) -> Amount {
        self.base_fee(gas_price, result_size)
            .saturating_add(self.callback_fee(gas_price, callback_gas_limit))
    }

    /// Gas a reporter spends to deliver `request`.
    fn report_gas(&self, request: &Request) -> u64;
}

/// Gas-based pricing: fees are the gas a report costs times the gas price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPricing {
    /// Fixed gas of a report transaction.
    #[serde(default = "default_report_base_gas")]
    pub report_base_gas: u64,
    /// Gas per stored result byte.
    #[serde(default = "default_report_gas_per_result_byte")]
    pub report_gas_per_result_byte: u64,
    /// Fixed gas of dispatching a callback, on top of its own limit.
    #[serde(default = "default_callback_base_gas")]
    pub callback_base_gas: u64,
}

fn default_report_base_gas() -> u64 {
    85_000
}

fn default_report_gas_per_result_byte() -> u64 {
    100
}

fn default_callback_base_gas() -> u64 {
    35_000
}

impl Default for GasPricing {
    fn default() -> Self {
        Self {
            report_base_gas: default_report_base_gas(),
            report_gas_per_result_byte: default_report_gas_per_result_byte(),
            callback_base_gas: default_callback_base_gas(),
        }
    }
}

impl GasPricing {
    fn result_gas(&self, result_size: u16) -> u64 {
        self.report_base_gas
            .saturating_add(self.report_gas_per_result_byte.saturating_mul(u64::from(result_size)))
    }
}

impl PricingPolicy for GasPricing {
    fn base_fee(&self, gas_price: u128, result_size: u16) -> Amount {
        gas_price.saturating_mul(u128::from(self.result_gas(result_size)))
    }

    fn callback_fee(&self, gas_price: u128, callback_gas_limit: u64) -> Amount {
        gas_price.saturating_mul(u128::from(
            self.callback_base_gas.saturating_add(callback_gas_limit),
        ))
    }

    fn report_gas(&self, request: &Request) -> u64 {
        let gas = self.result_gas(request.sla.max_result_size);
        if request.wants_callback() {
            gas.saturating_add(self.callback_base_gas)
                .saturating_add(request.callback_gas_limit)
        } else {
            gas
        }
    }
}

/// Running total of escrowed value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EscrowLedger {
    held: Amount,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total reward currently escrowed.
    pub fn held(&self) -> Amount {
        self.held
    }

    /// Take custody of `amount` for a newly posted query.
    pub fn reserve(&mut self, amount: Amount) -> Result<()> {
        self.held = self.held.checked_add(amount).ok_or(BoardError::Overflow)?;
        Ok(())
    }

    /// Add `value` to the reward of a posted query, returning the new reward.
    pub fn top_up(&mut self, store: &mut QueryStore, id: QueryId, value: Amount) -> Result<Amount> {
        let held = self.held.checked_add(value).ok_or(BoardError::Overflow)?;
        let reward = store.add_reward(id, value)?;
        self.held = held;
        Ok(reward)
    }

    /// Zero the reward of `id` and release it from custody.
    ///
    /// Must run before any payment or callback touching the query.
    pub fn release(&mut self, store: &mut QueryStore, id: QueryId) -> Result<Amount> {
        let amount = store.take_reward(id)?;
        self.held = self.held.checked_sub(amount).ok_or_else(|| {
            BoardError::EscrowInvariant(format!(
                "releasing {amount} for query {id} but only {} held",
                self.held
            ))
        })?;
        Ok(amount)
    }

    /// Release the residual reward of an erased query.
    pub fn refund(&mut self, amount: Amount) -> Result<()> {
        self.held = self.held.checked_sub(amount).ok_or_else(|| {
            BoardError::EscrowInvariant(format!(
                "refunding {amount} but only {} held",
                self.held
            ))
        })?;
        Ok(())
    }

    /// Check the running total against the rewards in the store.
    pub fn audit(&self, store: &QueryStore) -> Result<()> {
        match store.total_reward() {
            Some(total) if total == self.held => Ok(()),
            Some(total) => Err(BoardError::EscrowInvariant(format!(
                "ledger holds {} but stored rewards sum to {total}",
                self.held
            ))),
            None => Err(BoardError::Overflow),
        }
    }
}

/// Revenue and expense a reporter can expect from reporting `ids`.
///
/// Only queries still `Posted` count. `nanowit_price` is the price of one
/// nanowit in native units and converts the witnessing fee into an expense.
pub fn estimate_report_earnings<P: PricingPolicy + ?Sized>(
    store: &QueryStore,
    pricing: &P,
    ids: &[QueryId],
    gas_price: u128,
    nanowit_price: u128,
) -> (Amount, Amount) {
    ids.iter()
        .filter(|id| store.status(**id) == QueryStatus::Posted)
        .filter_map(|id| store.get(*id))
        .fold((0u128, 0u128), |(revenue, expense), query| {
            let request = &query.request;
            let gas = gas_price.saturating_mul(u128::from(pricing.report_gas(request)));
            let witnessing =
                nanowit_price.saturating_mul(u128::from(request.sla.witnessing_fee()));
            (
                revenue.saturating_add(request.reward),
                expense.saturating_add(gas).saturating_add(witnessing),
            )
        })
}
