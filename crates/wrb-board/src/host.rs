//! Host ledger primitives.
//!
//! The board runs inside a host that serializes transactions. Each call
//! receives a [`TxContext`] describing the transaction and an [`Env`] giving
//! access to the collaborators the board does not own: the query definition
//! registry, the consumers that receive callbacks, and the payment primitive.
//!
//! Value attached to a call is moved into board custody by the host before
//! the call runs. The board only ever pays out of custody.

use std::collections::{BTreeMap, BTreeSet};

use wrb_types::{Address, Amount};

use crate::callback::ConsumerDirectory;
use crate::registry::RequestRegistry;

/// Facts about the transaction currently being executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxContext {
    /// Account that sent the transaction.
    pub caller: Address,
    /// Value attached to the call, already held in custody.
    pub value: Amount,
    /// Block the transaction is included in.
    pub block: u64,
    /// Block time (Unix seconds).
    pub timestamp: u64,
    /// Gas price paid by the transaction.
    pub gas_price: u128,
}

impl TxContext {
    /// A value-less call from `caller`.
    pub fn call(caller: Address, block: u64, timestamp: u64) -> Self {
        Self {
            caller,
            value: 0,
            block,
            timestamp,
            gas_price: 0,
        }
    }

    /// The same transaction with `value` attached.
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    /// The same transaction at `gas_price`.
    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price = gas_price;
        self
    }
}

/// Errors raised by the payment primitive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("custody holds {available}, cannot pay {requested}")]
    InsufficientCustody { available: Amount, requested: Amount },

    #[error("account {account} holds {available}, cannot move {requested}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        requested: Amount,
    },

    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    #[error("balance overflow")]
    Overflow,
}

/// Revert-on-failure payment out of board custody.
///
/// A failed transfer must leave balances untouched.
pub trait PaymentGateway {
    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), PaymentError>;
}

/// Native-token balances of a local host, including the board's custody.
#[derive(Clone, Debug, Default)]
pub struct Balances {
    custody: Amount,
    accounts: BTreeMap<Address, Amount>,
    rejecting: BTreeSet<Address>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` into `account`.
    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<Amount, PaymentError> {
        let balance = self.accounts.entry(account).or_default();
        *balance = balance.checked_add(amount).ok_or(PaymentError::Overflow)?;
        Ok(*balance)
    }

    /// Move `amount` from `account` into board custody.
    pub fn deposit(&mut self, account: Address, amount: Amount) -> Result<(), PaymentError> {
        let available = self.balance_of(&account);
        if available < amount {
            return Err(PaymentError::InsufficientBalance {
                account,
                available,
                requested: amount,
            });
        }
        let custody = self
            .custody
            .checked_add(amount)
            .ok_or(PaymentError::Overflow)?;
        self.accounts.insert(account, available - amount);
        self.custody = custody;
        Ok(())
    }

    /// Make every future transfer to `account` fail.
    pub fn reject_transfers_to(&mut self, account: Address) {
        self.rejecting.insert(account);
    }

    /// Balance of `account`, zero if unknown.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.accounts.get(account).copied().unwrap_or_default()
    }

    /// Value currently held by the board.
    pub fn custody(&self) -> Amount {
        self.custody
    }
}

impl PaymentGateway for Balances {
    fn transfer(&mut self, to: Address, amount: Amount) -> Result<(), PaymentError> {
        if self.rejecting.contains(&to) {
            return Err(PaymentError::Rejected(to));
        }
        if self.custody < amount {
            return Err(PaymentError::InsufficientCustody {
                available: self.custody,
                requested: amount,
            });
        }
        let balance = self
            .balance_of(&to)
            .checked_add(amount)
            .ok_or(PaymentError::Overflow)?;
        self.custody -= amount;
        self.accounts.insert(to, balance);
        Ok(())
    }
}

/// Collaborators available to a board operation.
pub struct Env<'a> {
    pub registry: &'a dyn RequestRegistry,
    pub consumers: &'a mut dyn ConsumerDirectory,
    pub payments: &'a mut dyn PaymentGateway,
}

impl<'a> Env<'a> {
    /// Bundle the collaborators of one operation.
    pub fn new(
        registry: &'a dyn RequestRegistry,
        consumers: &'a mut dyn ConsumerDirectory,
        payments: &'a mut dyn PaymentGateway,
    ) -> Self {
        Self {
            registry,
            consumers,
            payments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_and_transfer() {
        let alice = Address::repeat(1);
        let bob = Address::repeat(2);
        let mut balances = Balances::new();
        balances.credit(alice, 500).expect("credit");
        balances.deposit(alice, 200).expect("deposit");
        assert_eq!(balances.balance_of(&alice), 300);
        assert_eq!(balances.custody(), 200);

        balances.transfer(bob, 150).expect("transfer");
        assert_eq!(balances.balance_of(&bob), 150);
        assert_eq!(balances.custody(), 50);
    }

    #[test]
    fn test_deposit_insufficient_balance() {
        let mut balances = Balances::new();
        let err = balances
            .deposit(Address::repeat(1), 10)
            .expect_err("empty account");
        assert!(matches!(err, PaymentError::InsufficientBalance { .. }));
        assert_eq!(balances.custody(), 0);
    }

    #[test]
    fn test_failed_transfer_leaves_balances_untouched() {
        let alice = Address::repeat(1);
        let mut balances = Balances::new();
        balances.credit(alice, 100).expect("credit");
        balances.deposit(alice, 100).expect("deposit");

        let err = balances.transfer(alice, 101).expect_err("over custody");
        assert!(matches!(err, PaymentError::InsufficientCustody { .. }));

        balances.reject_transfers_to(alice);
        let err = balances.transfer(alice, 10).expect_err("rejected");
        assert_eq!(err, PaymentError::Rejected(alice));

        assert_eq!(balances.custody(), 100);
        assert_eq!(balances.balance_of(&alice), 0);
    }

    #[test]
    fn test_tx_context_builders() {
        let tx = TxContext::call(Address::repeat(3), 10, 1_000)
            .with_value(5)
            .with_gas_price(2);
        assert_eq!(tx.value, 5);
        assert_eq!(tx.gas_price, 2);
        assert_eq!(tx.block, 10);
    }
}
