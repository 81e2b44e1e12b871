//! Local development chain.
//!
//! Produces one block per transaction and keeps native balances, including
//! the board's custody. Value attached to a call moves into custody before
//! the board runs; a failed call restores the balances to their state before
//! the transaction.

use wrb_board::{Balances, PaymentError, TxContext};
use wrb_types::{Address, Amount};

use crate::config::ChainConfig;

#[derive(Debug)]
pub struct LocalChain {
    balances: Balances,
    height: u64,
    timestamp: u64,
    block_time: u64,
    gas_price: u128,
}

/// Balances as they were before a transaction, for rollback.
#[derive(Debug)]
pub struct Snapshot(Balances);

impl LocalChain {
    /// Build the chain at genesis, crediting the configured accounts.
    pub fn genesis(config: &ChainConfig, genesis_time: u64) -> Result<Self, PaymentError> {
        let mut balances = Balances::new();
        for entry in &config.balances {
            balances.credit(entry.address, entry.amount)?;
        }
        Ok(Self {
            balances,
            height: 0,
            timestamp: genesis_time,
            block_time: config.block_time_secs.max(1),
            gas_price: config.gas_price,
        })
    }

    /// Context of the genesis block, used to deploy the board.
    pub fn genesis_tx(&self, deployer: Address) -> TxContext {
        TxContext::call(deployer, self.height, self.timestamp).with_gas_price(self.gas_price)
    }

    /// Mine the next block for a call from `caller` carrying `value`.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::InsufficientBalance`] if `caller` cannot cover `value`
    pub fn begin(&mut self, caller: Address, value: Amount) -> Result<(TxContext, Snapshot), PaymentError> {
        let snapshot = Snapshot(self.balances.clone());
        self.balances.deposit(caller, value)?;
        self.height += 1;
        self.timestamp += self.block_time;
        let tx = TxContext::call(caller, self.height, self.timestamp)
            .with_value(value)
            .with_gas_price(self.gas_price);
        Ok((tx, snapshot))
    }

    /// Undo the balance changes of a failed transaction. The block stays mined.
    pub fn revert(&mut self, snapshot: Snapshot) {
        self.balances = snapshot.0;
    }

    /// Development faucet.
    pub fn faucet(&mut self, account: Address, amount: Amount) -> Result<Amount, PaymentError> {
        self.balances.credit(account, amount)
    }

    /// Balances, for the board's payment primitive.
    pub fn balances_mut(&mut self) -> &mut Balances {
        &mut self.balances
    }

    /// Balance of `account`.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.balance_of(account)
    }

    /// Value held by the board.
    pub fn custody(&self) -> Amount {
        self.balances.custody()
    }

    /// Height of the last mined block.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Timestamp of the last mined block.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Gas price applied to every transaction.
    pub fn gas_price(&self) -> u128 {
        self.gas_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenesisBalance;
    use wrb_board::PaymentGateway;

    fn chain() -> LocalChain {
        let config = ChainConfig {
            balances: vec![GenesisBalance {
                address: Address::repeat(0xAA),
                amount: 1_000,
            }],
            ..ChainConfig::default()
        };
        LocalChain::genesis(&config, 1_000_000).expect("genesis")
    }

    #[test]
    fn test_blocks_advance_per_transaction() {
        let mut chain = chain();
        let (tx, _) = chain.begin(Address::repeat(0xAA), 100).expect("begin");
        assert_eq!(tx.block, 1);
        assert_eq!(tx.timestamp, 1_000_015);
        assert_eq!(tx.value, 100);
        assert_eq!(chain.balance_of(&Address::repeat(0xAA)), 900);
        assert_eq!(chain.custody(), 100);
    }

    #[test]
    fn test_revert_restores_balances() {
        let mut chain = chain();
        let (_, snapshot) = chain.begin(Address::repeat(0xAA), 400).expect("begin");
        chain
            .balances_mut()
            .transfer(Address::repeat(0xBB), 400)
            .expect("transfer");
        chain.revert(snapshot);
        assert_eq!(chain.balance_of(&Address::repeat(0xAA)), 1_000);
        assert_eq!(chain.balance_of(&Address::repeat(0xBB)), 0);
        assert_eq!(chain.custody(), 0);
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn test_insufficient_balance() {
        let mut chain = chain();
        let result = chain.begin(Address::repeat(0xCC), 1);
        assert!(matches!(
            result,
            Err(PaymentError::InsufficientBalance { .. })
        ));
        assert_eq!(chain.height(), 0);

        chain.faucet(Address::repeat(0xCC), 5).expect("faucet");
        chain.begin(Address::repeat(0xCC), 5).expect("funded");
    }
}
