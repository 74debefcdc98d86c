// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AccountId, ExchangeRate, LotteryError, LotteryResult, Tokens};

/// Balances, total supply and the escrow held for rounds and fees.
///
/// `total_supply == sum(balances) + escrowed` holds after every call: each
/// method checks all of its preconditions before touching any field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLedger {
    balances: BTreeMap<AccountId, Tokens>,
    total_supply: Tokens,
    escrowed: Tokens,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from stored parts. Hosts that keep balances in a
    /// keyed store load only the accounts an operation touches.
    pub fn from_parts(
        balances: impl IntoIterator<Item = (AccountId, Tokens)>,
        total_supply: Tokens,
        escrowed: Tokens,
    ) -> Self {
        TokenLedger {
            balances: balances.into_iter().filter(|(_, balance)| *balance > 0).collect(),
            total_supply,
            escrowed,
        }
    }

    /// Buys tokens: converts `eth_amount` at `rate` and credits `account`.
    pub fn mint(&mut self, account: &AccountId, eth_amount: u128, rate: ExchangeRate) -> LotteryResult<Tokens> {
        if eth_amount == 0 {
            return Err(LotteryError::InvalidAmount);
        }
        let minted = rate
            .tokens_for(eth_amount)
            .filter(|minted| *minted > 0)
            .ok_or(LotteryError::InvalidAmount)?;
        let total_supply = self.total_supply.checked_add(minted).ok_or(LotteryError::InvalidAmount)?;

        *self.balances.entry(account.clone()).or_default() += minted;
        self.total_supply = total_supply;
        debug!(%account, eth_amount, minted, total_supply, "minted tokens");
        Ok(minted)
    }

    /// Zero counts as more than the caller can burn.
    pub fn burn(&mut self, account: &AccountId, amount: Tokens) -> LotteryResult<()> {
        if amount == 0 {
            return Err(LotteryError::InsufficientBalance {
                available: self.balance_of(account),
                requested: 0,
            });
        }
        self.debit(account, amount)?;
        self.total_supply -= amount;
        debug!(%account, amount, total_supply = self.total_supply, "burned tokens");
        Ok(())
    }

    /// Moves `amount` from the spendable balance into escrow.
    pub fn lock(&mut self, account: &AccountId, amount: Tokens) -> LotteryResult<()> {
        self.debit(account, amount)?;
        self.escrowed += amount;
        Ok(())
    }

    /// Releases `amount` from escrow into `account`.
    pub fn credit(&mut self, account: &AccountId, amount: Tokens) -> LotteryResult<()> {
        if amount > self.escrowed {
            return Err(LotteryError::InsufficientBalance {
                available: self.escrowed,
                requested: amount,
            });
        }
        self.escrowed -= amount;
        *self.balances.entry(account.clone()).or_default() += amount;
        Ok(())
    }

    pub fn balance_of(&self, account: &AccountId) -> Tokens {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> Tokens {
        self.total_supply
    }

    pub fn escrowed(&self) -> Tokens {
        self.escrowed
    }

    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, Tokens)> {
        self.balances.iter().map(|(account, balance)| (account, *balance))
    }

    pub fn is_conserved(&self) -> bool {
        let circulating = self
            .balances
            .values()
            .try_fold(0u128, |sum, balance| sum.checked_add(*balance));
        circulating.and_then(|sum| sum.checked_add(self.escrowed)) == Some(self.total_supply)
    }

    fn debit(&mut self, account: &AccountId, amount: Tokens) -> LotteryResult<()> {
        let available = self.balance_of(account);
        if amount > available {
            return Err(LotteryError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        if amount == available {
            self.balances.remove(account);
        } else if let Some(balance) = self.balances.get_mut(account) {
            *balance -= amount;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn alice() -> AccountId {
        AccountId::from("alice")
    }

    #[test]
    fn test_mint_converts_at_rate() {
        let mut ledger = TokenLedger::new();
        let minted = ledger.mint(&alice(), 1, ExchangeRate::new(10)).unwrap();
        assert_eq!(minted, 10);
        assert_eq!(ledger.balance_of(&alice()), 10);
        assert_eq!(ledger.total_supply(), 10);
        assert!(ledger.is_conserved());
    }

    #[test]
    fn test_mint_rejects_zero_and_overflow() {
        let mut ledger = TokenLedger::new();
        assert_eq!(ledger.mint(&alice(), 0, ExchangeRate::new(10)), Err(LotteryError::InvalidAmount));
        assert_eq!(
            ledger.mint(&alice(), u128::MAX, ExchangeRate::new(2)),
            Err(LotteryError::InvalidAmount)
        );
        assert_eq!(ledger, TokenLedger::new());
    }

    #[test]
    fn test_burn() {
        let mut ledger = TokenLedger::new();
        ledger.mint(&alice(), 1, ExchangeRate::new(10)).unwrap();

        ledger.burn(&alice(), 3).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 7);
        assert_eq!(ledger.total_supply(), 7);

        let before = ledger.clone();
        assert_matches!(
            ledger.burn(&alice(), 8),
            Err(LotteryError::InsufficientBalance { available: 7, requested: 8 })
        );
        assert_eq!(
            ledger.burn(&alice(), 0),
            Err(LotteryError::InsufficientBalance { available: 7, requested: 0 })
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_lock_and_credit_keep_supply() {
        let mut ledger = TokenLedger::new();
        let bob = AccountId::from("bob");
        ledger.mint(&alice(), 1, ExchangeRate::new(10)).unwrap();

        ledger.lock(&alice(), 10).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 0);
        assert_eq!(ledger.escrowed(), 10);
        assert_eq!(ledger.total_supply(), 10);
        assert_eq!(ledger.balances().count(), 0);
        assert!(ledger.is_conserved());

        ledger.credit(&bob, 10).unwrap();
        assert_eq!(ledger.balance_of(&bob), 10);
        assert_eq!(ledger.escrowed(), 0);
        assert!(ledger.is_conserved());

        assert_matches!(ledger.credit(&bob, 1), Err(LotteryError::InsufficientBalance { .. }));
        assert_matches!(ledger.lock(&alice(), 1), Err(LotteryError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_from_parts_drops_empty_balances() {
        let ledger = TokenLedger::from_parts([(alice(), 4), (AccountId::from("bob"), 0)], 10, 6);
        assert_eq!(ledger.balance_of(&alice()), 4);
        assert_eq!(ledger.balances().count(), 1);
        assert!(ledger.is_conserved());
    }
}
