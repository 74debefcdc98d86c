// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{AccountId, Tokens};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Exchange rate must be greater than zero")]
    ZeroExchangeRate,

    #[error("At least one admin account is required")]
    NoAdmins,

    #[error("History limit must keep at least one round")]
    ZeroHistoryLimit,

    #[error("Reveal window must be greater than zero")]
    ZeroRevealWindow,
}

/// Tokens minted per smallest ETH unit handed in by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRate(u128);

impl ExchangeRate {
    pub const fn new(tokens_per_unit: u128) -> Self {
        ExchangeRate(tokens_per_unit)
    }

    pub fn tokens_per_unit(&self) -> u128 {
        self.0
    }

    /// `None` on overflow.
    pub fn tokens_for(&self, eth_amount: u128) -> Option<Tokens> {
        eth_amount.checked_mul(self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub exchange_rate: ExchangeRate,
    pub admins: BTreeSet<AccountId>,
    /// Flat fee charged on every bet, kept apart from the prize pool.
    #[serde(default)]
    pub bet_fee: Tokens,
    /// Finished rounds kept in history; `None` keeps every round.
    #[serde(default)]
    pub history_limit: Option<usize>,
    /// Seconds the committer has to reveal after a round closes. Past that,
    /// anyone may refund the round.
    #[serde(default = "default_reveal_window")]
    pub reveal_window: u64,
}

pub const DEFAULT_REVEAL_WINDOW: u64 = 24 * 3_600;

fn default_reveal_window() -> u64 {
    DEFAULT_REVEAL_WINDOW
}

impl EngineConfig {
    pub fn new(exchange_rate: ExchangeRate, admins: impl IntoIterator<Item = AccountId>) -> Self {
        EngineConfig {
            exchange_rate,
            admins: admins.into_iter().collect(),
            bet_fee: 0,
            history_limit: None,
            reveal_window: DEFAULT_REVEAL_WINDOW,
        }
    }

    pub fn with_bet_fee(mut self, bet_fee: Tokens) -> Self {
        self.bet_fee = bet_fee;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn with_reveal_window(mut self, seconds: u64) -> Self {
        self.reveal_window = seconds;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange_rate.tokens_per_unit() == 0 {
            return Err(ConfigError::ZeroExchangeRate);
        }
        if self.admins.is_empty() {
            return Err(ConfigError::NoAdmins);
        }
        if self.history_limit == Some(0) {
            return Err(ConfigError::ZeroHistoryLimit);
        }
        if self.reveal_window == 0 {
            return Err(ConfigError::ZeroRevealWindow);
        }
        Ok(())
    }
}
