// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! Token ledger and lottery settlement core.

Deterministic and in-memory. Time is injected by the caller and randomness comes
from a [`RandomnessSource`], so the same inputs always produce the same state. */

pub mod access;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod randomness;
pub mod round;
pub mod service;
pub mod settlement;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use access::AccessControl;
pub use config::{ConfigError, EngineConfig, ExchangeRate};
pub use engine::{CloseOutcome, EngineState, LotteryStatus, SettlementEngine};
pub use error::{LotteryError, LotteryResult};
pub use ledger::TokenLedger;
pub use randomness::{Commitment, OperatorReveal, RandomnessError, RandomnessSource, Secret, SecretBeacon};
pub use round::{Draw, LotteryRound, Outcome, RefundReason, RoundBook, RoundStatus};
pub use service::{Clock, LotteryService, ManualClock, SharedEngine, SystemClock};

/// Amount in the smallest token unit.
pub type Tokens = u128;
/// Seconds since the Unix epoch.
pub type Timestamp = u64;
/// Sequential round number, starting at 1.
pub type RoundId = u64;

/// Opaque account identity, resolved by the gateway before calling the core.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        AccountId(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        AccountId(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
