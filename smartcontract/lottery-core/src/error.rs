// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{RoundId, Timestamp, Tokens};

/// Result type for ledger and lottery operations
pub type LotteryResult<T> = Result<T, LotteryError>;

/// Every rejection the core can return. A failed call never mutates state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LotteryError {
    #[error("Amount must be greater than zero and within range")]
    InvalidAmount,

    #[error("Insufficient balance: {available} < {requested}")]
    InsufficientBalance { available: Tokens, requested: Tokens },

    #[error("Caller is not authorized for this operation")]
    Unauthorized,

    #[error("A lottery round is already open")]
    AlreadyOpen,

    #[error("No lottery round is open")]
    LotteryNotOpen,

    #[error("Betting duration must be greater than zero")]
    InvalidDuration,

    #[error("Lottery cannot be closed before {closing_time}")]
    NotYetExpired { closing_time: Timestamp },

    #[error("No settled round with a prize to claim")]
    NoRoundSettled,

    #[error("Prize already claimed")]
    AlreadyClaimed,

    #[error("Betting closed at {closing_time}")]
    Expired { closing_time: Timestamp },

    #[error("Randomness source unavailable: {0}")]
    RandomnessUnavailable(String),

    #[error("Round {round_id} is closed and waiting for its secret")]
    AwaitingReveal { round_id: RoundId },

    #[error("No closed round is waiting for a reveal")]
    NothingToReveal,

    #[error("The secret may still be revealed until {reveal_deadline}")]
    RevealWindowOpen { reveal_deadline: Timestamp },
}
