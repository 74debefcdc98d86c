// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! Token Lottery Application - ABI re-exports and view conversions */

pub mod convert;

pub use lottery_abi::{
    BetEntry, LotteryParameters, LotteryStatus, Operation, OperationResponse, RoundInfo, RoundOutcome,
    RoundStatus, TokenLotteryAbi,
};
