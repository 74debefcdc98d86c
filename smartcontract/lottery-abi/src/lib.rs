// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

/*! Shared ABI definitions for the Token Lottery Application */

use async_graphql::{Request, Response, SimpleObject};
use linera_sdk::linera_base_types::{AccountOwner, Amount, ContractAbi, ServiceAbi};
use serde::{Deserialize, Serialize};

pub struct TokenLotteryAbi;

impl ContractAbi for TokenLotteryAbi {
    type Operation = Operation;
    type Response = OperationResponse;
}

impl ServiceAbi for TokenLotteryAbi {
    type Query = Request;
    type QueryResponse = Response;
}

/// Application parameters, fixed when the application is created.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LotteryParameters {
    /// Tokens minted per smallest ETH unit submitted with `BuyTokens`.
    pub exchange_rate: u64,
    /// Owners allowed to open, cancel and force-close rounds, reveal draws and
    /// withdraw fees. Admins may not bet.
    pub admins: Vec<AccountOwner>,
    #[serde(default)]
    pub bet_fee: Amount,
    #[serde(default)]
    pub history_limit: Option<u32>,
    /// Seconds the admins have after close to reveal the secret
    #[serde(default)]
    pub reveal_window_secs: Option<u64>,
}

/// Every operation acts on behalf of the authenticated signer.
#[derive(Debug, Deserialize, Serialize)]
pub enum Operation {
    /// Buy tokens; `eth_amount` is already normalized to the smallest unit
    BuyTokens { eth_amount: Amount },
    /// Destroy tokens from the signer's balance
    BurnTokens { amount: Amount },
    /// Open a betting round (admin). `commitment` is the hex SHA-256 commitment
    /// of the secret revealed with `RevealWinner`.
    OpenBets { duration_secs: u64, commitment: String },
    /// Bet on the open round
    PlaceBet { amount: Amount },
    /// Stop betting on the open round. Admins may close early; anyone may close
    /// after the closing time.
    CloseLottery,
    /// Reveal the committed secret of the closed round and draw its winner (admin)
    RevealWinner { secret: String },
    /// Refund every bet: an open round (admin), or a closed round whose secret
    /// was not revealed before its deadline (anyone)
    CancelRound,
    /// Claim the signer's oldest unclaimed prize
    ClaimPrize,
    /// Claim the prize of one specific round
    ClaimRoundPrize { round_id: u64 },
    /// Withdraw collected bet fees (admin)
    WithdrawFees { amount: Amount },
}

#[derive(Debug, Deserialize, Serialize)]
pub enum OperationResponse {
    Ok,
    Minted(Amount),
    RoundOpened(u64),
    /// The signer's accumulated stake in the open round
    Stake(Amount),
    RoundClosed {
        round_id: u64,
        /// Set when the round has bets and waits for `RevealWinner`
        reveal_deadline: Option<u64>,
    },
    WinnerDrawn {
        round_id: u64,
        winner: String,
        prize: Amount,
    },
    RoundCancelled(u64),
    PrizeClaimed(Amount),
}

/// Status of a lottery round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, async_graphql::Enum)]
pub enum RoundStatus {
    Open,   // Accepting bets until the closing time
    Closed, // No longer accepting bets
}

/// How a round ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, async_graphql::Enum)]
pub enum RoundOutcome {
    Pending,
    AwaitingReveal,
    NoBets,
    Won,
    Refunded,
}

/// Snapshot of the current round for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct LotteryStatus {
    pub open: bool,
    pub closing_time: Option<u64>,
    pub accepting_bets: bool,
    pub reveal_deadline: Option<u64>,
    pub round_id: Option<u64>,
    pub prize_pool: Amount,
    pub participants: u64,
}

/// A lottery round, including the data needed to audit its draw
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct RoundInfo {
    pub id: u64,
    pub status: RoundStatus,
    pub opened_at: u64,
    pub closing_time: u64,
    pub closed_at: Option<u64>,
    pub prize_pool: Amount,
    pub participants: u64,
    pub commitment: String,
    pub outcome: RoundOutcome,
    pub reveal_deadline: Option<u64>,
    pub winner: Option<String>,
    pub winning_ticket: Option<String>,
    pub draw_seed: Option<String>,
    pub refund_reason: Option<String>,
    pub claimed: bool,
}

/// One bettor's accumulated stake in a round
#[derive(Debug, Clone, Serialize, Deserialize, SimpleObject)]
pub struct BetEntry {
    pub account: String,
    pub amount: Amount,
}
