// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conversions between the on-chain ABI types and the settlement core.

use linera_sdk::linera_base_types::{AccountOwner, Amount};
use lottery_abi::{BetEntry, LotteryParameters, LotteryStatus, RoundInfo, RoundOutcome, RoundStatus};
use lottery_core::{
    AccountId, EngineConfig, ExchangeRate, LotteryRound, Outcome, RefundReason, RoundStatus as CoreRoundStatus,
    Tokens,
};

/// Ledger accounts are keyed by the owner's canonical string form.
pub fn account_id(owner: &AccountOwner) -> AccountId {
    AccountId::new(owner.to_string())
}

pub fn tokens(amount: Amount) -> Tokens {
    u128::from(amount)
}

pub fn amount(tokens: Tokens) -> Amount {
    Amount::from_attos(tokens)
}

pub fn engine_config(parameters: &LotteryParameters) -> EngineConfig {
    let config = EngineConfig::new(
        ExchangeRate::new(u128::from(parameters.exchange_rate)),
        parameters.admins.iter().map(account_id),
    )
    .with_bet_fee(tokens(parameters.bet_fee));
    let config = match parameters.reveal_window_secs {
        Some(seconds) => config.with_reveal_window(seconds),
        None => config,
    };
    match parameters.history_limit {
        Some(limit) => config.with_history_limit(limit as usize),
        None => config,
    }
}

pub fn lottery_status(status: lottery_core::LotteryStatus) -> LotteryStatus {
    LotteryStatus {
        open: status.open,
        closing_time: status.closing_time,
        accepting_bets: status.accepting_bets,
        reveal_deadline: status.reveal_deadline,
        round_id: status.round_id,
        prize_pool: amount(status.prize_pool),
        participants: status.participants as u64,
    }
}

fn round_status(status: CoreRoundStatus) -> RoundStatus {
    match status {
        CoreRoundStatus::Open => RoundStatus::Open,
        CoreRoundStatus::Closed => RoundStatus::Closed,
    }
}

fn refund_reason(reason: &RefundReason) -> String {
    match reason {
        RefundReason::Cancelled => "cancelled".to_string(),
        RefundReason::RevealExpired => "reveal expired".to_string(),
    }
}

pub fn round_info(round: &LotteryRound) -> RoundInfo {
    let mut info = RoundInfo {
        id: round.id,
        status: round_status(round.status),
        opened_at: round.opened_at,
        closing_time: round.closing_time,
        closed_at: round.closed_at,
        prize_pool: amount(round.prize_pool),
        participants: round.participants() as u64,
        commitment: round.commitment.to_hex(),
        outcome: RoundOutcome::Pending,
        reveal_deadline: round.reveal_deadline(),
        winner: None,
        winning_ticket: None,
        draw_seed: None,
        refund_reason: None,
        claimed: round.claimed,
    };
    match &round.outcome {
        Outcome::Pending => {}
        Outcome::AwaitingReveal { .. } => info.outcome = RoundOutcome::AwaitingReveal,
        Outcome::NoBets => info.outcome = RoundOutcome::NoBets,
        Outcome::Won { winner, draw, .. } => {
            info.outcome = RoundOutcome::Won;
            info.winner = Some(winner.to_string());
            // Tickets can exceed what GraphQL integers hold.
            info.winning_ticket = Some(draw.ticket.to_string());
            info.draw_seed = Some(hex::encode(draw.seed));
        }
        Outcome::Refunded(reason) => {
            info.outcome = RoundOutcome::Refunded;
            info.refund_reason = Some(refund_reason(reason));
        }
    }
    info
}

pub fn bet_entries(round: &LotteryRound) -> Vec<BetEntry> {
    round
        .bets
        .iter()
        .map(|(account, stake)| BetEntry {
            account: account.to_string(),
            amount: amount(*stake),
        })
        .collect()
}
