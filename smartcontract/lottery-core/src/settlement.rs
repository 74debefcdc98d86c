// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Winner selection, prize claims and refunds.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use num_traits::cast::ToPrimitive;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{
    AccountId, Commitment, Draw, LotteryError, LotteryResult, LotteryRound, Outcome, RandomnessSource,
    RefundReason, RoundId, Secret, Timestamp, TokenLedger, Tokens,
};

const DRAW_DOMAIN: &[u8] = b"token-lottery/draw";

/// Seed of a round's draw. Binds the revealed secret to the round it was
/// committed for and to the final bet set, which is only fixed at close.
pub fn draw_seed(
    round_id: RoundId,
    secret: &Secret,
    commitment: &Commitment,
    bets: &BTreeMap<AccountId, Tokens>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DRAW_DOMAIN);
    hasher.update(round_id.to_be_bytes());
    hasher.update(secret.as_bytes());
    hasher.update(commitment.as_bytes());
    for (account, stake) in bets {
        hasher.update((account.as_str().len() as u64).to_be_bytes());
        hasher.update(account.as_str().as_bytes());
        hasher.update(stake.to_be_bytes());
    }
    hasher.finalize().into()
}

/// Stake-weighted pick: each token bet is one ticket in `0..pool`.
///
/// The full 256-bit seed is reduced modulo the pool, so the bias towards low
/// tickets is at most `pool / 2^256`.
pub fn select_winner(bets: &BTreeMap<AccountId, Tokens>, seed: &[u8; 32]) -> Option<(AccountId, Tokens)> {
    let pool: Tokens = bets.values().sum();
    if pool == 0 {
        return None;
    }
    let ticket = (BigUint::from_bytes_be(seed) % BigUint::from(pool)).to_u128()?;

    let mut cumulative: Tokens = 0;
    for (account, stake) in bets {
        cumulative += stake;
        if ticket < cumulative {
            return Some((account.clone(), ticket));
        }
    }
    None
}

fn ensure_escrow_covers(ledger: &TokenLedger, round: &LotteryRound) -> LotteryResult<()> {
    if ledger.escrowed() < round.prize_pool {
        return Err(LotteryError::InsufficientBalance {
            available: ledger.escrowed(),
            requested: round.prize_pool,
        });
    }
    Ok(())
}

/// Stops betting on an open round. Empty rounds end as `NoBets`; otherwise the
/// pool stays in escrow until the committer reveals or the window lapses.
pub fn close(
    round: &mut LotteryRound,
    ledger: &TokenLedger,
    now: Timestamp,
    reveal_window: u64,
) -> LotteryResult<Outcome> {
    ensure_escrow_covers(ledger, round)?;
    round.close(now);
    round.outcome = if round.bets.is_empty() {
        Outcome::NoBets
    } else {
        Outcome::AwaitingReveal {
            reveal_deadline: now.saturating_add(reveal_window),
        }
    };
    info!(round_id = round.id, prize_pool = round.prize_pool, outcome = ?round.outcome, "round closed");
    Ok(round.outcome.clone())
}

/// Draws the winner of a closed round from the revealed secret.
///
/// A missing or mismatched secret is an error and leaves the round waiting;
/// only [`refund`] ends a round without a draw.
pub fn reveal<R: RandomnessSource>(round: &mut LotteryRound, randomness: &mut R) -> LotteryResult<Outcome> {
    if !round.is_awaiting_reveal() {
        return Err(LotteryError::NothingToReveal);
    }
    let secret = randomness
        .reveal(round.id)
        .and_then(|secret| secret.verify(round.id, &round.commitment).map(|()| secret))
        .map_err(|e| {
            warn!(round_id = round.id, error = %e, "reveal rejected");
            LotteryError::RandomnessUnavailable(e.to_string())
        })?;

    let seed = draw_seed(round.id, &secret, &round.commitment, &round.bets);
    // Bets exist, so the pool is non-zero and a ticket always lands.
    let (winner, ticket) = select_winner(&round.bets, &seed)
        .ok_or_else(|| LotteryError::RandomnessUnavailable("draw produced no winner".to_string()))?;
    info!(
        round_id = round.id,
        %winner,
        ticket,
        prize = round.prize_pool,
        participants = round.participants(),
        "winner selected"
    );
    round.outcome = Outcome::Won {
        winner,
        prize: round.prize_pool,
        draw: Draw { seed, ticket },
    };
    Ok(round.outcome.clone())
}

/// Returns every bet of an unsettled round in full, closing it first if it
/// is still open.
pub fn refund(
    round: &mut LotteryRound,
    ledger: &mut TokenLedger,
    now: Timestamp,
    reason: RefundReason,
) -> LotteryResult<()> {
    if !round.is_unsettled() {
        return Err(LotteryError::LotteryNotOpen);
    }
    ensure_escrow_covers(ledger, round)?;
    if round.is_open() {
        round.close(now);
    }
    for (account, amount) in &round.bets {
        ledger.credit(account, *amount)?;
    }
    info!(round_id = round.id, refunded = round.prize_pool, ?reason, "round refunded");
    round.outcome = Outcome::Refunded(reason);
    Ok(())
}

/// Pays the round's prize to its winner, exactly once.
pub fn claim(round: &mut LotteryRound, ledger: &mut TokenLedger, account: &AccountId) -> LotteryResult<Tokens> {
    let (winner, prize) = match &round.outcome {
        Outcome::Won { winner, prize, .. } => (winner, *prize),
        _ => return Err(LotteryError::NoRoundSettled),
    };
    if winner != account {
        return Err(LotteryError::Unauthorized);
    }
    if round.claimed {
        return Err(LotteryError::AlreadyClaimed);
    }
    ledger.credit(account, prize)?;
    round.claimed = true;
    info!(round_id = round.id, winner = %account, prize, "prize claimed");
    Ok(prize)
}
