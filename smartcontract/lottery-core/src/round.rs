// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AccountId, Commitment, LotteryError, LotteryResult, RoundId, Timestamp, Tokens};

/// Status of a lottery round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    Open,   // Accepting bets until the closing time
    Closed, // Waiting for the reveal, settled, refunded or empty
}

/// Audit record of a draw: the seed derived from the revealed secret and the
/// final bets, and the winning ticket in `0..prize_pool`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub seed: [u8; 32],
    pub ticket: Tokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundReason {
    Cancelled,
    /// The committer did not reveal before the deadline.
    RevealExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pending,
    /// Closed with bets; the pool stays in escrow until the secret is revealed.
    AwaitingReveal {
        reveal_deadline: Timestamp,
    },
    NoBets,
    Won {
        winner: AccountId,
        prize: Tokens,
        draw: Draw,
    },
    Refunded(RefundReason),
}

/// One open/close cycle with its own bets and prize pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryRound {
    pub id: RoundId,
    pub status: RoundStatus,
    pub opened_at: Timestamp,
    pub closing_time: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub bets: BTreeMap<AccountId, Tokens>,
    pub prize_pool: Tokens,
    pub commitment: Commitment,
    pub outcome: Outcome,
    pub claimed: bool,
}

impl LotteryRound {
    pub fn open(id: RoundId, now: Timestamp, duration: u64, commitment: Commitment) -> LotteryResult<Self> {
        if duration == 0 {
            return Err(LotteryError::InvalidDuration);
        }
        let closing_time = now.checked_add(duration).ok_or(LotteryError::InvalidDuration)?;
        Ok(LotteryRound {
            id,
            status: RoundStatus::Open,
            opened_at: now,
            closing_time,
            closed_at: None,
            bets: BTreeMap::new(),
            prize_pool: 0,
            commitment,
            outcome: Outcome::Pending,
            claimed: false,
        })
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.closing_time
    }

    /// New bets need an open round that has not reached its closing time.
    pub fn ensure_accepting(&self, now: Timestamp) -> LotteryResult<()> {
        if !self.is_open() {
            return Err(LotteryError::LotteryNotOpen);
        }
        if self.is_expired(now) {
            return Err(LotteryError::Expired {
                closing_time: self.closing_time,
            });
        }
        Ok(())
    }

    /// Adds to the bettor's stake. Funds must already be locked in the ledger.
    pub fn record_bet(&mut self, account: &AccountId, amount: Tokens) -> Tokens {
        let stake = self.bets.entry(account.clone()).or_default();
        *stake += amount;
        self.prize_pool += amount;
        *stake
    }

    pub fn close(&mut self, now: Timestamp) {
        self.status = RoundStatus::Closed;
        self.closed_at = Some(now);
    }

    pub fn reveal_deadline(&self) -> Option<Timestamp> {
        match self.outcome {
            Outcome::AwaitingReveal { reveal_deadline } => Some(reveal_deadline),
            _ => None,
        }
    }

    pub fn is_awaiting_reveal(&self) -> bool {
        self.reveal_deadline().is_some()
    }

    /// Open, or closed with the draw still to come.
    pub fn is_unsettled(&self) -> bool {
        self.is_open() || self.is_awaiting_reveal()
    }

    pub fn bet_of(&self, account: &AccountId) -> Tokens {
        self.bets.get(account).copied().unwrap_or(0)
    }

    pub fn participants(&self) -> usize {
        self.bets.len()
    }

    pub fn winner(&self) -> Option<&AccountId> {
        match &self.outcome {
            Outcome::Won { winner, .. } => Some(winner),
            _ => None,
        }
    }

    pub fn has_pending_claim(&self) -> bool {
        self.winner().is_some() && !self.claimed
    }

    /// Tokens this round still holds in ledger escrow.
    pub fn escrowed(&self) -> Tokens {
        match &self.outcome {
            _ if self.is_unsettled() => self.prize_pool,
            Outcome::Won { prize, .. } if !self.claimed => *prize,
            _ => 0,
        }
    }

    /// Closed with nothing left to pay out.
    pub fn is_finished(&self) -> bool {
        !self.is_unsettled() && self.escrowed() == 0
    }
}

/// Round history, oldest first; the last entry is the current round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundBook {
    round_counter: RoundId,
    rounds: Vec<LotteryRound>,
}

impl RoundBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from a counter and any subset of stored rounds. The
    /// round numbered `round_counter`, if any, must be among them.
    pub fn from_parts(round_counter: RoundId, rounds: impl IntoIterator<Item = LotteryRound>) -> Self {
        let mut rounds: Vec<_> = rounds.into_iter().collect();
        rounds.sort_by_key(|round| round.id);
        rounds.dedup_by_key(|round| round.id);
        RoundBook { round_counter, rounds }
    }

    pub fn round_counter(&self) -> RoundId {
        self.round_counter
    }

    pub fn next_id(&self) -> RoundId {
        self.round_counter + 1
    }

    pub fn push(&mut self, round: LotteryRound) {
        self.round_counter = round.id;
        self.rounds.push(round);
    }

    pub fn current(&self) -> Option<&LotteryRound> {
        self.rounds.last()
    }

    pub fn open_round_mut(&mut self) -> Option<&mut LotteryRound> {
        self.rounds.last_mut().filter(|round| round.is_open())
    }

    /// The current round while it is open or waiting for its reveal.
    pub fn unsettled_round(&self) -> Option<&LotteryRound> {
        self.current().filter(|round| round.is_unsettled())
    }

    pub fn unsettled_round_mut(&mut self) -> Option<&mut LotteryRound> {
        self.rounds.last_mut().filter(|round| round.is_unsettled())
    }

    pub fn get(&self, id: RoundId) -> Option<&LotteryRound> {
        self.rounds.iter().find(|round| round.id == id)
    }

    pub fn get_mut(&mut self, id: RoundId) -> Option<&mut LotteryRound> {
        self.rounds.iter_mut().find(|round| round.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LotteryRound> {
        self.rounds.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LotteryRound> {
        self.rounds.iter_mut()
    }

    /// Drops finished rounds from the front of the history until at most
    /// `limit` remain. Stops at the first round that still holds escrow, and
    /// never drops the current round.
    pub fn prune(&mut self, limit: usize) -> Vec<RoundId> {
        let mut pruned = Vec::new();
        while self.rounds.len() > limit.max(1) && self.rounds[0].is_finished() {
            pruned.push(self.rounds.remove(0).id);
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::Secret;

    fn commitment() -> Commitment {
        Secret::from_bytes([1; 32]).commitment()
    }

    fn finished_round(id: RoundId) -> LotteryRound {
        let mut round = LotteryRound::open(id, 0, 10, commitment()).unwrap();
        round.close(10);
        round.outcome = Outcome::NoBets;
        round
    }

    #[test]
    fn test_open_validates_duration() {
        assert_eq!(LotteryRound::open(1, 100, 0, commitment()), Err(LotteryError::InvalidDuration));
        assert_eq!(
            LotteryRound::open(1, u64::MAX, 1, commitment()),
            Err(LotteryError::InvalidDuration)
        );

        let round = LotteryRound::open(1, 100, 3_600, commitment()).unwrap();
        assert!(round.is_open());
        assert_eq!(round.closing_time, 3_700);
        assert_eq!(round.outcome, Outcome::Pending);
    }

    #[test]
    fn test_bets_accumulate() {
        let mut round = LotteryRound::open(1, 0, 10, commitment()).unwrap();
        let alice = AccountId::from("alice");
        assert_eq!(round.record_bet(&alice, 3), 3);
        assert_eq!(round.record_bet(&alice, 4), 7);
        assert_eq!(round.bet_of(&alice), 7);
        assert_eq!(round.participants(), 1);
        assert_eq!(round.prize_pool, 7);
    }

    #[test]
    fn test_ensure_accepting() {
        let mut round = LotteryRound::open(1, 0, 10, commitment()).unwrap();
        assert!(round.ensure_accepting(9).is_ok());
        assert_matches!(round.ensure_accepting(10), Err(LotteryError::Expired { closing_time: 10 }));

        round.close(5);
        assert_eq!(round.ensure_accepting(6), Err(LotteryError::LotteryNotOpen));
    }

    #[test]
    fn test_awaiting_reveal_keeps_pool_in_escrow() {
        let mut round = LotteryRound::open(1, 0, 10, commitment()).unwrap();
        round.record_bet(&AccountId::from("alice"), 6);
        round.close(10);
        round.outcome = Outcome::AwaitingReveal { reveal_deadline: 70 };

        assert!(!round.is_open());
        assert!(round.is_unsettled());
        assert_eq!(round.reveal_deadline(), Some(70));
        assert_eq!(round.escrowed(), 6);
        assert!(!round.is_finished());
    }

    #[test]
    fn test_prune_stops_at_rounds_with_escrow() {
        let mut book = RoundBook::new();
        for id in 1..=4 {
            book.push(finished_round(id));
        }
        // Round 2 holds an unclaimed prize.
        if let Some(round) = book.get_mut(2) {
            round.prize_pool = 5;
            round.outcome = Outcome::Won {
                winner: AccountId::from("alice"),
                prize: 5,
                draw: Draw { seed: [0; 32], ticket: 0 },
            };
        }

        assert_eq!(book.prune(1), vec![1]);
        assert_eq!(book.iter().map(|round| round.id).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(book.next_id(), 5);

        if let Some(round) = book.get_mut(2) {
            round.claimed = true;
        }
        assert_eq!(book.prune(1), vec![2, 3]);
        assert_eq!(book.current().map(|round| round.id), Some(4));
    }

    #[test]
    fn test_from_parts_orders_rounds() {
        let book = RoundBook::from_parts(7, [finished_round(7), finished_round(3)]);
        assert_eq!(book.round_counter(), 7);
        assert_eq!(book.next_id(), 8);
        assert_eq!(book.current().map(|round| round.id), Some(7));
        assert!(book.get(3).is_some());
        assert!(book.unsettled_round().is_none());
    }
}
