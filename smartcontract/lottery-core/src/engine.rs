// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    settlement, AccessControl, AccountId, ConfigError, EngineConfig, LotteryError, LotteryResult,
    LotteryRound, Outcome, RandomnessSource, RefundReason, RoundBook, RoundId, Timestamp, TokenLedger, Tokens,
};

/// Everything the engine mutates. Hosts persist this between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub ledger: TokenLedger,
    pub rounds: RoundBook,
    /// Bet fees held in escrow until an admin withdraws them.
    pub fee_pool: Tokens,
    /// Lifetime prizes claimed per account.
    pub prizes_won: BTreeMap<AccountId, Tokens>,
    /// Rounds whose prize each account has claimed. Outlives history pruning.
    #[serde(default)]
    pub claimed_rounds: BTreeMap<AccountId, BTreeSet<RoundId>>,
    /// Most recent round that drew a winner.
    #[serde(default)]
    pub last_winning_round: Option<RoundId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryStatus {
    pub open: bool,
    /// Only set while the current round is open.
    pub closing_time: Option<Timestamp>,
    pub accepting_bets: bool,
    /// Only set while the current round waits for its secret.
    pub reveal_deadline: Option<Timestamp>,
    pub round_id: Option<RoundId>,
    pub prize_pool: Tokens,
    pub participants: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutcome {
    pub round_id: RoundId,
    pub outcome: Outcome,
}

/// Composition root: sequences the ledger, rounds, settlement and access
/// control behind one `&mut self` API. Every method checks its preconditions
/// before mutating, so an `Err` leaves the state untouched.
pub struct SettlementEngine<R> {
    config: EngineConfig,
    access: AccessControl,
    state: EngineState,
    randomness: R,
}

impl<R: RandomnessSource> SettlementEngine<R> {
    pub fn new(config: EngineConfig, randomness: R) -> Result<Self, ConfigError> {
        Self::from_state(config, EngineState::default(), randomness)
    }

    pub fn from_state(config: EngineConfig, state: EngineState, randomness: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let access = AccessControl::new(config.admins.clone());
        Ok(SettlementEngine {
            config,
            access,
            state,
            randomness,
        })
    }

    pub fn into_state(self) -> EngineState {
        self.state
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn mint(&mut self, caller: &AccountId, eth_amount: u128) -> LotteryResult<Tokens> {
        let minted = self.state.ledger.mint(caller, eth_amount, self.config.exchange_rate)?;
        info!(account = %caller, eth_amount, minted, "tokens bought");
        Ok(minted)
    }

    pub fn burn(&mut self, caller: &AccountId, amount: Tokens) -> LotteryResult<()> {
        self.state.ledger.burn(caller, amount)?;
        info!(account = %caller, amount, "tokens burned");
        Ok(())
    }

    pub fn balance_of(&self, account: &AccountId) -> Tokens {
        self.state.ledger.balance_of(account)
    }

    pub fn open_bets(&mut self, caller: &AccountId, now: Timestamp, duration: u64) -> LotteryResult<RoundId> {
        self.access.ensure_admin(caller).map_err(|e| {
            debug!(account = %caller, "rejected open_bets from non-admin");
            e
        })?;
        if let Some(round) = self.state.rounds.unsettled_round() {
            return Err(if round.is_open() {
                LotteryError::AlreadyOpen
            } else {
                LotteryError::AwaitingReveal { round_id: round.id }
            });
        }
        if duration == 0 {
            return Err(LotteryError::InvalidDuration);
        }

        let round_id = self.state.rounds.next_id();
        let commitment = self
            .randomness
            .commit(round_id)
            .map_err(|e| LotteryError::RandomnessUnavailable(e.to_string()))?;
        let round = LotteryRound::open(round_id, now, duration, commitment)?;
        let closing_time = round.closing_time;
        self.state.rounds.push(round);

        if let Some(limit) = self.config.history_limit {
            let pruned = self.state.rounds.prune(limit);
            if !pruned.is_empty() {
                debug!(?pruned, "pruned finished rounds");
            }
        }

        info!(round_id, closing_time, %commitment, "betting opened");
        Ok(round_id)
    }

    /// Returns the caller's accumulated stake in the open round. Admins hold
    /// the committed secret and may not bet.
    pub fn place_bet(&mut self, caller: &AccountId, now: Timestamp, amount: Tokens) -> LotteryResult<Tokens> {
        if self.access.is_admin(caller) {
            debug!(account = %caller, "rejected bet from admin");
            return Err(LotteryError::Unauthorized);
        }
        let round = self.state.rounds.open_round_mut().ok_or(LotteryError::LotteryNotOpen)?;
        round.ensure_accepting(now)?;
        if amount == 0 {
            return Err(LotteryError::InvalidAmount);
        }
        let fee = self.config.bet_fee;
        let locked = amount.checked_add(fee).ok_or(LotteryError::InvalidAmount)?;

        self.state.ledger.lock(caller, locked)?;
        let stake = round.record_bet(caller, amount);
        self.state.fee_pool += fee;
        info!(round_id = round.id, account = %caller, amount, fee, stake, prize_pool = round.prize_pool, "bet placed");
        Ok(stake)
    }

    /// Stops betting. Admins may close early, anyone once the closing time
    /// has passed. A round with bets then waits for [`Self::reveal_winner`].
    pub fn close_lottery(&mut self, caller: &AccountId, now: Timestamp) -> LotteryResult<CloseOutcome> {
        let is_admin = self.access.is_admin(caller);
        let round = self.state.rounds.open_round_mut().ok_or(LotteryError::LotteryNotOpen)?;
        if !is_admin && !round.is_expired(now) {
            return Err(LotteryError::NotYetExpired {
                closing_time: round.closing_time,
            });
        }

        let outcome = settlement::close(round, &self.state.ledger, now, self.config.reveal_window)?;
        debug!(round_id = round.id, closed_by = %caller, "lottery closed");
        Ok(CloseOutcome {
            round_id: round.id,
            outcome,
        })
    }

    /// Admin step after close: reveals the committed secret and draws the winner.
    pub fn reveal_winner(&mut self, caller: &AccountId) -> LotteryResult<CloseOutcome> {
        self.access.ensure_admin(caller)?;
        let round = self
            .state
            .rounds
            .unsettled_round_mut()
            .filter(|round| round.is_awaiting_reveal())
            .ok_or(LotteryError::NothingToReveal)?;
        let outcome = settlement::reveal(round, &mut self.randomness)?;
        let round_id = round.id;
        if round.winner().is_some() {
            self.state.last_winning_round = Some(round_id);
        }
        Ok(CloseOutcome { round_id, outcome })
    }

    /// Refunds every bet of the unsettled round. Admins may cancel an open
    /// round; a closed round whose secret was not revealed in time can be
    /// refunded by anyone.
    pub fn cancel_round(&mut self, caller: &AccountId, now: Timestamp) -> LotteryResult<RoundId> {
        let is_admin = self.access.is_admin(caller);
        let round = self.state.rounds.unsettled_round_mut().ok_or(LotteryError::LotteryNotOpen)?;
        let reason = match round.reveal_deadline() {
            None if is_admin => RefundReason::Cancelled,
            None => return Err(LotteryError::Unauthorized),
            Some(reveal_deadline) if now < reveal_deadline => {
                return Err(LotteryError::RevealWindowOpen { reveal_deadline })
            }
            Some(_) => RefundReason::RevealExpired,
        };
        settlement::refund(round, &mut self.state.ledger, now, reason)?;
        info!(round_id = round.id, cancelled_by = %caller, "round cancelled");
        Ok(round.id)
    }

    /// Pays the caller's oldest unclaimed prize.
    pub fn claim_prize(&mut self, caller: &AccountId) -> LotteryResult<Tokens> {
        if self.state.last_winning_round.is_none() {
            return Err(LotteryError::NoRoundSettled);
        }
        let rounds = &mut self.state.rounds;
        let won_before = self.state.claimed_rounds.get(caller).is_some_and(|ids| !ids.is_empty())
            || rounds.iter().any(|round| round.winner() == Some(caller));
        let pending = rounds
            .iter_mut()
            .find(|round| round.has_pending_claim() && round.winner() == Some(caller));
        let (round_id, prize) = match pending {
            Some(round) => (round.id, settlement::claim(round, &mut self.state.ledger, caller)?),
            None if won_before => return Err(LotteryError::AlreadyClaimed),
            None => return Err(LotteryError::Unauthorized),
        };
        self.record_claim(caller, round_id, prize);
        Ok(prize)
    }

    pub fn claim_round_prize(&mut self, caller: &AccountId, round_id: RoundId) -> LotteryResult<Tokens> {
        let already_claimed = self.has_claimed(caller, round_id);
        let prize = match self.state.rounds.get_mut(round_id) {
            Some(round) => settlement::claim(round, &mut self.state.ledger, caller)?,
            None if already_claimed => return Err(LotteryError::AlreadyClaimed),
            None => return Err(LotteryError::NoRoundSettled),
        };
        self.record_claim(caller, round_id, prize);
        Ok(prize)
    }

    pub fn withdraw_fees(&mut self, caller: &AccountId, amount: Tokens) -> LotteryResult<()> {
        self.access.ensure_admin(caller)?;
        if amount == 0 {
            return Err(LotteryError::InvalidAmount);
        }
        if amount > self.state.fee_pool {
            return Err(LotteryError::InsufficientBalance {
                available: self.state.fee_pool,
                requested: amount,
            });
        }
        self.state.ledger.credit(caller, amount)?;
        self.state.fee_pool -= amount;
        info!(account = %caller, amount, fee_pool = self.state.fee_pool, "fees withdrawn");
        Ok(())
    }

    pub fn lottery_status(&self, now: Timestamp) -> LotteryStatus {
        match self.state.rounds.current() {
            Some(round) => LotteryStatus {
                open: round.is_open(),
                closing_time: round.is_open().then_some(round.closing_time),
                accepting_bets: round.ensure_accepting(now).is_ok(),
                reveal_deadline: round.reveal_deadline(),
                round_id: Some(round.id),
                prize_pool: round.prize_pool,
                participants: round.participants(),
            },
            None => LotteryStatus {
                open: false,
                closing_time: None,
                accepting_bets: false,
                reveal_deadline: None,
                round_id: None,
                prize_pool: 0,
                participants: 0,
            },
        }
    }

    pub fn round(&self, round_id: RoundId) -> Option<&LotteryRound> {
        self.state.rounds.get(round_id)
    }

    pub fn rounds(&self) -> impl Iterator<Item = &LotteryRound> {
        self.state.rounds.iter()
    }

    pub fn current_round(&self) -> Option<&LotteryRound> {
        self.state.rounds.current()
    }

    pub fn total_supply(&self) -> Tokens {
        self.state.ledger.total_supply()
    }

    pub fn fee_pool(&self) -> Tokens {
        self.state.fee_pool
    }

    pub fn prizes_won(&self, account: &AccountId) -> Tokens {
        self.state.prizes_won.get(account).copied().unwrap_or(0)
    }

    pub fn has_claimed(&self, account: &AccountId, round_id: RoundId) -> bool {
        self.state
            .claimed_rounds
            .get(account)
            .is_some_and(|ids| ids.contains(&round_id))
    }

    /// Supply equals balances plus escrow, and escrow is exactly the unsettled
    /// round's pool, the unclaimed prizes and the fee pool.
    pub fn is_conserved(&self) -> bool {
        let held: Tokens = self.state.rounds.iter().map(LotteryRound::escrowed).sum();
        self.state.ledger.is_conserved() && self.state.ledger.escrowed() == held + self.state.fee_pool
    }

    fn record_claim(&mut self, caller: &AccountId, round_id: RoundId, prize: Tokens) {
        *self.state.prizes_won.entry(caller.clone()).or_default() += prize;
        self.state
            .claimed_rounds
            .entry(caller.clone())
            .or_default()
            .insert(round_id);
    }
}
