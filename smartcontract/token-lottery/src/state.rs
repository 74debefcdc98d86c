// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use linera_sdk::views::{linera_views, MapView, RegisterView, RootView, ViewError, ViewStorageContext};
use lottery_core::{AccountId, EngineState, LotteryRound, RoundBook, RoundId, TokenLedger, Tokens};

/// The application state. Per-account and per-round data live in maps so an
/// operation only touches the entries it needs; registers hold the totals.
#[derive(RootView)]
#[view(context = ViewStorageContext)]
pub struct TokenLotteryState {
    /// Spendable balance per account
    pub balances: MapView<AccountId, Tokens>,
    pub total_supply: RegisterView<Tokens>,
    /// Tokens held for open rounds, unclaimed prizes and fees
    pub escrowed: RegisterView<Tokens>,
    /// Bet fees not yet withdrawn
    pub fee_pool: RegisterView<Tokens>,
    /// Id of the latest round, 0 before the first one
    pub round_counter: RegisterView<RoundId>,
    /// Lowest round id not pruned yet
    pub oldest_round: RegisterView<RoundId>,
    /// Retained rounds with their bets
    pub rounds: MapView<RoundId, LotteryRound>,
    /// Most recent round that drew a winner
    pub last_winning_round: RegisterView<Option<RoundId>>,
    /// Rounds each account won and has not claimed yet
    pub unclaimed_wins: MapView<AccountId, BTreeSet<RoundId>>,
    /// Rounds each account has claimed, kept after the round is pruned
    pub claimed_rounds: MapView<AccountId, BTreeSet<RoundId>>,
    /// Lifetime claimed prizes per account
    pub prizes_won: MapView<AccountId, Tokens>,
}

/// The slice of state one operation runs against.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct WorkingSet {
    pub accounts: BTreeSet<AccountId>,
    pub rounds: BTreeSet<RoundId>,
}

#[allow(dead_code)]
impl TokenLotteryState {
    /// Loads what an operation by `caller` can read or change: the current
    /// round and its bettors, the caller's unclaimed wins plus `extra_round`,
    /// and the caller's own records.
    pub async fn load_working_set(
        &self,
        caller: &AccountId,
        extra_round: Option<RoundId>,
    ) -> Result<(EngineState, WorkingSet), ViewError> {
        let round_counter = *self.round_counter.get();
        let mut working = WorkingSet::default();
        if round_counter > 0 {
            working.rounds.insert(round_counter);
        }
        if let Some(wins) = self.unclaimed_wins.get(caller).await? {
            working.rounds.extend(wins);
        }
        working.rounds.extend(extra_round);

        let mut rounds = Vec::new();
        for round_id in &working.rounds {
            if let Some(round) = self.rounds.get(round_id).await? {
                rounds.push(round);
            }
        }

        working.accounts.insert(caller.clone());
        if let Some(current) = rounds.iter().find(|round| round.id == round_counter) {
            working.accounts.extend(current.bets.keys().cloned());
        }
        let mut balances = Vec::new();
        for account in &working.accounts {
            if let Some(balance) = self.balances.get(account).await? {
                balances.push((account.clone(), balance));
            }
        }

        let mut prizes_won = BTreeMap::new();
        if let Some(won) = self.prizes_won.get(caller).await? {
            prizes_won.insert(caller.clone(), won);
        }
        let mut claimed_rounds = BTreeMap::new();
        if let Some(claimed) = self.claimed_rounds.get(caller).await? {
            claimed_rounds.insert(caller.clone(), claimed);
        }

        let state = EngineState {
            ledger: TokenLedger::from_parts(balances, *self.total_supply.get(), *self.escrowed.get()),
            rounds: RoundBook::from_parts(round_counter, rounds),
            fee_pool: *self.fee_pool.get(),
            prizes_won,
            claimed_rounds,
            last_winning_round: *self.last_winning_round.get(),
        };
        Ok((state, working))
    }

    /// Writes a working set back after the engine ran on it.
    pub async fn store_working_set(&mut self, state: EngineState, working: WorkingSet) -> Result<(), ViewError> {
        let EngineState {
            ledger,
            rounds,
            fee_pool,
            prizes_won,
            claimed_rounds,
            last_winning_round,
        } = state;

        let mut accounts = working.accounts;
        accounts.extend(ledger.balances().map(|(account, _)| account.clone()));
        for account in &accounts {
            match ledger.balance_of(account) {
                0 => self.balances.remove(account)?,
                balance => self.balances.insert(account, balance)?,
            }
        }
        self.total_supply.set(ledger.total_supply());
        self.escrowed.set(ledger.escrowed());
        self.fee_pool.set(fee_pool);

        self.round_counter.set(rounds.round_counter());
        for round in rounds.iter() {
            self.track_unclaimed(round).await?;
            self.rounds.insert(&round.id, round.clone())?;
        }
        self.last_winning_round.set(last_winning_round);

        for (account, won) in &prizes_won {
            self.prizes_won.insert(account, *won)?;
        }
        for (account, claimed) in claimed_rounds {
            self.claimed_rounds.insert(&account, claimed)?;
        }
        Ok(())
    }

    async fn track_unclaimed(&mut self, round: &LotteryRound) -> Result<(), ViewError> {
        let Some(winner) = round.winner() else {
            return Ok(());
        };
        let mut wins = self.unclaimed_wins.get(winner).await?.unwrap_or_default();
        let changed = if round.has_pending_claim() {
            wins.insert(round.id)
        } else {
            wins.remove(&round.id)
        };
        if !changed {
            return Ok(());
        }
        if wins.is_empty() {
            self.unclaimed_wins.remove(winner)
        } else {
            self.unclaimed_wins.insert(winner, wins)
        }
    }

    /// Drops finished rounds from the front of the history until at most
    /// `limit` remain, stopping at the first round that still holds escrow.
    /// The current round is always kept.
    pub async fn prune(&mut self, limit: usize) -> Result<Vec<RoundId>, ViewError> {
        let current = *self.round_counter.get();
        let keep = limit.max(1) as u64;
        let mut oldest = (*self.oldest_round.get()).max(1);
        let mut pruned = Vec::new();
        while oldest < current && current - oldest + 1 > keep {
            match self.rounds.get(&oldest).await? {
                Some(round) if !round.is_finished() => break,
                Some(_) => {
                    self.rounds.remove(&oldest)?;
                    pruned.push(oldest);
                }
                None => {}
            }
            oldest += 1;
        }
        self.oldest_round.set(oldest);
        Ok(pruned)
    }

    pub async fn balance_of(&self, account: &AccountId) -> Result<Tokens, ViewError> {
        Ok(self.balances.get(account).await?.unwrap_or(0))
    }

    pub async fn current_round(&self) -> Result<Option<LotteryRound>, ViewError> {
        self.rounds.get(&*self.round_counter.get()).await
    }

    /// Retained rounds, oldest first.
    pub async fn retained_rounds(&self) -> Result<Vec<LotteryRound>, ViewError> {
        let mut rounds = Vec::new();
        for round_id in (*self.oldest_round.get()).max(1)..=*self.round_counter.get() {
            if let Some(round) = self.rounds.get(&round_id).await? {
                rounds.push(round);
            }
        }
        Ok(rounds)
    }
}
