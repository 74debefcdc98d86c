// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Gateway-facing boundary and the thread-safe engine handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::{
    AccountId, CloseOutcome, EngineState, LotteryResult, LotteryStatus, RandomnessSource, RoundId,
    SettlementEngine, Timestamp, Tokens,
};

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        ManualClock(AtomicU64::new(now))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// The operations a client gateway calls, with the caller already resolved.
pub trait LotteryService {
    fn mint(&self, caller: &AccountId, eth_amount: u128) -> LotteryResult<Tokens>;

    fn burn(&self, caller: &AccountId, amount: Tokens) -> LotteryResult<()>;

    fn balance_of(&self, account: &AccountId) -> Tokens;

    fn open_bets(&self, caller: &AccountId, duration: u64) -> LotteryResult<RoundId>;

    fn place_bet(&self, caller: &AccountId, amount: Tokens) -> LotteryResult<Tokens>;

    fn close_lottery(&self, caller: &AccountId) -> LotteryResult<CloseOutcome>;

    fn reveal_winner(&self, caller: &AccountId) -> LotteryResult<CloseOutcome>;

    fn cancel_round(&self, caller: &AccountId) -> LotteryResult<RoundId>;

    fn claim_prize(&self, caller: &AccountId) -> LotteryResult<Tokens>;

    fn lottery_status(&self) -> LotteryStatus;
}

/// Shared handle over one engine. Each call takes the lock, reads the clock
/// and runs to completion, so calls from any number of threads apply in a
/// single total order.
pub struct SharedEngine<R, C> {
    inner: Arc<Mutex<SettlementEngine<R>>>,
    clock: Arc<C>,
}

impl<R, C> Clone for SharedEngine<R, C> {
    fn clone(&self) -> Self {
        SharedEngine {
            inner: self.inner.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<R: RandomnessSource, C: Clock> SharedEngine<R, C> {
    pub fn new(engine: SettlementEngine<R>, clock: Arc<C>) -> Self {
        SharedEngine {
            inner: Arc::new(Mutex::new(engine)),
            clock,
        }
    }

    /// Runs `f` under the lock with the current time.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut SettlementEngine<R>, Timestamp) -> T) -> T {
        let mut engine = self.inner.lock();
        let now = self.clock.now();
        f(&mut *engine, now)
    }

    pub fn snapshot(&self) -> EngineState {
        self.inner.lock().state().clone()
    }

    pub fn is_conserved(&self) -> bool {
        self.inner.lock().is_conserved()
    }
}

impl<R: RandomnessSource, C: Clock> LotteryService for SharedEngine<R, C> {
    fn mint(&self, caller: &AccountId, eth_amount: u128) -> LotteryResult<Tokens> {
        self.with_engine(|engine, _| engine.mint(caller, eth_amount))
    }

    fn burn(&self, caller: &AccountId, amount: Tokens) -> LotteryResult<()> {
        self.with_engine(|engine, _| engine.burn(caller, amount))
    }

    fn balance_of(&self, account: &AccountId) -> Tokens {
        self.inner.lock().balance_of(account)
    }

    fn open_bets(&self, caller: &AccountId, duration: u64) -> LotteryResult<RoundId> {
        self.with_engine(|engine, now| engine.open_bets(caller, now, duration))
    }

    fn place_bet(&self, caller: &AccountId, amount: Tokens) -> LotteryResult<Tokens> {
        self.with_engine(|engine, now| engine.place_bet(caller, now, amount))
    }

    fn close_lottery(&self, caller: &AccountId) -> LotteryResult<CloseOutcome> {
        self.with_engine(|engine, now| engine.close_lottery(caller, now))
    }

    fn reveal_winner(&self, caller: &AccountId) -> LotteryResult<CloseOutcome> {
        self.with_engine(|engine, _| engine.reveal_winner(caller))
    }

    fn cancel_round(&self, caller: &AccountId) -> LotteryResult<RoundId> {
        self.with_engine(|engine, now| engine.cancel_round(caller, now))
    }

    fn claim_prize(&self, caller: &AccountId) -> LotteryResult<Tokens> {
        self.with_engine(|engine, _| engine.claim_prize(caller))
    }

    fn lottery_status(&self) -> LotteryStatus {
        self.with_engine(|engine, now| engine.lottery_status(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineConfig, ExchangeRate, LotteryError, Outcome, SecretBeacon};

    #[test]
    fn test_service_reads_injected_clock() {
        let admin = AccountId::from("admin");
        let alice = AccountId::from("alice");
        let config = EngineConfig::new(ExchangeRate::new(10), [admin.clone()]);
        let clock = Arc::new(ManualClock::new(1_000));
        let service = SharedEngine::new(SettlementEngine::new(config, SecretBeacon::new([1; 32])).unwrap(), clock.clone());

        service.mint(&alice, 1).unwrap();
        service.open_bets(&admin, 60).unwrap();
        assert_eq!(service.lottery_status().closing_time, Some(1_060));

        clock.advance(60);
        assert_eq!(service.place_bet(&alice, 1), Err(LotteryError::Expired { closing_time: 1_060 }));
        assert!(service.close_lottery(&alice).is_ok());
        assert_eq!(service.balance_of(&alice), 10);
    }

    #[test]
    fn test_service_refunds_after_reveal_deadline() {
        let admin = AccountId::from("admin");
        let alice = AccountId::from("alice");
        let config = EngineConfig::new(ExchangeRate::new(10), [admin.clone()]).with_reveal_window(600);
        let clock = Arc::new(ManualClock::new(0));
        let service = SharedEngine::new(SettlementEngine::new(config, SecretBeacon::new([1; 32])).unwrap(), clock.clone());

        service.mint(&alice, 1).unwrap();
        service.open_bets(&admin, 60).unwrap();
        service.place_bet(&alice, 4).unwrap();
        clock.set(60);
        let closed = service.close_lottery(&alice).unwrap();
        assert_eq!(closed.outcome, Outcome::AwaitingReveal { reveal_deadline: 660 });
        assert_eq!(service.lottery_status().reveal_deadline, Some(660));

        clock.set(659);
        assert_eq!(service.cancel_round(&alice), Err(LotteryError::RevealWindowOpen { reveal_deadline: 660 }));
        clock.set(660);
        assert_eq!(service.cancel_round(&alice), Ok(1));
        assert_eq!(service.balance_of(&alice), 10);
        assert!(service.is_conserved());
    }

    #[test]
    fn test_system_clock_is_past_2020() {
        assert!(SystemClock.now() > 1_577_836_800);
    }
}
