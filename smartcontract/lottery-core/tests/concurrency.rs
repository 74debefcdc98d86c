// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::thread;

use lottery_core::{
    AccountId, EngineConfig, ExchangeRate, LotteryError, LotteryService, ManualClock, SecretBeacon, SettlementEngine,
    SharedEngine,
};

const BETTORS: usize = 8;
const BETS_PER_THREAD: usize = 50;

fn shared_engine() -> (SharedEngine<SecretBeacon, ManualClock>, AccountId) {
    let admin = AccountId::from("admin");
    let config = EngineConfig::new(ExchangeRate::new(100), [admin.clone()]);
    let engine = SettlementEngine::new(config, SecretBeacon::new([21; 32])).expect("valid config");
    (SharedEngine::new(engine, Arc::new(ManualClock::new(0))), admin)
}

fn bettor(index: usize) -> AccountId {
    AccountId::new(format!("bettor-{index}"))
}

#[test]
fn test_concurrent_bets_are_all_counted() {
    let (service, admin) = shared_engine();
    for index in 0..BETTORS {
        service.mint(&bettor(index), 1).unwrap();
    }
    service.open_bets(&admin, 3_600).unwrap();

    let handles: Vec<_> = (0..BETTORS)
        .map(|index| {
            let service = service.clone();
            thread::spawn(move || {
                for _ in 0..BETS_PER_THREAD {
                    service.place_bet(&bettor(index), 1).expect("bet accepted");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("bettor thread panicked");
    }

    let status = service.lottery_status();
    assert_eq!(status.prize_pool, (BETTORS * BETS_PER_THREAD) as u128);
    assert_eq!(status.participants, BETTORS);
    for index in 0..BETTORS {
        assert_eq!(service.balance_of(&bettor(index)), 100 - BETS_PER_THREAD as u128);
    }
    assert!(service.is_conserved());
}

#[test]
fn test_close_racing_bets_drops_nothing() {
    let (service, admin) = shared_engine();
    for index in 0..BETTORS {
        service.mint(&bettor(index), 1).unwrap();
    }
    service.open_bets(&admin, 3_600).unwrap();

    let bettors: Vec<_> = (0..BETTORS)
        .map(|index| {
            let service = service.clone();
            thread::spawn(move || {
                let mut accepted = 0u128;
                for _ in 0..BETS_PER_THREAD {
                    match service.place_bet(&bettor(index), 1) {
                        Ok(_) => accepted += 1,
                        Err(LotteryError::LotteryNotOpen) => {}
                        Err(other) => panic!("unexpected rejection {other}"),
                    }
                }
                (index, accepted)
            })
        })
        .collect();
    let closer = {
        let service = service.clone();
        let admin = admin.clone();
        thread::spawn(move || service.close_lottery(&admin).expect("admin close"))
    };

    let closed = closer.join().expect("closer thread panicked");
    let snapshot = service.snapshot();
    let round = snapshot.rounds.get(closed.round_id).expect("closed round kept");

    let mut accepted_total = 0u128;
    for handle in bettors {
        let (index, accepted) = handle.join().expect("bettor thread panicked");
        assert_eq!(round.bet_of(&bettor(index)), accepted);
        assert_eq!(service.balance_of(&bettor(index)) + accepted, 100);
        accepted_total += accepted;
    }
    assert_eq!(round.prize_pool, accepted_total);
    assert!(service.is_conserved());
}

#[test]
fn test_only_one_concurrent_open_succeeds() {
    let (service, admin) = shared_engine();
    let handles: Vec<_> = (0..BETTORS)
        .map(|_| {
            let service = service.clone();
            let admin = admin.clone();
            thread::spawn(move || service.open_bets(&admin, 60))
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("opener thread panicked"))
        .collect();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|error| *error == LotteryError::AlreadyOpen));
}
