// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use linera_sdk::{
    linera_base_types::WithContractAbi,
    views::{RootView, View},
    Contract, ContractRuntime,
};
use lottery_core::{CloseOutcome, Commitment, EngineState, OperatorReveal, Outcome, Secret, SettlementEngine};
use token_lottery::{
    convert::{account_id, amount, engine_config, tokens},
    LotteryParameters, Operation, OperationResponse, TokenLotteryAbi,
};

use self::state::TokenLotteryState;

pub struct TokenLotteryContract {
    state: TokenLotteryState,
    runtime: ContractRuntime<Self>,
}

linera_sdk::contract!(TokenLotteryContract);

impl WithContractAbi for TokenLotteryContract {
    type Abi = TokenLotteryAbi;
}

impl Contract for TokenLotteryContract {
    type Message = ();
    type Parameters = LotteryParameters;
    type InstantiationArgument = ();
    type EventValue = ();

    async fn load(runtime: ContractRuntime<Self>) -> Self {
        let state = TokenLotteryState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        TokenLotteryContract { state, runtime }
    }

    async fn instantiate(&mut self, _arg: Self::InstantiationArgument) {
        let parameters = self.runtime.application_parameters();
        if let Err(e) = engine_config(&parameters).validate() {
            panic!("Invalid lottery parameters: {}", e);
        }
    }

    async fn execute_operation(&mut self, operation: Self::Operation) -> Self::Response {
        let caller = self
            .runtime
            .authenticated_signer()
            .expect("Authentication required");
        let caller = account_id(&caller);
        let now = self.runtime.system_time().micros() / 1_000_000;

        let randomness = match &operation {
            Operation::OpenBets { commitment, .. } => match Commitment::from_hex(commitment) {
                Ok(commitment) => OperatorReveal::committing(commitment),
                Err(e) => panic!("Invalid commitment: {}", e),
            },
            Operation::RevealWinner { secret } => match Secret::from_hex(secret) {
                Ok(secret) => OperatorReveal::revealing(Some(secret)),
                Err(e) => panic!("Invalid reveal: {}", e),
            },
            _ => OperatorReveal::none(),
        };
        let extra_round = match &operation {
            Operation::ClaimRoundPrize { round_id } => Some(*round_id),
            _ => None,
        };
        let (state, working) = match self.state.load_working_set(&caller, extra_round).await {
            Ok(loaded) => loaded,
            Err(e) => panic!("Failed to load state: {:?}", e),
        };
        let (mut engine, history_limit) = self.engine(state, randomness);

        let response = match operation {
            Operation::BuyTokens { eth_amount } => match engine.mint(&caller, tokens(eth_amount)) {
                Ok(minted) => OperationResponse::Minted(amount(minted)),
                Err(e) => panic!("Failed to buy tokens: {}", e),
            },
            Operation::BurnTokens { amount: burned } => match engine.burn(&caller, tokens(burned)) {
                Ok(()) => OperationResponse::Ok,
                Err(e) => panic!("Failed to burn tokens: {}", e),
            },
            Operation::OpenBets { duration_secs, .. } => match engine.open_bets(&caller, now, duration_secs) {
                Ok(round_id) => OperationResponse::RoundOpened(round_id),
                Err(e) => panic!("Failed to open bets: {}", e),
            },
            Operation::PlaceBet { amount: bet } => match engine.place_bet(&caller, now, tokens(bet)) {
                Ok(stake) => OperationResponse::Stake(amount(stake)),
                Err(e) => panic!("Failed to place bet: {}", e),
            },
            Operation::CloseLottery => match engine.close_lottery(&caller, now) {
                Ok(closed) => OperationResponse::RoundClosed {
                    round_id: closed.round_id,
                    reveal_deadline: match closed.outcome {
                        Outcome::AwaitingReveal { reveal_deadline } => Some(reveal_deadline),
                        _ => None,
                    },
                },
                Err(e) => panic!("Failed to close lottery: {}", e),
            },
            Operation::RevealWinner { .. } => match engine.reveal_winner(&caller) {
                Ok(CloseOutcome {
                    round_id,
                    outcome: Outcome::Won { winner, prize, .. },
                }) => OperationResponse::WinnerDrawn {
                    round_id,
                    winner: winner.to_string(),
                    prize: amount(prize),
                },
                Ok(other) => panic!("Failed to reveal winner: unexpected outcome {:?}", other.outcome),
                Err(e) => panic!("Failed to reveal winner: {}", e),
            },
            Operation::CancelRound => match engine.cancel_round(&caller, now) {
                Ok(round_id) => OperationResponse::RoundCancelled(round_id),
                Err(e) => panic!("Failed to cancel round: {}", e),
            },
            Operation::ClaimPrize => match engine.claim_prize(&caller) {
                Ok(prize) => OperationResponse::PrizeClaimed(amount(prize)),
                Err(e) => panic!("Failed to claim prize: {}", e),
            },
            Operation::ClaimRoundPrize { round_id } => match engine.claim_round_prize(&caller, round_id) {
                Ok(prize) => OperationResponse::PrizeClaimed(amount(prize)),
                Err(e) => panic!("Failed to claim prize of round {}: {}", round_id, e),
            },
            Operation::WithdrawFees { amount: withdrawn } => match engine.withdraw_fees(&caller, tokens(withdrawn)) {
                Ok(()) => OperationResponse::Ok,
                Err(e) => panic!("Failed to withdraw fees: {}", e),
            },
        };

        if let Err(e) = self.state.store_working_set(engine.into_state(), working).await {
            panic!("Failed to store state: {:?}", e);
        }
        if let (OperationResponse::RoundOpened(_), Some(limit)) = (&response, history_limit) {
            if let Err(e) = self.state.prune(limit).await {
                panic!("Failed to prune rounds: {:?}", e);
            }
        }
        response
    }

    async fn execute_message(&mut self, _message: Self::Message) {
        // Every interaction is a direct operation from the signer's chain
    }

    async fn store(mut self) {
        self.state.save().await.expect("Failed to save state");
    }
}

impl TokenLotteryContract {
    /// Builds an engine over a working set. Pruning walks the stored rounds,
    /// so the history limit is returned to the caller instead of handed to
    /// the engine.
    fn engine(
        &mut self,
        state: EngineState,
        randomness: OperatorReveal,
    ) -> (SettlementEngine<OperatorReveal>, Option<usize>) {
        let mut config = engine_config(&self.runtime.application_parameters());
        let history_limit = config.history_limit.take();
        match SettlementEngine::from_state(config, state, randomness) {
            Ok(engine) => (engine, history_limit),
            Err(e) => panic!("Invalid lottery parameters: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use futures::FutureExt as _;
    use linera_sdk::{
        linera_base_types::{AccountOwner, Amount, Timestamp},
        util::BlockingWait,
        views::View,
        Contract, ContractRuntime,
    };
    use lottery_core::Secret;
    use token_lottery::{convert::account_id, LotteryParameters, Operation, OperationResponse};

    use super::{TokenLotteryContract, TokenLotteryState};

    const SECOND: u64 = 1_000_000;

    fn admin() -> AccountOwner {
        AccountOwner::Address20([1; 20])
    }

    fn alice() -> AccountOwner {
        AccountOwner::Address20([2; 20])
    }

    fn bob() -> AccountOwner {
        AccountOwner::Address20([3; 20])
    }

    fn secret() -> Secret {
        Secret::from_bytes([42; 32])
    }

    fn create_and_instantiate_lottery(history_limit: Option<u32>) -> TokenLotteryContract {
        let runtime = ContractRuntime::new()
            .with_application_parameters(LotteryParameters {
                exchange_rate: 10,
                admins: vec![admin()],
                bet_fee: Amount::ZERO,
                history_limit,
                reveal_window_secs: Some(100),
            })
            .with_system_time(Timestamp::from(0));
        let mut contract = TokenLotteryContract {
            state: TokenLotteryState::load(runtime.root_view_storage_context())
                .blocking_wait()
                .expect("Failed to read from mock key value store"),
            runtime,
        };
        contract
            .instantiate(())
            .now_or_never()
            .expect("Instantiation should not await anything");
        contract
    }

    fn execute(contract: &mut TokenLotteryContract, signer: AccountOwner, at_secs: u64, operation: Operation) -> OperationResponse {
        contract.runtime.set_authenticated_signer(Some(signer));
        contract.runtime.set_system_time(Timestamp::from(at_secs * SECOND));
        contract
            .execute_operation(operation)
            .now_or_never()
            .expect("Execution should not await anything")
    }

    fn open(contract: &mut TokenLotteryContract, at_secs: u64, duration_secs: u64) {
        let opened = execute(
            contract,
            admin(),
            at_secs,
            Operation::OpenBets {
                duration_secs,
                commitment: secret().commitment().to_hex(),
            },
        );
        assert_matches!(opened, OperationResponse::RoundOpened(_));
    }

    fn balance(contract: &TokenLotteryContract, owner: AccountOwner) -> u128 {
        contract
            .state
            .balance_of(&account_id(&owner))
            .blocking_wait()
            .expect("Failed to read balance")
    }

    #[test]
    fn test_round_settles_and_pays_winner() {
        let mut lottery = create_and_instantiate_lottery(None);
        for bettor in [alice(), bob()] {
            let response = execute(&mut lottery, bettor, 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
            assert_matches!(response, OperationResponse::Minted(minted) if minted == Amount::from_attos(10));
        }
        open(&mut lottery, 2, 60);

        let stake = execute(&mut lottery, alice(), 3, Operation::PlaceBet { amount: Amount::from_attos(4) });
        assert_matches!(stake, OperationResponse::Stake(stake) if stake == Amount::from_attos(4));
        execute(&mut lottery, bob(), 4, Operation::PlaceBet { amount: Amount::from_attos(6) });

        let closed = execute(&mut lottery, admin(), 5, Operation::CloseLottery);
        assert_matches!(closed, OperationResponse::RoundClosed { round_id: 1, reveal_deadline: Some(105) });

        let revealed = execute(&mut lottery, admin(), 6, Operation::RevealWinner { secret: secret().to_hex() });
        let winner = match revealed {
            OperationResponse::WinnerDrawn { round_id: 1, winner, prize } => {
                assert_eq!(prize, Amount::from_attos(10));
                winner
            }
            other => panic!("unexpected response {:?}", other),
        };
        let winner = [alice(), bob()]
            .into_iter()
            .find(|owner| account_id(owner).as_str() == winner)
            .expect("winner is one of the bettors");
        let before = balance(&lottery, winner);

        let claimed = execute(&mut lottery, winner, 7, Operation::ClaimPrize);
        assert_matches!(claimed, OperationResponse::PrizeClaimed(prize) if prize == Amount::from_attos(10));
        assert_eq!(balance(&lottery, winner), before + 10);
        assert_eq!(*lottery.state.total_supply.get(), 20);
        assert_eq!(*lottery.state.escrowed.get(), 0);
    }

    #[test]
    fn test_bettor_close_leaves_round_to_reveal() {
        let mut lottery = create_and_instantiate_lottery(None);
        execute(&mut lottery, alice(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, alice(), 2, Operation::PlaceBet { amount: Amount::from_attos(3) });

        let closed = execute(&mut lottery, bob(), 11, Operation::CloseLottery);
        assert_matches!(closed, OperationResponse::RoundClosed { round_id: 1, reveal_deadline: Some(111) });
        assert_eq!(balance(&lottery, alice()), 7);

        let revealed = execute(&mut lottery, admin(), 12, Operation::RevealWinner { secret: secret().to_hex() });
        assert_matches!(revealed, OperationResponse::WinnerDrawn { round_id: 1, prize, .. } if prize == Amount::from_attos(3));
    }

    #[test]
    fn test_unrevealed_round_refunds_after_deadline() {
        let mut lottery = create_and_instantiate_lottery(None);
        execute(&mut lottery, alice(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, alice(), 2, Operation::PlaceBet { amount: Amount::from_attos(3) });
        execute(&mut lottery, bob(), 11, Operation::CloseLottery);

        let cancelled = execute(&mut lottery, bob(), 111, Operation::CancelRound);
        assert_matches!(cancelled, OperationResponse::RoundCancelled(1));
        assert_eq!(balance(&lottery, alice()), 10);
        assert_eq!(*lottery.state.escrowed.get(), 0);
    }

    #[test]
    #[should_panic(expected = "Failed to cancel round")]
    fn test_cancel_before_reveal_deadline_is_rejected() {
        let mut lottery = create_and_instantiate_lottery(None);
        execute(&mut lottery, alice(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, alice(), 2, Operation::PlaceBet { amount: Amount::from_attos(3) });
        execute(&mut lottery, bob(), 11, Operation::CloseLottery);
        execute(&mut lottery, bob(), 110, Operation::CancelRound);
    }

    #[test]
    #[should_panic(expected = "Failed to reveal winner")]
    fn test_wrong_secret_is_rejected() {
        let mut lottery = create_and_instantiate_lottery(None);
        execute(&mut lottery, alice(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, alice(), 2, Operation::PlaceBet { amount: Amount::from_attos(3) });
        execute(&mut lottery, admin(), 3, Operation::CloseLottery);
        execute(
            &mut lottery,
            admin(),
            4,
            Operation::RevealWinner {
                secret: Secret::from_bytes([7; 32]).to_hex(),
            },
        );
    }

    #[test]
    #[should_panic(expected = "Failed to place bet")]
    fn test_admin_cannot_bet() {
        let mut lottery = create_and_instantiate_lottery(None);
        execute(&mut lottery, admin(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, admin(), 2, Operation::PlaceBet { amount: Amount::from_attos(3) });
    }

    #[test]
    fn test_claimed_prize_stays_claimed_after_pruning() {
        let mut lottery = create_and_instantiate_lottery(Some(1));
        execute(&mut lottery, alice(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, alice(), 2, Operation::PlaceBet { amount: Amount::from_attos(5) });
        execute(&mut lottery, admin(), 3, Operation::CloseLottery);
        execute(&mut lottery, admin(), 4, Operation::RevealWinner { secret: secret().to_hex() });
        let claimed = execute(&mut lottery, alice(), 5, Operation::ClaimPrize);
        assert_matches!(claimed, OperationResponse::PrizeClaimed(prize) if prize == Amount::from_attos(5));

        open(&mut lottery, 6, 10);
        let retained = lottery.state.retained_rounds().blocking_wait().expect("Failed to read rounds");
        assert_eq!(retained.iter().map(|round| round.id).collect::<Vec<_>>(), vec![2]);
        let claimed = lottery
            .state
            .claimed_rounds
            .get(&account_id(&alice()))
            .blocking_wait()
            .expect("Failed to read claims");
        assert_eq!(claimed.map(|ids| ids.into_iter().collect::<Vec<_>>()), Some(vec![1]));
    }

    #[test]
    #[should_panic(expected = "Prize already claimed")]
    fn test_second_claim_after_pruning_is_rejected() {
        let mut lottery = create_and_instantiate_lottery(Some(1));
        execute(&mut lottery, alice(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, alice(), 2, Operation::PlaceBet { amount: Amount::from_attos(5) });
        execute(&mut lottery, admin(), 3, Operation::CloseLottery);
        execute(&mut lottery, admin(), 4, Operation::RevealWinner { secret: secret().to_hex() });
        execute(&mut lottery, alice(), 5, Operation::ClaimPrize);
        open(&mut lottery, 6, 10);
        execute(&mut lottery, alice(), 7, Operation::ClaimRoundPrize { round_id: 1 });
    }

    #[test]
    #[should_panic(expected = "Failed to open bets")]
    fn test_non_admin_cannot_open() {
        let mut lottery = create_and_instantiate_lottery(None);
        execute(
            &mut lottery,
            alice(),
            1,
            Operation::OpenBets {
                duration_secs: 10,
                commitment: secret().commitment().to_hex(),
            },
        );
    }

    #[test]
    #[should_panic(expected = "Failed to place bet")]
    fn test_bet_beyond_balance_is_rejected() {
        let mut lottery = create_and_instantiate_lottery(None);
        execute(&mut lottery, alice(), 1, Operation::BuyTokens { eth_amount: Amount::from_attos(1) });
        open(&mut lottery, 1, 10);
        execute(&mut lottery, alice(), 2, Operation::PlaceBet { amount: Amount::from_attos(11) });
    }
}
