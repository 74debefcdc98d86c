// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(target_arch = "wasm32", no_main)]

mod state;

use std::sync::Arc;

use async_graphql::{EmptySubscription, Object, Request, Response, Schema};
use linera_sdk::{
    linera_base_types::{AccountOwner, Amount, WithServiceAbi},
    views::View,
    Service, ServiceRuntime,
};
use lottery_core::{EngineState, OperatorReveal, RoundBook, Secret, SettlementEngine};
use token_lottery::{
    convert::{self, account_id, amount},
    BetEntry, LotteryParameters, LotteryStatus, Operation, RoundInfo, TokenLotteryAbi,
};

use self::state::TokenLotteryState;

pub struct TokenLotteryService {
    state: Arc<TokenLotteryState>,
    runtime: Arc<ServiceRuntime<Self>>,
}

linera_sdk::service!(TokenLotteryService);

impl WithServiceAbi for TokenLotteryService {
    type Abi = TokenLotteryAbi;
}

impl Service for TokenLotteryService {
    type Parameters = LotteryParameters;

    async fn new(runtime: ServiceRuntime<Self>) -> Self {
        let state = TokenLotteryState::load(runtime.root_view_storage_context())
            .await
            .expect("Failed to load state");
        TokenLotteryService {
            state: Arc::new(state),
            runtime: Arc::new(runtime),
        }
    }

    async fn handle_query(&self, request: Request) -> Response {
        let schema = Schema::build(
            QueryRoot {
                state: self.state.clone(),
                runtime: self.runtime.clone(),
            },
            MutationRoot {
                runtime: self.runtime.clone(),
            },
            EmptySubscription,
        )
        .finish();
        schema.execute(request).await
    }
}

struct QueryRoot {
    state: Arc<TokenLotteryState>,
    runtime: Arc<ServiceRuntime<TokenLotteryService>>,
}

#[Object]
impl QueryRoot {
    /// Status of the current round as seen at the chain's current time
    async fn lottery_status(&self) -> async_graphql::Result<LotteryStatus> {
        let now = self.runtime.system_time().micros() / 1_000_000;
        let mut config = convert::engine_config(&self.runtime.application_parameters());
        config.history_limit = None;
        let state = EngineState {
            rounds: RoundBook::from_parts(*self.state.round_counter.get(), self.state.current_round().await?),
            ..EngineState::default()
        };
        let engine = SettlementEngine::from_state(config, state, OperatorReveal::none())?;
        Ok(convert::lottery_status(engine.lottery_status(now)))
    }

    async fn balance(&self, owner: AccountOwner) -> async_graphql::Result<Amount> {
        Ok(amount(self.state.balance_of(&account_id(&owner)).await?))
    }

    async fn total_supply(&self) -> Amount {
        amount(*self.state.total_supply.get())
    }

    /// Bet fees collected and not yet withdrawn
    async fn fee_pool(&self) -> Amount {
        amount(*self.state.fee_pool.get())
    }

    /// Lifetime prizes claimed by an owner
    async fn prizes_won(&self, owner: AccountOwner) -> async_graphql::Result<Amount> {
        let won = self.state.prizes_won.get(&account_id(&owner)).await?;
        Ok(amount(won.unwrap_or(0)))
    }

    /// Rounds the owner won and has not claimed yet
    async fn unclaimed_rounds(&self, owner: AccountOwner) -> async_graphql::Result<Vec<u64>> {
        let wins = self.state.unclaimed_wins.get(&account_id(&owner)).await?;
        Ok(wins.unwrap_or_default().into_iter().collect())
    }

    async fn is_admin(&self, owner: AccountOwner) -> bool {
        self.runtime.application_parameters().admins.contains(&owner)
    }

    async fn round(&self, id: u64) -> async_graphql::Result<Option<RoundInfo>> {
        Ok(self.state.rounds.get(&id).await?.as_ref().map(convert::round_info))
    }

    /// Retained rounds, oldest first
    async fn rounds(&self) -> async_graphql::Result<Vec<RoundInfo>> {
        let rounds = self.state.retained_rounds().await?;
        Ok(rounds.iter().map(convert::round_info).collect())
    }

    async fn bets(&self, round_id: u64) -> async_graphql::Result<Vec<BetEntry>> {
        let round = self.state.rounds.get(&round_id).await?;
        Ok(round.as_ref().map(convert::bet_entries).unwrap_or_default())
    }

    /// Commitment to publish with `openBets` for a hex secret
    async fn commitment_for(&self, secret: String) -> async_graphql::Result<String> {
        Ok(Secret::from_hex(&secret)?.commitment().to_hex())
    }
}

struct MutationRoot {
    runtime: Arc<ServiceRuntime<TokenLotteryService>>,
}

#[Object]
impl MutationRoot {
    /// Mint tokens for an ETH amount the gateway already received
    async fn buy_tokens(&self, eth_amount: Amount) -> String {
        self.runtime.schedule_operation(&Operation::BuyTokens { eth_amount });
        format!("BuyTokens operation scheduled for {}", eth_amount)
    }

    async fn burn_tokens(&self, amount: Amount) -> String {
        self.runtime.schedule_operation(&Operation::BurnTokens { amount });
        format!("BurnTokens operation scheduled for {}", amount)
    }

    /// Open a round that accepts bets for `duration_secs`
    async fn open_bets(&self, duration_secs: u64, commitment: String) -> String {
        self.runtime.schedule_operation(&Operation::OpenBets {
            duration_secs,
            commitment,
        });
        format!("OpenBets operation scheduled for {} seconds", duration_secs)
    }

    async fn place_bet(&self, amount: Amount) -> String {
        self.runtime.schedule_operation(&Operation::PlaceBet { amount });
        format!("PlaceBet operation scheduled for {}", amount)
    }

    /// Stop betting on the open round
    async fn close_lottery(&self) -> String {
        self.runtime.schedule_operation(&Operation::CloseLottery);
        "CloseLottery operation scheduled".to_string()
    }

    /// Reveal the secret behind the closed round's commitment and draw the winner
    async fn reveal_winner(&self, secret: String) -> String {
        self.runtime.schedule_operation(&Operation::RevealWinner { secret });
        "RevealWinner operation scheduled".to_string()
    }

    async fn cancel_round(&self) -> String {
        self.runtime.schedule_operation(&Operation::CancelRound);
        "CancelRound operation scheduled".to_string()
    }

    async fn claim_prize(&self) -> String {
        self.runtime.schedule_operation(&Operation::ClaimPrize);
        "ClaimPrize operation scheduled".to_string()
    }

    async fn claim_round_prize(&self, round_id: u64) -> String {
        self.runtime.schedule_operation(&Operation::ClaimRoundPrize { round_id });
        format!("ClaimRoundPrize operation scheduled for round {}", round_id)
    }

    async fn withdraw_fees(&self, amount: Amount) -> String {
        self.runtime.schedule_operation(&Operation::WithdrawFees { amount });
        format!("WithdrawFees operation scheduled for {}", amount)
    }
}
