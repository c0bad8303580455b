// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

//! End-to-end allocator flows over an in-memory venue: deposits spread
//! into the target portfolio, price moves trigger threshold-gated
//! rebalancing, withdrawals shrink the portfolio proportionally.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use mitander_alloc::domain::error::{EngineError, SwapFailure};
use mitander_alloc::domain::types::{Allocation, TokenMeta};
use mitander_alloc::infrastructure::exchange::Exchange;
use mitander_alloc::infrastructure::pricing::StaticPriceSource;
use mitander_alloc::portfolio::{PortfolioEngine, PortfolioService};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const USDC: Address = Address::repeat_byte(0xba); // 6 decimals, base
const WETH: Address = Address::repeat_byte(0x1e); // 18 decimals, bridge
const DAI: Address = Address::repeat_byte(0xda); // 18 decimals

const ADMIN: Address = Address::repeat_byte(0xad);
const POOL: Address = Address::repeat_byte(0x90);

const DOLLAR: u128 = 100_000_000; // 8-decimal price feeds

/// Venue double that converts along any route at the same oracle prices
/// the engine sees, honoring each token's native decimals.
struct MirrorVenue {
    listings: Mutex<HashMap<Address, (u128, u8)>>, // price, token decimals
    wallet: Mutex<HashMap<Address, U256>>,
}

impl MirrorVenue {
    fn new() -> Arc<Self> {
        let mut listings = HashMap::new();
        listings.insert(USDC, (DOLLAR, 6));
        listings.insert(WETH, (2 * DOLLAR, 18));
        listings.insert(DAI, (DOLLAR, 18));
        Arc::new(Self {
            listings: Mutex::new(listings),
            wallet: Mutex::new(HashMap::new()),
        })
    }

    fn set_price(&self, token: Address, price: u128) {
        self.listings.lock().unwrap().get_mut(&token).unwrap().0 = price;
    }

    fn convert(&self, route: &[Address], amount_in: U256) -> U256 {
        let listings = self.listings.lock().unwrap();
        let (price_in, dec_in) = listings[&route[0]];
        let (price_out, dec_out) = listings[route.last().unwrap()];
        amount_in * U256::from(price_in) * U256::from(10u64).pow(U256::from(dec_out))
            / (U256::from(price_out) * U256::from(10u64).pow(U256::from(dec_in)))
    }
}

#[async_trait]
impl Exchange for MirrorVenue {
    async fn expected_output(
        &self,
        route: &[Address],
        amount_in: U256,
    ) -> Result<U256, SwapFailure> {
        Ok(self.convert(route, amount_in))
    }

    async fn execute_swap(
        &self,
        route: &[Address],
        amount_in: U256,
        _min_out: U256,
    ) -> Result<U256, SwapFailure> {
        Ok(self.convert(route, amount_in))
    }

    async fn transfer(
        &self,
        _token: Address,
        _recipient: Address,
        _amount: U256,
    ) -> Result<(), SwapFailure> {
        Ok(())
    }

    async fn balance_of(&self, token: Address) -> Result<U256, SwapFailure> {
        Ok(self
            .wallet
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or(U256::ZERO))
    }
}

async fn service_with(venue: Arc<MirrorVenue>) -> PortfolioService {
    let mut engine = PortfolioEngine::new(USDC, TokenMeta::new("USDC", 6), venue, WETH);
    engine
        .set_price_source(USDC, Arc::new(StaticPriceSource::new(DOLLAR)), 8)
        .unwrap();
    engine.allow_token(WETH, TokenMeta::new("WETH", 18)).unwrap();
    engine
        .set_price_source(WETH, Arc::new(StaticPriceSource::new(2 * DOLLAR)), 8)
        .unwrap();
    engine.allow_token(DAI, TokenMeta::new("DAI", 18)).unwrap();
    engine
        .set_price_source(DAI, Arc::new(StaticPriceSource::new(DOLLAR)), 8)
        .unwrap();
    PortfolioService::new(engine, ADMIN, POOL)
}

fn usdc(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000u64)
}

fn whole(n: u64, decimals: u8) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(decimals))
}

#[tokio::test]
async fn deposit_spreads_across_mixed_decimal_targets() {
    let venue = MirrorVenue::new();
    let service = service_with(venue).await;

    service
        .set_allocations(
            ADMIN,
            vec![Allocation::new(WETH, 5_000), Allocation::new(DAI, 5_000)],
        )
        .await
        .unwrap();

    let report = service.invest(POOL, usdc(1_000)).await.unwrap().unwrap();
    assert_eq!(report.executed_legs(), 2);

    // $500 of WETH at $2 is 250 WETH; $500 of DAI at $1 is 500 DAI.
    assert_eq!(service.token_balance(WETH).await, whole(250, 18));
    assert_eq!(service.token_balance(DAI).await, whole(500, 18));
    assert_eq!(service.token_balance(USDC).await, U256::ZERO);
    assert_eq!(service.total_assets().await.unwrap(), usdc(1_000));
}

#[tokio::test]
async fn price_move_rebalances_back_to_weights() {
    let venue = MirrorVenue::new();
    let service = service_with(venue.clone()).await;
    service
        .set_allocations(
            ADMIN,
            vec![Allocation::new(WETH, 5_000), Allocation::new(DAI, 5_000)],
        )
        .await
        .unwrap();
    service.invest(POOL, usdc(1_000)).await.unwrap();

    // WETH appreciates to $2.50: total 1125, WETH at 625 vs target
    // 562.50, well past the 1% threshold on both sides.
    venue.set_price(WETH, 250_000_000);
    service
        .set_price_source(
            ADMIN,
            WETH,
            Arc::new(StaticPriceSource::new(250_000_000)),
            8,
        )
        .await
        .unwrap();

    let report = service.rebalance(ADMIN).await.unwrap();
    assert_eq!(report.total_value, usdc(1_125));
    assert_eq!(report.executed_legs(), 2);

    // Sell 25 WETH ($62.50), buy $62.50 of DAI with the proceeds.
    let sell = &report.legs[0];
    assert_eq!((sell.from, sell.to), (WETH, USDC));
    assert_eq!(sell.amount_in, whole(25, 18));
    let buy = &report.legs[1];
    assert_eq!((buy.from, buy.to), (USDC, DAI));
    assert_eq!(buy.amount_in, U256::from(62_500_000u64));

    assert_eq!(service.token_balance(WETH).await, whole(225, 18));
    assert_eq!(service.token_balance(USDC).await, U256::ZERO);
    assert_eq!(service.total_assets().await.unwrap(), usdc(1_125));

    // Back within threshold: a second pass trades nothing.
    let report = service.rebalance(ADMIN).await.unwrap();
    assert!(report.legs.is_empty());
}

#[tokio::test]
async fn small_deviations_are_left_untraded() {
    let venue = MirrorVenue::new();
    let service = service_with(venue.clone()).await;
    service
        .set_allocations(
            ADMIN,
            vec![Allocation::new(WETH, 5_000), Allocation::new(DAI, 5_000)],
        )
        .await
        .unwrap();
    service.invest(POOL, usdc(1_000)).await.unwrap();

    // +0.8% on WETH: deviation $4 per side against a $10.04 threshold.
    venue.set_price(WETH, 201_600_000);
    service
        .set_price_source(
            ADMIN,
            WETH,
            Arc::new(StaticPriceSource::new(201_600_000)),
            8,
        )
        .await
        .unwrap();

    let report = service.rebalance(ADMIN).await.unwrap();
    assert!(report.legs.is_empty());
}

#[tokio::test]
async fn overweight_allocation_sets_are_rejected_atomically() {
    let venue = MirrorVenue::new();
    let service = service_with(venue).await;
    let prior = vec![Allocation::new(WETH, 4_000), Allocation::new(DAI, 4_000)];
    service.set_allocations(ADMIN, prior.clone()).await.unwrap();

    let mut events = service.subscribe().await;
    while events.try_recv().is_ok() {}

    let err = service
        .set_allocations(
            ADMIN,
            vec![Allocation::new(WETH, 5_000), Allocation::new(DAI, 6_000)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert_eq!(service.allocations().await, prior);
    assert!(events.try_recv().is_err(), "rejected write emits nothing");
}

#[tokio::test]
async fn withdrawal_shrinks_the_portfolio_proportionally() {
    let venue = MirrorVenue::new();
    let service = service_with(venue).await;
    service
        .set_allocations(
            ADMIN,
            vec![Allocation::new(WETH, 5_000), Allocation::new(DAI, 5_000)],
        )
        .await
        .unwrap();
    service.invest(POOL, usdc(1_000)).await.unwrap();

    let outcome = service.free_funds(POOL, usdc(200)).await.unwrap();
    assert_eq!(outcome.released, usdc(200));
    let liquidation = outcome.liquidation.unwrap();
    assert_eq!(liquidation.freed, usdc(200));
    assert_eq!(liquidation.legs.len(), 2);
    assert!(liquidation.legs.iter().all(|leg| leg.executed()));

    // Each holding gave up 20% of its value; relative shape preserved.
    assert_eq!(service.token_balance(WETH).await, whole(200, 18));
    assert_eq!(service.token_balance(DAI).await, whole(400, 18));
    assert_eq!(service.total_assets().await.unwrap(), usdc(800));
}

#[tokio::test]
async fn base_only_withdrawal_needs_no_swaps() {
    let venue = MirrorVenue::new();
    let service = service_with(venue).await;

    // A tiny target keeps the portfolio effectively base-only: the
    // deposit pass leaves a sub-threshold deficit untraded.
    service.invest(POOL, usdc(500)).await.unwrap();
    service
        .set_allocations(ADMIN, vec![Allocation::new(DAI, 1)])
        .await
        .unwrap();

    let outcome = service.free_funds(POOL, usdc(300)).await.unwrap();
    assert_eq!(outcome.released, usdc(300));
    assert!(outcome.liquidation.is_none(), "on-hand base covers it");
    assert_eq!(service.token_balance(USDC).await, usdc(200));
}

#[tokio::test]
async fn emergency_exit_returns_everything_to_base() {
    let venue = MirrorVenue::new();
    let service = service_with(venue).await;
    service
        .set_allocations(
            ADMIN,
            vec![Allocation::new(WETH, 6_000), Allocation::new(DAI, 4_000)],
        )
        .await
        .unwrap();
    service.invest(POOL, usdc(1_000)).await.unwrap();

    let legs = service.emergency_exit_all_positions(ADMIN).await.unwrap();
    assert_eq!(legs.len(), 2);
    assert!(legs.iter().all(|leg| leg.executed()));
    assert!(service.allocations().await.is_empty());
    assert_eq!(service.token_balance(USDC).await, usdc(1_000));
    assert_eq!(service.token_balance(WETH).await, U256::ZERO);
    assert_eq!(service.token_balance(DAI).await, U256::ZERO);
}

#[tokio::test]
async fn strangers_cannot_move_funds() {
    let venue = MirrorVenue::new();
    let service = service_with(venue).await;
    let stranger = Address::repeat_byte(0x66);

    assert!(matches!(
        service.invest(stranger, usdc(1)).await.unwrap_err(),
        EngineError::Unauthorized { .. }
    ));
    assert!(matches!(
        service.free_funds(stranger, usdc(1)).await.unwrap_err(),
        EngineError::Unauthorized { .. }
    ));
    assert!(matches!(
        service
            .emergency_exit_all_positions(stranger)
            .await
            .unwrap_err(),
        EngineError::Unauthorized { .. }
    ));
    assert!(matches!(
        service.emergency_withdraw(stranger, WETH).await.unwrap_err(),
        EngineError::Unauthorized { .. }
    ));
}
