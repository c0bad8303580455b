// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::metrics::EngineStats;
use crate::domain::error::{EngineError, OracleError};
use crate::domain::events::PortfolioEvent;
use crate::domain::types::{
    Allocation, FreeFundsOutcome, RebalanceReport, TokenMeta, TradeLeg,
};
use crate::infrastructure::pricing::PriceSource;
use crate::services::portfolio::engine::PortfolioEngine;
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Authenticated, serialized front of the engine. One lock covers every
/// registry, rebalance, liquidate and fund operation, so the total
/// value read at the top of a pass stays consistent with the holdings
/// the pass trades against.
pub struct PortfolioService {
    engine: Mutex<PortfolioEngine>,
    admin: Address,
    pool: Address,
    stats: Arc<EngineStats>,
}

impl PortfolioService {
    pub fn new(engine: PortfolioEngine, admin: Address, pool: Address) -> Self {
        let stats = engine.stats();
        Self {
            engine: Mutex::new(engine),
            admin,
            pool,
            stats,
        }
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        self.stats.clone()
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<PortfolioEvent> {
        self.engine.lock().await.events().subscribe()
    }

    // ---- Pool surface --------------------------------------------------

    /// Deposit notification: `amount` of base asset has already landed
    /// in the wallet. Credits the ledger, then rebalances when a target
    /// portfolio exists.
    pub async fn invest(
        &self,
        caller: Address,
        amount: U256,
    ) -> Result<Option<RebalanceReport>, EngineError> {
        self.ensure(caller, self.pool, "pool")?;
        let mut engine = self.engine.lock().await;
        engine.receive(amount);
        Ok(engine.on_received().await)
    }

    pub async fn free_funds(
        &self,
        caller: Address,
        amount: U256,
    ) -> Result<FreeFundsOutcome, EngineError> {
        self.ensure(caller, self.pool, "pool")?;
        let mut engine = self.engine.lock().await;
        engine.free_funds(amount, self.pool).await
    }

    pub async fn total_assets(&self) -> Result<U256, OracleError> {
        self.engine.lock().await.total_assets().await
    }

    // ---- Administrator surface -----------------------------------------

    pub async fn set_allocations(
        &self,
        caller: Address,
        list: Vec<Allocation>,
    ) -> Result<Option<RebalanceReport>, EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        self.engine.lock().await.set_allocations(list).await
    }

    pub async fn allow_token(
        &self,
        caller: Address,
        token: Address,
        meta: TokenMeta,
    ) -> Result<(), EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        self.engine.lock().await.allow_token(token, meta)
    }

    pub async fn disallow_token(&self, caller: Address, token: Address) -> Result<(), EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        self.engine.lock().await.disallow_token(token)
    }

    pub async fn set_price_source(
        &self,
        caller: Address,
        token: Address,
        source: Arc<dyn PriceSource>,
        decimals: u8,
    ) -> Result<(), EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        self.engine
            .lock()
            .await
            .set_price_source(token, source, decimals)
    }

    pub async fn rebalance(&self, caller: Address) -> Result<RebalanceReport, EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        self.engine.lock().await.rebalance().await
    }

    pub async fn sync_wallet_balances(&self, caller: Address) -> Result<(), EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        self.engine.lock().await.sync_wallet_balances().await
    }

    pub async fn emergency_exit_all_positions(
        &self,
        caller: Address,
    ) -> Result<Vec<TradeLeg>, EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        Ok(self.engine.lock().await.emergency_exit_all_positions().await)
    }

    /// Sweeps `token` to the administrator address, bypassing accounting.
    pub async fn emergency_withdraw(
        &self,
        caller: Address,
        token: Address,
    ) -> Result<U256, EngineError> {
        self.ensure(caller, self.admin, "administrator")?;
        self.engine
            .lock()
            .await
            .emergency_withdraw(token, self.admin)
            .await
    }

    // ---- Read projections ----------------------------------------------

    pub async fn allocations(&self) -> Vec<Allocation> {
        self.engine.lock().await.allocations()
    }

    pub async fn is_token_allowed(&self, token: Address) -> bool {
        self.engine.lock().await.is_token_allowed(token)
    }

    pub async fn token_balance(&self, token: Address) -> U256 {
        self.engine.lock().await.token_balance(token)
    }

    pub async fn allowed_tokens(&self) -> Vec<Address> {
        self.engine.lock().await.allowed_tokens()
    }

    pub async fn token_meta(&self, token: Address) -> Option<TokenMeta> {
        self.engine.lock().await.token_meta(token)
    }

    fn ensure(
        &self,
        caller: Address,
        expected: Address,
        role: &'static str,
    ) -> Result<(), EngineError> {
        if caller != expected {
            return Err(EngineError::Unauthorized { caller, role });
        }
        Ok(())
    }
}
