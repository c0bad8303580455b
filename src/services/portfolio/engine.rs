// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::metrics::EngineStats;
use crate::domain::constants::{REBALANCE_THRESHOLD_BPS, WEIGHT_SCALE_BPS};
use crate::domain::error::{EngineError, OracleError};
use crate::domain::events::{EventBus, PortfolioEvent};
use crate::domain::types::{
    Allocation, FreeFundsOutcome, Holdings, LegOutcome, LiquidationReport, RebalanceReport,
    TokenMeta, TradeLeg, ValuationSkip,
};
use crate::infrastructure::exchange::Exchange;
use crate::infrastructure::pricing::PriceSource;
use crate::services::portfolio::registry::AllocationRegistry;
use crate::services::portfolio::swaps::SwapExecutor;
use crate::services::portfolio::valuation::{PriceBook, mul_div};
use alloy::primitives::{Address, U256};
use std::sync::Arc;

/// The allocation engine: one base-asset pool spread across a target
/// portfolio, rebalanced on demand and shrunk proportionally when the
/// pool asks for funds back.
///
/// Not safe for concurrent callers; `PortfolioService` wraps it in a
/// single-writer lock. Total value is computed at the top of each pass
/// and stays meaningful because nothing else mutates holdings mid-pass.
pub struct PortfolioEngine {
    registry: AllocationRegistry,
    book: PriceBook,
    swaps: SwapExecutor,
    holdings: Holdings,
    events: EventBus,
    stats: Arc<EngineStats>,
}

impl PortfolioEngine {
    pub fn new(
        base_token: Address,
        base_meta: TokenMeta,
        exchange: Arc<dyn Exchange>,
        bridge_token: Address,
    ) -> Self {
        Self {
            registry: AllocationRegistry::new(base_token, base_meta),
            book: PriceBook::new(base_token),
            swaps: SwapExecutor::new(exchange, bridge_token),
            holdings: Holdings::new(),
            events: EventBus::new(),
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn base_token(&self) -> Address {
        self.registry.base_token()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        self.stats.clone()
    }

    // ---- Registry surface ----------------------------------------------

    pub fn allow_token(&mut self, token: Address, meta: TokenMeta) -> Result<(), EngineError> {
        self.registry.allow_token(token, meta.clone())?;
        self.events.emit(PortfolioEvent::TokenAllowed {
            token,
            symbol: meta.symbol,
            decimals: meta.decimals,
        });
        Ok(())
    }

    /// Removes a token from the allow-list. Refused for the base asset,
    /// for tokens still in the target portfolio and for tokens the
    /// portfolio still holds.
    pub fn disallow_token(&mut self, token: Address) -> Result<(), EngineError> {
        if !self.holdings.balance(token).is_zero() {
            return Err(EngineError::validation(
                "token",
                "token is still held by the portfolio",
            ));
        }
        self.registry.disallow_token(token)?;
        self.events.emit(PortfolioEvent::TokenDisallowed { token });
        Ok(())
    }

    pub fn set_price_source(
        &mut self,
        token: Address,
        source: Arc<dyn PriceSource>,
        decimals: u8,
    ) -> Result<(), EngineError> {
        if !self.registry.is_allowed(token) {
            return Err(EngineError::validation(
                "token",
                "token is not in the allow-list",
            ));
        }
        let description = source.describe();
        self.book.bind(token, source, decimals);
        self.events.emit(PortfolioEvent::PriceSourceSet {
            token,
            source: description,
            decimals,
        });
        Ok(())
    }

    /// Validates and applies a target portfolio without the rebalance
    /// trigger. Startup seeding path; live updates go through
    /// `set_allocations`.
    pub fn seed_allocations(&mut self, list: Vec<Allocation>) -> Result<(), EngineError> {
        self.registry
            .validate(&list, |token| self.book.has_binding(token))?;
        self.registry.replace(list.clone());
        if list.is_empty() {
            self.events.emit(PortfolioEvent::AllocationsCleared);
        } else {
            self.events
                .emit(PortfolioEvent::AllocationsReplaced { allocations: list });
        }
        Ok(())
    }

    /// Atomically replaces the target portfolio. A rejected list leaves
    /// the previous targets untouched and emits nothing. On success,
    /// a rebalance pass runs immediately when the portfolio holds any
    /// base asset; a pass that aborts on total value does not unwind
    /// the registry write.
    pub async fn set_allocations(
        &mut self,
        list: Vec<Allocation>,
    ) -> Result<Option<RebalanceReport>, EngineError> {
        self.seed_allocations(list)?;
        if self.holdings.balance(self.registry.base_token()).is_zero() {
            return Ok(None);
        }
        Ok(self.triggered_rebalance("allocation update").await)
    }

    // ---- Valuation surface ---------------------------------------------

    /// Fresh total value in base units. Never cached; any failing
    /// binding fails the whole call.
    pub async fn total_assets(&self) -> Result<U256, OracleError> {
        let base = self.registry.base_token();
        let holdings = self.holdings.non_base_snapshot(base);
        let values = futures::future::try_join_all(
            holdings
                .iter()
                .map(|(token, balance)| self.holding_value(*token, *balance)),
        )
        .await?;

        let mut total = self.holdings.balance(base);
        for ((token, _), value) in holdings.iter().zip(values) {
            total = total
                .checked_add(value)
                .ok_or(OracleError::ValueOutOfRange(*token))?;
        }
        Ok(total)
    }

    pub fn allocations(&self) -> Vec<Allocation> {
        self.registry.targets().to_vec()
    }

    pub fn is_token_allowed(&self, token: Address) -> bool {
        self.registry.is_allowed(token)
    }

    pub fn token_balance(&self, token: Address) -> U256 {
        self.holdings.balance(token)
    }

    pub fn token_meta(&self, token: Address) -> Option<TokenMeta> {
        self.registry.meta(token).cloned()
    }

    pub fn allowed_tokens(&self) -> Vec<Address> {
        self.registry.allowed_tokens()
    }

    pub fn has_price_source(&self, token: Address) -> bool {
        self.book.has_binding(token)
    }

    // ---- Pool surface --------------------------------------------------

    /// Phase one of a deposit: the base asset has already arrived in the
    /// wallet; credit the ledger. `on_received` runs the logic trigger.
    pub fn receive(&mut self, amount: U256) {
        if amount.is_zero() {
            return;
        }
        self.holdings.credit(self.registry.base_token(), amount);
        EngineStats::bump(&self.stats.invests);
        self.events.emit(PortfolioEvent::FundsReceived { amount });
    }

    /// Phase two of a deposit: rebalance into the target portfolio when
    /// one exists. A pass abort is logged and swallowed; the credit
    /// from `receive` always stands.
    pub async fn on_received(&mut self) -> Option<RebalanceReport> {
        if self.registry.targets().is_empty() {
            return None;
        }
        self.triggered_rebalance("deposit").await
    }

    /// Releases up to `amount` of base asset to `recipient`, liquidating
    /// the shortfall first. The outcome's `released` is authoritative.
    pub async fn free_funds(
        &mut self,
        amount: U256,
        recipient: Address,
    ) -> Result<FreeFundsOutcome, EngineError> {
        let base = self.registry.base_token();
        let mut outcome = FreeFundsOutcome {
            requested: amount,
            released: U256::ZERO,
            liquidation: None,
        };
        if amount.is_zero() {
            return Ok(outcome);
        }

        let on_hand = self.holdings.balance(base);
        if on_hand < amount {
            outcome.liquidation = Some(self.liquidate(amount - on_hand).await?);
        }

        let released = amount.min(self.holdings.balance(base));
        if !released.is_zero() {
            if let Err(e) = self.swaps.transfer_out(base, recipient, released).await {
                tracing::warn!(
                    target: "portfolio",
                    recipient = %format!("{:#x}", recipient),
                    amount = %released,
                    error = %e,
                    "Base asset release transfer failed"
                );
                return Ok(outcome);
            }
            self.holdings.debit(base, released)?;
            outcome.released = released;
        }

        EngineStats::bump(&self.stats.releases);
        self.events.emit(PortfolioEvent::FundsReleased {
            requested: amount,
            released: outcome.released,
        });
        Ok(outcome)
    }

    // ---- Rebalancer ----------------------------------------------------

    /// One threshold-gated pass over the target portfolio, in registry
    /// order. Idempotent: with unchanged prices and holdings a second
    /// pass issues no swaps.
    ///
    /// Earlier legs change the base balance available to later legs in
    /// the same pass; that order dependence is intentional, a pass is
    /// not a fixed-point iteration.
    pub async fn rebalance(&mut self) -> Result<RebalanceReport, EngineError> {
        let total = self.total_assets().await?;
        let mut report = RebalanceReport::idle(total);
        EngineStats::bump(&self.stats.rebalance_passes);
        if total.is_zero() {
            return Ok(report);
        }

        let base = self.registry.base_token();
        let threshold = mul_div(
            total,
            U256::from(REBALANCE_THRESHOLD_BPS),
            U256::from(WEIGHT_SCALE_BPS),
        )
        .unwrap_or(U256::ZERO);

        for alloc in self.registry.targets().to_vec() {
            let target = match mul_div(
                total,
                U256::from(alloc.weight_bps),
                U256::from(WEIGHT_SCALE_BPS),
            ) {
                Some(v) => v,
                None => continue,
            };

            let balance = self.holdings.balance(alloc.token);
            let current = match self.holding_value(alloc.token, balance).await {
                Ok(value) => value,
                Err(reason) => {
                    self.note_valuation_skip(&mut report.skipped, alloc.token, reason);
                    continue;
                }
            };

            let leg = if current.saturating_add(threshold) < target {
                // Underweight: spend base for the deficit. Deliberately
                // not capped at the base balance; an over-balance buy
                // fails on the leg and is recorded.
                let deficit = target - current;
                self.swaps
                    .swap(&mut self.holdings, base, alloc.token, deficit)
                    .await
            } else if current > target.saturating_add(threshold) {
                let excess = current - target;
                let amount = match self.amount_for(alloc.token, excess).await {
                    Ok(amount) => amount.min(balance),
                    Err(reason) => {
                        self.note_valuation_skip(&mut report.skipped, alloc.token, reason);
                        continue;
                    }
                };
                self.swaps
                    .swap(&mut self.holdings, alloc.token, base, amount)
                    .await
            } else {
                None
            };

            if let Some(leg) = leg {
                self.note_leg(&leg);
                report.legs.push(leg);
            }
        }

        Ok(report)
    }

    // ---- Liquidator ----------------------------------------------------

    /// Sells a slice of every non-base holding proportional to its share
    /// of total value, to free up to `needed` base units. Preserves the
    /// portfolio's relative shape while shrinking it.
    pub async fn liquidate(&mut self, needed: U256) -> Result<LiquidationReport, EngineError> {
        let mut report = LiquidationReport::empty(needed);
        if needed.is_zero() || self.registry.targets().is_empty() {
            return Ok(report);
        }

        let total = self.total_assets().await?;
        if total.is_zero() {
            return Ok(report);
        }

        EngineStats::bump(&self.stats.liquidation_passes);
        let base = self.registry.base_token();

        for (token, balance) in self.holdings.non_base_snapshot(base) {
            let value = match self.holding_value(token, balance).await {
                Ok(value) => value,
                Err(reason) => {
                    self.note_valuation_skip(&mut report.skipped, token, reason);
                    continue;
                }
            };
            if value.is_zero() {
                continue;
            }

            let slice = match mul_div(value, needed, total) {
                Some(v) => v,
                None => continue,
            };
            let amount = match self.amount_for(token, slice).await {
                Ok(amount) => amount.min(balance),
                Err(reason) => {
                    self.note_valuation_skip(&mut report.skipped, token, reason);
                    continue;
                }
            };

            if let Some(leg) = self.swaps.swap(&mut self.holdings, token, base, amount).await {
                self.note_leg(&leg);
                report.legs.push(leg);
            }
        }

        report.freed = needed.min(self.holdings.balance(base));
        self.events.emit(PortfolioEvent::LiquidationRun {
            requested: needed,
            freed: report.freed,
        });
        Ok(report)
    }

    // ---- Emergency surface ---------------------------------------------

    /// Best-effort sale of every non-base holding back into base, then
    /// clears the target portfolio. Failed legs are recorded and left
    /// behind; a retry is another call.
    pub async fn emergency_exit_all_positions(&mut self) -> Vec<TradeLeg> {
        let base = self.registry.base_token();
        let mut legs = Vec::new();
        for (token, balance) in self.holdings.non_base_snapshot(base) {
            if let Some(leg) = self
                .swaps
                .swap(&mut self.holdings, token, base, balance)
                .await
            {
                self.note_leg(&leg);
                legs.push(leg);
            }
        }

        self.registry.clear();
        self.events.emit(PortfolioEvent::AllocationsCleared);
        EngineStats::bump(&self.stats.emergency_exits);

        let executed = legs.iter().filter(|leg| leg.executed()).count();
        self.events.emit(PortfolioEvent::EmergencyExit {
            legs_executed: executed,
            legs_skipped: legs.len() - executed,
        });
        legs
    }

    /// Sweeps the wallet's full `token` balance to `destination`,
    /// bypassing valuation and accounting. The ledger entry is dropped
    /// whatever it said.
    pub async fn emergency_withdraw(
        &mut self,
        token: Address,
        destination: Address,
    ) -> Result<U256, EngineError> {
        let amount = self.swaps.wallet_balance(token).await?;
        if amount.is_zero() {
            self.holdings.sweep(token);
            return Ok(U256::ZERO);
        }

        self.swaps.transfer_out(token, destination, amount).await?;
        self.holdings.sweep(token);
        self.events.emit(PortfolioEvent::EmergencyWithdrawal {
            token,
            amount,
            destination,
        });
        Ok(amount)
    }

    /// Reconciles the ledger with the wallet for every allowed token.
    /// Called at startup before any pass runs.
    pub async fn sync_wallet_balances(&mut self) -> Result<(), EngineError> {
        for token in self.registry.allowed_tokens() {
            let balance = self.swaps.wallet_balance(token).await?;
            self.holdings.set(token, balance);
        }
        Ok(())
    }

    // ---- Internals -----------------------------------------------------

    async fn triggered_rebalance(&mut self, trigger: &str) -> Option<RebalanceReport> {
        match self.rebalance().await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(
                    target: "portfolio",
                    trigger,
                    error = %e,
                    "Triggered rebalance aborted before trading"
                );
                None
            }
        }
    }

    async fn holding_value(&self, token: Address, balance: U256) -> Result<U256, OracleError> {
        let (token_decimals, base_decimals) = self.decimals_for(token)?;
        self.book
            .value_of(token, token_decimals, base_decimals, balance)
            .await
    }

    async fn amount_for(&self, token: Address, value: U256) -> Result<U256, OracleError> {
        let (token_decimals, base_decimals) = self.decimals_for(token)?;
        self.book
            .amount_of(token, token_decimals, base_decimals, value)
            .await
    }

    fn decimals_for(&self, token: Address) -> Result<(u8, u8), OracleError> {
        let token_decimals = self
            .registry
            .meta(token)
            .map(|meta| meta.decimals)
            .ok_or(OracleError::UnknownToken(token))?;
        let base = self.registry.base_token();
        let base_decimals = self
            .registry
            .meta(base)
            .map(|meta| meta.decimals)
            .ok_or(OracleError::UnknownToken(base))?;
        Ok((token_decimals, base_decimals))
    }

    fn note_leg(&self, leg: &TradeLeg) {
        match &leg.outcome {
            LegOutcome::Executed { amount_out, .. } => {
                EngineStats::bump(&self.stats.legs_executed);
                self.events.emit(PortfolioEvent::TradeExecuted {
                    from: leg.from,
                    to: leg.to,
                    route: leg.route.clone(),
                    amount_in: leg.amount_in,
                    amount_out: *amount_out,
                });
            }
            LegOutcome::Skipped { reason } => {
                EngineStats::bump(&self.stats.legs_skipped);
                self.events.emit(PortfolioEvent::TradeSkipped {
                    from: leg.from,
                    to: leg.to,
                    amount_in: leg.amount_in,
                    reason: reason.to_string(),
                });
            }
        }
    }

    fn note_valuation_skip(
        &self,
        skipped: &mut Vec<ValuationSkip>,
        token: Address,
        reason: OracleError,
    ) {
        EngineStats::bump(&self.stats.valuation_skips);
        tracing::warn!(
            target: "portfolio",
            token = %format!("{:#x}", token),
            error = %reason,
            "Valuation failed mid-pass; token skipped"
        );
        skipped.push(ValuationSkip { token, reason });
    }
}
