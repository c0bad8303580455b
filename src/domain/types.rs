// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::{EngineError, OracleError, SwapFailure};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One target portfolio entry: a token and its weight in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub token: Address,
    pub weight_bps: u64,
}

impl Allocation {
    pub fn new(token: Address, weight_bps: u64) -> Self {
        Self { token, weight_bps }
    }
}

/// Registered metadata for an allowed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMeta {
    pub fn new(symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }
}

/// A validated oracle answer, scaled to the binding's decimals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: u128,
    pub source: String,
}

/// The portfolio's on-hand balances in each token's native unit.
///
/// BTreeMap keeps iteration deterministic; passes that walk holdings
/// always see the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Holdings {
    balances: BTreeMap<Address, U256>,
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, token: Address) -> U256 {
        self.balances.get(&token).copied().unwrap_or(U256::ZERO)
    }

    pub fn credit(&mut self, token: Address, amount: U256) {
        if amount.is_zero() {
            return;
        }
        let entry = self.balances.entry(token).or_insert(U256::ZERO);
        *entry = entry.saturating_add(amount);
    }

    pub fn debit(&mut self, token: Address, amount: U256) -> Result<(), EngineError> {
        let balance = self.balance(token);
        let remaining = balance.checked_sub(amount).ok_or_else(|| {
            EngineError::validation(
                "holdings",
                format!("debit {amount} of {token} exceeds balance {balance}"),
            )
        })?;
        if remaining.is_zero() {
            self.balances.remove(&token);
        } else {
            self.balances.insert(token, remaining);
        }
        Ok(())
    }

    /// Removes and returns a token's full balance.
    pub fn sweep(&mut self, token: Address) -> U256 {
        self.balances.remove(&token).unwrap_or(U256::ZERO)
    }

    /// Overwrites a token's balance. Reconciliation path only; trading
    /// goes through `credit`/`debit`.
    pub fn set(&mut self, token: Address, amount: U256) {
        if amount.is_zero() {
            self.balances.remove(&token);
        } else {
            self.balances.insert(token, amount);
        }
    }

    /// Snapshot of every non-base holding with a nonzero balance.
    pub fn non_base_snapshot(&self, base: Address) -> Vec<(Address, U256)> {
        self.balances
            .iter()
            .filter(|(token, balance)| **token != base && !balance.is_zero())
            .map(|(token, balance)| (*token, *balance))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

/// One swap attempt inside a rebalance or liquidation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeLeg {
    pub from: Address,
    pub to: Address,
    pub route: Vec<Address>,
    pub amount_in: U256,
    pub outcome: LegOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegOutcome {
    Executed { amount_out: U256, min_out: U256 },
    Skipped { reason: SwapFailure },
}

impl TradeLeg {
    pub fn executed(&self) -> bool {
        matches!(self.outcome, LegOutcome::Executed { .. })
    }
}

/// A token whose valuation failed mid-pass; its step was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuationSkip {
    pub token: Address,
    pub reason: OracleError,
}

/// Outcome of one rebalance pass. Legs appear in processing order;
/// a pass with no threshold breaches has no legs.
#[derive(Debug, Clone, Default)]
pub struct RebalanceReport {
    pub total_value: U256,
    pub legs: Vec<TradeLeg>,
    pub skipped: Vec<ValuationSkip>,
}

impl RebalanceReport {
    pub fn idle(total_value: U256) -> Self {
        Self {
            total_value,
            legs: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn executed_legs(&self) -> usize {
        self.legs.iter().filter(|leg| leg.executed()).count()
    }

    pub fn skipped_legs(&self) -> usize {
        self.legs.len() - self.executed_legs()
    }
}

/// Outcome of one liquidation pass. `freed` is what the caller may
/// actually take, never more than it asked for.
#[derive(Debug, Clone, Default)]
pub struct LiquidationReport {
    pub requested: U256,
    pub freed: U256,
    pub legs: Vec<TradeLeg>,
    pub skipped: Vec<ValuationSkip>,
}

impl LiquidationReport {
    pub fn empty(requested: U256) -> Self {
        Self {
            requested,
            freed: U256::ZERO,
            legs: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// What a `free_funds` call actually achieved. `released` may be less
/// than `requested`; callers must use it, not the request.
#[derive(Debug, Clone, Default)]
pub struct FreeFundsOutcome {
    pub requested: U256,
    pub released: U256,
    pub liquidation: Option<LiquidationReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const TOKEN_A: Address = address!("1111111111111111111111111111111111111111");
    const TOKEN_B: Address = address!("2222222222222222222222222222222222222222");

    #[test]
    fn credit_and_debit_roundtrip() {
        let mut book = Holdings::new();
        book.credit(TOKEN_A, U256::from(100));
        book.credit(TOKEN_A, U256::from(50));
        assert_eq!(book.balance(TOKEN_A), U256::from(150));

        book.debit(TOKEN_A, U256::from(150)).unwrap();
        assert_eq!(book.balance(TOKEN_A), U256::ZERO);
        assert!(book.is_empty());
    }

    #[test]
    fn debit_over_balance_is_rejected() {
        let mut book = Holdings::new();
        book.credit(TOKEN_A, U256::from(10));
        assert!(book.debit(TOKEN_A, U256::from(11)).is_err());
        assert_eq!(book.balance(TOKEN_A), U256::from(10));
    }

    #[test]
    fn zero_credit_does_not_create_entries() {
        let mut book = Holdings::new();
        book.credit(TOKEN_A, U256::ZERO);
        assert!(book.is_empty());
    }

    #[test]
    fn sweep_drains_the_full_balance() {
        let mut book = Holdings::new();
        book.credit(TOKEN_A, U256::from(77));
        assert_eq!(book.sweep(TOKEN_A), U256::from(77));
        assert_eq!(book.sweep(TOKEN_A), U256::ZERO);
    }

    #[test]
    fn snapshot_excludes_base_and_zero_entries() {
        let mut book = Holdings::new();
        book.credit(TOKEN_A, U256::from(5));
        book.credit(TOKEN_B, U256::from(9));
        let snapshot = book.non_base_snapshot(TOKEN_A);
        assert_eq!(snapshot, vec![(TOKEN_B, U256::from(9))]);
    }

    #[test]
    fn report_leg_counts() {
        let executed = TradeLeg {
            from: TOKEN_A,
            to: TOKEN_B,
            route: vec![TOKEN_A, TOKEN_B],
            amount_in: U256::from(1),
            outcome: LegOutcome::Executed {
                amount_out: U256::from(1),
                min_out: U256::from(1),
            },
        };
        let skipped = TradeLeg {
            outcome: LegOutcome::Skipped {
                reason: crate::domain::error::SwapFailure::QuoteUnavailable("no pool".into()),
            },
            ..executed.clone()
        };
        let report = RebalanceReport {
            total_value: U256::from(10),
            legs: vec![executed, skipped],
            skipped: Vec::new(),
        };
        assert_eq!(report.executed_legs(), 1);
        assert_eq!(report.skipped_legs(), 1);
    }
}
