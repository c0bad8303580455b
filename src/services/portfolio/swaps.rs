// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::{MAX_SLIPPAGE_BPS, WEIGHT_SCALE_BPS};
use crate::domain::error::SwapFailure;
use crate::domain::types::{Holdings, LegOutcome, TradeLeg};
use crate::infrastructure::exchange::Exchange;
use alloy::primitives::{Address, U256};
use std::sync::Arc;

/// Turns "move this much of X into Y" into venue calls and ledger
/// updates. A failed leg never unwinds the pass: the outcome is
/// recorded on the leg and the caller moves on.
pub struct SwapExecutor {
    exchange: Arc<dyn Exchange>,
    bridge_token: Address,
    slippage_bps: u64,
}

impl SwapExecutor {
    pub fn new(exchange: Arc<dyn Exchange>, bridge_token: Address) -> Self {
        Self {
            exchange,
            bridge_token,
            slippage_bps: MAX_SLIPPAGE_BPS,
        }
    }

    /// Swap `amount` of `from` into `to`, debiting and crediting
    /// `holdings` to match what the venue reports. Returns `None` for
    /// the degenerate no-op cases, otherwise one leg per attempt.
    pub async fn swap(
        &self,
        holdings: &mut Holdings,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Option<TradeLeg> {
        if from == to || amount.is_zero() {
            return None;
        }

        let route = self.route(from, to);
        let available = holdings.balance(from);
        if available < amount {
            return Some(TradeLeg {
                from,
                to,
                route,
                amount_in: amount,
                outcome: LegOutcome::Skipped {
                    reason: SwapFailure::InsufficientBalance {
                        token: from,
                        needed: amount.to_string(),
                        available: available.to_string(),
                    },
                },
            });
        }

        let expected = match self.exchange.expected_output(&route, amount).await {
            Ok(out) => out,
            Err(reason) => {
                return Some(TradeLeg {
                    from,
                    to,
                    route,
                    amount_in: amount,
                    outcome: LegOutcome::Skipped { reason },
                });
            }
        };

        let min_out = expected
            .saturating_mul(U256::from(WEIGHT_SCALE_BPS - self.slippage_bps))
            / U256::from(WEIGHT_SCALE_BPS);

        // Debit up front while we hold the ledger exclusively; a failed
        // execution re-credits, so the ledger always matches the wallet.
        if let Err(e) = holdings.debit(from, amount) {
            return Some(TradeLeg {
                from,
                to,
                route,
                amount_in: amount,
                outcome: LegOutcome::Skipped {
                    reason: SwapFailure::Execution(e.to_string()),
                },
            });
        }

        match self.exchange.execute_swap(&route, amount, min_out).await {
            Ok(amount_out) => {
                holdings.credit(to, amount_out);
                Some(TradeLeg {
                    from,
                    to,
                    route,
                    amount_in: amount,
                    outcome: LegOutcome::Executed {
                        amount_out,
                        min_out,
                    },
                })
            }
            Err(reason) => {
                holdings.credit(from, amount);
                Some(TradeLeg {
                    from,
                    to,
                    route,
                    amount_in: amount,
                    outcome: LegOutcome::Skipped { reason },
                })
            }
        }
    }

    /// Wallet-side balance as the venue sees it.
    pub async fn wallet_balance(&self, token: Address) -> Result<U256, SwapFailure> {
        self.exchange.balance_of(token).await
    }

    /// Direct wallet transfer, bypassing routing. Emergency path only.
    pub async fn transfer_out(
        &self,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), SwapFailure> {
        self.exchange.transfer(token, recipient, amount).await
    }

    /// Two hops through the bridge token unless an endpoint already is
    /// the bridge.
    fn route(&self, from: Address, to: Address) -> Vec<Address> {
        if from == self.bridge_token || to == self.bridge_token {
            vec![from, to]
        } else {
            vec![from, self.bridge_token, to]
        }
    }
}
