// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod univ2;

pub use univ2::UniV2Exchange;

use crate::domain::error::SwapFailure;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

/// Venue adapter for token-to-token swaps. Routes are explicit hop
/// lists; the first element is the input token, the last the output.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Quoted output for swapping `amount_in` along `route`, before
    /// slippage allowance.
    async fn expected_output(&self, route: &[Address], amount_in: U256)
    -> Result<U256, SwapFailure>;

    /// Execute the swap and return the amount actually received by the
    /// wallet. Implementations must enforce `min_out` at the venue.
    async fn execute_swap(
        &self,
        route: &[Address],
        amount_in: U256,
        min_out: U256,
    ) -> Result<U256, SwapFailure>;

    /// Move `amount` of `token` out of the wallet to `recipient`.
    /// Used by the emergency withdrawal path, not by trading.
    async fn transfer(
        &self,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), SwapFailure>;

    /// The wallet's current `token` balance. The engine reconciles its
    /// ledger against this at startup and before emergency sweeps.
    async fn balance_of(&self, token: Address) -> Result<U256, SwapFailure>;
}
