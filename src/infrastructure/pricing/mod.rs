// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod chainlink;
pub mod http_ticker;
pub mod static_price;

pub use chainlink::ChainlinkSource;
pub use http_ticker::HttpTickerSource;
pub use static_price::StaticPriceSource;

use crate::domain::error::OracleError;
use crate::domain::types::PriceQuote;
use alloy::primitives::Address;
use async_trait::async_trait;

/// A bound price source for one token. Implementations must reject
/// non-positive and stale answers instead of papering over them; the
/// valuation layer treats every quote it receives as spendable truth.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price, scaled to the decimals declared when the source
    /// was bound. `token` is the token this binding serves, carried
    /// into errors for context.
    async fn fetch_price(&self, token: Address) -> Result<PriceQuote, OracleError>;

    /// Short identifier for events and logs, e.g. `chainlink:0xabc…`.
    fn describe(&self) -> String;
}
