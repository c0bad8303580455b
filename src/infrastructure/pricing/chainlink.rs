// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::backoff::retry_with_backoff;
use crate::domain::error::OracleError;
use crate::domain::types::PriceQuote;
use crate::infrastructure::pricing::PriceSource;
use crate::network::provider::HttpProvider;
use alloy::primitives::Address;
use alloy::sol;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract AggregatorV3Interface {
        function latestRoundData() external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound);
        function decimals() external view returns (uint8);
    }
}

/// On-chain Chainlink aggregator binding. The feed's reported decimals
/// must match the decimals declared at bind time; a drifted feed is a
/// config error, not something to rescale silently.
pub struct ChainlinkSource {
    feed: Address,
    provider: HttpProvider,
    expected_decimals: u8,
    max_age: Duration,
    decimals_cache: Mutex<Option<u8>>,
}

impl ChainlinkSource {
    pub fn new(
        feed: Address,
        provider: HttpProvider,
        expected_decimals: u8,
        max_age: Duration,
    ) -> Self {
        Self {
            feed,
            provider,
            expected_decimals,
            max_age,
            decimals_cache: Mutex::new(None),
        }
    }

    async fn feed_decimals(&self, token: Address) -> Result<u8, OracleError> {
        let cached = self
            .decimals_cache
            .lock()
            .ok()
            .and_then(|guard| *guard);
        if let Some(dec) = cached {
            return Ok(dec);
        }

        let contract = AggregatorV3Interface::new(self.feed, self.provider.clone());
        let dec: u8 = retry_with_backoff(
            move || {
                let c = contract.clone();
                async move { c.decimals().call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| OracleError::Lookup {
            token,
            reason: format!("Chainlink decimals failed: {}", e),
        })?;

        if let Ok(mut guard) = self.decimals_cache.lock() {
            *guard = Some(dec);
        }
        Ok(dec)
    }
}

#[async_trait]
impl PriceSource for ChainlinkSource {
    async fn fetch_price(&self, token: Address) -> Result<PriceQuote, OracleError> {
        let decimals = self.feed_decimals(token).await?;
        if decimals != self.expected_decimals {
            return Err(OracleError::PrecisionMismatch {
                token,
                got: decimals,
                expected: self.expected_decimals,
            });
        }

        let contract = AggregatorV3Interface::new(self.feed, self.provider.clone());
        let latest = retry_with_backoff(
            move || {
                let c = contract.clone();
                async move { c.latestRoundData().call().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| OracleError::Lookup {
            token,
            reason: format!("Chainlink price failed: {}", e),
        })?;

        // Chainlink answers are int256; zero or negative is invalid.
        if latest.answer.is_negative() || latest.answer.is_zero() {
            return Err(OracleError::NonPositivePrice { token });
        }

        let updated_at: u64 = latest.updatedAt.try_into().unwrap_or(0);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let age = now.saturating_sub(updated_at);
        if age > self.max_age.as_secs() {
            tracing::warn!(
                target: "pricing",
                feed = %format!("{:#x}", self.feed),
                age,
                "Chainlink price stale"
            );
            return Err(OracleError::StalePrice {
                token,
                age_secs: age,
            });
        }

        let raw: i128 = latest
            .answer
            .try_into()
            .map_err(|_| OracleError::ValueOutOfRange(token))?;

        Ok(PriceQuote {
            price: raw as u128,
            source: self.describe(),
        })
    }

    fn describe(&self) -> String {
        format!("chainlink:{:#x}", self.feed)
    }
}
