// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::error::OracleError;
use crate::domain::types::PriceQuote;
use crate::infrastructure::pricing::PriceSource;
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Mutex;

/// Fixed price pinned by the operator. Useful for stables pegged 1:1
/// to the base asset and as a deterministic source in tests.
pub struct StaticPriceSource {
    label: String,
    price: Mutex<u128>,
}

impl StaticPriceSource {
    pub fn new(price: u128) -> Self {
        Self::named("static", price)
    }

    pub fn named(label: &str, price: u128) -> Self {
        Self {
            label: label.to_string(),
            price: Mutex::new(price),
        }
    }

    pub fn set_price(&self, price: u128) {
        let mut guard = self.price.lock().unwrap_or_else(|e| e.into_inner());
        *guard = price;
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch_price(&self, token: Address) -> Result<PriceQuote, OracleError> {
        let price = *self.price.lock().unwrap_or_else(|e| e.into_inner());
        if price == 0 {
            return Err(OracleError::NonPositivePrice { token });
        }
        Ok(PriceQuote {
            price,
            source: self.describe(),
        })
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
