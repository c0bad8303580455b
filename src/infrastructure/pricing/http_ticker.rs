// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::error::OracleError;
use crate::domain::types::PriceQuote;
use crate::infrastructure::pricing::PriceSource;
use alloy::primitives::Address;
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 5;

/// REST ticker source: fetches a JSON document and extracts the price
/// at a configured pointer, e.g. `/price` for the Binance ticker shape
/// `{"symbol":"ETHUSDC","price":"2543.12"}`.
pub struct HttpTickerSource {
    client: reqwest::Client,
    label: String,
    url: String,
    json_pointer: String,
    decimals: u8,
}

impl HttpTickerSource {
    pub fn new(label: &str, url: &str, json_pointer: &str, decimals: u8) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap(),
            label: label.to_string(),
            url: url.to_string(),
            json_pointer: json_pointer.to_string(),
            decimals,
        }
    }
}

#[async_trait]
impl PriceSource for HttpTickerSource {
    async fn fetch_price(&self, token: Address) -> Result<PriceQuote, OracleError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| OracleError::Lookup {
                token,
                reason: format!("{} request failed: {}", self.label, e),
            })?;

        if !resp.status().is_success() {
            return Err(OracleError::Lookup {
                token,
                reason: format!("{} returned HTTP {}", self.label, resp.status()),
            });
        }

        let parsed: serde_json::Value = resp.json().await.map_err(|e| OracleError::Lookup {
            token,
            reason: format!("{} decode failed: {}", self.label, e),
        })?;

        let field = parsed
            .pointer(&self.json_pointer)
            .ok_or_else(|| OracleError::Lookup {
                token,
                reason: format!("{} missing field {}", self.label, self.json_pointer),
            })?;

        // Tickers report prices as JSON numbers or quoted strings.
        let price_f64 = field
            .as_f64()
            .or_else(|| field.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| OracleError::Lookup {
                token,
                reason: format!("{} unparseable price field", self.label),
            })?;

        if !price_f64.is_finite() || price_f64 <= 0.0 {
            return Err(OracleError::NonPositivePrice { token });
        }

        let price = scale_price(price_f64, self.decimals)
            .ok_or(OracleError::ValueOutOfRange(token))?;

        Ok(PriceQuote {
            price,
            source: self.describe(),
        })
    }

    fn describe(&self) -> String {
        format!("http:{}", self.label)
    }
}

pub(crate) fn scale_price(price: f64, decimals: u8) -> Option<u128> {
    let factor = 10f64.powi(decimals as i32);
    let scaled = price * factor;
    if !scaled.is_finite() || scaled <= 0.0 || scaled >= u128::MAX as f64 {
        return None;
    }
    Some(scaled as u128)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_to_declared_decimals() {
        assert_eq!(scale_price(2500.0, 8), Some(250_000_000_000));
        assert_eq!(scale_price(0.5, 6), Some(500_000));
    }

    #[test]
    fn rejects_unusable_values() {
        assert_eq!(scale_price(0.0, 8), None);
        assert_eq!(scale_price(-1.0, 8), None);
        assert_eq!(scale_price(f64::INFINITY, 8), None);
        assert_eq!(scale_price(f64::MAX, 18), None);
    }
}
