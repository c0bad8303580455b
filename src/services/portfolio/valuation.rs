// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants::QUOTE_CACHE_TTL_SECS;
use crate::domain::error::OracleError;
use crate::domain::types::PriceQuote;
use crate::infrastructure::pricing::PriceSource;
use alloy::primitives::{Address, U256, U512};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct SourceBinding {
    source: Arc<dyn PriceSource>,
    decimals: u8,
}

/// Converts token amounts to base-asset value and back. All conversions
/// are a single widened multiply-then-divide with truncation toward
/// zero; the direction of that truncation decides whether the engine
/// slightly under- or over-estimates, so it is part of the contract.
pub struct PriceBook {
    base_token: Address,
    bindings: std::collections::HashMap<Address, SourceBinding>,
    quote_cache: DashMap<Address, (PriceQuote, Instant)>,
    cache_ttl: Duration,
}

impl PriceBook {
    pub fn new(base_token: Address) -> Self {
        Self {
            base_token,
            bindings: std::collections::HashMap::new(),
            quote_cache: DashMap::new(),
            cache_ttl: Duration::from_secs(QUOTE_CACHE_TTL_SECS),
        }
    }

    /// Binds (or re-binds) the price source for a token. Any cached
    /// quote from a previous binding is dropped.
    pub fn bind(&mut self, token: Address, source: Arc<dyn PriceSource>, decimals: u8) {
        self.quote_cache.remove(&token);
        self.bindings
            .insert(token, SourceBinding { source, decimals });
    }

    pub fn has_binding(&self, token: Address) -> bool {
        self.bindings.contains_key(&token)
    }

    pub fn binding_decimals(&self, token: Address) -> Option<u8> {
        self.bindings.get(&token).map(|b| b.decimals)
    }

    pub async fn fetch_quote(&self, token: Address) -> Result<PriceQuote, OracleError> {
        if let Some(entry) = self.quote_cache.get(&token)
            && entry.value().1.elapsed() < self.cache_ttl
        {
            return Ok(entry.value().0.clone());
        }

        let binding = self
            .bindings
            .get(&token)
            .ok_or(OracleError::MissingSource(token))?;
        let quote = binding.source.fetch_price(token).await?;
        if quote.price == 0 {
            return Err(OracleError::NonPositivePrice { token });
        }

        self.quote_cache
            .insert(token, (quote.clone(), Instant::now()));
        Ok(quote)
    }

    /// Base-asset value of `amount` of `token`. Identity for the base
    /// asset itself.
    pub async fn value_of(
        &self,
        token: Address,
        token_decimals: u8,
        base_decimals: u8,
        amount: U256,
    ) -> Result<U256, OracleError> {
        if token == self.base_token {
            return Ok(amount);
        }

        let (price_token, price_base) = self.paired_prices(token).await?;

        // exp is the decimal gap between the two native units; the
        // price decimals cancel because both bindings share them.
        let exp = base_decimals as i32 - token_decimals as i32;
        mul_div_scaled(amount, price_token, price_base, exp, token)
    }

    /// Inverse of `value_of`: the token amount worth `value` base units.
    pub async fn amount_of(
        &self,
        token: Address,
        token_decimals: u8,
        base_decimals: u8,
        value: U256,
    ) -> Result<U256, OracleError> {
        if token == self.base_token {
            return Ok(value);
        }

        let (price_token, price_base) = self.paired_prices(token).await?;

        let exp = token_decimals as i32 - base_decimals as i32;
        mul_div_scaled(value, price_base, price_token, exp, token)
    }

    async fn paired_prices(&self, token: Address) -> Result<(u128, u128), OracleError> {
        let token_dec = self
            .binding_decimals(token)
            .ok_or(OracleError::MissingSource(token))?;
        let base_dec = self
            .binding_decimals(self.base_token)
            .ok_or(OracleError::MissingSource(self.base_token))?;
        if token_dec != base_dec {
            return Err(OracleError::PrecisionMismatch {
                token,
                got: token_dec,
                expected: base_dec,
            });
        }

        let quote_token = self.fetch_quote(token).await?;
        let quote_base = self.fetch_quote(self.base_token).await?;
        Ok((quote_token.price, quote_base.price))
    }
}

/// `amount * mul * 10^exp / div` when `exp >= 0`, else
/// `amount * mul / (div * 10^-exp)`, computed at 512-bit width so the
/// intermediate product never wraps. Truncates toward zero.
fn mul_div_scaled(
    amount: U256,
    mul: u128,
    div: u128,
    exp: i32,
    token: Address,
) -> Result<U256, OracleError> {
    let mut numerator = widen(amount)
        .checked_mul(U512::from(mul))
        .ok_or(OracleError::ValueOutOfRange(token))?;
    let mut denominator = U512::from(div);

    let scale = pow10(exp.unsigned_abs(), token)?;
    if exp >= 0 {
        numerator = numerator
            .checked_mul(scale)
            .ok_or(OracleError::ValueOutOfRange(token))?;
    } else {
        denominator = denominator
            .checked_mul(scale)
            .ok_or(OracleError::ValueOutOfRange(token))?;
    }

    narrow(numerator / denominator, token)
}

/// `a * b / den` at 512-bit width, truncating. `None` when `den` is
/// zero or the quotient does not fit 256 bits.
pub(crate) fn mul_div(a: U256, b: U256, den: U256) -> Option<U256> {
    if den.is_zero() {
        return None;
    }
    let wide = widen(a).checked_mul(widen(b))?;
    let out = wide / widen(den);
    let limbs = out.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return None;
    }
    Some(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

fn pow10(exp: u32, token: Address) -> Result<U512, OracleError> {
    U512::from(10u64)
        .checked_pow(U512::from(exp))
        .ok_or(OracleError::ValueOutOfRange(token))
}

fn widen(value: U256) -> U512 {
    U512::from_limbs_slice(value.as_limbs())
}

fn narrow(value: U512, token: Address) -> Result<U256, OracleError> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return Err(OracleError::ValueOutOfRange(token));
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::pricing::StaticPriceSource;

    const BASE: Address = Address::repeat_byte(0xba);
    const TOKEN: Address = Address::repeat_byte(0x11);

    fn book_with(base_price: u128, token_price: u128) -> PriceBook {
        let mut book = PriceBook::new(BASE);
        book.bind(BASE, Arc::new(StaticPriceSource::new(base_price)), 8);
        book.bind(TOKEN, Arc::new(StaticPriceSource::new(token_price)), 8);
        book
    }

    #[tokio::test]
    async fn identity_for_base_asset() {
        let book = PriceBook::new(BASE);
        let amount = U256::from(123_456u64);
        assert_eq!(book.value_of(BASE, 6, 6, amount).await.unwrap(), amount);
        assert_eq!(book.amount_of(BASE, 6, 6, amount).await.unwrap(), amount);
    }

    #[tokio::test]
    async fn values_eighteen_decimal_token_in_six_decimal_base() {
        // $5 token, $1 base: 110 tokens are worth 550 base units.
        let book = book_with(100_000_000, 500_000_000);
        let amount = U256::from(110u64) * U256::from(10u64).pow(U256::from(18u64));
        let value = book.value_of(TOKEN, 18, 6, amount).await.unwrap();
        assert_eq!(value, U256::from(550_000_000u64));
    }

    #[tokio::test]
    async fn values_six_decimal_token_in_eighteen_decimal_base() {
        let book = book_with(100_000_000, 200_000_000);
        let amount = U256::from(25_000_000u64); // 25 tokens at 6 decimals
        let value = book.value_of(TOKEN, 6, 18, amount).await.unwrap();
        let expected = U256::from(50u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(value, expected);
    }

    #[tokio::test]
    async fn amount_of_inverts_value_of() {
        let book = book_with(100_000_000, 500_000_000);
        let value = U256::from(550_000_000u64);
        let amount = book.amount_of(TOKEN, 18, 6, value).await.unwrap();
        let expected = U256::from(110u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(amount, expected);
    }

    #[tokio::test]
    async fn roundtrip_truncates_at_most_one_unit() {
        // Deliberately awkward price so divisions do not land exactly.
        let book = book_with(100_000_000, 333_333_333);
        let value = U256::from(123_456_789u64);
        let amount = book.amount_of(TOKEN, 18, 6, value).await.unwrap();
        let back = book.value_of(TOKEN, 18, 6, amount).await.unwrap();
        assert!(back <= value, "truncation must never overestimate");
        assert!(value - back <= U256::from(1u64));
    }

    #[tokio::test]
    async fn mismatched_binding_precision_fails() {
        let mut book = PriceBook::new(BASE);
        book.bind(BASE, Arc::new(StaticPriceSource::new(100_000_000)), 8);
        book.bind(TOKEN, Arc::new(StaticPriceSource::new(1_000_000)), 6);
        let err = book
            .value_of(TOKEN, 18, 6, U256::from(1u64))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OracleError::PrecisionMismatch {
                token: TOKEN,
                got: 6,
                expected: 8,
            }
        );
    }

    #[tokio::test]
    async fn missing_bindings_fail() {
        let mut book = PriceBook::new(BASE);
        let err = book
            .value_of(TOKEN, 18, 6, U256::from(1u64))
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::MissingSource(TOKEN));

        // Token bound but the base is not.
        book.bind(TOKEN, Arc::new(StaticPriceSource::new(1)), 8);
        let err = book
            .value_of(TOKEN, 18, 6, U256::from(1u64))
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::MissingSource(BASE));
    }

    #[tokio::test]
    async fn zero_price_is_rejected() {
        let book = book_with(100_000_000, 0);
        let err = book
            .value_of(TOKEN, 18, 6, U256::from(1u64))
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::NonPositivePrice { token: TOKEN });
    }

    #[tokio::test]
    async fn oversized_results_are_rejected() {
        let book = book_with(100_000_000, 100_000_000);
        let err = book
            .value_of(TOKEN, 6, 18, U256::MAX)
            .await
            .unwrap_err();
        assert_eq!(err, OracleError::ValueOutOfRange(TOKEN));
    }

    #[test]
    fn mul_div_survives_wide_intermediates() {
        // a * b overflows 256 bits, the quotient does not.
        let a = U256::MAX / U256::from(3u64);
        let b = U256::from(300u64);
        assert_eq!(mul_div(a, b, U256::from(300u64)), Some(a));
        assert_eq!(mul_div(a, b, U256::from(1u64)), None);
        assert_eq!(mul_div(a, b, U256::ZERO), None);
    }

    #[tokio::test]
    async fn quotes_are_cached_until_rebound() {
        let source = Arc::new(StaticPriceSource::new(100_000_000));
        let mut book = PriceBook::new(BASE);
        book.bind(BASE, Arc::new(StaticPriceSource::new(100_000_000)), 8);
        book.bind(TOKEN, source.clone(), 8);

        let amount = U256::from(1_000_000u64);
        let first = book.value_of(TOKEN, 6, 6, amount).await.unwrap();

        // Price moves, but the cached quote still serves.
        source.set_price(200_000_000);
        let second = book.value_of(TOKEN, 6, 6, amount).await.unwrap();
        assert_eq!(first, second);

        // Re-binding drops the cache.
        book.bind(TOKEN, source.clone(), 8);
        let third = book.value_of(TOKEN, 6, 6, amount).await.unwrap();
        assert_eq!(third, first * U256::from(2u64));
    }
}
