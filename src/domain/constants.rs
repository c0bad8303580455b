// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, address};
use lazy_static::lazy_static;
use std::collections::HashMap;

// Common assets
pub const WETH_MAINNET: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const WETH_OPTIMISM: Address = address!("4200000000000000000000000000000000000006");
pub const WETH_ARBITRUM: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");
pub const WETH_POLYGON: Address = address!("7ceB23fD6bC0adD59E62ac25578270cFf1b9f619");
pub const WBNB_BSC: Address = address!("BB4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");

pub const USDC_MAINNET: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const USDC_OPTIMISM: Address = address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85");
pub const USDC_ARBITRUM: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");
pub const USDC_POLYGON: Address = address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359");

// =============================================================================
// NETWORK CONSTANTS
// =============================================================================

pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_OPTIMISM: u64 = 10;
pub const CHAIN_BSC: u64 = 56;
pub const CHAIN_POLYGON: u64 = 137;
pub const CHAIN_ARBITRUM: u64 = 42161;

// =============================================================================
// ALLOCATION CONSTANTS
// =============================================================================

// 10000 bps = 100%. Weights, the rebalance threshold and the slippage
// bound are all expressed against this scale.
pub const WEIGHT_SCALE_BPS: u64 = 10_000;

// Hard cap on target portfolio entries.
pub const MAX_ALLOCATIONS: usize = 10;

// Value deviations below 1% of total value are left untraded.
pub const REBALANCE_THRESHOLD_BPS: u64 = 100;

// Fixed slippage bound applied to every quoted swap.
pub const MAX_SLIPPAGE_BPS: u64 = 500;

// =============================================================================
// EXTERNAL CALL LIMITS
// =============================================================================

pub const ORACLE_STALENESS_SECS: u64 = 600;
pub const EXTERNAL_CALL_TIMEOUT_SECS: u64 = 10;
pub const SWAP_DEADLINE_SECS: u64 = 300;
pub const QUOTE_CACHE_TTL_SECS: u64 = 5;
pub const QUOTE_RETRY_ATTEMPTS: u32 = 3;
pub const QUOTE_RETRY_BASE_DELAY_MS: u64 = 100;

lazy_static! {
    // V2-style router the execution path swaps through, one per chain.
    pub static ref V2_ROUTERS_BY_CHAIN: HashMap<u64, Address> = {
        let mut m = HashMap::new();

        // Uniswap V2 Router02
        m.insert(CHAIN_ETHEREUM, address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D"));

        // Sushi deployments (NOTE: NOT 1b02... on OP)
        m.insert(CHAIN_OPTIMISM, address!("2abf469074dc0b54d793850807e6eb5faf2625b1"));
        m.insert(CHAIN_ARBITRUM, address!("1b02dA8Cb0d097eB8D57A175b88c7D8b47997506"));

        // PancakeSwap V2
        m.insert(CHAIN_BSC, address!("10ED43C718714eb63d5aA57B78B54704E256024E"));

        // QuickSwap (UniV2-style)
        m.insert(CHAIN_POLYGON, address!("a5E0829CaCEd8fFDD4De3c43696c57F7D7A678ff"));

        m
    };

    // Chainlink USD feeds resolvable by symbol in tokenlist files
    // (mainnet only; other chains must give explicit aggregator addresses).
    pub static ref CHAINLINK_FEEDS_MAINNET: HashMap<&'static str, Address> = {
        let mut m = HashMap::new();

        m.insert("ETH_USD", address!("5f4eC3Df9cbd43714FE2740f5E3616155c5b8419"));
        m.insert("BTC_USD", address!("F4030086522a5bEEa4988F8cA5B36dbC97BeE88c"));
        m.insert("LINK_USD", address!("2c1d072e956AFFC0D435Cb7AC38EF18d24d9127c"));
        m.insert("USDC_USD", address!("8fFfFfd4AfB6115b954Bd326cbe7B4BA576818f6"));
        m.insert("USDT_USD", address!("3E7d1eAB13ad0104d2750B8863b489D65364e32D"));
        m.insert("DAI_USD", address!("Aed0c38402a5d19df6E4c03F4E2DceD6e29c1ee9"));
        m.insert("AAVE_USD", address!("547a514d5e3769680Ce22B2361c10Ea13619e8a9"));
        m.insert("UNI_USD", address!("553303d460EE0afB37EdFf9bE42922D8FF63220e"));

        m
    };

    pub static ref WRAPPED_NATIVE_BY_CHAIN: HashMap<u64, Address> = {
        let mut m = HashMap::new();
        m.insert(CHAIN_ETHEREUM, WETH_MAINNET);
        m.insert(CHAIN_OPTIMISM, WETH_OPTIMISM);
        m.insert(CHAIN_ARBITRUM, WETH_ARBITRUM);
        m.insert(CHAIN_POLYGON, WETH_POLYGON);
        m.insert(CHAIN_BSC, WBNB_BSC);
        m
    };
}

// =============================================================================
// LOGGING DEFAULTS
// =============================================================================

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub fn wrapped_native_for_chain(chain_id: u64) -> Address {
    WRAPPED_NATIVE_BY_CHAIN
        .get(&chain_id)
        .copied()
        .unwrap_or(WETH_MAINNET)
}

pub fn default_router_for_chain(chain_id: u64) -> Address {
    V2_ROUTERS_BY_CHAIN
        .get(&chain_id)
        .copied()
        .unwrap_or_else(|| V2_ROUTERS_BY_CHAIN[&CHAIN_ETHEREUM])
}

pub fn chainlink_feed_by_symbol(symbol: &str) -> Option<Address> {
    CHAINLINK_FEEDS_MAINNET
        .get(symbol.to_uppercase().as_str())
        .copied()
}
