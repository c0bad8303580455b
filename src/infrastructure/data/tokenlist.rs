// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::domain::constants::chainlink_feed_by_symbol;
use crate::domain::error::EngineError;
use crate::infrastructure::pricing::{
    ChainlinkSource, HttpTickerSource, PriceSource, StaticPriceSource,
};
use crate::network::provider::HttpProvider;

/// Static token metadata plus the oracle binding to use for it,
/// keyed per chain so one file can serve every deployment.
#[derive(Debug, Clone)]
pub struct TokenListing {
    pub symbol: String,
    pub decimals: u8,
    pub source: Option<SourceSpec>,
}

/// Declarative price source description from the tokenlist file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Chainlink {
        feed: Address,
        decimals: u8,
    },
    /// Well-known mainnet USD feed looked up by symbol, e.g. `ETH_USD`.
    ChainlinkSymbol {
        symbol: String,
        decimals: u8,
    },
    Http {
        label: String,
        url: String,
        pointer: String,
        decimals: u8,
    },
    Static {
        price: u64,
        decimals: u8,
    },
}

impl SourceSpec {
    pub fn decimals(&self) -> u8 {
        match self {
            SourceSpec::Chainlink { decimals, .. } => *decimals,
            SourceSpec::ChainlinkSymbol { decimals, .. } => *decimals,
            SourceSpec::Http { decimals, .. } => *decimals,
            SourceSpec::Static { decimals, .. } => *decimals,
        }
    }

    pub fn instantiate(
        &self,
        provider: &HttpProvider,
        staleness: Duration,
    ) -> Result<Arc<dyn PriceSource>, EngineError> {
        match self {
            SourceSpec::Chainlink { feed, decimals } => Ok(Arc::new(ChainlinkSource::new(
                *feed,
                provider.clone(),
                *decimals,
                staleness,
            ))),
            SourceSpec::ChainlinkSymbol { symbol, decimals } => {
                let feed = chainlink_feed_by_symbol(symbol).ok_or_else(|| {
                    EngineError::Config(format!("No known Chainlink feed for symbol {symbol}"))
                })?;
                Ok(Arc::new(ChainlinkSource::new(
                    feed,
                    provider.clone(),
                    *decimals,
                    staleness,
                )))
            }
            SourceSpec::Http {
                label,
                url,
                pointer,
                decimals,
            } => Ok(Arc::new(HttpTickerSource::new(
                label, url, pointer, *decimals,
            ))),
            SourceSpec::Static { price, .. } => Ok(Arc::new(StaticPriceSource::new(u128::from(*price)))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenBook {
    tokens_by_chain: HashMap<u64, HashMap<Address, TokenListing>>,
    symbols_by_chain: HashMap<u64, HashMap<String, Address>>,
}

#[derive(Deserialize)]
struct TokenEntry {
    symbol: String,
    decimals: u8,
    #[serde(default)]
    addresses: HashMap<String, String>,
    #[serde(default)]
    source: Option<SourceSpec>,
}

impl TokenBook {
    pub fn load_from_file(path: &str) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read tokenlist {path}: {e}")))?;
        Self::from_json(&raw)
            .map_err(|e| EngineError::Config(format!("Invalid tokenlist JSON {path}: {e}")))
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<TokenEntry> = serde_json::from_str(raw)?;

        let mut tokens_by_chain: HashMap<u64, HashMap<Address, TokenListing>> = HashMap::new();
        let mut symbols_by_chain: HashMap<u64, HashMap<String, Address>> = HashMap::new();

        for entry in entries {
            for (chain_str, addr_str) in &entry.addresses {
                if let Ok(chain_id) = chain_str.parse::<u64>()
                    && let Ok(addr) = addr_str.parse::<Address>()
                {
                    tokens_by_chain.entry(chain_id).or_default().insert(
                        addr,
                        TokenListing {
                            symbol: entry.symbol.clone(),
                            decimals: entry.decimals,
                            source: entry.source.clone(),
                        },
                    );
                    symbols_by_chain
                        .entry(chain_id)
                        .or_default()
                        .insert(entry.symbol.to_uppercase(), addr);
                }
            }
        }

        Ok(Self {
            tokens_by_chain,
            symbols_by_chain,
        })
    }

    pub fn listing(&self, chain_id: u64, address: Address) -> Option<&TokenListing> {
        self.tokens_by_chain
            .get(&chain_id)
            .and_then(|m| m.get(&address))
    }

    /// Resolves a config token reference: hex address first, symbol
    /// lookup second.
    pub fn resolve(&self, chain_id: u64, token_ref: &str) -> Option<Address> {
        if let Ok(addr) = token_ref.trim().parse::<Address>() {
            return Some(addr);
        }
        self.symbols_by_chain
            .get(&chain_id)
            .and_then(|m| m.get(&token_ref.trim().to_uppercase()))
            .copied()
    }

    pub fn tokens_on(&self, chain_id: u64) -> impl Iterator<Item = (&Address, &TokenListing)> {
        self.tokens_by_chain
            .get(&chain_id)
            .into_iter()
            .flat_map(|m| m.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens_by_chain.is_empty()
    }
}
