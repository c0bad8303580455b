// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::Address;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Swap(#[from] SwapFailure),

    #[error("Caller {caller} is not authorized for {role} operations")]
    Unauthorized { caller: Address, role: &'static str },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl EngineError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Failures surfaced by price sources and the valuation arithmetic.
///
/// Hard in the direct valuation path (`total_assets`), soft inside a
/// rebalance or liquidation pass where a failing token is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("No price source bound for token {0}")]
    MissingSource(Address),

    #[error("Token {0} is not registered")]
    UnknownToken(Address),

    #[error("Price source for {token} returned a non-positive answer")]
    NonPositivePrice { token: Address },

    #[error("Price for {token} is stale: {age_secs}s old")]
    StalePrice { token: Address, age_secs: u64 },

    #[error("Price precision mismatch for {token}: source reports {got} decimals, base binding has {expected}")]
    PrecisionMismatch { token: Address, got: u8, expected: u8 },

    #[error("Price lookup for {token} failed: {reason}")]
    Lookup { token: Address, reason: String },

    #[error("Converted value for {0} exceeds the 256-bit range")]
    ValueOutOfRange(Address),
}

/// Why a single swap leg did not execute. Never escalated past the leg
/// that recorded it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapFailure {
    #[error("No quote available on route: {0}")]
    QuoteUnavailable(String),

    #[error("Insufficient {token} balance: need {needed}, have {available}")]
    InsufficientBalance {
        token: Address,
        needed: String,
        available: String,
    },

    #[error("Exchange call failed: {0}")]
    Execution(String),

    #[error("Exchange call timed out after {0}s")]
    Timeout(u64),
}
