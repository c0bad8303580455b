// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::constants::{MAX_ALLOCATIONS, WEIGHT_SCALE_BPS};
use crate::domain::error::EngineError;
use crate::domain::types::{Allocation, TokenMeta};
use alloy::primitives::Address;
use std::collections::HashMap;

/// Owns the token allow-list and the target portfolio. Writes are
/// validated as a whole before anything is applied; a rejected set
/// leaves the previous targets untouched.
pub struct AllocationRegistry {
    base_token: Address,
    allowed: HashMap<Address, TokenMeta>,
    targets: Vec<Allocation>,
}

impl AllocationRegistry {
    pub fn new(base_token: Address, base_meta: TokenMeta) -> Self {
        let mut allowed = HashMap::new();
        allowed.insert(base_token, base_meta);
        Self {
            base_token,
            allowed,
            targets: Vec::new(),
        }
    }

    pub fn base_token(&self) -> Address {
        self.base_token
    }

    pub fn allow_token(&mut self, token: Address, meta: TokenMeta) -> Result<(), EngineError> {
        if token == Address::ZERO {
            return Err(EngineError::validation("token", "zero address"));
        }
        if self.allowed.contains_key(&token) {
            return Err(EngineError::validation("token", "already allowed"));
        }
        self.allowed.insert(token, meta);
        Ok(())
    }

    /// The engine additionally refuses to disallow a token it still
    /// holds; this layer only knows about targets and the allow-list.
    pub fn disallow_token(&mut self, token: Address) -> Result<TokenMeta, EngineError> {
        if token == self.base_token {
            return Err(EngineError::validation(
                "token",
                "base asset cannot be disallowed",
            ));
        }
        if self.in_targets(token) {
            return Err(EngineError::validation(
                "token",
                "token is part of the target portfolio",
            ));
        }
        self.allowed
            .remove(&token)
            .ok_or_else(|| EngineError::validation("token", "not in the allow-list"))
    }

    /// Structural validation for a candidate target portfolio.
    /// `has_binding` answers whether a token has a price source bound.
    pub fn validate(
        &self,
        list: &[Allocation],
        has_binding: impl Fn(Address) -> bool,
    ) -> Result<(), EngineError> {
        if list.len() > MAX_ALLOCATIONS {
            return Err(EngineError::validation(
                "allocations",
                format!("more than {} entries", MAX_ALLOCATIONS),
            ));
        }

        let mut sum: u64 = 0;
        let mut seen: Vec<Address> = Vec::with_capacity(list.len());
        for alloc in list {
            if alloc.token == Address::ZERO {
                return Err(EngineError::validation("allocations", "zero token address"));
            }
            if !self.allowed.contains_key(&alloc.token) {
                return Err(EngineError::validation(
                    "allocations",
                    format!("token {:#x} is not allowed", alloc.token),
                ));
            }
            if alloc.weight_bps == 0 {
                return Err(EngineError::validation("allocations", "zero weight"));
            }
            if seen.contains(&alloc.token) {
                return Err(EngineError::validation(
                    "allocations",
                    format!("token {:#x} listed twice", alloc.token),
                ));
            }
            if !has_binding(alloc.token) {
                return Err(EngineError::validation(
                    "allocations",
                    format!("token {:#x} has no price source", alloc.token),
                ));
            }
            seen.push(alloc.token);
            sum = sum.saturating_add(alloc.weight_bps);
        }

        if sum > WEIGHT_SCALE_BPS {
            return Err(EngineError::validation(
                "allocations",
                format!("weights sum to {} bps, above {}", sum, WEIGHT_SCALE_BPS),
            ));
        }

        Ok(())
    }

    /// Replaces the whole target portfolio. Callers must have run
    /// `validate` on the same list first.
    pub fn replace(&mut self, list: Vec<Allocation>) {
        self.targets = list;
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    pub fn targets(&self) -> &[Allocation] {
        &self.targets
    }

    pub fn is_allowed(&self, token: Address) -> bool {
        self.allowed.contains_key(&token)
    }

    pub fn meta(&self, token: Address) -> Option<&TokenMeta> {
        self.allowed.get(&token)
    }

    pub fn in_targets(&self, token: Address) -> bool {
        self.targets.iter().any(|a| a.token == token)
    }

    pub fn allowed_tokens(&self) -> Vec<Address> {
        self.allowed.keys().copied().collect()
    }
}
