// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::backoff::retry_with_backoff;
use crate::domain::error::EngineError;
use crate::network::provider::HttpProvider;
use alloy::primitives::Address;
use alloy::providers::Provider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Hands out sequential nonces for the signer wallet. Rebalance legs send
/// approval and swap transactions back to back, so the pending count is
/// only fetched once and advanced locally.
#[derive(Clone)]
pub struct NonceManager {
    provider: HttpProvider,
    address: Address,
    local_nonce: Arc<Mutex<Option<u64>>>,
}

impl NonceManager {
    pub fn new(provider: HttpProvider, address: Address) -> Self {
        Self {
            provider,
            address,
            local_nonce: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn get_next_nonce(&self) -> Result<u64, EngineError> {
        let mut nonce_guard = self.local_nonce.lock().await;

        if let Some(nonce) = *nonce_guard {
            *nonce_guard = Some(nonce + 1);
            return Ok(nonce);
        }

        let on_chain_nonce = self.fetch_pending_count().await?;
        *nonce_guard = Some(on_chain_nonce + 1);
        Ok(on_chain_nonce)
    }

    /// Drops the local counter so the next allocation re-reads the chain.
    /// Called after a failed send, where the allocated nonce may or may
    /// not have been consumed.
    pub async fn invalidate(&self) {
        let mut nonce_guard = self.local_nonce.lock().await;
        *nonce_guard = None;
    }

    pub async fn resync(&self) -> Result<(), EngineError> {
        let mut nonce_guard = self.local_nonce.lock().await;
        let on_chain_nonce = self.fetch_pending_count().await?;
        *nonce_guard = Some(on_chain_nonce);
        tracing::debug!(target: "nonce", nonce = on_chain_nonce, "Nonce resynced");
        Ok(())
    }

    async fn fetch_pending_count(&self) -> Result<u64, EngineError> {
        let provider = self.provider.clone();
        let address = self.address;
        retry_with_backoff(
            move || {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| EngineError::Connection(format!("Failed to fetch nonce: {}", e)))
    }
}
