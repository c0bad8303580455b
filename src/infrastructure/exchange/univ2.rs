// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::backoff::retry_with_backoff;
use crate::domain::constants::{QUOTE_RETRY_BASE_DELAY_MS, SWAP_DEADLINE_SECS};
use crate::domain::error::SwapFailure;
use crate::infrastructure::exchange::Exchange;
use crate::infrastructure::network::gas::{GasFees, GasOracle};
use crate::infrastructure::network::nonce::NonceManager;
use crate::network::provider::HttpProvider;
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, B256, TxKind, U256};
use alloy::providers::Provider;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use std::time::Duration;

const APPROVAL_GAS_LIMIT: u64 = 70_000;
const TRANSFER_GAS_LIMIT: u64 = 90_000;
const SWAP_GAS_LIMIT: u64 = 300_000;
const RECEIPT_POLL_ATTEMPTS: u32 = 45;
const RECEIPT_POLL_INTERVAL_MS: u64 = 2_000;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract UniV2Router {
        function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) returns (uint256[] memory amounts);
        function getAmountsOut(uint256 amountIn, address[] calldata path) external view returns (uint256[] memory amounts);
    }

    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract ERC20 {
        function balanceOf(address) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Uniswap-V2-compatible router adapter. Sends plain EIP-1559
/// transactions from the keeper wallet and settles output amounts from
/// the wallet's balance delta, which stays honest for fee-on-transfer
/// tokens.
pub struct UniV2Exchange {
    provider: HttpProvider,
    router: Address,
    signer: PrivateKeySigner,
    chain_id: u64,
    gas_oracle: GasOracle,
    nonces: NonceManager,
    quote_attempts: u32,
}

impl UniV2Exchange {
    pub fn new(
        provider: HttpProvider,
        router: Address,
        signer: PrivateKeySigner,
        chain_id: u64,
        quote_attempts: u32,
    ) -> Self {
        let gas_oracle = GasOracle::new(provider.clone());
        let nonces = NonceManager::new(provider.clone(), signer.address());
        Self {
            provider,
            router,
            signer,
            chain_id,
            gas_oracle,
            nonces,
            quote_attempts,
        }
    }

    pub fn router(&self) -> Address {
        self.router
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, SwapFailure> {
        let erc20 = ERC20::new(token, self.provider.clone());
        retry_with_backoff(
            move || {
                let c = erc20.clone();
                async move { c.balanceOf(owner).call().await }
            },
            3,
            Duration::from_millis(QUOTE_RETRY_BASE_DELAY_MS),
        )
        .await
        .map_err(|e| SwapFailure::Execution(format!("Balance read failed: {}", e)))
    }

    async fn needs_approval(&self, token: Address, required: U256) -> Result<bool, SwapFailure> {
        let owner = self.signer.address();
        let spender = self.router;
        let erc20 = ERC20::new(token, self.provider.clone());
        let allowance: U256 = retry_with_backoff(
            move || {
                let c = erc20.clone();
                async move { c.allowance(owner, spender).call().await }
            },
            3,
            Duration::from_millis(QUOTE_RETRY_BASE_DELAY_MS),
        )
        .await
        .map_err(|e| SwapFailure::Execution(format!("Allowance check failed: {}", e)))?;
        Ok(allowance < required)
    }

    async fn send_approval(&self, token: Address, amount: U256) -> Result<B256, SwapFailure> {
        let calldata = ERC20::new(token, self.provider.clone())
            .approve(self.router, amount)
            .calldata()
            .to_vec();

        let fees = self.fees().await?;
        let nonce = self
            .nonces
            .get_next_nonce()
            .await
            .map_err(|e| SwapFailure::Execution(e.to_string()))?;
        let raw = self.sign_call(token, APPROVAL_GAS_LIMIT, calldata, &fees, nonce)?;

        match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => Ok(*pending.tx_hash()),
            Err(e) => {
                self.nonces.invalidate().await;
                Err(SwapFailure::Execution(format!("Approval send failed: {}", e)))
            }
        }
    }

    /// Best-effort allowance reset after a failed swap. Leaving a live
    /// allowance on a router we just failed against is the one state
    /// this adapter refuses to persist.
    async fn reset_approval(&self, token: Address) {
        match self.send_approval(token, U256::ZERO).await {
            Ok(hash) => {
                tracing::debug!(
                    target: "exchange",
                    token = %format!("{:#x}", token),
                    tx = %format!("{:#x}", hash),
                    "Allowance reset submitted"
                );
            }
            Err(e) => {
                tracing::warn!(
                    target: "exchange",
                    token = %format!("{:#x}", token),
                    error = %e,
                    "Allowance reset failed"
                );
            }
        }
    }

    async fn fees(&self) -> Result<GasFees, SwapFailure> {
        self.gas_oracle
            .estimate_eip1559_fees()
            .await
            .map_err(|e| SwapFailure::Execution(format!("Fee estimate failed: {}", e)))
    }

    fn sign_call(
        &self,
        to: Address,
        gas_limit: u64,
        calldata: Vec<u8>,
        fees: &GasFees,
        nonce: u64,
    ) -> Result<Vec<u8>, SwapFailure> {
        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            gas_limit,
            to: TxKind::Call(to),
            value: U256::ZERO,
            access_list: AccessList::default(),
            input: calldata.into(),
        };
        let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
            .map_err(|e| SwapFailure::Execution(format!("Sign failed: {}", e)))?;
        let signed: TxEnvelope = tx.into_signed(sig).into();
        Ok(signed.encoded_2718())
    }

    /// Polls for the receipt. `Ok(status)` once mined, `Err(elapsed)`
    /// when the poll budget runs out.
    async fn await_receipt(&self, hash: &B256) -> Result<bool, u64> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            if let Ok(Some(rcpt)) = self.provider.get_transaction_receipt(*hash).await {
                return Ok(rcpt.status());
            }
            tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS)).await;
        }
        Err(RECEIPT_POLL_ATTEMPTS as u64 * RECEIPT_POLL_INTERVAL_MS / 1_000)
    }
}

#[async_trait]
impl Exchange for UniV2Exchange {
    async fn expected_output(
        &self,
        route: &[Address],
        amount_in: U256,
    ) -> Result<U256, SwapFailure> {
        validate_route(route)?;

        let contract = UniV2Router::new(self.router, self.provider.clone());
        let path = route.to_vec();
        let amounts: Vec<U256> = retry_with_backoff(
            move || {
                let c = contract.clone();
                let p = path.clone();
                async move { c.getAmountsOut(amount_in, p.clone()).call().await }
            },
            self.quote_attempts,
            Duration::from_millis(QUOTE_RETRY_BASE_DELAY_MS),
        )
        .await
        .map_err(|e| SwapFailure::QuoteUnavailable(e.to_string()))?;

        amounts
            .last()
            .copied()
            .filter(|out| !out.is_zero())
            .ok_or_else(|| SwapFailure::QuoteUnavailable("Router returned no output".into()))
    }

    async fn execute_swap(
        &self,
        route: &[Address],
        amount_in: U256,
        min_out: U256,
    ) -> Result<U256, SwapFailure> {
        let (token_in, token_out) = validate_route(route)?;
        let owner = self.signer.address();

        let balance_before = self.token_balance(token_out, owner).await?;

        // Exact-amount approval: a completed swap consumes the whole
        // allowance, so the success path leaves nothing spendable behind.
        if self.needs_approval(token_in, amount_in).await? {
            self.send_approval(token_in, amount_in).await?;
        }

        let fees = self.fees().await?;
        let deadline = U256::from((chrono::Utc::now().timestamp() as u64) + SWAP_DEADLINE_SECS);
        let calldata = UniV2Router::new(self.router, self.provider.clone())
            .swapExactTokensForTokens(amount_in, min_out, route.to_vec(), owner, deadline)
            .calldata()
            .to_vec();

        let nonce = self
            .nonces
            .get_next_nonce()
            .await
            .map_err(|e| SwapFailure::Execution(e.to_string()))?;
        let raw = self.sign_call(self.router, SWAP_GAS_LIMIT, calldata, &fees, nonce)?;

        let tx_hash = match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => *pending.tx_hash(),
            Err(e) => {
                self.nonces.invalidate().await;
                self.reset_approval(token_in).await;
                return Err(SwapFailure::Execution(format!("Swap send failed: {}", e)));
            }
        };

        // Any non-success exit resets the allowance; an unmined swap is
        // written off as failed, and its approval must not outlive it.
        match self.await_receipt(&tx_hash).await {
            Ok(true) => {}
            Ok(false) => {
                self.reset_approval(token_in).await;
                return Err(SwapFailure::Execution(format!(
                    "Swap {:#x} reverted",
                    tx_hash
                )));
            }
            Err(elapsed) => {
                self.reset_approval(token_in).await;
                return Err(SwapFailure::Timeout(elapsed));
            }
        }

        // The router enforces min_out on-chain, so a confirmed swap
        // received at least that much even if the balance re-read fails.
        let received = match self.token_balance(token_out, owner).await {
            Ok(balance_after) => balance_after.saturating_sub(balance_before),
            Err(e) => {
                tracing::warn!(
                    target: "exchange",
                    tx = %format!("{:#x}", tx_hash),
                    error = %e,
                    "Balance re-read failed after confirmed swap; crediting min_out"
                );
                min_out
            }
        };

        tracing::info!(
            target: "exchange",
            tx = %format!("{:#x}", tx_hash),
            token_in = %format!("{:#x}", token_in),
            token_out = %format!("{:#x}", token_out),
            amount_in = %amount_in,
            received = %received,
            "Swap confirmed"
        );

        Ok(received)
    }

    async fn balance_of(&self, token: Address) -> Result<U256, SwapFailure> {
        self.token_balance(token, self.signer.address()).await
    }

    async fn transfer(
        &self,
        token: Address,
        recipient: Address,
        amount: U256,
    ) -> Result<(), SwapFailure> {
        if amount.is_zero() {
            return Ok(());
        }

        let calldata = ERC20::new(token, self.provider.clone())
            .transfer(recipient, amount)
            .calldata()
            .to_vec();

        let fees = self.fees().await?;
        let nonce = self
            .nonces
            .get_next_nonce()
            .await
            .map_err(|e| SwapFailure::Execution(e.to_string()))?;
        let raw = self.sign_call(token, TRANSFER_GAS_LIMIT, calldata, &fees, nonce)?;

        let tx_hash = match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => *pending.tx_hash(),
            Err(e) => {
                self.nonces.invalidate().await;
                return Err(SwapFailure::Execution(format!(
                    "Transfer send failed: {}",
                    e
                )));
            }
        };

        match self.await_receipt(&tx_hash).await {
            Ok(true) => {
                tracing::info!(
                    target: "exchange",
                    tx = %format!("{:#x}", tx_hash),
                    token = %format!("{:#x}", token),
                    recipient = %format!("{:#x}", recipient),
                    amount = %amount,
                    "Transfer confirmed"
                );
                Ok(())
            }
            Ok(false) => Err(SwapFailure::Execution(format!(
                "Transfer {:#x} reverted",
                tx_hash
            ))),
            Err(elapsed) => Err(SwapFailure::Timeout(elapsed)),
        }
    }
}

fn validate_route(route: &[Address]) -> Result<(Address, Address), SwapFailure> {
    if route.len() < 2 {
        return Err(SwapFailure::Execution(
            "Route needs at least two tokens".into(),
        ));
    }
    for window in route.windows(2) {
        if window[0] == window[1] {
            return Err(SwapFailure::Execution("Route repeats a hop".into()));
        }
    }
    Ok((route[0], route[route.len() - 1]))
}
