//! Async wrapper around [`CashSwapSdk`].
//!
//! SDK calls block on the network provider, so each one runs on
//! `tokio::task::spawn_blocking` under a timeout. A timed-out call keeps
//! running on its blocking thread; only the caller stops waiting.

use std::sync::Arc;
use std::time::Duration;

use crate::address::CashAddress;
use crate::amm_pool::params::{Pool, PoolSummary};
use crate::amm_pool::tx::add_liquidity::{DepositAmount, LiquidityChange};
use crate::amm_pool::tx::creation::PoolCreation;
use crate::amm_pool::tx::remove_liquidity::WithdrawAmount;
use crate::amm_pool::tx::swap::SwapOutcome;
use crate::error::{Error, NodeError};
use crate::sdk::{CashSwapSdk, SwapQuote};
use crate::signing::SigningRequest;
use crate::template::UnsignedTxTemplate;
use crate::trade::{SplitAnalysis, SwapRequest};
use crate::utxo::{TokenCategory, Txid};

// ── Struct ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CashSwapNode {
    sdk: Arc<CashSwapSdk>,
    timeout: Duration,
}

impl CashSwapNode {
    /// Wrap `sdk`, using its configured request timeout.
    pub fn new(sdk: CashSwapSdk) -> Self {
        let timeout = sdk.config().request_timeout();
        Self {
            sdk: Arc::new(sdk),
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sdk(&self) -> &CashSwapSdk {
        &self.sdk
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ── Internal: spawn_blocking SDK helper ─────────────────────────────

    async fn with_sdk<F, R>(&self, f: F) -> Result<R, NodeError>
    where
        F: FnOnce(&CashSwapSdk) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        let sdk = self.sdk.clone();
        let task = tokio::task::spawn_blocking(move || f(&sdk));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| NodeError::Task(e.to_string()))?
                .map_err(NodeError::Sdk),
            Err(_) => {
                log::warn!("sdk call timed out after {:?}", self.timeout);
                Err(NodeError::Timeout(self.timeout))
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub async fn pools(&self, category: TokenCategory) -> Result<Vec<Pool>, NodeError> {
        self.with_sdk(move |sdk| sdk.pools(&category)).await
    }

    pub async fn pool_summaries(
        &self,
        category: TokenCategory,
    ) -> Result<Vec<PoolSummary>, NodeError> {
        self.with_sdk(move |sdk| sdk.pool_summaries(&category)).await
    }

    pub async fn quote_swap(
        &self,
        request: SwapRequest,
        slippage_bps: u64,
    ) -> Result<SwapQuote, NodeError> {
        self.with_sdk(move |sdk| sdk.quote_swap(&request, slippage_bps))
            .await
    }

    pub async fn split_route_analysis(
        &self,
        request: SwapRequest,
        top_n: usize,
    ) -> Result<SplitAnalysis, NodeError> {
        self.with_sdk(move |sdk| sdk.split_route_analysis(&request, top_n))
            .await
    }

    // ── Builders ────────────────────────────────────────────────────────

    pub async fn build_swap(
        &self,
        quote: SwapQuote,
        user_address: CashAddress,
    ) -> Result<SwapOutcome, NodeError> {
        self.with_sdk(move |sdk| sdk.build_swap(&quote, &user_address))
            .await
    }

    pub async fn create_pool(
        &self,
        owner_address: CashAddress,
        category: TokenCategory,
        bch_amount: Option<u64>,
        token_amount: Option<u64>,
    ) -> Result<PoolCreation, NodeError> {
        self.with_sdk(move |sdk| {
            sdk.create_pool(&owner_address, &category, bch_amount, token_amount)
        })
        .await
    }

    pub async fn add_liquidity(
        &self,
        owner_address: CashAddress,
        category: TokenCategory,
        amount: DepositAmount,
    ) -> Result<LiquidityChange, NodeError> {
        self.with_sdk(move |sdk| sdk.add_liquidity(&owner_address, &category, amount))
            .await
    }

    pub async fn remove_liquidity(
        &self,
        owner_address: CashAddress,
        category: TokenCategory,
        amount: WithdrawAmount,
    ) -> Result<LiquidityChange, NodeError> {
        self.with_sdk(move |sdk| sdk.remove_liquidity(&owner_address, &category, amount))
            .await
    }

    // ── Signing and broadcast ───────────────────────────────────────────

    /// Pure transformation; runs inline.
    pub fn signing_request(
        &self,
        template: &UnsignedTxTemplate,
        user_prompt: &str,
        broadcast: bool,
    ) -> Result<SigningRequest, NodeError> {
        Ok(self.sdk.signing_request(template, user_prompt, broadcast)?)
    }

    pub async fn broadcast(
        &self,
        signed_tx_hex: String,
        category: TokenCategory,
    ) -> Result<Txid, NodeError> {
        self.with_sdk(move |sdk| sdk.broadcast(&signed_tx_hex, &category))
            .await
    }
}
