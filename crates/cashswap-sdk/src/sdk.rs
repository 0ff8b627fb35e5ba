//! Blocking facade over discovery, routing, and the
//! transaction builders.
//!
//! Every builder call re-reads the pools it touches from the chain (bypassing
//! the discovery cache) and funds the template from the caller's UTXOs as
//! reported by the provider. Nothing is signed here: templates go out through
//! [`CashSwapSdk::signing_request`] and come back signed to
//! [`CashSwapSdk::broadcast`].

use std::sync::Arc;

use serde::Serialize;

use crate::address::CashAddress;
use crate::amm_pool::contract::PoolContract;
use crate::amm_pool::math::{PoolReserves, SlippageKind, apply_slippage, market_reserves};
use crate::amm_pool::params::{OwnerPkh, Pool, PoolSummary};
use crate::amm_pool::tx::add_liquidity::{
    AddLiquidityParams, DepositAmount, LiquidityChange, build_add_liquidity,
};
use crate::amm_pool::tx::creation::{PoolCreation, PoolCreationParams, build_pool_creation};
use crate::amm_pool::tx::remove_liquidity::{
    RemoveLiquidityParams, WithdrawAmount, build_remove_liquidity,
};
use crate::amm_pool::tx::swap::{SwapOutcome, SwapParams, build_swap};
use crate::chain::{ElectrumProvider, UtxoProvider};
use crate::config::{ContractTemplate, SdkConfig};
use crate::discovery::{
    PoolDiscovery, PoolRegistry, TokenInfo, TokenMetadataProvider, TtlCache,
};
use crate::error::{Asset, Error, Result};
use crate::network::Network;
use crate::signing::{SigningRequest, build_signing_request};
use crate::template::UnsignedTxTemplate;
use crate::trade::{
    RouteSelection, SplitAnalysis, SwapAmount, SwapDirection, SwapRequest, analyze_split,
    route_swap,
};
use crate::units::{self, BCH_DECIMALS, SATS_PER_BCH};
use crate::utxo::{TokenCategory, Txid};

// ── Result types ────────────────────────────────────────────────────────

/// A routed swap quote with display amounts.
///
/// Raw amounts live in `route`; the string fields are exact decimal
/// renderings using the token's decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapQuote {
    pub route: RouteSelection,
    pub input_asset: Asset,
    pub output_asset: Asset,
    pub input: String,
    pub output: String,
    /// Minimum received (exact-input) or maximum sent (exact-output), raw.
    pub limit: u64,
    pub limit_display: String,
    pub slippage_bps: u64,
    pub price_bch_per_token: f64,
    pub price_impact: f64,
}

impl SwapQuote {
    pub fn pool_owner_pkh(&self) -> OwnerPkh {
        self.route.best.pool_owner_pkh
    }
}

// ── Struct ──────────────────────────────────────────────────────────────

pub struct CashSwapSdk {
    config: SdkConfig,
    template: ContractTemplate,
    provider: Arc<dyn UtxoProvider>,
    discovery: PoolDiscovery,
    tokens: TokenInfo,
}

impl CashSwapSdk {
    /// Build an SDK over explicit collaborators. The config is validated.
    pub fn new(
        config: SdkConfig,
        provider: Arc<dyn UtxoProvider>,
        registry: Arc<dyn PoolRegistry>,
        metadata: Arc<dyn TokenMetadataProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let template = config.contract_template()?;
        let discovery = PoolDiscovery::new(
            provider.clone(),
            registry,
            template.clone(),
            config.network,
            Arc::new(TtlCache::new(config.pool_cache_ttl())),
        );
        let tokens = TokenInfo::new(
            metadata,
            Arc::new(TtlCache::new(config.metadata_cache_ttl())),
        );
        Ok(Self {
            config,
            template,
            provider,
            discovery,
            tokens,
        })
    }

    /// Build an SDK talking to the configured Electrum servers.
    pub fn connect(
        config: SdkConfig,
        registry: Arc<dyn PoolRegistry>,
        metadata: Arc<dyn TokenMetadataProvider>,
    ) -> Result<Self> {
        let provider = ElectrumProvider::new(config.electrum_urls(), config.electrum_timeout_secs)?;
        Self::new(config, Arc::new(provider), registry, metadata)
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn discovery(&self) -> &PoolDiscovery {
        &self.discovery
    }

    pub fn token_info(&self) -> &TokenInfo {
        &self.tokens
    }

    pub fn contract_for(&self, owner: OwnerPkh) -> PoolContract {
        PoolContract::new(owner, &self.template)
    }

    fn check_network(&self, address: &CashAddress) -> Result<()> {
        if address.network() != self.config.network {
            return Err(Error::InvalidAddress(format!(
                "{address} is not a {} address",
                self.config.network
            )));
        }
        Ok(())
    }

    // ── Pools ───────────────────────────────────────────────────────────

    /// Pools trading `category`, in registration order (cached).
    pub fn pools(&self, category: &TokenCategory) -> Result<Vec<Pool>> {
        self.discovery.find_pools(category)
    }

    pub fn pool_summaries(&self, category: &TokenCategory) -> Result<Vec<PoolSummary>> {
        let decimals = self.tokens.decimals(category)?;
        Ok(self
            .pools(category)?
            .iter()
            .map(|p| p.summary(decimals))
            .collect())
    }

    /// Aggregate reserves across every pool of `category`; their ratio is
    /// the reserve-weighted market price.
    pub fn market_reserves(&self, category: &TokenCategory) -> Result<Option<PoolReserves>> {
        let reserves: Vec<PoolReserves> = self.pools(category)?.iter().map(Pool::reserves).collect();
        market_reserves(&reserves)
    }

    // ── Routing ─────────────────────────────────────────────────────────

    pub fn route(&self, request: &SwapRequest) -> Result<RouteSelection> {
        let pools = self.pools(&request.category)?;
        route_swap(&pools, request, self.config.dust_limit)
    }

    /// Parse a decimal string into raw units of the asset a swap amount
    /// refers to.
    pub fn parse_amount(&self, category: &TokenCategory, asset: Asset, value: &str) -> Result<u64> {
        match asset {
            Asset::Bch => units::bch_to_sats(value),
            Asset::Token => units::parse_units(value, self.tokens.decimals(category)?),
        }
    }

    /// Route `request` and render the best quote for display, with the
    /// slippage bound that [`Self::build_swap`] will enforce.
    pub fn quote_swap(&self, request: &SwapRequest, slippage_bps: u64) -> Result<SwapQuote> {
        let decimals = self.tokens.decimals(&request.category)?;
        let route = self.route(request)?;
        let (input_asset, output_asset) = assets(request.direction);

        let limit = match request.amount {
            SwapAmount::ExactInput(_) => apply_slippage(
                route.best.output_amount,
                slippage_bps,
                SlippageKind::MinimumReceived,
            )?,
            SwapAmount::ExactOutput(_) => apply_slippage(
                route.best.input_amount,
                slippage_bps,
                SlippageKind::MaximumSent,
            )?,
        };
        let limit_asset = match request.amount {
            SwapAmount::ExactInput(_) => output_asset,
            SwapAmount::ExactOutput(_) => input_asset,
        };

        let render = |asset: Asset, raw: u64| match asset {
            Asset::Bch => units::format_units(raw, BCH_DECIMALS),
            Asset::Token => units::format_units(raw, decimals),
        };

        Ok(SwapQuote {
            input: render(input_asset, route.best.input_amount)?,
            output: render(output_asset, route.best.output_amount)?,
            limit_display: render(limit_asset, limit)?,
            limit,
            slippage_bps,
            price_bch_per_token: route.best.effective_price * 10f64.powi(decimals as i32)
                / SATS_PER_BCH as f64,
            price_impact: route.best.price_impact,
            input_asset,
            output_asset,
            route,
        })
    }

    /// Split-route what-if across the `top_n` best pools.
    pub fn split_route_analysis(&self, request: &SwapRequest, top_n: usize) -> Result<SplitAnalysis> {
        let pools = self.pools(&request.category)?;
        analyze_split(&pools, request, self.config.dust_limit, top_n)
    }

    // ── Builders ────────────────────────────────────────────────────────

    /// Build the swap a quote describes against the pool's current state.
    ///
    /// Fails with `SlippageExceeded` when the pool has moved past the quote's
    /// bound since it was produced.
    pub fn build_swap(&self, quote: &SwapQuote, user_address: &CashAddress) -> Result<SwapOutcome> {
        self.check_network(user_address)?;
        let request = &quote.route.request;
        let owner = quote.pool_owner_pkh();
        let pool = self.discovery.pool_for_owner(owner, &request.category)?;
        let params = SwapParams {
            pool,
            direction: request.direction,
            amount: request.amount,
            limit: quote.limit,
            user_address: user_address.to_plain(),
            user_utxos: self.provider.get_utxos(user_address)?,
            policy: self.config.tx_policy(),
        };
        build_swap(&self.contract_for(owner), self.config.network, &params)
    }

    /// Create a pool for `owner_address`. With live pools for the token,
    /// a missing side is derived from the market price and a fully given
    /// proposal must sit within the configured deviation tolerance.
    pub fn create_pool(
        &self,
        owner_address: &CashAddress,
        category: &TokenCategory,
        bch_amount: Option<u64>,
        token_amount: Option<u64>,
    ) -> Result<PoolCreation> {
        self.check_network(owner_address)?;
        let owner = OwnerPkh::try_from(owner_address)?;
        match self.discovery.pool_for_owner(owner, category) {
            Ok(existing) => {
                return Err(Error::PoolAlreadyExists(
                    existing.contract_address.to_string(),
                ));
            }
            Err(Error::PoolNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let pools = self.discovery.find_pools_fresh(category)?;
        let reserves: Vec<PoolReserves> = pools.iter().map(Pool::reserves).collect();
        let params = PoolCreationParams {
            owner_address: owner_address.to_plain(),
            token_category: *category,
            bch_amount,
            token_amount,
            market: market_reserves(&reserves)?,
            price_deviation_tolerance_bps: self.config.price_deviation_tolerance_bps,
            owner_utxos: self.provider.get_utxos(owner_address)?,
            policy: self.config.tx_policy(),
        };
        build_pool_creation(&self.contract_for(owner), self.config.network, &params)
    }

    pub fn add_liquidity(
        &self,
        owner_address: &CashAddress,
        category: &TokenCategory,
        amount: DepositAmount,
    ) -> Result<LiquidityChange> {
        self.check_network(owner_address)?;
        let owner = OwnerPkh::try_from(owner_address)?;
        let params = AddLiquidityParams {
            pool: self.discovery.pool_for_owner(owner, category)?,
            owner_address: owner_address.to_plain(),
            amount,
            owner_utxos: self.provider.get_utxos(owner_address)?,
            policy: self.config.tx_policy(),
        };
        build_add_liquidity(&self.contract_for(owner), self.config.network, &params)
    }

    pub fn remove_liquidity(
        &self,
        owner_address: &CashAddress,
        category: &TokenCategory,
        amount: WithdrawAmount,
    ) -> Result<LiquidityChange> {
        self.check_network(owner_address)?;
        let owner = OwnerPkh::try_from(owner_address)?;
        let params = RemoveLiquidityParams {
            pool: self.discovery.pool_for_owner(owner, category)?,
            owner_address: owner_address.to_plain(),
            amount,
            owner_utxos: self.provider.get_utxos(owner_address)?,
            policy: self.config.tx_policy(),
        };
        build_remove_liquidity(&self.contract_for(owner), self.config.network, &params)
    }

    // ── Signing and broadcast ───────────────────────────────────────────

    pub fn signing_request(
        &self,
        template: &UnsignedTxTemplate,
        user_prompt: &str,
        broadcast: bool,
    ) -> Result<SigningRequest> {
        build_signing_request(template, &self.template, user_prompt, broadcast)
    }

    /// Broadcast a wallet-signed transaction that touches pools of
    /// `category`. The pool cache for the category is dropped whether the
    /// broadcast lands or loses a race for its inputs.
    pub fn broadcast(&self, signed_tx_hex: &str, category: &TokenCategory) -> Result<Txid> {
        let result = self.provider.broadcast(signed_tx_hex);
        match &result {
            Ok(txid) => {
                log::debug!("dropping pool cache for {category} after {txid}");
                self.discovery.invalidate(category);
            }
            Err(Error::UtxoSpent(msg)) => {
                log::warn!("broadcast lost an input race: {msg}");
                self.discovery.invalidate(category);
            }
            Err(_) => {}
        }
        result
    }
}

fn assets(direction: SwapDirection) -> (Asset, Asset) {
    match direction {
        SwapDirection::BchToToken => (Asset::Bch, Asset::Token),
        SwapDirection::TokenToBch => (Asset::Token, Asset::Bch),
    }
}
