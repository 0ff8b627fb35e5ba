use serde::{Deserialize, Serialize};

use crate::address::CashAddress;
use crate::config::TxPolicy;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::template::{OperationType, TemplateBuilder, UnsignedTxTemplate};
use crate::utxo::Utxo;

use super::super::contract::PoolContract;
use super::super::math::{PoolReserves, derive_bch_amount, derive_token_amount};
use super::super::params::Pool;
use super::super::unlock::UnlockFunction;
use super::{check_owner, check_pool_contract, pool_output};

/// The side of a deposit the owner fixes; the other side follows the
/// pool ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositAmount {
    Bch(u64),
    Tokens(u64),
}

/// Parameters for an add-liquidity transaction.
pub struct AddLiquidityParams {
    /// Current pool state (spent as input 0).
    pub pool: Pool,
    /// Owner's P2PKH address; must match the pool owner.
    pub owner_address: CashAddress,
    pub amount: DepositAmount,
    pub owner_utxos: Vec<Utxo>,
    pub policy: TxPolicy,
}

/// Result of a liquidity deposit or withdrawal.
#[derive(Debug, Clone)]
pub struct LiquidityChange {
    pub template: UnsignedTxTemplate,
    /// BCH moved into (deposit) or out of (withdrawal) the pool.
    pub bch_amount: u64,
    /// Tokens moved into or out of the pool.
    pub token_amount: u64,
    /// Reserves after the operation; `None` when the pool is closed.
    pub new_reserves: Option<PoolReserves>,
}

/// Build an add-liquidity template.
///
/// The non-fixed side is derived with floor rounding so the token/BCH ratio
/// is preserved up to one raw unit.
///
/// Input 0: pool (`addLiquidity`). Inputs 1+: owner funding.
/// Output 0: pool with increased reserves. Then token change, BCH change.
pub fn build_add_liquidity(
    contract: &PoolContract,
    network: Network,
    params: &AddLiquidityParams,
) -> Result<LiquidityChange> {
    let pool = &params.pool;
    check_pool_contract(contract, pool, network)?;
    check_owner(&params.owner_address, pool.owner_pkh)?;

    let reserves = pool.reserves();
    let (bch, tokens) = match params.amount {
        DepositAmount::Bch(bch) => (bch, derive_token_amount(bch, &reserves)?),
        DepositAmount::Tokens(tokens) => (derive_bch_amount(tokens, &reserves)?, tokens),
    };
    if bch == 0 || tokens == 0 {
        return Err(Error::InvalidAmount(format!(
            "deposit of {bch} sats / {tokens} tokens is too small for the pool ratio"
        )));
    }

    let new_reserves = PoolReserves::new(
        reserves.bch.checked_add(bch).ok_or(Error::ArithmeticOverflow)?,
        reserves
            .tokens
            .checked_add(tokens)
            .ok_or(Error::ArithmeticOverflow)?,
    );

    let mut builder = TemplateBuilder::new(
        OperationType::AddLiquidity,
        pool.owner_pkh,
        pool.token_category,
        params.owner_address.clone(),
        params.policy,
        Some((pool.utxo.clone(), UnlockFunction::AddLiquidity)),
        Some(pool_output(contract, network, pool.token_category, new_reserves)),
    );
    builder.fund_from(&params.owner_utxos)?;

    Ok(LiquidityChange {
        template: builder.finish()?,
        bch_amount: bch,
        token_amount: tokens,
        new_reserves: Some(new_reserves),
    })
}
