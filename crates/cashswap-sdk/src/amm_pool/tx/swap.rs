use crate::address::CashAddress;
use crate::config::TxPolicy;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::template::{OperationType, TemplateBuilder, TxOutput, UnsignedTxTemplate};
use crate::utxo::Utxo;

use super::super::contract::PoolContract;
use super::super::math::{PoolReserves, SwapAmount, SwapDirection, compute_swap};
use super::super::params::Pool;
use super::super::unlock::UnlockFunction;
use super::{check_pool_contract, pool_output};

/// Parameters for a pool swap transaction.
pub struct SwapParams {
    /// Current pool state (spent as input 0).
    pub pool: Pool,
    pub direction: SwapDirection,
    pub amount: SwapAmount,
    /// Minimum received for exact-input swaps, maximum sent for exact-output.
    pub limit: u64,
    /// Trader's P2PKH address: pays, receives, and gets change.
    pub user_address: CashAddress,
    /// Trader's spendable UTXOs.
    pub user_utxos: Vec<Utxo>,
    pub policy: TxPolicy,
}

/// A swap template plus the amounts it commits to.
#[derive(Debug, Clone)]
pub struct SwapOutcome {
    pub template: UnsignedTxTemplate,
    pub input_amount: u64,
    pub output_amount: u64,
    pub new_reserves: PoolReserves,
    pub price_impact: f64,
}

/// Build a swap template.
///
/// Amounts are recomputed with the same formulas the router quotes with and
/// checked against `limit`, so a stale quote fails here rather than on chain.
///
/// Input 0: pool (`swapExactInput` / `swapExactOutput`). Inputs 1+: trader.
/// Output 0: pool with updated reserves. Output 1: what the trader receives
/// (tokens to the token-aware address with `dust_limit` sats, or BCH to the
/// plain address). Then token change, BCH change.
pub fn build_swap(
    contract: &PoolContract,
    network: Network,
    params: &SwapParams,
) -> Result<SwapOutcome> {
    let pool = &params.pool;
    check_pool_contract(contract, pool, network)?;
    params.user_address.pubkey_hash()?;

    let swap = compute_swap(&pool.reserves(), params.direction, params.amount)?;
    let (unlock, quoted_ok, quoted) = match params.amount {
        SwapAmount::ExactInput(_) => (
            UnlockFunction::SwapExactInput,
            swap.output >= params.limit,
            swap.output,
        ),
        SwapAmount::ExactOutput(_) => (
            UnlockFunction::SwapExactOutput,
            swap.input <= params.limit,
            swap.input,
        ),
    };
    if !quoted_ok {
        return Err(Error::SlippageExceeded {
            quoted,
            limit: params.limit,
        });
    }

    let dust = params.policy.dust_limit;
    if swap.new_reserves.bch < dust {
        return Err(Error::InsufficientLiquidity);
    }
    let receive = match params.direction {
        SwapDirection::BchToToken => TxOutput::token(
            params.user_address.to_token_aware(),
            dust,
            pool.token_category,
            swap.output,
        ),
        SwapDirection::TokenToBch => {
            if swap.output < dust {
                return Err(Error::InvalidAmount(format!(
                    "swap yields {} sats, below the dust limit",
                    swap.output
                )));
            }
            TxOutput::bch(params.user_address.to_plain(), swap.output)
        }
    };

    let mut builder = TemplateBuilder::new(
        OperationType::Swap,
        pool.owner_pkh,
        pool.token_category,
        params.user_address.clone(),
        params.policy,
        Some((pool.utxo.clone(), unlock)),
        Some(pool_output(contract, network, pool.token_category, swap.new_reserves)),
    );
    builder.add_output(receive);
    builder.fund_from(&params.user_utxos)?;
    let template = builder.finish()?;

    log::info!(
        "built {:?} swap on pool {}: in {} out {}",
        params.direction,
        pool.owner_pkh,
        swap.input,
        swap.output
    );

    Ok(SwapOutcome {
        template,
        input_amount: swap.input,
        output_amount: swap.output,
        new_reserves: swap.new_reserves,
        price_impact: swap.price_impact,
    })
}
