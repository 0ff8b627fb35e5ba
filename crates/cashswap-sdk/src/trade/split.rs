//! What-if analysis of splitting one swap across several pools.
//!
//! The request is divided among the top-N pools in proportion to their BCH
//! reserves and each leg is priced independently. The result is compared
//! against the best single pool. Nothing here builds a transaction.

use std::cmp::Ordering;

use crate::amm_pool::math::{BPS_DENOM, checked_sum, compute_swap};
use crate::amm_pool::params::Pool;
use crate::error::{Error, Result};

use super::router::qualifying_quote;
use super::types::*;

fn rank(amount: SwapAmount, a: &RouteQuote, b: &RouteQuote) -> Ordering {
    match amount {
        SwapAmount::ExactInput(_) => b.output_amount.cmp(&a.output_amount),
        SwapAmount::ExactOutput(_) => a.input_amount.cmp(&b.input_amount),
    }
}

fn single_leg(best: &RouteQuote) -> SplitLeg {
    SplitLeg {
        pool_owner_pkh: best.pool_owner_pkh,
        weight_bps: BPS_DENOM,
        input_amount: best.input_amount,
        output_amount: best.output_amount,
    }
}

/// Share of `total` for a pool holding `bch` out of `total_bch`, rounded down.
fn share(total: u64, bch: u64, total_bch: u128) -> u64 {
    ((total as u128) * (bch as u128) / total_bch) as u64
}

/// Split `request` across the `top_n` best pools, weighted by BCH reserve.
///
/// Legs that would not qualify on their own (zero output, reserve exceeded,
/// pool left below `dust_limit`) make the split unviable; the analysis then
/// reports the single best pool with zero improvement.
pub fn analyze_split(
    pools: &[Pool],
    request: &SwapRequest,
    dust_limit: u64,
    top_n: usize,
) -> Result<SplitAnalysis> {
    if top_n == 0 {
        return Err(Error::InvalidAmount("split needs at least one pool".into()));
    }
    if request.amount.value() == 0 {
        return Err(Error::InvalidAmount("swap amount must be non-zero".into()));
    }

    let mut ranked: Vec<(&Pool, RouteQuote)> = Vec::new();
    for pool in pools {
        if let Some(quote) = qualifying_quote(pool, request, dust_limit)? {
            ranked.push((pool, quote));
        }
    }
    ranked.sort_by(|a, b| rank(request.amount, &a.1, &b.1));
    ranked.truncate(top_n);

    let best = ranked.first().map(|(_, q)| q.clone()).ok_or(Error::NoRoute)?;
    let fallback = SplitAnalysis {
        legs: vec![single_leg(&best)],
        total_input: best.input_amount,
        total_output: best.output_amount,
        improvement_percent: 0.0,
        best_single: best.clone(),
    };
    if ranked.len() == 1 {
        return Ok(fallback);
    }

    let total_bch: u128 = ranked.iter().map(|(p, _)| p.bch_reserve as u128).sum();
    let requested = request.amount.value();
    let mut shares: Vec<u64> = ranked
        .iter()
        .map(|(p, _)| share(requested, p.bch_reserve, total_bch))
        .collect();
    let assigned: u64 = shares.iter().sum();
    shares[0] += requested - assigned;

    let mut legs = Vec::with_capacity(ranked.len());
    for ((pool, _), leg_amount) in ranked.iter().zip(shares) {
        if leg_amount == 0 {
            continue;
        }
        let amount = match request.amount {
            SwapAmount::ExactInput(_) => SwapAmount::ExactInput(leg_amount),
            SwapAmount::ExactOutput(_) => SwapAmount::ExactOutput(leg_amount),
        };
        let swap = match compute_swap(&pool.reserves(), request.direction, amount) {
            Ok(swap) if swap.output > 0 && swap.new_reserves.bch >= dust_limit => swap,
            Ok(_) | Err(Error::InsufficientLiquidity) => {
                log::debug!("split leg on pool {} unviable", pool.owner_pkh);
                return Ok(fallback);
            }
            Err(e) => return Err(e),
        };
        legs.push(SplitLeg {
            pool_owner_pkh: pool.owner_pkh,
            weight_bps: share(BPS_DENOM, pool.bch_reserve, total_bch),
            input_amount: swap.input,
            output_amount: swap.output,
        });
    }

    let total_input = checked_sum(legs.iter().map(|l| l.input_amount))?;
    let total_output = checked_sum(legs.iter().map(|l| l.output_amount))?;
    let improvement_percent = match request.amount {
        SwapAmount::ExactInput(_) => {
            (total_output as f64 - best.output_amount as f64) / best.output_amount as f64 * 100.0
        }
        SwapAmount::ExactOutput(_) => {
            (best.input_amount as f64 - total_input as f64) / best.input_amount as f64 * 100.0
        }
    };

    Ok(SplitAnalysis {
        best_single: best,
        legs,
        total_input,
        total_output,
        improvement_percent,
    })
}
