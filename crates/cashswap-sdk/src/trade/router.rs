//! Single-pool routing: quote the request against every registered pool of
//! the token and pick the best one.
//!
//! Exact-input requests maximize what the trader receives; exact-output
//! requests minimize what the trader pays. Comparison is strict, so on a tie
//! the pool registered first wins.

use crate::amm_pool::math::{SwapResult, compute_swap};
use crate::amm_pool::params::Pool;
use crate::error::{Error, Result};

use super::types::*;

// ── Quoting ─────────────────────────────────────────────────────────────

fn effective_price(direction: SwapDirection, input: u64, output: u64) -> f64 {
    let (sats, tokens) = match direction {
        SwapDirection::BchToToken => (input, output),
        SwapDirection::TokenToBch => (output, input),
    };
    if tokens == 0 {
        return 0.0;
    }
    sats as f64 / tokens as f64
}

fn to_quote(pool: &Pool, direction: SwapDirection, swap: &SwapResult) -> RouteQuote {
    RouteQuote {
        pool_owner_pkh: pool.owner_pkh,
        input_amount: swap.input,
        output_amount: swap.output,
        effective_price: effective_price(direction, swap.input, swap.output),
        price_impact: swap.price_impact,
        pool_bch: pool.bch_reserve,
        pool_tokens: pool.token_reserve,
    }
}

/// Quote one pool for any of the four swap shapes.
pub fn quote_pool(pool: &Pool, direction: SwapDirection, amount: SwapAmount) -> Result<RouteQuote> {
    let swap = compute_swap(&pool.reserves(), direction, amount)?;
    Ok(to_quote(pool, direction, &swap))
}

/// Quote that leaves a usable pool behind, or `None` when the pool cannot
/// serve the request.
pub(crate) fn qualifying_quote(
    pool: &Pool,
    request: &SwapRequest,
    dust_limit: u64,
) -> Result<Option<RouteQuote>> {
    if pool.token_category != request.category {
        return Ok(None);
    }
    let swap = match compute_swap(&pool.reserves(), request.direction, request.amount) {
        Ok(swap) => swap,
        Err(Error::InsufficientLiquidity) => return Ok(None),
        Err(e) => return Err(e),
    };
    if swap.output == 0 || swap.new_reserves.bch < dust_limit {
        return Ok(None);
    }
    Ok(Some(to_quote(pool, request.direction, &swap)))
}

/// Whether `candidate` strictly beats `current` for this request shape.
pub(crate) fn beats(amount: SwapAmount, candidate: &RouteQuote, current: &RouteQuote) -> bool {
    match amount {
        SwapAmount::ExactInput(_) => candidate.output_amount > current.output_amount,
        SwapAmount::ExactOutput(_) => candidate.input_amount < current.input_amount,
    }
}

// ── Selection ───────────────────────────────────────────────────────────

/// Route `request` to the best pool in `pools` (registration order).
///
/// Pools that cannot fill the request are skipped: exact-output amounts at or
/// above the reserve, exact-input amounts that round to zero output, and
/// swaps that would leave the pool below `dust_limit` satoshis. When nothing
/// qualifies the result is [`Error::NoRoute`].
pub fn route_swap(pools: &[Pool], request: &SwapRequest, dust_limit: u64) -> Result<RouteSelection> {
    if request.amount.value() == 0 {
        return Err(Error::InvalidAmount("swap amount must be non-zero".into()));
    }

    let mut candidates = Vec::new();
    for pool in pools {
        if let Some(quote) = qualifying_quote(pool, request, dust_limit)? {
            candidates.push(quote);
        }
    }

    let mut best: Option<&RouteQuote> = None;
    for quote in &candidates {
        match best {
            Some(current) if !beats(request.amount, quote, current) => {}
            _ => best = Some(quote),
        }
    }
    let best = best.cloned().ok_or(Error::NoRoute)?;

    log::debug!(
        "routed {:?} {:?} to pool {} ({} of {} pools qualified)",
        request.direction,
        request.amount,
        best.pool_owner_pkh,
        candidates.len(),
        pools.len()
    );

    Ok(RouteSelection {
        request: *request,
        best,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TEST_CATEGORY, test_pool};
    use crate::units::DUST_LIMIT;
    use crate::utxo::TokenCategory;

    const BCH: u64 = 100_000_000;

    fn request(direction: SwapDirection, amount: SwapAmount) -> SwapRequest {
        SwapRequest::new(TEST_CATEGORY, direction, amount)
    }

    #[test]
    fn exact_input_picks_largest_output() {
        let pools = vec![test_pool(1, 10 * BCH, 1000), test_pool(2, 5 * BCH, 400)];
        let sel = route_swap(
            &pools,
            &request(SwapDirection::BchToToken, SwapAmount::ExactInput(BCH)),
            DUST_LIMIT,
        )
        .unwrap();
        assert_eq!(sel.pool_owner_pkh(), pools[0].owner_pkh);
        assert_eq!(sel.best.output_amount, 90);
        assert_eq!(sel.candidates[1].output_amount, 66);
    }

    #[test]
    fn exact_output_picks_smallest_input() {
        let pools = vec![test_pool(1, 5 * BCH, 400), test_pool(2, 10 * BCH, 1000)];
        let sel = route_swap(
            &pools,
            &request(SwapDirection::BchToToken, SwapAmount::ExactOutput(50)),
            DUST_LIMIT,
        )
        .unwrap();
        assert_eq!(sel.pool_owner_pkh(), pools[1].owner_pkh);
        assert!(sel.best.input_amount < sel.candidates[0].input_amount);
    }

    #[test]
    fn tie_goes_to_first_registered() {
        let pools = vec![test_pool(7, 10 * BCH, 1000), test_pool(3, 10 * BCH, 1000)];
        let sel = route_swap(
            &pools,
            &request(SwapDirection::TokenToBch, SwapAmount::ExactInput(10)),
            DUST_LIMIT,
        )
        .unwrap();
        assert_eq!(sel.pool_owner_pkh(), pools[0].owner_pkh);
    }

    #[test]
    fn exact_output_above_reserve_is_discarded_not_clamped() {
        let pools = vec![test_pool(1, 10 * BCH, 1000), test_pool(2, 10 * BCH, 100)];
        let sel = route_swap(
            &pools,
            &request(SwapDirection::BchToToken, SwapAmount::ExactOutput(500)),
            DUST_LIMIT,
        )
        .unwrap();
        assert_eq!(sel.candidates.len(), 1);
        assert_eq!(sel.best.output_amount, 500);

        let err = route_swap(
            &pools[1..],
            &request(SwapDirection::BchToToken, SwapAmount::ExactOutput(500)),
            DUST_LIMIT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoRoute));
    }

    #[test]
    fn zero_output_quotes_do_not_qualify() {
        let pools = vec![test_pool(1, 10 * BCH, 1000)];
        let err = route_swap(
            &pools,
            &request(SwapDirection::BchToToken, SwapAmount::ExactInput(1000)),
            DUST_LIMIT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoRoute));
    }

    #[test]
    fn pool_drained_below_dust_is_skipped() {
        let pools = vec![test_pool(1, 1_000, 10)];
        let err = route_swap(
            &pools,
            &request(SwapDirection::TokenToBch, SwapAmount::ExactOutput(500)),
            DUST_LIMIT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoRoute));
    }

    #[test]
    fn other_categories_ignored() {
        let mut foreign = test_pool(1, 10 * BCH, 1000);
        foreign.token_category = TokenCategory([0xee; 32]);
        let err = route_swap(
            &[foreign],
            &request(SwapDirection::BchToToken, SwapAmount::ExactInput(BCH)),
            DUST_LIMIT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::NoRoute));
    }

    #[test]
    fn zero_amount_rejected() {
        let pools = vec![test_pool(1, 10 * BCH, 1000)];
        let err = route_swap(
            &pools,
            &request(SwapDirection::BchToToken, SwapAmount::ExactInput(0)),
            DUST_LIMIT,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }

    #[test]
    fn effective_price_in_sats_per_token() {
        let q = quote_pool(
            &test_pool(1, 10 * BCH, 1000),
            SwapDirection::BchToToken,
            SwapAmount::ExactInput(BCH),
        )
        .unwrap();
        assert_eq!(q.output_amount, 90);
        assert!((q.effective_price - BCH as f64 / 90.0).abs() < 1e-6);
        assert!((q.price_impact - 100.0 / 11.0).abs() < 1e-9);
    }
}
