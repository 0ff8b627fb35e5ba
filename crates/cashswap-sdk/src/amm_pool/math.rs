use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fee-adjusted numerator: 0.3% stays in the pool.
const FEE_NUMERATOR: u128 = 997;
const FEE_DENOMINATOR: u128 = 1000;

/// Basis point denominator.
pub const BPS_DENOM: u64 = 10_000;

/// Which way value flows through the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Trader sends BCH, receives tokens.
    BchToToken,
    /// Trader sends tokens, receives BCH.
    TokenToBch,
}

/// Which side of the swap the trader fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapAmount {
    /// Spend exactly this much of the input asset.
    ExactInput(u64),
    /// Receive exactly this much of the output asset.
    ExactOutput(u64),
}

impl SwapAmount {
    pub fn value(self) -> u64 {
        match self {
            SwapAmount::ExactInput(v) | SwapAmount::ExactOutput(v) => v,
        }
    }
}

/// Current pool reserves in raw units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    /// Satoshis held by the pool UTXO.
    pub bch: u64,
    /// Raw fungible token units held by the pool UTXO.
    pub tokens: u64,
}

impl PoolReserves {
    pub fn new(bch: u64, tokens: u64) -> Self {
        Self { bch, tokens }
    }

    /// Constant-product invariant.
    pub fn k(&self) -> u128 {
        self.bch as u128 * self.tokens as u128
    }

    /// `(input_reserve, output_reserve)` for a swap direction.
    pub fn sides(&self, direction: SwapDirection) -> (u64, u64) {
        match direction {
            SwapDirection::BchToToken => (self.bch, self.tokens),
            SwapDirection::TokenToBch => (self.tokens, self.bch),
        }
    }
}

/// Result of a swap calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapResult {
    /// Amount the trader puts in.
    pub input: u64,
    /// Amount the trader receives.
    pub output: u64,
    /// Reserves after the swap.
    pub new_reserves: PoolReserves,
    /// Depth-based price impact in percent.
    pub price_impact: f64,
}

/// Rounding direction for [`apply_slippage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlippageKind {
    /// Lower bound on what the trader receives.
    MinimumReceived,
    /// Upper bound on what the trader pays.
    MaximumSent,
}

fn to_u64(v: u128) -> Result<u64> {
    u64::try_from(v).map_err(|_| Error::ArithmeticOverflow)
}

/// Sum of raw amounts; overflow is an error rather than a wrap.
pub fn checked_sum(values: impl IntoIterator<Item = u64>) -> Result<u64> {
    values
        .into_iter()
        .try_fold(0u64, |acc, v| acc.checked_add(v).ok_or(Error::ArithmeticOverflow))
}

/// Output received for an exact `input`, fee included.
///
/// `floor(input * 997 * output_reserve / (input_reserve * 1000 + input * 997))`
pub fn quote_input_price(input: u64, input_reserve: u64, output_reserve: u64) -> Result<u64> {
    if input_reserve == 0 || output_reserve == 0 {
        return Err(Error::InsufficientLiquidity);
    }
    let input_with_fee = (input as u128) * FEE_NUMERATOR;
    let numerator = input_with_fee
        .checked_mul(output_reserve as u128)
        .ok_or(Error::ArithmeticOverflow)?;
    let denominator = (input_reserve as u128) * FEE_DENOMINATOR + input_with_fee;
    to_u64(numerator / denominator)
}

/// Input required to receive exactly `output`, fee included.
///
/// `floor(input_reserve * output * 1000 / ((output_reserve - output) * 997)) + 1`
pub fn quote_output_price(output: u64, input_reserve: u64, output_reserve: u64) -> Result<u64> {
    if input_reserve == 0 || output_reserve == 0 || output >= output_reserve {
        return Err(Error::InsufficientLiquidity);
    }
    let numerator = (input_reserve as u128)
        .checked_mul(output as u128)
        .and_then(|v| v.checked_mul(FEE_DENOMINATOR))
        .ok_or(Error::ArithmeticOverflow)?;
    let denominator = ((output_reserve - output) as u128) * FEE_NUMERATOR;
    to_u64(numerator / denominator + 1)
}

/// Share of the input-side reserve the trade represents, in percent.
///
/// Measures pool depth relative to trade size, not the gap between the
/// effective and spot price.
pub fn price_impact(input: u64, input_reserve: u64) -> f64 {
    let total = input as f64 + input_reserve as f64;
    if total == 0.0 {
        return 0.0;
    }
    input as f64 / total * 100.0
}

/// Apply a slippage tolerance in basis points. Both bounds round down.
///
/// Tolerances above 100% are rejected for either bound.
pub fn apply_slippage(amount: u64, tolerance_bps: u64, kind: SlippageKind) -> Result<u64> {
    if tolerance_bps > BPS_DENOM {
        return Err(Error::InvalidAmount(format!(
            "slippage tolerance of {tolerance_bps} bps is above 100%"
        )));
    }
    let factor = match kind {
        SlippageKind::MinimumReceived => BPS_DENOM - tolerance_bps,
        SlippageKind::MaximumSent => BPS_DENOM + tolerance_bps,
    };
    to_u64((amount as u128) * (factor as u128) / (BPS_DENOM as u128))
}

/// Swap with a fixed input amount.
pub fn compute_swap_exact_input(
    reserves: &PoolReserves,
    direction: SwapDirection,
    input: u64,
) -> Result<SwapResult> {
    if input == 0 {
        return Err(Error::InvalidAmount("swap input must be non-zero".into()));
    }
    let (r_in, r_out) = reserves.sides(direction);
    let output = quote_input_price(input, r_in, r_out)?;
    if output == 0 {
        return Err(Error::InsufficientLiquidity);
    }
    finish_swap(reserves, direction, input, output)
}

/// Swap with a fixed output amount.
pub fn compute_swap_exact_output(
    reserves: &PoolReserves,
    direction: SwapDirection,
    output: u64,
) -> Result<SwapResult> {
    if output == 0 {
        return Err(Error::InvalidAmount("swap output must be non-zero".into()));
    }
    let (r_in, r_out) = reserves.sides(direction);
    let input = quote_output_price(output, r_in, r_out)?;
    finish_swap(reserves, direction, input, output)
}

fn finish_swap(
    reserves: &PoolReserves,
    direction: SwapDirection,
    input: u64,
    output: u64,
) -> Result<SwapResult> {
    let (r_in, r_out) = reserves.sides(direction);
    let new_in = r_in.checked_add(input).ok_or(Error::ArithmeticOverflow)?;
    let new_out = r_out
        .checked_sub(output)
        .ok_or(Error::InsufficientLiquidity)?;
    let new_reserves = match direction {
        SwapDirection::BchToToken => PoolReserves::new(new_in, new_out),
        SwapDirection::TokenToBch => PoolReserves::new(new_out, new_in),
    };
    Ok(SwapResult {
        input,
        output,
        new_reserves,
        price_impact: price_impact(input, r_in),
    })
}

/// Dispatch on the fixed side of the swap.
pub fn compute_swap(
    reserves: &PoolReserves,
    direction: SwapDirection,
    amount: SwapAmount,
) -> Result<SwapResult> {
    match amount {
        SwapAmount::ExactInput(v) => compute_swap_exact_input(reserves, direction, v),
        SwapAmount::ExactOutput(v) => compute_swap_exact_output(reserves, direction, v),
    }
}

/// Spot price in satoshis per raw token unit.
pub fn spot_price(reserves: &PoolReserves) -> f64 {
    if reserves.tokens == 0 {
        return 0.0;
    }
    reserves.bch as f64 / reserves.tokens as f64
}

/// Aggregate reserves across pools; their ratio is the reserve-weighted
/// market price. `None` when there is no liquidity.
pub fn market_reserves<'a>(
    pools: impl IntoIterator<Item = &'a PoolReserves>,
) -> Result<Option<PoolReserves>> {
    let mut total = PoolReserves::new(0, 0);
    for r in pools {
        total.bch = total.bch.checked_add(r.bch).ok_or(Error::ArithmeticOverflow)?;
        total.tokens = total
            .tokens
            .checked_add(r.tokens)
            .ok_or(Error::ArithmeticOverflow)?;
    }
    if total.bch == 0 || total.tokens == 0 {
        return Ok(None);
    }
    Ok(Some(total))
}

/// Tokens matching `bch` at the reserve ratio, rounded down.
pub fn derive_token_amount(bch: u64, ratio: &PoolReserves) -> Result<u64> {
    if ratio.bch == 0 {
        return Err(Error::InsufficientLiquidity);
    }
    to_u64((bch as u128) * (ratio.tokens as u128) / (ratio.bch as u128))
}

/// Satoshis matching `tokens` at the reserve ratio, rounded down.
pub fn derive_bch_amount(tokens: u64, ratio: &PoolReserves) -> Result<u64> {
    if ratio.tokens == 0 {
        return Err(Error::InsufficientLiquidity);
    }
    to_u64((tokens as u128) * (ratio.bch as u128) / (ratio.tokens as u128))
}

/// Relative distance between the `proposed` and `market` prices, in bps.
///
/// Prices are compared by cross-multiplication; no division happens before
/// the final scale.
pub fn price_deviation_bps(proposed: &PoolReserves, market: &PoolReserves) -> Result<u64> {
    if proposed.tokens == 0 || market.tokens == 0 || market.bch == 0 {
        return Err(Error::InvalidAmount("price undefined for zero reserves".into()));
    }
    let lhs = (proposed.bch as u128)
        .checked_mul(market.tokens as u128)
        .ok_or(Error::ArithmeticOverflow)?;
    let rhs = (market.bch as u128)
        .checked_mul(proposed.tokens as u128)
        .ok_or(Error::ArithmeticOverflow)?;
    let diff = lhs.abs_diff(rhs);
    let scaled = diff
        .checked_mul(BPS_DENOM as u128)
        .ok_or(Error::ArithmeticOverflow)?;
    Ok(to_u64(scaled / rhs).unwrap_or(u64::MAX))
}

/// Fail with `PriceDeviationTooHigh` when `proposed` strays from `market`
/// by more than `tolerance_bps`.
pub fn check_price_deviation(
    proposed: &PoolReserves,
    market: &PoolReserves,
    tolerance_bps: u64,
) -> Result<()> {
    let deviation_bps = price_deviation_bps(proposed, market)?;
    if deviation_bps > tolerance_bps {
        return Err(Error::PriceDeviationTooHigh {
            deviation_bps,
            tolerance_bps,
        });
    }
    Ok(())
}

/// Amounts withdrawn when taking `bch` satoshis out of the pool; the token
/// side follows proportionally (rounded down).
pub fn compute_withdrawal(reserves: &PoolReserves, bch: u64) -> Result<PoolReserves> {
    if bch == 0 {
        return Err(Error::InvalidAmount("withdrawal must be non-zero".into()));
    }
    if bch > reserves.bch {
        return Err(Error::InsufficientLiquidity);
    }
    Ok(PoolReserves::new(bch, derive_token_amount(bch, reserves)?))
}

/// Amounts withdrawn when taking `percent` of the pool: each reserve is
/// scaled independently, `floor(reserve * percent / 100)`.
pub fn compute_percentage_withdrawal(
    reserves: &PoolReserves,
    percent: u8,
) -> Result<PoolReserves> {
    let withdrawal = PoolReserves::new(
        percentage_of(reserves.bch, percent)?,
        percentage_of(reserves.tokens, percent)?,
    );
    if withdrawal.bch == 0 {
        return Err(Error::InvalidAmount(format!(
            "{percent}% of {} sats rounds to nothing",
            reserves.bch
        )));
    }
    Ok(withdrawal)
}

/// `percent` (1..=100) of `reserve`, rounded down.
pub fn percentage_of(reserve: u64, percent: u8) -> Result<u64> {
    if percent == 0 || percent > 100 {
        return Err(Error::InvalidAmount(format!(
            "percentage must be within 1..=100, got {percent}"
        )));
    }
    to_u64((reserve as u128) * (percent as u128) / 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BCH: u64 = 100_000_000;

    #[test]
    fn exact_input_reference_values() {
        // 1 BCH into 10 BCH / 1000 TOK
        assert_eq!(quote_input_price(BCH, 10 * BCH, 1000).unwrap(), 90);
        // 1 BCH into 5 BCH / 400 TOK
        assert_eq!(quote_input_price(BCH, 5 * BCH, 400).unwrap(), 66);
        assert_eq!(quote_input_price(0, 10, 10).unwrap(), 0);
    }

    #[test]
    fn exact_output_reference_values() {
        // 1000 * 10 * 1000 / (990 * 997) = 10.13... -> 10 + 1
        assert_eq!(quote_output_price(10, 1000, 1000).unwrap(), 11);
        assert_eq!(quote_output_price(90, 10 * BCH, 1000).unwrap(), 99_198_695);
    }

    #[test]
    fn output_at_or_above_reserve_fails() {
        assert!(matches!(
            quote_output_price(1000, 1000, 1000),
            Err(Error::InsufficientLiquidity)
        ));
        assert!(matches!(
            quote_output_price(1001, 1000, 1000),
            Err(Error::InsufficientLiquidity)
        ));
    }

    #[test]
    fn zero_reserves_fail() {
        assert!(matches!(
            quote_input_price(1, 0, 10),
            Err(Error::InsufficientLiquidity)
        ));
        assert!(matches!(
            quote_output_price(1, 10, 0),
            Err(Error::InsufficientLiquidity)
        ));
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(matches!(
            quote_output_price(u64::MAX - 1, u64::MAX, u64::MAX),
            Err(Error::ArithmeticOverflow)
        ));
    }

    #[test]
    fn checked_sum_reports_overflow() {
        assert_eq!(checked_sum([1, 2, 3]).unwrap(), 6);
        assert_eq!(checked_sum([]).unwrap(), 0);
        assert!(matches!(
            checked_sum([u64::MAX / 2, u64::MAX / 2, u64::MAX / 2]),
            Err(Error::ArithmeticOverflow)
        ));
    }

    #[test]
    fn price_impact_percent() {
        assert!((price_impact(BCH, 9 * BCH) - 10.0).abs() < 1e-9);
        assert_eq!(price_impact(0, 0), 0.0);
    }

    #[test]
    fn slippage_bounds() {
        assert_eq!(
            apply_slippage(1000, 50, SlippageKind::MinimumReceived).unwrap(),
            995
        );
        assert_eq!(apply_slippage(1000, 50, SlippageKind::MaximumSent).unwrap(), 1005);
        // floor on both sides
        assert_eq!(apply_slippage(999, 50, SlippageKind::MinimumReceived).unwrap(), 994);
        assert_eq!(apply_slippage(999, 50, SlippageKind::MaximumSent).unwrap(), 1003);
        assert!(apply_slippage(1, 10_001, SlippageKind::MinimumReceived).is_err());
        assert_eq!(apply_slippage(1000, BPS_DENOM, SlippageKind::MaximumSent).unwrap(), 2000);
    }

    #[test]
    fn oversized_slippage_is_an_error() {
        for kind in [SlippageKind::MinimumReceived, SlippageKind::MaximumSent] {
            assert!(matches!(
                apply_slippage(1000, u64::MAX, kind),
                Err(Error::InvalidAmount(_))
            ));
            assert!(matches!(
                apply_slippage(1000, BPS_DENOM + 1, kind),
                Err(Error::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn swap_exact_input_updates_reserves() {
        let reserves = PoolReserves::new(10 * BCH, 1000);
        let r = compute_swap_exact_input(&reserves, SwapDirection::BchToToken, BCH).unwrap();
        assert_eq!(r.output, 90);
        assert_eq!(r.new_reserves, PoolReserves::new(11 * BCH, 910));
        assert!(r.new_reserves.k() >= reserves.k());

        let r = compute_swap_exact_input(&reserves, SwapDirection::TokenToBch, 100).unwrap();
        assert_eq!(r.new_reserves.tokens, 1100);
        assert_eq!(r.new_reserves.bch, 10 * BCH - r.output);
        assert!(r.new_reserves.k() >= reserves.k());
    }

    #[test]
    fn swap_exact_input_zero_output_fails() {
        let reserves = PoolReserves::new(10 * BCH, 1000);
        assert!(matches!(
            compute_swap_exact_input(&reserves, SwapDirection::BchToToken, 1),
            Err(Error::InsufficientLiquidity)
        ));
        assert!(matches!(
            compute_swap_exact_input(&reserves, SwapDirection::BchToToken, 0),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn swap_exact_output_updates_reserves() {
        let reserves = PoolReserves::new(10 * BCH, 1000);
        let r = compute_swap_exact_output(&reserves, SwapDirection::TokenToBch, BCH).unwrap();
        assert_eq!(r.output, BCH);
        assert_eq!(r.new_reserves.bch, 9 * BCH);
        assert!(r.new_reserves.k() >= reserves.k());
    }

    #[test]
    fn market_reserves_aggregate() {
        let pools = [PoolReserves::new(100, 10), PoolReserves::new(300, 20)];
        assert_eq!(
            market_reserves(&pools).unwrap(),
            Some(PoolReserves::new(400, 30))
        );
        assert_eq!(market_reserves(&[]).unwrap(), None);
    }

    #[test]
    fn derived_amounts_round_down() {
        let ratio = PoolReserves::new(3 * BCH, 1000);
        assert_eq!(derive_token_amount(BCH, &ratio).unwrap(), 333);
        assert_eq!(derive_bch_amount(1, &ratio).unwrap(), 300_000);
        assert!(derive_token_amount(1, &PoolReserves::new(0, 1)).is_err());
    }

    #[test]
    fn deviation_in_bps() {
        let market = PoolReserves::new(BCH, 100);
        assert_eq!(
            price_deviation_bps(&PoolReserves::new(105_000_000, 100), &market).unwrap(),
            500
        );
        assert_eq!(
            price_deviation_bps(&PoolReserves::new(99_000_000, 100), &market).unwrap(),
            100
        );
        assert!(check_price_deviation(&PoolReserves::new(99_000_000, 100), &market, 100).is_ok());
        assert!(matches!(
            check_price_deviation(&PoolReserves::new(105_000_000, 100), &market, 100),
            Err(Error::PriceDeviationTooHigh {
                deviation_bps: 500,
                tolerance_bps: 100
            })
        ));
    }

    #[test]
    fn withdrawal_is_proportional() {
        let reserves = PoolReserves::new(2 * BCH, 500);
        assert_eq!(
            compute_withdrawal(&reserves, BCH).unwrap(),
            PoolReserves::new(BCH, 250)
        );
        assert!(compute_withdrawal(&reserves, 3 * BCH).is_err());
        assert_eq!(percentage_of(500, 25).unwrap(), 125);
        assert!(percentage_of(500, 0).is_err());
        assert!(percentage_of(500, 101).is_err());
    }

    #[test]
    fn percentage_withdrawal_scales_each_reserve() {
        let reserves = PoolReserves::new(199_999_999, 1000);
        assert_eq!(
            compute_percentage_withdrawal(&reserves, 33).unwrap(),
            PoolReserves::new(65_999_999, 330)
        );
        assert!(compute_percentage_withdrawal(&PoolReserves::new(50, 10), 1).is_err());
    }

    #[test]
    fn spot_price_sats_per_token() {
        assert_eq!(spot_price(&PoolReserves::new(BCH, 100)), 1_000_000.0);
        assert_eq!(spot_price(&PoolReserves::new(BCH, 0)), 0.0);
    }
}
