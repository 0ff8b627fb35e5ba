//! Unit conversion between raw on-chain integers and human-readable amounts.
//!
//! Every calculation in the crate runs on raw integers (satoshis, raw token
//! units). Decimal strings and `f64` values only appear at the presentation
//! boundary.

use crate::error::{Error, Result};

/// Satoshis per BCH.
pub const SATS_PER_BCH: u64 = 100_000_000;

/// Decimal places of BCH.
pub const BCH_DECIMALS: u8 = 8;

/// Smallest standard output value.
pub const DUST_LIMIT: u64 = 546;

/// Flat miner fee attached to every template.
pub const DEFAULT_MINER_FEE: u64 = 3_000;

/// Largest supported decimals value (10^19 overflows u64).
const MAX_DECIMALS: u8 = 18;

fn scale(decimals: u8) -> Result<u64> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidAmount(format!(
            "decimals {decimals} exceeds maximum {MAX_DECIMALS}"
        )));
    }
    Ok(10u64.pow(decimals as u32))
}

/// Parse a decimal string (`"1.25"`) into raw units.
///
/// Fractional digits beyond `decimals` are rejected rather than rounded.
pub fn parse_units(value: &str, decimals: u8) -> Result<u64> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidAmount("empty amount".into()));
    }
    let factor = scale(decimals)?;
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(Error::InvalidAmount(format!("not a number: {value}")));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidAmount(format!("not a number: {value}")));
    }
    if frac.len() > decimals as usize {
        return Err(Error::InvalidAmount(format!(
            "{value} has more than {decimals} decimal places"
        )));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| Error::InvalidAmount(format!("amount too large: {value}")))?
    };
    let frac_raw: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded
            .parse()
            .map_err(|_| Error::InvalidAmount(format!("not a number: {value}")))?
    };

    whole
        .checked_mul(factor)
        .and_then(|w| w.checked_add(frac_raw))
        .ok_or(Error::ArithmeticOverflow)
}

/// Render raw units as an exact decimal string, trimming trailing zeros.
pub fn format_units(raw: u64, decimals: u8) -> Result<String> {
    let factor = scale(decimals)?;
    let whole = raw / factor;
    let frac = raw % factor;
    if frac == 0 {
        return Ok(whole.to_string());
    }
    let frac = format!("{frac:0>width$}", width = decimals as usize);
    Ok(format!("{whole}.{}", frac.trim_end_matches('0')))
}

/// Lossy conversion for display.
pub fn to_human(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

pub fn bch_to_sats(bch: &str) -> Result<u64> {
    parse_units(bch, BCH_DECIMALS)
}

pub fn sats_to_bch(sats: u64) -> f64 {
    to_human(sats, BCH_DECIMALS)
}
