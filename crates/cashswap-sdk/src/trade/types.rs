use serde::{Deserialize, Serialize};

use crate::amm_pool::params::OwnerPkh;
use crate::utxo::TokenCategory;

pub use crate::amm_pool::math::{SwapAmount, SwapDirection};

// ── Request types ───────────────────────────────────────────────────────

/// A swap to route across the registered pools of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub category: TokenCategory,
    pub direction: SwapDirection,
    pub amount: SwapAmount,
}

impl SwapRequest {
    pub fn new(category: TokenCategory, direction: SwapDirection, amount: SwapAmount) -> Self {
        Self {
            category,
            direction,
            amount,
        }
    }
}

// ── Quote types ─────────────────────────────────────────────────────────

/// Quote of a swap against a single pool, in raw units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteQuote {
    pub pool_owner_pkh: OwnerPkh,
    /// Amount the trader sends (sats for BCH→token, raw tokens otherwise).
    pub input_amount: u64,
    /// Amount the trader receives.
    pub output_amount: u64,
    /// Satoshis per raw token unit actually paid or received.
    pub effective_price: f64,
    /// Depth-based price impact in percent.
    pub price_impact: f64,
    /// Pool reserves the quote was computed against.
    pub pool_bch: u64,
    pub pool_tokens: u64,
}

/// Winning pool of a routed swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSelection {
    pub request: SwapRequest,
    pub best: RouteQuote,
    /// Every qualifying quote, in registration order.
    pub candidates: Vec<RouteQuote>,
}

impl RouteSelection {
    pub fn pool_owner_pkh(&self) -> OwnerPkh {
        self.best.pool_owner_pkh
    }
}

// ── Split analysis ──────────────────────────────────────────────────────

/// One leg of a hypothetical split across several pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitLeg {
    pub pool_owner_pkh: OwnerPkh,
    /// Share of the request assigned to this pool, in basis points.
    pub weight_bps: u64,
    pub input_amount: u64,
    pub output_amount: u64,
}

/// Comparison of a proportional multi-pool split against the best single
/// pool. Informational only; templates always use one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitAnalysis {
    pub best_single: RouteQuote,
    pub legs: Vec<SplitLeg>,
    pub total_input: u64,
    pub total_output: u64,
    /// Positive when the split beats the single pool: more output for
    /// exact-input, less input for exact-output.
    pub improvement_percent: f64,
}
