use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utxo::TokenCategory;

/// Which side of a pool an amount refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Bch,
    Token,
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Asset::Bch => write!(f, "BCH"),
            Asset::Token => write!(f, "token"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no pool found for owner {owner} and token {category}")]
    PoolNotFound { owner: String, category: TokenCategory },

    #[error("owner {0} already has a pool for this token")]
    PoolAlreadyExists(String),

    #[error("insufficient pool liquidity for requested swap")]
    InsufficientLiquidity,

    #[error("insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: Asset,
        required: u64,
        available: u64,
    },

    #[error("slippage exceeded: quoted {quoted}, limit {limit}")]
    SlippageExceeded { quoted: u64, limit: u64 },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("price deviates {deviation_bps} bps from market (tolerance {tolerance_bps} bps)")]
    PriceDeviationTooHigh {
        deviation_bps: u64,
        tolerance_bps: u64,
    },

    #[error("token decimals not initialized for {0}")]
    DecimalsNotInitialized(TokenCategory),

    #[error("network failure: {0}")]
    NetworkFailure(String),

    #[error("unsupported unlock function: {0}")]
    UnsupportedUnlockFunction(String),

    #[error("no pool can fill this swap")]
    NoRoute,

    #[error("address does not belong to the pool owner")]
    NotPoolOwner,

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("arithmetic overflow in pool calculation")]
    ArithmeticOverflow,

    #[error("input already spent or missing: {0}")]
    UtxoSpent(String),

    #[error("transaction rejected: {0}")]
    BroadcastRejected(String),

    #[error("invalid transaction template: {0}")]
    InvalidTemplate(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("pool registry error: {0}")]
    Registry(String),

    #[error("token metadata error: {0}")]
    Metadata(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by [`CashSwapNode`](crate::node::CashSwapNode) calls.
#[derive(Debug)]
pub enum NodeError {
    /// The operation did not finish within the configured timeout.
    Timeout(std::time::Duration),
    /// An SDK operation failed.
    Sdk(Error),
    /// A `spawn_blocking` task failed to join.
    Task(String),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::Timeout(d) => write!(f, "operation timed out after {}s", d.as_secs()),
            NodeError::Sdk(e) => write!(f, "sdk error: {e}"),
            NodeError::Task(e) => write!(f, "task join error: {e}"),
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NodeError::Sdk(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for NodeError {
    fn from(e: Error) -> Self {
        NodeError::Sdk(e)
    }
}
