pub mod address;
pub mod amm_pool;
pub mod chain;
pub mod config;
pub mod discovery;
pub mod error;
pub mod network;
pub mod node;
pub mod sdk;
pub mod signing;
pub mod template;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod trade;
pub mod units;
pub mod utxo;
pub mod wire;

// Core types
pub use address::{AddressKind, CashAddress};
pub use chain::{ElectrumProvider, UtxoProvider};
pub use config::{ContractTemplate, SdkConfig, TxPolicy};
pub use error::{Asset, Error, NodeError, Result};
pub use network::Network;
pub use node::CashSwapNode;
pub use sdk::{CashSwapSdk, SwapQuote};
pub use utxo::{NftCapability, NftData, TokenCategory, TokenData, Txid, Utxo};

// AMM pool types and builders
pub use amm_pool::contract::PoolContract;
pub use amm_pool::math::{
    PoolReserves, SlippageKind, SwapAmount, SwapDirection, SwapResult, apply_slippage,
    compute_swap, compute_swap_exact_input, compute_swap_exact_output, price_impact,
    quote_input_price, quote_output_price,
};
pub use amm_pool::params::{OwnerPkh, Pool, PoolSummary};
pub use amm_pool::tx::add_liquidity::{
    AddLiquidityParams, DepositAmount, LiquidityChange, build_add_liquidity,
};
pub use amm_pool::tx::creation::{PoolCreation, PoolCreationParams, build_pool_creation};
pub use amm_pool::tx::remove_liquidity::{
    RemoveLiquidityParams, WithdrawAmount, build_remove_liquidity,
};
pub use amm_pool::tx::swap::{SwapOutcome, SwapParams, build_swap};
pub use amm_pool::unlock::UnlockFunction;

// Templates and signing
pub use signing::{SigningRequest, SourceOutput, build_signing_request, parse_template};
pub use template::{
    InputRole, OperationType, TemplateBuilder, TxOutput, UnsignedTxTemplate, UtxoInput,
    select_funding,
};
pub use wire::RawTransaction;

// Routing
pub use trade::{
    RouteQuote, RouteSelection, SplitAnalysis, SplitLeg, SwapRequest, analyze_split, quote_pool,
    route_swap,
};

// Discovery
pub use discovery::{
    PoolDiscovery, PoolRegistry, RegistryEntry, TokenInfo, TokenMetadata, TokenMetadataProvider,
    TtlCache,
};
