use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::network::Network;
use crate::units::{DEFAULT_MINER_FEE, DUST_LIMIT};

/// Default tolerance between a proposed pool price and the market average.
pub const DEFAULT_PRICE_DEVIATION_BPS: u64 = 100;

/// SDK configuration.
///
/// Every field has a default except `pool_contract_bytecode`, which must be
/// supplied before any pool address can be derived.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub network: Network,
    /// Electrum servers, tried in order. Empty means the network defaults.
    pub electrum_urls: Vec<String>,
    pub miner_fee: u64,
    pub dust_limit: u64,
    pub price_deviation_tolerance_bps: u64,
    pub pool_cache_ttl_secs: u64,
    pub metadata_cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub electrum_timeout_secs: u8,
    /// Compiled pool contract bytecode (hex), without the owner PKH push.
    pub pool_contract_bytecode: String,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            electrum_urls: Vec::new(),
            miner_fee: DEFAULT_MINER_FEE,
            dust_limit: DUST_LIMIT,
            price_deviation_tolerance_bps: DEFAULT_PRICE_DEVIATION_BPS,
            pool_cache_ttl_secs: 12,
            metadata_cache_ttl_secs: 3600,
            request_timeout_secs: 30,
            electrum_timeout_secs: 10,
            pool_contract_bytecode: String::new(),
        }
    }
}

impl SdkConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pool_contract_bytecode.is_empty() {
            return Err(Error::Config("pool_contract_bytecode is required".into()));
        }
        self.contract_template()?;
        if self.miner_fee == 0 {
            return Err(Error::Config("miner_fee must be non-zero".into()));
        }
        if self.dust_limit == 0 {
            return Err(Error::Config("dust_limit must be non-zero".into()));
        }
        if self.price_deviation_tolerance_bps >= 10_000 {
            return Err(Error::Config(
                "price_deviation_tolerance_bps must be below 10000".into(),
            ));
        }
        Ok(())
    }

    pub fn contract_template(&self) -> Result<ContractTemplate> {
        ContractTemplate::from_hex(&self.pool_contract_bytecode)
    }

    pub fn electrum_urls(&self) -> Vec<String> {
        if self.electrum_urls.is_empty() {
            self.network
                .default_electrum_urls()
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.electrum_urls.clone()
        }
    }

    pub fn tx_policy(&self) -> TxPolicy {
        TxPolicy {
            miner_fee: self.miner_fee,
            dust_limit: self.dust_limit,
        }
    }

    pub fn pool_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.pool_cache_ttl_secs)
    }

    pub fn metadata_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Fee and dust rules applied by every builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxPolicy {
    pub miner_fee: u64,
    pub dust_limit: u64,
}

impl Default for TxPolicy {
    fn default() -> Self {
        Self {
            miner_fee: DEFAULT_MINER_FEE,
            dust_limit: DUST_LIMIT,
        }
    }
}

/// Compiled pool contract bytecode, parameterised per owner at derivation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTemplate {
    bytecode: Vec<u8>,
}

impl ContractTemplate {
    pub fn new(bytecode: Vec<u8>) -> Result<Self> {
        if bytecode.is_empty() {
            return Err(Error::Config("contract bytecode is empty".into()));
        }
        Ok(Self { bytecode })
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytecode = hex::decode(hex_str.trim())
            .map_err(|e| Error::Config(format!("invalid contract bytecode hex: {e}")))?;
        Self::new(bytecode)
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }
}
