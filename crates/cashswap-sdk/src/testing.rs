//! Test doubles and fixtures.
//!
//! In-memory implementations of the external collaborators (chain provider,
//! pool registry, token metadata) plus helpers for building pools and UTXOs
//! without a live network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::address::CashAddress;
use crate::amm_pool::contract::PoolContract;
use crate::amm_pool::params::{OwnerPkh, Pool};
use crate::chain::{UtxoProvider, classify_rejection};
use crate::config::{ContractTemplate, SdkConfig};
use crate::discovery::metadata::TokenMetadataProvider;
use crate::discovery::registry::{PoolRegistry, RegistryEntry};
use crate::error::{Error, Result};
use crate::network::Network;
use crate::utxo::{TokenCategory, TokenData, Txid, Utxo};
use crate::wire::RawTransaction;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const TEST_CATEGORY: TokenCategory = TokenCategory([0xcc; 32]);

/// Stand-in contract bytecode. Not a real covenant; only its bytes matter
/// for address derivation.
pub const TEST_CONTRACT_HEX: &str = "5379009c63c0009d00cf00c7876700cd00c78768";

pub fn test_template() -> ContractTemplate {
    ContractTemplate::from_hex(TEST_CONTRACT_HEX).expect("valid test bytecode")
}

pub fn test_config() -> SdkConfig {
    SdkConfig {
        network: Network::Mainnet,
        pool_contract_bytecode: TEST_CONTRACT_HEX.to_string(),
        ..SdkConfig::default()
    }
}

/// Mainnet P2PKH address whose hash is `[seed; 20]`.
pub fn test_address(seed: u8) -> CashAddress {
    CashAddress::p2pkh(Network::Mainnet, [seed; 20])
}

pub fn bch_utxo(seed: u8, vout: u32, satoshis: u64) -> Utxo {
    Utxo {
        txid: Txid([seed; 32]),
        vout,
        satoshis,
        token: None,
    }
}

/// UTXO carrying `amount` of [`TEST_CATEGORY`].
pub fn token_utxo(seed: u8, vout: u32, satoshis: u64, amount: u64) -> Utxo {
    Utxo {
        txid: Txid([seed; 32]),
        vout,
        satoshis,
        token: Some(TokenData::fungible(TEST_CATEGORY, amount)),
    }
}

/// A pool owned by `[owner_seed; 20]` at the [`test_template`] contract.
pub fn test_pool(owner_seed: u8, bch: u64, tokens: u64) -> Pool {
    let owner = OwnerPkh([owner_seed; 20]);
    let address = PoolContract::new(owner, &test_template()).address(Network::Mainnet);
    Pool {
        owner_pkh: owner,
        token_category: TEST_CATEGORY,
        bch_reserve: bch,
        token_reserve: tokens,
        token_address: address.to_token_aware(),
        contract_address: address,
        utxo: token_utxo(owner_seed.wrapping_add(100), 0, bch, tokens),
        label: None,
    }
}

// ---------------------------------------------------------------------------
// Chain provider
// ---------------------------------------------------------------------------

/// In-memory chain keyed by locking bytecode.
///
/// Broadcasts are decoded, recorded, and applied: spent outpoints disappear
/// and outputs become new UTXOs, so a second broadcast of a conflicting
/// transaction fails with `UtxoSpent`.
#[derive(Default)]
pub struct MockChain {
    utxos: Mutex<HashMap<Vec<u8>, Vec<Utxo>>>,
    broadcasts: Mutex<Vec<String>>,
    network_failure: Mutex<Option<String>>,
    broadcast_rejection: Mutex<Option<String>>,
    scans: AtomicUsize,
}

impl MockChain {
    pub fn add_utxo(&self, address: &CashAddress, utxo: Utxo) {
        self.utxos
            .lock()
            .expect("mock lock")
            .entry(address.locking_bytecode())
            .or_default()
            .push(utxo);
    }

    pub fn set_utxos(&self, address: &CashAddress, utxos: Vec<Utxo>) {
        self.utxos
            .lock()
            .expect("mock lock")
            .insert(address.locking_bytecode(), utxos);
    }

    /// Every subsequent call fails with `NetworkFailure(msg)`.
    pub fn fail_network(&self, msg: &str) {
        *self.network_failure.lock().expect("mock lock") = Some(msg.to_string());
    }

    /// Subsequent broadcasts are rejected with `msg`.
    pub fn reject_broadcasts(&self, msg: &str) {
        *self.broadcast_rejection.lock().expect("mock lock") = Some(msg.to_string());
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().expect("mock lock").clone()
    }

    /// Number of `get_utxos` calls served.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn check_network(&self) -> Result<()> {
        match self.network_failure.lock().expect("mock lock").as_ref() {
            Some(msg) => Err(Error::NetworkFailure(msg.clone())),
            None => Ok(()),
        }
    }
}

impl UtxoProvider for MockChain {
    fn get_utxos(&self, address: &CashAddress) -> Result<Vec<Utxo>> {
        self.check_network()?;
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .utxos
            .lock()
            .expect("mock lock")
            .get(&address.locking_bytecode())
            .cloned()
            .unwrap_or_default())
    }

    fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid> {
        self.check_network()?;
        if let Some(msg) = self.broadcast_rejection.lock().expect("mock lock").clone() {
            return Err(classify_rejection(msg));
        }
        let tx = RawTransaction::from_hex(raw_tx_hex)?;
        let txid = tx.txid();

        let mut utxos = self.utxos.lock().expect("mock lock");
        for input in &tx.inputs {
            let found = utxos.values_mut().any(|list| {
                let before = list.len();
                list.retain(|u| !(u.txid == input.txid && u.vout == input.vout));
                list.len() != before
            });
            if !found {
                return Err(classify_rejection(format!(
                    "bad-txns-inputs-missingorspent {}:{}",
                    input.txid, input.vout
                )));
            }
        }
        for (vout, output) in tx.outputs.iter().enumerate() {
            utxos
                .entry(output.locking_bytecode.clone())
                .or_default()
                .push(Utxo {
                    txid,
                    vout: vout as u32,
                    satoshis: output.value,
                    token: output.token.clone(),
                });
        }
        drop(utxos);

        self.broadcasts
            .lock()
            .expect("mock lock")
            .push(raw_tx_hex.to_string());
        Ok(txid)
    }
}

// ---------------------------------------------------------------------------
// Registry and metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct StaticRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
}

impl StaticRegistry {
    pub fn new(owners: impl IntoIterator<Item = OwnerPkh>) -> Self {
        Self {
            entries: Mutex::new(owners.into_iter().map(RegistryEntry::new).collect()),
        }
    }

    pub fn register(&self, entry: RegistryEntry) {
        self.entries.lock().expect("registry lock").push(entry);
    }
}

impl PoolRegistry for StaticRegistry {
    fn list_owners(&self) -> Result<Vec<RegistryEntry>> {
        Ok(self.entries.lock().expect("registry lock").clone())
    }
}

#[derive(Debug, Default)]
pub struct StaticMetadata {
    tokens: HashMap<TokenCategory, (u8, String)>,
    calls: Arc<AtomicUsize>,
}

impl StaticMetadata {
    pub fn with_token(mut self, category: TokenCategory, decimals: u8, symbol: &str) -> Self {
        self.tokens.insert(category, (decimals, symbol.to_string()));
        self
    }

    /// Counter of `decimals` lookups.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl TokenMetadataProvider for StaticMetadata {
    fn decimals(&self, category: &TokenCategory) -> Result<Option<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tokens.get(category).map(|(d, _)| *d))
    }

    fn symbol(&self, category: &TokenCategory) -> Result<Option<String>> {
        Ok(self.tokens.get(category).map(|(_, s)| s.clone()))
    }

    fn name(&self, category: &TokenCategory) -> Result<Option<String>> {
        Ok(self.tokens.get(category).map(|(_, s)| format!("{s} token")))
    }

    fn icon_url(&self, _category: &TokenCategory) -> Result<Option<String>> {
        Ok(None)
    }
}
