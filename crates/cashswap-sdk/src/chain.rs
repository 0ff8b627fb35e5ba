use electrum_client::{Client, ConfigBuilder, ElectrumApi, Param};
use serde_json::Value;

use crate::address::CashAddress;
use crate::error::{Error, Result};
use crate::utxo::{NftCapability, NftData, TokenData, Txid, Utxo};
use crate::wire::sha256;

/// Source of UTXOs and sink for signed transactions.
pub trait UtxoProvider: Send + Sync {
    /// Unspent outputs locked to `address`, tokens included.
    fn get_utxos(&self, address: &CashAddress) -> Result<Vec<Utxo>>;

    /// Broadcast a signed raw transaction and return its txid.
    fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid>;
}

/// Electrum script hash: SHA-256 of the locking bytecode, byte-reversed.
pub fn electrum_script_hash(locking_bytecode: &[u8]) -> String {
    let mut hash = sha256(locking_bytecode);
    hash.reverse();
    hex::encode(hash)
}

/// Rejection reasons meaning an input is gone: already spent, never existed,
/// or double-spent in the mempool.
const SPENT_MARKERS: &[&str] = &[
    "missingorspent",
    "missing-inputs",
    "missing inputs",
    "txn-mempool-conflict",
    "already spent",
];

pub(crate) fn classify_rejection(message: String) -> Error {
    let lower = message.to_lowercase();
    if SPENT_MARKERS.iter().any(|m| lower.contains(m)) {
        Error::UtxoSpent(message)
    } else {
        Error::BroadcastRejected(message)
    }
}

/// Electrum (Fulcrum) provider with ordered endpoint failover.
///
/// Each call connects to the first endpoint; on a network failure the next
/// endpoint is tried. Server-side rejections are returned immediately.
pub struct ElectrumProvider {
    urls: Vec<String>,
    timeout_secs: u8,
}

impl ElectrumProvider {
    pub fn new(urls: Vec<String>, timeout_secs: u8) -> Result<Self> {
        if urls.is_empty() {
            return Err(Error::Config("at least one electrum url is required".into()));
        }
        Ok(Self { urls, timeout_secs })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    fn connect(&self, url: &str) -> Result<Client> {
        let config = ConfigBuilder::new()
            .timeout(Some(self.timeout_secs))
            .build();
        Client::from_config(url, config).map_err(|e| Error::NetworkFailure(format!("{url}: {e}")))
    }

    fn with_failover<T>(&self, op: impl Fn(&Client) -> Result<T>) -> Result<T> {
        let mut last = String::new();
        for url in &self.urls {
            let attempt = self.connect(url).and_then(|client| op(&client));
            match attempt {
                Err(Error::NetworkFailure(e)) => {
                    log::warn!("electrum endpoint {url} failed: {e}");
                    last = e;
                }
                other => return other,
            }
        }
        Err(Error::NetworkFailure(format!(
            "all electrum endpoints failed, last error: {last}"
        )))
    }
}

fn map_call_error(e: electrum_client::Error) -> Error {
    match e {
        electrum_client::Error::Protocol(v) => {
            let msg = v
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| v.to_string());
            classify_rejection(msg)
        }
        other => Error::NetworkFailure(other.to_string()),
    }
}

/// Parse one `listunspent` entry. `None` for malformed entries.
fn parse_unspent(entry: &Value) -> Option<Utxo> {
    let txid: Txid = entry["tx_hash"].as_str()?.parse().ok()?;
    let vout = u32::try_from(entry["tx_pos"].as_u64()?).ok()?;
    let satoshis = entry["value"].as_u64()?;

    let token = match entry.get("token_data") {
        None | Some(Value::Null) => None,
        Some(data) => {
            let category = data["category"].as_str()?.parse().ok()?;
            // Fulcrum sends amounts as strings; accept numbers too.
            let amount = match &data["amount"] {
                Value::String(s) => s.parse().ok()?,
                Value::Number(n) => n.as_u64()?,
                Value::Null => 0,
                _ => return None,
            };
            let nft = match data.get("nft") {
                None | Some(Value::Null) => None,
                Some(nft) => Some(NftData {
                    capability: serde_json::from_value::<NftCapability>(
                        nft["capability"].clone(),
                    )
                    .ok()?,
                    commitment: hex::decode(nft["commitment"].as_str().unwrap_or("")).ok()?,
                }),
            };
            Some(TokenData {
                category,
                amount,
                nft,
            })
        }
    };

    Some(Utxo {
        txid,
        vout,
        satoshis,
        token,
    })
}

/// Parse a full `listunspent` response, skipping malformed entries.
pub(crate) fn parse_unspent_list(resp: &Value) -> Result<Vec<Utxo>> {
    let entries = resp
        .as_array()
        .ok_or_else(|| Error::NetworkFailure("expected array response".into()))?;
    let mut utxos = Vec::with_capacity(entries.len());
    for entry in entries {
        match parse_unspent(entry) {
            Some(u) => utxos.push(u),
            None => log::warn!("skipping unparseable listunspent entry: {entry}"),
        }
    }
    Ok(utxos)
}

impl UtxoProvider for ElectrumProvider {
    fn get_utxos(&self, address: &CashAddress) -> Result<Vec<Utxo>> {
        let script_hash = electrum_script_hash(&address.locking_bytecode());
        self.with_failover(|client| {
            let resp = client
                .raw_call(
                    "blockchain.scripthash.listunspent",
                    [
                        Param::String(script_hash.clone()),
                        Param::String("include_tokens".into()),
                    ],
                )
                .map_err(map_call_error)?;
            parse_unspent_list(&resp)
        })
    }

    fn broadcast(&self, raw_tx_hex: &str) -> Result<Txid> {
        let txid = self.with_failover(|client| {
            let resp = client
                .raw_call(
                    "blockchain.transaction.broadcast",
                    [Param::String(raw_tx_hex.to_string())],
                )
                .map_err(map_call_error)?;
            let txid = resp
                .as_str()
                .ok_or_else(|| Error::BroadcastRejected(format!("unexpected response: {resp}")))?;
            txid.parse::<Txid>()
        })?;
        log::info!("broadcast transaction {txid}");
        Ok(txid)
    }
}
