//! Wallet-signing serializer.
//!
//! Turns an [`UnsignedTxTemplate`] into a [`SigningRequest`]: a raw
//! transaction whose unlocking bytecode is placeholder data, plus the source
//! output of every input so an external wallet can produce the real
//! signatures. User inputs get a P2PKH placeholder; the pool input gets the
//! contract unlocker for the template's clause.

use serde::{Deserialize, Serialize};

use crate::amm_pool::contract::PoolContract;
use crate::amm_pool::unlock::UnlockFunction;
use crate::config::ContractTemplate;
use crate::error::{Error, Result};
use crate::template::{InputRole, UnsignedTxTemplate};
use crate::utxo::{TokenData, Txid, hex_bytes};
use crate::wire::{
    RawInput, RawOutput, RawTransaction, SEQUENCE_FINAL, TX_VERSION, hash256, push_bytes,
    push_number,
};

/// Schnorr/ECDSA signature slot, filled by the wallet.
const PLACEHOLDER_SIGNATURE: [u8; 65] = [0u8; 65];
/// Compressed public key slot, filled by the wallet.
const PLACEHOLDER_PUBKEY: [u8; 33] = [0u8; 33];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiFunction {
    pub name: UnlockFunction,
    pub selector: u64,
}

/// Contract metadata the wallet needs to sign a pool input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub abi_function: AbiFunction,
    #[serde(with = "hex_bytes")]
    pub redeem_script: Vec<u8>,
}

/// The output an input spends, with the unlocking data placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceOutput {
    pub outpoint_transaction_hash: Txid,
    pub outpoint_index: u32,
    pub sequence_number: u32,
    #[serde(with = "hex_bytes")]
    pub unlocking_bytecode: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub locking_bytecode: Vec<u8>,
    pub value_satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<ContractInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningRequest {
    /// Raw transaction hex with placeholder unlockers.
    pub transaction: String,
    pub source_outputs: Vec<SourceOutput>,
    /// Ask the wallet to broadcast after signing.
    pub broadcast: bool,
    pub user_prompt: String,
}

fn p2pkh_placeholder() -> Vec<u8> {
    let mut script = Vec::with_capacity(100);
    push_bytes(&mut script, &PLACEHOLDER_SIGNATURE);
    push_bytes(&mut script, &PLACEHOLDER_PUBKEY);
    script
}

fn contract_placeholder(function: UnlockFunction, redeem_script: &[u8]) -> Vec<u8> {
    let mut script = p2pkh_placeholder();
    push_number(&mut script, function.selector());
    push_bytes(&mut script, redeem_script);
    script
}

/// Build a signing request from a template.
///
/// Inputs are walked in template order; nothing is reordered or skipped.
/// A template whose pool input is not input 0, or that spends more than one
/// pool input, is rejected.
pub fn build_signing_request(
    template: &UnsignedTxTemplate,
    contract_template: &ContractTemplate,
    user_prompt: impl Into<String>,
    broadcast: bool,
) -> Result<SigningRequest> {
    let pool_indices: Vec<usize> = template
        .inputs
        .iter()
        .enumerate()
        .filter(|(_, i)| matches!(i.role, InputRole::Pool(_)))
        .map(|(idx, _)| idx)
        .collect();
    match pool_indices.as_slice() {
        [] | [0] => {}
        [idx] => {
            return Err(Error::InvalidTemplate(format!(
                "pool input at index {idx}, expected 0"
            )));
        }
        _ => {
            return Err(Error::InvalidTemplate(
                "template spends more than one pool input".into(),
            ));
        }
    }

    let contract = PoolContract::new(template.pool_owner_pkh, contract_template);
    let user_locking = template.owner_address.locking_bytecode();

    let mut source_outputs = Vec::with_capacity(template.inputs.len());
    let mut raw_inputs = Vec::with_capacity(template.inputs.len());
    for input in &template.inputs {
        let (unlocking, locking, contract_info) = match input.role {
            InputRole::User => (p2pkh_placeholder(), user_locking.clone(), None),
            InputRole::Pool(function) => (
                contract_placeholder(function, contract.redeem_script()),
                contract.locking_bytecode(),
                Some(ContractInfo {
                    abi_function: AbiFunction {
                        name: function,
                        selector: function.selector(),
                    },
                    redeem_script: contract.redeem_script().to_vec(),
                }),
            ),
        };
        raw_inputs.push(RawInput {
            txid: input.utxo.txid,
            vout: input.utxo.vout,
            unlocking_bytecode: unlocking.clone(),
            sequence: SEQUENCE_FINAL,
        });
        source_outputs.push(SourceOutput {
            outpoint_transaction_hash: input.utxo.txid,
            outpoint_index: input.utxo.vout,
            sequence_number: SEQUENCE_FINAL,
            unlocking_bytecode: unlocking,
            locking_bytecode: locking,
            value_satoshis: input.utxo.satoshis,
            token: input.utxo.token.clone(),
            contract: contract_info,
        });
    }

    let raw_outputs = template
        .outputs
        .iter()
        .map(|o| RawOutput {
            value: o.satoshis,
            locking_bytecode: o.address.locking_bytecode(),
            token: o.token.clone(),
        })
        .collect();

    let tx = RawTransaction {
        version: TX_VERSION,
        inputs: raw_inputs,
        outputs: raw_outputs,
        locktime: 0,
    };

    let request = SigningRequest {
        transaction: tx.to_hex(),
        source_outputs,
        broadcast,
        user_prompt: user_prompt.into(),
    };
    request.verify_covenant_layout()?;
    Ok(request)
}

/// Parse a template from JSON, reporting unknown clause names as
/// `UnsupportedUnlockFunction` rather than a generic decode error.
pub fn parse_template(json: &str) -> Result<UnsignedTxTemplate> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
    if let Some(inputs) = value.get("inputs").and_then(|v| v.as_array()) {
        for input in inputs {
            if let Some(name) = input.pointer("/role/pool").and_then(|v| v.as_str()) {
                name.parse::<UnlockFunction>()?;
            }
        }
    }
    serde_json::from_value(value).map_err(|e| Error::Serialization(e.to_string()))
}

impl SigningRequest {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn decode_transaction(&self) -> Result<RawTransaction> {
        RawTransaction::from_hex(&self.transaction)
    }

    /// Re-check the positions the pool contract enforces on chain: the pool
    /// is spent only as input 0, that input's locking bytecode commits to its
    /// redeem script, nothing but output 0 pays back to the pool, and clauses
    /// that keep the pool alive put it at output 0.
    pub fn verify_covenant_layout(&self) -> Result<()> {
        let tx = self.decode_transaction()?;
        if tx.inputs.len() != self.source_outputs.len() {
            return Err(Error::InvalidTemplate(format!(
                "{} inputs but {} source outputs",
                tx.inputs.len(),
                self.source_outputs.len()
            )));
        }
        for (i, (input, source)) in tx.inputs.iter().zip(&self.source_outputs).enumerate() {
            if input.txid != source.outpoint_transaction_hash || input.vout != source.outpoint_index
            {
                return Err(Error::InvalidTemplate(format!(
                    "input {i} does not match its source output"
                )));
            }
        }

        let mut pool_sources = self
            .source_outputs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.contract.is_some());
        let Some((pool_idx, pool_source)) = pool_sources.next() else {
            return Ok(());
        };
        if pool_idx != 0 {
            return Err(Error::InvalidTemplate(format!(
                "pool input at index {pool_idx}, expected 0"
            )));
        }
        if pool_sources.next().is_some() {
            return Err(Error::InvalidTemplate(
                "more than one pool input".into(),
            ));
        }
        let Some(info) = pool_source.contract.as_ref() else {
            return Ok(());
        };

        let mut expected = Vec::with_capacity(35);
        expected.push(0xaa);
        push_bytes(&mut expected, &hash256(&info.redeem_script));
        expected.push(0x87);
        if pool_source.locking_bytecode != expected {
            return Err(Error::InvalidTemplate(
                "pool input does not spend the contract for its redeem script".into(),
            ));
        }

        if let Some(idx) = tx
            .outputs
            .iter()
            .skip(1)
            .position(|o| o.locking_bytecode == expected)
        {
            return Err(Error::InvalidTemplate(format!(
                "output {} pays to the pool, expected only output 0",
                idx + 1
            )));
        }
        let keeps_pool = !matches!(info.abi_function.name, UnlockFunction::RemoveLiquidity);
        let pool_at_zero = tx
            .outputs
            .first()
            .is_some_and(|o| o.locking_bytecode == expected);
        if keeps_pool && !pool_at_zero {
            return Err(Error::InvalidTemplate(format!(
                "{} must return the pool at output 0",
                info.abi_function.name
            )));
        }
        Ok(())
    }
}
