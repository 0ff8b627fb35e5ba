use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Decode a 32-byte hash from hex.
pub(crate) fn hex_to_bytes32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s).map_err(|e| Error::Serialization(format!("invalid hex: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| Error::Serialization(format!("expected 32 bytes, got {}", bytes.len())))
}

/// Transaction id, stored in display (RPC) byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Txid(pub [u8; 32]);

/// CashToken category id, stored in display byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenCategory(pub [u8; 32]);

impl Txid {
    /// Bytes in the order they appear inside a serialized transaction.
    pub fn to_wire_bytes(&self) -> [u8; 32] {
        let mut b = self.0;
        b.reverse();
        b
    }

    pub fn from_wire_bytes(mut bytes: [u8; 32]) -> Self {
        bytes.reverse();
        Txid(bytes)
    }
}

impl TokenCategory {
    pub fn to_wire_bytes(&self) -> [u8; 32] {
        let mut b = self.0;
        b.reverse();
        b
    }
}

impl std::fmt::Display for Txid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::str::FromStr for Txid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        hex_to_bytes32(s).map(Txid)
    }
}

impl std::str::FromStr for TokenCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        hex_to_bytes32(s).map(TokenCategory)
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for TokenCategory {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenCategory {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// NFT capability of a non-fungible token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NftCapability {
    None,
    Mutable,
    Minting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftData {
    pub capability: NftCapability,
    #[serde(with = "hex_bytes")]
    pub commitment: Vec<u8>,
}

/// CashToken data attached to an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub category: TokenCategory,
    /// Fungible amount in raw units.
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft: Option<NftData>,
}

impl TokenData {
    pub fn fungible(category: TokenCategory, amount: u64) -> Self {
        Self {
            category,
            amount,
            nft: None,
        }
    }
}

/// An unspent output as observed on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: Txid,
    pub vout: u32,
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenData>,
}

impl Utxo {
    /// Carries no token at all.
    pub fn is_pure_bch(&self) -> bool {
        self.token.is_none()
    }

    /// Fungible amount of `category` this UTXO can contribute.
    ///
    /// NFT-bearing UTXOs contribute nothing; spending them would burn or
    /// move the NFT.
    pub fn fungible_amount(&self, category: &TokenCategory) -> u64 {
        match &self.token {
            Some(t) if t.category == *category && t.nft.is_none() => t.amount,
            _ => 0,
        }
    }

    pub fn outpoint(&self) -> (Txid, u32) {
        (self.txid, self.vout)
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}
