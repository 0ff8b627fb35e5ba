//! CashAddr encoding for Bitcoin Cash addresses.
//!
//! Pools live at P2SH32 addresses; users hold P2PKH addresses. Token-bearing
//! outputs must be sent to the token-aware form (`z…`/`r…`), plain BCH
//! outputs to the plain form (`q…`/`p…`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::network::Network;
use crate::wire::push_bytes;

const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

const GENERATORS: [u64; 5] = [
    0x98f2bc8e61,
    0x79b76d99e2,
    0xf33e5fb3c4,
    0xae2eabe2a8,
    0x1e4f43e470,
];

const CHECKSUM_LEN: usize = 8;

/// Script template an address pays to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    P2pkh,
    P2sh,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CashAddress {
    network: Network,
    kind: AddressKind,
    token_aware: bool,
    hash: Vec<u8>,
}

impl CashAddress {
    pub fn p2pkh(network: Network, pkh: [u8; 20]) -> Self {
        Self {
            network,
            kind: AddressKind::P2pkh,
            token_aware: false,
            hash: pkh.to_vec(),
        }
    }

    pub fn p2sh32(network: Network, script_hash: [u8; 32]) -> Self {
        Self {
            network,
            kind: AddressKind::P2sh,
            token_aware: false,
            hash: script_hash.to_vec(),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    pub fn is_token_aware(&self) -> bool {
        self.token_aware
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// The 20-byte public-key hash of a P2PKH address.
    pub fn pubkey_hash(&self) -> Result<[u8; 20]> {
        if self.kind != AddressKind::P2pkh {
            return Err(Error::InvalidAddress(format!("{self} is not a P2PKH address")));
        }
        <[u8; 20]>::try_from(self.hash.as_slice())
            .map_err(|_| Error::InvalidAddress("P2PKH hash must be 20 bytes".into()))
    }

    /// Same destination, token-aware encoding.
    pub fn to_token_aware(&self) -> Self {
        Self {
            token_aware: true,
            ..self.clone()
        }
    }

    /// Same destination, plain (BCH-only) encoding.
    pub fn to_plain(&self) -> Self {
        Self {
            token_aware: false,
            ..self.clone()
        }
    }

    /// Output locking bytecode. Token awareness does not affect the script.
    pub fn locking_bytecode(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(self.hash.len() + 5);
        match (self.kind, self.hash.len()) {
            (AddressKind::P2pkh, _) => {
                script.extend_from_slice(&[0x76, 0xa9]);
                push_bytes(&mut script, &self.hash);
                script.extend_from_slice(&[0x88, 0xac]);
            }
            (AddressKind::P2sh, 32) => {
                script.push(0xaa);
                push_bytes(&mut script, &self.hash);
                script.push(0x87);
            }
            (AddressKind::P2sh, _) => {
                script.push(0xa9);
                push_bytes(&mut script, &self.hash);
                script.push(0x87);
            }
        }
        script
    }

    fn version_byte(&self) -> u8 {
        let type_bits: u8 = match (self.kind, self.token_aware) {
            (AddressKind::P2pkh, false) => 0,
            (AddressKind::P2sh, false) => 1,
            (AddressKind::P2pkh, true) => 2,
            (AddressKind::P2sh, true) => 3,
        };
        let size_bits: u8 = if self.hash.len() == 32 { 3 } else { 0 };
        (type_bits << 3) | size_bits
    }

    /// Encode to the prefixed CashAddr string.
    pub fn encode(&self) -> String {
        let prefix = self.network.cashaddr_prefix();
        let mut payload = Vec::with_capacity(1 + self.hash.len());
        payload.push(self.version_byte());
        payload.extend_from_slice(&self.hash);

        let mut data = convert_bits(&payload, 8, 5, true);
        let checksum = checksum(prefix, &data);
        data.extend_from_slice(&checksum);

        let mut out = String::with_capacity(prefix.len() + 1 + data.len());
        out.push_str(prefix);
        out.push(':');
        for d in data {
            out.push(CHARSET[d as usize] as char);
        }
        out
    }

    /// Decode an address, inferring the network from its prefix.
    ///
    /// Prefix-less strings are tried against every known network.
    pub fn decode(s: &str) -> Result<Self> {
        let s = s.trim();
        let has_upper = s.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = s.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Err(Error::InvalidAddress(format!("mixed case: {s}")));
        }
        let s = s.to_ascii_lowercase();

        match s.split_once(':') {
            Some((prefix, body)) => {
                let network = Network::from_cashaddr_prefix(prefix)
                    .ok_or_else(|| Error::InvalidAddress(format!("unknown prefix: {prefix}")))?;
                decode_body(network, body)
            }
            None => [Network::Mainnet, Network::Chipnet, Network::Regtest]
                .into_iter()
                .find_map(|net| decode_body(net, &s).ok())
                .ok_or_else(|| Error::InvalidAddress(format!("bad checksum: {s}"))),
        }
    }

    /// Decode and require a specific network.
    pub fn decode_for(network: Network, s: &str) -> Result<Self> {
        let addr = Self::decode(s)?;
        if addr.network != network {
            return Err(Error::InvalidAddress(format!(
                "{s} is a {} address, expected {network}",
                addr.network
            )));
        }
        Ok(addr)
    }
}

fn decode_body(network: Network, body: &str) -> Result<CashAddress> {
    let prefix = network.cashaddr_prefix();
    let mut data = Vec::with_capacity(body.len());
    for c in body.bytes() {
        let idx = CHARSET
            .iter()
            .position(|&x| x == c)
            .ok_or_else(|| Error::InvalidAddress(format!("invalid character {:?}", c as char)))?;
        data.push(idx as u8);
    }
    if data.len() <= CHECKSUM_LEN {
        return Err(Error::InvalidAddress("address too short".into()));
    }
    if polymod(&checksum_input(prefix, &data)) != 0 {
        return Err(Error::InvalidAddress(format!("bad checksum: {prefix}:{body}")));
    }

    let payload5 = &data[..data.len() - CHECKSUM_LEN];
    let payload = convert_bits(payload5, 5, 8, false);
    let (&version, hash) = payload
        .split_first()
        .ok_or_else(|| Error::InvalidAddress("empty payload".into()))?;

    if version & 0x80 != 0 {
        return Err(Error::InvalidAddress("reserved version bit set".into()));
    }
    let (kind, token_aware) = match (version >> 3) & 0x0f {
        0 => (AddressKind::P2pkh, false),
        1 => (AddressKind::P2sh, false),
        2 => (AddressKind::P2pkh, true),
        3 => (AddressKind::P2sh, true),
        t => return Err(Error::InvalidAddress(format!("unknown address type {t}"))),
    };
    let expected_len = match version & 0x07 {
        0 => 20,
        3 => 32,
        s => return Err(Error::InvalidAddress(format!("unsupported hash size code {s}"))),
    };
    if hash.len() != expected_len {
        return Err(Error::InvalidAddress(format!(
            "hash length {} does not match version byte",
            hash.len()
        )));
    }
    if kind == AddressKind::P2pkh && expected_len != 20 {
        return Err(Error::InvalidAddress("P2PKH hash must be 20 bytes".into()));
    }

    Ok(CashAddress {
        network,
        kind,
        token_aware,
        hash: hash.to_vec(),
    })
}

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        for (i, g) in GENERATORS.iter().enumerate() {
            if c0 & (1 << i) != 0 {
                c ^= g;
            }
        }
    }
    c ^ 1
}

fn checksum_input(prefix: &str, data: &[u8]) -> Vec<u8> {
    let mut v: Vec<u8> = prefix.bytes().map(|b| b & 0x1f).collect();
    v.push(0);
    v.extend_from_slice(data);
    v
}

fn checksum(prefix: &str, payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut input = checksum_input(prefix, payload);
    input.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let poly = polymod(&input);
    let mut out = [0u8; CHECKSUM_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ((poly >> (5 * (7 - i))) & 0x1f) as u8;
    }
    out
}

fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let max = (1u32 << to) - 1;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);
    for &value in data {
        acc = (acc << from) | value as u32;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & max) as u8);
        }
    }
    if pad && bits > 0 {
        out.push(((acc << (to - bits)) & max) as u8);
    }
    out
}

impl std::fmt::Display for CashAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for CashAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl Serialize for CashAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for CashAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}
