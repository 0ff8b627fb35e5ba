//! Bitcoin Cash transaction serialization.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::utxo::{NftCapability, NftData, TokenCategory, TokenData, Txid};

pub const TX_VERSION: u32 = 2;
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

const OP_0: u8 = 0x00;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;
const OP_1: u8 = 0x51;

const PREFIX_TOKEN: u8 = 0xef;
const HAS_AMOUNT: u8 = 0x10;
const HAS_NFT: u8 = 0x20;
const HAS_COMMITMENT_LENGTH: u8 = 0x40;
const RESERVED_BIT: u8 = 0x80;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Append a minimal data push.
pub fn push_bytes(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    match len {
        0..=75 => out.push(len as u8),
        76..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(len as u8);
        }
        0x100..=0xffff => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(len as u16).to_le_bytes());
        }
        _ => {
            out.push(OP_PUSHDATA4);
            out.extend_from_slice(&(len as u32).to_le_bytes());
        }
    }
    out.extend_from_slice(data);
}

/// Append a small non-negative script number using the minimal opcode.
pub fn push_number(out: &mut Vec<u8>, n: u64) {
    match n {
        0 => out.push(OP_0),
        1..=16 => out.push(OP_1 + (n as u8 - 1)),
        _ => {
            let mut bytes = Vec::new();
            let mut v = n;
            while v > 0 {
                bytes.push((v & 0xff) as u8);
                v >>= 8;
            }
            if bytes.last().is_some_and(|b| b & 0x80 != 0) {
                bytes.push(0);
            }
            push_bytes(out, &bytes);
        }
    }
}

/// CashToken output prefix; empty when the output carries no token.
pub fn token_prefix(token: Option<&TokenData>) -> Vec<u8> {
    let Some(token) = token else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(34 + 9);
    out.push(PREFIX_TOKEN);
    out.extend_from_slice(&token.category.to_wire_bytes());

    let mut bitfield = 0u8;
    if token.amount > 0 {
        bitfield |= HAS_AMOUNT;
    }
    if let Some(nft) = &token.nft {
        bitfield |= HAS_NFT;
        if !nft.commitment.is_empty() {
            bitfield |= HAS_COMMITMENT_LENGTH;
        }
        bitfield |= match nft.capability {
            NftCapability::None => 0,
            NftCapability::Mutable => 1,
            NftCapability::Minting => 2,
        };
    }
    out.push(bitfield);

    if let Some(nft) = token.nft.as_ref().filter(|n| !n.commitment.is_empty()) {
        write_compact_size(&mut out, nft.commitment.len() as u64);
        out.extend_from_slice(&nft.commitment);
    }
    if token.amount > 0 {
        write_compact_size(&mut out, token.amount);
    }
    out
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| Error::Serialization("unexpected end of transaction".into()))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32_le(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64_le(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn compact_size(&mut self) -> Result<u64> {
        match self.u8()? {
            0xfd => Ok(u16::from_le_bytes(self.array()?) as u64),
            0xfe => Ok(self.u32_le()? as u64),
            0xff => self.u64_le(),
            n => Ok(n as u64),
        }
    }

    fn var_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.compact_size()?;
        let len = usize::try_from(len)
            .map_err(|_| Error::Serialization("length prefix too large".into()))?;
        self.take(len)
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Split an output's locking field into its token prefix and bytecode.
pub fn split_token_prefix(field: &[u8]) -> Result<(Option<TokenData>, &[u8])> {
    if field.first() != Some(&PREFIX_TOKEN) {
        return Ok((None, field));
    }
    let mut r = Reader::new(&field[1..]);
    let mut category: [u8; 32] = r.array()?;
    category.reverse();
    let bitfield = r.u8()?;
    if bitfield & RESERVED_BIT != 0 {
        return Err(Error::Serialization("reserved token bit set".into()));
    }

    let nft = if bitfield & HAS_NFT != 0 {
        let capability = match bitfield & 0x0f {
            0 => NftCapability::None,
            1 => NftCapability::Mutable,
            2 => NftCapability::Minting,
            c => return Err(Error::Serialization(format!("invalid NFT capability {c}"))),
        };
        let commitment = if bitfield & HAS_COMMITMENT_LENGTH != 0 {
            r.var_bytes()?.to_vec()
        } else {
            Vec::new()
        };
        Some(NftData {
            capability,
            commitment,
        })
    } else {
        None
    };
    let amount = if bitfield & HAS_AMOUNT != 0 {
        r.compact_size()?
    } else {
        0
    };

    let rest = &field[1 + r.pos..];
    Ok((
        Some(TokenData {
            category: TokenCategory(category),
            amount,
            nft,
        }),
        rest,
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInput {
    pub txid: Txid,
    pub vout: u32,
    pub unlocking_bytecode: Vec<u8>,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub value: u64,
    pub locking_bytecode: Vec<u8>,
    pub token: Option<TokenData>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub version: u32,
    pub inputs: Vec<RawInput>,
    pub outputs: Vec<RawOutput>,
    pub locktime: u32,
}

impl RawTransaction {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());

        write_compact_size(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(&input.txid.to_wire_bytes());
            out.extend_from_slice(&input.vout.to_le_bytes());
            write_compact_size(&mut out, input.unlocking_bytecode.len() as u64);
            out.extend_from_slice(&input.unlocking_bytecode);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            let prefix = token_prefix(output.token.as_ref());
            write_compact_size(
                &mut out,
                (prefix.len() + output.locking_bytecode.len()) as u64,
            );
            out.extend_from_slice(&prefix);
            out.extend_from_slice(&output.locking_bytecode);
        }

        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);
        let version = r.u32_le()?;

        let n_inputs = r.compact_size()?;
        let mut inputs = Vec::new();
        for _ in 0..n_inputs {
            let txid = Txid::from_wire_bytes(r.array()?);
            let vout = r.u32_le()?;
            let unlocking_bytecode = r.var_bytes()?.to_vec();
            let sequence = r.u32_le()?;
            inputs.push(RawInput {
                txid,
                vout,
                unlocking_bytecode,
                sequence,
            });
        }

        let n_outputs = r.compact_size()?;
        let mut outputs = Vec::new();
        for _ in 0..n_outputs {
            let value = r.u64_le()?;
            let (token, locking) = split_token_prefix(r.var_bytes()?)?;
            outputs.push(RawOutput {
                value,
                locking_bytecode: locking.to_vec(),
                token,
            });
        }

        let locktime = r.u32_le()?;
        if !r.is_empty() {
            return Err(Error::Serialization("trailing bytes after locktime".into()));
        }
        Ok(Self {
            version,
            inputs,
            outputs,
            locktime,
        })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::Serialization(format!("invalid hex: {e}")))?;
        Self::decode(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn txid(&self) -> Txid {
        Txid::from_wire_bytes(hash256(&self.encode()))
    }
}
