use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::CashAddress;
use crate::error::{Error, Result};
use crate::units;
use crate::utxo::{TokenCategory, Utxo};

use super::math::{PoolReserves, spot_price};

/// Public-key hash of a pool owner. Identifies the pool contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerPkh(pub [u8; 20]);

impl OwnerPkh {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl std::fmt::Display for OwnerPkh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for OwnerPkh {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::InvalidAddress(format!("invalid pkh: {e}")))?;
        <[u8; 20]>::try_from(bytes.as_slice())
            .map(OwnerPkh)
            .map_err(|_| Error::InvalidAddress(format!("pkh must be 20 bytes, got {}", bytes.len())))
    }
}

impl TryFrom<&CashAddress> for OwnerPkh {
    type Error = Error;

    fn try_from(addr: &CashAddress) -> Result<Self> {
        addr.pubkey_hash().map(OwnerPkh)
    }
}

impl Serialize for OwnerPkh {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for OwnerPkh {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A live liquidity pool: one contract UTXO holding BCH and one fungible token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub owner_pkh: OwnerPkh,
    pub token_category: TokenCategory,
    /// Satoshis in the pool UTXO.
    pub bch_reserve: u64,
    /// Raw token units in the pool UTXO.
    pub token_reserve: u64,
    /// Plain P2SH32 contract address.
    pub contract_address: CashAddress,
    /// Token-aware form of `contract_address`.
    pub token_address: CashAddress,
    /// The UTXO backing both reserves.
    pub utxo: Utxo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Pool {
    pub fn reserves(&self) -> PoolReserves {
        PoolReserves::new(self.bch_reserve, self.token_reserve)
    }

    pub fn k(&self) -> u128 {
        self.reserves().k()
    }

    /// Display record. Needs the token's decimals.
    pub fn summary(&self, token_decimals: u8) -> PoolSummary {
        let bch = units::sats_to_bch(self.bch_reserve);
        let tokens = units::to_human(self.token_reserve, token_decimals);
        // sats per raw unit -> BCH per whole token
        let price = spot_price(&self.reserves())
            * 10f64.powi(token_decimals as i32)
            / units::SATS_PER_BCH as f64;
        PoolSummary {
            owner_pkh: self.owner_pkh,
            label: self.label.clone(),
            contract_address: self.contract_address.to_string(),
            bch,
            tokens,
            price_bch_per_token: price,
        }
    }
}

/// Human-readable pool snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSummary {
    pub owner_pkh: OwnerPkh,
    pub label: Option<String>,
    pub contract_address: String,
    pub bch: f64,
    pub tokens: f64,
    pub price_bch_per_token: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::utxo::{TokenData, Txid};

    fn test_pool() -> Pool {
        let contract = CashAddress::p2sh32(Network::Mainnet, [9; 32]);
        Pool {
            owner_pkh: OwnerPkh([1; 20]),
            token_category: TokenCategory([2; 32]),
            bch_reserve: 200_000_000,
            token_reserve: 50_000,
            token_address: contract.to_token_aware(),
            contract_address: contract,
            utxo: Utxo {
                txid: Txid([3; 32]),
                vout: 0,
                satoshis: 200_000_000,
                token: Some(TokenData::fungible(TokenCategory([2; 32]), 50_000)),
            },
            label: Some("test".into()),
        }
    }

    #[test]
    fn owner_pkh_hex() {
        let pkh: OwnerPkh = "f5bf48b397dae70be82b3cca4793f8eb2b6cdac9".parse().unwrap();
        assert_eq!(pkh.to_string(), "f5bf48b397dae70be82b3cca4793f8eb2b6cdac9");
        assert!("abcd".parse::<OwnerPkh>().is_err());
        assert!("xyz".parse::<OwnerPkh>().is_err());
    }

    #[test]
    fn owner_pkh_from_address() {
        let addr = CashAddress::p2pkh(Network::Mainnet, [4; 20]);
        assert_eq!(OwnerPkh::try_from(&addr).unwrap(), OwnerPkh([4; 20]));
        let p2sh = CashAddress::p2sh32(Network::Mainnet, [4; 32]);
        assert!(OwnerPkh::try_from(&p2sh).is_err());
    }

    #[test]
    fn reserves_and_k() {
        let pool = test_pool();
        assert_eq!(pool.reserves(), PoolReserves::new(200_000_000, 50_000));
        assert_eq!(pool.k(), 200_000_000u128 * 50_000);
    }

    #[test]
    fn summary_uses_decimals() {
        let s = test_pool().summary(2);
        assert_eq!(s.bch, 2.0);
        assert_eq!(s.tokens, 500.0);
        assert!((s.price_bch_per_token - 0.004).abs() < 1e-12);
        assert_eq!(s.label.as_deref(), Some("test"));
    }
}
