use crate::address::CashAddress;
use crate::config::ContractTemplate;
use crate::network::Network;
use crate::wire::{hash256, push_bytes};

use super::params::OwnerPkh;

/// A pool contract instantiated for one owner.
///
/// The redeem script is the owner's PKH push followed by the compiled
/// contract bytecode. Its P2SH32 address is the pool's on-chain location,
/// so knowing the owner PKH is enough to find a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolContract {
    owner_pkh: OwnerPkh,
    redeem_script: Vec<u8>,
    script_hash: [u8; 32],
}

impl PoolContract {
    pub fn new(owner_pkh: OwnerPkh, template: &ContractTemplate) -> Self {
        let mut redeem_script = Vec::with_capacity(21 + template.bytecode().len());
        push_bytes(&mut redeem_script, owner_pkh.as_bytes());
        redeem_script.extend_from_slice(template.bytecode());
        let script_hash = hash256(&redeem_script);
        Self {
            owner_pkh,
            redeem_script,
            script_hash,
        }
    }

    pub fn owner_pkh(&self) -> OwnerPkh {
        self.owner_pkh
    }

    pub fn redeem_script(&self) -> &[u8] {
        &self.redeem_script
    }

    pub fn locking_bytecode(&self) -> Vec<u8> {
        let mut script = Vec::with_capacity(35);
        script.push(0xaa);
        push_bytes(&mut script, &self.script_hash);
        script.push(0x87);
        script
    }

    pub fn address(&self, network: Network) -> CashAddress {
        CashAddress::p2sh32(network, self.script_hash)
    }

    /// Address to which the pool's token-carrying output must be sent.
    pub fn token_address(&self, network: Network) -> CashAddress {
        self.address(network).to_token_aware()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> ContractTemplate {
        ContractTemplate::from_hex("5179009c63c0009d").unwrap()
    }

    #[test]
    fn redeem_script_prefixes_owner() {
        let c = PoolContract::new(OwnerPkh([0xab; 20]), &template());
        assert_eq!(c.redeem_script()[0], 20);
        assert_eq!(&c.redeem_script()[1..21], &[0xab; 20]);
        assert_eq!(&c.redeem_script()[21..], template().bytecode());
    }

    #[test]
    fn address_matches_locking_bytecode() {
        let c = PoolContract::new(OwnerPkh([1; 20]), &template());
        assert_eq!(c.address(Network::Mainnet).locking_bytecode(), c.locking_bytecode());
        assert!(c.token_address(Network::Mainnet).is_token_aware());
        assert_eq!(
            c.token_address(Network::Mainnet).locking_bytecode(),
            c.locking_bytecode()
        );
    }

    #[test]
    fn different_owners_different_addresses() {
        let a = PoolContract::new(OwnerPkh([1; 20]), &template());
        let b = PoolContract::new(OwnerPkh([2; 20]), &template());
        assert_ne!(a.address(Network::Mainnet), b.address(Network::Mainnet));
        assert_eq!(
            a,
            PoolContract::new(OwnerPkh([1; 20]), &template()),
            "derivation is deterministic"
        );
    }
}
