//! Pool discovery: registry owners → contract addresses → live pool UTXOs.
//!
//! Every registered owner is scanned on each uncached lookup, so cost grows
//! linearly with the registry. Scans fan out over the rayon pool; results
//! keep registration order.

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;

use crate::amm_pool::contract::PoolContract;
use crate::amm_pool::params::{OwnerPkh, Pool};
use crate::chain::UtxoProvider;
use crate::config::ContractTemplate;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::utxo::TokenCategory;

use super::cache::TtlCache;
use super::registry::{PoolRegistry, RegistryEntry};

pub struct PoolDiscovery {
    provider: Arc<dyn UtxoProvider>,
    registry: Arc<dyn PoolRegistry>,
    template: ContractTemplate,
    network: Network,
    cache: Arc<TtlCache<TokenCategory, Vec<Pool>>>,
}

impl PoolDiscovery {
    pub fn new(
        provider: Arc<dyn UtxoProvider>,
        registry: Arc<dyn PoolRegistry>,
        template: ContractTemplate,
        network: Network,
        cache: Arc<TtlCache<TokenCategory, Vec<Pool>>>,
    ) -> Self {
        Self {
            provider,
            registry,
            template,
            network,
            cache,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn contract_for(&self, owner: OwnerPkh) -> PoolContract {
        PoolContract::new(owner, &self.template)
    }

    /// Pools trading `category`, in registration order. Served from the
    /// cache while fresh.
    pub fn find_pools(&self, category: &TokenCategory) -> Result<Vec<Pool>> {
        if let Some(pools) = self.cache.get(category) {
            log::debug!("pool cache hit for {category} ({} pools)", pools.len());
            return Ok(pools);
        }
        log::debug!("pool cache miss for {category}");
        self.find_pools_fresh(category)
    }

    /// Scan every registered owner, bypassing and then refreshing the cache.
    pub fn find_pools_fresh(&self, category: &TokenCategory) -> Result<Vec<Pool>> {
        let mut seen = HashSet::new();
        let owners: Vec<RegistryEntry> = self
            .registry
            .list_owners()?
            .into_iter()
            .filter(|e| seen.insert(e.pkh))
            .collect();

        let scanned: Vec<Option<Pool>> = owners
            .par_iter()
            .map(|entry| self.scan_owner(entry, category))
            .collect::<Result<_>>()?;
        let pools: Vec<Pool> = scanned.into_iter().flatten().collect();

        log::debug!(
            "scanned {} owners for {category}, found {} pools",
            owners.len(),
            pools.len()
        );
        self.cache.insert(*category, pools.clone());
        Ok(pools)
    }

    /// The live pool of one owner, read directly from the chain.
    pub fn pool_for_owner(&self, owner: OwnerPkh, category: &TokenCategory) -> Result<Pool> {
        let label = self
            .registry
            .list_owners()?
            .into_iter()
            .find(|e| e.pkh == owner)
            .and_then(|e| e.label);
        let entry = RegistryEntry {
            pkh: owner,
            address: None,
            label,
        };
        self.scan_owner(&entry, category)?
            .ok_or_else(|| Error::PoolNotFound {
                owner: owner.to_hex(),
                category: *category,
            })
    }

    pub fn invalidate(&self, category: &TokenCategory) {
        self.cache.invalidate(category);
    }

    fn scan_owner(&self, entry: &RegistryEntry, category: &TokenCategory) -> Result<Option<Pool>> {
        if let Some(addr) = &entry.address {
            if addr.pubkey_hash().ok() != Some(entry.pkh.0) {
                log::warn!("registry address {addr} does not match owner {}", entry.pkh);
            }
        }

        let contract = self.contract_for(entry.pkh);
        let address = contract.address(self.network);
        let utxos = self.provider.get_utxos(&address)?;

        let mut matching = utxos
            .into_iter()
            .filter(|u| u.fungible_amount(category) > 0);
        let Some(first) = matching.next() else {
            return Ok(None);
        };
        let utxo = matching.fold(first, |best, u| {
            log::warn!("owner {} has several pool UTXOs for {category}", entry.pkh);
            if u.satoshis > best.satoshis { u } else { best }
        });

        Ok(Some(Pool {
            owner_pkh: entry.pkh,
            token_category: *category,
            bch_reserve: utxo.satoshis,
            token_reserve: utxo.fungible_amount(category),
            token_address: address.to_token_aware(),
            contract_address: address,
            utxo,
            label: entry.label.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{
        MockChain, StaticRegistry, TEST_CATEGORY, bch_utxo, test_template, token_utxo,
    };

    fn discovery(chain: Arc<MockChain>, registry: StaticRegistry, ttl: Duration) -> PoolDiscovery {
        PoolDiscovery::new(
            chain,
            Arc::new(registry),
            test_template(),
            Network::Mainnet,
            Arc::new(TtlCache::new(ttl)),
        )
    }

    fn pool_address(owner: u8) -> crate::address::CashAddress {
        PoolContract::new(OwnerPkh([owner; 20]), &test_template()).address(Network::Mainnet)
    }

    #[test]
    fn finds_pools_in_registration_order() {
        let chain = Arc::new(MockChain::default());
        chain.add_utxo(&pool_address(3), token_utxo(30, 0, 500_000, 100));
        chain.add_utxo(&pool_address(1), token_utxo(10, 0, 900_000, 300));
        chain.add_utxo(&pool_address(2), bch_utxo(20, 0, 5_000));

        let registry = StaticRegistry::new([3, 2, 1].map(|b| OwnerPkh([b; 20])));
        let d = discovery(chain, registry, Duration::from_secs(60));
        let pools = d.find_pools(&TEST_CATEGORY).unwrap();
        let owners: Vec<_> = pools.iter().map(|p| p.owner_pkh.0[0]).collect();
        assert_eq!(owners, vec![3, 1]);
        assert_eq!(pools[1].bch_reserve, 900_000);
        assert_eq!(pools[1].token_reserve, 300);
        assert!(pools[1].token_address.is_token_aware());
    }

    #[test]
    fn ignores_other_categories_and_nfts() {
        let chain = Arc::new(MockChain::default());
        let mut foreign = token_utxo(1, 0, 1000, 5);
        foreign.token.as_mut().unwrap().category = TokenCategory([0xee; 32]);
        chain.add_utxo(&pool_address(1), foreign);
        let d = discovery(
            chain,
            StaticRegistry::new([OwnerPkh([1; 20])]),
            Duration::from_secs(60),
        );
        assert!(d.find_pools(&TEST_CATEGORY).unwrap().is_empty());
        assert!(matches!(
            d.pool_for_owner(OwnerPkh([1; 20]), &TEST_CATEGORY),
            Err(Error::PoolNotFound { .. })
        ));
    }

    #[test]
    fn cache_serves_until_invalidated() {
        let chain = Arc::new(MockChain::default());
        chain.add_utxo(&pool_address(1), token_utxo(1, 0, 1000, 10));
        let d = discovery(
            chain.clone(),
            StaticRegistry::new([OwnerPkh([1; 20])]),
            Duration::from_secs(60),
        );
        assert_eq!(d.find_pools(&TEST_CATEGORY).unwrap()[0].token_reserve, 10);

        chain.set_utxos(&pool_address(1), vec![token_utxo(2, 0, 2000, 20)]);
        assert_eq!(d.find_pools(&TEST_CATEGORY).unwrap()[0].token_reserve, 10);
        assert_eq!(d.find_pools_fresh(&TEST_CATEGORY).unwrap()[0].token_reserve, 20);

        chain.set_utxos(&pool_address(1), vec![token_utxo(3, 0, 3000, 30)]);
        d.invalidate(&TEST_CATEGORY);
        assert_eq!(d.find_pools(&TEST_CATEGORY).unwrap()[0].token_reserve, 30);
    }

    #[test]
    fn provider_errors_propagate() {
        let chain = Arc::new(MockChain::default());
        chain.fail_network("down");
        let d = discovery(
            chain,
            StaticRegistry::new([OwnerPkh([1; 20])]),
            Duration::from_secs(60),
        );
        assert!(matches!(
            d.find_pools(&TEST_CATEGORY),
            Err(Error::NetworkFailure(_))
        ));
    }

    #[test]
    fn duplicate_owners_scanned_once() {
        let chain = Arc::new(MockChain::default());
        chain.add_utxo(&pool_address(1), token_utxo(1, 0, 1000, 10));
        let registry = StaticRegistry::new([OwnerPkh([1; 20]), OwnerPkh([1; 20])]);
        let d = discovery(chain.clone(), registry, Duration::from_secs(60));
        assert_eq!(d.find_pools(&TEST_CATEGORY).unwrap().len(), 1);
        assert_eq!(chain.scan_count(), 1);
    }
}
