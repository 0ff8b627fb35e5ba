use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::utxo::TokenCategory;

use super::cache::TtlCache;

/// Token metadata lookups (BCMR registries, indexers, ...).
pub trait TokenMetadataProvider: Send + Sync {
    fn decimals(&self, category: &TokenCategory) -> Result<Option<u8>>;
    fn symbol(&self, category: &TokenCategory) -> Result<Option<String>>;
    fn name(&self, category: &TokenCategory) -> Result<Option<String>>;
    fn icon_url(&self, category: &TokenCategory) -> Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub category: TokenCategory,
    pub decimals: Option<u8>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub icon_url: Option<String>,
}

/// Cached view over a [`TokenMetadataProvider`].
///
/// Only metadata with known decimals is cached, so a token whose decimals
/// are published later is picked up on the next lookup.
pub struct TokenInfo {
    provider: Arc<dyn TokenMetadataProvider>,
    cache: Arc<TtlCache<TokenCategory, TokenMetadata>>,
}

impl TokenInfo {
    pub fn new(
        provider: Arc<dyn TokenMetadataProvider>,
        cache: Arc<TtlCache<TokenCategory, TokenMetadata>>,
    ) -> Self {
        Self { provider, cache }
    }

    pub fn metadata(&self, category: &TokenCategory) -> Result<TokenMetadata> {
        if let Some(meta) = self.cache.get(category) {
            return Ok(meta);
        }
        let meta = TokenMetadata {
            category: *category,
            decimals: self.provider.decimals(category)?,
            symbol: self.provider.symbol(category)?,
            name: self.provider.name(category)?,
            icon_url: self.provider.icon_url(category)?,
        };
        if meta.decimals.is_some() {
            self.cache.insert(*category, meta.clone());
        } else {
            log::debug!("token {category} has no decimals yet, not caching");
        }
        Ok(meta)
    }

    /// Decimals for `category`. Never defaults.
    pub fn decimals(&self, category: &TokenCategory) -> Result<u8> {
        self.metadata(category)?
            .decimals
            .ok_or(Error::DecimalsNotInitialized(*category))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::StaticMetadata;

    fn info(meta: StaticMetadata) -> TokenInfo {
        TokenInfo::new(
            Arc::new(meta),
            Arc::new(TtlCache::new(Duration::from_secs(60))),
        )
    }

    #[test]
    fn known_decimals() {
        let cat = TokenCategory([1; 32]);
        let info = info(StaticMetadata::default().with_token(cat, 2, "TOK"));
        assert_eq!(info.decimals(&cat).unwrap(), 2);
        assert_eq!(info.metadata(&cat).unwrap().symbol.as_deref(), Some("TOK"));
    }

    #[test]
    fn unknown_decimals_is_an_error() {
        let cat = TokenCategory([2; 32]);
        let info = info(StaticMetadata::default());
        assert!(matches!(
            info.decimals(&cat),
            Err(Error::DecimalsNotInitialized(c)) if c == cat
        ));
    }

    #[test]
    fn lookups_are_cached() {
        let cat = TokenCategory([3; 32]);
        let meta = StaticMetadata::default().with_token(cat, 8, "X");
        let calls = meta.calls();
        let info = info(meta);
        info.decimals(&cat).unwrap();
        info.decimals(&cat).unwrap();
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
