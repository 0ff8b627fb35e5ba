pub mod cache;
pub mod metadata;
pub mod registry;
pub mod service;

pub use cache::TtlCache;
pub use metadata::{TokenInfo, TokenMetadata, TokenMetadataProvider};
pub use registry::{PoolRegistry, RegistryEntry};
pub use service::PoolDiscovery;
