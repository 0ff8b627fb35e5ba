use serde::{Deserialize, Serialize};

use crate::address::CashAddress;
use crate::amm_pool::params::OwnerPkh;
use crate::error::Result;

/// A registered pool owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub pkh: OwnerPkh,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<CashAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl RegistryEntry {
    pub fn new(pkh: OwnerPkh) -> Self {
        Self {
            pkh,
            address: None,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Source of registered pool owners, in registration order.
///
/// Persistence lives outside this crate; implementations wrap whatever
/// store the host application uses.
pub trait PoolRegistry: Send + Sync {
    fn list_owners(&self) -> Result<Vec<RegistryEntry>>;
}
