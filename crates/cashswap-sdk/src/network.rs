use serde::{Deserialize, Serialize};

/// Bitcoin Cash networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Chipnet,
    Regtest,
}

impl Network {
    pub fn is_mainnet(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// CashAddr human-readable prefix.
    pub fn cashaddr_prefix(self) -> &'static str {
        match self {
            Network::Mainnet => "bitcoincash",
            Network::Chipnet => "bchtest",
            Network::Regtest => "bchreg",
        }
    }

    pub fn from_cashaddr_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "bitcoincash" => Some(Network::Mainnet),
            "bchtest" => Some(Network::Chipnet),
            "bchreg" => Some(Network::Regtest),
            _ => None,
        }
    }

    pub fn default_electrum_urls(self) -> &'static [&'static str] {
        match self {
            Network::Mainnet => &[
                "ssl://bch.imaginary.cash:50002",
                "ssl://electroncash.de:50002",
            ],
            Network::Chipnet => &["ssl://chipnet.imaginary.cash:50002"],
            Network::Regtest => &["tcp://localhost:50001"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Chipnet => "chipnet",
            Network::Regtest => "regtest",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "bitcoincash" => Ok(Network::Mainnet),
            "chipnet" | "testnet" | "bchtest" => Ok(Network::Chipnet),
            "regtest" | "bchreg" => Ok(Network::Regtest),
            _ => Err(format!("invalid network: {}", s)),
        }
    }
}
