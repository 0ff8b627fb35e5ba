use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Contract clause invoked when spending a pool UTXO.
///
/// The string forms are the clause names compiled into the contract and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnlockFunction {
    SwapExactInput,
    SwapExactOutput,
    AddLiquidity,
    RemoveLiquidity,
}

impl UnlockFunction {
    pub const ALL: [UnlockFunction; 4] = [
        UnlockFunction::SwapExactInput,
        UnlockFunction::SwapExactOutput,
        UnlockFunction::AddLiquidity,
        UnlockFunction::RemoveLiquidity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UnlockFunction::SwapExactInput => "swapExactInput",
            UnlockFunction::SwapExactOutput => "swapExactOutput",
            UnlockFunction::AddLiquidity => "addLiquidity",
            UnlockFunction::RemoveLiquidity => "removeLiquidity",
        }
    }

    /// Function selector pushed before the redeem script.
    pub fn selector(self) -> u64 {
        match self {
            UnlockFunction::SwapExactInput => 0,
            UnlockFunction::SwapExactOutput => 1,
            UnlockFunction::AddLiquidity => 2,
            UnlockFunction::RemoveLiquidity => 3,
        }
    }
}

impl std::fmt::Display for UnlockFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UnlockFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| Error::UnsupportedUnlockFunction(s.to_string()))
    }
}

impl TryFrom<String> for UnlockFunction {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<UnlockFunction> for String {
    fn from(f: UnlockFunction) -> Self {
        f.as_str().to_string()
    }
}
