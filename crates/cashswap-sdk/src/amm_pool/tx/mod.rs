pub mod add_liquidity;
pub mod creation;
pub mod remove_liquidity;
pub mod swap;

use crate::address::CashAddress;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::template::TxOutput;
use crate::utxo::TokenCategory;

use super::contract::PoolContract;
use super::math::PoolReserves;
use super::params::{OwnerPkh, Pool};

/// Output 0 of every template that leaves a pool behind.
pub(crate) fn pool_output(
    contract: &PoolContract,
    network: Network,
    category: TokenCategory,
    reserves: PoolReserves,
) -> TxOutput {
    TxOutput::token(
        contract.token_address(network),
        reserves.bch,
        category,
        reserves.tokens,
    )
}

/// The pool must live at the contract instantiated for its owner.
pub(crate) fn check_pool_contract(contract: &PoolContract, pool: &Pool, network: Network) -> Result<()> {
    if contract.owner_pkh() != pool.owner_pkh
        || contract.address(network).locking_bytecode() != pool.contract_address.locking_bytecode()
    {
        return Err(Error::InvalidTemplate(format!(
            "pool {} is not at the contract address for its owner",
            pool.owner_pkh
        )));
    }
    Ok(())
}

/// Owner-only operations: the signing address must be the pool owner.
pub(crate) fn check_owner(address: &CashAddress, owner: OwnerPkh) -> Result<()> {
    let pkh = OwnerPkh::try_from(address).map_err(|_| Error::NotPoolOwner)?;
    if pkh != owner {
        return Err(Error::NotPoolOwner);
    }
    Ok(())
}
