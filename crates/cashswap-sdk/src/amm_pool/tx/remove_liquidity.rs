use serde::{Deserialize, Serialize};

use crate::address::CashAddress;
use crate::config::TxPolicy;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::template::{OperationType, TemplateBuilder, TxOutput};
use crate::utxo::Utxo;

use super::super::contract::PoolContract;
use super::super::math::{PoolReserves, compute_percentage_withdrawal, compute_withdrawal};
use super::super::unlock::UnlockFunction;
use super::add_liquidity::LiquidityChange;
use super::super::params::Pool;
use super::{check_owner, check_pool_contract, pool_output};

/// How much to take out of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawAmount {
    /// Close the pool.
    All,
    /// Percentage of the BCH reserve, 1..=100.
    Percentage(u8),
    /// Exact satoshis; tokens follow proportionally.
    Bch(u64),
}

/// Parameters for a remove-liquidity transaction.
pub struct RemoveLiquidityParams {
    /// Current pool state (spent as input 0).
    pub pool: Pool,
    /// Owner's P2PKH address; must match the pool owner.
    pub owner_address: CashAddress,
    pub amount: WithdrawAmount,
    /// Owner UTXOs paying the miner fee.
    pub owner_utxos: Vec<Utxo>,
    pub policy: TxPolicy,
}

/// Build a remove-liquidity template.
///
/// Input 0: pool (`removeLiquidity`). Inputs 1+: owner UTXOs for the fee.
/// Partial: output 0 is the pool with reduced reserves.
/// Full: no pool output.
/// The withdrawn tokens travel in an output carrying `dust_limit` sats taken
/// from the withdrawn BCH; the rest of the BCH goes to the owner's plain
/// address.
pub fn build_remove_liquidity(
    contract: &PoolContract,
    network: Network,
    params: &RemoveLiquidityParams,
) -> Result<LiquidityChange> {
    let pool = &params.pool;
    check_pool_contract(contract, pool, network)?;
    check_owner(&params.owner_address, pool.owner_pkh)?;

    let reserves = pool.reserves();
    let dust = params.policy.dust_limit;

    let withdrawal = match params.amount {
        WithdrawAmount::All | WithdrawAmount::Percentage(100) => reserves,
        WithdrawAmount::Percentage(pct) => compute_percentage_withdrawal(&reserves, pct)?,
        WithdrawAmount::Bch(bch) => compute_withdrawal(&reserves, bch)?,
    };
    let closing = withdrawal == reserves;

    let remaining = PoolReserves::new(
        reserves.bch - withdrawal.bch,
        reserves.tokens - withdrawal.tokens,
    );
    if !closing {
        if remaining.bch < dust {
            return Err(Error::InvalidAmount(format!(
                "pool would keep {} sats, below the dust limit; withdraw all instead",
                remaining.bch
            )));
        }
        if remaining.tokens == 0 {
            return Err(Error::InvalidAmount(
                "pool would keep no tokens; withdraw all instead".into(),
            ));
        }
    }

    let token_carrier = if withdrawal.tokens > 0 { dust } else { 0 };
    let owner_bch = withdrawal
        .bch
        .checked_sub(token_carrier)
        .filter(|v| *v >= dust)
        .ok_or_else(|| {
            Error::InvalidAmount(format!(
                "withdrawal of {} sats cannot cover the owner outputs",
                withdrawal.bch
            ))
        })?;

    let pool_out =
        (!closing).then(|| pool_output(contract, network, pool.token_category, remaining));
    let mut builder = TemplateBuilder::new(
        OperationType::RemoveLiquidity,
        pool.owner_pkh,
        pool.token_category,
        params.owner_address.clone(),
        params.policy,
        Some((pool.utxo.clone(), UnlockFunction::RemoveLiquidity)),
        pool_out,
    );
    builder.add_output(TxOutput::bch(params.owner_address.to_plain(), owner_bch));
    if withdrawal.tokens > 0 {
        builder.add_output(TxOutput::token(
            params.owner_address.to_token_aware(),
            token_carrier,
            pool.token_category,
            withdrawal.tokens,
        ));
    }
    builder.fund_from(&params.owner_utxos)?;

    Ok(LiquidityChange {
        template: builder.finish()?,
        bch_amount: withdrawal.bch,
        token_amount: withdrawal.tokens,
        new_reserves: (!closing).then_some(remaining),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm_pool::params::OwnerPkh;
    use crate::error::Asset;
    use crate::template::InputRole;
    use crate::testing::{bch_utxo, test_address, test_pool, test_template};

    const BCH: u64 = 100_000_000;

    fn test_params(amount: WithdrawAmount) -> RemoveLiquidityParams {
        RemoveLiquidityParams {
            pool: test_pool(1, 2 * BCH, 500),
            owner_address: test_address(1),
            amount,
            owner_utxos: vec![bch_utxo(7, 0, 10_000)],
            policy: TxPolicy::default(),
        }
    }

    fn contract() -> PoolContract {
        PoolContract::new(OwnerPkh([1; 20]), &test_template())
    }

    #[test]
    fn withdraw_all_closes_pool() {
        let r = build_remove_liquidity(
            &contract(),
            Network::Mainnet,
            &test_params(WithdrawAmount::All),
        )
        .unwrap();
        let t = &r.template;
        assert_eq!(t.inputs[0].role, InputRole::Pool(UnlockFunction::RemoveLiquidity));
        assert_eq!(t.outputs[0].satoshis, 2 * BCH - 546);
        assert!(t.outputs[0].token.is_none());
        assert_eq!(t.outputs[1].satoshis, 546);
        assert_eq!(t.outputs[1].token.as_ref().unwrap().amount, 500);
        assert!(t.outputs[1].address.is_token_aware());
        let pool_addr = contract().token_address(Network::Mainnet);
        assert!(t.outputs.iter().all(|o| o.address != pool_addr));
        assert_eq!(r.new_reserves, None);
        // fee from the owner UTXO: 10_000 - 3_000 change
        assert_eq!(t.outputs[2].satoshis, 7_000);
    }

    #[test]
    fn withdraw_percentage() {
        let r = build_remove_liquidity(
            &contract(),
            Network::Mainnet,
            &test_params(WithdrawAmount::Percentage(25)),
        )
        .unwrap();
        assert_eq!(r.bch_amount, BCH / 2);
        assert_eq!(r.token_amount, 125);
        assert_eq!(r.new_reserves, Some(PoolReserves::new(3 * BCH / 2, 375)));
        let t = &r.template;
        assert_eq!(t.outputs[0].satoshis, 3 * BCH / 2);
        assert_eq!(t.outputs[1].satoshis, BCH / 2 - 546);
        assert_eq!(t.outputs[2].token.as_ref().unwrap().amount, 125);
    }

    #[test]
    fn withdraw_percentage_of_uneven_reserves() {
        let mut params = test_params(WithdrawAmount::Percentage(33));
        params.pool = test_pool(1, 199_999_999, 1000);
        let r = build_remove_liquidity(&contract(), Network::Mainnet, &params).unwrap();
        assert_eq!(r.bch_amount, 65_999_999);
        assert_eq!(r.token_amount, 330);
        assert_eq!(r.new_reserves, Some(PoolReserves::new(134_000_000, 670)));
        assert_eq!(r.template.outputs[2].token.as_ref().unwrap().amount, 330);
    }

    #[test]
    fn hundred_percent_is_full_withdrawal() {
        let r = build_remove_liquidity(
            &contract(),
            Network::Mainnet,
            &test_params(WithdrawAmount::Percentage(100)),
        )
        .unwrap();
        assert_eq!(r.new_reserves, None);
    }

    #[test]
    fn partial_leaving_dust_rejected() {
        let err = build_remove_liquidity(
            &contract(),
            Network::Mainnet,
            &test_params(WithdrawAmount::Bch(2 * BCH - 100)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }

    #[test]
    fn withdrawal_too_small_for_outputs() {
        let mut params = test_params(WithdrawAmount::Bch(600));
        params.pool = test_pool(1, 2 * BCH, 1_000_000_000);
        // 3000 tokens need a 546-sat carrier, leaving 54 sats for the owner
        assert!(matches!(
            build_remove_liquidity(&contract(), Network::Mainnet, &params),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn fee_requires_owner_funds() {
        let mut params = test_params(WithdrawAmount::All);
        params.owner_utxos.clear();
        assert!(matches!(
            build_remove_liquidity(&contract(), Network::Mainnet, &params),
            Err(Error::InsufficientBalance {
                asset: Asset::Bch,
                ..
            })
        ));
    }

    #[test]
    fn owner_only() {
        let mut params = test_params(WithdrawAmount::All);
        params.owner_address = test_address(3);
        assert!(matches!(
            build_remove_liquidity(&contract(), Network::Mainnet, &params),
            Err(Error::NotPoolOwner)
        ));
    }

    #[test]
    fn invalid_percentage() {
        assert!(build_remove_liquidity(
            &contract(),
            Network::Mainnet,
            &test_params(WithdrawAmount::Percentage(0)),
        )
        .is_err());
    }
}
