use crate::address::CashAddress;
use crate::config::TxPolicy;
use crate::error::{Error, Result};
use crate::network::Network;
use crate::template::{OperationType, TemplateBuilder, UnsignedTxTemplate};
use crate::utxo::{TokenCategory, Utxo};

use super::super::contract::PoolContract;
use super::super::math::{
    PoolReserves, check_price_deviation, derive_bch_amount, derive_token_amount,
};
use super::{check_owner, pool_output};

/// Parameters for a pool creation transaction.
pub struct PoolCreationParams {
    /// Owner's P2PKH address. Funds the pool and receives change.
    pub owner_address: CashAddress,
    /// Token the pool trades against BCH.
    pub token_category: TokenCategory,
    /// Initial BCH reserve. Derived from the market when omitted.
    pub bch_amount: Option<u64>,
    /// Initial token reserve. Derived from the market when omitted.
    pub token_amount: Option<u64>,
    /// Aggregate reserves of existing pools for this token, if any.
    pub market: Option<PoolReserves>,
    /// Allowed distance from the market price when both amounts are given.
    pub price_deviation_tolerance_bps: u64,
    /// Owner's spendable UTXOs.
    pub owner_utxos: Vec<Utxo>,
    pub policy: TxPolicy,
}

/// A pool creation template plus the resolved initial reserves.
#[derive(Debug, Clone)]
pub struct PoolCreation {
    pub template: UnsignedTxTemplate,
    pub reserves: PoolReserves,
    pub contract_address: CashAddress,
}

fn resolve_amounts(params: &PoolCreationParams) -> Result<PoolReserves> {
    let reserves = match (&params.market, params.bch_amount, params.token_amount) {
        (_, None, None) => {
            return Err(Error::InvalidAmount(
                "a BCH or token amount is required".into(),
            ));
        }
        (None, Some(bch), Some(tokens)) => PoolReserves::new(bch, tokens),
        (None, _, _) => {
            return Err(Error::InvalidAmount(
                "both amounts are required when no market exists".into(),
            ));
        }
        (Some(market), Some(bch), None) => {
            PoolReserves::new(bch, derive_token_amount(bch, market)?)
        }
        (Some(market), None, Some(tokens)) => {
            PoolReserves::new(derive_bch_amount(tokens, market)?, tokens)
        }
        (Some(market), Some(bch), Some(tokens)) => {
            let proposed = PoolReserves::new(bch, tokens);
            check_price_deviation(&proposed, market, params.price_deviation_tolerance_bps)?;
            proposed
        }
    };

    if reserves.tokens == 0 {
        return Err(Error::InvalidAmount("initial token reserve is zero".into()));
    }
    if reserves.bch < params.policy.dust_limit {
        return Err(Error::InvalidAmount(format!(
            "initial BCH reserve {} is below the dust limit",
            reserves.bch
        )));
    }
    Ok(reserves)
}

/// Build a pool creation template.
///
/// Inputs: owner funding only. Output 0: the new pool at the token-aware
/// contract address. Then token change, BCH change.
pub fn build_pool_creation(
    contract: &PoolContract,
    network: Network,
    params: &PoolCreationParams,
) -> Result<PoolCreation> {
    check_owner(&params.owner_address, contract.owner_pkh())?;
    let reserves = resolve_amounts(params)?;

    let mut builder = TemplateBuilder::new(
        OperationType::CreatePool,
        contract.owner_pkh(),
        params.token_category,
        params.owner_address.clone(),
        params.policy,
        None,
        Some(pool_output(contract, network, params.token_category, reserves)),
    );
    builder.fund_from(&params.owner_utxos)?;

    Ok(PoolCreation {
        template: builder.finish()?,
        reserves,
        contract_address: contract.address(network),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amm_pool::params::OwnerPkh;
    use crate::error::Asset;
    use crate::testing::{TEST_CATEGORY, bch_utxo, test_address, test_template, token_utxo};

    const BCH: u64 = 100_000_000;

    fn test_params() -> PoolCreationParams {
        PoolCreationParams {
            owner_address: test_address(1),
            token_category: TEST_CATEGORY,
            bch_amount: Some(BCH),
            token_amount: Some(100),
            market: None,
            price_deviation_tolerance_bps: 100,
            owner_utxos: vec![bch_utxo(1, 0, 2 * BCH), token_utxo(2, 0, 1000, 500)],
            policy: TxPolicy::default(),
        }
    }

    fn contract() -> PoolContract {
        PoolContract::new(OwnerPkh([1; 20]), &test_template())
    }

    #[test]
    fn creation_output_layout() {
        let c = contract();
        let result = build_pool_creation(&c, Network::Mainnet, &test_params()).unwrap();
        let t = &result.template;
        assert_eq!(t.outputs[0].address, c.token_address(Network::Mainnet));
        assert_eq!(t.outputs[0].satoshis, BCH);
        assert_eq!(t.outputs[0].token.as_ref().unwrap().amount, 100);
        // token change (400) then BCH change
        assert_eq!(t.outputs[1].token.as_ref().unwrap().amount, 400);
        assert!(t.outputs[2].token.is_none());
        assert!(t.pool_input().is_none());
        assert_eq!(t.implied_fee().unwrap(), 3000);
    }

    #[test]
    fn creation_derives_from_market() {
        let mut params = test_params();
        params.market = Some(PoolReserves::new(BCH, 100));
        params.token_amount = None;
        params.bch_amount = Some(BCH / 2);
        let r = build_pool_creation(&contract(), Network::Mainnet, &params).unwrap();
        assert_eq!(r.reserves, PoolReserves::new(BCH / 2, 50));

        params.bch_amount = None;
        params.token_amount = Some(30);
        let r = build_pool_creation(&contract(), Network::Mainnet, &params).unwrap();
        assert_eq!(r.reserves, PoolReserves::new(30_000_000, 30));
    }

    #[test]
    fn creation_rejects_price_deviation() {
        let mut params = test_params();
        params.market = Some(PoolReserves::new(BCH, 100));
        params.bch_amount = Some(105_000_000);
        params.token_amount = Some(100);
        assert!(matches!(
            build_pool_creation(&contract(), Network::Mainnet, &params),
            Err(Error::PriceDeviationTooHigh { .. })
        ));

        params.bch_amount = Some(100_500_000);
        assert!(build_pool_creation(&contract(), Network::Mainnet, &params).is_ok());
    }

    #[test]
    fn creation_requires_both_amounts_without_market() {
        let mut params = test_params();
        params.token_amount = None;
        assert!(matches!(
            build_pool_creation(&contract(), Network::Mainnet, &params),
            Err(Error::InvalidAmount(_))
        ));
        params.bch_amount = None;
        assert!(build_pool_creation(&contract(), Network::Mainnet, &params).is_err());
    }

    #[test]
    fn creation_rejects_foreign_owner() {
        let mut params = test_params();
        params.owner_address = test_address(2);
        assert!(matches!(
            build_pool_creation(&contract(), Network::Mainnet, &params),
            Err(Error::NotPoolOwner)
        ));
    }

    #[test]
    fn creation_insufficient_tokens() {
        let mut params = test_params();
        params.token_amount = Some(501);
        assert!(matches!(
            build_pool_creation(&contract(), Network::Mainnet, &params),
            Err(Error::InsufficientBalance {
                asset: Asset::Token,
                ..
            })
        ));
    }
}
