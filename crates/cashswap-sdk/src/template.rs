//! Unsigned transaction templates.
//!
//! Every builder produces an [`UnsignedTxTemplate`] through
//! [`TemplateBuilder`], which fixes the positional contract the pool
//! covenant checks:
//!
//! - input 0 is the pool UTXO whenever the pool is spent,
//! - output 0 is the updated (or newly created) pool whenever one is produced,
//! - user funding inputs follow the pool input,
//! - operation outputs follow the pool output, then token change, then BCH
//!   change.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::address::CashAddress;
use crate::amm_pool::math::checked_sum;
use crate::amm_pool::params::OwnerPkh;
use crate::amm_pool::unlock::UnlockFunction;
use crate::config::TxPolicy;
use crate::error::{Asset, Error, Result};
use crate::utxo::{TokenCategory, TokenData, Utxo};

/// Who unlocks an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRole {
    /// Spent by the user's P2PKH key.
    User,
    /// Spent through the pool contract clause.
    Pool(UnlockFunction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoInput {
    pub utxo: Utxo,
    pub role: InputRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: CashAddress,
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenData>,
}

impl TxOutput {
    pub fn bch(address: CashAddress, satoshis: u64) -> Self {
        Self {
            address,
            satoshis,
            token: None,
        }
    }

    pub fn token(address: CashAddress, satoshis: u64, category: TokenCategory, amount: u64) -> Self {
        Self {
            address,
            satoshis,
            token: Some(TokenData::fungible(category, amount)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    CreatePool,
    AddLiquidity,
    RemoveLiquidity,
    Swap,
}

/// An unsigned transaction, ready for the signing serializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTxTemplate {
    pub inputs: Vec<UtxoInput>,
    pub outputs: Vec<TxOutput>,
    pub pool_owner_pkh: OwnerPkh,
    pub token_category: TokenCategory,
    pub miner_fee: u64,
    pub operation: OperationType,
    /// Address whose key signs the user inputs and receives change.
    pub owner_address: CashAddress,
}

impl UnsignedTxTemplate {
    pub fn pool_input(&self) -> Option<(&UtxoInput, UnlockFunction)> {
        self.inputs.iter().find_map(|i| match i.role {
            InputRole::Pool(f) => Some((i, f)),
            InputRole::User => None,
        })
    }

    pub fn total_input_sats(&self) -> Result<u64> {
        checked_sum(self.inputs.iter().map(|i| i.utxo.satoshis))
    }

    pub fn total_output_sats(&self) -> Result<u64> {
        checked_sum(self.outputs.iter().map(|o| o.satoshis))
    }

    /// Fee actually paid: inputs minus outputs. At least `miner_fee`; sub-dust
    /// change folds into it.
    pub fn implied_fee(&self) -> Result<u64> {
        Ok(self
            .total_input_sats()?
            .saturating_sub(self.total_output_sats()?))
    }
}

/// Satoshi and token amounts the user must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FundingNeed {
    pub sats: u64,
    pub tokens: u64,
}

/// Pick user UTXOs covering `need`.
///
/// Tokens are covered first from fungible-only UTXOs of `category`, largest
/// first; their satoshis count toward the BCH need. The remaining BCH comes
/// from token-free UTXOs, largest first. If the token selection overshoots,
/// a token change output will be created and `dust_limit` more satoshis are
/// required to carry it. NFT-bearing and foreign-category UTXOs are never
/// selected.
pub fn select_funding(
    utxos: &[Utxo],
    category: &TokenCategory,
    need: FundingNeed,
    dust_limit: u64,
) -> Result<Vec<Utxo>> {
    let mut selected: Vec<Utxo> = Vec::new();
    let mut token_sum: u64 = 0;
    let mut sats_sum: u64 = 0;

    if need.tokens > 0 {
        let mut candidates: Vec<&Utxo> = utxos
            .iter()
            .filter(|u| u.fungible_amount(category) > 0)
            .collect();
        candidates.sort_by(|a, b| b.fungible_amount(category).cmp(&a.fungible_amount(category)));
        let available = checked_sum(candidates.iter().map(|u| u.fungible_amount(category)))?;

        for utxo in candidates {
            if token_sum >= need.tokens {
                break;
            }
            token_sum = token_sum
                .checked_add(utxo.fungible_amount(category))
                .ok_or(Error::ArithmeticOverflow)?;
            sats_sum = sats_sum
                .checked_add(utxo.satoshis)
                .ok_or(Error::ArithmeticOverflow)?;
            selected.push(utxo.clone());
        }
        if token_sum < need.tokens {
            return Err(Error::InsufficientBalance {
                asset: Asset::Token,
                required: need.tokens,
                available,
            });
        }
    }

    let change_dust = if token_sum > need.tokens { dust_limit } else { 0 };
    let sats_needed = need
        .sats
        .checked_add(change_dust)
        .ok_or(Error::ArithmeticOverflow)?;

    let mut candidates: Vec<&Utxo> = utxos.iter().filter(|u| u.is_pure_bch()).collect();
    candidates.sort_by(|a, b| b.satoshis.cmp(&a.satoshis));
    for utxo in candidates {
        if sats_sum >= sats_needed {
            break;
        }
        sats_sum = sats_sum
            .checked_add(utxo.satoshis)
            .ok_or(Error::ArithmeticOverflow)?;
        selected.push(utxo.clone());
    }
    if sats_sum < sats_needed {
        return Err(Error::InsufficientBalance {
            asset: Asset::Bch,
            required: sats_needed,
            available: sats_sum,
        });
    }

    Ok(selected)
}

/// Assembles a template with the pool leg pinned to index 0.
pub struct TemplateBuilder {
    policy: TxPolicy,
    operation: OperationType,
    pool_owner_pkh: OwnerPkh,
    category: TokenCategory,
    owner_address: CashAddress,
    inputs: Vec<UtxoInput>,
    outputs: Vec<TxOutput>,
}

impl TemplateBuilder {
    /// Start a template. The pool input and pool output, when given, become
    /// input 0 and output 0; nothing added later can precede them.
    pub fn new(
        operation: OperationType,
        pool_owner_pkh: OwnerPkh,
        category: TokenCategory,
        owner_address: CashAddress,
        policy: TxPolicy,
        pool_input: Option<(Utxo, UnlockFunction)>,
        pool_output: Option<TxOutput>,
    ) -> Self {
        let inputs = pool_input
            .map(|(utxo, f)| UtxoInput {
                utxo,
                role: InputRole::Pool(f),
            })
            .into_iter()
            .collect();
        Self {
            policy,
            operation,
            pool_owner_pkh,
            category,
            owner_address,
            inputs,
            outputs: pool_output.into_iter().collect(),
        }
    }

    pub fn add_output(&mut self, output: TxOutput) -> &mut Self {
        self.outputs.push(output);
        self
    }

    fn token_totals(&self) -> Result<(u64, u64)> {
        let tokens_in = checked_sum(
            self.inputs
                .iter()
                .map(|i| i.utxo.fungible_amount(&self.category)),
        )?;
        let tokens_out = checked_sum(
            self.outputs
                .iter()
                .filter_map(|o| o.token.as_ref())
                .filter(|t| t.category == self.category)
                .map(|t| t.amount),
        )?;
        Ok((tokens_in, tokens_out))
    }

    /// What the user still has to bring in.
    pub fn funding_need(&self) -> Result<FundingNeed> {
        let (tokens_in, tokens_out) = self.token_totals()?;
        let sats_in = checked_sum(self.inputs.iter().map(|i| i.utxo.satoshis))?;
        let sats_out = checked_sum(self.outputs.iter().map(|o| o.satoshis))?;
        let change_dust = if tokens_in > tokens_out {
            self.policy.dust_limit
        } else {
            0
        };
        let required = sats_out
            .checked_add(self.policy.miner_fee)
            .and_then(|v| v.checked_add(change_dust))
            .ok_or(Error::ArithmeticOverflow)?;
        Ok(FundingNeed {
            sats: required.saturating_sub(sats_in),
            tokens: tokens_out.saturating_sub(tokens_in),
        })
    }

    /// Select and append funding inputs from the user's wallet.
    pub fn fund_from(&mut self, wallet: &[Utxo]) -> Result<&mut Self> {
        let need = self.funding_need()?;
        if need.sats == 0 && need.tokens == 0 {
            return Ok(self);
        }
        let selected = select_funding(wallet, &self.category, need, self.policy.dust_limit)?;
        self.inputs.extend(selected.into_iter().map(|utxo| UtxoInput {
            utxo,
            role: InputRole::User,
        }));
        Ok(self)
    }

    /// Append change outputs and check conservation.
    pub fn finish(mut self) -> Result<UnsignedTxTemplate> {
        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.utxo.outpoint()) {
                return Err(Error::InvalidTemplate(format!(
                    "outpoint {}:{} spent twice",
                    input.utxo.txid, input.utxo.vout
                )));
            }
        }

        let (tokens_in, tokens_out) = self.token_totals()?;
        if tokens_in < tokens_out {
            return Err(Error::InsufficientBalance {
                asset: Asset::Token,
                required: tokens_out,
                available: tokens_in,
            });
        }
        let token_change = tokens_in - tokens_out;
        if token_change > 0 {
            let out = TxOutput::token(
                self.owner_address.to_token_aware(),
                self.policy.dust_limit,
                self.category,
                token_change,
            );
            self.outputs.push(out);
        }

        let sats_in = checked_sum(self.inputs.iter().map(|i| i.utxo.satoshis))?;
        let sats_out = checked_sum(self.outputs.iter().map(|o| o.satoshis))?;
        let required = sats_out
            .checked_add(self.policy.miner_fee)
            .ok_or(Error::ArithmeticOverflow)?;
        if sats_in < required {
            return Err(Error::InsufficientBalance {
                asset: Asset::Bch,
                required,
                available: sats_in,
            });
        }
        let change = sats_in - required;
        if change > self.policy.dust_limit {
            self.outputs
                .push(TxOutput::bch(self.owner_address.to_plain(), change));
        } else if change > 0 {
            log::debug!("dropping {change} sats of sub-dust change to the miner fee");
        }

        for (i, out) in self.outputs.iter().enumerate() {
            if out.satoshis < self.policy.dust_limit {
                return Err(Error::InvalidTemplate(format!(
                    "output {i} carries {} sats, below dust limit {}",
                    out.satoshis, self.policy.dust_limit
                )));
            }
        }

        Ok(UnsignedTxTemplate {
            inputs: self.inputs,
            outputs: self.outputs,
            pool_owner_pkh: self.pool_owner_pkh,
            token_category: self.category,
            miner_fee: self.policy.miner_fee,
            operation: self.operation,
            owner_address: self.owner_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::utxo::{NftCapability, NftData, Txid};

    fn category() -> TokenCategory {
        TokenCategory([0xcc; 32])
    }

    fn owner() -> CashAddress {
        CashAddress::p2pkh(Network::Mainnet, [0x0a; 20])
    }

    fn bch_utxo(id: u8, sats: u64) -> Utxo {
        Utxo {
            txid: Txid([id; 32]),
            vout: 0,
            satoshis: sats,
            token: None,
        }
    }

    fn token_utxo(id: u8, amount: u64) -> Utxo {
        Utxo {
            txid: Txid([id; 32]),
            vout: 1,
            satoshis: 1000,
            token: Some(TokenData::fungible(category(), amount)),
        }
    }

    fn builder() -> TemplateBuilder {
        TemplateBuilder::new(
            OperationType::Swap,
            OwnerPkh([1; 20]),
            category(),
            owner(),
            TxPolicy::default(),
            None,
            None,
        )
    }

    #[test]
    fn select_largest_bch_first() {
        let utxos = vec![bch_utxo(1, 1_000), bch_utxo(2, 50_000), bch_utxo(3, 20_000)];
        let picked = select_funding(
            &utxos,
            &category(),
            FundingNeed {
                sats: 30_000,
                tokens: 0,
            },
            546,
        )
        .unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].satoshis, 50_000);
    }

    #[test]
    fn select_tokens_then_bch() {
        let utxos = vec![bch_utxo(1, 10_000), token_utxo(2, 40), token_utxo(3, 100)];
        let picked = select_funding(
            &utxos,
            &category(),
            FundingNeed {
                sats: 5_000,
                tokens: 50,
            },
            546,
        )
        .unwrap();
        // 100-token UTXO covers the tokens; its 1000 sats + the BCH UTXO cover
        // 5000 + 546 dust for token change.
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].fungible_amount(&category()), 100);
        assert!(picked[1].is_pure_bch());
    }

    #[test]
    fn select_skips_nft_and_foreign_tokens() {
        let mut nft = token_utxo(1, 500);
        nft.token.as_mut().unwrap().nft = Some(NftData {
            capability: NftCapability::None,
            commitment: vec![],
        });
        let foreign = Utxo {
            token: Some(TokenData::fungible(TokenCategory([0xdd; 32]), 500)),
            ..token_utxo(2, 0)
        };
        let err = select_funding(
            &[nft, foreign, bch_utxo(3, 100_000)],
            &category(),
            FundingNeed { sats: 0, tokens: 1 },
            546,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBalance {
                asset: Asset::Token,
                required: 1,
                available: 0
            }
        ));
    }

    #[test]
    fn select_insufficient_bch() {
        let err = select_funding(
            &[bch_utxo(1, 1_000), bch_utxo(2, 2_000)],
            &category(),
            FundingNeed {
                sats: 5_000,
                tokens: 0,
            },
            546,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientBalance {
                asset: Asset::Bch,
                required: 5_000,
                available: 3_000
            }
        ));
    }

    #[test]
    fn select_reports_token_overflow() {
        let max_ft = i64::MAX as u64;
        let utxos = vec![token_utxo(1, max_ft), token_utxo(2, max_ft), token_utxo(3, max_ft)];
        assert!(matches!(
            select_funding(
                &utxos,
                &category(),
                FundingNeed { sats: 0, tokens: 1 },
                546,
            ),
            Err(Error::ArithmeticOverflow)
        ));
    }

    #[test]
    fn oversized_token_outputs_are_an_error() {
        let mut b = builder();
        for _ in 0..2 {
            b.add_output(TxOutput::token(owner(), 546, category(), u64::MAX / 2 + 1));
        }
        assert!(matches!(
            b.fund_from(&[bch_utxo(1, 10_000)]),
            Err(Error::ArithmeticOverflow)
        ));
    }

    #[test]
    fn pool_leg_is_index_zero() {
        let pool_utxo = Utxo {
            token: Some(TokenData::fungible(category(), 1_000)),
            ..bch_utxo(9, 1_000_000)
        };
        let pool_addr = CashAddress::p2sh32(Network::Mainnet, [5; 32]).to_token_aware();
        let mut b = TemplateBuilder::new(
            OperationType::Swap,
            OwnerPkh([1; 20]),
            category(),
            owner(),
            TxPolicy::default(),
            Some((pool_utxo, UnlockFunction::SwapExactInput)),
            Some(TxOutput::token(pool_addr.clone(), 1_010_000, category(), 910)),
        );
        b.add_output(TxOutput::token(owner().to_token_aware(), 546, category(), 90));
        b.fund_from(&[bch_utxo(1, 100_000)]).unwrap();
        let t = b.finish().unwrap();

        assert_eq!(t.inputs[0].role, InputRole::Pool(UnlockFunction::SwapExactInput));
        assert_eq!(t.inputs[1].role, InputRole::User);
        assert_eq!(t.outputs[0].address, pool_addr);
        assert_eq!(t.outputs.len(), 3);
        // 100_000 - 10_000 - 546 - 3000
        assert_eq!(t.outputs[2].satoshis, 86_454);
        assert_eq!(t.implied_fee().unwrap(), 3_000);
        assert!(t.pool_input().is_some());
    }

    #[test]
    fn change_at_dust_is_dropped() {
        let mut b = builder();
        b.add_output(TxOutput::bch(owner(), 10_000));
        let mut dropped = b;
        dropped.fund_from(&[bch_utxo(1, 10_000 + 3_000 + 546)]).unwrap();
        let t = dropped.finish().unwrap();
        assert_eq!(t.outputs.len(), 1);
        assert_eq!(t.implied_fee().unwrap(), 3_546);

        let mut kept = builder();
        kept.add_output(TxOutput::bch(owner(), 10_000));
        kept.fund_from(&[bch_utxo(1, 10_000 + 3_000 + 547)]).unwrap();
        let t = kept.finish().unwrap();
        assert_eq!(t.outputs.len(), 2);
        assert_eq!(t.outputs[1].satoshis, 547);
    }

    #[test]
    fn token_change_goes_to_token_aware_address() {
        let mut b = builder();
        b.add_output(TxOutput::token(owner().to_token_aware(), 546, category(), 30));
        b.fund_from(&[token_utxo(1, 100), bch_utxo(2, 50_000)]).unwrap();
        let t = b.finish().unwrap();
        let change = t
            .outputs
            .iter()
            .find(|o| o.token.as_ref().is_some_and(|tk| tk.amount == 70))
            .unwrap();
        assert!(change.address.is_token_aware());
        assert_eq!(change.satoshis, 546);
        assert!(!t.outputs.last().unwrap().address.is_token_aware());
    }

    #[test]
    fn rejects_sub_dust_output() {
        let mut b = builder();
        b.add_output(TxOutput::bch(owner(), 100));
        b.fund_from(&[bch_utxo(1, 50_000)]).unwrap();
        assert!(matches!(b.finish(), Err(Error::InvalidTemplate(_))));
    }

    #[test]
    fn rejects_outpoint_spent_twice() {
        let mut b = TemplateBuilder::new(
            OperationType::Swap,
            OwnerPkh([1; 20]),
            category(),
            owner(),
            TxPolicy::default(),
            Some((bch_utxo(1, 1_000), UnlockFunction::SwapExactInput)),
            None,
        );
        b.add_output(TxOutput::bch(owner(), 50_000));
        b.fund_from(&[bch_utxo(1, 60_000)]).unwrap();
        assert!(matches!(b.finish(), Err(Error::InvalidTemplate(_))));
    }

    #[test]
    fn template_json_roundtrip() {
        let mut b = builder();
        b.add_output(TxOutput::bch(owner(), 10_000));
        b.fund_from(&[bch_utxo(1, 20_000)]).unwrap();
        let t = b.finish().unwrap();
        let json = serde_json::to_string(&t).unwrap();
        let back: UnsignedTxTemplate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
