// liquidity/src/pool.rs

use crate::curve::{Curve, CurveParams, CurveType};
use crate::reserves::ReserveLedger;
use crate::{LiquidityError, LiquidityResult};
use ledger::{Address, Amount, AssetId, MintAuthority, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a pool: an ordered asset pair plus its curve family
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey {
    asset_a: AssetId,
    asset_b: AssetId,
    curve_type: CurveType,
}

impl PoolKey {
    /// Create a key; `asset_a` must sort strictly before `asset_b`
    pub fn new(asset_a: AssetId, asset_b: AssetId, curve_type: CurveType) -> LiquidityResult<Self> {
        if asset_a == asset_b {
            return Err(LiquidityError::IdenticalAssets(asset_a));
        }
        if asset_a > asset_b {
            return Err(LiquidityError::UnorderedPair { asset_a, asset_b });
        }
        Ok(Self {
            asset_a,
            asset_b,
            curve_type,
        })
    }

    /// Create a key from a pair given in any order
    pub fn sorted(x: AssetId, y: AssetId, curve_type: CurveType) -> LiquidityResult<Self> {
        if x <= y {
            Self::new(x, y, curve_type)
        } else {
            Self::new(y, x, curve_type)
        }
    }

    pub fn asset_a(&self) -> &AssetId {
        &self.asset_a
    }

    pub fn asset_b(&self) -> &AssetId {
        &self.asset_b
    }

    pub fn curve_type(&self) -> CurveType {
        self.curve_type
    }

    pub fn contains(&self, asset: &AssetId) -> bool {
        &self.asset_a == asset || &self.asset_b == asset
    }

    /// Ledger account holding the pool's assets
    pub fn custody_address(&self) -> Address {
        Address::derive(format!("pool:{}", self).as_bytes())
    }

    /// Asset id of the pool's share token
    pub fn share_asset(&self) -> AssetId {
        AssetId::new(format!("LP-{}-{}-{}", self.asset_a, self.asset_b, self.curve_type))
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.asset_a, self.asset_b, self.curve_type)
    }
}

/// Mutable bookkeeping attached to a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetadata {
    /// Account that created the pool
    pub creator: Address,
    /// Receives protocol-fee shares
    pub fee_recipient: Address,
    /// Whether protocol fees are collected
    pub fee_on: bool,
    /// Invariant after the last liquidity event (0 when fees are off)
    pub invariant_checkpoint: u128,
    /// Asset A held by the pool as of the last settle
    pub internal_balance_a: Amount,
    /// Asset B held by the pool as of the last settle
    pub internal_balance_b: Amount,
    /// Re-entrancy guard
    pub locked: bool,
    /// Protocol-fee shares minted over the pool's lifetime
    pub accrued_fee_shares: Amount,
}

impl PoolMetadata {
    pub fn new(creator: Address, fee_recipient: Address, fee_on: bool) -> Self {
        Self {
            creator,
            fee_recipient,
            fee_on,
            invariant_checkpoint: 0,
            internal_balance_a: 0,
            internal_balance_b: 0,
            locked: false,
            accrued_fee_shares: 0,
        }
    }
}

/// A liquidity pool
#[derive(Debug)]
pub struct Pool {
    key: PoolKey,
    params: CurveParams,
    pub(crate) reserves: ReserveLedger,
    pub(crate) share_supply: Amount,
    pub(crate) metadata: PoolMetadata,
    authority: MintAuthority,
    custody: Address,
}

impl Pool {
    pub(crate) fn new(
        key: PoolKey,
        params: CurveParams,
        reserves: ReserveLedger,
        metadata: PoolMetadata,
        authority: MintAuthority,
    ) -> Self {
        let custody = key.custody_address();
        Self {
            key,
            params,
            reserves,
            share_supply: 0,
            metadata,
            authority,
            custody,
        }
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn params(&self) -> &CurveParams {
        &self.params
    }

    pub fn curve(&self) -> &dyn Curve {
        self.params.curve()
    }

    pub fn reserves(&self) -> &ReserveLedger {
        &self.reserves
    }

    /// `(reserve_a, reserve_b, last_update_time)`
    pub fn get_reserves(&self) -> (Amount, Amount, Timestamp) {
        self.reserves.get()
    }

    pub fn share_supply(&self) -> Amount {
        self.share_supply
    }

    pub fn metadata(&self) -> &PoolMetadata {
        &self.metadata
    }

    pub fn share_asset(&self) -> &AssetId {
        self.authority.asset()
    }

    pub fn custody(&self) -> &Address {
        &self.custody
    }

    pub fn is_locked(&self) -> bool {
        self.metadata.locked
    }

    pub(crate) fn authority(&self) -> &MintAuthority {
        &self.authority
    }

    /// Reserves oriented so that `asset_in` comes first
    pub fn oriented_reserves(&self, asset_in: &AssetId) -> LiquidityResult<(Amount, Amount)> {
        let (reserve_a, reserve_b, _) = self.reserves.get();
        if asset_in == self.key.asset_a() {
            Ok((reserve_a, reserve_b))
        } else if asset_in == self.key.asset_b() {
            Ok((reserve_b, reserve_a))
        } else {
            Err(LiquidityError::AssetNotInPool(asset_in.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PoolKey {
        PoolKey::new("BTC".into(), "USDC".into(), CurveType::ConstantProduct).unwrap()
    }

    #[test]
    fn test_key_requires_order() {
        assert!(matches!(
            PoolKey::new("USDC".into(), "BTC".into(), CurveType::Stable),
            Err(LiquidityError::UnorderedPair { .. })
        ));
        assert!(matches!(
            PoolKey::new("BTC".into(), "BTC".into(), CurveType::Stable),
            Err(LiquidityError::IdenticalAssets(_))
        ));
        let sorted = PoolKey::sorted("USDC".into(), "BTC".into(), CurveType::ConstantProduct).unwrap();
        assert_eq!(sorted, key());
    }

    #[test]
    fn test_curve_type_distinguishes_pools() {
        let stable = PoolKey::new("BTC".into(), "USDC".into(), CurveType::Stable).unwrap();
        assert_ne!(stable, key());
        assert_ne!(stable.custody_address(), key().custody_address());
        assert_ne!(stable.share_asset(), key().share_asset());
    }

    #[test]
    fn test_display_and_share_asset() {
        assert_eq!(key().to_string(), "BTC/USDC:constant_product");
        assert_eq!(key().share_asset().name(), "LP-BTC-USDC-constant_product");
        assert!(key().contains(&"USDC".into()));
        assert!(!key().contains(&"ETH".into()));
    }
}
