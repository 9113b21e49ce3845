// liquidity/src/controller.rs

use crate::config::EngineConfig;
use crate::curve::{Curve, CurveParams, SwapCheck};
use crate::math::ArithmeticError;
use crate::pool::{Pool, PoolKey, PoolMetadata};
use crate::reserves::{ReserveLedger, DEFAULT_MAX_RESERVE};
use crate::{LiquidityError, LiquidityResult, MINIMUM_LIQUIDITY};
use ledger::{Address, Amount, AssetId, Ledger, Timestamp};
use std::collections::HashMap;

/// Source of settle timestamps
pub type Clock = fn() -> Timestamp;

/// Wall-clock seconds since the Unix epoch
pub fn system_clock() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Low-level swap request.
///
/// The trader's offered inputs are moved into pool custody, the requested
/// outputs are paid to `recipient`, and the pool then checks that what it
/// actually received covers what it paid under the curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub trader: Address,
    pub amount_a_in: Amount,
    pub amount_b_in: Amount,
    pub amount_a_out: Amount,
    pub amount_b_out: Amount,
    pub recipient: Address,
}

/// Pool state written back after a successful operation
struct Settlement {
    balance_a: Amount,
    balance_b: Amount,
    share_supply: Amount,
    invariant_checkpoint: u128,
    accrued_fee_shares: Amount,
}

/// Registry of pools plus the ledger they settle against
pub struct PoolController<L: Ledger> {
    ledger: L,
    pools: HashMap<PoolKey, Pool>,
    max_reserve: Amount,
    clock: Clock,
}

impl<L: Ledger> PoolController<L> {
    /// Create a controller with no pools
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            pools: HashMap::new(),
            max_reserve: DEFAULT_MAX_RESERVE,
            clock: system_clock,
        }
    }

    /// Replace the settle clock
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Ceiling applied to reserves of pools created from now on
    pub fn with_max_reserve(mut self, max_reserve: Amount) -> Self {
        self.max_reserve = max_reserve;
        self
    }

    /// Create a controller and every pool listed in `config`
    pub fn bootstrap(ledger: L, config: &EngineConfig) -> LiquidityResult<Self> {
        let mut controller = Self::new(ledger).with_max_reserve(config.max_reserve);
        for spec in &config.pools {
            let key = PoolKey::new(spec.asset_a.clone(), spec.asset_b.clone(), spec.curve.curve_type())?;
            controller.create_pool(spec.creator, spec.fee_recipient, spec.fee_on, key, spec.curve.clone())?;
        }
        tracing::info!(pools = controller.pools.len(), "bootstrapped pool controller");
        Ok(controller)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    pub fn into_ledger(self) -> L {
        self.ledger
    }

    pub fn pool(&self, key: &PoolKey) -> Option<&Pool> {
        self.pools.get(key)
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    fn get_pool(&self, key: &PoolKey) -> LiquidityResult<&Pool> {
        self.pools
            .get(key)
            .ok_or_else(|| LiquidityError::PoolNotFound(key.clone()))
    }

    /// `(reserve_a, reserve_b, last_update_time)`
    pub fn get_reserves(&self, key: &PoolKey) -> LiquidityResult<(Amount, Amount, Timestamp)> {
        Ok(self.get_pool(key)?.get_reserves())
    }

    pub fn get_share_supply(&self, key: &PoolKey) -> LiquidityResult<Amount> {
        Ok(self.get_pool(key)?.share_supply())
    }

    /// Protocol-fee shares minted over the pool's lifetime
    pub fn get_accrued_fees(&self, key: &PoolKey) -> LiquidityResult<Amount> {
        Ok(self.get_pool(key)?.metadata().accrued_fee_shares)
    }

    /// Register a new pool and its share asset
    pub fn create_pool(
        &mut self,
        creator: Address,
        fee_recipient: Address,
        fee_on: bool,
        key: PoolKey,
        params: CurveParams,
    ) -> LiquidityResult<PoolKey> {
        if key.curve_type() != params.curve_type() {
            return Err(LiquidityError::CurveMismatch {
                expected: key.curve_type(),
                actual: params.curve_type(),
            });
        }
        params.curve().validate()?;
        if self.pools.contains_key(&key) {
            return Err(LiquidityError::PoolAlreadyExists(key));
        }

        let authority = self.ledger.register_asset(key.share_asset())?;
        let pool = Pool::new(
            key.clone(),
            params,
            ReserveLedger::new(self.max_reserve),
            PoolMetadata::new(creator, fee_recipient, fee_on),
            authority,
        );
        tracing::info!(
            pool = %key,
            creator = %creator,
            custody = %pool.custody(),
            fee_on,
            "created pool"
        );
        self.pools.insert(key.clone(), pool);
        Ok(key)
    }

    /// Deposit both assets at the current ratio.
    ///
    /// Returns `(used_a, used_b, shares_minted)`.
    pub fn add_liquidity(
        &mut self,
        key: &PoolKey,
        depositor: &Address,
        amount_a_desired: Amount,
        amount_b_desired: Amount,
    ) -> LiquidityResult<(Amount, Amount, Amount)> {
        let result = self.with_pool(key, |ledger, pool| {
            let curve = pool.curve();
            let (reserve_a, reserve_b, _) = pool.get_reserves();
            let (amount_a, amount_b) =
                matched_amounts(curve, amount_a_desired, amount_b_desired, reserve_a, reserve_b)?;

            let custody = pool.custody();
            ledger.transfer(depositor, custody, pool.key().asset_a(), amount_a)?;
            ledger.transfer(depositor, custody, pool.key().asset_b(), amount_b)?;
            let (balance_a, balance_b) = observed_balances(ledger, pool);

            let (mut supply, accrued) = accrue_fee(ledger, pool)?;
            let shares = curve.mint_shares(
                excess(balance_a, reserve_a)?,
                excess(balance_b, reserve_b)?,
                reserve_a,
                reserve_b,
                supply,
            )?;
            let retired = if supply == 0 { MINIMUM_LIQUIDITY } else { 0 };
            let minted = shares.checked_add(retired).ok_or(ArithmeticError::AddOverflow)?;
            let mut tokens = ledger.mint(pool.authority(), minted)?;
            if retired > 0 {
                ledger.deposit(&Address::zero(), tokens.split(retired)?)?;
            }
            ledger.deposit(depositor, tokens)?;
            supply = supply.checked_add(minted).ok_or(ArithmeticError::AddOverflow)?;

            let settlement = Settlement {
                balance_a,
                balance_b,
                share_supply: supply,
                invariant_checkpoint: refreshed_checkpoint(pool, balance_a, balance_b)?,
                accrued_fee_shares: accrued,
            };
            Ok(((amount_a, amount_b, shares), settlement))
        });
        if let Ok((amount_a, amount_b, shares)) = result {
            tracing::info!(pool = %key, depositor = %depositor, amount_a, amount_b, shares, "added liquidity");
        }
        result
    }

    /// Redeem `shares` for a proportional cut of both reserves
    pub fn remove_liquidity(
        &mut self,
        key: &PoolKey,
        withdrawer: &Address,
        shares: Amount,
        min_a: Amount,
        min_b: Amount,
    ) -> LiquidityResult<(Amount, Amount)> {
        let result = self.with_pool(key, |ledger, pool| {
            if withdrawer == &Address::zero() {
                return Err(LiquidityError::InvalidWithdrawer(*withdrawer));
            }
            let custody = pool.custody();
            let share_asset = pool.share_asset();
            let mut tokens = ledger.withdraw(withdrawer, share_asset, shares)?;
            // Shares sitting in custody are redeemed along with the caller's
            let stray = ledger.balance_of(custody, share_asset);
            tokens.merge(ledger.withdraw(custody, share_asset, stray)?)?;
            let liquidity = tokens.value();
            let (balance_a, balance_b) = observed_balances(ledger, pool);

            let (supply, accrued) = accrue_fee(ledger, pool)?;
            if supply.saturating_sub(liquidity) < MINIMUM_LIQUIDITY {
                return Err(LiquidityError::InsufficientLiquidity);
            }
            let (amount_a, amount_b) = pool.curve().burn_shares(liquidity, balance_a, balance_b, supply)?;
            if amount_a < min_a || amount_b < min_b {
                return Err(LiquidityError::Slippage {
                    amount_a,
                    amount_b,
                    min_a,
                    min_b,
                });
            }

            ledger.burn(pool.authority(), tokens)?;
            ledger.transfer(custody, withdrawer, pool.key().asset_a(), amount_a)?;
            ledger.transfer(custody, withdrawer, pool.key().asset_b(), amount_b)?;
            let (balance_a, balance_b) = observed_balances(ledger, pool);

            let settlement = Settlement {
                balance_a,
                balance_b,
                share_supply: supply.checked_sub(liquidity).ok_or(ArithmeticError::SubUnderflow)?,
                invariant_checkpoint: refreshed_checkpoint(pool, balance_a, balance_b)?,
                accrued_fee_shares: accrued,
            };
            Ok(((amount_a, amount_b), settlement))
        });
        if let Ok((amount_a, amount_b)) = result {
            tracing::info!(pool = %key, withdrawer = %withdrawer, shares, amount_a, amount_b, "removed liquidity");
        }
        result
    }

    /// Execute a swap and return the inputs the pool inferred, `(amount_a_in, amount_b_in)`
    pub fn swap(&mut self, key: &PoolKey, request: SwapRequest) -> LiquidityResult<(Amount, Amount)> {
        let result = self.with_pool(key, |ledger, pool| {
            let (reserve_a, reserve_b, _) = pool.get_reserves();
            let out_a = request.amount_a_out;
            let out_b = request.amount_b_out;
            if (out_a == 0) == (out_b == 0) {
                return Err(LiquidityError::InsufficientOutputAmount);
            }
            if (out_a > 0 && out_a >= reserve_a) || (out_b > 0 && out_b >= reserve_b) {
                return Err(LiquidityError::InsufficientLiquidity);
            }
            let custody = pool.custody();
            if &request.recipient == custody {
                return Err(LiquidityError::InvalidRecipient(request.recipient));
            }

            let (asset_a, asset_b) = (pool.key().asset_a(), pool.key().asset_b());
            ledger.transfer(&request.trader, custody, asset_a, request.amount_a_in)?;
            ledger.transfer(&request.trader, custody, asset_b, request.amount_b_in)?;
            ledger.transfer(custody, &request.recipient, asset_a, out_a)?;
            ledger.transfer(custody, &request.recipient, asset_b, out_b)?;
            let (balance_a, balance_b) = observed_balances(ledger, pool);

            let amount_a_in = inferred_input(balance_a, reserve_a, out_a);
            let amount_b_in = inferred_input(balance_b, reserve_b, out_b);
            if amount_a_in == 0 && amount_b_in == 0 {
                return Err(LiquidityError::InsufficientInputAmount);
            }
            pool.curve().check_swap(&SwapCheck {
                reserve_a,
                reserve_b,
                balance_a,
                balance_b,
                amount_a_in,
                amount_b_in,
                amount_a_out: out_a,
                amount_b_out: out_b,
            })?;

            let settlement = Settlement {
                balance_a,
                balance_b,
                share_supply: pool.share_supply(),
                invariant_checkpoint: pool.metadata().invariant_checkpoint,
                accrued_fee_shares: pool.metadata().accrued_fee_shares,
            };
            Ok(((amount_a_in, amount_b_in), settlement))
        });
        if let Ok((amount_a_in, amount_b_in)) = result {
            tracing::info!(
                pool = %key,
                amount_a_in,
                amount_b_in,
                amount_a_out = request.amount_a_out,
                amount_b_out = request.amount_b_out,
                "swapped"
            );
        }
        result
    }

    /// Swap exactly `amount_in` of `asset_in`, failing if the output would be
    /// below `min_amount_out`
    pub fn swap_exact_input(
        &mut self,
        key: &PoolKey,
        trader: &Address,
        asset_in: &AssetId,
        amount_in: Amount,
        min_amount_out: Amount,
        recipient: &Address,
    ) -> LiquidityResult<Amount> {
        let amount_out = self.get_amount_out(key, asset_in, amount_in)?;
        if amount_out < min_amount_out {
            return Err(LiquidityError::OutputBelowMinimum {
                amount_out,
                min_amount_out,
            });
        }
        let a_to_b = asset_in == key.asset_a();
        let request = SwapRequest {
            trader: *trader,
            amount_a_in: if a_to_b { amount_in } else { 0 },
            amount_b_in: if a_to_b { 0 } else { amount_in },
            amount_a_out: if a_to_b { 0 } else { amount_out },
            amount_b_out: if a_to_b { amount_out } else { 0 },
            recipient: *recipient,
        };
        self.swap(key, request)?;
        Ok(amount_out)
    }

    /// Quote the output of swapping `amount_in` of `asset_in` at settled reserves
    pub fn get_amount_out(&self, key: &PoolKey, asset_in: &AssetId, amount_in: Amount) -> LiquidityResult<Amount> {
        let pool = self.get_pool(key)?;
        let (reserve_in, reserve_out) = pool.oriented_reserves(asset_in)?;
        pool.curve().swap_output(amount_in, reserve_in, reserve_out)
    }

    /// Run `op` under the pool lock inside a ledger checkpoint.
    ///
    /// Pool state is only written once `op` and the settle both succeed; any
    /// failure rolls the ledger back and leaves the pool untouched.
    fn with_pool<T, F>(&mut self, key: &PoolKey, op: F) -> LiquidityResult<T>
    where
        F: FnOnce(&mut L, &Pool) -> LiquidityResult<(T, Settlement)>,
    {
        let now = (self.clock)();
        let pool = self
            .pools
            .get_mut(key)
            .ok_or_else(|| LiquidityError::PoolNotFound(key.clone()))?;
        if pool.metadata.locked {
            tracing::warn!(pool = %key, "rejected re-entrant call");
            return Err(LiquidityError::Reentrancy(key.clone()));
        }
        pool.metadata.locked = true;
        self.ledger.checkpoint();

        let outcome = op(&mut self.ledger, &*pool).and_then(|(value, settlement)| {
            let mut reserves = pool.reserves.clone();
            reserves.settle(settlement.balance_a, settlement.balance_b, now)?;
            Ok((value, settlement, reserves))
        });

        let result = match outcome {
            Ok((value, settlement, reserves)) => {
                self.ledger.commit();
                tracing::debug!(
                    pool = %key,
                    reserve_a = settlement.balance_a,
                    reserve_b = settlement.balance_b,
                    share_supply = settlement.share_supply,
                    "settled"
                );
                pool.reserves = reserves;
                pool.share_supply = settlement.share_supply;
                pool.metadata.internal_balance_a = settlement.balance_a;
                pool.metadata.internal_balance_b = settlement.balance_b;
                pool.metadata.invariant_checkpoint = settlement.invariant_checkpoint;
                pool.metadata.accrued_fee_shares = settlement.accrued_fee_shares;
                Ok(value)
            }
            Err(e) => {
                self.ledger.rollback();
                tracing::warn!(pool = %key, error = %e, "operation rolled back");
                Err(e)
            }
        };
        pool.metadata.locked = false;
        result
    }
}

/// Amounts to deposit: desired as-is into an empty pool, otherwise the
/// largest pair at the current ratio that fits both desires
fn matched_amounts(
    curve: &dyn Curve,
    amount_a_desired: Amount,
    amount_b_desired: Amount,
    reserve_a: Amount,
    reserve_b: Amount,
) -> LiquidityResult<(Amount, Amount)> {
    if amount_a_desired == 0 || amount_b_desired == 0 {
        return Err(LiquidityError::InvalidAmount(format!(
            "desired amounts must be nonzero, got ({}, {})",
            amount_a_desired, amount_b_desired
        )));
    }
    if reserve_a == 0 && reserve_b == 0 {
        return Ok((amount_a_desired, amount_b_desired));
    }
    let amount_b_optimal = curve.quote(amount_a_desired, reserve_a, reserve_b)?;
    if amount_b_optimal <= amount_b_desired {
        return Ok((amount_a_desired, amount_b_optimal));
    }
    let amount_a_optimal = curve.quote(amount_b_desired, reserve_b, reserve_a)?;
    if amount_a_optimal <= amount_a_desired {
        return Ok((amount_a_optimal, amount_b_desired));
    }
    Err(LiquidityError::InvalidAmount(format!(
        "no pair at ratio {}:{} fits ({}, {})",
        reserve_a, reserve_b, amount_a_desired, amount_b_desired
    )))
}

fn observed_balances<L: Ledger>(ledger: &L, pool: &Pool) -> (Amount, Amount) {
    let custody = pool.custody();
    (
        ledger.balance_of(custody, pool.key().asset_a()),
        ledger.balance_of(custody, pool.key().asset_b()),
    )
}

/// Balance above the settled reserve
fn excess(balance: Amount, reserve: Amount) -> LiquidityResult<Amount> {
    Ok(balance.checked_sub(reserve).ok_or(ArithmeticError::SubUnderflow)?)
}

/// Input implied by a post-transfer balance: whatever exceeds `reserve - out`
fn inferred_input(balance: Amount, reserve: Amount, amount_out: Amount) -> Amount {
    balance.saturating_sub(reserve.saturating_sub(amount_out))
}

fn mint_to<L: Ledger>(ledger: &mut L, pool: &Pool, to: &Address, amount: Amount) -> LiquidityResult<()> {
    let tokens = ledger.mint(pool.authority(), amount)?;
    ledger.deposit(to, tokens)?;
    Ok(())
}

/// Mint the protocol cut of invariant growth since the last liquidity event.
///
/// Returns the share supply and lifetime fee total after the mint.
fn accrue_fee<L: Ledger>(ledger: &mut L, pool: &Pool) -> LiquidityResult<(Amount, Amount)> {
    let (reserve_a, reserve_b, _) = pool.get_reserves();
    let metadata = pool.metadata();
    let accrual = pool.curve().accrue_protocol_fee(
        reserve_a,
        reserve_b,
        metadata.invariant_checkpoint,
        pool.share_supply(),
        metadata.fee_on,
    )?;
    if accrual.fee_shares == 0 {
        return Ok((pool.share_supply(), metadata.accrued_fee_shares));
    }
    mint_to(ledger, pool, &metadata.fee_recipient, accrual.fee_shares)?;
    tracing::debug!(
        pool = %pool.key(),
        fee_shares = accrual.fee_shares,
        recipient = %metadata.fee_recipient,
        "accrued protocol fee"
    );
    let supply = pool
        .share_supply()
        .checked_add(accrual.fee_shares)
        .ok_or(ArithmeticError::AddOverflow)?;
    let accrued = metadata
        .accrued_fee_shares
        .checked_add(accrual.fee_shares)
        .ok_or(ArithmeticError::AddOverflow)?;
    Ok((supply, accrued))
}

/// Invariant checkpoint after a liquidity event (zero while fees are off)
fn refreshed_checkpoint(pool: &Pool, balance_a: Amount, balance_b: Amount) -> LiquidityResult<u128> {
    if pool.metadata().fee_on {
        pool.curve().invariant(balance_a, balance_b)
    } else {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{ConstantProduct, CurveType};
    use crate::ErrorKind;
    use ledger::InMemoryLedger;

    fn fixed_clock() -> Timestamp {
        1_700_000_000
    }

    fn alice() -> Address {
        Address::derive(b"alice")
    }

    fn bob() -> Address {
        Address::derive(b"bob")
    }

    fn setup(fee_on: bool) -> (PoolController<InMemoryLedger>, PoolKey) {
        let mut ledger = InMemoryLedger::new();
        ledger.credit(&alice(), &"BTC".into(), 1_000_000_000).unwrap();
        ledger.credit(&alice(), &"USDC".into(), 1_000_000_000).unwrap();
        ledger.credit(&bob(), &"BTC".into(), 1_000_000_000).unwrap();
        ledger.credit(&bob(), &"USDC".into(), 1_000_000_000).unwrap();

        let mut controller = PoolController::new(ledger).with_clock(fixed_clock);
        let key = PoolKey::new("BTC".into(), "USDC".into(), CurveType::ConstantProduct).unwrap();
        let key = controller
            .create_pool(
                alice(),
                Address::derive(b"treasury"),
                fee_on,
                key,
                CurveParams::ConstantProduct(ConstantProduct::default()),
            )
            .unwrap();
        (controller, key)
    }

    #[test]
    fn test_create_pool_rejects_duplicates_and_mismatch() {
        let (mut controller, key) = setup(false);
        let err = controller
            .create_pool(alice(), alice(), false, key.clone(), CurveParams::default_for(CurveType::ConstantProduct))
            .unwrap_err();
        assert!(matches!(err, LiquidityError::PoolAlreadyExists(_)));

        let stable_key = PoolKey::new("BTC".into(), "USDC".into(), CurveType::Stable).unwrap();
        let err = controller
            .create_pool(alice(), alice(), false, stable_key, CurveParams::default_for(CurveType::Piecewise))
            .unwrap_err();
        assert!(matches!(err, LiquidityError::CurveMismatch { .. }));
    }

    #[test]
    fn test_first_deposit_retires_minimum_liquidity() {
        let (mut controller, key) = setup(false);
        let (used_a, used_b, shares) = controller
            .add_liquidity(&key, &alice(), 100_000_000, 10_000_000)
            .unwrap();
        assert_eq!((used_a, used_b), (100_000_000, 10_000_000));
        assert_eq!(shares, 31_621_776);

        let share_asset = key.share_asset();
        let ledger = controller.ledger();
        assert_eq!(ledger.balance_of(&Address::zero(), &share_asset), MINIMUM_LIQUIDITY);
        assert_eq!(ledger.balance_of(&alice(), &share_asset), shares);
        assert_eq!(controller.get_share_supply(&key).unwrap(), 31_622_776);
        assert_eq!(controller.get_reserves(&key).unwrap(), (100_000_000, 10_000_000, fixed_clock()));
        assert!(!controller.pool(&key).unwrap().is_locked());
    }

    #[test]
    fn test_second_deposit_matches_ratio() {
        let (mut controller, key) = setup(false);
        controller.add_liquidity(&key, &alice(), 1_000_000, 4_000_000).unwrap();

        let (used_a, used_b, _) = controller.add_liquidity(&key, &bob(), 500, 10_000).unwrap();
        assert_eq!((used_a, used_b), (500, 2_000));
        let (used_a, used_b, _) = controller.add_liquidity(&key, &bob(), 10_000, 400).unwrap();
        assert_eq!((used_a, used_b), (100, 400));
    }

    #[test]
    fn test_locked_pool_rejects_calls_without_side_effects() {
        let (mut controller, key) = setup(false);
        controller.add_liquidity(&key, &alice(), 1_000_000, 1_000_000).unwrap();
        controller.pools.get_mut(&key).unwrap().metadata.locked = true;

        let err = controller.add_liquidity(&key, &bob(), 1_000, 1_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reentrancy);
        assert!(controller.get_amount_out(&key, &"BTC".into(), 10).is_ok());
        let err = controller
            .swap_exact_input(&key, &bob(), &"BTC".into(), 1_000, 0, &bob())
            .unwrap_err();
        assert!(matches!(err, LiquidityError::Reentrancy(_)));
        let err = controller.remove_liquidity(&key, &alice(), 1_000, 0, 0).unwrap_err();
        assert!(matches!(err, LiquidityError::Reentrancy(_)));
        let request = SwapRequest {
            trader: bob(),
            amount_a_in: 1_000,
            amount_b_in: 0,
            amount_a_out: 0,
            amount_b_out: 10,
            recipient: bob(),
        };
        assert!(matches!(controller.swap(&key, request), Err(LiquidityError::Reentrancy(_))));

        assert_eq!(controller.ledger().balance_of(&bob(), &"BTC".into()), 1_000_000_000);
        assert_eq!(controller.get_reserves(&key).unwrap().0, 1_000_000);
        assert_eq!(controller.ledger().open_checkpoints(), 0);
    }

    #[test]
    fn test_failed_swap_rolls_back() {
        let (mut controller, key) = setup(false);
        controller.add_liquidity(&key, &alice(), 1_000_000, 1_000_000).unwrap();

        let request = SwapRequest {
            trader: bob(),
            amount_a_in: 1_000,
            amount_b_in: 0,
            amount_a_out: 0,
            amount_b_out: 997,
            recipient: bob(),
        };
        let err = controller.swap(&key, request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invariant);

        let ledger = controller.ledger();
        assert_eq!(ledger.balance_of(&bob(), &"BTC".into()), 1_000_000_000);
        assert_eq!(ledger.balance_of(&bob(), &"USDC".into()), 1_000_000_000);
        assert_eq!(ledger.open_checkpoints(), 0);
        assert_eq!(controller.get_reserves(&key).unwrap().1, 1_000_000);
        assert!(!controller.pool(&key).unwrap().is_locked());
    }

    #[test]
    fn test_swap_validates_outputs() {
        let (mut controller, key) = setup(false);
        controller.add_liquidity(&key, &alice(), 1_000_000, 1_000_000).unwrap();
        let base = SwapRequest {
            trader: bob(),
            amount_a_in: 1_000,
            amount_b_in: 0,
            amount_a_out: 0,
            amount_b_out: 0,
            recipient: bob(),
        };

        let err = controller.swap(&key, base.clone()).unwrap_err();
        assert!(matches!(err, LiquidityError::InsufficientOutputAmount));

        let both = SwapRequest { amount_a_out: 1, amount_b_out: 1, ..base.clone() };
        assert!(matches!(
            controller.swap(&key, both).unwrap_err(),
            LiquidityError::InsufficientOutputAmount
        ));

        let drain = SwapRequest { amount_b_out: 1_000_000, ..base.clone() };
        assert!(matches!(
            controller.swap(&key, drain).unwrap_err(),
            LiquidityError::InsufficientLiquidity
        ));

        let custody = *controller.pool(&key).unwrap().custody();
        let to_custody = SwapRequest { amount_b_out: 10, recipient: custody, ..base.clone() };
        assert!(matches!(
            controller.swap(&key, to_custody).unwrap_err(),
            LiquidityError::InvalidRecipient(_)
        ));

        let no_input = SwapRequest { amount_a_in: 0, amount_b_out: 10, ..base };
        assert!(matches!(
            controller.swap(&key, no_input).unwrap_err(),
            LiquidityError::InsufficientInputAmount
        ));
    }

    #[test]
    fn test_swap_exact_input_pays_quote() {
        let (mut controller, key) = setup(false);
        controller.add_liquidity(&key, &alice(), 1_000_000, 1_000_000).unwrap();

        let quoted = controller.get_amount_out(&key, &"BTC".into(), 1_000).unwrap();
        assert_eq!(quoted, 996);
        let err = controller
            .swap_exact_input(&key, &bob(), &"BTC".into(), 1_000, 997, &bob())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Slippage);

        let out = controller
            .swap_exact_input(&key, &bob(), &"BTC".into(), 1_000, 996, &bob())
            .unwrap();
        assert_eq!(out, 996);
        assert_eq!(controller.get_reserves(&key).unwrap().0, 1_001_000);
        assert_eq!(controller.get_reserves(&key).unwrap().1, 999_004);
        assert_eq!(controller.ledger().balance_of(&bob(), &"USDC".into()), 1_000_000_996);
    }

    #[test]
    fn test_remove_liquidity_slippage_and_payout() {
        let (mut controller, key) = setup(false);
        let (_, _, shares) = controller.add_liquidity(&key, &alice(), 4_000_000, 1_000_000).unwrap();
        assert_eq!(shares, 2_000_000 - MINIMUM_LIQUIDITY);

        let err = controller
            .remove_liquidity(&key, &alice(), 1_000_000, 2_000_001, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            LiquidityError::Slippage { amount_a: 2_000_000, amount_b: 500_000, .. }
        ));
        assert_eq!(controller.ledger().balance_of(&alice(), &key.share_asset()), shares);

        let (amount_a, amount_b) = controller
            .remove_liquidity(&key, &alice(), 1_000_000, 2_000_000, 500_000)
            .unwrap();
        assert_eq!((amount_a, amount_b), (2_000_000, 500_000));
        assert_eq!(controller.get_share_supply(&key).unwrap(), 1_000_000);
        assert_eq!(controller.get_reserves(&key).unwrap().0, 2_000_000);
    }

    #[test]
    fn test_retired_shares_stay_retired() {
        let (mut controller, key) = setup(false);
        let (_, _, shares) = controller.add_liquidity(&key, &alice(), 1_000_000, 1_000_000).unwrap();
        controller.remove_liquidity(&key, &alice(), shares, 0, 0).unwrap();

        let err = controller
            .remove_liquidity(&key, &Address::zero(), MINIMUM_LIQUIDITY, 0, 0)
            .unwrap_err();
        assert!(matches!(err, LiquidityError::InvalidWithdrawer(_)));

        // Even if the sink's shares change hands they cannot take supply below the floor
        let share_asset = key.share_asset();
        controller
            .ledger_mut()
            .transfer(&Address::zero(), &bob(), &share_asset, MINIMUM_LIQUIDITY)
            .unwrap();
        let err = controller
            .remove_liquidity(&key, &bob(), MINIMUM_LIQUIDITY, 0, 0)
            .unwrap_err();
        assert!(matches!(err, LiquidityError::InsufficientLiquidity));
        assert_eq!(controller.get_share_supply(&key).unwrap(), MINIMUM_LIQUIDITY);
        assert_eq!(controller.get_reserves(&key).unwrap().0, 1_000);
        assert_eq!(controller.ledger().balance_of(&bob(), &share_asset), MINIMUM_LIQUIDITY);
    }

    #[test]
    fn test_protocol_fee_accrues_on_liquidity_event() {
        let (mut controller, key) = setup(true);
        controller.add_liquidity(&key, &alice(), 10_000_000, 10_000_000).unwrap();
        assert_eq!(
            controller.pool(&key).unwrap().metadata().invariant_checkpoint,
            100_000_000_000_000
        );

        for _ in 0..20 {
            controller
                .swap_exact_input(&key, &bob(), &"BTC".into(), 500_000, 0, &bob())
                .unwrap();
            controller
                .swap_exact_input(&key, &bob(), &"USDC".into(), 500_000, 0, &bob())
                .unwrap();
        }
        assert_eq!(controller.get_accrued_fees(&key).unwrap(), 0);

        controller.remove_liquidity(&key, &alice(), 1_000, 0, 0).unwrap();
        let fees = controller.get_accrued_fees(&key).unwrap();
        assert!(fees > 0);
        let treasury = Address::derive(b"treasury");
        assert_eq!(controller.ledger().balance_of(&treasury, &key.share_asset()), fees);
        assert_eq!(
            controller.get_share_supply(&key).unwrap(),
            controller.ledger().total_supply(&key.share_asset())
        );
    }

    #[test]
    fn test_unknown_pool() {
        let (mut controller, _) = setup(false);
        let missing = PoolKey::new("ETH".into(), "USDC".into(), CurveType::Stable).unwrap();
        assert!(matches!(
            controller.add_liquidity(&missing, &alice(), 1, 1),
            Err(LiquidityError::PoolNotFound(_))
        ));
        assert!(controller.get_reserves(&missing).is_err());
    }
}
