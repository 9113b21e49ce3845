// liquidity/src/curve/mod.rs

//! Pricing curves.
//!
//! Every curve shares the proportional quote, share mint/burn and protocol-fee
//! rules below; they differ in the invariant and in how a swap is solved
//! against it.

pub mod constant_product;
pub mod piecewise;
pub mod stable;

pub use constant_product::ConstantProduct;
pub use piecewise::Piecewise;
pub use stable::StableCurve;

use crate::math::{self, wide, wide128, U256};
use crate::{LiquidityError, LiquidityResult, BPS_DENOMINATOR, MINIMUM_LIQUIDITY};
use ledger::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Curve family of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    ConstantProduct,
    Stable,
    Piecewise,
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CurveType::ConstantProduct => "constant_product",
            CurveType::Stable => "stable",
            CurveType::Piecewise => "piecewise",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a protocol-fee accrual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeAccrual {
    /// Shares to mint to the fee recipient
    pub fee_shares: Amount,
    /// Checkpoint to keep until the liquidity event refreshes it
    pub checkpoint: u128,
}

/// Everything a post-swap invariant check looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapCheck {
    pub reserve_a: Amount,
    pub reserve_b: Amount,
    pub balance_a: Amount,
    pub balance_b: Amount,
    pub amount_a_in: Amount,
    pub amount_b_in: Amount,
    pub amount_a_out: Amount,
    pub amount_b_out: Amount,
}

impl SwapCheck {
    /// `(net_out, opposite_in, reserve_in, reserve_out)` seen from the output
    /// side, with same-side input netted against the output
    pub fn oriented(&self) -> (Amount, Amount, Amount, Amount) {
        let (out, same_in, other_in, reserve_in, reserve_out) = if self.amount_a_out > 0 {
            (self.amount_a_out, self.amount_a_in, self.amount_b_in, self.reserve_b, self.reserve_a)
        } else {
            (self.amount_b_out, self.amount_b_in, self.amount_a_in, self.reserve_a, self.reserve_b)
        };
        (out.saturating_sub(same_in), other_in, reserve_in, reserve_out)
    }
}

/// Pricing curve contract
pub trait Curve {
    fn curve_type(&self) -> CurveType;

    /// Trading fee in basis points
    fn fee_bps(&self) -> u64;

    /// Protocol takes `1 / (factor + 1)` of invariant growth
    fn protocol_fee_factor(&self) -> u64;

    fn validate(&self) -> LiquidityResult<()>;

    /// Invariant value of the given reserves
    fn invariant(&self, reserve_a: Amount, reserve_b: Amount) -> LiquidityResult<u128>;

    /// Output for `amount_in`, net of the trading fee, rounded down
    fn swap_output(&self, amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> LiquidityResult<Amount>;

    /// Degree-one measure of an invariant value, used for fee growth
    fn growth_measure(&self, invariant: u128) -> U256 {
        wide128(invariant)
    }

    /// Reject a swap whose settled balances would leave the pool worse off.
    ///
    /// Nets same-side input against the output and requires the remainder to
    /// be covered by what `swap_output` grants for the opposite-side input.
    fn check_swap(&self, check: &SwapCheck) -> LiquidityResult<()> {
        let (net_out, other_in, reserve_in, reserve_out) = check.oriented();
        if net_out == 0 {
            return Ok(());
        }
        let violation = LiquidityError::InvariantViolation { curve: self.curve_type() };
        if other_in == 0 {
            return Err(violation);
        }
        match self.swap_output(other_in, reserve_in, reserve_out) {
            Ok(granted) if granted >= net_out => Ok(()),
            Ok(_) | Err(LiquidityError::InsufficientLiquidity) => Err(violation),
            Err(e) => Err(e),
        }
    }

    /// Amount of B matching `amount_a` at the current reserve ratio
    fn quote(&self, amount_a: Amount, reserve_a: Amount, reserve_b: Amount) -> LiquidityResult<Amount> {
        if amount_a == 0 {
            return Err(LiquidityError::InsufficientAmount);
        }
        if reserve_a == 0 || reserve_b == 0 {
            return Err(LiquidityError::InsufficientLiquidity);
        }
        let amount_b = math::mul_div(wide(amount_a), wide(reserve_b), wide(reserve_a))?;
        Ok(math::to_u64(amount_b)?)
    }

    /// Shares owed to a depositor of `amount_a`/`amount_b`.
    ///
    /// On the first deposit (`total_supply == 0`) the result excludes the
    /// `MINIMUM_LIQUIDITY` shares the caller must retire to the sink.
    fn mint_shares(
        &self,
        amount_a: Amount,
        amount_b: Amount,
        reserve_a: Amount,
        reserve_b: Amount,
        total_supply: Amount,
    ) -> LiquidityResult<Amount> {
        let shares = if total_supply == 0 {
            let root = math::to_u64(math::isqrt(math::mul(wide(amount_a), wide(amount_b))?))?;
            root.saturating_sub(MINIMUM_LIQUIDITY)
        } else {
            if reserve_a == 0 || reserve_b == 0 {
                return Err(LiquidityError::InsufficientLiquidity);
            }
            let supply = wide(total_supply);
            let by_a = math::mul_div(wide(amount_a), supply, wide(reserve_a))?;
            let by_b = math::mul_div(wide(amount_b), supply, wide(reserve_b))?;
            math::to_u64(by_a.min(by_b))?
        };
        if shares == 0 {
            return Err(LiquidityError::InsufficientLiquidityMinted);
        }
        Ok(shares)
    }

    /// Proportional redemption of `shares`
    fn burn_shares(
        &self,
        shares: Amount,
        reserve_a: Amount,
        reserve_b: Amount,
        total_supply: Amount,
    ) -> LiquidityResult<(Amount, Amount)> {
        if shares > total_supply {
            return Err(LiquidityError::InsufficientLiquidity);
        }
        let supply = wide(total_supply);
        let amount_a = math::to_u64(math::mul_div(wide(reserve_a), wide(shares), supply)?)?;
        let amount_b = math::to_u64(math::mul_div(wide(reserve_b), wide(shares), supply)?)?;
        if amount_a == 0 || amount_b == 0 {
            return Err(LiquidityError::InsufficientLiquidityBurned);
        }
        Ok((amount_a, amount_b))
    }

    /// Protocol cut of the invariant growth since `checkpoint`.
    ///
    /// `shares = supply * (m - m_last) / (factor * m + m_last)` where `m` is
    /// the growth measure. Disabled collection resets the checkpoint to zero.
    fn accrue_protocol_fee(
        &self,
        reserve_a: Amount,
        reserve_b: Amount,
        checkpoint: u128,
        total_supply: Amount,
        fee_on: bool,
    ) -> LiquidityResult<FeeAccrual> {
        if !fee_on {
            return Ok(FeeAccrual { fee_shares: 0, checkpoint: 0 });
        }
        let unchanged = FeeAccrual { fee_shares: 0, checkpoint };
        if checkpoint == 0 || total_supply == 0 {
            return Ok(unchanged);
        }
        let measure = self.growth_measure(self.invariant(reserve_a, reserve_b)?);
        let measure_last = self.growth_measure(checkpoint);
        if measure <= measure_last {
            return Ok(unchanged);
        }
        let numerator = math::mul(wide(total_supply), math::sub(measure, measure_last)?)?;
        let denominator = math::add(
            math::mul(measure, wide(self.protocol_fee_factor()))?,
            measure_last,
        )?;
        let fee_shares = math::to_u64(math::div(numerator, denominator)?)?;
        Ok(FeeAccrual { fee_shares, checkpoint })
    }
}

/// Curve selection plus its tuning, as stored on a pool and in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurveParams {
    ConstantProduct(ConstantProduct),
    Stable(StableCurve),
    Piecewise(Piecewise),
}

impl CurveParams {
    pub fn curve_type(&self) -> CurveType {
        self.curve().curve_type()
    }

    pub fn curve(&self) -> &dyn Curve {
        match self {
            CurveParams::ConstantProduct(c) => c,
            CurveParams::Stable(c) => c,
            CurveParams::Piecewise(c) => c,
        }
    }

    /// Default tuning for a curve family
    pub fn default_for(curve_type: CurveType) -> Self {
        match curve_type {
            CurveType::ConstantProduct => CurveParams::ConstantProduct(ConstantProduct::default()),
            CurveType::Stable => CurveParams::Stable(StableCurve::default()),
            CurveType::Piecewise => CurveParams::Piecewise(Piecewise::default()),
        }
    }
}

/// Shared fee-parameter validation
pub(crate) fn validate_fees(fee_bps: u64) -> LiquidityResult<()> {
    if fee_bps >= BPS_DENOMINATOR {
        return Err(LiquidityError::InvalidCurveParams(format!(
            "fee_bps {} must be below {}",
            fee_bps, BPS_DENOMINATOR
        )));
    }
    Ok(())
}

/// `amount_in` with the trading fee taken out, rounded down
pub(crate) fn amount_after_fee(amount_in: Amount, fee_bps: u64) -> LiquidityResult<U256> {
    let bps = wide(BPS_DENOMINATOR);
    Ok(math::mul_div(wide(amount_in), math::sub(bps, wide(fee_bps))?, bps)?)
}

pub(crate) fn check_swap_inputs(amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> LiquidityResult<()> {
    if amount_in == 0 {
        return Err(LiquidityError::InsufficientInputAmount);
    }
    if reserve_in == 0 || reserve_out == 0 {
        return Err(LiquidityError::InsufficientLiquidity);
    }
    Ok(())
}
