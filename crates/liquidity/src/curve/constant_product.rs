// liquidity/src/curve/constant_product.rs

use super::{check_swap_inputs, validate_fees, Curve, CurveType, SwapCheck};
use crate::math::{self, wide, wide128, U256};
use crate::{LiquidityError, LiquidityResult, BPS_DENOMINATOR};
use ledger::Amount;
use serde::{Deserialize, Serialize};

/// Constant product curve: `reserve_a * reserve_b = k`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantProduct {
    /// Trading fee (basis points, e.g., 30 = 0.3%)
    pub fee_bps: u64,
    /// Protocol share of `sqrt(k)` growth is `1 / (factor + 1)`
    pub protocol_fee_factor: u64,
}

impl Default for ConstantProduct {
    fn default() -> Self {
        Self {
            fee_bps: 30,
            protocol_fee_factor: 5,
        }
    }
}

impl Curve for ConstantProduct {
    fn curve_type(&self) -> CurveType {
        CurveType::ConstantProduct
    }

    fn fee_bps(&self) -> u64 {
        self.fee_bps
    }

    fn protocol_fee_factor(&self) -> u64 {
        self.protocol_fee_factor
    }

    fn validate(&self) -> LiquidityResult<()> {
        validate_fees(self.fee_bps)
    }

    fn invariant(&self, reserve_a: Amount, reserve_b: Amount) -> LiquidityResult<u128> {
        Ok(math::to_u128(math::mul(wide(reserve_a), wide(reserve_b))?)?)
    }

    /// Growth is measured on `sqrt(k)`
    fn growth_measure(&self, invariant: u128) -> U256 {
        math::isqrt(wide128(invariant))
    }

    fn swap_output(&self, amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> LiquidityResult<Amount> {
        check_swap_inputs(amount_in, reserve_in, reserve_out)?;

        // out = reserve_out * in' / (reserve_in + in') with in' = in * (1 - fee),
        // kept scaled by the bps denominator so in' is never rounded on its own
        let bps = wide(BPS_DENOMINATOR);
        let in_with_fee = math::mul(wide(amount_in), math::sub(bps, wide(self.fee_bps))?)?;
        let numerator = math::mul(in_with_fee, wide(reserve_out))?;
        let denominator = math::add(math::mul(wide(reserve_in), bps)?, in_with_fee)?;
        Ok(math::to_u64(math::div(numerator, denominator)?)?)
    }

    /// Scaled-invariant check:
    /// `(bal_a * D - fee * in_a) * (bal_b * D - fee * in_b) >= D^2 * reserve_a * reserve_b`
    fn check_swap(&self, check: &SwapCheck) -> LiquidityResult<()> {
        let bps = wide(BPS_DENOMINATOR);
        let fee = wide(self.fee_bps);
        let adjusted_a = math::sub(
            math::mul(wide(check.balance_a), bps)?,
            math::mul(wide(check.amount_a_in), fee)?,
        )?;
        let adjusted_b = math::sub(
            math::mul(wide(check.balance_b), bps)?,
            math::mul(wide(check.amount_b_in), fee)?,
        )?;
        let after = math::mul(adjusted_a, adjusted_b)?;
        let before = math::mul(
            math::mul(bps, bps)?,
            math::mul(wide(check.reserve_a), wide(check.reserve_b))?,
        )?;
        if after < before {
            return Err(LiquidityError::InvariantViolation { curve: self.curve_type() });
        }
        Ok(())
    }
}
