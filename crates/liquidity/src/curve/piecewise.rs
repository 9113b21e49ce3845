// liquidity/src/curve/piecewise.rs

use super::{amount_after_fee, check_swap_inputs, validate_fees, Curve, CurveType, SwapCheck};
use crate::math::{self, wide, U256};
use crate::{LiquidityError, LiquidityResult, BPS_DENOMINATOR};
use ledger::Amount;
use serde::{Deserialize, Serialize};

/// Two-segment linear curve.
///
/// Input trades at `inner_rate_bps` while the output reserve stays above
/// `kink_bps / 10_000` of the input reserve, and at the lower
/// `outer_rate_bps` past that point. Both rates are at most 1:1, so the
/// reserve sum never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Piecewise {
    pub inner_rate_bps: u64,
    pub outer_rate_bps: u64,
    pub kink_bps: u64,
    pub fee_bps: u64,
    pub protocol_fee_factor: u64,
}

impl Default for Piecewise {
    fn default() -> Self {
        Self {
            inner_rate_bps: 10_000,
            outer_rate_bps: 5_000,
            kink_bps: 5_000,
            fee_bps: 10,
            protocol_fee_factor: 5,
        }
    }
}

impl Piecewise {
    /// Net input that can trade at the inner rate before crossing the kink
    fn inner_capacity(&self, reserve_in: Amount, reserve_out: Amount) -> LiquidityResult<U256> {
        let lhs = math::mul(wide(reserve_out), wide(BPS_DENOMINATOR))?;
        let rhs = math::mul(wide(reserve_in), wide(self.kink_bps))?;
        if lhs <= rhs {
            return Ok(U256::zero());
        }
        let slope = math::add(wide(self.inner_rate_bps), wide(self.kink_bps))?;
        Ok(math::div(lhs - rhs, slope)?)
    }

    /// Output for `amount_in` before the reserve bound is applied
    fn priced_output(&self, amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> LiquidityResult<U256> {
        let net_in = amount_after_fee(amount_in, self.fee_bps)?;
        let capacity = self.inner_capacity(reserve_in, reserve_out)?;

        let gross = if net_in <= capacity {
            math::mul(net_in, wide(self.inner_rate_bps))?
        } else {
            math::add(
                math::mul(capacity, wide(self.inner_rate_bps))?,
                math::mul(net_in - capacity, wide(self.outer_rate_bps))?,
            )?
        };
        Ok(math::div(gross, wide(BPS_DENOMINATOR))?)
    }
}

impl Curve for Piecewise {
    fn curve_type(&self) -> CurveType {
        CurveType::Piecewise
    }

    fn fee_bps(&self) -> u64 {
        self.fee_bps
    }

    fn protocol_fee_factor(&self) -> u64 {
        self.protocol_fee_factor
    }

    fn validate(&self) -> LiquidityResult<()> {
        if self.outer_rate_bps == 0
            || self.outer_rate_bps > self.inner_rate_bps
            || self.inner_rate_bps > BPS_DENOMINATOR
        {
            return Err(LiquidityError::InvalidCurveParams(format!(
                "rates must satisfy 0 < outer ({}) <= inner ({}) <= {}",
                self.outer_rate_bps, self.inner_rate_bps, BPS_DENOMINATOR
            )));
        }
        if self.kink_bps > BPS_DENOMINATOR {
            return Err(LiquidityError::InvalidCurveParams(format!(
                "kink_bps {} exceeds {}",
                self.kink_bps, BPS_DENOMINATOR
            )));
        }
        validate_fees(self.fee_bps)
    }

    /// Sum of both reserves
    fn invariant(&self, reserve_a: Amount, reserve_b: Amount) -> LiquidityResult<u128> {
        Ok(math::to_u128(math::add(wide(reserve_a), wide(reserve_b))?)?)
    }

    fn swap_output(&self, amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> LiquidityResult<Amount> {
        check_swap_inputs(amount_in, reserve_in, reserve_out)?;
        let out = self.priced_output(amount_in, reserve_in, reserve_out)?;
        if out >= wide(reserve_out) {
            return Err(LiquidityError::InsufficientLiquidity);
        }
        Ok(math::to_u64(out)?)
    }

    /// The opposite-side input, priced without the reserve bound, must cover
    /// the net output. Overpaying for a small output is accepted.
    fn check_swap(&self, check: &SwapCheck) -> LiquidityResult<()> {
        let (net_out, other_in, reserve_in, reserve_out) = check.oriented();
        if net_out == 0 {
            return Ok(());
        }
        let violation = LiquidityError::InvariantViolation { curve: self.curve_type() };
        if other_in == 0 || reserve_in == 0 || reserve_out == 0 {
            return Err(violation);
        }
        if self.priced_output(other_in, reserve_in, reserve_out)? < wide(net_out) {
            return Err(violation);
        }
        Ok(())
    }
}
