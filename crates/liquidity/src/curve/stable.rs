// liquidity/src/curve/stable.rs

use super::{amount_after_fee, check_swap_inputs, validate_fees, Curve, CurveType, SwapCheck};
use crate::math::{self, wide, ArithmeticError, U256};
use crate::{LiquidityError, LiquidityResult};
use ledger::Amount;
use serde::{Deserialize, Serialize};

/// Max number of Newton iterations (and of bracket doublings)
pub const MAX_ITERATIONS: usize = 255;

/// Upper bound for the amplification coefficient
pub const MAX_AMP: u64 = 1_000_000;

/// Two-coin StableSwap curve.
///
/// Invariant `D` satisfies `Ann * (x + y) + D = Ann * D + D^3 / (4xy)` with
/// `Ann = 4 * amp`. High `amp` flattens the curve around the 1:1 point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StableCurve {
    /// Amplification coefficient
    pub amp: u64,
    /// Trading fee (basis points)
    pub fee_bps: u64,
    /// Protocol share of `D` growth is `1 / (factor + 1)`
    pub protocol_fee_factor: u64,
}

impl Default for StableCurve {
    fn default() -> Self {
        Self {
            amp: 100,
            fee_bps: 4,
            protocol_fee_factor: 1,
        }
    }
}

impl StableCurve {
    /// `amp * n^n` for two coins
    fn ann(&self) -> LiquidityResult<U256> {
        Ok(math::mul(wide(self.amp), wide(4))?)
    }

    /// Whether `d` does not exceed the exact invariant of `(x, y)`:
    /// `d^3 + 4xy(Ann - 1)d <= 4xy * Ann * (x + y)`
    fn within_invariant(&self, x: U256, y: U256, d: U256) -> LiquidityResult<bool> {
        let ann = self.ann()?;
        let xy4 = math::mul(math::mul(x, y)?, wide(4))?;
        let cubed = math::mul(math::mul(d, d)?, d)?;
        let lhs = math::add(cubed, math::mul(math::mul(xy4, math::sub(ann, U256::one())?)?, d)?)?;
        let rhs = math::mul(math::mul(xy4, ann)?, math::add(x, y)?)?;
        Ok(lhs <= rhs)
    }

    /// Invariant `D`, exactly the floor of the real solution.
    ///
    /// Newton's estimate is accepted only when it is exact; otherwise the
    /// floor is found by bisection on `[0, x + y]`, where `within_invariant`
    /// is monotone in `d`.
    pub fn compute_d(&self, reserve_a: Amount, reserve_b: Amount) -> LiquidityResult<U256> {
        if reserve_a == 0 || reserve_b == 0 {
            return Ok(U256::zero());
        }
        let (x, y) = (wide(reserve_a), wide(reserve_b));
        let sum = math::add(x, y)?;
        if let Ok(Some(d)) = self.newton_d(x, y, sum) {
            if let Ok(true) = self.is_floor_d(x, y, d) {
                return Ok(d);
            }
        }

        // within(lo) holds, within(hi) does not
        let (mut lo, mut hi) = (U256::zero(), math::add(sum, U256::one())?);
        while hi - lo > U256::one() {
            let mid = lo + (hi - lo) / 2;
            if self.within_invariant(x, y, mid)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    fn newton_d(&self, x: U256, y: U256, sum: U256) -> LiquidityResult<Option<U256>> {
        let ann = self.ann()?;
        let mut d = sum;
        for _ in 0..MAX_ITERATIONS {
            // d_p = d^3 / (4xy)
            let mut d_p = math::mul_div(d, d, math::mul(x, wide(2))?)?;
            d_p = math::mul_div(d_p, d, math::mul(y, wide(2))?)?;
            let prev = d;
            let numerator = math::mul(math::add(math::mul(ann, sum)?, math::mul(d_p, wide(2))?)?, d)?;
            let denominator = math::add(
                math::mul(math::sub(ann, U256::one())?, d)?,
                math::mul(d_p, wide(3))?,
            )?;
            d = math::div(numerator, denominator)?;
            if abs_diff(d, prev) <= U256::one() {
                return Ok(Some(d));
            }
        }
        Ok(None)
    }

    fn is_floor_d(&self, x: U256, y: U256, d: U256) -> LiquidityResult<bool> {
        Ok(self.within_invariant(x, y, d)? && !self.within_invariant(x, y, math::add(d, U256::one())?)?)
    }

    /// Smallest balance of the other coin keeping the invariant at least `d`
    /// when this coin's balance is `x`.
    ///
    /// Falls back to bisection when Newton's estimate is not exact. The
    /// predicate only turns monotone above `((Ann - 1) * d - Ann * x) / Ann`,
    /// so the search starts there.
    pub fn compute_y(&self, x: U256, d: U256) -> LiquidityResult<U256> {
        if d.is_zero() {
            return Ok(U256::zero());
        }
        if let Ok(Some(y)) = self.newton_y(x, d) {
            if let Ok(true) = self.is_floor_y(x, y, d) {
                return Ok(y);
            }
        }

        let ann = self.ann()?;
        let scaled_d = math::mul(math::sub(ann, U256::one())?, d)?;
        let scaled_x = math::mul(ann, x)?;
        // within(lo) does not hold, within(hi) does
        let mut lo = if scaled_d > scaled_x {
            math::div(scaled_d - scaled_x, ann)?
        } else {
            U256::zero()
        };
        let mut hi = math::add(lo.max(d), U256::one())?;
        let mut steps = 0;
        while !self.within_invariant(x, hi, d)? {
            lo = hi;
            hi = math::mul(hi, wide(2))?;
            steps = bump(steps)?;
        }
        while hi - lo > U256::one() {
            let mid = lo + (hi - lo) / 2;
            if self.within_invariant(x, mid, d)? {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        Ok(hi)
    }

    fn newton_y(&self, x: U256, d: U256) -> LiquidityResult<Option<U256>> {
        let ann = self.ann()?;
        // c = d^3 / (4 * x * Ann), b = x + d / Ann
        let mut c = math::mul_div(d, d, math::mul(x, wide(2))?)?;
        c = math::mul_div(c, d, math::mul(ann, wide(2))?)?;
        let b = math::add(x, math::div(d, ann)?)?;

        let mut y = d;
        for _ in 0..MAX_ITERATIONS {
            let prev = y;
            // y = (y^2 + c) / (2y + b - d)
            let numerator = math::add(math::mul(y, y)?, c)?;
            let denominator = math::sub(math::add(math::mul(y, wide(2))?, b)?, d)?;
            y = math::div(numerator, denominator)?;
            if abs_diff(y, prev) <= U256::one() {
                return Ok(Some(y));
            }
        }
        Ok(None)
    }

    fn is_floor_y(&self, x: U256, y: U256, d: U256) -> LiquidityResult<bool> {
        if !self.within_invariant(x, y, d)? {
            return Ok(false);
        }
        Ok(y.is_zero() || !self.within_invariant(x, y - U256::one(), d)?)
    }
}

impl Curve for StableCurve {
    fn curve_type(&self) -> CurveType {
        CurveType::Stable
    }

    fn fee_bps(&self) -> u64 {
        self.fee_bps
    }

    fn protocol_fee_factor(&self) -> u64 {
        self.protocol_fee_factor
    }

    fn validate(&self) -> LiquidityResult<()> {
        if self.amp == 0 || self.amp > MAX_AMP {
            return Err(LiquidityError::InvalidCurveParams(format!(
                "amp {} outside 1..={}",
                self.amp, MAX_AMP
            )));
        }
        validate_fees(self.fee_bps)
    }

    fn invariant(&self, reserve_a: Amount, reserve_b: Amount) -> LiquidityResult<u128> {
        Ok(math::to_u128(self.compute_d(reserve_a, reserve_b)?)?)
    }

    fn swap_output(&self, amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> LiquidityResult<Amount> {
        check_swap_inputs(amount_in, reserve_in, reserve_out)?;
        let d = self.compute_d(reserve_in, reserve_out)?;
        let x = math::add(wide(reserve_in), amount_after_fee(amount_in, self.fee_bps)?)?;
        let y = self.compute_y(x, d)?;
        Ok(math::to_u64(math::sub(wide(reserve_out), y)?)?)
    }

    /// Fee-adjusted balances must still carry the pre-swap invariant
    fn check_swap(&self, check: &SwapCheck) -> LiquidityResult<()> {
        let d = self.compute_d(check.reserve_a, check.reserve_b)?;
        let adjusted_a = math::sub(wide(check.balance_a), fee_taken(check.amount_a_in, self.fee_bps)?)?;
        let adjusted_b = math::sub(wide(check.balance_b), fee_taken(check.amount_b_in, self.fee_bps)?)?;
        if !self.within_invariant(adjusted_a, adjusted_b, d)? {
            return Err(LiquidityError::InvariantViolation { curve: self.curve_type() });
        }
        // The settled state must stay priceable
        self.compute_d(check.balance_a, check.balance_b)?;
        Ok(())
    }
}

/// Fee portion of an input, rounded up
fn fee_taken(amount_in: Amount, fee_bps: u64) -> LiquidityResult<U256> {
    Ok(math::sub(wide(amount_in), amount_after_fee(amount_in, fee_bps)?)?)
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn bump(steps: usize) -> LiquidityResult<usize> {
    if steps >= MAX_ITERATIONS {
        return Err(ArithmeticError::NoConvergence.into());
    }
    Ok(steps + 1)
}
