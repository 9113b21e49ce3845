// liquidity/src/math.rs

//! Overflow-checked arithmetic over a 256-bit unsigned integer.
//!
//! Products of two reserves, or of a reserve and the share supply, are formed
//! here and only narrowed back to `u64`/`u128` through the checked
//! conversions at the bottom of this module.

pub use primitive_types::U256;

/// Result type for arithmetic helpers
pub type ArithmeticResult<T> = Result<T, ArithmeticError>;

/// Arithmetic failures. None of these ever wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArithmeticError {
    #[error("Addition overflow")]
    AddOverflow,

    #[error("Subtraction underflow")]
    SubUnderflow,

    #[error("Multiplication overflow")]
    MulOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Value does not fit in {0} bits")]
    NarrowingOverflow(u32),

    #[error("Iterative solve did not converge")]
    NoConvergence,
}

pub fn add(a: U256, b: U256) -> ArithmeticResult<U256> {
    a.checked_add(b).ok_or(ArithmeticError::AddOverflow)
}

pub fn sub(a: U256, b: U256) -> ArithmeticResult<U256> {
    a.checked_sub(b).ok_or(ArithmeticError::SubUnderflow)
}

pub fn mul(a: U256, b: U256) -> ArithmeticResult<U256> {
    a.checked_mul(b).ok_or(ArithmeticError::MulOverflow)
}

pub fn div(a: U256, b: U256) -> ArithmeticResult<U256> {
    a.checked_div(b).ok_or(ArithmeticError::DivisionByZero)
}

/// `a * b / c`, rounded down
pub fn mul_div(a: U256, b: U256, c: U256) -> ArithmeticResult<U256> {
    div(mul(a, b)?, c)
}

/// Largest `r` with `r * r <= x`.
///
/// Newton's method on integers, starting from a power of two that is never
/// below the true root, so the sequence decreases monotonically to the floor.
pub fn isqrt(x: U256) -> U256 {
    if x < U256::from(2u8) {
        return x;
    }
    let mut guess = U256::one() << ((x.bits() + 1) / 2);
    loop {
        let next = (guess + x / guess) / U256::from(2u8);
        if next >= guess {
            return guess;
        }
        guess = next;
    }
}

/// Widen a `u64`
pub fn wide(x: u64) -> U256 {
    U256::from(x)
}

/// Widen a `u128`
pub fn wide128(x: u128) -> U256 {
    U256::from(x)
}

/// Narrow to `u64`, failing if the value does not fit
pub fn to_u64(x: U256) -> ArithmeticResult<u64> {
    if x > U256::from(u64::MAX) {
        return Err(ArithmeticError::NarrowingOverflow(64));
    }
    Ok(x.low_u64())
}

/// Narrow to `u128`, failing if the value does not fit
pub fn to_u128(x: U256) -> ArithmeticResult<u128> {
    if x > U256::from(u128::MAX) {
        return Err(ArithmeticError::NarrowingOverflow(128));
    }
    Ok(x.low_u128())
}
