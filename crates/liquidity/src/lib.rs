// liquidity/src/lib.rs

//! Liquidity pool engine
//!
//! This crate implements the accounting and invariant math behind
//! automated-market-maker pools:
//! - Overflow-checked wide arithmetic
//! - Settled reserve bookkeeping
//! - Constant-product, stable and piecewise pricing curves
//! - Pool state with protocol-fee checkpoints and a re-entrancy lock
//! - A controller running add/remove liquidity and swaps against a ledger

pub mod math;
pub mod reserves;
pub mod curve;
pub mod pool;
pub mod controller;
pub mod config;

pub use math::{ArithmeticError, U256};
pub use reserves::{ReserveLedger, DEFAULT_MAX_RESERVE};
pub use curve::{ConstantProduct, Curve, CurveParams, CurveType, FeeAccrual, Piecewise, StableCurve};
pub use pool::{Pool, PoolKey, PoolMetadata};
pub use controller::{PoolController, SwapRequest};
pub use config::{EngineConfig, PoolSpec};

use ledger::{Address, Amount, AssetId, LedgerError};

/// Shares permanently retired to the zero address on a pool's first deposit
pub const MINIMUM_LIQUIDITY: Amount = 1_000;

/// Denominator for fees and rates expressed in basis points
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Result type for liquidity operations
pub type LiquidityResult<T> = Result<T, LiquidityError>;

/// Broad error classes, for callers that only need to know how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Reentrancy,
    Arithmetic,
    Invariant,
    Slippage,
    Ledger,
}

/// Errors that can occur in liquidity operations
#[derive(Debug, thiserror::Error)]
pub enum LiquidityError {
    #[error("Identical assets in pair: {0}")]
    IdenticalAssets(AssetId),

    #[error("Pair not in canonical order: {asset_a} must sort before {asset_b}")]
    UnorderedPair { asset_a: AssetId, asset_b: AssetId },

    #[error("Pool already exists: {0}")]
    PoolAlreadyExists(PoolKey),

    #[error("Pool not found: {0}")]
    PoolNotFound(PoolKey),

    #[error("Asset {0} is not part of the pool")]
    AssetNotInPool(AssetId),

    #[error("Curve parameters do not match pool curve {expected}: got {actual}")]
    CurveMismatch { expected: CurveType, actual: CurveType },

    #[error("Invalid curve parameters: {0}")]
    InvalidCurveParams(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient amount")]
    InsufficientAmount,

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    #[error("Insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    #[error("Insufficient output amount")]
    InsufficientOutputAmount,

    #[error("Insufficient input amount")]
    InsufficientInputAmount,

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(Address),

    #[error("Invalid withdrawer: {0}")]
    InvalidWithdrawer(Address),

    #[error("Reserve overflow: balance {balance} exceeds maximum {max}")]
    ReserveOverflow { balance: Amount, max: Amount },

    #[error("Pool {0} is locked")]
    Reentrancy(PoolKey),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("Invariant violated on {curve} curve")]
    InvariantViolation { curve: CurveType },

    #[error("Slippage: got ({amount_a}, {amount_b}), minimum ({min_a}, {min_b})")]
    Slippage {
        amount_a: Amount,
        amount_b: Amount,
        min_a: Amount,
        min_b: Amount,
    },

    #[error("Slippage: output {amount_out} below minimum {min_amount_out}")]
    OutputBelowMinimum { amount_out: Amount, min_amount_out: Amount },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl LiquidityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LiquidityError::Reentrancy(_) => ErrorKind::Reentrancy,
            LiquidityError::Arithmetic(_) | LiquidityError::ReserveOverflow { .. } => ErrorKind::Arithmetic,
            LiquidityError::InvariantViolation { .. } => ErrorKind::Invariant,
            LiquidityError::Slippage { .. } | LiquidityError::OutputBelowMinimum { .. } => ErrorKind::Slippage,
            LiquidityError::Ledger(_) => ErrorKind::Ledger,
            _ => ErrorKind::Validation,
        }
    }
}
