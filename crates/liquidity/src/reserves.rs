// liquidity/src/reserves.rs

use crate::{LiquidityError, LiquidityResult};
use ledger::{Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// Default ceiling for a single settled reserve.
///
/// Leaves one bit of `u64` headroom so in-flight deposits on top of a full
/// reserve can still be represented before the next settle.
pub const DEFAULT_MAX_RESERVE: Amount = u64::MAX >> 1;

/// Settled reserves of a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveLedger {
    reserve_a: Amount,
    reserve_b: Amount,
    last_update_time: Timestamp,
    max_reserve: Amount,
}

impl ReserveLedger {
    /// Create empty reserves with the given ceiling
    pub fn new(max_reserve: Amount) -> Self {
        Self {
            reserve_a: 0,
            reserve_b: 0,
            last_update_time: 0,
            max_reserve,
        }
    }

    /// `(reserve_a, reserve_b, last_update_time)`
    pub fn get(&self) -> (Amount, Amount, Timestamp) {
        (self.reserve_a, self.reserve_b, self.last_update_time)
    }

    pub fn reserve_a(&self) -> Amount {
        self.reserve_a
    }

    pub fn reserve_b(&self) -> Amount {
        self.reserve_b
    }

    pub fn is_empty(&self) -> bool {
        self.reserve_a == 0 && self.reserve_b == 0
    }

    /// Reject balances above the ceiling without touching the reserves.
    pub fn check(&self, balance_a: Amount, balance_b: Amount) -> LiquidityResult<()> {
        for balance in [balance_a, balance_b] {
            if balance > self.max_reserve {
                return Err(LiquidityError::ReserveOverflow {
                    balance,
                    max: self.max_reserve,
                });
            }
        }
        Ok(())
    }

    /// Overwrite reserves with freshly observed balances.
    ///
    /// The timestamp never moves backwards, even if `now` does.
    pub fn settle(&mut self, balance_a: Amount, balance_b: Amount, now: Timestamp) -> LiquidityResult<()> {
        self.check(balance_a, balance_b)?;
        self.reserve_a = balance_a;
        self.reserve_b = balance_b;
        self.last_update_time = now.max(self.last_update_time);
        Ok(())
    }
}

impl Default for ReserveLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESERVE)
    }
}
