// ledger/src/tokens.rs

use crate::{Amount, AssetId, LedgerError, LedgerResult};

/// A quantity of one asset that has left an account (or been minted) and has
/// not yet been deposited or burned.
///
/// Deliberately neither `Clone` nor `Copy`: value can only be moved, split or
/// merged, never duplicated.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "tokens must be deposited or burned"]
pub struct Tokens {
    asset: AssetId,
    value: Amount,
}

impl Tokens {
    /// Only the ledger creates tokens with a nonzero value.
    pub(crate) fn new(asset: AssetId, value: Amount) -> Self {
        Self { asset, value }
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn value(&self) -> Amount {
        self.value
    }

    /// Absorb `other` into `self`.
    pub fn merge(&mut self, other: Tokens) -> LedgerResult<()> {
        if other.asset != self.asset {
            return Err(LedgerError::AssetMismatch {
                expected: self.asset.clone(),
                actual: other.asset,
            });
        }
        self.value = self
            .value
            .checked_add(other.value)
            .ok_or_else(|| LedgerError::SupplyOverflow(self.asset.clone()))?;
        Ok(())
    }

    /// Take `amount` out of `self`.
    pub fn split(&mut self, amount: Amount) -> LedgerResult<Tokens> {
        if amount > self.value {
            return Err(LedgerError::InsufficientTokens {
                asset: self.asset.clone(),
                required: amount,
                available: self.value,
            });
        }
        self.value -= amount;
        Ok(Tokens::new(self.asset.clone(), amount))
    }
}

/// Capability to mint and burn one asset.
///
/// Issued exactly once per asset by `Ledger::register_asset`; it cannot be
/// cloned or constructed outside this crate.
#[derive(Debug)]
pub struct MintAuthority {
    asset: AssetId,
    ledger_id: u64,
}

impl MintAuthority {
    pub(crate) fn new(asset: AssetId, ledger_id: u64) -> Self {
        Self { asset, ledger_id }
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub(crate) fn ledger_id(&self) -> u64 {
        self.ledger_id
    }
}
