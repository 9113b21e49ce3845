// ledger/src/lib.rs

//! Asset custody for the liquidity engine
//!
//! This crate provides:
//! - Account addresses and asset identifiers
//! - In-flight token values and mint capabilities
//! - The `Ledger` trait the pool engine calls into
//! - An in-memory ledger with checkpoint/rollback support

pub mod address;
pub mod asset;
pub mod tokens;
pub mod memory;

pub use address::Address;
pub use asset::{Amount, AssetId, Timestamp};
pub use tokens::{MintAuthority, Tokens};
pub use memory::InMemoryLedger;

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur in ledger operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("Asset already registered: {0}")]
    AssetAlreadyRegistered(AssetId),

    #[error("Insufficient balance of {asset} in {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: Address,
        asset: AssetId,
        required: Amount,
        available: Amount,
    },

    #[error("Insufficient tokens of {asset}: required {required}, available {available}")]
    InsufficientTokens {
        asset: AssetId,
        required: Amount,
        available: Amount,
    },

    #[error("Mint authority does not cover asset {0}")]
    UnauthorizedMint(AssetId),

    #[error("Asset mismatch: expected {expected}, got {actual}")]
    AssetMismatch { expected: AssetId, actual: AssetId },

    #[error("Supply overflow for asset {0}")]
    SupplyOverflow(AssetId),

    #[error("Balance overflow for asset {asset} in {account}")]
    BalanceOverflow { account: Address, asset: AssetId },
}

/// External asset ledger.
///
/// Every method is atomic: it either applies completely or returns an error
/// without side effects. Withdrawals never clamp to the available balance.
pub trait Ledger {
    /// Register a new asset and hand back the only authority able to mint or
    /// burn it.
    fn register_asset(&mut self, asset: AssetId) -> LedgerResult<MintAuthority>;

    /// Credit `tokens` to `account`.
    fn deposit(&mut self, account: &Address, tokens: Tokens) -> LedgerResult<()>;

    /// Debit `amount` of `asset` from `account`.
    fn withdraw(&mut self, account: &Address, asset: &AssetId, amount: Amount) -> LedgerResult<Tokens>;

    /// Create new tokens of the asset covered by `authority`.
    fn mint(&mut self, authority: &MintAuthority, amount: Amount) -> LedgerResult<Tokens>;

    /// Destroy `tokens`, reducing total supply.
    fn burn(&mut self, authority: &MintAuthority, tokens: Tokens) -> LedgerResult<()>;

    fn balance_of(&self, account: &Address, asset: &AssetId) -> Amount;

    fn total_supply(&self, asset: &AssetId) -> Amount;

    /// Begin a nested unit of work.
    fn checkpoint(&mut self);

    /// Keep every change made since the matching checkpoint.
    fn commit(&mut self);

    /// Undo every change made since the matching checkpoint.
    fn rollback(&mut self);

    /// Move `amount` of `asset` between two accounts.
    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        asset: &AssetId,
        amount: Amount,
    ) -> LedgerResult<()> {
        let tokens = self.withdraw(from, asset, amount)?;
        self.deposit(to, tokens)
    }
}
