// ledger/src/memory.rs

use crate::{Address, Amount, AssetId, Ledger, LedgerError, LedgerResult, MintAuthority, Tokens};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LEDGER_ID: AtomicU64 = AtomicU64::new(1);

/// In-memory ledger keeping balances and supplies in hash maps
#[derive(Debug)]
pub struct InMemoryLedger {
    /// Distinguishes authorities issued by different ledger instances
    id: u64,
    /// Balances keyed by (account, asset)
    balances: HashMap<(Address, AssetId), Amount>,
    /// Total supply per known asset
    supplies: HashMap<AssetId, Amount>,
    /// Assets whose mint authority has been handed out
    authorized: HashSet<AssetId>,
    /// Journal of modifications (for nested rollback)
    modifications: Vec<Modification>,
}

impl InMemoryLedger {
    /// Create new empty ledger
    pub fn new() -> Self {
        Self {
            id: NEXT_LEDGER_ID.fetch_add(1, Ordering::Relaxed),
            balances: HashMap::new(),
            supplies: HashMap::new(),
            authorized: HashSet::new(),
            modifications: Vec::new(),
        }
    }

    /// Faucet: create `amount` of `asset` out of thin air for `account`.
    ///
    /// Unknown assets are registered on first use without a mint authority, so
    /// they behave like externally issued coins.
    pub fn credit(&mut self, account: &Address, asset: &AssetId, amount: Amount) -> LedgerResult<()> {
        let supply = self.total_supply(asset);
        let new_supply = supply
            .checked_add(amount)
            .ok_or_else(|| LedgerError::SupplyOverflow(asset.clone()))?;
        self.set_supply(asset.clone(), new_supply);
        self.deposit(account, Tokens::new(asset.clone(), amount))
    }

    /// Whether the asset has been seen by this ledger
    pub fn is_known(&self, asset: &AssetId) -> bool {
        self.supplies.contains_key(asset)
    }

    /// Depth of open checkpoints
    pub fn open_checkpoints(&self) -> usize {
        self.modifications
            .iter()
            .filter(|m| matches!(m, Modification::Checkpoint))
            .count()
    }

    fn check_authority(&self, authority: &MintAuthority) -> LedgerResult<()> {
        if authority.ledger_id() != self.id || !self.authorized.contains(authority.asset()) {
            return Err(LedgerError::UnauthorizedMint(authority.asset().clone()));
        }
        Ok(())
    }

    fn set_balance(&mut self, account: Address, asset: AssetId, amount: Amount) {
        let key = (account, asset);
        if self.in_transaction() {
            let old = self.balances.get(&key).copied();
            self.modifications.push(Modification::Balance { key: key.clone(), old });
        }
        self.balances.insert(key, amount);
    }

    fn set_supply(&mut self, asset: AssetId, amount: Amount) {
        if self.in_transaction() {
            let old = self.supplies.get(&asset).copied();
            self.modifications.push(Modification::Supply { asset: asset.clone(), old });
        }
        self.supplies.insert(asset, amount);
    }

    fn in_transaction(&self) -> bool {
        !self.modifications.is_empty()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for InMemoryLedger {
    fn register_asset(&mut self, asset: AssetId) -> LedgerResult<MintAuthority> {
        if self.is_known(&asset) {
            return Err(LedgerError::AssetAlreadyRegistered(asset));
        }
        self.set_supply(asset.clone(), 0);
        self.authorized.insert(asset.clone());
        if self.in_transaction() {
            self.modifications.push(Modification::Authorized { asset: asset.clone() });
        }
        tracing::debug!(%asset, "registered asset");
        Ok(MintAuthority::new(asset, self.id))
    }

    fn deposit(&mut self, account: &Address, tokens: Tokens) -> LedgerResult<()> {
        let asset = tokens.asset().clone();
        if !self.is_known(&asset) {
            return Err(LedgerError::UnknownAsset(asset));
        }
        let balance = self.balance_of(account, &asset);
        let new_balance = balance
            .checked_add(tokens.value())
            .ok_or_else(|| LedgerError::BalanceOverflow {
                account: *account,
                asset: asset.clone(),
            })?;
        self.set_balance(*account, asset, new_balance);
        Ok(())
    }

    fn withdraw(&mut self, account: &Address, asset: &AssetId, amount: Amount) -> LedgerResult<Tokens> {
        if !self.is_known(asset) {
            return Err(LedgerError::UnknownAsset(asset.clone()));
        }
        let balance = self.balance_of(account, asset);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: *account,
                asset: asset.clone(),
                required: amount,
                available: balance,
            });
        }
        self.set_balance(*account, asset.clone(), balance - amount);
        Ok(Tokens::new(asset.clone(), amount))
    }

    fn mint(&mut self, authority: &MintAuthority, amount: Amount) -> LedgerResult<Tokens> {
        self.check_authority(authority)?;
        let asset = authority.asset().clone();
        let new_supply = self
            .total_supply(&asset)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::SupplyOverflow(asset.clone()))?;
        self.set_supply(asset.clone(), new_supply);
        Ok(Tokens::new(asset, amount))
    }

    fn burn(&mut self, authority: &MintAuthority, tokens: Tokens) -> LedgerResult<()> {
        self.check_authority(authority)?;
        if tokens.asset() != authority.asset() {
            return Err(LedgerError::AssetMismatch {
                expected: authority.asset().clone(),
                actual: tokens.asset().clone(),
            });
        }
        let asset = authority.asset().clone();
        let supply = self.total_supply(&asset);
        let new_supply = supply
            .checked_sub(tokens.value())
            .ok_or(LedgerError::InsufficientTokens {
                asset: asset.clone(),
                required: tokens.value(),
                available: supply,
            })?;
        self.set_supply(asset, new_supply);
        Ok(())
    }

    fn balance_of(&self, account: &Address, asset: &AssetId) -> Amount {
        self.balances
            .get(&(*account, asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn total_supply(&self, asset: &AssetId) -> Amount {
        self.supplies.get(asset).copied().unwrap_or(0)
    }

    fn checkpoint(&mut self) {
        self.modifications.push(Modification::Checkpoint);
    }

    fn commit(&mut self) {
        // Fold the innermost level into its parent; the outermost commit
        // discards the journal.
        if let Some(pos) = self
            .modifications
            .iter()
            .rposition(|m| matches!(m, Modification::Checkpoint))
        {
            self.modifications.remove(pos);
        }
        if !self
            .modifications
            .iter()
            .any(|m| matches!(m, Modification::Checkpoint))
        {
            self.modifications.clear();
        }
    }

    fn rollback(&mut self) {
        while let Some(modification) = self.modifications.pop() {
            match modification {
                Modification::Checkpoint => break,
                Modification::Balance { key, old } => match old {
                    Some(amount) => {
                        self.balances.insert(key, amount);
                    }
                    None => {
                        self.balances.remove(&key);
                    }
                },
                Modification::Supply { asset, old } => match old {
                    Some(amount) => {
                        self.supplies.insert(asset, amount);
                    }
                    None => {
                        self.supplies.remove(&asset);
                    }
                },
                Modification::Authorized { asset } => {
                    self.authorized.remove(&asset);
                }
            }
        }
    }
}

/// Journal entry for rollback support
#[derive(Debug, Clone)]
enum Modification {
    Checkpoint,
    Balance {
        key: (Address, AssetId),
        old: Option<Amount>,
    },
    Supply {
        asset: AssetId,
        old: Option<Amount>,
    },
    Authorized {
        asset: AssetId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn alice() -> Address {
        Address::derive(b"alice")
    }

    fn bob() -> Address {
        Address::derive(b"bob")
    }

    #[test]
    fn test_credit_and_transfer() {
        let mut ledger = InMemoryLedger::new();
        let usdc = AssetId::from("USDC");
        ledger.credit(&alice(), &usdc, 1000).unwrap();

        ledger.transfer(&alice(), &bob(), &usdc, 300).unwrap();

        assert_eq!(ledger.balance_of(&alice(), &usdc), 700);
        assert_eq!(ledger.balance_of(&bob(), &usdc), 300);
        assert_eq!(ledger.total_supply(&usdc), 1000);
    }

    #[test]
    fn test_withdraw_never_clamps() {
        let mut ledger = InMemoryLedger::new();
        let usdc = AssetId::from("USDC");
        ledger.credit(&alice(), &usdc, 10).unwrap();

        let err = ledger.withdraw(&alice(), &usdc, 11).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available: 10, .. }));
        assert_eq!(ledger.balance_of(&alice(), &usdc), 10);
    }

    #[test]
    fn test_mint_requires_matching_authority() {
        let mut ledger = InMemoryLedger::new();
        let mut other = InMemoryLedger::new();
        let share = AssetId::from("LP");
        let authority = ledger.register_asset(share.clone()).unwrap();
        let foreign = other.register_asset(share.clone()).unwrap();

        let tokens = ledger.mint(&authority, 50).unwrap();
        assert_eq!(ledger.total_supply(&share), 50);
        ledger.deposit(&alice(), tokens).unwrap();

        assert!(matches!(ledger.mint(&foreign, 1), Err(LedgerError::UnauthorizedMint(_))));
        assert!(matches!(
            ledger.register_asset(share),
            Err(LedgerError::AssetAlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_burn_reduces_supply() {
        let mut ledger = InMemoryLedger::new();
        let share = AssetId::from("LP");
        let authority = ledger.register_asset(share.clone()).unwrap();
        let tokens = ledger.mint(&authority, 50).unwrap();
        ledger.deposit(&alice(), tokens).unwrap();

        let tokens = ledger.withdraw(&alice(), &share, 20).unwrap();
        ledger.burn(&authority, tokens).unwrap();

        assert_eq!(ledger.total_supply(&share), 30);
        assert_eq!(ledger.balance_of(&alice(), &share), 30);
    }

    #[test]
    fn test_rollback_restores_state() {
        let mut ledger = InMemoryLedger::new();
        let usdc = AssetId::from("USDC");
        ledger.credit(&alice(), &usdc, 100).unwrap();

        ledger.checkpoint();
        ledger.transfer(&alice(), &bob(), &usdc, 60).unwrap();
        let share = AssetId::from("LP");
        let authority = ledger.register_asset(share.clone()).unwrap();
        let tokens = ledger.mint(&authority, 5).unwrap();
        ledger.deposit(&bob(), tokens).unwrap();
        ledger.rollback();

        assert_eq!(ledger.balance_of(&alice(), &usdc), 100);
        assert_eq!(ledger.balance_of(&bob(), &usdc), 0);
        assert_eq!(ledger.balance_of(&bob(), &share), 0);
        assert!(!ledger.is_known(&share));
        assert_eq!(ledger.open_checkpoints(), 0);
    }

    #[test]
    fn test_nested_commit_then_outer_rollback() {
        let mut ledger = InMemoryLedger::new();
        let usdc = AssetId::from("USDC");
        ledger.credit(&alice(), &usdc, 100).unwrap();

        ledger.checkpoint();
        ledger.checkpoint();
        ledger.transfer(&alice(), &bob(), &usdc, 40).unwrap();
        ledger.commit();
        assert_eq!(ledger.balance_of(&bob(), &usdc), 40);
        ledger.rollback();

        assert_eq!(ledger.balance_of(&alice(), &usdc), 100);
        assert_eq!(ledger.balance_of(&bob(), &usdc), 0);
    }

    #[test]
    fn test_commit_keeps_state() {
        let mut ledger = InMemoryLedger::new();
        let usdc = AssetId::from("USDC");
        ledger.credit(&alice(), &usdc, 100).unwrap();

        ledger.checkpoint();
        ledger.transfer(&alice(), &bob(), &usdc, 40).unwrap();
        ledger.commit();

        assert_eq!(ledger.balance_of(&bob(), &usdc), 40);
        assert_eq!(ledger.open_checkpoints(), 0);
    }

    proptest! {
        #[test]
        fn transfers_conserve_supply(
            seed in 1u64..1_000_000,
            moves in prop::collection::vec((0u8..2, 0u64..2_000_000), 1..20),
        ) {
            let mut ledger = InMemoryLedger::new();
            let usdc = AssetId::from("USDC");
            ledger.credit(&alice(), &usdc, seed).unwrap();
            ledger.credit(&bob(), &usdc, seed).unwrap();

            for (direction, amount) in moves {
                let (from, to) = if direction == 0 { (alice(), bob()) } else { (bob(), alice()) };
                let before = ledger.balance_of(&from, &usdc);
                let result = ledger.transfer(&from, &to, &usdc, amount);
                prop_assert_eq!(result.is_ok(), amount <= before);
                prop_assert_eq!(
                    ledger.balance_of(&alice(), &usdc) + ledger.balance_of(&bob(), &usdc),
                    2 * seed
                );
            }
            prop_assert_eq!(ledger.total_supply(&usdc), 2 * seed);
        }
    }
}
