// ledger/src/asset.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Token amount in base units
pub type Amount = u64;

/// Timestamp in Unix epoch seconds
pub type Timestamp = u64;

/// Asset identifier.
///
/// Ordering is lexicographic on the canonical name, which gives every pair of
/// assets exactly one canonical orientation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AssetId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
