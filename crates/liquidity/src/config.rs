// liquidity/src/config.rs

//! Engine configuration loaded from TOML.

use crate::curve::CurveParams;
use crate::reserves::DEFAULT_MAX_RESERVE;
use ledger::{Address, Amount, AssetId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Controller settings plus the pools to create at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling for any single settled reserve
    #[serde(default = "default_max_reserve")]
    pub max_reserve: Amount,
    /// Pools created by `PoolController::bootstrap`, in order
    #[serde(default)]
    pub pools: Vec<PoolSpec>,
}

/// One pool to create at startup.
///
/// `asset_a` must sort before `asset_b`; the curve family comes from the
/// `type` tag of `curve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    pub asset_a: AssetId,
    pub asset_b: AssetId,
    pub creator: Address,
    /// Receives protocol-fee shares while `fee_on` is set
    pub fee_recipient: Address,
    #[serde(default)]
    pub fee_on: bool,
    pub curve: CurveParams,
}

fn default_max_reserve() -> Amount {
    DEFAULT_MAX_RESERVE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_reserve: DEFAULT_MAX_RESERVE,
            pools: vec![],
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
