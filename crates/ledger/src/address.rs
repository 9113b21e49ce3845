// ledger/src/address.rs

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Address length in bytes
pub const ADDRESS_SIZE: usize = 20;

/// Ledger account address, serialized as a `0x`-prefixed hex string
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Create address from bytes
    pub fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive a deterministic address from arbitrary seed bytes.
    ///
    /// Takes the trailing 20 bytes of the SHA3-256 digest, the same way
    /// account addresses are cut from a public key hash.
    pub fn derive(seed: &[u8]) -> Self {
        let digest = Sha3_256::digest(seed);
        let mut address = [0u8; ADDRESS_SIZE];
        address.copy_from_slice(&digest[12..32]);
        Self(address)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, String> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        if bytes.len() != ADDRESS_SIZE {
            return Err("Invalid address length".into());
        }
        let mut arr = [0u8; ADDRESS_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// The all-zero address, used as the sink for permanently retired shares.
    /// The pool engine refuses to redeem anything on its behalf.
    pub fn zero() -> Self {
        Self([0u8; ADDRESS_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_SIZE]
    }
}

impl TryFrom<String> for Address {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
