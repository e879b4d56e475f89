use crate::error::{LedgerError, Result};
use crate::wallet::keys::{PublicKey, PUBLIC_KEY_LEN};
use data_encoding::HEXLOWER;
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LEN: usize = 20;

/// The last 20 bytes of a public key.
///
/// This is a truncation, not a hash: two keys sharing their low 20 bytes map
/// to the same address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    value: [u8; ADDRESS_LEN],
}

impl Address {
    pub fn from_public_key(public_key: &PublicKey) -> Address {
        let mut value = [0u8; ADDRESS_LEN];
        value.copy_from_slice(&public_key.as_bytes()[PUBLIC_KEY_LEN - ADDRESS_LEN..]);
        Address { value }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Address> {
        if bytes.len() != ADDRESS_LEN {
            return Err(LedgerError::InvalidInput(format!(
                "address must be {ADDRESS_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut value = [0u8; ADDRESS_LEN];
        value.copy_from_slice(bytes);
        Ok(Address { value })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.value.to_vec()
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = HEXLOWER
            .decode(s.trim().to_lowercase().as_bytes())
            .map_err(|e| LedgerError::InvalidInput(format!("Invalid address hex: {e}")))?;
        Address::from_bytes(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.value))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
