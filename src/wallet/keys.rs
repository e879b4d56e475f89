use crate::error::{LedgerError, Result};
use crate::wallet::Address;
use data_encoding::HEXLOWER;
use ring::rand::{SecureRandom, SystemRandom};
use ring::signature::{Ed25519KeyPair, KeyPair as _, UnparsedPublicKey, ED25519};
use std::fmt;
use zeroize::Zeroize;

pub const SEED_LEN: usize = 32;
pub const PRIVATE_KEY_LEN: usize = 64;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 key pair derived from a 32-byte seed.
///
/// The private key is laid out as `seed || public key` (64 bytes). The seed is
/// wiped from memory when the key pair is dropped.
pub struct KeyPair {
    seed: [u8; SEED_LEN],
    inner: Ed25519KeyPair,
}

impl KeyPair {
    /// Draws a fresh seed from the operating system's secure random source.
    pub fn generate() -> Result<KeyPair> {
        let rng = SystemRandom::new();
        let mut seed = [0u8; SEED_LEN];
        rng.fill(&mut seed)
            .map_err(|_| LedgerError::Crypto("Failed to draw random seed".to_string()))?;
        let pair = Self::from_seed(&seed);
        seed.zeroize();
        pair
    }

    pub fn from_seed(seed: &[u8]) -> Result<KeyPair> {
        if seed.len() != SEED_LEN {
            return Err(LedgerError::InvalidInput(format!(
                "seed must be {SEED_LEN} bytes, got {}",
                seed.len()
            )));
        }
        let inner = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| LedgerError::InvalidInput(format!("Rejected seed: {e}")))?;
        let mut fixed = [0u8; SEED_LEN];
        fixed.copy_from_slice(seed);
        Ok(KeyPair { seed: fixed, inner })
    }

    pub fn from_seed_hex(seed_hex: &str) -> Result<KeyPair> {
        let mut seed = HEXLOWER
            .decode(seed_hex.trim().to_lowercase().as_bytes())
            .map_err(|e| LedgerError::InvalidInput(format!("Invalid seed hex: {e}")))?;
        let pair = Self::from_seed(&seed);
        seed.zeroize();
        pair
    }

    pub fn seed_hex(&self) -> String {
        HEXLOWER.encode(&self.seed)
    }

    pub fn private_key_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PRIVATE_KEY_LEN);
        bytes.extend_from_slice(&self.seed);
        bytes.extend_from_slice(self.inner.public_key().as_ref());
        bytes
    }

    pub fn public_key(&self) -> PublicKey {
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(self.inner.public_key().as_ref());
        PublicKey { key }
    }

    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let mut value = [0u8; SIGNATURE_LEN];
        value.copy_from_slice(self.inner.sign(message).as_ref());
        Signature { value }
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    key: [u8; PUBLIC_KEY_LEN],
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return Err(LedgerError::InvalidInput(format!(
                "public key must be {PUBLIC_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; PUBLIC_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(PublicKey { key })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.key.to_vec()
    }

    /// Never panics: a point that does not decode simply fails verification.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        UnparsedPublicKey::new(&ED25519, &self.key)
            .verify(message, signature.as_bytes())
            .is_ok()
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(self)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", HEXLOWER.encode(&self.key))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.key))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    value: [u8; SIGNATURE_LEN],
}

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Signature> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(LedgerError::InvalidInput(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut value = [0u8; SIGNATURE_LEN];
        value.copy_from_slice(bytes);
        Ok(Signature { value })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.value.to_vec()
    }

    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> bool {
        public_key.verify(message, self)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", HEXLOWER.encode(&self.value))
    }
}

/// Byte-level verification used by block and transaction checks. Any wrong-size
/// key or signature is a failed verification, not an error.
pub fn verify_bytes(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    match (PublicKey::from_bytes(public_key), Signature::from_bytes(signature)) {
        (Ok(key), Ok(sig)) => key.verify(message, &sig),
        _ => false,
    }
}
