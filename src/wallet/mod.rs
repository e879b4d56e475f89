//! Key management and address derivation
//!
//! Ed25519 key pairs, signatures, 20-byte addresses and the on-disk key file
//! a validator signs blocks with.

pub mod address;
pub mod keys;
pub mod wallets;

pub use address::{Address, ADDRESS_LEN};
pub use keys::{
    verify_bytes, KeyPair, PublicKey, Signature, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SEED_LEN,
    SIGNATURE_LEN,
};
pub use wallets::{KeyFile, KEY_FILE};
