//! Utility functions and helpers
//!
//! Hashing, timestamps and the canonical binary encoding used for hashing and storage.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest, HASH_LEN};

pub use serialization::{deserialize, serialize};
