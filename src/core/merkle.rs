use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{sha256_digest, HASH_LEN};

/// Merkle root over transaction hashes.
///
/// Leaves are combined pairwise with SHA-256; an odd node at any level is paired
/// with itself. A single leaf is still hashed with itself so the root never equals
/// a bare transaction hash. The root of an empty list is 32 zero bytes.
pub struct MerkleTree;

impl MerkleTree {
    pub fn calculate_merkle_root(hashes: &[Vec<u8>]) -> Vec<u8> {
        if hashes.is_empty() {
            return vec![0u8; HASH_LEN];
        }

        if hashes.len() == 1 {
            return Self::hash_pair(&hashes[0], &hashes[0]);
        }

        let mut current_level = hashes.to_vec();
        while current_level.len() > 1 {
            current_level = current_level
                .chunks(2)
                .map(|pair| Self::hash_pair(&pair[0], &pair[pair.len() - 1]))
                .collect();
        }

        current_level.swap_remove(0)
    }

    pub fn transactions_root(transactions: &[Transaction]) -> Result<Vec<u8>> {
        let hashes = transactions
            .iter()
            .map(Transaction::hash)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::calculate_merkle_root(&hashes))
    }

    fn hash_pair(left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut combined = Vec::with_capacity(left.len() + right.len());
        combined.extend_from_slice(left);
        combined.extend_from_slice(right);
        sha256_digest(&combined)
    }
}
