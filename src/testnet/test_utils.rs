//! Test utilities for ledger testing

use crate::core::{Block, Chain, Header, MerkleTree, Transaction, TxInput, TxOutput};
use crate::storage::{MemoryBlockStore, MemoryTxStore};
use crate::utils::HASH_LEN;
use crate::wallet::{Address, KeyPair};
use rand::{Rng, RngCore};

pub fn random_hash() -> Vec<u8> {
    let mut hash = vec![0u8; HASH_LEN];
    rand::thread_rng().fill_bytes(&mut hash);
    hash
}

/// Unsigned block with a random height, previous hash and timestamp and no transactions.
pub fn random_block() -> Block {
    let mut rng = rand::thread_rng();
    let header = Header::new(
        rng.gen_range(1..1000),
        random_hash(),
        MerkleTree::calculate_merkle_root(&[]),
        rng.gen_range(0..i64::from(u32::MAX)),
    );
    Block::new(header, vec![])
}

/// Single-input transaction spending `(prev_hash, index)` with `key`, signed.
pub fn signed_transfer(
    key: &KeyPair,
    prev_hash: &[u8],
    index: u32,
    outputs: &[(u64, Address)],
) -> Transaction {
    let input = TxInput::new(prev_hash, index, key.public_key().as_bytes());
    let outputs = outputs
        .iter()
        .map(|(amount, address)| TxOutput::new(*amount, address))
        .collect();
    let mut tx = Transaction::new(vec![input], outputs);
    tx.sign_inputs(key).expect("failed to sign transaction");
    tx
}

/// Chain on fresh in-memory stores, holding only the genesis block.
pub fn memory_chain() -> Chain {
    Chain::new(
        Box::new(MemoryBlockStore::new()),
        Box::new(MemoryTxStore::new()),
    )
    .expect("failed to create chain")
}

/// Block on top of the current head of `chain`, signed by `producer`.
pub fn next_block(chain: &Chain, producer: &KeyPair, transactions: Vec<Transaction>) -> Block {
    let head = chain.head_header().expect("chain has a head");
    let prev_hash = head.hash().expect("head hash");
    let mut block = Block::new_block(head.get_height() + 1, prev_hash, transactions)
        .expect("failed to build block");
    block.sign(producer).expect("failed to sign block");
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_hashes_differ() {
        let a = random_hash();
        let b = random_hash();
        assert_eq!(a.len(), HASH_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_next_block_is_accepted() {
        let chain = memory_chain();
        let producer = KeyPair::generate().unwrap();
        let block = next_block(&chain, &producer, vec![]);
        assert!(block.verify());
        chain.add_block(&block).unwrap();
        assert_eq!(chain.height().unwrap(), 1);
    }

    #[test]
    fn test_signed_transfer_verifies() {
        let key = KeyPair::generate().unwrap();
        let tx = signed_transfer(&key, &random_hash(), 2, &[(5, key.address())]);
        assert!(tx.verify());
        assert_eq!(tx.get_inputs()[0].get_prev_out_index(), 2);
    }
}
