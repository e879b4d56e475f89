use crate::core::{Block, Header, MerkleTree, Transaction, TxOutput};
use crate::error::Result;
use crate::wallet::KeyPair;

/// Well-known seed of the genesis producer. Every node derives the same key
/// from it, so any node can check the genesis signature on its own.
pub const GENESIS_SEED: &str = "68c21e93b509d6de263c61b9754f9285fd8c3709e579f5baf4a83d874164c937";

/// Amount minted to the genesis address.
pub const GENESIS_AMOUNT: u64 = 1000;

pub fn genesis_key() -> Result<KeyPair> {
    KeyPair::from_seed_hex(GENESIS_SEED)
}

/// Deterministic genesis block: height 0, empty previous hash, timestamp 0 and a
/// single input-less transaction paying `GENESIS_AMOUNT` to the genesis address.
pub fn genesis_block() -> Result<Block> {
    let key = genesis_key()?;
    let tx = Transaction::new(vec![], vec![TxOutput::new(GENESIS_AMOUNT, &key.address())]);
    let transactions = vec![tx];
    let tx_root = MerkleTree::transactions_root(&transactions)?;

    let mut block = Block::new(Header::new(0, vec![], tx_root, 0), transactions);
    block.sign(&key)?;
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_is_deterministic() {
        let a = genesis_block().unwrap();
        let b = genesis_block().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn test_genesis_verifies_against_embedded_key() {
        let block = genesis_block().unwrap();
        assert!(block.verify());
        assert_eq!(block.get_public_key(), genesis_key().unwrap().public_key().as_bytes());
        assert_eq!(block.get_height(), 0);
        assert!(block.get_prev_hash().is_empty());
    }

    #[test]
    fn test_genesis_funds_genesis_address() {
        let block = genesis_block().unwrap();
        let tx = &block.get_transactions()[0];
        assert!(tx.is_minting());
        assert_eq!(tx.get_outputs().len(), 1);
        assert_eq!(tx.get_outputs()[0].get_amount(), GENESIS_AMOUNT);
        assert!(tx.get_outputs()[0].is_locked_with(&genesis_key().unwrap().address()));
    }
}
