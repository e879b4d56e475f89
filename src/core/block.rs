use crate::core::{MerkleTree, Transaction};
use crate::error::Result;
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use crate::wallet::{verify_bytes, KeyPair, Signature};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

pub const BLOCK_VERSION: u32 = 1;

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Header {
    version: u32,
    height: u64,
    prev_hash: Vec<u8>,
    tx_root: Vec<u8>,
    timestamp: i64,
}

impl Header {
    pub fn new(height: u64, prev_hash: Vec<u8>, tx_root: Vec<u8>, timestamp: i64) -> Header {
        Header {
            version: BLOCK_VERSION,
            height,
            prev_hash,
            tx_root,
            timestamp,
        }
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    pub fn get_height(&self) -> u64 {
        self.height
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.prev_hash.as_slice()
    }

    pub fn get_tx_root(&self) -> &[u8] {
        self.tx_root.as_slice()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    /// SHA-256 over the canonical encoding of the header fields.
    pub fn hash(&self) -> Result<Vec<u8>> {
        Ok(sha256_digest(&serialize(self)?))
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    header: Header,
    transactions: Vec<Transaction>,
    public_key: Vec<u8>,
    signature: Vec<u8>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Block {
        Block {
            header,
            transactions,
            public_key: vec![],
            signature: vec![],
        }
    }

    /// Unsigned block on top of `prev_hash`, committing to `transactions`
    /// through the header's transactions root.
    pub fn new_block(
        height: u64,
        prev_hash: Vec<u8>,
        transactions: Vec<Transaction>,
    ) -> Result<Block> {
        let tx_root = MerkleTree::transactions_root(&transactions)?;
        let header = Header::new(height, prev_hash, tx_root, current_timestamp()?);
        Ok(Block::new(header, transactions))
    }

    pub fn get_header(&self) -> &Header {
        &self.header
    }

    pub fn get_height(&self) -> u64 {
        self.header.height
    }

    pub fn get_prev_hash(&self) -> &[u8] {
        self.header.get_prev_hash()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    /// Block hash is the header hash. Transactions are covered through the
    /// header's transactions root, which `verify` recomputes.
    pub fn hash(&self) -> Result<Vec<u8>> {
        self.header.hash()
    }

    pub fn hash_hex(&self) -> Result<String> {
        Ok(HEXLOWER.encode(&self.hash()?))
    }

    /// Attaches the producer's public key and its signature over the block hash.
    pub fn sign(&mut self, key: &KeyPair) -> Result<Signature> {
        let signature = key.sign(&self.hash()?);
        self.public_key = key.public_key().to_vec();
        self.signature = signature.to_vec();
        Ok(signature)
    }

    pub fn verify_transactions_root(&self) -> bool {
        match MerkleTree::transactions_root(&self.transactions) {
            Ok(root) => root.as_slice() == self.header.get_tx_root(),
            Err(e) => {
                log::error!("Failed to compute transactions root: {e}");
                false
            }
        }
    }

    pub fn verify_signature(&self) -> bool {
        match self.hash() {
            Ok(hash) => verify_bytes(&self.public_key, &hash, &self.signature),
            Err(e) => {
                log::error!("Failed to hash block header: {e}");
                false
            }
        }
    }

    /// True when the transactions match the header root and the signature
    /// verifies against the embedded public key. Never panics.
    pub fn verify(&self) -> bool {
        self.verify_transactions_root() && self.verify_signature()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TxInput, TxOutput};
    use crate::testnet::{random_block, random_hash};

    #[test]
    fn test_hash_block_is_header_hash() {
        let block = random_block();
        let hash = block.hash().unwrap();
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, block.get_header().hash().unwrap());
    }

    #[test]
    fn test_sign_block() {
        let key = KeyPair::generate().unwrap();
        let mut block = random_block();
        let signature = block.sign(&key).unwrap();

        assert_eq!(signature.as_bytes().len(), 64);
        assert_eq!(block.get_public_key(), key.public_key().as_bytes());
        assert!(signature.verify(&key.public_key(), &block.hash().unwrap()));
        assert!(block.verify());
    }

    #[test]
    fn test_unsigned_block_fails_verification() {
        assert!(!random_block().verify());
    }

    #[test]
    fn test_header_tamper_breaks_signature() {
        let key = KeyPair::generate().unwrap();
        let mut block = random_block();
        block.sign(&key).unwrap();
        block.header.timestamp += 1;
        assert!(!block.verify_signature());
        assert!(!block.verify());
    }

    #[test]
    fn test_transaction_tamper_is_detected() {
        let key = KeyPair::generate().unwrap();
        let tx = Transaction::new(
            vec![TxInput::new(&random_hash(), 0, key.public_key().as_bytes())],
            vec![TxOutput::new(10, &key.address())],
        );
        let mut block = Block::new_block(1, random_hash(), vec![tx]).unwrap();
        block.sign(&key).unwrap();
        assert!(block.verify());

        block.transactions_mut()[0] =
            Transaction::new(vec![], vec![TxOutput::new(10_000, &key.address())]);
        // the header, and therefore the signature, is untouched
        assert!(block.verify_signature());
        assert!(!block.verify_transactions_root());
        assert!(!block.verify());
    }

    #[test]
    fn test_block_bytes_round_trip() {
        let key = KeyPair::generate().unwrap();
        let mut block = random_block();
        block.sign(&key).unwrap();
        let decoded = Block::deserialize(&block.serialize().unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert!(decoded.verify());
    }
}
