// Transactions move value in the UTXO model: inputs point at outputs of earlier
// transactions, outputs lock an amount to a 20-byte address.

use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize, sha256_digest};
use crate::wallet::{verify_bytes, Address, KeyPair, Signature};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

pub const TX_VERSION: u32 = 1;

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    prev_tx_hash: Vec<u8>,
    prev_out_index: u32,
    public_key: Vec<u8>,
    signature: Vec<u8>, // empty until signed, and cleared while hashing for signatures
}

impl TxInput {
    pub fn new(prev_tx_hash: &[u8], prev_out_index: u32, public_key: &[u8]) -> TxInput {
        TxInput {
            prev_tx_hash: prev_tx_hash.to_vec(),
            prev_out_index,
            public_key: public_key.to_vec(),
            signature: vec![],
        }
    }

    pub fn get_prev_tx_hash(&self) -> &[u8] {
        self.prev_tx_hash.as_slice()
    }

    pub fn get_prev_out_index(&self) -> u32 {
        self.prev_out_index
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn set_signature(&mut self, signature: &Signature) {
        self.signature = signature.to_vec();
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxOutput {
    amount: u64,
    address: Vec<u8>,
}

impl TxOutput {
    pub fn new(amount: u64, address: &Address) -> TxOutput {
        TxOutput {
            amount,
            address: address.to_vec(),
        }
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_address(&self) -> &[u8] {
        self.address.as_slice()
    }

    pub fn is_locked_with(&self, address: &Address) -> bool {
        self.address.as_slice() == address.as_bytes()
    }
}

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    version: u32,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
        Transaction {
            version: TX_VERSION,
            inputs,
            outputs,
        }
    }

    pub fn get_version(&self) -> u32 {
        self.version
    }

    pub fn get_inputs(&self) -> &[TxInput] {
        self.inputs.as_slice()
    }

    pub fn get_outputs(&self) -> &[TxOutput] {
        self.outputs.as_slice()
    }

    pub fn input_mut(&mut self, index: usize) -> Option<&mut TxInput> {
        self.inputs.get_mut(index)
    }

    /// Transactions without inputs mint value; only the genesis block carries one.
    pub fn is_minting(&self) -> bool {
        self.inputs.is_empty()
    }

    /// SHA-256 of the canonical encoding, including any signatures already attached.
    pub fn hash(&self) -> Result<Vec<u8>> {
        Ok(sha256_digest(&self.serialize()?))
    }

    pub fn hash_hex(&self) -> Result<String> {
        Ok(HEXLOWER.encode(&self.hash()?))
    }

    // Scratch copy with every input signature cleared; the original is never touched.
    fn unsigned_copy(&self) -> Transaction {
        let mut tx_copy = self.clone();
        for input in tx_copy.inputs.iter_mut() {
            input.signature.clear();
        }
        tx_copy
    }

    /// The message every input signs: the hash of the transaction with all input
    /// signatures cleared, so inputs can be signed in any order.
    pub fn signing_hash(&self) -> Result<Vec<u8>> {
        self.unsigned_copy().hash()
    }

    pub fn sign(&self, key: &KeyPair) -> Result<Signature> {
        Ok(key.sign(&self.signing_hash()?))
    }

    /// Signs and attaches a signature to every input spent by `key`.
    /// Returns the number of inputs signed.
    pub fn sign_inputs(&mut self, key: &KeyPair) -> Result<usize> {
        let signature = self.sign(key)?;
        let public_key = key.public_key();
        let mut signed = 0;
        for input in self.inputs.iter_mut() {
            if input.public_key.as_slice() == public_key.as_bytes() {
                input.set_signature(&signature);
                signed += 1;
            }
        }
        Ok(signed)
    }

    /// Checks every input's signature against its own public key. Any unsigned
    /// input or bad signature fails the whole transaction.
    pub fn verify(&self) -> bool {
        if self.inputs.is_empty() {
            return true;
        }

        let message = match self.signing_hash() {
            Ok(hash) => hash,
            Err(e) => {
                log::error!("Transaction hashing failed during verification: {e}");
                return false;
            }
        };

        for input in &self.inputs {
            if !input.is_signed() {
                return false;
            }
            if !verify_bytes(&input.public_key, &message, &input.signature) {
                return false;
            }
        }
        true
    }

    pub fn get_output_value(&self) -> Result<u64> {
        let mut total = 0u64;
        for output in &self.outputs {
            total = total
                .checked_add(output.amount)
                .ok_or_else(|| LedgerError::Validation("output value overflow".to_string()))?;
        }
        Ok(total)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::random_hash;

    fn split_transaction(spender: &KeyPair, recipient: &Address) -> Transaction {
        let input = TxInput::new(&random_hash(), 0, spender.public_key().as_bytes());
        Transaction::new(
            vec![input],
            vec![
                TxOutput::new(100, recipient),
                TxOutput::new(900, &spender.address()),
            ],
        )
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let spender = KeyPair::generate().unwrap();
        let recipient = KeyPair::generate().unwrap().address();
        let mut tx = split_transaction(&spender, &recipient);

        let signature = tx.sign(&spender).unwrap();
        tx.input_mut(0).unwrap().set_signature(&signature);

        assert!(tx.verify());
        assert_eq!(tx.get_output_value().unwrap(), 1000);
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let spender = KeyPair::generate().unwrap();
        let intruder = KeyPair::generate().unwrap();
        let recipient = KeyPair::generate().unwrap().address();
        let mut tx = split_transaction(&spender, &recipient);

        let signature = tx.sign(&intruder).unwrap();
        tx.input_mut(0).unwrap().set_signature(&signature);

        assert!(!tx.verify());
    }

    #[test]
    fn test_unsigned_input_fails() {
        let spender = KeyPair::generate().unwrap();
        let tx = split_transaction(&spender, &spender.address());
        assert!(!tx.verify());
    }

    #[test]
    fn test_verify_does_not_mutate() {
        let spender = KeyPair::generate().unwrap();
        let mut tx = split_transaction(&spender, &spender.address());
        tx.sign_inputs(&spender).unwrap();

        let before = tx.clone();
        let hash_before = tx.hash().unwrap();
        assert!(tx.verify());
        assert!(tx.verify());
        assert_eq!(tx, before);
        assert_eq!(tx.hash().unwrap(), hash_before);
    }

    #[test]
    fn test_tampered_output_breaks_signature() {
        let spender = KeyPair::generate().unwrap();
        let mut tx = split_transaction(&spender, &spender.address());
        tx.sign_inputs(&spender).unwrap();

        let mut tampered = tx.clone();
        tampered.outputs[0].amount = 1_000_000;
        assert!(!tampered.verify());
    }

    #[test]
    fn test_multi_input_signing_in_any_order() {
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let mut tx = Transaction::new(
            vec![
                TxInput::new(&random_hash(), 0, alice.public_key().as_bytes()),
                TxInput::new(&random_hash(), 1, bob.public_key().as_bytes()),
            ],
            vec![TxOutput::new(5, &bob.address())],
        );

        assert_eq!(tx.sign_inputs(&bob).unwrap(), 1);
        assert!(!tx.verify());
        assert_eq!(tx.sign_inputs(&alice).unwrap(), 1);
        assert!(tx.verify());
    }

    #[test]
    fn test_hash_covers_signatures() {
        let spender = KeyPair::generate().unwrap();
        let mut tx = split_transaction(&spender, &spender.address());
        let unsigned_hash = tx.hash().unwrap();
        tx.sign_inputs(&spender).unwrap();

        assert_ne!(tx.hash().unwrap(), unsigned_hash);
        assert_eq!(tx.signing_hash().unwrap(), unsigned_hash);
        assert_eq!(tx.hash().unwrap().len(), 32);
    }
}
