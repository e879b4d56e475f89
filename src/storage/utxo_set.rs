use crate::wallet::Address;
use serde::{Deserialize, Serialize};

/// Store key of an output: `"<tx hash hex>_<output index>"`.
pub fn utxo_key(tx_hash_hex: &str, out_index: u32) -> String {
    format!("{tx_hash_hex}_{out_index}")
}

/// One output of a committed transaction and whether it has been consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Utxo {
    tx_hash: String,
    out_index: u32,
    amount: u64,
    address: Vec<u8>,
    spent: bool,
}

impl Utxo {
    pub fn new(tx_hash: String, out_index: u32, amount: u64, address: Vec<u8>) -> Utxo {
        Utxo {
            tx_hash,
            out_index,
            amount,
            address,
            spent: false,
        }
    }

    pub fn key(&self) -> String {
        utxo_key(&self.tx_hash, self.out_index)
    }

    pub fn get_tx_hash(&self) -> &str {
        self.tx_hash.as_str()
    }

    pub fn get_out_index(&self) -> u32 {
        self.out_index
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_address(&self) -> &[u8] {
        self.address.as_slice()
    }

    pub fn is_owned_by(&self, address: &Address) -> bool {
        self.address.as_slice() == address.as_bytes()
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    pub fn spent(mut self) -> Utxo {
        self.spent = true;
        self
    }
}
