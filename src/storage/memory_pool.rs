use crate::core::{Transaction, TxInput};
use crate::error::Result;
use crate::storage::utxo_key;
use data_encoding::HEXLOWER;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Pending transactions observed but not yet committed.
/// ( K -> tx hash hex, V => Transaction )
pub struct Mempool {
    inner: RwLock<HashMap<String, Transaction>>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Mempool {
        Mempool {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn has(&self, tx: &Transaction) -> Result<bool> {
        Ok(self.contains(&tx.hash_hex()?))
    }

    pub fn contains(&self, tx_hash: &str) -> bool {
        match self.inner.read() {
            Ok(pool) => pool.contains_key(tx_hash),
            Err(_) => {
                log::error!("Failed to acquire read lock on mempool");
                false
            }
        }
    }

    /// Inserts `tx` unless it is already pending. Returns whether it was new;
    /// the check and the insert happen under one write lock.
    pub fn add(&self, tx: Transaction) -> Result<bool> {
        let tx_hash = tx.hash_hex()?;
        match self.inner.write() {
            Ok(mut pool) => {
                if pool.contains_key(&tx_hash) {
                    return Ok(false);
                }
                pool.insert(tx_hash, tx);
                Ok(true)
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on mempool");
                Ok(false)
            }
        }
    }

    pub fn get(&self, tx_hash: &str) -> Option<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.get(tx_hash).cloned(),
            Err(_) => {
                log::error!("Failed to acquire read lock on mempool");
                None
            }
        }
    }

    pub fn remove(&self, tx_hash: &str) -> Option<Transaction> {
        match self.inner.write() {
            Ok(mut pool) => pool.remove(tx_hash),
            Err(_) => {
                log::error!("Failed to acquire write lock on mempool");
                None
            }
        }
    }

    /// Removes every transaction of `txs` that is pending; used once they are committed.
    pub fn remove_all(&self, txs: &[Transaction]) -> Result<usize> {
        let hashes = txs
            .iter()
            .map(Transaction::hash_hex)
            .collect::<Result<Vec<_>>>()?;
        match self.inner.write() {
            Ok(mut pool) => Ok(hashes.iter().filter(|h| pool.remove(*h).is_some()).count()),
            Err(_) => {
                log::error!("Failed to acquire write lock on mempool");
                Ok(0)
            }
        }
    }

    /// Drops every pending transaction that spends an output also spent by
    /// `committed`. Returns how many were dropped.
    pub fn remove_conflicting(&self, committed: &[Transaction]) -> usize {
        let spent: HashSet<String> = committed
            .iter()
            .flat_map(|tx| tx.get_inputs().iter().map(input_key))
            .collect();
        if spent.is_empty() {
            return 0;
        }
        match self.inner.write() {
            Ok(mut pool) => {
                let before = pool.len();
                pool.retain(|_, tx| {
                    !tx.get_inputs()
                        .iter()
                        .any(|input| spent.contains(&input_key(input)))
                });
                before - pool.len()
            }
            Err(_) => {
                log::error!("Failed to acquire write lock on mempool");
                0
            }
        }
    }

    /// Up to `max` pending transactions, in no particular order.
    pub fn pending(&self, max: usize) -> Vec<Transaction> {
        match self.inner.read() {
            Ok(pool) => pool.values().take(max).cloned().collect(),
            Err(_) => {
                log::error!("Failed to acquire read lock on mempool");
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(pool) => pool.len(),
            Err(_) => {
                log::error!("Failed to acquire read lock on mempool");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn input_key(input: &TxInput) -> String {
    utxo_key(
        &HEXLOWER.encode(input.get_prev_tx_hash()),
        input.get_prev_out_index(),
    )
}
