//! In-memory stores. Each map sits behind its own reader/writer lock; the lock is
//! held only for the map access itself.

use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{BlockStore, TxStore, Utxo, UtxoStore};
use std::collections::HashMap;
use std::sync::RwLock;

fn poisoned<E: std::fmt::Display>(what: &str) -> impl FnOnce(E) -> LedgerError + '_ {
    move |e| LedgerError::Storage(format!("Failed to acquire {what} lock: {e}"))
}

#[derive(Default)]
struct BlockMap {
    blocks: HashMap<String, Block>,
    tip: Option<(u64, String)>,
}

#[derive(Default)]
pub struct MemoryBlockStore {
    inner: RwLock<BlockMap>,
}

impl MemoryBlockStore {
    pub fn new() -> MemoryBlockStore {
        MemoryBlockStore::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poisoned("block store"))?.blocks.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl BlockStore for MemoryBlockStore {
    fn put(&self, block: &Block) -> Result<()> {
        let hash = block.hash_hex()?;
        let height = block.get_height();

        let mut inner = self.inner.write().map_err(poisoned("block store"))?;
        let replace_tip = match &inner.tip {
            Some((tip_height, _)) => height > *tip_height,
            None => true,
        };
        if replace_tip {
            inner.tip = Some((height, hash.clone()));
        }
        inner.blocks.insert(hash, block.clone());
        Ok(())
    }

    fn get(&self, hash: &str) -> Result<Block> {
        let inner = self.inner.read().map_err(poisoned("block store"))?;
        inner
            .blocks
            .get(hash)
            .cloned()
            .ok_or_else(|| {
                LedgerError::NotFound(format!("block with hash [{hash}] does not exist"))
            })
    }

    fn tip(&self) -> Result<Option<Block>> {
        let inner = self.inner.read().map_err(poisoned("block store"))?;
        Ok(inner
            .tip
            .as_ref()
            .and_then(|(_, hash)| inner.blocks.get(hash).cloned()))
    }
}

#[derive(Default)]
pub struct MemoryTxStore {
    inner: RwLock<HashMap<String, Transaction>>,
}

impl MemoryTxStore {
    pub fn new() -> MemoryTxStore {
        MemoryTxStore::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poisoned("transaction store"))?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl TxStore for MemoryTxStore {
    fn put(&self, tx: &Transaction) -> Result<()> {
        let hash = tx.hash_hex()?;
        let mut inner = self.inner.write().map_err(poisoned("transaction store"))?;
        inner.insert(hash, tx.clone());
        Ok(())
    }

    fn get(&self, hash: &str) -> Result<Transaction> {
        let inner = self.inner.read().map_err(poisoned("transaction store"))?;
        inner
            .get(hash)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("could not find a tx with hash: {hash}")))
    }
}

#[derive(Default)]
pub struct MemoryUtxoStore {
    inner: RwLock<HashMap<String, Utxo>>,
}

impl MemoryUtxoStore {
    pub fn new() -> MemoryUtxoStore {
        MemoryUtxoStore::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poisoned("utxo store"))?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl UtxoStore for MemoryUtxoStore {
    fn put(&self, utxo: &Utxo) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned("utxo store"))?;
        inner.insert(utxo.key(), utxo.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Utxo> {
        let inner = self.inner.read().map_err(poisoned("utxo store"))?;
        inner
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("UTXO with key [{key}] does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{random_block, signed_transfer};
    use crate::wallet::KeyPair;

    #[test]
    fn test_block_put_get_is_idempotent() {
        let store = MemoryBlockStore::new();
        let block = random_block();
        let hash = block.hash_hex().unwrap();

        store.put(&block).unwrap();
        store.put(&block).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&hash).unwrap(), block);
    }

    #[test]
    fn test_missing_block_is_not_found() {
        let store = MemoryBlockStore::new();
        assert!(store.get("deadbeef").unwrap_err().is_not_found());
        assert!(store.tip().unwrap().is_none());
    }

    #[test]
    fn test_tip_follows_highest_block() {
        let store = MemoryBlockStore::new();
        let mut blocks: Vec<Block> = (0..5).map(|_| random_block()).collect();
        blocks.sort_by_key(|b| b.get_height());
        for block in blocks.iter().rev() {
            store.put(block).unwrap();
        }
        let tip = store.tip().unwrap().unwrap();
        assert_eq!(tip.get_height(), blocks.last().unwrap().get_height());
    }

    #[test]
    fn test_tx_store_keyed_by_hash() {
        let store = MemoryTxStore::new();
        let key = KeyPair::generate().unwrap();
        let tx = signed_transfer(&key, &[9u8; 32], 0, &[(10, key.address())]);

        store.put(&tx).unwrap();
        store.put(&tx).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&tx.hash_hex().unwrap()).unwrap(), tx);
        assert!(store.get("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_utxo_upsert_overwrites() {
        let store = MemoryUtxoStore::new();
        let utxo = Utxo::new("aa".to_string(), 1, 30, vec![2u8; 20]);
        store.put(&utxo).unwrap();
        store.put(&utxo.clone().spent()).unwrap();

        assert_eq!(store.len().unwrap(), 1);
        assert!(store.get("aa_1").unwrap().is_spent());
        assert!(store.get("aa_0").unwrap_err().is_not_found());
    }
}
