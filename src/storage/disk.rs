// Durable stores on top of sled. Each store owns one tree of the node's database;
// the block tree also carries the tip marker used to resume after a restart.

use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{BlockStore, TxStore, Utxo, UtxoStore};
use crate::utils::{deserialize, serialize};
use sled::transaction::TransactionError;
use sled::{Db, Tree};
use std::io;
use std::path::Path;

const TIP_BLOCK_HASH_KEY: &str = "tip_block_hash";
const BLOCKS_TREE: &str = "blocks";
const TRANSACTIONS_TREE: &str = "transactions";
const UTXO_TREE: &str = "utxos";

/// Handle on a node's sled database.
#[derive(Clone)]
pub struct SledStores {
    db: Db,
}

impl SledStores {
    pub fn open(path: impl AsRef<Path>) -> Result<SledStores> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| {
            LedgerError::Storage(format!(
                "Failed to open database at {}: {e}",
                path.display()
            ))
        })?;
        Ok(SledStores { db })
    }

    pub fn block_store(&self) -> Result<SledBlockStore> {
        Ok(SledBlockStore {
            tree: self.db.open_tree(BLOCKS_TREE)?,
        })
    }

    pub fn tx_store(&self) -> Result<SledTxStore> {
        Ok(SledTxStore {
            tree: self.db.open_tree(TRANSACTIONS_TREE)?,
        })
    }

    pub fn utxo_store(&self) -> Result<SledUtxoStore> {
        Ok(SledUtxoStore {
            tree: self.db.open_tree(UTXO_TREE)?,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

pub struct SledBlockStore {
    tree: Tree,
}

impl BlockStore for SledBlockStore {
    fn put(&self, block: &Block) -> Result<()> {
        let block_hash = block.hash_hex()?;
        let height = block.get_height();
        let bytes = block.serialize()?;

        // block and tip marker move together
        self.tree
            .transaction(|tx_db| {
                tx_db.insert(block_hash.as_bytes(), bytes.as_slice())?;
                let replace_tip = match tx_db.get(TIP_BLOCK_HASH_KEY)? {
                    None => true,
                    Some(tip_hash) => match tx_db.get(tip_hash)? {
                        None => true,
                        Some(tip_bytes) => {
                            let tip = Block::deserialize(tip_bytes.as_ref()).map_err(|e| {
                                sled::Error::Io(io::Error::new(
                                    io::ErrorKind::InvalidData,
                                    format!("Failed to decode tip block: {e}"),
                                ))
                            })?;
                            height > tip.get_height()
                        }
                    },
                };
                if replace_tip {
                    tx_db.insert(TIP_BLOCK_HASH_KEY, block_hash.as_bytes())?;
                }
                Ok(())
            })
            .map_err(|e: TransactionError| {
                LedgerError::Storage(format!("Failed to store block {block_hash}: {e}"))
            })?;
        // the block is the last write of a commit
        self.tree.flush()?;
        Ok(())
    }

    fn get(&self, hash: &str) -> Result<Block> {
        match self.tree.get(hash)? {
            Some(bytes) => Block::deserialize(bytes.as_ref()),
            None => Err(LedgerError::NotFound(format!(
                "block with hash [{hash}] does not exist"
            ))),
        }
    }

    fn tip(&self) -> Result<Option<Block>> {
        let tip_hash = match self.tree.get(TIP_BLOCK_HASH_KEY)? {
            Some(hash) => String::from_utf8(hash.to_vec())
                .map_err(|e| LedgerError::Storage(format!("Corrupt tip marker: {e}")))?,
            None => return Ok(None),
        };
        self.get(&tip_hash).map(Some)
    }
}

pub struct SledTxStore {
    tree: Tree,
}

impl TxStore for SledTxStore {
    fn put(&self, tx: &Transaction) -> Result<()> {
        self.tree.insert(tx.hash_hex()?, tx.serialize()?)?;
        Ok(())
    }

    fn get(&self, hash: &str) -> Result<Transaction> {
        match self.tree.get(hash)? {
            Some(bytes) => Transaction::deserialize(bytes.as_ref()),
            None => Err(LedgerError::NotFound(format!(
                "could not find a tx with hash: {hash}"
            ))),
        }
    }
}

pub struct SledUtxoStore {
    tree: Tree,
}

impl UtxoStore for SledUtxoStore {
    fn put(&self, utxo: &Utxo) -> Result<()> {
        self.tree.insert(utxo.key(), serialize(utxo)?)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Utxo> {
        match self.tree.get(key)? {
            Some(bytes) => deserialize::<Utxo>(bytes.as_ref()),
            None => Err(LedgerError::NotFound(format!(
                "UTXO with key [{key}] does not exist"
            ))),
        }
    }
}
