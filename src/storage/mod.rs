//! Data storage and persistence
//!
//! Block, transaction and UTXO stores share one contract: `put` is an idempotent
//! upsert keyed by content, `get` on an absent key fails with `NotFound`. Stores
//! come in two flavors, in-memory maps and `sled` trees, plus the mempool of
//! pending transactions.

pub mod disk;
pub mod memory;
pub mod memory_pool;
pub mod utxo_set;

pub use disk::{SledBlockStore, SledStores, SledTxStore, SledUtxoStore};
pub use memory::{MemoryBlockStore, MemoryTxStore, MemoryUtxoStore};
pub use memory_pool::Mempool;
pub use utxo_set::{utxo_key, Utxo};

use crate::core::{Block, Transaction};
use crate::error::Result;

/// Blocks keyed by the lowercase hex of their hash.
pub trait BlockStore: Send + Sync {
    fn put(&self, block: &Block) -> Result<()>;

    fn get(&self, hash: &str) -> Result<Block>;

    /// Highest block stored so far, if any.
    fn tip(&self) -> Result<Option<Block>> {
        Ok(None)
    }
}

/// Committed transactions keyed by the lowercase hex of their hash.
pub trait TxStore: Send + Sync {
    fn put(&self, tx: &Transaction) -> Result<()>;

    fn get(&self, hash: &str) -> Result<Transaction>;
}

/// Outputs keyed by `"<tx hash hex>_<index>"`.
pub trait UtxoStore: Send + Sync {
    fn put(&self, utxo: &Utxo) -> Result<()>;

    fn get(&self, key: &str) -> Result<Utxo>;
}
