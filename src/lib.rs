//! # ledger-node
//!
//! A minimal peer-to-peer ledger node. It keeps a replicated, append-only chain
//! of signed blocks, tracks unspent outputs, relays pending transactions between
//! peers and lets new nodes join by bootstrapping from a few seed addresses.
//!
//! ## How the code is organized
//! - `core/`: blocks, transactions, the transactions root, genesis and the chain
//!   state machine that validates and commits blocks
//! - `wallet/`: Ed25519 keys, signatures, 20-byte addresses and the validator key file
//! - `storage/`: block, transaction and UTXO stores (in memory or sled) and the mempool
//! - `network/`: the RPC surface over TCP, the peer table, gossip and block production
//! - `config/`: node settings from defaults, TOML, the environment and the CLI
//! - `utils/`: hashing, timestamps and the canonical binary encoding
//! - `cli/`: command-line arguments of the node binary
//!
//! ## Design decisions
//! - One producer signs each block; followers validate and append. There is no
//!   fork resolution and no proof-of-work.
//! - The block hash is the header hash. The header commits to the transactions
//!   through a Merkle root that block verification recomputes.
//! - Spends are checked against the UTXO set before a block is committed, and
//!   commits are serialized by a single lock.
//! - Background relay and bootstrap run on detached threads that are never cancelled.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::NodeConfig;
pub use core::{
    genesis_block, genesis_key, Block, Chain, Header, HeaderList, MerkleTree, Transaction,
    TxInput, TxOutput, GENESIS_AMOUNT, GENESIS_SEED,
};
pub use error::{LedgerError, Result};
pub use network::{Node, NodeClient, Package, PeerId, PeerInfo, PeerTable, Reply, Server};
pub use storage::{
    BlockStore, MemoryBlockStore, MemoryTxStore, MemoryUtxoStore, Mempool, SledStores, TxStore,
    Utxo, UtxoStore,
};
pub use utils::{current_timestamp, sha256_digest};
pub use wallet::{verify_bytes, Address, KeyFile, KeyPair, PublicKey, Signature};
