//! Core ledger functionality
//!
//! Blocks, transactions, the transactions root, the deterministic genesis block
//! and the chain state machine that validates and commits blocks.

pub mod block;
pub mod chain;
pub mod genesis;
pub mod merkle;
pub mod transaction;

pub use block::{Block, Header, BLOCK_VERSION};
pub use chain::{Chain, HeaderList};
pub use genesis::{genesis_block, genesis_key, GENESIS_AMOUNT, GENESIS_SEED};
pub use merkle::MerkleTree;
pub use transaction::{Transaction, TxInput, TxOutput, TX_VERSION};
