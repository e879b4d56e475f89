#![allow(dead_code)]

use ledger_node::{
    genesis_block, Address, Block, Chain, KeyPair, MemoryBlockStore, MemoryTxStore, Node,
    NodeConfig, Server, Transaction, TxInput, TxOutput,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub fn memory_chain() -> Chain {
    Chain::new(
        Box::new(MemoryBlockStore::new()),
        Box::new(MemoryTxStore::new()),
    )
    .unwrap()
}

pub fn genesis_tx_hash() -> Vec<u8> {
    genesis_block().unwrap().get_transactions()[0].hash().unwrap()
}

pub fn transfer(
    key: &KeyPair,
    prev_hash: &[u8],
    index: u32,
    outputs: &[(u64, Address)],
) -> Transaction {
    let input = TxInput::new(prev_hash, index, key.public_key().as_bytes());
    let outputs = outputs
        .iter()
        .map(|(amount, address)| TxOutput::new(*amount, address))
        .collect();
    let mut tx = Transaction::new(vec![input], outputs);
    tx.sign_inputs(key).unwrap();
    tx
}

pub fn next_block(chain: &Chain, producer: &KeyPair, transactions: Vec<Transaction>) -> Block {
    let head = chain.head_header().unwrap();
    let mut block =
        Block::new_block(head.get_height() + 1, head.hash().unwrap(), transactions).unwrap();
    block.sign(producer).unwrap();
    block
}

/// Node on an ephemeral loopback port, serving on a background thread.
pub fn spawn_node(bootstrap: Vec<String>, validator: Option<KeyPair>) -> Arc<Node> {
    let server = Server::bind("127.0.0.1:0").unwrap();
    let config = NodeConfig {
        listen_addr: server.local_addr().unwrap().to_string(),
        bootstrap_nodes: bootstrap,
        dial_timeout_ms: 1000,
        block_time_ms: 100,
        ..NodeConfig::default()
    };
    let node = Arc::new(Node::new(config, memory_chain(), validator));
    node.spawn(server);
    node
}

/// Polls `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    condition()
}
