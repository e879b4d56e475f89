// The node ties the chain, the mempool and the peer table together and
// implements the handlers behind the RPC surface: handshake, transaction and
// block intake, bootstrap, relay and block production.
//
// Relay, recursive bootstrap and the validator loop run on detached threads.
// They outlive the request that triggered them and are not cancelled.

use crate::config::NodeConfig;
use crate::core::{Block, Chain, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::{NodeClient, Package, PeerId, PeerInfo, PeerTable, Reply, Server};
use crate::storage::Mempool;
use crate::wallet::KeyPair;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

pub struct Node {
    config: NodeConfig,
    chain: Chain,
    mempool: Mempool,
    peers: PeerTable,
    dialing: Mutex<HashSet<String>>,
    validator: Option<KeyPair>,
}

impl Node {
    /// `config.listen_addr` must be the address the node's server is reachable
    /// at; it is what peers dial back.
    pub fn new(config: NodeConfig, chain: Chain, validator: Option<KeyPair>) -> Node {
        Node {
            config,
            chain,
            mempool: Mempool::new(),
            peers: PeerTable::new(),
            dialing: Mutex::new(HashSet::new()),
            validator,
        }
    }

    pub fn get_config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn get_chain(&self) -> &Chain {
        &self.chain
    }

    pub fn get_mempool(&self) -> &Mempool {
        &self.mempool
    }

    pub fn get_peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn listen_addr(&self) -> &str {
        self.config.listen_addr.as_str()
    }

    pub fn is_validator(&self) -> bool {
        self.validator.is_some()
    }

    /// Bootstraps against the configured nodes and starts the validator loop in
    /// the background, then serves requests on the calling thread.
    pub fn start(self: &Arc<Self>, server: Server) -> Result<()> {
        if !self.config.bootstrap_nodes.is_empty() {
            let node = Arc::clone(self);
            let addrs = self.config.bootstrap_nodes.clone();
            thread::spawn(move || {
                node.bootstrap(&addrs);
            });
        }

        if self.is_validator() {
            let node = Arc::clone(self);
            thread::spawn(move || node.validator_loop());
        }

        server.serve(Arc::clone(self))
    }

    /// Runs `start` on its own thread.
    pub fn spawn(self: &Arc<Self>, server: Server) -> thread::JoinHandle<Result<()>> {
        let node = Arc::clone(self);
        thread::spawn(move || node.start(server))
    }

    pub fn peer_info(&self) -> Result<PeerInfo> {
        Ok(PeerInfo::new(
            self.config.protocol_version,
            self.chain.height()?,
            self.config.listen_addr.clone(),
            self.peers.listen_addrs()?,
        ))
    }

    pub fn process_package(self: &Arc<Self>, pkg: Package) -> Reply {
        let result = match pkg {
            Package::Handshake {
                addr_from,
                peer_info,
            } => {
                debug!("Handshake from {addr_from}");
                self.handshake(peer_info).map(Reply::PeerInfo)
            }
            Package::Tx {
                addr_from,
                transaction,
            } => Transaction::deserialize(&transaction)
                .and_then(|tx| {
                    debug!("Transaction from {addr_from}");
                    self.handle_transaction(tx)
                })
                .map(|_| Reply::Ack),
            Package::Block { addr_from, block } => Block::deserialize(&block)
                .and_then(|block| {
                    debug!("Block from {addr_from}");
                    self.handle_block(block)
                })
                .map(|_| Reply::Ack),
        };

        result.unwrap_or_else(|e| Reply::rejected(&e))
    }

    /// Dials the caller back, registers it and answers with the local view.
    /// A non-empty peer list from the caller triggers a background bootstrap.
    pub fn handshake(self: &Arc<Self>, incoming: PeerInfo) -> Result<PeerInfo> {
        let remote = incoming.get_listen_addr().to_string();
        if remote.is_empty() {
            return Err(LedgerError::InvalidInput(
                "handshake without a listen address".to_string(),
            ));
        }

        if remote != self.listen_addr() {
            let client = NodeClient::dial(&remote, self.config.dial_timeout())?;
            self.add_peer(client, incoming, 0)?;
        }

        self.peer_info()
    }

    fn add_peer(self: &Arc<Self>, client: NodeClient, info: PeerInfo, depth: usize) -> Result<()> {
        let peer_list: Vec<String> = info.get_peer_list().to_vec();
        let remote = info.get_listen_addr().to_string();
        let height = info.get_block_height();
        let (id, is_new) = self.peers.add(client, info)?;
        debug!(
            "Peer {remote} connected to {} as {id} (new: {is_new}, height: {height})",
            self.listen_addr()
        );

        if !peer_list.is_empty() && depth < self.config.max_bootstrap_depth {
            let node = Arc::clone(self);
            thread::spawn(move || {
                node.bootstrap_at(&peer_list, depth + 1);
            });
        }
        Ok(())
    }

    /// Connects to every address not yet known. Returns how many handshakes
    /// succeeded; failures are logged and skipped.
    pub fn bootstrap(self: &Arc<Self>, addrs: &[String]) -> usize {
        self.bootstrap_at(addrs, 0)
    }

    fn bootstrap_at(self: &Arc<Self>, addrs: &[String], depth: usize) -> usize {
        let mut connected = 0;
        for addr in addrs {
            match self.claim_dial(addr) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!("Failed to check peer {addr}: {e}");
                    continue;
                }
            }

            debug!("Dialing remote node {addr} from {}", self.listen_addr());
            let result = self
                .dial_remote_node(addr)
                .and_then(|(client, info)| self.add_peer(client, info, depth));
            self.release_dial(addr);

            match result {
                Ok(()) => connected += 1,
                Err(e) => warn!("Failed to bootstrap with {addr}: {e}"),
            }
        }
        connected
    }

    // Claims `addr` for dialing unless it is this node, a known peer, or
    // already being dialed by another thread.
    fn claim_dial(&self, addr: &str) -> Result<bool> {
        if addr == self.listen_addr() || self.peers.contains_addr(addr)? {
            return Ok(false);
        }
        let mut dialing = self
            .dialing
            .lock()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire dial lock: {e}")))?;
        Ok(dialing.insert(addr.to_string()))
    }

    fn release_dial(&self, addr: &str) {
        match self.dialing.lock() {
            Ok(mut dialing) => {
                dialing.remove(addr);
            }
            Err(e) => error!("Failed to acquire dial lock: {e}"),
        }
    }

    fn dial_remote_node(&self, addr: &str) -> Result<(NodeClient, PeerInfo)> {
        let client = NodeClient::dial(addr, self.config.dial_timeout())?;
        let info = client.handshake(self.listen_addr(), self.peer_info()?)?;
        Ok((client, info))
    }

    /// Admits a transaction with valid signatures into the mempool and relays it
    /// the first time it is seen. Pending and committed transactions are
    /// acknowledged without relay.
    pub fn handle_transaction(self: &Arc<Self>, tx: Transaction) -> Result<()> {
        if tx.is_minting() {
            warn!("Rejected transaction without inputs");
            return Err(LedgerError::Validation("transaction has no inputs".to_string()));
        }
        if !tx.verify() {
            warn!("Rejected transaction with a bad signature");
            return Err(LedgerError::Validation("bad tx signature".to_string()));
        }

        let tx_hash = tx.hash_hex()?;
        match self.chain.get_transaction(&tx_hash) {
            Ok(_) => {
                debug!("Transaction {tx_hash} already committed");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if self.mempool.add(tx.clone())? {
            info!("Received tx {tx_hash} at {}", self.listen_addr());
            let node = Arc::clone(self);
            thread::spawn(move || node.broadcast_transaction(&tx));
        }
        Ok(())
    }

    /// Commits a block from a peer and relays it. A block already on the chain
    /// is acknowledged without relay.
    pub fn handle_block(self: &Arc<Self>, block: Block) -> Result<()> {
        let hash = block.hash()?;
        if self.chain.has_block(&hash)? {
            debug!("Block {} already known", block.hash_hex()?);
            return Ok(());
        }

        if let Err(e) = self.chain.add_block(&block) {
            // a concurrent delivery of the same block may have won the race
            if self.chain.has_block(&hash)? {
                return Ok(());
            }
            warn!("Rejected block {}: {e}", block.hash_hex()?);
            return Err(e);
        }

        self.prune_mempool(&block)?;
        let node = Arc::clone(self);
        thread::spawn(move || node.broadcast_block(&block));
        Ok(())
    }

    // Drops the committed transactions and every pending one that lost a race
    // for the same inputs.
    fn prune_mempool(&self, block: &Block) -> Result<()> {
        self.mempool.remove_all(block.get_transactions())?;
        let dropped = self.mempool.remove_conflicting(block.get_transactions());
        if dropped > 0 {
            info!("Dropped {dropped} pending transactions spending committed inputs");
        }
        Ok(())
    }

    pub fn broadcast_transaction(&self, tx: &Transaction) {
        self.broadcast("transaction", |client| {
            client.handle_transaction(self.listen_addr(), tx)
        });
    }

    pub fn broadcast_block(&self, block: &Block) {
        self.broadcast("block", |client| client.handle_block(self.listen_addr(), block));
    }

    // Sends to every peer concurrently. A peer that cannot be reached is evicted
    // and can rejoin through a later handshake; rejections only get logged.
    fn broadcast<F>(&self, what: &str, send: F)
    where
        F: Fn(&NodeClient) -> Result<()> + Sync,
    {
        let peers = match self.peers.snapshot() {
            Ok(peers) => peers,
            Err(e) => {
                error!("Failed to snapshot peers for {what} broadcast: {e}");
                return;
            }
        };

        let unreachable: Vec<PeerId> = thread::scope(|s| {
            let handles: Vec<_> = peers
                .iter()
                .map(|(id, peer)| {
                    let send = &send;
                    s.spawn(move || (*id, peer.get_client().get_addr(), send(peer.get_client())))
                })
                .collect();

            handles
                .into_iter()
                .filter_map(|handle| match handle.join() {
                    Ok((_, _, Ok(()))) => None,
                    Ok((id, addr, Err(e))) => {
                        warn!("Failed to send {what} to {addr}: {e}");
                        matches!(e, LedgerError::Connectivity(_)).then_some(id)
                    }
                    Err(_) => {
                        error!("Broadcast thread panicked");
                        None
                    }
                })
                .collect()
        });

        for id in unreachable {
            if let Err(e) = self.peers.remove(&id) {
                error!("Failed to evict peer {id}: {e}");
            }
        }
    }

    /// Builds, commits and relays one block out of the pending transactions.
    /// Returns `None` when nothing valid is pending.
    pub fn produce_block(self: &Arc<Self>) -> Result<Option<Block>> {
        let key = self
            .validator
            .as_ref()
            .ok_or_else(|| LedgerError::Config("node has no validator key".to_string()))?;

        let mut claimed = HashSet::new();
        let mut included = Vec::new();
        for tx in self.mempool.pending(self.config.max_block_transactions) {
            match self.chain.check_transaction_in_batch(&tx, &mut claimed) {
                Ok(()) => included.push(tx),
                Err(e) if may_become_valid(&e) => {
                    debug!("Deferring pending tx {}: {e}", tx.hash_hex()?);
                }
                Err(e) => {
                    let tx_hash = tx.hash_hex()?;
                    warn!("Dropping pending tx {tx_hash}: {e}");
                    self.mempool.remove(&tx_hash);
                }
            }
        }
        if included.is_empty() {
            return Ok(None);
        }

        let head = self.chain.head_header()?;
        let mut block = Block::new_block(head.get_height() + 1, head.hash()?, included)?;
        block.sign(key)?;
        self.chain.add_block(&block)?;
        self.prune_mempool(&block)?;

        info!(
            "Produced block {} at height {} with {} transactions",
            block.hash_hex()?,
            block.get_height(),
            block.get_transactions().len()
        );

        let relay = block.clone();
        let node = Arc::clone(self);
        thread::spawn(move || node.broadcast_block(&relay));
        Ok(Some(block))
    }

    fn validator_loop(self: Arc<Self>) {
        let block_time = self.config.block_time();
        info!(
            "Starting validator loop at {} (block time {block_time:?})",
            self.listen_addr()
        );
        loop {
            thread::sleep(block_time);
            match self.produce_block() {
                Ok(Some(_)) => {}
                Ok(None) => debug!("No pending transactions, skipping block"),
                Err(e) => warn!("Failed to produce block: {e}"),
            }
        }
    }
}

// A spend of an output that is still pending, or one that lost to another
// member of the batch, can succeed in a later block.
fn may_become_valid(e: &LedgerError) -> bool {
    matches!(
        e,
        LedgerError::Validation(reason)
            if reason == "unknown input" || reason == "double spend within block"
    )
}
