use crate::error::{LedgerError, Result};
use crate::network::NodeClient;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use uuid::Uuid;

/// Opaque key of a peer-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> PeerId {
        PeerId(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a node reports about itself during a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    protocol_version: u32,
    block_height: u64,
    listen_addr: String,
    peer_list: Vec<String>,
}

impl PeerInfo {
    pub fn new(
        protocol_version: u32,
        block_height: u64,
        listen_addr: String,
        peer_list: Vec<String>,
    ) -> PeerInfo {
        PeerInfo {
            protocol_version,
            block_height,
            listen_addr,
            peer_list,
        }
    }

    pub fn get_protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn get_block_height(&self) -> u64 {
        self.block_height
    }

    pub fn get_listen_addr(&self) -> &str {
        self.listen_addr.as_str()
    }

    pub fn get_peer_list(&self) -> &[String] {
        self.peer_list.as_slice()
    }
}

#[derive(Debug, Clone)]
pub struct Peer {
    client: NodeClient,
    info: PeerInfo,
}

impl Peer {
    pub fn get_client(&self) -> &NodeClient {
        &self.client
    }

    pub fn get_info(&self) -> &PeerInfo {
        &self.info
    }
}

/// Known peers keyed by `PeerId`, at most one entry per listen address.
///
/// The lock only guards map access; callers take a snapshot before any I/O.
#[derive(Default)]
pub struct PeerTable {
    inner: RwLock<HashMap<PeerId, Peer>>,
}

fn lock_error<E: fmt::Display>(e: E) -> LedgerError {
    LedgerError::Storage(format!("Failed to acquire peer lock: {e}"))
}

impl PeerTable {
    pub fn new() -> PeerTable {
        PeerTable::default()
    }

    /// Registers a peer, or refreshes the entry already held for its listen
    /// address. Returns the entry's id and whether it is new.
    pub fn add(&self, client: NodeClient, info: PeerInfo) -> Result<(PeerId, bool)> {
        let mut peers = self.inner.write().map_err(lock_error)?;

        let existing = peers
            .iter()
            .find(|(_, peer)| peer.info.listen_addr == info.listen_addr)
            .map(|(id, _)| *id);
        match existing {
            Some(id) => {
                peers.insert(id, Peer { client, info });
                Ok((id, false))
            }
            None => {
                let id = PeerId::new();
                info!("Registered peer {} as {id}", info.listen_addr);
                peers.insert(id, Peer { client, info });
                Ok((id, true))
            }
        }
    }

    pub fn remove(&self, id: &PeerId) -> Result<Option<Peer>> {
        let mut peers = self.inner.write().map_err(lock_error)?;
        let removed = peers.remove(id);
        if let Some(peer) = &removed {
            info!("Evicted peer {} ({id})", peer.info.listen_addr);
        }
        Ok(removed)
    }

    pub fn contains_addr(&self, addr: &str) -> Result<bool> {
        let peers = self.inner.read().map_err(lock_error)?;
        Ok(peers.values().any(|peer| peer.info.listen_addr == addr))
    }

    pub fn get(&self, id: &PeerId) -> Result<Option<Peer>> {
        let peers = self.inner.read().map_err(lock_error)?;
        Ok(peers.get(id).cloned())
    }

    /// Listen addresses of every known peer, sorted.
    pub fn listen_addrs(&self) -> Result<Vec<String>> {
        let peers = self.inner.read().map_err(lock_error)?;
        let mut addrs: Vec<String> = peers
            .values()
            .map(|peer| peer.info.listen_addr.clone())
            .collect();
        addrs.sort();
        Ok(addrs)
    }

    pub fn snapshot(&self) -> Result<Vec<(PeerId, Peer)>> {
        let peers = self.inner.read().map_err(lock_error)?;
        Ok(peers.iter().map(|(id, peer)| (*id, peer.clone())).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(lock_error)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
