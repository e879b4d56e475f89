use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::{Package, PeerInfo, Reply};
use log::debug;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Calls the RPC surface of a remote node. Every call opens one connection,
/// sends one package and reads one reply; connect, read and write are all
/// bounded by the client's timeout.
#[derive(Debug, Clone)]
pub struct NodeClient {
    addr: String,
    timeout: Duration,
}

impl NodeClient {
    pub fn new(addr: &str, timeout: Duration) -> NodeClient {
        NodeClient {
            addr: addr.to_string(),
            timeout,
        }
    }

    /// Client for `addr` once a TCP connection to it has succeeded.
    pub fn dial(addr: &str, timeout: Duration) -> Result<NodeClient> {
        let client = NodeClient::new(addr, timeout);
        debug!("Dialing {addr}");
        let stream = client.connect()?;
        let _ = stream.shutdown(Shutdown::Both);
        Ok(client)
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }

    pub fn handshake(&self, addr_from: &str, info: PeerInfo) -> Result<PeerInfo> {
        let pkg = Package::Handshake {
            addr_from: addr_from.to_string(),
            peer_info: info,
        };
        match self.call(&pkg)? {
            Reply::PeerInfo(info) => Ok(info),
            other => Err(Self::unexpected(&other)),
        }
    }

    pub fn handle_transaction(&self, addr_from: &str, tx: &Transaction) -> Result<()> {
        let pkg = Package::Tx {
            addr_from: addr_from.to_string(),
            transaction: tx.serialize()?,
        };
        self.expect_ack(&pkg)
    }

    pub fn handle_block(&self, addr_from: &str, block: &Block) -> Result<()> {
        let pkg = Package::Block {
            addr_from: addr_from.to_string(),
            block: block.serialize()?,
        };
        self.expect_ack(&pkg)
    }

    fn expect_ack(&self, pkg: &Package) -> Result<()> {
        match self.call(pkg)? {
            Reply::Ack => Ok(()),
            other => Err(Self::unexpected(&other)),
        }
    }

    fn unexpected(reply: &Reply) -> LedgerError {
        match reply {
            Reply::Rejected { reason } => LedgerError::Validation(reason.clone()),
            other => LedgerError::Serialization(format!("Unexpected reply: {other:?}")),
        }
    }

    fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = self
            .addr
            .to_socket_addrs()
            .map_err(|e| LedgerError::Connectivity(format!("Invalid address {}: {e}", self.addr)))?
            .collect();
        if addrs.is_empty() {
            return Err(LedgerError::Connectivity(format!(
                "Address {} did not resolve",
                self.addr
            )));
        }
        Ok(addrs)
    }

    fn connect(&self) -> Result<TcpStream> {
        let mut last_error = None;
        for socket_addr in self.resolve()? {
            match TcpStream::connect_timeout(&socket_addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout)).map_err(|e| {
                        LedgerError::Connectivity(format!("Failed to set read timeout: {e}"))
                    })?;
                    stream.set_write_timeout(Some(self.timeout)).map_err(|e| {
                        LedgerError::Connectivity(format!("Failed to set write timeout: {e}"))
                    })?;
                    return Ok(stream);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(LedgerError::Connectivity(format!(
            "Failed to connect to {}: {}",
            self.addr,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    fn call(&self, pkg: &Package) -> Result<Reply> {
        let mut stream = self.connect()?;

        serde_json::to_writer(&stream, pkg).map_err(|e| {
            LedgerError::Connectivity(format!("Failed to send to {}: {e}", self.addr))
        })?;
        stream.flush().map_err(|e| {
            LedgerError::Connectivity(format!("Failed to send to {}: {e}", self.addr))
        })?;
        let _ = stream.shutdown(Shutdown::Write);

        serde_json::from_reader(BufReader::new(&stream)).map_err(|e| {
            LedgerError::Connectivity(format!("No reply from {}: {e}", self.addr))
        })
    }
}
