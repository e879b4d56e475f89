use crate::error::{LedgerError, Result};
use crate::network::{Node, PeerInfo};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Requests of the RPC surface. Blocks and transactions travel as their
/// canonical binary encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Package {
    Handshake {
        addr_from: String,
        peer_info: PeerInfo,
    },
    Tx {
        addr_from: String,
        transaction: Vec<u8>,
    },
    Block {
        addr_from: String,
        block: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    PeerInfo(PeerInfo),
    Ack,
    Rejected { reason: String },
}

impl Reply {
    pub fn rejected(err: &LedgerError) -> Reply {
        let reason = match err {
            LedgerError::Validation(reason) => reason.clone(),
            other => other.to_string(),
        };
        Reply::Rejected { reason }
    }
}

/// TCP listener serving one thread per inbound connection.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind(addr: &str) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| LedgerError::Connectivity(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Server { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the listener fails; never returns otherwise.
    pub fn serve(self, node: Arc<Node>) -> Result<()> {
        info!("Server listening on {}", self.local_addr()?);

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let node = Arc::clone(&node);
                    thread::spawn(move || {
                        let peer_addr = stream
                            .peer_addr()
                            .map(|addr| addr.to_string())
                            .unwrap_or_else(|_| "unknown".to_string());
                        if let Err(e) = Self::handle_connection(&node, stream) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    // One package in, one reply out. A connection that closes without sending
    // anything is a reachability probe.
    fn handle_connection(node: &Arc<Node>, stream: TcpStream) -> Result<()> {
        let timeout = Some(node.get_config().dial_timeout());
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        let reader = BufReader::new(&stream);
        let mut pkg_reader = Deserializer::from_reader(reader).into_iter::<Package>();

        let pkg = match pkg_reader.next() {
            Some(pkg) => pkg.map_err(|e| {
                LedgerError::Serialization(format!("Failed to deserialize package: {e}"))
            })?,
            None => {
                debug!("Connection closed without a request");
                return Ok(());
            }
        };

        let reply = node.process_package(pkg);

        let mut writer = &stream;
        serde_json::to_writer(writer, &reply)?;
        writer.flush()?;
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }
}
