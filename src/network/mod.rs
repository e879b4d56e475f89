//! Peer-to-peer networking
//!
//! The RPC surface (handshake, transaction and block intake) over TCP with one
//! JSON request and reply per connection, the peer table, and the node that
//! bootstraps membership and relays transactions and blocks.

pub mod client;
pub mod node;
pub mod peers;
pub mod server;

pub use client::NodeClient;
pub use node::Node;
pub use peers::{Peer, PeerId, PeerInfo, PeerTable};
pub use server::{Package, Reply, Server};
