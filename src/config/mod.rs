//! Configuration management
//!
//! Node settings come from defaults, an optional TOML file, the environment and
//! finally the command line, each layer overriding the previous one.

pub mod settings;

pub use settings::{parse_address_list, NodeConfig, DEFAULT_LISTEN_ADDR, PROTOCOL_VERSION};
