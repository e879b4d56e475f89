//! Command-line interface
//!
//! Argument parsing for the node binary: starting a node, generating keys,
//! inspecting the genesis block and submitting transactions.

pub mod commands;

pub use commands::{Command, Opt};
