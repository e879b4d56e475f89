use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-node")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start-node", about = "Start a ledger node")]
    StartNode {
        #[arg(long = "config", help = "TOML configuration file")]
        config: Option<PathBuf>,
        #[arg(long = "listen", help = "Address to listen on, e.g. 127.0.0.1:3000")]
        listen: Option<String>,
        #[arg(long = "bootstrap", help = "Address of a node to bootstrap from (repeatable)")]
        bootstrap: Vec<String>,
        #[arg(long = "validator-seed", help = "Hex seed of the block-producing key")]
        validator_seed: Option<String>,
        #[arg(long = "key-file", help = "Key file of the block-producing key, created if missing")]
        key_file: Option<PathBuf>,
        #[arg(long = "data-dir", help = "Directory for durable stores (in-memory if omitted)")]
        data_dir: Option<PathBuf>,
    },
    #[command(name = "keygen", about = "Generate a key pair and print its seed and address")]
    Keygen,
    #[command(name = "genesis", about = "Print the genesis block hash and address")]
    Genesis,
    #[command(name = "send", about = "Sign a single-input transaction and submit it to a node")]
    Send {
        #[arg(long = "node", help = "Address of the node to submit to")]
        node: String,
        #[arg(long = "seed", help = "Hex seed of the key that owns the spent output")]
        seed: String,
        #[arg(long = "prev-tx", help = "Hash of the transaction holding the spent output")]
        prev_tx: String,
        #[arg(long = "index", default_value_t = 0, help = "Index of the spent output")]
        index: u32,
        #[arg(long = "to", help = "Recipient address")]
        to: String,
        #[arg(long = "amount", help = "Amount sent to the recipient")]
        amount: u64,
        #[arg(long = "change", help = "Amount returned to the sender")]
        change: Option<u64>,
    },
}
