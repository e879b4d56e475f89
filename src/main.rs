// Entry point of the node binary: parses the command line and either runs a
// node or performs one of the offline helpers (keys, genesis, submitting a tx).
use clap::Parser;
use data_encoding::HEXLOWER;
use ledger_node::storage::{MemoryBlockStore, MemoryTxStore, SledStores};
use ledger_node::wallet::KEY_FILE;
use ledger_node::{
    genesis_block, genesis_key, Address, Chain, Command, KeyFile, KeyPair, LedgerError,
    NodeClient, NodeConfig, Node, Opt, Server, Transaction, TxInput, TxOutput,
};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

fn main() {
    // Info by default; RUST_LOG still overrides it
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode {
            config,
            listen,
            bootstrap,
            validator_seed,
            key_file,
            data_dir,
        } => {
            // file and environment first, flags on top
            let mut node_config = NodeConfig::load(config.as_deref())?;
            if let Some(listen) = listen {
                node_config.listen_addr = listen;
            }
            if !bootstrap.is_empty() {
                node_config.bootstrap_nodes = bootstrap;
            }
            if validator_seed.is_some() {
                node_config.validator_seed = validator_seed;
            }
            if key_file.is_some() {
                node_config.key_file = key_file;
            }
            if data_dir.is_some() {
                node_config.data_dir = data_dir;
            }
            node_config.validate()?;
            start_node(node_config)?;
        }
        Command::Keygen => {
            let key = KeyPair::generate()?;
            println!("Seed:       {}", key.seed_hex());
            println!("Public key: {}", key.public_key());
            println!("Address:    {}", key.address());
        }
        Command::Genesis => {
            let block = genesis_block()?;
            let tx = &block.get_transactions()[0];
            println!("Genesis block:       {}", block.hash_hex()?);
            println!("Genesis transaction: {}", tx.hash_hex()?);
            println!("Genesis address:     {}", genesis_key()?.address());
        }
        Command::Send {
            node,
            seed,
            prev_tx,
            index,
            to,
            amount,
            change,
        } => {
            if amount == 0 {
                return Err("Amount must be positive".into());
            }
            let key = KeyPair::from_seed_hex(&seed)?;
            let prev_hash = HEXLOWER
                .decode(prev_tx.trim().to_lowercase().as_bytes())
                .map_err(|e| LedgerError::InvalidInput(format!("Invalid transaction hash: {e}")))?;
            let recipient: Address = to.parse()?;

            let mut outputs = vec![TxOutput::new(amount, &recipient)];
            if let Some(change) = change.filter(|c| *c > 0) {
                outputs.push(TxOutput::new(change, &key.address()));
            }
            let input = TxInput::new(&prev_hash, index, key.public_key().as_bytes());
            let mut tx = Transaction::new(vec![input], outputs);
            tx.sign_inputs(&key)?;

            NodeClient::new(&node, SUBMIT_TIMEOUT).handle_transaction("cli", &tx)?;
            println!("Submitted transaction {}", tx.hash_hex()?);
        }
    }
    Ok(())
}

fn start_node(config: NodeConfig) -> ledger_node::Result<()> {
    let chain = open_chain(&config)?;
    let validator = load_validator_key(&config)?;
    if let Some(key) = &validator {
        info!("Producing blocks as {}", key.address());
    }

    let server = Server::bind(&config.listen_addr)?;
    let node = Arc::new(Node::new(config, chain, validator));
    node.start(server)
}

fn open_chain(config: &NodeConfig) -> ledger_node::Result<Chain> {
    match &config.data_dir {
        Some(dir) => {
            let stores = SledStores::open(dir)?;
            Chain::with_stores(
                Box::new(stores.block_store()?),
                Box::new(stores.tx_store()?),
                Box::new(stores.utxo_store()?),
            )
        }
        None => Chain::new(
            Box::new(MemoryBlockStore::new()),
            Box::new(MemoryTxStore::new()),
        ),
    }
}

fn load_validator_key(config: &NodeConfig) -> ledger_node::Result<Option<KeyPair>> {
    if let Some(seed) = &config.validator_seed {
        return KeyPair::from_seed_hex(seed).map(Some);
    }
    match &config.key_file {
        Some(path) => {
            let path: PathBuf = if path.is_dir() {
                path.join(KEY_FILE)
            } else {
                path.clone()
            };
            KeyFile::new(path).load_or_create().map(Some)
        }
        None => Ok(None),
    }
}
