// The chain state machine: validates incoming blocks against the head and the
// UTXO set, commits them, and answers height/hash lookups. One commit lock makes
// the chain single-writer; readers only take the header list's read lock.

use crate::core::{genesis_block, Block, Header, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::{utxo_key, BlockStore, MemoryUtxoStore, TxStore, Utxo, UtxoStore};
use crate::wallet::PublicKey;
use data_encoding::HEXLOWER;
use log::{debug, error, info};
use std::collections::HashSet;
use std::sync::{Mutex, RwLock};

/// Append-only headers; the index of a header is its height.
#[derive(Debug, Default, Clone)]
pub struct HeaderList {
    headers: Vec<Header>,
}

impl HeaderList {
    pub fn new() -> HeaderList {
        HeaderList::default()
    }

    pub fn add(&mut self, header: Header) {
        self.headers.push(header);
    }

    pub fn get(&self, height: u64) -> Option<&Header> {
        usize::try_from(height).ok().and_then(|h| self.headers.get(h))
    }

    pub fn last(&self) -> Option<&Header> {
        self.headers.last()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Length - 1. Only meaningful once genesis has been added.
    pub fn height(&self) -> u64 {
        (self.headers.len() as u64).saturating_sub(1)
    }
}

fn validation(reason: &str) -> LedgerError {
    LedgerError::Validation(reason.to_string())
}

pub struct Chain {
    block_store: Box<dyn BlockStore>,
    tx_store: Box<dyn TxStore>,
    utxo_store: Box<dyn UtxoStore>,
    headers: RwLock<HeaderList>,
    commit_lock: Mutex<()>,
}

impl Chain {
    /// Chain over the given block and transaction stores with an in-memory UTXO set.
    pub fn new(block_store: Box<dyn BlockStore>, tx_store: Box<dyn TxStore>) -> Result<Chain> {
        Self::with_stores(block_store, tx_store, Box::new(MemoryUtxoStore::new()))
    }

    /// Commits the genesis block into empty stores, or resumes from the stored tip.
    pub fn with_stores(
        block_store: Box<dyn BlockStore>,
        tx_store: Box<dyn TxStore>,
        utxo_store: Box<dyn UtxoStore>,
    ) -> Result<Chain> {
        let chain = Chain {
            block_store,
            tx_store,
            utxo_store,
            headers: RwLock::new(HeaderList::new()),
            commit_lock: Mutex::new(()),
        };

        let genesis = genesis_block()?;
        match chain.block_store.tip()? {
            None => {
                let _guard = chain.lock_commit()?;
                chain.commit(&genesis)?;
            }
            Some(tip) => chain.restore(tip, &genesis)?,
        }
        Ok(chain)
    }

    // Rebuilds headers by walking previous hashes from the tip down to genesis,
    // then replays every block into the UTXO set in height order.
    fn restore(&self, tip: Block, genesis: &Block) -> Result<()> {
        let mut blocks = vec![tip];
        loop {
            let current = &blocks[blocks.len() - 1];
            if current.get_height() == 0 {
                break;
            }
            let expected_height = current.get_height() - 1;
            let parent = self
                .block_store
                .get(&HEXLOWER.encode(current.get_prev_hash()))?;
            if parent.get_height() != expected_height {
                return Err(LedgerError::Storage(format!(
                    "broken chain: block at height {} links to height {}",
                    expected_height + 1,
                    parent.get_height()
                )));
            }
            blocks.push(parent);
        }
        blocks.reverse();

        if blocks[0].hash()? != genesis.hash()? {
            return Err(validation("stored genesis does not match"));
        }

        let _guard = self.lock_commit()?;
        let mut headers = HeaderList::new();
        for block in &blocks {
            self.apply_transactions(block, &mut Vec::new())?;
            headers.add(block.get_header().clone());
        }
        let height = headers.height();
        *self.write_headers()? = headers;
        info!("Restored chain at height {height} from the block store");
        Ok(())
    }

    fn lock_commit(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.commit_lock
            .lock()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire commit lock: {e}")))
    }

    fn read_headers(&self) -> Result<std::sync::RwLockReadGuard<'_, HeaderList>> {
        self.headers
            .read()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire header lock: {e}")))
    }

    fn write_headers(&self) -> Result<std::sync::RwLockWriteGuard<'_, HeaderList>> {
        self.headers
            .write()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire header lock: {e}")))
    }

    pub fn height(&self) -> Result<u64> {
        Ok(self.read_headers()?.height())
    }

    pub fn head_header(&self) -> Result<Header> {
        self.read_headers()?
            .last()
            .cloned()
            .ok_or_else(|| LedgerError::NotFound("chain has no headers".to_string()))
    }

    pub fn head_hash(&self) -> Result<Vec<u8>> {
        self.head_header()?.hash()
    }

    /// The most recently committed block.
    pub fn head(&self) -> Result<Block> {
        self.get_block_by_hash(&self.head_hash()?)
    }

    /// Validates `block` against the head and the UTXO set, then commits it.
    /// Calls are serialized; a rejected block leaves every store untouched.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        let _guard = self.lock_commit()?;
        self.validate_block(block)?;
        self.commit(block)
    }

    pub fn validate_block(&self, block: &Block) -> Result<()> {
        if !block.verify_transactions_root() {
            return Err(validation("bad transactions root"));
        }
        if !block.verify_signature() {
            return Err(validation("bad block signature"));
        }

        let head = self.head_header()?;
        if block.get_prev_hash() != head.hash()?.as_slice() {
            return Err(validation("bad previous hash"));
        }
        if block.get_height() != head.get_height() + 1 {
            return Err(validation("bad block height"));
        }

        for tx in block.get_transactions() {
            if !tx.verify() {
                return Err(validation("bad tx signature"));
            }
        }

        let mut claimed = HashSet::new();
        for tx in block.get_transactions() {
            self.check_spends(tx, &mut claimed)?;
        }
        Ok(())
    }

    /// Signature and spend rules for a single transaction against the current UTXO set.
    pub fn check_transaction(&self, tx: &Transaction) -> Result<()> {
        self.check_transaction_in_batch(tx, &mut HashSet::new())
    }

    /// Like `check_transaction`, also rejecting inputs already claimed by earlier
    /// members of the batch. On success the inputs of `tx` join `claimed`.
    pub fn check_transaction_in_batch(
        &self,
        tx: &Transaction,
        claimed: &mut HashSet<String>,
    ) -> Result<()> {
        if !tx.verify() {
            return Err(validation("bad tx signature"));
        }
        self.check_spends(tx, claimed)
    }

    fn check_spends(&self, tx: &Transaction, claimed: &mut HashSet<String>) -> Result<()> {
        if tx.is_minting() {
            return Err(validation("transaction has no inputs"));
        }

        let mut keys = Vec::with_capacity(tx.get_inputs().len());
        let mut input_total = 0u64;
        for input in tx.get_inputs() {
            let key = utxo_key(
                &HEXLOWER.encode(input.get_prev_tx_hash()),
                input.get_prev_out_index(),
            );
            let utxo = match self.utxo_store.get(&key) {
                Ok(utxo) => utxo,
                Err(e) if e.is_not_found() => {
                    debug!("Transaction spends unknown output {key}");
                    return Err(validation("unknown input"));
                }
                Err(e) => return Err(e),
            };
            if utxo.is_spent() {
                return Err(validation("input already spent"));
            }
            let owned = PublicKey::from_bytes(input.get_public_key())
                .map(|pk| utxo.is_owned_by(&pk.address()))
                .unwrap_or(false);
            if !owned {
                return Err(validation("input not owned by spender"));
            }
            if claimed.contains(&key) || keys.contains(&key) {
                return Err(validation("double spend within block"));
            }
            input_total = input_total
                .checked_add(utxo.get_amount())
                .ok_or_else(|| validation("input value overflow"))?;
            keys.push(key);
        }

        if tx.get_output_value()? > input_total {
            return Err(validation("outputs exceed inputs"));
        }
        claimed.extend(keys);
        Ok(())
    }

    // Persists transactions and UTXO changes, then the block, and only then makes
    // the header visible. If a write fails the consumed outputs are marked
    // unspent again so the same block can be retried.
    fn commit(&self, block: &Block) -> Result<()> {
        let mut consumed = Vec::new();
        let written = self
            .apply_transactions(block, &mut consumed)
            .and_then(|()| self.block_store.put(block));
        if let Err(e) = written {
            self.release_inputs(&consumed);
            return Err(e);
        }
        self.write_headers()?.add(block.get_header().clone());

        info!(
            "Committed block {} at height {} with {} transactions",
            block.hash_hex()?,
            block.get_height(),
            block.get_transactions().len()
        );
        Ok(())
    }

    // Records each output it marks spent in `consumed`, in its unspent form.
    fn apply_transactions(&self, block: &Block, consumed: &mut Vec<Utxo>) -> Result<()> {
        for tx in block.get_transactions() {
            self.tx_store.put(tx)?;

            for input in tx.get_inputs() {
                let key = utxo_key(
                    &HEXLOWER.encode(input.get_prev_tx_hash()),
                    input.get_prev_out_index(),
                );
                let utxo = self.utxo_store.get(&key)?;
                self.utxo_store.put(&utxo.clone().spent())?;
                consumed.push(utxo);
            }

            let tx_hash = tx.hash_hex()?;
            for (index, output) in tx.get_outputs().iter().enumerate() {
                let utxo = Utxo::new(
                    tx_hash.clone(),
                    index as u32,
                    output.get_amount(),
                    output.get_address().to_vec(),
                );
                self.utxo_store.put(&utxo)?;
            }
        }
        Ok(())
    }

    // Outputs created by the failed block stay behind unreferenced; a retry
    // overwrites them with the same values.
    fn release_inputs(&self, consumed: &[Utxo]) {
        for utxo in consumed.iter().rev() {
            if let Err(e) = self.utxo_store.put(utxo) {
                error!("Failed to release input {}: {e}", utxo.key());
            }
        }
    }

    pub fn get_block_by_hash(&self, hash: &[u8]) -> Result<Block> {
        self.block_store.get(&HEXLOWER.encode(hash))
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Block> {
        let header_hash = {
            let headers = self.read_headers()?;
            match headers.get(height) {
                Some(header) => header.hash()?,
                None => {
                    return Err(LedgerError::NotFound(format!(
                        "height too high: {height} > {}",
                        headers.height()
                    )))
                }
            }
        };
        self.get_block_by_hash(&header_hash)
    }

    pub fn has_block(&self, hash: &[u8]) -> Result<bool> {
        match self.get_block_by_hash(hash) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn get_transaction(&self, tx_hash_hex: &str) -> Result<Transaction> {
        self.tx_store.get(tx_hash_hex)
    }

    pub fn get_utxo(&self, tx_hash_hex: &str, out_index: u32) -> Result<Utxo> {
        self.utxo_store.get(&utxo_key(tx_hash_hex, out_index))
    }
}
