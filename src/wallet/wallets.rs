use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use crate::wallet::KeyPair;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const KEY_FILE: &str = "node.key";

#[derive(bincode::Encode, bincode::Decode, Zeroize, ZeroizeOnDrop)]
struct StoredKey {
    seed: Vec<u8>,
}

/// A validator key persisted on disk as its bincode-encoded seed.
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: impl Into<PathBuf>) -> KeyFile {
        KeyFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<KeyPair> {
        let mut file = File::open(&self.path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let stored: StoredKey = deserialize(&buf)?;
        buf.zeroize();
        KeyPair::from_seed(&stored.seed)
    }

    pub fn save(&self, pair: &KeyPair) -> Result<()> {
        let mut seed = pair.private_key_bytes();
        seed.truncate(crate::wallet::SEED_LEN);
        let mut bytes = serialize(&StoredKey { seed })?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        let written = writer.write_all(&bytes).and_then(|_| writer.flush());
        bytes.zeroize();
        written.map_err(|e| LedgerError::Io(format!("Could not save key file: {e}")))
    }

    /// Loads the key if the file exists, otherwise generates one and saves it.
    pub fn load_or_create(&self) -> Result<KeyPair> {
        if self.exists() {
            return self.load();
        }
        let pair = KeyPair::generate()?;
        self.save(&pair)?;
        log::info!(
            "Created new key {} at {}",
            pair.address(),
            self.path.display()
        );
        Ok(pair)
    }
}
